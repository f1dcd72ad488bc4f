//! Image reference helpers

use std::borrow::Cow;

/// Tag the engine assumes when a reference names none
pub const DEFAULT_TAG: &str = "latest";

/// Split `reference` into the repository and its tag or digest
///
/// The tag is only searched after the last `/`, so a registry port is not
/// mistaken for one. Returns `None` for the tag when there is neither a tag
/// nor a digest.
#[must_use]
pub fn split_reference(reference: &str) -> (&str, Option<&str>) {
    if let Some((repository, digest)) = reference.split_once('@') {
        return (repository, Some(digest));
    }

    let name_start = reference.rfind('/').map_or(0, |i| i + 1);
    match reference[name_start..].rfind(':') {
        Some(i) => {
            let at = name_start + i;
            (&reference[..at], Some(&reference[at + 1..]))
        }
        None => (reference, None),
    }
}

/// `reference` with `:latest` appended when it has no tag or digest
#[must_use]
pub fn with_default_tag(reference: &str) -> Cow<'_, str> {
    match split_reference(reference) {
        (_, Some(_)) => Cow::Borrowed(reference),
        (repository, None) => Cow::Owned(format!("{repository}:{DEFAULT_TAG}")),
    }
}
