//! HTTP basic authentication
//!
//! Each username gets a token bucket of [`BURST`] attempts refilled at one
//! per second. Emptying the bucket, or more than [`MAX_FAILURES`] wrong
//! passwords, blocks the username for [`BLOCK_FOR`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{
        HeaderMap, HeaderValue,
        header::{AUTHORIZATION, RETRY_AFTER, WWW_AUTHENTICATE},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::api::AppError;
use crate::users::UserDatabase;

const REALM: &str = r#"Basic realm="Restricted""#;

/// Attempts allowed back to back
const BURST: f64 = 5.0;
/// Attempts regained per second
const REFILL_PER_SECOND: f64 = 1.0;
/// Wrong passwords tolerated before blocking
const MAX_FAILURES: u32 = 10;
const BLOCK_FOR: Duration = Duration::from_secs(60 * 60);

#[derive(Debug)]
struct Attempts {
    tokens: f64,
    refilled: Instant,
    failures: u32,
    blocked_until: Option<Instant>,
}

impl Attempts {
    fn new(now: Instant) -> Self {
        Self {
            tokens: BURST,
            refilled: now,
            failures: 0,
            blocked_until: None,
        }
    }

    fn block(&mut self, now: Instant) -> Duration {
        self.blocked_until = Some(now + BLOCK_FOR);
        BLOCK_FOR
    }
}

/// Basic authentication against a users file
pub struct BasicAuth {
    users: UserDatabase,
    attempts: DashMap<String, Attempts>,
}

impl BasicAuth {
    #[must_use]
    pub fn new(users: UserDatabase) -> Self {
        Self {
            users,
            attempts: DashMap::new(),
        }
    }

    /// Take an attempt from the bucket of `username`
    ///
    /// Returns how long to wait when the username is blocked.
    fn admit(&self, username: &str, now: Instant) -> Result<(), Duration> {
        let mut attempts = self
            .attempts
            .entry(username.to_string())
            .or_insert_with(|| Attempts::new(now));

        match attempts.blocked_until {
            Some(until) if until > now => return Err(until - now),
            Some(_) => {
                attempts.blocked_until = None;
                attempts.failures = 0;
            }
            None => {}
        }

        let elapsed = now.saturating_duration_since(attempts.refilled);
        attempts.tokens = elapsed
            .as_secs_f64()
            .mul_add(REFILL_PER_SECOND, attempts.tokens)
            .min(BURST);
        attempts.refilled = now;

        if attempts.tokens < 1.0 {
            warn!(username, "too many attempts, blocking user");
            return Err(attempts.block(now));
        }
        attempts.tokens -= 1.0;
        Ok(())
    }

    /// Count a wrong password, returns the block duration once over the limit
    fn record_failure(&self, username: &str, now: Instant) -> Option<Duration> {
        let mut attempts = self
            .attempts
            .entry(username.to_string())
            .or_insert_with(|| Attempts::new(now));

        attempts.failures += 1;
        if attempts.failures > MAX_FAILURES {
            warn!(username, failures = attempts.failures, "too many failures, blocking user");
            Some(attempts.block(now))
        } else {
            debug!(username, failures = attempts.failures, "authentication failed");
            None
        }
    }
}

/// Username and password from an `Authorization: Basic` header
fn credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn reject(error: AppError, retry_after: Option<Duration>) -> Response {
    let mut response = error.into_response();
    let headers = response.headers_mut();
    headers.insert(WWW_AUTHENTICATE, HeaderValue::from_static(REALM));
    if let Some(wait) = retry_after {
        headers.insert(RETRY_AFTER, HeaderValue::from(wait.as_secs().max(1)));
    }
    response
}

/// Middleware admitting only requests with valid basic credentials
pub async fn require_auth(
    State(auth): State<Arc<BasicAuth>>,
    request: Request,
    next: Next,
) -> Response {
    let Some((username, password)) = credentials(request.headers()) else {
        return reject(AppError::unauthorized(), None);
    };

    if let Err(wait) = auth.admit(&username, Instant::now()) {
        return reject(AppError::too_many_requests(), Some(wait));
    }

    if auth.users.find_by_password(&username, &password).await.is_none() {
        let blocked = auth.record_failure(&username, Instant::now());
        return reject(AppError::unauthorized(), blocked);
    }

    debug!(username, path = %request.uri().path(), "authenticated request");
    next.run(request).await
}
