//! Retry policy shared by the provider clients.
//!
//! Providers throttle with 429 and fall over with 5xx; both are worth a
//! bounded, jittered re-send. Anything in the 4xx family besides the
//! transient trio (408/409/425) is a caller bug and is never retried.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;

const BASE_BACKOFF_MS: u64 = 200;

static JITTER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Statuses that merit another attempt.
pub fn should_retry_status(status: u16) -> bool {
    matches!(status, 408 | 409 | 425 | 429) || status >= 500
}

/// Exponential backoff with the shift capped so late attempts stay bounded.
pub fn next_backoff_ms(attempt: u32) -> u64 {
    let shift = attempt.min(6);
    BASE_BACKOFF_MS.saturating_mul(1_u64 << shift)
}

/// Backoff with deterministic jitter in `[base/2, base]`. The mix is seeded
/// from a process-wide counter so concurrent retries spread out without
/// needing a PRNG dependency.
pub fn next_backoff_ms_with_jitter(attempt: u32) -> u64 {
    let base = next_backoff_ms(attempt);
    if base <= 1 {
        return base;
    }
    let seed = JITTER_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mixed = seed
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .rotate_left(17)
        ^ 0xA24B_AED4_963E_E407;
    let half = base / 2;
    half + mixed % (base - half + 1)
}

/// Parses a `Retry-After` value into milliseconds. Accepts both the
/// delta-seconds and HTTP-date forms; a date already in the past maps to
/// zero rather than `None` so the caller still honors the header.
pub fn parse_retry_after_ms(value: &str, now: DateTime<Utc>) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds.saturating_mul(1_000));
    }
    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delta_ms = date
        .with_timezone(&Utc)
        .signed_duration_since(now)
        .num_milliseconds();
    if delta_ms <= 0 {
        Some(0)
    } else {
        Some(delta_ms as u64)
    }
}

/// Reads `Retry-After` off a response header map, if present and parseable.
pub fn retry_after_from_headers(headers: &HeaderMap, now: DateTime<Utc>) -> Option<u64> {
    let raw = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    parse_retry_after_ms(raw, now)
}

/// Delay before the next attempt: jittered backoff, stretched to whatever
/// the server asked for when a `Retry-After` hint is larger.
pub fn provider_retry_delay_ms(attempt: u32, retry_after_ms: Option<u64>) -> u64 {
    let backoff = next_backoff_ms_with_jitter(attempt);
    match retry_after_ms {
        Some(hint) => backoff.max(hint),
        None => backoff,
    }
}

/// Transport-level failures worth retrying: timeouts, refused connections,
/// and bodies that died mid-flight. Anything else (TLS config, invalid URL)
/// will fail the same way again.
pub fn is_retryable_http_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}
