//! The on-disk/in-memory cache record

use chrono::{DateTime, NaiveDate, Utc};

/// A single cached entry with engine metadata.
///
/// This is the persistence record described by the blob-cache contract: a
/// key, an optional logical type tag (set only by the typed-object API), the
/// opaque payload after any pre-write transform, and the two timestamps that
/// drive lazy expiration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheElement {
    /// Primary key. Case-sensitive, non-empty.
    pub key: String,
    /// Fully-qualified logical type name, set when written via the typed-object API.
    pub type_name: Option<String>,
    /// Opaque payload, verbatim after the pre-write transform.
    pub value: Vec<u8>,
    /// Wall-clock UTC instant the entry was inserted.
    pub created_at: DateTime<Utc>,
    /// Absolute UTC expiry. `never_expires()` means the entry never expires.
    pub expiration: DateTime<Utc>,
}

impl CacheElement {
    /// Whether this entry is expired as of `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration < now
    }
}

/// The sentinel expiration value meaning "never expires".
///
/// Represented as the last representable moment of the proleptic Gregorian
/// calendar year 9999, far beyond any realistic cache lifetime, rather than
/// `Option<DateTime<Utc>>` so that on-disk tick comparisons stay a single
/// unsigned range scan (`Expiration >= ?`) with no NULL handling.
pub fn never_expires() -> DateTime<Utc> {
    DateTime::<Utc>::from_naive_utc_and_offset(
        NaiveDate::from_ymd_opt(9999, 12, 31)
            .expect("valid date")
            .and_hms_opt(23, 59, 59)
            .expect("valid time"),
        Utc,
    )
}

/// Convert a UTC instant to 100-nanosecond ticks since the Unix epoch, the
/// on-disk representation used by the persistent backend (§6.1).
pub fn ticks_from_datetime(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_nanos_opt().unwrap_or(i64::MAX) / 100
}

/// Convert 100-nanosecond ticks since the Unix epoch back to a UTC instant.
pub fn ticks_to_datetime(ticks: i64) -> DateTime<Utc> {
    let nanos = ticks.saturating_mul(100);
    DateTime::<Utc>::from_timestamp(
        nanos.div_euclid(1_000_000_000),
        (nanos.rem_euclid(1_000_000_000)) as u32,
    )
    .unwrap_or_else(never_expires)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_round_trip() {
        let now = Utc::now();
        // Truncate to 100ns precision, matching what the tick conversion preserves.
        let ticks = ticks_from_datetime(now);
        let back = ticks_to_datetime(ticks);
        assert_eq!(ticks_from_datetime(back), ticks);
    }

    #[test]
    fn never_expires_is_far_future() {
        assert!(never_expires() > Utc::now());
    }

    #[test]
    fn is_expired_at_compares_against_clock() {
        let el = CacheElement {
            key: "k".into(),
            type_name: None,
            value: vec![1],
            created_at: Utc::now(),
            expiration: Utc::now() - chrono::Duration::seconds(1),
        };
        assert!(el.is_expired_at(Utc::now()));
    }
}
