//! Byte-quantity parsing and rendering.
//!
//! Quota ceilings are persisted in directory extended attributes as decimal
//! integers with an optional binary-scale suffix. This module owns the three
//! representations a quota value passes through: the attribute text read off
//! disk, the `i64` byte count the admission arithmetic runs on, and the
//! human-readable figure printed in reports.
//!
//! Byte counts are signed throughout. Entitlement minus assigned quota can go
//! negative when policy shrinks under a user, and the arithmetic must keep
//! that representable instead of wrapping.

use thiserror::Error;

/// Quota value meaning "no limit configured".
///
/// Large enough that no real ceiling reaches it, small enough that sums of
/// per-folder quotas stay far from `i64::MAX`.
pub const QUOTA_UNBOUNDED: i64 = 1 << 50;

const KILO: i64 = 1000;
const MEGA: i64 = KILO * 1000;
const GIGA: i64 = MEGA * 1000;
const TERA: i64 = GIGA * 1000;

/// Error returned when a quota attribute value cannot be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown quota size: {raw}")]
pub struct ParseQuotaError {
    /// The attribute value as read from the filesystem.
    pub raw: String,
}

/// Parses a quota attribute value into a byte count.
///
/// Values are a decimal integer with an optional `K`/`Ki`/`M`/`Mi`/`G`/`Gi`
/// suffix; every suffix is binary (base 1024) whether or not it carries the
/// `i`. No suffix means raw bytes.
///
/// An empty value or an explicit `0` means the folder is not limited and maps
/// to [`QUOTA_UNBOUNDED`]. Absent-attribute and zeroed-attribute are thereby
/// indistinguishable; callers that zero a quota on purpose get "unbounded"
/// back.
///
/// # Errors
///
/// [`ParseQuotaError`] if the numeric part is not a decimal integer or the
/// scaled value overflows.
pub fn parse_quota_attribute(raw: &str) -> Result<i64, ParseQuotaError> {
    if raw.is_empty() {
        return Ok(QUOTA_UNBOUNDED);
    }
    let (digits, multiplier) = match raw {
        s if s.ends_with("Ki") => (&s[..s.len() - 2], 1024),
        s if s.ends_with('K') => (&s[..s.len() - 1], 1024),
        s if s.ends_with("Mi") => (&s[..s.len() - 2], 1024 * 1024),
        s if s.ends_with('M') => (&s[..s.len() - 1], 1024 * 1024),
        s if s.ends_with("Gi") => (&s[..s.len() - 2], 1024 * 1024 * 1024),
        s if s.ends_with('G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        s => (s, 1),
    };
    let value: i64 = digits.trim().parse().map_err(|_| ParseQuotaError {
        raw: raw.to_owned(),
    })?;
    if value == 0 {
        return Ok(QUOTA_UNBOUNDED);
    }
    value.checked_mul(multiplier).ok_or_else(|| ParseQuotaError {
        raw: raw.to_owned(),
    })
}

/// Serializes a byte count into the canonical attribute form: plain decimal
/// bytes, never a unit suffix.
#[must_use]
pub fn serialize_quota_attribute(bytes: i64) -> String {
    bytes.to_string()
}

/// Formats a byte count for reports.
///
/// Decimal units (base 1000) with one fractional digit, `UNBOUNDED` at or
/// above the sentinel, and exact bytes below one kilobyte.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_byte_size(byte_count: i64) -> String {
    match byte_count {
        b if b >= QUOTA_UNBOUNDED => "UNBOUNDED".to_owned(),
        b if b < 0 => "Negative? (Report Bug!)".to_owned(),
        b if b >= TERA => format!("{:.1} T", b as f64 / TERA as f64),
        b if b >= GIGA => format!("{:.1} G", b as f64 / GIGA as f64),
        b if b >= MEGA => format!("{:.1} M", b as f64 / MEGA as f64),
        b if b >= KILO => format!("{:.1} K", b as f64 / KILO as f64),
        b => format!("{b} B"),
    }
}
