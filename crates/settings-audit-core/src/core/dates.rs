// crates/settings-audit-core/src/core/dates.rs
// ============================================================================
// Module: Timestamp Rendering
// Description: Human-readable rendering of hub millisecond timestamps.
// Purpose: Make failure reports readable by operators.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Hub timestamps are milliseconds since the Unix epoch. Reports render them
//! as `YYYY-MM-DD HH:MM:SS UTC`, truncated to the second.

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Report date layout, always in UTC.
const DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC");

/// Renders a millisecond timestamp as a UTC date string.
///
/// Timestamps outside the representable range render as `invalid timestamp`.
#[must_use]
pub fn timestamp_to_date(timestamp_ms: u64) -> String {
    i64::try_from(timestamp_ms / 1_000)
        .ok()
        .and_then(|seconds| OffsetDateTime::from_unix_timestamp(seconds).ok())
        .and_then(|instant| instant.format(DATE_FORMAT).ok())
        .unwrap_or_else(|| "invalid timestamp".to_string())
}
