//! Closed-interval overlap detection, the check behind every assignment
//! write. Endpoints are inclusive by design: two ranges that touch at a
//! single instant count as conflicting.

use chrono::{DateTime, Utc};

use crate::model::assignment::Assignment;

/// Whether the closed intervals `[start_a, end_a]` and `[start_b, end_b]`
/// intersect. Single-point ranges (`start == end`) behave like any other.
pub fn ranges_overlap(
    start_a: DateTime<Utc>,
    end_a: DateTime<Utc>,
    start_b: DateTime<Utc>,
    end_b: DateTime<Utc>,
) -> bool {
    start_a <= end_b && end_a >= start_b
}

/// First of `existing` whose interval intersects the candidate range.
/// Callers pass the assignments of a single user; the check itself does
/// not look at `user_id`.
pub fn find_conflict(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    existing: &[Assignment],
) -> Option<&Assignment> {
    existing
        .iter()
        .find(|a| ranges_overlap(start, end, a.start_date, a.end_date))
}

/// Whether `at` falls inside the closed interval `[start, end]`.
pub fn range_contains(start: DateTime<Utc>, end: DateTime<Utc>, at: DateTime<Utc>) -> bool {
    start <= at && at <= end
}
