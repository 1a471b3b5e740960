use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::model::assignment::Assignment;

/// Errors surfaced by the assignment service and its stores.
///
/// All of these are returned synchronously to the caller; none are retried
/// and none are fatal to the process.
#[derive(Debug, Error)]
pub enum StaffingError {
    #[error("user {0} not found")]
    UserNotFound(Uuid),

    #[error("project {0} not found")]
    ProjectNotFound(Uuid),

    #[error("assignment {0} not found")]
    AssignmentNotFound(Uuid),

    #[error("no assignment for user {user_id} covering {date}")]
    NoAssignmentOnDate { user_id: Uuid, date: DateTime<Utc> },

    /// The candidate range intersects an assignment the user already holds.
    /// Endpoints are inclusive, so ranges that merely touch conflict too.
    #[error("user {user_id} is already assigned to a project over this date range")]
    Conflict {
        user_id: Uuid,
        existing: Box<Assignment>,
    },

    #[error("not authorized: {0}")]
    Forbidden(String),

    #[error("invalid range: {start} is after {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("configuration error: {0}")]
    Config(String),

    /// Stored data violates an invariant the service relies on, e.g. two
    /// persisted assignments for one user covering the same date.
    #[error("storage integrity: {0}")]
    Data(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}
