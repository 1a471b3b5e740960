use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user attached to a project over a closed date interval.
///
/// Both endpoints are inclusive instants; `start_date == end_date` is a
/// valid single-point assignment. Invariant: `start_date <= end_date`,
/// enforced on create/update and backed by a CHECK constraint in the
/// Postgres store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub project_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Creation payload, as handed over by the hosting application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAssignment {
    pub user_id: Uuid,
    pub project_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl NewAssignment {
    pub fn into_assignment(self) -> Assignment {
        Assignment {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            project_id: self.project_id,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

/// Patch for an existing assignment. Absent fields keep their current
/// value; the assigned user cannot be changed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignmentUpdate {
    pub project_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}
