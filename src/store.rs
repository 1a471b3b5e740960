//! Collaborator seams of the staffing core: user and project resolution
//! plus assignment persistence. The service holds these as trait objects
//! so the hosting application can plug in its own backends.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StaffingError;
use crate::model::assignment::Assignment;
use crate::model::project::Project;
use crate::model::user::User;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StaffingError>;
}

#[async_trait]
pub trait ProjectDirectory: Send + Sync {
    async fn find_project(&self, id: Uuid) -> Result<Option<Project>, StaffingError>;

    async fn all_projects(&self) -> Result<Vec<Project>, StaffingError>;
}

/// Assignment persistence.
///
/// `insert` and `replace` are checked writes: implementations re-validate
/// the no-overlap invariant under their own serialization (a lock, or a
/// transaction with row locks plus an exclusion constraint) before
/// committing. The service's read-then-check pass alone is not enough;
/// without this discipline two concurrent creates for the same user could
/// both pass validation and both commit.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Assignment>, StaffingError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Assignment>, StaffingError>;

    /// Assignments of `user_id` whose closed interval contains `date`.
    async fn find_containing_date(
        &self,
        user_id: Uuid,
        date: DateTime<Utc>,
    ) -> Result<Vec<Assignment>, StaffingError>;

    /// An assignment active on `date` on a project whose referring
    /// employee is `manager_id`, if one exists.
    async fn find_for_manager_on_date(
        &self,
        manager_id: Uuid,
        date: DateTime<Utc>,
    ) -> Result<Option<Assignment>, StaffingError>;

    /// Persists a new assignment, failing with
    /// [`StaffingError::Conflict`] if its range intersects any assignment
    /// the user already holds.
    async fn insert(&self, assignment: Assignment) -> Result<Assignment, StaffingError>;

    /// Overwrites an existing assignment by id, with the same overlap
    /// guarantee; the stored row being replaced is excluded from the check.
    async fn replace(&self, assignment: Assignment) -> Result<Assignment, StaffingError>;

    /// Removes an assignment; returns whether a row was deleted.
    async fn delete(&self, id: Uuid) -> Result<bool, StaffingError>;
}
