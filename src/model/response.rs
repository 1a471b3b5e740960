use serde::Serialize;

use crate::model::assignment::Assignment;
use crate::model::project::Project;
use crate::model::user::User;

/// Project embedding its referring employee, as exposed to admins.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub referring_employee: User,
}

/// Saved assignment enriched with the assigned user and the full project
/// record, returned only for admin-initiated creates.
#[derive(Debug, Clone, Serialize)]
pub struct AdminAssignmentView {
    #[serde(flatten)]
    pub assignment: Assignment,
    pub user: User,
    pub project: ProjectDetail,
}

/// Result shape of a successful create, decided by the acting user's role.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CreatedAssignment {
    /// Bare saved assignment (project managers).
    Assignment(Assignment),
    /// Enriched record (admins).
    AdminView(AdminAssignmentView),
}
