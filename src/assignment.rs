//! Assignment operations: conflict-checked creation with role-shaped
//! results, plus the role-scoped lookups the hosting application exposes.

pub mod overlap;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::StaffingError;
use crate::model::assignment::{Assignment, AssignmentUpdate, NewAssignment};
use crate::model::project::Project;
use crate::model::response::{AdminAssignmentView, CreatedAssignment, ProjectDetail};
use crate::model::user::{Role, User};
use crate::store::{AssignmentStore, ProjectDirectory, UserDirectory};

/// Service over the three collaborator seams. Cheap to clone; every call
/// takes the authenticated principal explicitly.
#[derive(Clone)]
pub struct AssignmentService {
    users: Arc<dyn UserDirectory>,
    projects: Arc<dyn ProjectDirectory>,
    store: Arc<dyn AssignmentStore>,
}

impl AssignmentService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        projects: Arc<dyn ProjectDirectory>,
        store: Arc<dyn AssignmentStore>,
    ) -> Self {
        Self {
            users,
            projects,
            store,
        }
    }

    /// Creates an assignment after the overlap check.
    ///
    /// Resolves the assigned user and the project first; either one missing
    /// fails with a not-found error before any conflict evaluation and
    /// before anything is written. When no conflict is found, the result
    /// shape follows the acting user's role: project managers get the bare
    /// saved assignment, admins get it enriched with the assigned user and
    /// the project's referring employee, and employees are not allowed to
    /// create assignments at all.
    ///
    /// The store's `insert` re-validates the overlap under its own
    /// serialization, so two concurrent creates for the same user cannot
    /// both commit (see [`crate::store::AssignmentStore`]).
    pub async fn create(
        &self,
        new: NewAssignment,
        acting: &User,
    ) -> Result<CreatedAssignment, StaffingError> {
        let assigned = self
            .users
            .find_user(new.user_id)
            .await?
            .ok_or(StaffingError::UserNotFound(new.user_id))?;
        let project = self
            .projects
            .find_project(new.project_id)
            .await?
            .ok_or(StaffingError::ProjectNotFound(new.project_id))?;

        if new.start_date > new.end_date {
            return Err(StaffingError::InvalidRange {
                start: new.start_date,
                end: new.end_date,
            });
        }

        let existing = self.store.find_by_user(new.user_id).await?;
        if let Some(clash) = overlap::find_conflict(new.start_date, new.end_date, &existing) {
            warn!(
                user = %assigned.username,
                existing = %clash.id,
                "rejecting assignment over an occupied date range"
            );
            return Err(StaffingError::Conflict {
                user_id: assigned.id,
                existing: Box::new(clash.clone()),
            });
        }

        match acting.role {
            Role::ProjectManager => {
                let saved = self.store.insert(new.into_assignment()).await?;
                info!(assignment = %saved.id, user = %assigned.username, "assignment created");
                Ok(CreatedAssignment::Assignment(saved))
            }
            Role::Admin => {
                let referring = self
                    .users
                    .find_user(project.referring_employee_id)
                    .await?
                    .ok_or(StaffingError::UserNotFound(project.referring_employee_id))?;
                let saved = self.store.insert(new.into_assignment()).await?;
                info!(assignment = %saved.id, user = %assigned.username, "assignment created");
                Ok(CreatedAssignment::AdminView(AdminAssignmentView {
                    assignment: saved,
                    user: assigned,
                    project: ProjectDetail {
                        project,
                        referring_employee: referring,
                    },
                }))
            }
            Role::Employee => Err(StaffingError::Forbidden(
                "employees cannot create assignments".into(),
            )),
        }
    }

    /// All assignments held by the requester. An empty collection is a
    /// normal answer, not an error.
    pub async fn assignments_for(&self, requester: &User) -> Result<Vec<Assignment>, StaffingError> {
        self.store.find_by_user(requester.id).await
    }

    /// The single assignment of `user_id` whose closed interval contains
    /// `date`. More than one match means the no-overlap invariant was
    /// violated in storage and is reported as a data error.
    pub async fn find_on_date(
        &self,
        user_id: Uuid,
        date: DateTime<Utc>,
    ) -> Result<Assignment, StaffingError> {
        let mut matches = self.store.find_containing_date(user_id, date).await?;
        match matches.len() {
            0 => Err(StaffingError::NoAssignmentOnDate { user_id, date }),
            1 => Ok(matches.remove(0)),
            n => Err(StaffingError::Data(format!(
                "user {user_id} has {n} assignments covering {date}"
            ))),
        }
    }

    /// Resolves one assignment by id. Employees may only see assignments
    /// on projects they are themselves assigned to; managers and admins
    /// get an unrestricted lookup.
    pub async fn find_one(&self, id: Uuid, requester: &User) -> Result<Assignment, StaffingError> {
        let assignment = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(StaffingError::AssignmentNotFound(id))?;
        // A dangling user reference is surfaced here rather than downstream.
        self.users
            .find_user(assignment.user_id)
            .await?
            .ok_or(StaffingError::UserNotFound(assignment.user_id))?;

        match requester.role {
            Role::Employee => {
                let own = self.store.find_by_user(requester.id).await?;
                if own.iter().any(|a| a.project_id == assignment.project_id) {
                    Ok(assignment)
                } else {
                    Err(StaffingError::Forbidden(format!(
                        "{} isn't on this project",
                        requester.username
                    )))
                }
            }
            Role::ProjectManager | Role::Admin => Ok(assignment),
        }
    }

    /// The assignment active on `date` on a project referred by
    /// `manager_id`, if any. Used when validating events recorded against
    /// assignments.
    pub async fn manager_assignment_on_date(
        &self,
        manager_id: Uuid,
        date: DateTime<Utc>,
    ) -> Result<Option<Assignment>, StaffingError> {
        self.store.find_for_manager_on_date(manager_id, date).await
    }

    /// Distinct projects the requester currently holds assignments on.
    pub async fn own_projects(&self, requester: &User) -> Result<Vec<Project>, StaffingError> {
        let mut projects: Vec<Project> = Vec::new();
        for assignment in self.store.find_by_user(requester.id).await? {
            if projects.iter().any(|p| p.id == assignment.project_id) {
                continue;
            }
            let project = self
                .projects
                .find_project(assignment.project_id)
                .await?
                .ok_or(StaffingError::ProjectNotFound(assignment.project_id))?;
            projects.push(project);
        }
        Ok(projects)
    }

    /// Full project list, restricted to managers and admins.
    pub async fn all_projects(&self, acting: &User) -> Result<Vec<Project>, StaffingError> {
        match acting.role {
            Role::Employee => Err(StaffingError::Forbidden(
                "project list is restricted to managers and admins".into(),
            )),
            Role::ProjectManager | Role::Admin => self.projects.all_projects().await,
        }
    }

    /// Applies a patch to an assignment, re-running the overlap check
    /// against the user's other assignments (the one being updated is
    /// excluded from its own check).
    pub async fn update(
        &self,
        id: Uuid,
        patch: AssignmentUpdate,
        acting: &User,
    ) -> Result<Assignment, StaffingError> {
        if acting.role == Role::Employee {
            return Err(StaffingError::Forbidden(
                "employees cannot modify assignments".into(),
            ));
        }

        let current = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(StaffingError::AssignmentNotFound(id))?;

        if let Some(project_id) = patch.project_id {
            self.projects
                .find_project(project_id)
                .await?
                .ok_or(StaffingError::ProjectNotFound(project_id))?;
        }

        let updated = Assignment {
            id: current.id,
            user_id: current.user_id,
            project_id: patch.project_id.unwrap_or(current.project_id),
            start_date: patch.start_date.unwrap_or(current.start_date),
            end_date: patch.end_date.unwrap_or(current.end_date),
        };

        if updated.start_date > updated.end_date {
            return Err(StaffingError::InvalidRange {
                start: updated.start_date,
                end: updated.end_date,
            });
        }

        let others: Vec<Assignment> = self
            .store
            .find_by_user(updated.user_id)
            .await?
            .into_iter()
            .filter(|a| a.id != id)
            .collect();
        if let Some(clash) = overlap::find_conflict(updated.start_date, updated.end_date, &others) {
            return Err(StaffingError::Conflict {
                user_id: updated.user_id,
                existing: Box::new(clash.clone()),
            });
        }

        let saved = self.store.replace(updated).await?;
        info!(assignment = %saved.id, "assignment updated");
        Ok(saved)
    }

    /// Deletes an assignment by id. Not available to employees.
    pub async fn remove(&self, id: Uuid, acting: &User) -> Result<(), StaffingError> {
        if acting.role == Role::Employee {
            return Err(StaffingError::Forbidden(
                "employees cannot remove assignments".into(),
            ));
        }
        if !self.store.delete(id).await? {
            return Err(StaffingError::AssignmentNotFound(id));
        }
        info!(assignment = %id, "assignment removed");
        Ok(())
    }
}
