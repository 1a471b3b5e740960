//! In-memory backend. Backs the test suite and doubles as the reference
//! implementation of the write serialization: a single mutex guards the
//! whole state, so the overlap re-check inside `insert`/`replace` runs in
//! the same critical section as the write itself.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::assignment::overlap;
use crate::error::StaffingError;
use crate::model::assignment::Assignment;
use crate::model::project::Project;
use crate::model::user::User;
use crate::store::{AssignmentStore, ProjectDirectory, UserDirectory};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    projects: HashMap<Uuid, Project>,
    assignments: Vec<Assignment>,
}

#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user: User) {
        self.state.lock().await.users.insert(user.id, user);
    }

    pub async fn add_project(&self, project: Project) {
        self.state.lock().await.projects.insert(project.id, project);
    }

    /// Inserts without the overlap check. Test hook for seeding state that
    /// violates the invariant.
    pub async fn insert_unchecked(&self, assignment: Assignment) {
        self.state.lock().await.assignments.push(assignment);
    }
}

#[async_trait]
impl UserDirectory for MemoryBackend {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StaffingError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }
}

#[async_trait]
impl ProjectDirectory for MemoryBackend {
    async fn find_project(&self, id: Uuid) -> Result<Option<Project>, StaffingError> {
        Ok(self.state.lock().await.projects.get(&id).cloned())
    }

    async fn all_projects(&self) -> Result<Vec<Project>, StaffingError> {
        let mut projects: Vec<Project> = self.state.lock().await.projects.values().cloned().collect();
        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }
}

#[async_trait]
impl AssignmentStore for MemoryBackend {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Assignment>, StaffingError> {
        let state = self.state.lock().await;
        Ok(state
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Assignment>, StaffingError> {
        let state = self.state.lock().await;
        Ok(state.assignments.iter().find(|a| a.id == id).cloned())
    }

    async fn find_containing_date(
        &self,
        user_id: Uuid,
        date: DateTime<Utc>,
    ) -> Result<Vec<Assignment>, StaffingError> {
        let state = self.state.lock().await;
        Ok(state
            .assignments
            .iter()
            .filter(|a| {
                a.user_id == user_id && overlap::range_contains(a.start_date, a.end_date, date)
            })
            .cloned()
            .collect())
    }

    async fn find_for_manager_on_date(
        &self,
        manager_id: Uuid,
        date: DateTime<Utc>,
    ) -> Result<Option<Assignment>, StaffingError> {
        let state = self.state.lock().await;
        Ok(state
            .assignments
            .iter()
            .find(|a| {
                overlap::range_contains(a.start_date, a.end_date, date)
                    && state
                        .projects
                        .get(&a.project_id)
                        .is_some_and(|p| p.referring_employee_id == manager_id)
            })
            .cloned())
    }

    async fn insert(&self, assignment: Assignment) -> Result<Assignment, StaffingError> {
        let mut state = self.state.lock().await;
        let clash = state.assignments.iter().find(|a| {
            a.user_id == assignment.user_id
                && overlap::ranges_overlap(
                    assignment.start_date,
                    assignment.end_date,
                    a.start_date,
                    a.end_date,
                )
        });
        if let Some(clash) = clash {
            return Err(StaffingError::Conflict {
                user_id: assignment.user_id,
                existing: Box::new(clash.clone()),
            });
        }
        state.assignments.push(assignment.clone());
        Ok(assignment)
    }

    async fn replace(&self, assignment: Assignment) -> Result<Assignment, StaffingError> {
        let mut state = self.state.lock().await;
        let position = state
            .assignments
            .iter()
            .position(|a| a.id == assignment.id)
            .ok_or(StaffingError::AssignmentNotFound(assignment.id))?;
        let clash = state.assignments.iter().find(|a| {
            a.id != assignment.id
                && a.user_id == assignment.user_id
                && overlap::ranges_overlap(
                    assignment.start_date,
                    assignment.end_date,
                    a.start_date,
                    a.end_date,
                )
        });
        if let Some(clash) = clash {
            return Err(StaffingError::Conflict {
                user_id: assignment.user_id,
                existing: Box::new(clash.clone()),
            });
        }
        state.assignments[position] = assignment.clone();
        Ok(assignment)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StaffingError> {
        let mut state = self.state.lock().await;
        match state.assignments.iter().position(|a| a.id == id) {
            Some(position) => {
                state.assignments.remove(position);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
