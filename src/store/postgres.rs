//! Postgres backend over raw sqlx queries.
//!
//! Writes run inside a transaction that takes `FOR UPDATE` locks on the
//! user's existing assignment rows before re-checking the overlap. Row
//! locks cannot see a concurrent *fresh* insert for the same user, so the
//! schema carries a `btree_gist` exclusion constraint over
//! `(user_id, tstzrange(start_date, end_date, '[]'))` as the database-level
//! backstop; a violation is reported as a conflict like any other.

use std::env::var;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::assignment::overlap;
use crate::error::StaffingError;
use crate::model::assignment::Assignment;
use crate::model::project::Project;
use crate::model::user::{Role, User};
use crate::store::{AssignmentStore, ProjectDirectory, UserDirectory};

pub struct PgBackend {
    pool: Pool<Postgres>,
}

impl PgBackend {
    /// Connects using the `PSQL_NAME` / `PSQL_PASS` environment variables
    /// (plus optional `PSQL_HOST`, defaulting to localhost) and bootstraps
    /// the schema.
    pub async fn connect() -> Result<Self, StaffingError> {
        let Ok(name) = var("PSQL_NAME") else {
            return Err(StaffingError::Config(
                "PSQL_NAME environment variable not present".into(),
            ));
        };
        let Ok(pass) = var("PSQL_PASS") else {
            return Err(StaffingError::Config(
                "PSQL_PASS environment variable not present".into(),
            ));
        };
        let host = var("PSQL_HOST").unwrap_or_else(|_| "localhost".into());

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&format!("postgres://{name}:{pass}@{host}"))
            .await?;

        let backend = Self { pool };
        backend.init_schema().await?;
        tracing::info!("staffing schema initialized");
        Ok(backend)
    }

    /// Wraps an existing pool; the caller is responsible for the schema.
    pub fn with_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn init_schema(&self) -> Result<(), StaffingError> {
        let mut transaction = self.pool.begin().await?;

        sqlx::query("CREATE SCHEMA IF NOT EXISTS roster;")
            .execute(&mut *transaction)
            .await?;
        sqlx::query("CREATE EXTENSION IF NOT EXISTS btree_gist;")
            .execute(&mut *transaction)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS roster.users (
                id UUID PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                role TEXT NOT NULL
            );",
        )
        .execute(&mut *transaction)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS roster.projects (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                referring_employee_id UUID NOT NULL REFERENCES roster.users (id)
            );",
        )
        .execute(&mut *transaction)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS roster.assignments (
                id UUID PRIMARY KEY,
                user_id UUID NOT NULL REFERENCES roster.users (id),
                project_id UUID NOT NULL REFERENCES roster.projects (id),
                start_date TIMESTAMPTZ NOT NULL,
                end_date TIMESTAMPTZ NOT NULL,
                CHECK (start_date <= end_date),
                CONSTRAINT assignments_no_overlap EXCLUDE USING gist (
                    user_id WITH =,
                    tstzrange(start_date, end_date, '[]') WITH &&
                )
            );",
        )
        .execute(&mut *transaction)
        .await?;

        transaction.commit().await?;
        Ok(())
    }

    pub async fn add_user(&self, user: &User) -> Result<(), StaffingError> {
        sqlx::query("INSERT INTO roster.users (id, username, email, role) VALUES ($1, $2, $3, $4);")
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(user.role.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn add_project(&self, project: &Project) -> Result<(), StaffingError> {
        sqlx::query(
            "INSERT INTO roster.projects (id, name, referring_employee_id) VALUES ($1, $2, $3);",
        )
        .bind(project.id)
        .bind(&project.name)
        .bind(project.referring_employee_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn assignment_from_row(row: &PgRow) -> Assignment {
    Assignment {
        id: row.get("id"),
        user_id: row.get("user_id"),
        project_id: row.get("project_id"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
    }
}

fn is_exclusion_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .and_then(|d| d.code())
        .map(|code| code == "23P01")
        .unwrap_or(false)
}

#[async_trait]
impl UserDirectory for PgBackend {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StaffingError> {
        let Some(row) =
            sqlx::query("SELECT id, username, email, role FROM roster.users WHERE id = $1;")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
        else {
            return Ok(None);
        };

        let role: String = row.get("role");
        let role = role.parse::<Role>().map_err(StaffingError::Data)?;

        Ok(Some(User {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            role,
        }))
    }
}

#[async_trait]
impl ProjectDirectory for PgBackend {
    async fn find_project(&self, id: Uuid) -> Result<Option<Project>, StaffingError> {
        let row = sqlx::query(
            "SELECT id, name, referring_employee_id FROM roster.projects WHERE id = $1;",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Project {
            id: row.get("id"),
            name: row.get("name"),
            referring_employee_id: row.get("referring_employee_id"),
        }))
    }

    async fn all_projects(&self) -> Result<Vec<Project>, StaffingError> {
        let rows =
            sqlx::query("SELECT id, name, referring_employee_id FROM roster.projects ORDER BY name;")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .iter()
            .map(|row| Project {
                id: row.get("id"),
                name: row.get("name"),
                referring_employee_id: row.get("referring_employee_id"),
            })
            .collect())
    }
}

#[async_trait]
impl AssignmentStore for PgBackend {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Assignment>, StaffingError> {
        let rows = sqlx::query(
            "SELECT id, user_id, project_id, start_date, end_date
            FROM roster.assignments WHERE user_id = $1 ORDER BY start_date;",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(assignment_from_row).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Assignment>, StaffingError> {
        let row = sqlx::query(
            "SELECT id, user_id, project_id, start_date, end_date
            FROM roster.assignments WHERE id = $1;",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(assignment_from_row))
    }

    async fn find_containing_date(
        &self,
        user_id: Uuid,
        date: DateTime<Utc>,
    ) -> Result<Vec<Assignment>, StaffingError> {
        let rows = sqlx::query(
            "SELECT id, user_id, project_id, start_date, end_date
            FROM roster.assignments
            WHERE user_id = $1 AND start_date <= $2 AND end_date >= $2;",
        )
        .bind(user_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(assignment_from_row).collect())
    }

    async fn find_for_manager_on_date(
        &self,
        manager_id: Uuid,
        date: DateTime<Utc>,
    ) -> Result<Option<Assignment>, StaffingError> {
        let row = sqlx::query(
            "SELECT a.id, a.user_id, a.project_id, a.start_date, a.end_date
            FROM roster.assignments a
            JOIN roster.projects p ON p.id = a.project_id
            WHERE p.referring_employee_id = $1
                AND a.start_date <= $2 AND a.end_date >= $2
            LIMIT 1;",
        )
        .bind(manager_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(assignment_from_row))
    }

    async fn insert(&self, assignment: Assignment) -> Result<Assignment, StaffingError> {
        let mut transaction = self.pool.begin().await?;

        let rows = sqlx::query(
            "SELECT id, user_id, project_id, start_date, end_date
            FROM roster.assignments WHERE user_id = $1 FOR UPDATE;",
        )
        .bind(assignment.user_id)
        .fetch_all(&mut *transaction)
        .await?;

        let existing: Vec<Assignment> = rows.iter().map(assignment_from_row).collect();
        if let Some(clash) =
            overlap::find_conflict(assignment.start_date, assignment.end_date, &existing)
        {
            return Err(StaffingError::Conflict {
                user_id: assignment.user_id,
                existing: Box::new(clash.clone()),
            });
        }

        let inserted = sqlx::query(
            "INSERT INTO roster.assignments (id, user_id, project_id, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5);",
        )
        .bind(assignment.id)
        .bind(assignment.user_id)
        .bind(assignment.project_id)
        .bind(assignment.start_date)
        .bind(assignment.end_date)
        .execute(&mut *transaction)
        .await;

        if let Err(e) = inserted {
            if is_exclusion_violation(&e) {
                drop(transaction);
                return Err(self.constraint_conflict(&assignment).await);
            }
            return Err(e.into());
        }

        transaction.commit().await?;
        Ok(assignment)
    }

    async fn replace(&self, assignment: Assignment) -> Result<Assignment, StaffingError> {
        let mut transaction = self.pool.begin().await?;

        let rows = sqlx::query(
            "SELECT id, user_id, project_id, start_date, end_date
            FROM roster.assignments WHERE user_id = $1 FOR UPDATE;",
        )
        .bind(assignment.user_id)
        .fetch_all(&mut *transaction)
        .await?;

        let stored: Vec<Assignment> = rows.iter().map(assignment_from_row).collect();
        if !stored.iter().any(|a| a.id == assignment.id) {
            return Err(StaffingError::AssignmentNotFound(assignment.id));
        }
        let others: Vec<Assignment> = stored
            .into_iter()
            .filter(|a| a.id != assignment.id)
            .collect();
        if let Some(clash) =
            overlap::find_conflict(assignment.start_date, assignment.end_date, &others)
        {
            return Err(StaffingError::Conflict {
                user_id: assignment.user_id,
                existing: Box::new(clash.clone()),
            });
        }

        let updated = sqlx::query(
            "UPDATE roster.assignments
            SET project_id = $2, start_date = $3, end_date = $4
            WHERE id = $1;",
        )
        .bind(assignment.id)
        .bind(assignment.project_id)
        .bind(assignment.start_date)
        .bind(assignment.end_date)
        .execute(&mut *transaction)
        .await;

        if let Err(e) = updated {
            if is_exclusion_violation(&e) {
                drop(transaction);
                return Err(self.constraint_conflict(&assignment).await);
            }
            return Err(e.into());
        }

        transaction.commit().await?;
        Ok(assignment)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StaffingError> {
        let result = sqlx::query("DELETE FROM roster.assignments WHERE id = $1;")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl PgBackend {
    /// After the exclusion constraint fired, look the competing row up so
    /// the conflict error can name it. The row committed before our write
    /// failed, so it is visible here; if it vanished in between, report
    /// the integrity trip as such.
    async fn constraint_conflict(&self, assignment: &Assignment) -> StaffingError {
        let row = sqlx::query(
            "SELECT id, user_id, project_id, start_date, end_date
            FROM roster.assignments
            WHERE user_id = $1 AND start_date <= $2 AND end_date >= $3
            LIMIT 1;",
        )
        .bind(assignment.user_id)
        .bind(assignment.end_date)
        .bind(assignment.start_date)
        .fetch_optional(&self.pool)
        .await;

        match row {
            Ok(Some(row)) => StaffingError::Conflict {
                user_id: assignment.user_id,
                existing: Box::new(assignment_from_row(&row)),
            },
            Ok(None) => StaffingError::Data(format!(
                "overlap constraint fired for user {} but no competing row is visible",
                assignment.user_id
            )),
            Err(e) => e.into(),
        }
    }
}
