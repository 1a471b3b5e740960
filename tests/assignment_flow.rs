//! End-to-end service tests against the in-memory backend, covering the
//! conflict rules, role-shaped create responses, the role-scoped queries,
//! and the concurrent-create guarantee.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use roster::model::assignment::{Assignment, AssignmentUpdate, NewAssignment};
use roster::model::project::Project;
use roster::model::response::CreatedAssignment;
use roster::model::user::{Role, User};
use roster::store::memory::MemoryBackend;
use roster::{AssignmentService, StaffingError};

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, d, 0, 0, 0).unwrap()
}

fn user(role: Role, name: &str) -> User {
    User {
        id: Uuid::new_v4(),
        username: name.into(),
        email: format!("{name}@example.com"),
        role,
    }
}

struct Fixture {
    service: AssignmentService,
    backend: Arc<MemoryBackend>,
    manager: User,
    admin: User,
    worker: User,
    project: Project,
}

async fn fixture() -> Fixture {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let backend = Arc::new(MemoryBackend::new());
    let manager = user(Role::ProjectManager, "petra");
    let admin = user(Role::Admin, "astrid");
    let worker = user(Role::Employee, "elliot");
    let project = Project {
        id: Uuid::new_v4(),
        name: "apollo".into(),
        referring_employee_id: manager.id,
    };

    backend.add_user(manager.clone()).await;
    backend.add_user(admin.clone()).await;
    backend.add_user(worker.clone()).await;
    backend.add_project(project.clone()).await;

    let service = AssignmentService::new(backend.clone(), backend.clone(), backend.clone());
    Fixture {
        service,
        backend,
        manager,
        admin,
        worker,
        project,
    }
}

fn new_assignment(f: &Fixture, start: u32, end: u32) -> NewAssignment {
    NewAssignment {
        user_id: f.worker.id,
        project_id: f.project.id,
        start_date: day(start),
        end_date: day(end),
    }
}

#[tokio::test]
async fn manager_create_returns_bare_assignment() {
    let f = fixture().await;

    let created = f
        .service
        .create(new_assignment(&f, 1, 10), &f.manager)
        .await
        .expect("create");

    let CreatedAssignment::Assignment(saved) = created else {
        panic!("expected bare assignment for a project manager");
    };
    assert_eq!(saved.user_id, f.worker.id);
    assert_eq!(saved.project_id, f.project.id);
    assert_eq!(f.service.assignments_for(&f.worker).await.unwrap(), vec![saved]);
}

#[tokio::test]
async fn admin_create_embeds_user_project_and_referring_employee() {
    let f = fixture().await;

    let created = f
        .service
        .create(new_assignment(&f, 1, 10), &f.admin)
        .await
        .expect("create");

    let CreatedAssignment::AdminView(view) = created else {
        panic!("expected enriched view for an admin");
    };
    assert_eq!(view.user.id, f.worker.id);
    assert_eq!(view.project.project.id, f.project.id);
    assert_eq!(view.project.referring_employee.id, f.manager.id);

    // The wire shape spreads the assignment fields at the top level and
    // nests the related records.
    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["user_id"], serde_json::json!(f.worker.id));
    assert_eq!(json["user"]["username"], serde_json::json!("elliot"));
    assert_eq!(
        json["project"]["referring_employee"]["username"],
        serde_json::json!("petra")
    );
}

#[tokio::test]
async fn employee_cannot_create_assignments() {
    let f = fixture().await;

    let err = f
        .service
        .create(new_assignment(&f, 1, 10), &f.worker)
        .await
        .unwrap_err();
    assert!(matches!(err, StaffingError::Forbidden(_)));
    assert!(f.service.assignments_for(&f.worker).await.unwrap().is_empty());
}

#[tokio::test]
async fn touching_endpoints_conflict_but_disjoint_ranges_do_not() {
    let f = fixture().await;
    f.service
        .create(new_assignment(&f, 1, 10), &f.manager)
        .await
        .expect("seed");

    // [10, 20] shares exactly one instant with [1, 10].
    let err = f
        .service
        .create(new_assignment(&f, 10, 20), &f.manager)
        .await
        .unwrap_err();
    let StaffingError::Conflict { user_id, existing } = err else {
        panic!("expected conflict, got something else");
    };
    assert_eq!(user_id, f.worker.id);
    assert_eq!(existing.start_date, day(1));

    // [11, 20] is disjoint and goes through.
    f.service
        .create(new_assignment(&f, 11, 20), &f.manager)
        .await
        .expect("disjoint range accepted");
}

#[tokio::test]
async fn containment_conflicts_in_both_directions() {
    let f = fixture().await;
    f.service
        .create(new_assignment(&f, 5, 15), &f.manager)
        .await
        .expect("seed");

    let inside = f
        .service
        .create(new_assignment(&f, 7, 9), &f.manager)
        .await
        .unwrap_err();
    assert!(matches!(inside, StaffingError::Conflict { .. }));

    let around = f
        .service
        .create(new_assignment(&f, 1, 20), &f.manager)
        .await
        .unwrap_err();
    assert!(matches!(around, StaffingError::Conflict { .. }));
}

#[tokio::test]
async fn single_point_assignments_are_valid_and_checked() {
    let f = fixture().await;
    f.service
        .create(new_assignment(&f, 5, 5), &f.manager)
        .await
        .expect("single-point assignment is valid");

    let err = f
        .service
        .create(new_assignment(&f, 1, 5), &f.manager)
        .await
        .unwrap_err();
    assert!(matches!(err, StaffingError::Conflict { .. }));

    f.service
        .create(new_assignment(&f, 6, 6), &f.manager)
        .await
        .expect("adjacent single point accepted");
}

#[tokio::test]
async fn unknown_user_or_project_fail_before_any_write() {
    let f = fixture().await;

    let ghost = Uuid::new_v4();
    let err = f
        .service
        .create(
            NewAssignment {
                user_id: ghost,
                project_id: f.project.id,
                start_date: day(1),
                end_date: day(10),
            },
            &f.manager,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StaffingError::UserNotFound(id) if id == ghost));

    let err = f
        .service
        .create(
            NewAssignment {
                user_id: f.worker.id,
                project_id: Uuid::new_v4(),
                start_date: day(1),
                end_date: day(10),
            },
            &f.manager,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StaffingError::ProjectNotFound(_)));

    assert!(f.service.assignments_for(&f.worker).await.unwrap().is_empty());
}

#[tokio::test]
async fn inverted_range_is_rejected() {
    let f = fixture().await;
    let err = f
        .service
        .create(new_assignment(&f, 10, 1), &f.manager)
        .await
        .unwrap_err();
    assert!(matches!(err, StaffingError::InvalidRange { .. }));
}

#[tokio::test]
async fn concurrent_overlapping_creates_admit_at_most_one() {
    let f = fixture().await;

    let first = f.service.clone();
    let second = f.service.clone();
    let manager = f.manager.clone();
    let a = new_assignment(&f, 1, 10);
    let b = new_assignment(&f, 5, 15);

    let (left, right) = tokio::join!(
        tokio::spawn({
            let manager = manager.clone();
            async move { first.create(a, &manager).await }
        }),
        tokio::spawn(async move { second.create(b, &manager).await }),
    );
    let left = left.unwrap();
    let right = right.unwrap();

    let successes = [&left, &right].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one concurrent create may commit");
    let loser = if left.is_err() { left } else { right };
    assert!(matches!(
        loser.unwrap_err(),
        StaffingError::Conflict { .. }
    ));
    assert_eq!(f.service.assignments_for(&f.worker).await.unwrap().len(), 1);
}

#[tokio::test]
async fn find_on_date_includes_both_boundaries() {
    let f = fixture().await;
    let created = f
        .service
        .create(new_assignment(&f, 1, 10), &f.manager)
        .await
        .expect("seed");
    let CreatedAssignment::Assignment(saved) = created else {
        panic!("bare assignment expected");
    };

    for d in [1, 5, 10] {
        let found = f.service.find_on_date(f.worker.id, day(d)).await.unwrap();
        assert_eq!(found.id, saved.id);
    }

    let err = f.service.find_on_date(f.worker.id, day(11)).await.unwrap_err();
    assert!(matches!(err, StaffingError::NoAssignmentOnDate { .. }));
}

#[tokio::test]
async fn overlapping_stored_rows_surface_as_data_error() {
    let f = fixture().await;

    // Seed state that violates the invariant, bypassing the checked insert.
    for (start, end) in [(1, 10), (5, 15)] {
        f.backend
            .insert_unchecked(Assignment {
                id: Uuid::new_v4(),
                user_id: f.worker.id,
                project_id: f.project.id,
                start_date: day(start),
                end_date: day(end),
            })
            .await;
    }

    let err = f.service.find_on_date(f.worker.id, day(7)).await.unwrap_err();
    assert!(matches!(err, StaffingError::Data(_)));
}

#[tokio::test]
async fn employee_lookup_is_scoped_to_their_projects() {
    let f = fixture().await;

    // Worker is on "apollo"; a colleague is on an unrelated project.
    let colleague = user(Role::Employee, "casper");
    let other_project = Project {
        id: Uuid::new_v4(),
        name: "borealis".into(),
        referring_employee_id: f.manager.id,
    };
    f.backend.add_user(colleague.clone()).await;
    f.backend.add_project(other_project.clone()).await;

    f.service
        .create(new_assignment(&f, 1, 10), &f.manager)
        .await
        .expect("worker on apollo");
    let created = f
        .service
        .create(
            NewAssignment {
                user_id: colleague.id,
                project_id: other_project.id,
                start_date: day(1),
                end_date: day(10),
            },
            &f.manager,
        )
        .await
        .expect("colleague on borealis");
    let CreatedAssignment::Assignment(foreign) = created else {
        panic!("bare assignment expected");
    };

    let err = f.service.find_one(foreign.id, &f.worker).await.unwrap_err();
    assert!(matches!(err, StaffingError::Forbidden(_)));

    // Managers and admins are unrestricted.
    assert_eq!(
        f.service.find_one(foreign.id, &f.admin).await.unwrap().id,
        foreign.id
    );

    let err = f.service.find_one(Uuid::new_v4(), &f.admin).await.unwrap_err();
    assert!(matches!(err, StaffingError::AssignmentNotFound(_)));
}

#[tokio::test]
async fn manager_assignment_on_date_follows_the_referring_employee() {
    let f = fixture().await;
    f.service
        .create(new_assignment(&f, 1, 10), &f.manager)
        .await
        .expect("seed");

    let hit = f
        .service
        .manager_assignment_on_date(f.manager.id, day(5))
        .await
        .unwrap();
    assert!(hit.is_some());

    assert!(f
        .service
        .manager_assignment_on_date(Uuid::new_v4(), day(5))
        .await
        .unwrap()
        .is_none());
    assert!(f
        .service
        .manager_assignment_on_date(f.manager.id, day(11))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn own_projects_deduplicates_and_all_projects_is_role_gated() {
    let f = fixture().await;
    f.service
        .create(new_assignment(&f, 1, 10), &f.manager)
        .await
        .expect("first stint");
    f.service
        .create(new_assignment(&f, 20, 25), &f.manager)
        .await
        .expect("second stint, same project");

    let own = f.service.own_projects(&f.worker).await.unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].id, f.project.id);

    let err = f.service.all_projects(&f.worker).await.unwrap_err();
    assert!(matches!(err, StaffingError::Forbidden(_)));
    assert_eq!(f.service.all_projects(&f.manager).await.unwrap().len(), 1);
}

#[tokio::test]
async fn update_rechecks_overlap_but_excludes_itself() {
    let f = fixture().await;
    let created = f
        .service
        .create(new_assignment(&f, 1, 10), &f.manager)
        .await
        .expect("seed");
    let CreatedAssignment::Assignment(saved) = created else {
        panic!("bare assignment expected");
    };
    f.service
        .create(new_assignment(&f, 20, 25), &f.manager)
        .await
        .expect("second range");

    // Growing into its own current range is fine.
    let stretched = f
        .service
        .update(
            saved.id,
            AssignmentUpdate {
                end_date: Some(day(12)),
                ..Default::default()
            },
            &f.manager,
        )
        .await
        .expect("extend within free space");
    assert_eq!(stretched.end_date, day(12));

    // Growing into the second range is not.
    let err = f
        .service
        .update(
            saved.id,
            AssignmentUpdate {
                end_date: Some(day(20)),
                ..Default::default()
            },
            &f.manager,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StaffingError::Conflict { .. }));

    let err = f
        .service
        .update(saved.id, AssignmentUpdate::default(), &f.worker)
        .await
        .unwrap_err();
    assert!(matches!(err, StaffingError::Forbidden(_)));
}

#[tokio::test]
async fn remove_is_role_gated_and_reports_missing_rows() {
    let f = fixture().await;
    let created = f
        .service
        .create(new_assignment(&f, 1, 10), &f.manager)
        .await
        .expect("seed");
    let CreatedAssignment::Assignment(saved) = created else {
        panic!("bare assignment expected");
    };

    let err = f.service.remove(saved.id, &f.worker).await.unwrap_err();
    assert!(matches!(err, StaffingError::Forbidden(_)));

    f.service.remove(saved.id, &f.manager).await.expect("removed");
    let err = f.service.remove(saved.id, &f.manager).await.unwrap_err();
    assert!(matches!(err, StaffingError::AssignmentNotFound(_)));

    // The freed range can be assigned again.
    f.service
        .create(new_assignment(&f, 1, 10), &f.manager)
        .await
        .expect("range is free again");
}
