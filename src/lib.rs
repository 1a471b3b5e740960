//! Project staffing core.
//!
//! Users are assigned to projects over closed date intervals, and two
//! assignments for the same user must never intersect, endpoints included.
//! [`assignment::AssignmentService`] runs that check when creating or
//! updating an assignment and shapes the result by the acting user's role.
//! User and project resolution and assignment persistence sit behind the
//! traits in [`store`]; an in-memory backend and a Postgres backend are
//! provided.
//!
//! Transport, authentication, and session handling are the hosting
//! application's concern. The authenticated principal is passed explicitly
//! into every service call.

pub mod assignment;
pub mod error;
pub mod model;
pub mod store;

pub use assignment::AssignmentService;
pub use error::StaffingError;
