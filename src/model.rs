pub mod assignment;
pub mod project;
pub mod response;
pub mod user;
