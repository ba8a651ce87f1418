//! PostgreSQL repository functions, one module per table group

pub mod permission;
pub mod user;
