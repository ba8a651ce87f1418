//! Domain logic for authentication and authorization

pub mod auth;
