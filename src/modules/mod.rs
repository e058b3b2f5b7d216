pub mod auth;
pub mod levels;
pub mod questions;
pub mod sections;
pub mod users;
