//! Configuration modules for the LinguaZone API.
//!
//! Each submodule handles one aspect of configuration, loaded from
//! environment variables with sensible development defaults.
//!
//! # Modules
//!
//! - [`auth`]: Verification-code and login policy configuration
//! - [`cors`]: CORS allowed origins
//! - [`database`]: PostgreSQL connection pool initialization
//! - [`email`]: SMTP configuration for verification and reset emails
//! - [`jwt`]: JWT secret and token lifetimes
//! - [`storage`]: Media upload directory and size limits

pub mod auth;
pub mod cors;
pub mod database;
pub mod email;
pub mod jwt;
pub mod storage;
