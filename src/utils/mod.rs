//! Utility modules for the LinguaZone API.
//!
//! - [`email`]: SMTP delivery of verification and reset codes
//! - [`errors`]: Application error type and taxonomy
//! - [`jwt`]: Access/refresh token creation and verification
//! - [`password`]: Password hashing and verification
//! - [`upload`]: Multipart form parsing helpers

pub mod email;
pub mod errors;
pub mod jwt;
pub mod password;
pub mod upload;
