use std::env;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// When true, unverified accounts cannot log in. The email flow still
    /// issues tokens on registration either way.
    pub require_verified_login: bool,
    /// Lifetime of the 6-digit verification/reset code, in minutes.
    pub verification_code_ttl_minutes: i64,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        Self {
            require_verified_login: env::var("AUTH_REQUIRE_VERIFIED_LOGIN")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),
            verification_code_ttl_minutes: env::var("VERIFICATION_CODE_TTL_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            require_verified_login: true,
            verification_code_ttl_minutes: 30,
        }
    }
}
