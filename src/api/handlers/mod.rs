//! Route handlers for the public and internal surfaces, plus shared input checks.

pub mod health;
pub mod login;
pub mod password;
pub mod permissions;
pub mod register;
pub mod session;
pub mod state;


use regex::Regex;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::api::error::ApiError;

/// Lightweight email sanity check used before persisting data.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// Request body of `/login` and `/register`.
///
/// Fields are optional so a missing field is reported as 400 by the handler
/// rather than rejected by the extractor with a different status.
#[derive(ToSchema, Deserialize)]
pub struct Credentials {
    #[schema(example = "root@example.com")]
    email: Option<String>,
    #[schema(example = "rootpass")]
    password: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    /// Split into `(email, password)`, rejecting missing or empty fields.
    pub(crate) fn into_parts(self) -> Result<(String, String), ApiError> {
        let email = self.email.filter(|value| !value.is_empty());
        let password = self.password.filter(|value| !value.is_empty());
        match (email, password) {
            (Some(email), Some(password)) => Ok((email, password)),
            (None, _) => Err(ApiError::BadRequest("missing email")),
            (_, None) => Err(ApiError::BadRequest("missing password")),
        }
    }
}

#[cfg(test)]
mod validation_tests {
    use super::*;

    #[test]
    fn valid_email_accepts_common_addresses() {
        assert!(valid_email("root@example.com"));
        assert!(valid_email("first.last+tag@sub.example.org"));
    }

    #[test]
    fn valid_email_rejects_malformed_addresses() {
        for email in ["", "root", "root@", "@example.com", "root@example", "a b@c.d"] {
            assert!(!valid_email(email), "accepted {email:?}");
        }
    }

    #[test]
    fn credentials_require_both_fields() {
        let missing = Credentials {
            email: Some("a@b.c".to_string()),
            password: None,
        };
        assert!(matches!(missing.into_parts(), Err(ApiError::BadRequest(_))));

        let empty = Credentials {
            email: Some(String::new()),
            password: Some("pw".to_string()),
        };
        assert!(matches!(empty.into_parts(), Err(ApiError::BadRequest(_))));

        let full = Credentials {
            email: Some("a@b.c".to_string()),
            password: Some("pw".to_string()),
        };
        assert!(full.into_parts().is_ok());
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let credentials = Credentials {
            email: Some("a@b.c".to_string()),
            password: Some("hunter2".to_string()),
        };
        assert!(!format!("{credentials:?}").contains("hunter2"));
    }
}
