//! Explicit acting-employee identity passed into every engine call.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Workflow role of an acting employee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Drafter,
    Filer,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Drafter => ROLE_DRAFTER,
            Self::Filer => ROLE_FILER,
            Self::Admin => ROLE_ADMIN,
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role-name string for drafters.
pub const ROLE_DRAFTER: &str = "drafter";
/// Role-name string for filers.
pub const ROLE_FILER: &str = "filer";
/// Role-name string for administrators.
pub const ROLE_ADMIN: &str = "admin";

/// Parses a role name as stored by the surrounding application.
///
/// Matching is case-insensitive; `administrator` is accepted as `admin`.
pub fn parse_role(value: &str) -> Result<Role, RoleParseError> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "" => Err(RoleParseError::EmptyRole),
        ROLE_DRAFTER => Ok(Role::Drafter),
        ROLE_FILER => Ok(Role::Filer),
        ROLE_ADMIN | "administrator" => Ok(Role::Admin),
        _ => Err(RoleParseError::UnsupportedRole(value.trim().to_string())),
    }
}

/// Role-name parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleParseError {
    EmptyRole,
    UnsupportedRole(String),
}

impl Display for RoleParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyRole => write!(f, "role name must not be empty"),
            Self::UnsupportedRole(value) => {
                write!(f, "unsupported role `{value}`; expected drafter|filer|admin")
            }
        }
    }
}

impl Error for RoleParseError {}

/// Acting employee: display name plus role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }

    pub fn drafter(name: impl Into<String>) -> Self {
        Self::new(name, Role::Drafter)
    }

    pub fn filer(name: impl Into<String>) -> Self {
        Self::new(name, Role::Filer)
    }

    pub fn admin(name: impl Into<String>) -> Self {
        Self::new(name, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_role, Role, RoleParseError};

    #[test]
    fn parse_role_is_case_insensitive() {
        assert_eq!(parse_role(" Drafter "), Ok(Role::Drafter));
        assert_eq!(parse_role("FILER"), Ok(Role::Filer));
        assert_eq!(parse_role("Administrator"), Ok(Role::Admin));
    }

    #[test]
    fn parse_role_rejects_unknown_names() {
        assert_eq!(parse_role("  "), Err(RoleParseError::EmptyRole));
        assert_eq!(
            parse_role("reviewer"),
            Err(RoleParseError::UnsupportedRole("reviewer".to_string()))
        );
    }
}
