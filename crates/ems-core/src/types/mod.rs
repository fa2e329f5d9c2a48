//! Core types shared by the gateway and the CLI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a role name is not one of the known roles.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

/// Account role as issued by the EMS backend.
///
/// The wire form is the upper-case name (`ADMIN`, `HR`, `EMPLOYEE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// System administrator.
    Admin,
    /// Human resources staff.
    Hr,
    /// Regular employee.
    Employee,
}

impl Role {
    /// All known roles.
    pub const ALL: [Self; 3] = [Self::Admin, Self::Hr, Self::Employee];

    /// Upper-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Hr => "HR",
            Self::Employee => "EMPLOYEE",
        }
    }

    /// Landing page for this role.
    #[must_use]
    pub const fn dashboard_path(self) -> &'static str {
        match self {
            Self::Admin => "/admin/dashboard",
            Self::Hr => "/hr/dashboard",
            Self::Employee => "/employee/dashboard",
        }
    }

    /// Login page where this role signs in.
    #[must_use]
    pub const fn login_path(self) -> &'static str {
        match self {
            Self::Admin => "/admin/login",
            Self::Hr | Self::Employee => "/auth/login",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    /// Exact match on the wire name; `hr` or ` HR` is not a role.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Identity resolved from a credential by the identity service.
///
/// Recomputed on every gated request and never persisted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Authoritative role of the caller.
    pub role: Role,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Email or admin username.
    #[serde(default)]
    pub email: Option<String>,
    /// Department (employees only).
    #[serde(default)]
    pub department: Option<String>,
    /// Job title (employees only).
    #[serde(default)]
    pub job_role: Option<String>,
}

impl Identity {
    /// Identity carrying only a role.
    #[must_use]
    pub const fn with_role(role: Role) -> Self {
        Self {
            role,
            name: None,
            email: None,
            department: None,
            job_role: None,
        }
    }
}
