use std::fmt;

use serde::{Deserialize, Serialize};

use super::IncidentCategory;
use crate::error::AppError;

const ADMIN_PREFIX: &str = "admin_";

/// Closed set of roles. A sector admin carries its sector explicitly, so visibility
/// never has to re-derive it from the role string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    User,
    SystemAdmin,
    SectorAdmin(IncidentCategory),
}

impl Role {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let token = raw.trim().to_ascii_lowercase();
        match token.as_str() {
            "user" => Ok(Self::User),
            "admin_system" => Ok(Self::SystemAdmin),
            other => other
                .strip_prefix(ADMIN_PREFIX)
                .and_then(IncidentCategory::from_token)
                .map(Self::SectorAdmin)
                .ok_or_else(|| {
                    AppError::invalid_parameter(
                        "role",
                        raw,
                        "expected user|admin_system|admin_hardware|admin_software|admin_network|admin_security",
                    )
                }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::SystemAdmin => "admin_system",
            Self::SectorAdmin(IncidentCategory::Hardware) => "admin_hardware",
            Self::SectorAdmin(IncidentCategory::Software) => "admin_software",
            Self::SectorAdmin(IncidentCategory::Network) => "admin_network",
            Self::SectorAdmin(IncidentCategory::Security) => "admin_security",
        }
    }

    pub fn sector(&self) -> Option<IncidentCategory> {
        match self {
            Self::SectorAdmin(category) => Some(*category),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        !matches!(self, Self::User)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Role {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

/// The authenticated identity a request runs as. Constructed by the outer service;
/// construction is the only place role/sector consistency is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub role: Role,
}

impl Actor {
    /// Build an actor from the raw `(id, role, sector)` triple of the user record.
    ///
    /// `sector` is only consulted for sector admins: when present it must name the same
    /// category as the role suffix (case-insensitive, so `"Network"` is accepted).
    pub fn new(id: i64, role: &str, sector: Option<&str>) -> Result<Self, AppError> {
        let role = Role::parse(role)?;
        if let (Some(expected), Some(raw_sector)) = (role.sector(), sector) {
            match IncidentCategory::from_token(raw_sector) {
                Some(found) if found == expected => {}
                _ => {
                    return Err(AppError::invalid_parameter(
                        "sector",
                        raw_sector,
                        format!("sector does not match role {role}"),
                    ))
                }
            }
        }
        Ok(Self { id, role })
    }

    pub fn user(id: i64) -> Self {
        Self { id, role: Role::User }
    }

    pub fn system_admin(id: i64) -> Self {
        Self {
            id,
            role: Role::SystemAdmin,
        }
    }

    pub fn sector_admin(id: i64, sector: IncidentCategory) -> Self {
        Self {
            id,
            role: Role::SectorAdmin(sector),
        }
    }

    pub fn sector(&self) -> Option<IncidentCategory> {
        self.role.sector()
    }
}
