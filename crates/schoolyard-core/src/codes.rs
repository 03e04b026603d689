//! Entity kinds and business codes.
//!
//! Every record is addressed externally by a human-readable business code of
//! the form `<PREFIX>-<uuid>` (for example `CLASS-4a0b...`), distinct from
//! its primary key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Role,
    Permission,
    User,
    Profile,
    City,
    State,
    Country,
    Class,
    Section,
    Subject,
    Student,
    Exam,
    AuditLog,
}

impl EntityKind {
    pub const ALL: [EntityKind; 13] = [
        Self::Role,
        Self::Permission,
        Self::User,
        Self::Profile,
        Self::City,
        Self::State,
        Self::Country,
        Self::Class,
        Self::Section,
        Self::Subject,
        Self::Student,
        Self::Exam,
        Self::AuditLog,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Role => "ROLE",
            Self::Permission => "PERM",
            Self::User => "USER",
            Self::Profile => "PROFILE",
            Self::City => "CITY",
            Self::State => "STATE",
            Self::Country => "COUNTRY",
            Self::Class => "CLASS",
            Self::Section => "SECTION",
            Self::Subject => "SUBJECT",
            Self::Student => "STUDENT",
            Self::Exam => "EXAM",
            Self::AuditLog => "AUDIT",
        }
    }

    /// Identifier stored in audit records and accepted by filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::Permission => "permission",
            Self::User => "user",
            Self::Profile => "profile",
            Self::City => "city",
            Self::State => "state",
            Self::Country => "country",
            Self::Class => "class",
            Self::Section => "section",
            Self::Subject => "subject",
            Self::Student => "student",
            Self::Exam => "exam",
            Self::AuditLog => "audit_log",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Self::Role => "roles",
            Self::Permission => "permissions",
            Self::User => "users",
            Self::Profile => "profiles",
            Self::City => "cities",
            Self::State => "states",
            Self::Country => "countries",
            Self::Class => "classes",
            Self::Section => "sections",
            Self::Subject => "subjects",
            Self::Student => "students",
            Self::Exam => "exams",
            Self::AuditLog => "audit_logs",
        }
    }

    /// Capitalised name used in messages ("Class not found").
    pub fn label(&self) -> &'static str {
        match self {
            Self::Role => "Role",
            Self::Permission => "Permission",
            Self::User => "User",
            Self::Profile => "Profile",
            Self::City => "City",
            Self::State => "State",
            Self::Country => "Country",
            Self::Class => "Class",
            Self::Section => "Section",
            Self::Subject => "Subject",
            Self::Student => "Student",
            Self::Exam => "Exam",
            Self::AuditLog => "Audit log",
        }
    }

    /// Generates a fresh business code for this kind.
    pub fn new_code(&self) -> String {
        format!("{}-{}", self.prefix(), Uuid::new_v4())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown entity kind: {}", s))
    }
}

/// How a path segment addresses a record: by primary key or by business code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKey {
    Id(Uuid),
    Code(String),
}

impl EntityKey {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match Uuid::parse_str(raw) {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Code(raw.to_string()),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Code(code) => f.write_str(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_code_has_prefix_and_uuid() {
        for kind in EntityKind::ALL {
            let code = kind.new_code();
            let suffix = code
                .strip_prefix(&format!("{}-", kind.prefix()))
                .unwrap_or_else(|| panic!("{} lacks the {} prefix", code, kind));
            assert!(Uuid::parse_str(suffix).is_ok());
        }
    }

    #[test]
    fn test_codes_are_unique() {
        assert_ne!(EntityKind::Class.new_code(), EntityKind::Class.new_code());
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
        assert!("teacher".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&EntityKind::AuditLog).unwrap(),
            r#""audit_log""#
        );
    }

    #[test]
    fn test_entity_key_parse() {
        let id = Uuid::new_v4();
        assert_eq!(EntityKey::parse(&id.to_string()), EntityKey::Id(id));

        let code = EntityKind::Exam.new_code();
        assert_eq!(EntityKey::parse(&code), EntityKey::Code(code.clone()));
        assert_eq!(EntityKey::parse(&format!(" {} ", code)).to_string(), code);
    }
}
