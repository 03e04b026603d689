//! Small helpers shared by the feature services.

use anyhow::anyhow;
use schoolyard_core::{AppError, EntityKind};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Stored as lowercase text, matching the `gender` CHECK constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }
}

pub fn not_found(kind: EntityKind) -> AppError {
    AppError::not_found(anyhow!("{} not found", kind.label()))
}

/// Trims a required text field, refusing values that are blank once trimmed.
pub fn clean(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::bad_request(anyhow!("{} must not be blank", field)));
    }
    Ok(value.to_string())
}

/// Resolves an `allow_deletion` update. Protection, once on, cannot be lifted.
pub fn deletion_flag(current: bool, requested: Option<bool>) -> Result<bool, AppError> {
    match requested {
        Some(true) if !current => Err(AppError::forbidden("Deletion protection cannot be removed")),
        Some(flag) => Ok(flag),
        None => Ok(current),
    }
}

/// Trims an optional text field; blank becomes `None`.
pub fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Applies a partial update to a nullable text column: absent keeps the
/// current value, an empty string clears it.
pub fn merge_optional(update: Option<String>, current: Option<String>) -> Option<String> {
    match update {
        Some(value) => clean_optional(Some(value)),
        None => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_trims_and_rejects_blank() {
        assert_eq!(clean("name", "  Grade 1 ").unwrap(), "Grade 1");

        let err = clean("name", "   ").unwrap_err();
        assert_eq!(err.status.as_u16(), 400);
        assert_eq!(err.public_message(), "name must not be blank");
    }

    #[test]
    fn test_deletion_flag() {
        assert!(deletion_flag(true, None).unwrap());
        assert!(!deletion_flag(true, Some(false)).unwrap());
        assert!(!deletion_flag(false, None).unwrap());
        assert!(!deletion_flag(false, Some(false)).unwrap());

        let err = deletion_flag(false, Some(true)).unwrap_err();
        assert_eq!(err.status.as_u16(), 403);
    }

    #[test]
    fn test_clean_optional() {
        assert_eq!(clean_optional(Some("  Grade 1 ".into())), Some("Grade 1".into()));
        assert_eq!(clean_optional(Some("   ".into())), None);
        assert_eq!(clean_optional(None), None);
    }

    #[test]
    fn test_merge_optional() {
        let current = Some("old".to_string());
        assert_eq!(merge_optional(None, current.clone()), current);
        assert_eq!(merge_optional(Some("".into()), current.clone()), None);
        assert_eq!(merge_optional(Some(" new ".into()), current), Some("new".into()));
    }

    #[test]
    fn test_gender_wire_format() {
        assert_eq!(serde_json::to_string(&Gender::Female).unwrap(), r#""female""#);
        assert_eq!(serde_json::from_str::<Gender>(r#""other""#).unwrap(), Gender::Other);
        assert!(serde_json::from_str::<Gender>(r#""Male""#).is_err());
        assert_eq!(Gender::Male.as_str(), "male");
    }

    #[test]
    fn test_not_found_message() {
        let err = not_found(EntityKind::Section);
        assert_eq!(err.status.as_u16(), 404);
        assert_eq!(err.public_message(), "Section not found");
    }
}
