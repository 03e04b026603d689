//! Permission constants for the Schoolyard API.
//!
//! Permission names follow `resource:action`. [`CATALOGUE`] is the full set
//! the CLI synchronises into the `permissions` table.
//!
//! # Example
//!
//! ```ignore
//! use schoolyard_core::permissions;
//!
//! if auth_user.has_permission(permissions::STUDENTS_CREATE) {
//!     // Create student
//! }
//! ```

// =============================================================================
// Access control
// =============================================================================

pub const ROLES_CREATE: &str = "roles:create";
pub const ROLES_READ: &str = "roles:read";
pub const ROLES_UPDATE: &str = "roles:update";
pub const ROLES_DELETE: &str = "roles:delete";

pub const PERMISSIONS_CREATE: &str = "permissions:create";
pub const PERMISSIONS_READ: &str = "permissions:read";
pub const PERMISSIONS_UPDATE: &str = "permissions:update";
pub const PERMISSIONS_DELETE: &str = "permissions:delete";

pub const USERS_CREATE: &str = "users:create";
pub const USERS_READ: &str = "users:read";
pub const USERS_UPDATE: &str = "users:update";
pub const USERS_DELETE: &str = "users:delete";

pub const PROFILES_CREATE: &str = "profiles:create";
pub const PROFILES_READ: &str = "profiles:read";
pub const PROFILES_UPDATE: &str = "profiles:update";
pub const PROFILES_DELETE: &str = "profiles:delete";

// =============================================================================
// Geography
// =============================================================================

pub const COUNTRIES_CREATE: &str = "countries:create";
pub const COUNTRIES_READ: &str = "countries:read";
pub const COUNTRIES_UPDATE: &str = "countries:update";
pub const COUNTRIES_DELETE: &str = "countries:delete";

pub const STATES_CREATE: &str = "states:create";
pub const STATES_READ: &str = "states:read";
pub const STATES_UPDATE: &str = "states:update";
pub const STATES_DELETE: &str = "states:delete";

pub const CITIES_CREATE: &str = "cities:create";
pub const CITIES_READ: &str = "cities:read";
pub const CITIES_UPDATE: &str = "cities:update";
pub const CITIES_DELETE: &str = "cities:delete";

// =============================================================================
// Academics
// =============================================================================

pub const CLASSES_CREATE: &str = "classes:create";
pub const CLASSES_READ: &str = "classes:read";
pub const CLASSES_UPDATE: &str = "classes:update";
pub const CLASSES_DELETE: &str = "classes:delete";

pub const SECTIONS_CREATE: &str = "sections:create";
pub const SECTIONS_READ: &str = "sections:read";
pub const SECTIONS_UPDATE: &str = "sections:update";
pub const SECTIONS_DELETE: &str = "sections:delete";

pub const SUBJECTS_CREATE: &str = "subjects:create";
pub const SUBJECTS_READ: &str = "subjects:read";
pub const SUBJECTS_UPDATE: &str = "subjects:update";
pub const SUBJECTS_DELETE: &str = "subjects:delete";

pub const STUDENTS_CREATE: &str = "students:create";
pub const STUDENTS_READ: &str = "students:read";
pub const STUDENTS_UPDATE: &str = "students:update";
pub const STUDENTS_DELETE: &str = "students:delete";

pub const EXAMS_CREATE: &str = "exams:create";
pub const EXAMS_READ: &str = "exams:read";
pub const EXAMS_UPDATE: &str = "exams:update";
pub const EXAMS_DELETE: &str = "exams:delete";

// =============================================================================
// System
// =============================================================================

pub const AUDIT_LOGS_READ: &str = "audit_logs:read";
pub const UPLOADS_CREATE: &str = "uploads:create";

/// Every permission the API checks: `(name, module, description)`.
pub const CATALOGUE: &[(&str, &str, &str)] = &[
    (ROLES_CREATE, "roles", "Create roles"),
    (ROLES_READ, "roles", "View roles"),
    (ROLES_UPDATE, "roles", "Update roles and their permissions"),
    (ROLES_DELETE, "roles", "Delete roles"),
    (PERMISSIONS_CREATE, "permissions", "Create permissions"),
    (PERMISSIONS_READ, "permissions", "View permissions"),
    (PERMISSIONS_UPDATE, "permissions", "Update permissions"),
    (PERMISSIONS_DELETE, "permissions", "Delete permissions"),
    (USERS_CREATE, "users", "Create users"),
    (USERS_READ, "users", "View users"),
    (USERS_UPDATE, "users", "Update users and reset passwords"),
    (USERS_DELETE, "users", "Delete users"),
    (PROFILES_CREATE, "profiles", "Create profiles"),
    (PROFILES_READ, "profiles", "View profiles"),
    (PROFILES_UPDATE, "profiles", "Update profiles"),
    (PROFILES_DELETE, "profiles", "Delete profiles"),
    (COUNTRIES_CREATE, "countries", "Create countries"),
    (COUNTRIES_READ, "countries", "View countries"),
    (COUNTRIES_UPDATE, "countries", "Update countries"),
    (COUNTRIES_DELETE, "countries", "Delete countries"),
    (STATES_CREATE, "states", "Create states"),
    (STATES_READ, "states", "View states"),
    (STATES_UPDATE, "states", "Update states"),
    (STATES_DELETE, "states", "Delete states"),
    (CITIES_CREATE, "cities", "Create cities"),
    (CITIES_READ, "cities", "View cities"),
    (CITIES_UPDATE, "cities", "Update cities"),
    (CITIES_DELETE, "cities", "Delete cities"),
    (CLASSES_CREATE, "classes", "Create classes"),
    (CLASSES_READ, "classes", "View classes"),
    (CLASSES_UPDATE, "classes", "Update classes"),
    (CLASSES_DELETE, "classes", "Delete classes"),
    (SECTIONS_CREATE, "sections", "Create sections"),
    (SECTIONS_READ, "sections", "View sections"),
    (SECTIONS_UPDATE, "sections", "Update sections"),
    (SECTIONS_DELETE, "sections", "Delete sections"),
    (SUBJECTS_CREATE, "subjects", "Create subjects"),
    (SUBJECTS_READ, "subjects", "View subjects"),
    (SUBJECTS_UPDATE, "subjects", "Update subjects"),
    (SUBJECTS_DELETE, "subjects", "Delete subjects"),
    (STUDENTS_CREATE, "students", "Create students"),
    (STUDENTS_READ, "students", "View students"),
    (STUDENTS_UPDATE, "students", "Update students"),
    (STUDENTS_DELETE, "students", "Delete students"),
    (EXAMS_CREATE, "exams", "Create exams"),
    (EXAMS_READ, "exams", "View exams"),
    (EXAMS_UPDATE, "exams", "Update exams"),
    (EXAMS_DELETE, "exams", "Delete exams"),
    (AUDIT_LOGS_READ, "audit_logs", "View the audit trail"),
    (UPLOADS_CREATE, "uploads", "Upload images to the media host"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalogue_names_are_unique() {
        let names: HashSet<_> = CATALOGUE.iter().map(|(name, _, _)| *name).collect();
        assert_eq!(names.len(), CATALOGUE.len());
    }

    #[test]
    fn test_catalogue_module_matches_name_prefix() {
        for (name, module, _) in CATALOGUE {
            let (resource, action) = name.split_once(':').expect("resource:action");
            assert_eq!(resource, *module);
            assert!(!action.is_empty());
        }
    }
}
