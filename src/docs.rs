use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use schoolyard_core::{PaginationMeta, StoredMedia};

use crate::modules::audit_logs::model::{ActorSnapshot, AuditAction, AuditLog, RoleSnapshot};
use crate::modules::auth::model::{ChangePasswordRequest, CurrentUser, LoginRequest};
use crate::modules::cities::model::{City, CreateCityDto, UpdateCityDto};
use crate::modules::classes::model::{Class, CreateClassDto, UpdateClassDto};
use crate::modules::countries::model::{Country, CreateCountryDto, UpdateCountryDto};
use crate::modules::exams::model::{CreateExamDto, Exam, UpdateExamDto};
use crate::modules::permissions::model::{CreatePermissionDto, Permission, UpdatePermissionDto};
use crate::modules::profiles::model::{CreateProfileDto, Profile, UpdateProfileDto};
use crate::modules::roles::model::{
    CreateRoleDto, PermissionSummary, Role, RoleWithPermissions, SetRolePermissionsDto,
    UpdateRoleDto,
};
use crate::modules::sections::model::{CreateSectionDto, Section, UpdateSectionDto};
use crate::modules::shared::Gender;
use crate::modules::states::model::{CreateStateDto, State, UpdateStateDto};
use crate::modules::students::model::{CreateStudentDto, Student, UpdateStudentDto};
use crate::modules::subjects::model::{CreateSubjectDto, Subject, UpdateSubjectDto};
use crate::modules::uploads::model::ImageUploadForm;
use crate::modules::users::model::{CreateUserDto, ResetPasswordDto, UpdateUserDto, User};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::auth::controller::login,
        crate::modules::auth::controller::logout,
        crate::modules::auth::controller::me,
        crate::modules::auth::controller::change_password,
        crate::modules::roles::controller::create_role,
        crate::modules::roles::controller::list_roles,
        crate::modules::roles::controller::get_role,
        crate::modules::roles::controller::update_role,
        crate::modules::roles::controller::delete_role,
        crate::modules::roles::controller::set_role_permissions,
        crate::modules::permissions::controller::create_permission,
        crate::modules::permissions::controller::list_permissions,
        crate::modules::permissions::controller::get_permission,
        crate::modules::permissions::controller::update_permission,
        crate::modules::permissions::controller::delete_permission,
        crate::modules::users::controller::create_user,
        crate::modules::users::controller::list_users,
        crate::modules::users::controller::get_user,
        crate::modules::users::controller::update_user,
        crate::modules::users::controller::delete_user,
        crate::modules::users::controller::reset_user_password,
        crate::modules::profiles::controller::create_profile,
        crate::modules::profiles::controller::list_profiles,
        crate::modules::profiles::controller::get_my_profile,
        crate::modules::profiles::controller::update_my_profile,
        crate::modules::profiles::controller::get_profile,
        crate::modules::profiles::controller::update_profile,
        crate::modules::profiles::controller::delete_profile,
        crate::modules::profiles::controller::upload_profile_avatar,
        crate::modules::countries::controller::create_country,
        crate::modules::countries::controller::list_countries,
        crate::modules::countries::controller::get_country,
        crate::modules::countries::controller::update_country,
        crate::modules::countries::controller::delete_country,
        crate::modules::states::controller::create_state,
        crate::modules::states::controller::list_states,
        crate::modules::states::controller::get_state,
        crate::modules::states::controller::update_state,
        crate::modules::states::controller::delete_state,
        crate::modules::cities::controller::create_city,
        crate::modules::cities::controller::list_cities,
        crate::modules::cities::controller::get_city,
        crate::modules::cities::controller::update_city,
        crate::modules::cities::controller::delete_city,
        crate::modules::classes::controller::create_class,
        crate::modules::classes::controller::list_classes,
        crate::modules::classes::controller::get_class,
        crate::modules::classes::controller::update_class,
        crate::modules::classes::controller::delete_class,
        crate::modules::sections::controller::create_section,
        crate::modules::sections::controller::list_sections,
        crate::modules::sections::controller::get_section,
        crate::modules::sections::controller::update_section,
        crate::modules::sections::controller::delete_section,
        crate::modules::subjects::controller::create_subject,
        crate::modules::subjects::controller::list_subjects,
        crate::modules::subjects::controller::get_subject,
        crate::modules::subjects::controller::update_subject,
        crate::modules::subjects::controller::delete_subject,
        crate::modules::students::controller::create_student,
        crate::modules::students::controller::list_students,
        crate::modules::students::controller::get_student,
        crate::modules::students::controller::update_student,
        crate::modules::students::controller::delete_student,
        crate::modules::students::controller::upload_student_photo,
        crate::modules::exams::controller::create_exam,
        crate::modules::exams::controller::list_exams,
        crate::modules::exams::controller::get_exam,
        crate::modules::exams::controller::update_exam,
        crate::modules::exams::controller::delete_exam,
        crate::modules::uploads::controller::upload_image,
        crate::modules::audit_logs::controller::list_audit_logs,
        crate::modules::audit_logs::controller::get_audit_log,
    ),
    components(
        schemas(
            CurrentUser,
            LoginRequest,
            ChangePasswordRequest,
            Role,
            RoleWithPermissions,
            PermissionSummary,
            CreateRoleDto,
            UpdateRoleDto,
            SetRolePermissionsDto,
            Permission,
            CreatePermissionDto,
            UpdatePermissionDto,
            User,
            CreateUserDto,
            UpdateUserDto,
            ResetPasswordDto,
            Profile,
            CreateProfileDto,
            UpdateProfileDto,
            Gender,
            Country,
            CreateCountryDto,
            UpdateCountryDto,
            State,
            CreateStateDto,
            UpdateStateDto,
            City,
            CreateCityDto,
            UpdateCityDto,
            Class,
            CreateClassDto,
            UpdateClassDto,
            Section,
            CreateSectionDto,
            UpdateSectionDto,
            Subject,
            CreateSubjectDto,
            UpdateSubjectDto,
            Student,
            CreateStudentDto,
            UpdateStudentDto,
            Exam,
            CreateExamDto,
            UpdateExamDto,
            StoredMedia,
            ImageUploadForm,
            AuditLog,
            AuditAction,
            ActorSnapshot,
            RoleSnapshot,
            PaginationMeta,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Session sign-in and password changes"),
        (name = "Roles", description = "Roles and the permissions they grant"),
        (name = "Permissions", description = "Permission catalogue"),
        (name = "Users", description = "User accounts"),
        (name = "Profiles", description = "Personal details of users"),
        (name = "Countries", description = "Countries"),
        (name = "States", description = "States within countries"),
        (name = "Cities", description = "Cities within states"),
        (name = "Classes", description = "Classes"),
        (name = "Sections", description = "Sections within classes"),
        (name = "Subjects", description = "Subjects taught in classes"),
        (name = "Students", description = "Student records"),
        (name = "Exams", description = "Exams per class and subject"),
        (name = "Uploads", description = "Image uploads"),
        (name = "Audit logs", description = "Read-only audit trail")
    ),
    info(
        title = "Schoolyard API",
        version = "0.1.0",
        description = "School administration REST API built with Rust, Axum and PostgreSQL, using cookie-backed sessions and role-based permissions.",
        license(
            name = "MIT"
        )
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("sid"))),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_resource_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/auth/login",
            "/api/roles/{key}/permissions",
            "/api/users/{key}/password",
            "/api/profiles/me",
            "/api/students/{key}/photo",
            "/api/uploads/images",
            "/api/audit-logs",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn test_session_cookie_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("session_cookie"));
    }
}
