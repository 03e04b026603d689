pub mod audit_logs;
pub mod auth;
pub mod cities;
pub mod classes;
pub mod countries;
pub mod exams;
pub mod permissions;
pub mod profiles;
pub mod roles;
pub mod sections;
pub mod shared;
pub mod states;
pub mod students;
pub mod subjects;
pub mod uploads;
pub mod users;
