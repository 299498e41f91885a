pub mod alert_repo;
pub mod app_config;
pub mod database;

pub use alert_repo::SqliteAlertRepository;
pub use database::DbClient;
