pub mod app_config;

pub use app_config::{validate_production_config, AppConfig, PinataConfig};
