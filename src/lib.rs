pub mod activities;
pub mod core;
pub mod custom_fields;
pub mod main_module;
pub mod sales;
pub mod tasks;

pub use crate::core::config::AppConfig;
pub use crate::core::shared::state::AppState;
pub use crate::main_module::build_router;
