pub mod config;
pub mod config_scope;
