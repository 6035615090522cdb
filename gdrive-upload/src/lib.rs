pub mod config;
pub mod token_provider;
pub mod upload;
