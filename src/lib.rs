pub mod config;
pub mod cover;
pub mod error;
pub mod input;
