pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod validation;

pub use db::DbPool;
pub use error::{CrmError, ErrorCode};
