//! Database models split into domain-specific modules.

pub mod client;
pub mod common;
pub mod contract;
pub mod event;
pub mod user;

pub use client::*;
pub use common::*;
pub use contract::*;
pub use event::*;
pub use user::*;
