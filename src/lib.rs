// Public API for integration tests and potential library usage

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod persist;
pub mod scoring;
pub mod state;
pub mod store;
pub mod types;
