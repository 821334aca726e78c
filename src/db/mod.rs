//! Postgres persistence

pub mod models;
pub mod queries;

pub use queries::PgStore;
