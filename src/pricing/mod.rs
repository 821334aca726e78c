//! Pricing engine.
//!
//! Pure price computation over a resource's pricing table. Nothing in this
//! module performs I/O; the quote route reaches storage through the booking
//! service.

pub mod calculators;
pub mod models;
pub mod requests;
pub mod responses;
pub mod routes;
pub mod services;

pub use calculators::round_money;
pub use routes::router;
pub use services::{compute_price, PricingError};
