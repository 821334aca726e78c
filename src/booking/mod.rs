//! Booking availability, orchestration and status transitions.
//!
//! Layout mirrors the pricing module: plain models and pure logic
//! (`calendar`, `availability`, `transitions`), the storage seam (`store`,
//! `memory`), the orchestrator (`service`) and the HTTP surface (`requests`,
//! `responses`, `routes`).

pub mod availability;
pub mod calendar;
pub mod locks;
pub mod memory;
pub mod models;
pub mod requests;
pub mod responses;
pub mod routes;
pub mod service;
pub mod store;
pub mod transitions;

pub use availability::Availability;
pub use calendar::{DateRange, ReservationCalendar};
pub use memory::InMemoryStore;
pub use models::{Actor, Booking, BookingStatus, PaymentStatus, Resource, ResourceKind};
pub use routes::router;
pub use service::{BookingService, Quote};
pub use store::{BookingStore, InsertOutcome, ResourceStore, StoreError};
