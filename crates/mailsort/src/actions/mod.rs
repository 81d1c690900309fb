//! Label actions module
//!
//! Provides the handlers that create destination labels and move
//! classified messages into them.

mod handler;

pub use handler::{ActionHandler, DomainOutcome, SortReport};
