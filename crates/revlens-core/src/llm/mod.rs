//! Model-client abstractions for revlens.
//!
//! - `ModelClient`: RPITIT trait for concrete provider implementations
//! - `BoxModelClient`: object-safe wrapper for dynamic dispatch
//! - `ModelClientFactory`: per-request client construction

pub mod box_client;
pub mod client;
pub mod factory;

pub use box_client::BoxModelClient;
pub use client::{EventStream, ModelClient};
pub use factory::ModelClientFactory;
