//! Observability setup for revlens.
//!
//! Owns the global `tracing` subscriber: structured logs on stderr, an
//! optional JSON format, and optional OpenTelemetry span export.

pub mod tracing_setup;
