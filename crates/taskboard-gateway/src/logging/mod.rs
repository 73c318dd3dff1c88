//! Logging utilities
//!
//! Request correlation and structured spans for the gateway.

mod trace_context;

pub use trace_context::{generate_trace_id, RequestSpan, TraceContext};
