//! VMI agent: HTTP surface and configuration
//!
//! Split from the binary so the router can be exercised in integration tests.

pub mod api;
pub mod config;
