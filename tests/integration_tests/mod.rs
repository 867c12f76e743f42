//! Integration tests module
//!
//! End-to-end tests against a scripted calendar widget:
//! - Complete scrape → classify → synchronize pipeline
//! - Orchestrated runs over a catalog, with injected failures

pub mod orchestrator_test;
pub mod pipeline_test;
