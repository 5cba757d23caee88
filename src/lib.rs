//! Food label compliance check client
//!
//! Uploads label images to the analysis service one at a time, follows
//! deferred analyses by polling their task status, and reports every job
//! transition to a pluggable observer.

pub mod config;
pub mod models;
pub mod orchestrator;
pub mod services;

pub use orchestrator::{Orchestrator, ProcessorState};
