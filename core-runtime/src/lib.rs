//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the caching core:
//! - Logging and tracing infrastructure
//! - Configuration for the media and object caches
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the cache crates depend on.
//! It establishes the logging conventions and the validated settings types
//! from which each cache derives its own configuration.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{CacheSettings, ObjectCacheSettings, TrackCacheSettings};
pub use error::{Error, Result};
