//! # Object Cache Module
//!
//! Caching primitives shared by the playback and browsing layers.
//!
//! ## Overview
//!
//! This crate provides:
//! - `RecencyHeap`: lazy-deletion queue ordered by a logical clock, used to
//!   pick least-recently-touched eviction victims
//! - `PersistentCache`: key/value cache with a bounded memory tier and a
//!   write-through disk tier that survives restarts
//! - `CacheLayout`: key to file name mapping, including migration of the
//!   legacy naming scheme
//! - `SearchCache`: memoization of remote search results

pub mod codec;
pub mod error;
pub mod heap;
pub mod layout;
pub mod persistent;
pub mod search;

pub use codec::{Codec, JsonCodec};
pub use error::{CacheError, Result};
pub use heap::RecencyHeap;
pub use layout::{CacheLayout, Migration};
pub use persistent::{PersistentCache, PersistentCacheConfig};
pub use search::{SearchCache, SearchKey};
