//! Core types for cache operations

mod element;

pub use element::{never_expires, ticks_from_datetime, ticks_to_datetime, CacheElement};
