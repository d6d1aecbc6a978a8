//! Isenguard - Rate Limiting and IP Block-List Service
//!
//! This crate gates incoming work by scope (caller IP, tenant id, user id)
//! and realm (named limit policy) using fixed time windows, and can block
//! abusive source addresses outright. Counters and the block list live in a
//! shared store; when that store is unreachable every check fails open, so
//! the application keeps running without protection instead of refusing
//! all traffic.

pub mod cleanup;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod limiter;
pub mod realm;
pub mod service;
pub mod store;
