//! Vercel REST client with a persistent, TTL-based freshness cache.

pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod logging;
pub mod vercel;
