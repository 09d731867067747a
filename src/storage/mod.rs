//! Storage backends for the value cache and the environment index.
//!
//! - [`redis::RedisStore`]: production backend, one connection shared by both
//!   contracts.
//! - [`memory::InMemoryStore`]: in-process backend with read helpers, used by
//!   tests and embedders that do not run Redis.

pub mod memory;
pub mod redis;
pub mod traits;
