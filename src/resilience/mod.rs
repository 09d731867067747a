//! Resilience helpers for store commands.

pub mod retry;
