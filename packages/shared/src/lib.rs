//! Shared utilities for the zashiki workspace.

pub mod logger;
