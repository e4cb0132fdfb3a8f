//! Startup and retry helpers shared by the backends.

pub mod bootstrap;
pub mod retry;
