//! DDx configuration library
//!
//! This module exports the layered configuration loader and the `ddx`
//! command-line surface built on it.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
