//! # slhd
//!
//! HTTP server and command line front end of the SLHD administration
//! backend. All program rules live in `slhd-core`; this crate adds
//! transport, configuration and caching.

pub mod api;
pub mod cli;
pub mod config;
