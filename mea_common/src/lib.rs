//! MEA Common Library
//!
//! This crate provides shared constants, configuration loading utilities and the
//! hardware-facing traits used by all MEA workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Array geometry, sampling and stimulation limits
//! - [`config`] - Configuration loading traits and types
//! - [`array`] - Electrode array driver trait, routing configuration, recording
//! - [`stim`] - Stimulation program model and DAC code conversion
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! Add to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! mea_common = { path = "../mea_common" }
//! ```
//!
//! Then import:
//! ```rust
//! use mea_common::consts::*;
//! use mea_common::config::{ConfigLoader, SharedConfig};
//! ```

pub mod array;
pub mod config;
pub mod consts;
pub mod prelude;
pub mod stim;
