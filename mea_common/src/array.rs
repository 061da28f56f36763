//! Electrode array hardware surface.
//!
//! This module contains the types shared between the array controller and
//! the hardware drivers:
//! - [`types`] - Electrode and stimulation unit identifiers
//! - [`driver`] - `ArrayDriver` capability trait and `ArrayError`
//! - [`routing`] - Textual channel/electrode routing configuration
//! - [`saving`] - Recording start/stop interface

pub mod driver;
pub mod routing;
pub mod saving;
pub mod types;
