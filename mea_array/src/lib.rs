//! # MEA Array
//!
//! Electrode mapping, role resolution and control of the electrode array
//! with a pluggable driver architecture.
//!
//! Drivers implement the `ArrayDriver` trait defined in
//! `mea_common::array::driver`.
//!
//! # Module Structure
//!
//! - [`electrode_map`] - Electrode grid, channel ordering, map factories
//! - [`roles`] - Motor, sensor and pattern resolvers
//! - [`array_config`] - Sampling universe and channel assignment
//! - [`controller`] - Routing and stimulation unit lifecycle
//! - [`driver_registry`] - Driver factory registration
//! - [`drivers`] - Built-in array drivers
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                          mea_array                             │
//! │  ┌──────────────┐   ┌──────────────┐   ┌────────────────────┐  │
//! │  │ ElectrodeMap │──►│    Roles     │──►│ElectrodeArrayConfig│  │
//! │  └──────────────┘   └──────────────┘   └─────────┬──────────┘  │
//! │                                                  ▼             │
//! │  ┌─────────────────┐               ┌──────────────────────────┐│
//! │  │ Driver Registry │──────────────►│ ElectrodeArrayController ││
//! │  └─────────────────┘               └────────────┬─────────────┘│
//! │                                                 ▼              │
//! │                                      ┌──────────────────┐      │
//! │                                      │   ArrayDriver    │      │
//! │                                      │   (trait object) │      │
//! │                                      └──────────────────┘      │
//! └────────────────────────────────────────────────────────────────┘
//! ```

pub mod array_config;
pub mod controller;
pub mod driver_registry;
pub mod drivers;
pub mod electrode_map;
pub mod roles;

// Re-export key types for convenience
pub use crate::array_config::{ArrayConfigError, ElectrodeArrayConfig};
pub use crate::controller::{ControllerState, ElectrodeArrayController, init_array};
pub use crate::driver_registry::DriverRegistry;
pub use crate::electrode_map::{
    DenseElectrodeMapFactory, ElectrodeMap, ElectrodeMapFactory, MapError,
    SparseElectrodeMapFactory,
};
pub use crate::roles::{
    BoundsMotor, ChannelMotor, ChannelPatterns, ChannelSensor, Motor, MotorBounds, Patterns,
    Sensor,
};
