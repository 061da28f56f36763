//! Role resolvers.
//!
//! Turn the channel lists of an experiment configuration into electrode ids
//! through an `ElectrodeMap`. Order is preserved and duplicates are kept;
//! deduplication happens in `ElectrodeArrayConfig`.

use crate::electrode_map::{ElectrodeMap, MapError};
use mea_common::array::types::ElectrodeId;
use mea_common::consts::{N_ELECTRODES, N_MAP_COLUMNS};
use serde::{Deserialize, Serialize};

/// Electrodes recorded for motor output.
pub trait Motor {
    /// Sampling electrodes, in resolution order.
    fn sampling_electrodes(&self) -> &[ElectrodeId];
}

/// Electrodes recorded for sensor input, each paired with a stimulation
/// electrode.
pub trait Sensor {
    /// Sampling electrodes, in resolution order.
    fn sampling_electrodes(&self) -> &[ElectrodeId];

    /// Stimulation electrodes, index-aligned with the sampling electrodes.
    fn stimulation_electrodes(&self) -> &[ElectrodeId];
}

/// Pattern-indexed stimulation electrode sets.
pub trait Patterns {
    /// Number of patterns.
    fn n_patterns(&self) -> usize;

    /// Stimulation electrodes of `pattern`, `None` if out of range.
    fn stimulation_electrodes(&self, pattern: usize) -> Option<&[ElectrodeId]>;
}

fn resolve(map: &ElectrodeMap, channels: &[usize]) -> Result<Vec<ElectrodeId>, MapError> {
    channels
        .iter()
        .map(|&channel| map.electrode_of_channel(channel))
        .collect()
}

/// Motor resolved from map channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMotor {
    sampling_electrodes: Vec<ElectrodeId>,
}

impl ChannelMotor {
    /// Resolve `channels` on `map`.
    ///
    /// # Errors
    /// `MapError::ChannelOutOfRange` for any channel outside the map.
    pub fn new(map: &ElectrodeMap, channels: &[usize]) -> Result<Self, MapError> {
        Ok(Self {
            sampling_electrodes: resolve(map, channels)?,
        })
    }
}

impl Motor for ChannelMotor {
    fn sampling_electrodes(&self) -> &[ElectrodeId] {
        &self.sampling_electrodes
    }
}

/// Rectangle on the map grid, end-exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorBounds {
    /// First column.
    pub start_x: usize,
    /// First row.
    pub start_y: usize,
    /// Column past the last one.
    pub end_x: usize,
    /// Row past the last one.
    pub end_y: usize,
}

/// Motor covering a rectangular region of the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundsMotor {
    sampling_electrodes: Vec<ElectrodeId>,
}

impl BoundsMotor {
    /// Every electrode of `bounds` on `map`, row-major.
    pub fn new(map: &ElectrodeMap, bounds: MotorBounds) -> Self {
        Self {
            sampling_electrodes: map.region(bounds.start_x, bounds.start_y, bounds.end_x, bounds.end_y),
        }
    }
}

impl Motor for BoundsMotor {
    fn sampling_electrodes(&self) -> &[ElectrodeId] {
        &self.sampling_electrodes
    }
}

/// Sensor resolved from map channels.
///
/// The stimulation electrode of sampling electrode `e` is `e + 1 + N_MAP_COLUMNS`,
/// the diagonal neighbour one row below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSensor {
    sampling_electrodes: Vec<ElectrodeId>,
    stimulation_electrodes: Vec<ElectrodeId>,
}

impl ChannelSensor {
    /// Resolve `channels` on `map`.
    ///
    /// # Errors
    /// `ChannelOutOfRange`, or `StimulationElectrodeOutOfRange` when a sampling
    /// electrode sits on the last row of the array.
    pub fn new(map: &ElectrodeMap, channels: &[usize]) -> Result<Self, MapError> {
        let sampling_electrodes = resolve(map, channels)?;
        let stimulation_electrodes = sampling_electrodes
            .iter()
            .map(|&e| {
                let stim = e + 1 + N_MAP_COLUMNS as ElectrodeId;
                if stim as usize >= N_ELECTRODES {
                    Err(MapError::StimulationElectrodeOutOfRange(stim))
                } else {
                    Ok(stim)
                }
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            sampling_electrodes,
            stimulation_electrodes,
        })
    }
}

impl Sensor for ChannelSensor {
    fn sampling_electrodes(&self) -> &[ElectrodeId] {
        &self.sampling_electrodes
    }

    fn stimulation_electrodes(&self) -> &[ElectrodeId] {
        &self.stimulation_electrodes
    }
}

/// Patterns resolved from per-pattern map channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPatterns {
    electrodes: Vec<Vec<ElectrodeId>>,
}

impl ChannelPatterns {
    /// Resolve one channel list per pattern on `map`.
    pub fn new(map: &ElectrodeMap, pattern_channels: &[Vec<usize>]) -> Result<Self, MapError> {
        let electrodes = pattern_channels
            .iter()
            .map(|channels| resolve(map, channels))
            .collect::<Result<_, _>>()?;
        Ok(Self { electrodes })
    }
}

impl Patterns for ChannelPatterns {
    fn n_patterns(&self) -> usize {
        self.electrodes.len()
    }

    fn stimulation_electrodes(&self, pattern: usize) -> Option<&[ElectrodeId]> {
        self.electrodes.get(pattern).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::electrode_map::{DenseElectrodeMapFactory, ElectrodeMapFactory, SparseElectrodeMapFactory};

    #[test]
    fn channel_motor_keeps_order_and_duplicates() {
        let map = SparseElectrodeMapFactory::default().create().unwrap();
        let motor = ChannelMotor::new(&map, &[3, 0, 3]).unwrap();
        let e0 = map.electrode_of_channel(0).unwrap();
        let e3 = map.electrode_of_channel(3).unwrap();
        assert_eq!(motor.sampling_electrodes(), &[e3, e0, e3]);
    }

    #[test]
    fn channel_motor_rejects_unknown_channel() {
        let map = SparseElectrodeMapFactory::default().create().unwrap();
        let err = ChannelMotor::new(&map, &[0, map.n_channels()]).unwrap_err();
        assert!(matches!(err, MapError::ChannelOutOfRange { .. }));
    }

    #[test]
    fn bounds_motor_covers_region() {
        let map = DenseElectrodeMapFactory.create().unwrap();
        let motor = BoundsMotor::new(
            &map,
            MotorBounds {
                start_x: 10,
                start_y: 2,
                end_x: 12,
                end_y: 4,
            },
        );
        assert_eq!(motor.sampling_electrodes(), &[450, 451, 670, 671]);
    }

    #[test]
    fn sensor_pairs_diagonal_neighbour() {
        let map = SparseElectrodeMapFactory::default().create().unwrap();
        let sensor = ChannelSensor::new(&map, &[0, 5]).unwrap();
        for (s, t) in sensor
            .sampling_electrodes()
            .iter()
            .zip(sensor.stimulation_electrodes())
        {
            assert_eq!(*t, s + 221);
        }
    }

    #[test]
    fn sensor_on_last_row_has_no_stimulation_electrode() {
        let map = DenseElectrodeMapFactory.create().unwrap();
        let last = N_ELECTRODES - 1;
        assert!(matches!(
            ChannelSensor::new(&map, &[last]),
            Err(MapError::StimulationElectrodeOutOfRange(_))
        ));
    }

    #[test]
    fn patterns_are_indexed() {
        let map = DenseElectrodeMapFactory.create().unwrap();
        let patterns = ChannelPatterns::new(&map, &[vec![1, 2], vec![], vec![7]]).unwrap();
        assert_eq!(patterns.n_patterns(), 3);
        assert_eq!(patterns.stimulation_electrodes(0), Some(&[1, 2][..]));
        assert_eq!(patterns.stimulation_electrodes(1), Some(&[][..]));
        assert_eq!(patterns.stimulation_electrodes(3), None);
    }
}
