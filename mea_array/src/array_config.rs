//! Electrode array configuration.
//!
//! Aggregates the role electrode sets into the sampling universe and assigns
//! recording channel indices. Immutable once built.

use crate::roles::{Motor, Patterns, Sensor};
use mea_common::array::types::ElectrodeId;
use thiserror::Error;

/// Error types for configuration construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArrayConfigError {
    /// A role electrode has no sampling channel
    #[error("Electrode {0} has no sampling channel")]
    UnassignedElectrode(ElectrodeId),
}

/// Sampling and stimulation electrode sets of one experiment.
///
/// Sampling channels are contiguous from 0 and assigned by ascending
/// electrode id over `motor ∪ sensor`. An electrode used by both roles maps
/// to a single channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectrodeArrayConfig {
    pattern_stimulation_electrodes: Vec<Vec<ElectrodeId>>,
    motor_sampling_electrodes: Vec<ElectrodeId>,
    sensor_sampling_electrodes: Vec<ElectrodeId>,
    sensor_stimulation_electrodes: Vec<ElectrodeId>,
    sampling_electrodes: Vec<ElectrodeId>,
    motor_sampling_channels: Vec<usize>,
    sensor_sampling_channels: Vec<usize>,
}

fn channels_of(
    sampling_electrodes: &[ElectrodeId],
    electrodes: &[ElectrodeId],
) -> Result<Vec<usize>, ArrayConfigError> {
    electrodes
        .iter()
        .map(|&e| {
            sampling_electrodes
                .binary_search(&e)
                .map_err(|_| ArrayConfigError::UnassignedElectrode(e))
        })
        .collect()
}

impl ElectrodeArrayConfig {
    /// Build from raw electrode sets.
    pub fn new(
        pattern_stimulation_electrodes: Vec<Vec<ElectrodeId>>,
        motor_sampling_electrodes: Vec<ElectrodeId>,
        sensor_sampling_electrodes: Vec<ElectrodeId>,
        sensor_stimulation_electrodes: Vec<ElectrodeId>,
    ) -> Result<Self, ArrayConfigError> {
        let mut sampling_electrodes: Vec<ElectrodeId> = sensor_sampling_electrodes
            .iter()
            .chain(&motor_sampling_electrodes)
            .copied()
            .collect();
        sampling_electrodes.sort_unstable();
        sampling_electrodes.dedup();

        let motor_sampling_channels = channels_of(&sampling_electrodes, &motor_sampling_electrodes)?;
        let sensor_sampling_channels =
            channels_of(&sampling_electrodes, &sensor_sampling_electrodes)?;

        Ok(Self {
            pattern_stimulation_electrodes,
            motor_sampling_electrodes,
            sensor_sampling_electrodes,
            sensor_stimulation_electrodes,
            sampling_electrodes,
            motor_sampling_channels,
            sensor_sampling_channels,
        })
    }

    /// Build from role resolvers.
    pub fn create(
        patterns: &dyn Patterns,
        motor: &dyn Motor,
        sensor: &dyn Sensor,
    ) -> Result<Self, ArrayConfigError> {
        let pattern_stimulation_electrodes = (0..patterns.n_patterns())
            .map(|p| {
                patterns
                    .stimulation_electrodes(p)
                    .map(<[ElectrodeId]>::to_vec)
                    .unwrap_or_default()
            })
            .collect();
        Self::new(
            pattern_stimulation_electrodes,
            motor.sampling_electrodes().to_vec(),
            sensor.sampling_electrodes().to_vec(),
            sensor.stimulation_electrodes().to_vec(),
        )
    }

    /// Motor sampling electrodes in role order.
    pub fn motor_sampling_electrodes(&self) -> &[ElectrodeId] {
        &self.motor_sampling_electrodes
    }

    /// Sensor sampling electrodes in role order.
    pub fn sensor_sampling_electrodes(&self) -> &[ElectrodeId] {
        &self.sensor_sampling_electrodes
    }

    /// Electrodes the sensor stimulates through.
    pub fn sensor_stimulation_electrodes(&self) -> &[ElectrodeId] {
        &self.sensor_stimulation_electrodes
    }

    /// Sorted, de-duplicated union of motor and sensor sampling electrodes.
    pub fn sampling_electrodes(&self) -> &[ElectrodeId] {
        &self.sampling_electrodes
    }

    /// All sampling channel indices, `0..sampling_electrodes().len()`.
    pub fn sampling_channels(&self) -> std::ops::Range<usize> {
        0..self.sampling_electrodes.len()
    }

    /// Channel of each motor sampling electrode.
    pub fn motor_sampling_channels(&self) -> &[usize] {
        &self.motor_sampling_channels
    }

    /// Channel of each sensor sampling electrode.
    pub fn sensor_sampling_channels(&self) -> &[usize] {
        &self.sensor_sampling_channels
    }

    /// Number of stimulation patterns.
    pub fn n_patterns(&self) -> usize {
        self.pattern_stimulation_electrodes.len()
    }

    /// Stimulation electrodes of `pattern`, `None` if out of range.
    pub fn pattern_stimulation_electrodes(&self, pattern: usize) -> Option<&[ElectrodeId]> {
        self.pattern_stimulation_electrodes
            .get(pattern)
            .map(Vec::as_slice)
    }

    /// Every stimulation electrode: sensor ones first, then each pattern.
    pub fn stimulation_electrodes(&self) -> impl Iterator<Item = ElectrodeId> + '_ {
        self.sensor_stimulation_electrodes
            .iter()
            .chain(self.pattern_stimulation_electrodes.iter().flatten())
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::electrode_map::{ElectrodeMapFactory, SparseElectrodeMapFactory};
    use crate::roles::{ChannelMotor, ChannelPatterns, ChannelSensor};

    #[test]
    fn shared_electrode_gets_one_channel() {
        let config =
            ElectrodeArrayConfig::new(vec![], vec![30, 10, 20], vec![20, 5], vec![226, 5 + 221])
                .unwrap();
        assert_eq!(config.sampling_electrodes(), &[5, 10, 20, 30]);
        assert_eq!(config.sampling_channels(), 0..4);
        assert_eq!(config.motor_sampling_channels(), &[3, 1, 2]);
        assert_eq!(config.sensor_sampling_channels(), &[2, 0]);
    }

    #[test]
    fn channel_count_is_union_of_roles() {
        let motor = vec![40, 7, 40, 12, 3, 7];
        let sensor = vec![12, 99, 3, 3, 50];
        let config =
            ElectrodeArrayConfig::new(vec![], motor.clone(), sensor.clone(), vec![]).unwrap();

        let mut union: Vec<ElectrodeId> = motor.iter().chain(&sensor).copied().collect();
        union.sort_unstable();
        union.dedup();
        assert_eq!(config.sampling_channels().len(), union.len());
        assert_eq!(config.sampling_electrodes(), union.as_slice());

        // channels follow their electrodes, duplicates included
        assert_eq!(config.motor_sampling_channels().len(), motor.len());
        for (&electrode, &channel) in motor.iter().zip(config.motor_sampling_channels()) {
            assert_eq!(config.sampling_electrodes()[channel], electrode);
        }
        for (&electrode, &channel) in sensor.iter().zip(config.sensor_sampling_channels()) {
            assert_eq!(config.sampling_electrodes()[channel], electrode);
        }
    }

    #[test]
    fn empty_roles_give_no_channels() {
        let config = ElectrodeArrayConfig::new(vec![vec![1]], vec![], vec![], vec![]).unwrap();
        assert!(config.sampling_electrodes().is_empty());
        assert!(config.sampling_channels().is_empty());
        assert_eq!(config.n_patterns(), 1);
    }

    #[test]
    fn create_from_resolvers() {
        let map = SparseElectrodeMapFactory::default().create().unwrap();
        let motor = ChannelMotor::new(&map, &[0, 1, 2]).unwrap();
        let sensor = ChannelSensor::new(&map, &[2, 100]).unwrap();
        let patterns = ChannelPatterns::new(&map, &[vec![50, 51], vec![60]]).unwrap();

        let config = ElectrodeArrayConfig::create(&patterns, &motor, &sensor).unwrap();
        assert_eq!(config.sampling_electrodes().len(), 4);
        assert_eq!(config.n_patterns(), 2);
        assert_eq!(
            config.pattern_stimulation_electrodes(1),
            Some(&[map.electrode_of_channel(60).unwrap()][..])
        );
        assert_eq!(config.pattern_stimulation_electrodes(2), None);
        assert_eq!(config.stimulation_electrodes().count(), 5);
        for &ch in config
            .motor_sampling_channels()
            .iter()
            .chain(config.sensor_sampling_channels())
        {
            assert!(config.sampling_channels().contains(&ch));
        }
    }
}
