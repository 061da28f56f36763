//! Textual routing configuration.
//!
//! The array reports its routing as `channel(electrode)x_pos/y_pos;...`, e.g.
//! `0(5387)1872.5/420;1(11362)2485/892.5;`. Positions are in µm.

use super::driver::ArrayError;
use super::types::ElectrodeId;
use crate::consts::N_MAP_COLUMNS;
use core::fmt;
use core::str::FromStr;
use std::collections::HashMap;

/// One routed channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutingEntry {
    /// Recording channel.
    pub channel: u32,
    /// Electrode routed to the channel.
    pub electrode: ElectrodeId,
    /// X position (µm).
    pub x: f64,
    /// Y position (µm).
    pub y: f64,
}

/// Channel ↔ electrode routing of the array.
#[derive(Debug, Clone, Default)]
pub struct RoutingConfig {
    entries: Vec<RoutingEntry>,
    by_channel: HashMap<u32, usize>,
    by_electrode: HashMap<ElectrodeId, usize>,
}

impl RoutingConfig {
    /// Build from entries. Later duplicates of a channel or electrode win the lookup.
    pub fn from_entries(entries: Vec<RoutingEntry>) -> Self {
        let mut by_channel = HashMap::with_capacity(entries.len());
        let mut by_electrode = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            by_channel.insert(entry.channel, idx);
            by_electrode.insert(entry.electrode, idx);
        }
        Self {
            entries,
            by_channel,
            by_electrode,
        }
    }

    /// Identity routing for `n_channels` channels: channel `i` on electrode `i`,
    /// positioned on the grid (not hardware coherent).
    pub fn identity(n_channels: u32) -> Self {
        let entries = (0..n_channels)
            .map(|channel| RoutingEntry {
                channel,
                electrode: channel,
                x: (channel as usize % N_MAP_COLUMNS) as f64,
                y: (channel as usize / N_MAP_COLUMNS) as f64,
            })
            .collect();
        Self::from_entries(entries)
    }

    /// All entries in file order.
    pub fn entries(&self) -> &[RoutingEntry] {
        &self.entries
    }

    /// Number of routed channels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is routed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Channel recording `electrode`.
    pub fn channel_for_electrode(&self, electrode: ElectrodeId) -> Option<u32> {
        self.by_electrode
            .get(&electrode)
            .map(|&idx| self.entries[idx].channel)
    }

    /// Electrode routed to `channel`.
    pub fn electrode_for_channel(&self, channel: u32) -> Option<ElectrodeId> {
        self.by_channel
            .get(&channel)
            .map(|&idx| self.entries[idx].electrode)
    }

    /// Position (µm) of `electrode`.
    pub fn position_of_electrode(&self, electrode: ElectrodeId) -> Option<(f64, f64)> {
        self.by_electrode.get(&electrode).map(|&idx| {
            let entry = &self.entries[idx];
            (entry.x, entry.y)
        })
    }

    /// Channels for `electrodes`, skipping unrouted ones.
    pub fn channels_for_electrodes(&self, electrodes: &[ElectrodeId]) -> Vec<u32> {
        electrodes
            .iter()
            .filter_map(|&e| self.channel_for_electrode(e))
            .collect()
    }

    /// Electrodes for `channels`, skipping unrouted ones.
    pub fn electrodes_for_channels(&self, channels: &[u32]) -> Vec<ElectrodeId> {
        channels
            .iter()
            .filter_map(|&c| self.electrode_for_channel(c))
            .collect()
    }
}

fn parse_entry(raw: &str) -> Result<RoutingEntry, ArrayError> {
    let err = || ArrayError::RoutingConfig(format!("malformed entry {raw:?}"));

    let (channel, rest) = raw.split_once('(').ok_or_else(err)?;
    let (electrode, position) = rest.split_once(')').ok_or_else(err)?;
    let (x, y) = position.split_once('/').ok_or_else(err)?;

    Ok(RoutingEntry {
        channel: channel.trim().parse().map_err(|_| err())?,
        electrode: electrode.trim().parse().map_err(|_| err())?,
        x: x.trim().parse().map_err(|_| err())?,
        y: y.trim().parse().map_err(|_| err())?,
    })
}

impl FromStr for RoutingConfig {
    type Err = ArrayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let entries = s
            .split(';')
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(parse_entry)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_entries(entries))
    }
}

impl fmt::Display for RoutingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            write!(
                f,
                "{}({}){}/{};",
                entry.channel, entry.electrode, entry.x, entry.y
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "0(5387)1872.5/420;1(11362)2485/892.5;";

    #[test]
    fn parses_vendor_format() {
        let cfg: RoutingConfig = SAMPLE.parse().unwrap();
        assert_eq!(cfg.len(), 2);
        assert_eq!(cfg.electrode_for_channel(1), Some(11362));
        assert_eq!(cfg.channel_for_electrode(5387), Some(0));
        assert_eq!(cfg.position_of_electrode(11362), Some((2485.0, 892.5)));
        assert_eq!(cfg.channel_for_electrode(42), None);
    }

    #[test]
    fn display_round_trips() {
        let cfg: RoutingConfig = SAMPLE.parse().unwrap();
        let again: RoutingConfig = cfg.to_string().parse().unwrap();
        assert_eq!(again.entries(), cfg.entries());
    }

    #[test]
    fn rejects_malformed_entries() {
        assert!("0[5387]1/2;".parse::<RoutingConfig>().is_err());
        assert!("0(5387)1872.5;".parse::<RoutingConfig>().is_err());
        assert!("x(1)1/2;".parse::<RoutingConfig>().is_err());
    }

    #[test]
    fn empty_text_is_empty_routing() {
        let cfg: RoutingConfig = " ; ".parse().unwrap();
        assert!(cfg.is_empty());
    }

    #[test]
    fn identity_places_channels_on_grid() {
        let cfg = RoutingConfig::identity(1024);
        assert_eq!(cfg.len(), 1024);
        assert_eq!(cfg.electrode_for_channel(221), Some(221));
        assert_eq!(cfg.position_of_electrode(221), Some((1.0, 1.0)));
    }

    #[test]
    fn bulk_lookups_skip_unrouted() {
        let cfg: RoutingConfig = SAMPLE.parse().unwrap();
        assert_eq!(cfg.channels_for_electrodes(&[11362, 3, 5387]), vec![1, 0]);
        assert_eq!(cfg.electrodes_for_channels(&[0, 9]), vec![5387]);
    }
}
