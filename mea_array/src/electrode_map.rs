//! Electrode grid and channel ordering.
//!
//! An `ElectrodeMap` is a rectangular grid of electrode ids. Channels are the
//! row-major positions in that grid: `x = channel % n_columns`,
//! `y = channel / n_columns`.

use mea_common::array::types::ElectrodeId;
use mea_common::consts::{N_MAP_COLUMNS, N_MAP_ROWS};
use std::collections::HashMap;
use thiserror::Error;

/// Error types for map construction and lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    /// Channel beyond the number of grid cells
    #[error("Channel {channel} out of range (channels: {n_channels})")]
    ChannelOutOfRange {
        /// Requested channel
        channel: usize,
        /// Number of channels in the map
        n_channels: usize,
    },

    /// Grid coordinates beyond the map bounds
    #[error("Coordinates ({x}, {y}) out of range ({n_columns}x{n_rows})")]
    CoordinatesOutOfRange {
        /// Requested column
        x: usize,
        /// Requested row
        y: usize,
        /// Number of columns
        n_columns: usize,
        /// Number of rows
        n_rows: usize,
    },

    /// Electrode id appearing twice in the grid
    #[error("Electrode {0} appears more than once in the grid")]
    DuplicateElectrode(ElectrodeId),

    /// Grid without any electrode
    #[error("Electrode grid is empty")]
    EmptyGrid,

    /// Rows of different lengths
    #[error("Row {row} has {len} columns, expected {expected}")]
    RaggedGrid {
        /// Offending row
        row: usize,
        /// Its length
        len: usize,
        /// Length of the first row
        expected: usize,
    },

    /// Paired stimulation electrode falls outside the physical array
    #[error("Stimulation electrode {0} is outside the array")]
    StimulationElectrodeOutOfRange(ElectrodeId),
}

/// Two-dimensional electrode grid with its row-major channel ordering.
#[derive(Debug, Clone)]
pub struct ElectrodeMap {
    electrodes: Vec<ElectrodeId>,
    n_rows: usize,
    n_columns: usize,
    channel_by_electrode: HashMap<ElectrodeId, usize>,
}

impl ElectrodeMap {
    /// Build a map from grid rows.
    ///
    /// # Errors
    /// `EmptyGrid`, `RaggedGrid` or `DuplicateElectrode`.
    pub fn new(rows: Vec<Vec<ElectrodeId>>) -> Result<Self, MapError> {
        let n_columns = rows.first().map(Vec::len).unwrap_or(0);
        if n_columns == 0 {
            return Err(MapError::EmptyGrid);
        }
        if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_columns) {
            return Err(MapError::RaggedGrid {
                row,
                len: r.len(),
                expected: n_columns,
            });
        }
        Self::from_flat(rows.into_iter().flatten().collect(), n_columns)
    }

    /// Build a map from a row-major electrode list.
    ///
    /// # Errors
    /// `EmptyGrid`, `RaggedGrid` (length not a multiple of `n_columns`) or
    /// `DuplicateElectrode`.
    pub fn from_flat(electrodes: Vec<ElectrodeId>, n_columns: usize) -> Result<Self, MapError> {
        if electrodes.is_empty() || n_columns == 0 {
            return Err(MapError::EmptyGrid);
        }
        if electrodes.len() % n_columns != 0 {
            return Err(MapError::RaggedGrid {
                row: electrodes.len() / n_columns,
                len: electrodes.len() % n_columns,
                expected: n_columns,
            });
        }

        let mut channel_by_electrode = HashMap::with_capacity(electrodes.len());
        for (channel, &electrode) in electrodes.iter().enumerate() {
            if channel_by_electrode.insert(electrode, channel).is_some() {
                return Err(MapError::DuplicateElectrode(electrode));
            }
        }

        Ok(Self {
            n_rows: electrodes.len() / n_columns,
            n_columns,
            electrodes,
            channel_by_electrode,
        })
    }

    /// Electrodes in channel order.
    pub fn electrodes(&self) -> &[ElectrodeId] {
        &self.electrodes
    }

    /// One grid row.
    pub fn row(&self, y: usize) -> Option<&[ElectrodeId]> {
        (y < self.n_rows).then(|| &self.electrodes[y * self.n_columns..(y + 1) * self.n_columns])
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    pub fn n_columns(&self) -> usize {
        self.n_columns
    }

    /// Number of channels (grid cells).
    pub fn n_channels(&self) -> usize {
        self.electrodes.len()
    }

    /// `(x, y)` of `channel`.
    pub fn coordinates_of_channel(&self, channel: usize) -> Result<(usize, usize), MapError> {
        if channel >= self.n_channels() {
            return Err(MapError::ChannelOutOfRange {
                channel,
                n_channels: self.n_channels(),
            });
        }
        Ok((channel % self.n_columns, channel / self.n_columns))
    }

    /// Channel at `(x, y)`.
    pub fn channel_at(&self, x: usize, y: usize) -> Result<usize, MapError> {
        if x >= self.n_columns || y >= self.n_rows {
            return Err(MapError::CoordinatesOutOfRange {
                x,
                y,
                n_columns: self.n_columns,
                n_rows: self.n_rows,
            });
        }
        Ok(y * self.n_columns + x)
    }

    /// Electrode at `(x, y)`.
    pub fn electrode_at(&self, x: usize, y: usize) -> Result<ElectrodeId, MapError> {
        self.channel_at(x, y).map(|channel| self.electrodes[channel])
    }

    /// Electrode assigned to `channel`.
    pub fn electrode_of_channel(&self, channel: usize) -> Result<ElectrodeId, MapError> {
        let (x, y) = self.coordinates_of_channel(channel)?;
        self.electrode_at(x, y)
    }

    /// Channel of `electrode`, `None` if it is not in the grid.
    pub fn channel_of_electrode(&self, electrode: ElectrodeId) -> Option<usize> {
        self.channel_by_electrode.get(&electrode).copied()
    }

    /// `(x, y)` of `electrode`, `None` if it is not in the grid.
    pub fn coordinates_of_electrode(&self, electrode: ElectrodeId) -> Option<(usize, usize)> {
        self.channel_of_electrode(electrode)
            .map(|channel| (channel % self.n_columns, channel / self.n_columns))
    }

    /// Electrodes of the sub-grid `[start_y, end_y) x [start_x, end_x)`,
    /// row-major. Bounds past the grid are clipped; an inverted range is empty.
    pub fn region(&self, start_x: usize, start_y: usize, end_x: usize, end_y: usize) -> Vec<ElectrodeId> {
        let end_x = end_x.min(self.n_columns);
        let end_y = end_y.min(self.n_rows);
        if start_x >= end_x || start_y >= end_y {
            return Vec::new();
        }
        (start_y..end_y)
            .flat_map(|y| {
                let base = y * self.n_columns;
                self.electrodes[base + start_x..base + end_x].iter().copied()
            })
            .collect()
    }
}

/// Produces an `ElectrodeMap`.
pub trait ElectrodeMapFactory {
    /// Create a new map.
    fn create(&self) -> Result<ElectrodeMap, MapError>;
}

/// Evenly spaced sparse grid over the full array.
///
/// Columns sit at `interval·k + ceil(interval/2) − 1` and rows at
/// `interval·k − 1`. The first and last column, and the first two rows and
/// the last row, are dropped to keep clear of the array edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SparseElectrodeMapFactory {
    /// Spacing between used electrodes.
    pub interval: usize,
}

impl SparseElectrodeMapFactory {
    /// Factory with the given spacing.
    pub fn new(interval: usize) -> Self {
        Self { interval }
    }

    fn column_offsets(&self) -> Vec<usize> {
        let center = self.interval.div_ceil(2);
        let all: Vec<usize> = (0..N_MAP_COLUMNS)
            .step_by(self.interval)
            .map(|x| x + center - 1)
            .collect();
        trim(&all, 1, 1).to_vec()
    }

    fn row_offsets(&self) -> Vec<usize> {
        // leading row offset is -1, it is among the trimmed ones
        let all: Vec<isize> = (0..N_MAP_ROWS)
            .step_by(self.interval)
            .map(|y| y as isize - 1)
            .collect();
        trim(&all, 2, 1).iter().map(|&y| y as usize).collect()
    }
}

impl Default for SparseElectrodeMapFactory {
    fn default() -> Self {
        Self { interval: 5 }
    }
}

impl ElectrodeMapFactory for SparseElectrodeMapFactory {
    fn create(&self) -> Result<ElectrodeMap, MapError> {
        if self.interval == 0 {
            return Err(MapError::EmptyGrid);
        }
        let xs = self.column_offsets();
        let ys = self.row_offsets();
        if xs.is_empty() || ys.is_empty() {
            return Err(MapError::EmptyGrid);
        }

        let electrodes = ys
            .iter()
            .flat_map(|&y| xs.iter().map(move |&x| (y * N_MAP_COLUMNS + x) as ElectrodeId))
            .collect();
        ElectrodeMap::from_flat(electrodes, xs.len())
    }
}

/// Every electrode of the array, `electrode == channel`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DenseElectrodeMapFactory;

impl ElectrodeMapFactory for DenseElectrodeMapFactory {
    fn create(&self) -> Result<ElectrodeMap, MapError> {
        let electrodes = (0..(N_MAP_COLUMNS * N_MAP_ROWS) as ElectrodeId).collect();
        ElectrodeMap::from_flat(electrodes, N_MAP_COLUMNS)
    }
}

fn trim<T>(values: &[T], head: usize, tail: usize) -> &[T] {
    if values.len() <= head + tail {
        return &[];
    }
    &values[head..values.len() - tail]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_map() -> ElectrodeMap {
        ElectrodeMap::new(vec![vec![10, 11, 12], vec![20, 21, 22]]).unwrap()
    }

    #[test]
    fn row_major_lookups() {
        let map = small_map();
        assert_eq!(map.n_rows(), 2);
        assert_eq!(map.n_columns(), 3);
        assert_eq!(map.n_channels(), 6);
        assert_eq!(map.coordinates_of_channel(4), Ok((1, 1)));
        assert_eq!(map.channel_at(2, 1), Ok(5));
        assert_eq!(map.electrode_of_channel(3), Ok(20));
        assert_eq!(map.channel_of_electrode(12), Some(2));
        assert_eq!(map.coordinates_of_electrode(21), Some((1, 1)));
        assert_eq!(map.row(1), Some(&[20, 21, 22][..]));
    }

    #[test]
    fn out_of_range_is_explicit() {
        let map = small_map();
        assert_eq!(
            map.electrode_of_channel(6),
            Err(MapError::ChannelOutOfRange {
                channel: 6,
                n_channels: 6
            })
        );
        assert!(matches!(
            map.channel_at(3, 0),
            Err(MapError::CoordinatesOutOfRange { .. })
        ));
        assert!(map.electrode_at(0, 2).is_err());
        assert_eq!(map.channel_of_electrode(99), None);
        assert_eq!(map.coordinates_of_electrode(99), None);
        assert_eq!(map.row(2), None);
    }

    #[test]
    fn rejects_malformed_grids() {
        assert_eq!(ElectrodeMap::new(vec![]).unwrap_err(), MapError::EmptyGrid);
        assert_eq!(ElectrodeMap::new(vec![vec![]]).unwrap_err(), MapError::EmptyGrid);
        assert!(matches!(
            ElectrodeMap::new(vec![vec![1, 2], vec![3]]),
            Err(MapError::RaggedGrid { row: 1, len: 1, expected: 2 })
        ));
        assert_eq!(
            ElectrodeMap::new(vec![vec![1, 2], vec![2, 3]]).unwrap_err(),
            MapError::DuplicateElectrode(2)
        );
    }

    #[test]
    fn region_clips_to_grid() {
        let map = small_map();
        assert_eq!(map.region(1, 0, 3, 2), vec![11, 12, 21, 22]);
        assert_eq!(map.region(1, 1, 10, 10), vec![21, 22]);
        assert!(map.region(2, 0, 1, 2).is_empty());
    }

    #[test]
    fn sparse_factory_default_layout() {
        let map = SparseElectrodeMapFactory::default().create().unwrap();
        assert_eq!(map.n_columns(), 42);
        assert_eq!(map.n_rows(), 21);
        // first kept column 7, first kept row 9
        assert_eq!(map.electrode_of_channel(0), Ok((9 * 220 + 7) as ElectrodeId));
        assert_eq!(map.electrode_of_channel(1), Ok((9 * 220 + 12) as ElectrodeId));
        assert_eq!(map.electrode_of_channel(42), Ok((14 * 220 + 7) as ElectrodeId));
    }

    #[test]
    fn sparse_factory_stays_inside_array() {
        for interval in 1..=40 {
            let Ok(map) = SparseElectrodeMapFactory::new(interval).create() else {
                continue;
            };
            for &electrode in map.electrodes() {
                let x = electrode as usize % N_MAP_COLUMNS;
                let y = electrode as usize / N_MAP_COLUMNS;
                assert!(x > 0 && x < N_MAP_COLUMNS - 1, "interval {interval}: x {x}");
                assert!(y > 0 && y < N_MAP_ROWS - 1, "interval {interval}: y {y}");
            }
        }
    }

    #[test]
    fn sparse_factory_rejects_degenerate_intervals() {
        assert_eq!(
            SparseElectrodeMapFactory::new(0).create().unwrap_err(),
            MapError::EmptyGrid
        );
        assert_eq!(
            SparseElectrodeMapFactory::new(200).create().unwrap_err(),
            MapError::EmptyGrid
        );
    }

    fn assert_channel_round_trip(map: &ElectrodeMap) {
        for channel in 0..map.n_channels() {
            let electrode = map.electrode_of_channel(channel).unwrap();
            let back = map.channel_of_electrode(electrode).unwrap();
            assert_eq!(back, channel);
            assert_eq!(map.electrode_of_channel(back), Ok(electrode));
            let (x, y) = map.coordinates_of_channel(channel).unwrap();
            assert_eq!(map.electrode_at(x, y), Ok(electrode));
        }
    }

    #[test]
    fn every_channel_round_trips() {
        for interval in [2, 3, 5, 7, 10] {
            let map = SparseElectrodeMapFactory::new(interval).create().unwrap();
            assert_channel_round_trip(&map);
        }
        assert_channel_round_trip(&DenseElectrodeMapFactory.create().unwrap());
    }

    #[test]
    fn dense_factory_is_identity() {
        let map = DenseElectrodeMapFactory.create().unwrap();
        assert_eq!(map.n_channels(), N_MAP_COLUMNS * N_MAP_ROWS);
        assert_eq!(map.electrode_of_channel(12_345), Ok(12_345));
        assert_eq!(map.channel_of_electrode(221), Some(221));
    }
}
