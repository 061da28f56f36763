//! Electrode and stimulation unit identifiers.

use core::fmt;
use core::str::FromStr;

/// Physical electrode id, `y * N_MAP_COLUMNS + x` on the full array.
pub type ElectrodeId = u32;

/// Hardware stimulation unit (DAC/driver) identifier.
///
/// Opaque to the controller: only obtained from
/// `ArrayDriver::query_stimulation_at_electrode` and handed back to power
/// commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId(pub u16);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UnitId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u16>()
            .map(Self)
            .map_err(|e| format!("invalid stimulation unit {s:?}: {e}"))
    }
}
