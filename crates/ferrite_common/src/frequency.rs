//! Clock-rate values for the editor's oscillator sources.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A clock rate in whole Hertz.
///
/// The kernel has no wall clock; a `Frequency` is a label the editor attaches
/// to an oscillator component, plus a conversion into the logical-tick period
/// the scheduler actually uses.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Frequency(u64);

impl Frequency {
    /// Creates a frequency from a value in Hertz.
    pub fn from_hz(hz: u64) -> Self {
        Self(hz)
    }

    /// Returns the frequency in Hertz.
    pub fn hz(&self) -> u64 {
        self.0
    }

    /// Returns the half-period in logical ticks at the given tick rate,
    /// clamped to at least one tick.
    ///
    /// A toggling clock output changes level twice per period, so this is
    /// the number of ticks between successive output changes.
    pub fn half_period_ticks(&self, ticks_per_second: u64) -> u64 {
        if self.0 == 0 {
            return u64::MAX;
        }
        (ticks_per_second / (self.0 * 2)).max(1)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hz = self.0;
        if hz >= 1_000_000 && hz % 1_000_000 == 0 {
            write!(f, "{}MHz", hz / 1_000_000)
        } else if hz >= 1_000 && hz % 1_000 == 0 {
            write!(f, "{}kHz", hz / 1_000)
        } else {
            write!(f, "{hz}Hz")
        }
    }
}

impl fmt::Debug for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frequency({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hz_roundtrip() {
        assert_eq!(Frequency::from_hz(50).hz(), 50);
    }

    #[test]
    fn display_units() {
        assert_eq!(Frequency::from_hz(4).to_string(), "4Hz");
        assert_eq!(Frequency::from_hz(2_000).to_string(), "2kHz");
        assert_eq!(Frequency::from_hz(3_000_000).to_string(), "3MHz");
        assert_eq!(Frequency::from_hz(1_500).to_string(), "1500Hz");
    }

    #[test]
    fn half_period() {
        // 1000 ticks/s at 50 Hz: 10 ticks between edges.
        assert_eq!(Frequency::from_hz(50).half_period_ticks(1_000), 10);
        // Never rounds to zero.
        assert_eq!(Frequency::from_hz(10_000).half_period_ticks(1_000), 1);
    }

    #[test]
    fn zero_frequency_never_toggles() {
        assert_eq!(Frequency::from_hz(0).half_period_ticks(1_000), u64::MAX);
    }

    #[test]
    fn ordering() {
        assert!(Frequency::from_hz(4) < Frequency::from_hz(50));
    }

    #[test]
    fn serde_roundtrip() {
        let f = Frequency::from_hz(123);
        let json = serde_json::to_string(&f).unwrap();
        let back: Frequency = serde_json::from_str(&json).unwrap();
        assert_eq!(f, back);
    }
}
