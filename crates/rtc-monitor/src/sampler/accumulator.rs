//! Turning cumulative snapshots into counter increments.
//!
//! The engine reports counters that are already cumulative since the stream
//! started. Registry counters only support "add", so the sampler has to pick
//! what to add each tick:
//!
//! - [`AccumulationMode::Delta`] adds `current - last_seen`, so the series
//!   tracks the engine's own total.
//! - [`AccumulationMode::SnapshotSum`] adds each snapshot as-is. The series
//!   then overcounts (snapshots 100 then 150 read 250); this mode exists only
//!   to keep dashboards built on that behavior comparable.

use crate::engine::StreamStatsSnapshot;
use std::fmt;
use std::str::FromStr;

/// How cumulative snapshots are folded into registry counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccumulationMode {
    #[default]
    Delta,
    SnapshotSum,
}

impl AccumulationMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            AccumulationMode::Delta => "delta",
            AccumulationMode::SnapshotSum => "sum",
        }
    }
}

impl fmt::Display for AccumulationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccumulationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "delta" => Ok(AccumulationMode::Delta),
            "sum" => Ok(AccumulationMode::SnapshotSum),
            other => Err(format!("expected 'delta' or 'sum', got '{other}'")),
        }
    }
}

/// Amounts to add to each cumulative series for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsIncrement {
    pub packets_received: u64,
    pub packets_lost: u64,
    pub bytes_received: u64,
    pub header_bytes_received: u64,
    pub fir_count: u64,
    pub pli_count: u64,
    pub nack_count: u64,
}

/// Per-stream accumulation state.
#[derive(Debug, Clone)]
pub struct StatsAccumulator {
    mode: AccumulationMode,
    baseline: StreamStatsSnapshot,
}

impl StatsAccumulator {
    #[must_use]
    pub fn new(mode: AccumulationMode) -> Self {
        Self {
            mode,
            baseline: StreamStatsSnapshot::default(),
        }
    }

    #[must_use]
    pub fn mode(&self) -> AccumulationMode {
        self.mode
    }

    /// Fold one snapshot in and return what to add to the registry.
    pub fn next(&mut self, snapshot: &StreamStatsSnapshot) -> StatsIncrement {
        match self.mode {
            AccumulationMode::SnapshotSum => StatsIncrement {
                packets_received: snapshot.packets_received,
                packets_lost: snapshot.packets_lost,
                bytes_received: snapshot.bytes_received,
                header_bytes_received: snapshot.header_bytes_received,
                fir_count: snapshot.fir_count,
                pli_count: snapshot.pli_count,
                nack_count: snapshot.nack_count,
            },
            AccumulationMode::Delta => {
                let last = self.baseline;
                self.baseline = *snapshot;
                StatsIncrement {
                    packets_received: delta(last.packets_received, snapshot.packets_received),
                    packets_lost: delta(last.packets_lost, snapshot.packets_lost),
                    bytes_received: delta(last.bytes_received, snapshot.bytes_received),
                    header_bytes_received: delta(
                        last.header_bytes_received,
                        snapshot.header_bytes_received,
                    ),
                    fir_count: delta(last.fir_count, snapshot.fir_count),
                    pli_count: delta(last.pli_count, snapshot.pli_count),
                    nack_count: delta(last.nack_count, snapshot.nack_count),
                }
            }
        }
    }
}

/// A value below the baseline means the engine reset; re-base without advancing.
fn delta(last: u64, current: u64) -> u64 {
    current.checked_sub(last).unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn received(packets: u64) -> StreamStatsSnapshot {
        StreamStatsSnapshot {
            packets_received: packets,
            ..StreamStatsSnapshot::default()
        }
    }

    #[test]
    fn test_delta_mode_tracks_engine_total() {
        let mut acc = StatsAccumulator::new(AccumulationMode::Delta);
        let total: u64 = [received(100), received(150)]
            .iter()
            .map(|s| acc.next(s).packets_received)
            .sum();
        assert_eq!(total, 150);
    }

    #[test]
    fn test_snapshot_sum_mode_overcounts() {
        let mut acc = StatsAccumulator::new(AccumulationMode::SnapshotSum);
        let total: u64 = [received(100), received(150)]
            .iter()
            .map(|s| acc.next(s).packets_received)
            .sum();
        assert_eq!(total, 250);
    }

    #[test]
    fn test_delta_first_tick_is_full_value() {
        let mut acc = StatsAccumulator::new(AccumulationMode::Delta);
        let snapshot = StreamStatsSnapshot {
            packets_received: 10,
            packets_lost: 1,
            bytes_received: 1200,
            header_bytes_received: 120,
            fir_count: 1,
            pli_count: 2,
            nack_count: 3,
            jitter: 0.01,
        };
        let increment = acc.next(&snapshot);
        assert_eq!(
            increment,
            StatsIncrement {
                packets_received: 10,
                packets_lost: 1,
                bytes_received: 1200,
                header_bytes_received: 120,
                fir_count: 1,
                pli_count: 2,
                nack_count: 3,
            }
        );
    }

    #[test]
    fn test_delta_unchanged_snapshot_adds_nothing() {
        let mut acc = StatsAccumulator::new(AccumulationMode::Delta);
        acc.next(&received(42));
        assert_eq!(acc.next(&received(42)), StatsIncrement::default());
    }

    #[test]
    fn test_delta_rebases_after_reset() {
        let mut acc = StatsAccumulator::new(AccumulationMode::Delta);
        assert_eq!(acc.next(&received(500)).packets_received, 500);
        // Engine restarted its counters.
        assert_eq!(acc.next(&received(20)).packets_received, 0);
        assert_eq!(acc.next(&received(35)).packets_received, 15);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("delta".parse::<AccumulationMode>().unwrap(), AccumulationMode::Delta);
        assert_eq!(" SUM ".parse::<AccumulationMode>().unwrap(), AccumulationMode::SnapshotSum);
        assert!("gauge".parse::<AccumulationMode>().is_err());
        assert_eq!(AccumulationMode::default(), AccumulationMode::Delta);
        assert_eq!(AccumulationMode::SnapshotSum.to_string(), "sum");
    }
}
