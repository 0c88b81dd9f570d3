//! Receiver-side RTP reception statistics (RFC 3550 §6.4.1, appendix A.8).
//!
//! The `webrtc` crate's inbound stats carry packet and byte counters but no
//! loss or jitter, so the adapter feeds every packet the sink task reads
//! through a [`ReceptionTracker`] and merges the two.
//!
//! Arrival times are taken when the sink task reads a packet, not when the
//! packet reached the socket. Any lag in the sink shows up as extra jitter.

use std::time::Instant;

/// Sequence-number distance below which a packet counts as in-order.
const MAX_DROPOUT: u16 = 1 << 15;

/// Loss and interarrival jitter for one RTP stream.
///
/// `arrival` passed to [`process_packet`](Self::process_packet) is read time.
/// A sink task that falls behind inflates the jitter estimate.
#[derive(Debug, Clone)]
pub struct ReceptionTracker {
    clock_rate: f64,
    started: bool,
    base_seq: u16,
    max_seq: u16,
    cycles: u64,
    received: u64,
    /// Highest loss handed out by `cumulative_lost`.
    reported_lost: u64,
    last_rtp_timestamp: u32,
    last_arrival: Option<Instant>,
    /// Jitter estimate in RTP timestamp units.
    jitter: f64,
}

impl ReceptionTracker {
    /// Create a tracker for a stream whose RTP clock runs at `clock_rate` Hz.
    #[must_use]
    pub fn new(clock_rate: u32) -> Self {
        Self {
            clock_rate: f64::from(clock_rate.max(1)),
            started: false,
            base_seq: 0,
            max_seq: 0,
            cycles: 0,
            received: 0,
            reported_lost: 0,
            last_rtp_timestamp: 0,
            last_arrival: None,
            jitter: 0.0,
        }
    }

    /// Account for one received packet.
    pub fn process_packet(&mut self, sequence_number: u16, rtp_timestamp: u32, arrival: Instant) {
        self.received += 1;

        if !self.started {
            self.started = true;
            self.base_seq = sequence_number;
            self.max_seq = sequence_number;
        } else {
            let delta = sequence_number.wrapping_sub(self.max_seq);
            if delta > 0 && delta < MAX_DROPOUT {
                if sequence_number < self.max_seq {
                    self.cycles += 1;
                }
                self.max_seq = sequence_number;
            }
        }

        if let Some(last_arrival) = self.last_arrival {
            // RTP timestamps wrap; the signed difference keeps adjacent packets close.
            #[allow(clippy::cast_possible_wrap)]
            let rtp_delta = f64::from(rtp_timestamp.wrapping_sub(self.last_rtp_timestamp) as i32);
            let arrival_delta =
                arrival.saturating_duration_since(last_arrival).as_secs_f64() * self.clock_rate;
            let d = arrival_delta - rtp_delta;
            self.jitter += (d.abs() - self.jitter) / 16.0;
        }

        self.last_rtp_timestamp = rtp_timestamp;
        self.last_arrival = Some(arrival);
    }

    /// Packets received so far, duplicates included.
    #[must_use]
    pub fn packets_received(&self) -> u64 {
        self.received
    }

    /// Packets lost right now, clamped at zero when duplicates outnumber gaps.
    ///
    /// This is the RFC 3550 figure and goes down when a late packet fills a
    /// gap. Snapshots use [`cumulative_lost`](Self::cumulative_lost) instead.
    #[must_use]
    pub fn packets_lost(&self) -> u64 {
        if !self.started {
            return 0;
        }
        let extended_max = (self.cycles << 16) | u64::from(self.max_seq);
        let expected = extended_max - u64::from(self.base_seq) + 1;
        expected.saturating_sub(self.received)
    }

    /// Packets lost as a counter that never decreases.
    ///
    /// A gap filled before the next call is never counted. A gap already
    /// handed out stays counted even if its packet turns up later.
    pub fn cumulative_lost(&mut self) -> u64 {
        self.reported_lost = self.reported_lost.max(self.packets_lost());
        self.reported_lost
    }

    /// Current interarrival jitter in seconds.
    #[must_use]
    pub fn jitter_seconds(&self) -> f64 {
        self.jitter / self.clock_rate
    }
}
