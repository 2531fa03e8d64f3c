//! Throughput accounting for the pipeline
//!
//! Each stage bumps a raw atomic counter per unit of work; the aggregator
//! turns those counters into per-second rates once a second and resets them.
//! Cumulative byte/packet totals come straight from the datagram transmitter
//! and are never reset here.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::net::DatagramTransmitter;

/// Raw per-stage work counter. Incremented by the owning stage, drained by
/// the aggregator.
#[derive(Default)]
pub struct StageCounters {
    frames: AtomicU64,
}

impl StageCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one successfully processed unit.
    pub fn increment(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Read and reset the counter.
    fn take(&self) -> u64 {
        self.frames.swap(0, Ordering::Relaxed)
    }
}

/// Read-only throughput snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StreamStats {
    pub capture_fps: f64,
    pub encode_fps: f64,
    pub send_fps: f64,
    pub bytes_sent: u64,
    pub packets_sent: u64,
}

impl std::fmt::Display for StreamStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "capture={:.1}fps encode={:.1}fps send={:.1}fps | {} packets, {} bytes sent",
            self.capture_fps, self.encode_fps, self.send_fps, self.packets_sent, self.bytes_sent,
        )
    }
}

struct RateWindow {
    last_computed: Instant,
    capture_fps: f64,
    encode_fps: f64,
    send_fps: f64,
}

/// Rolling one-second throughput aggregator.
pub struct StatsAggregator {
    capture: Arc<StageCounters>,
    encode: Arc<StageCounters>,
    send: Arc<StageCounters>,
    window: Mutex<RateWindow>,
    transmitter: Mutex<Option<Arc<dyn DatagramTransmitter>>>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self {
            capture: Arc::new(StageCounters::new()),
            encode: Arc::new(StageCounters::new()),
            send: Arc::new(StageCounters::new()),
            window: Mutex::new(RateWindow {
                last_computed: Instant::now(),
                capture_fps: 0.0,
                encode_fps: 0.0,
                send_fps: 0.0,
            }),
            transmitter: Mutex::new(None),
        }
    }

    pub fn capture_counter(&self) -> Arc<StageCounters> {
        Arc::clone(&self.capture)
    }

    pub fn encode_counter(&self) -> Arc<StageCounters> {
        Arc::clone(&self.encode)
    }

    pub fn send_counter(&self) -> Arc<StageCounters> {
        Arc::clone(&self.send)
    }

    /// Attach the transmitter whose cumulative counters back the
    /// `bytes_sent`/`packets_sent` fields. Called by the orchestrator on
    /// start; detached again on stop.
    pub fn attach_transmitter(&self, transmitter: Arc<dyn DatagramTransmitter>) {
        *self.transmitter.lock().unwrap() = Some(transmitter);
    }

    pub fn detach_transmitter(&self) {
        *self.transmitter.lock().unwrap() = None;
    }

    /// Reset the rate window and raw counters, for a fresh pipeline run.
    pub fn reset(&self) {
        self.capture.take();
        self.encode.take();
        self.send.take();
        let mut window = self.window.lock().unwrap();
        window.last_computed = Instant::now();
        window.capture_fps = 0.0;
        window.encode_fps = 0.0;
        window.send_fps = 0.0;
    }

    /// Current throughput snapshot.
    ///
    /// Rates are recomputed only when at least one second has elapsed since
    /// the previous computation (raw count scaled by elapsed milliseconds,
    /// counter reset); between computations the cached rates are returned.
    pub fn snapshot(&self) -> StreamStats {
        self.snapshot_at(Instant::now())
    }

    fn snapshot_at(&self, now: Instant) -> StreamStats {
        let mut window = self.window.lock().unwrap();

        let elapsed_ms = now.duration_since(window.last_computed).as_millis() as u64;
        if elapsed_ms >= 1_000 {
            window.capture_fps = Self::per_second(self.capture.take(), elapsed_ms);
            window.encode_fps = Self::per_second(self.encode.take(), elapsed_ms);
            window.send_fps = Self::per_second(self.send.take(), elapsed_ms);
            window.last_computed = now;
        }

        let (bytes_sent, packets_sent) = match self.transmitter.lock().unwrap().as_ref() {
            Some(tx) => (tx.bytes_sent(), tx.packets_sent()),
            None => (0, 0),
        };

        StreamStats {
            capture_fps: window.capture_fps,
            encode_fps: window.encode_fps,
            send_fps: window.send_fps,
            bytes_sent,
            packets_sent,
        }
    }

    fn per_second(count: u64, elapsed_ms: u64) -> f64 {
        count as f64 * 1_000.0 / elapsed_ms as f64
    }
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::SendOutcome;
    use std::time::Duration;

    struct FixedTransmitter {
        bytes: u64,
        packets: u64,
    }

    impl DatagramTransmitter for FixedTransmitter {
        fn send(&self, _payload: &[u8]) -> SendOutcome {
            SendOutcome::Sent
        }

        fn bytes_sent(&self) -> u64 {
            self.bytes
        }

        fn packets_sent(&self) -> u64 {
            self.packets
        }
    }

    #[test]
    fn rates_computed_after_a_full_second() {
        let stats = StatsAggregator::new();
        let capture = stats.capture_counter();
        for _ in 0..60 {
            capture.increment();
        }

        // Under a second: cached (zero) rates.
        let early = stats.snapshot_at(Instant::now() + Duration::from_millis(500));
        assert_eq!(early.capture_fps, 0.0);

        // Past a second: 60 frames over 2000ms = 30 fps.
        let late = stats.snapshot_at(Instant::now() + Duration::from_millis(2_000));
        assert!((late.capture_fps - 30.0).abs() < 1.0, "got {}", late.capture_fps);
    }

    #[test]
    fn counters_reset_after_computation() {
        let stats = StatsAggregator::new();
        let encode = stats.encode_counter();
        for _ in 0..10 {
            encode.increment();
        }

        let _ = stats.snapshot_at(Instant::now() + Duration::from_millis(1_100));
        // No new increments: the next window reports zero.
        let next = stats.snapshot_at(Instant::now() + Duration::from_millis(2_300));
        assert_eq!(next.encode_fps, 0.0);
    }

    #[test]
    fn cumulative_totals_come_from_the_transmitter() {
        let stats = StatsAggregator::new();
        assert_eq!(stats.snapshot().bytes_sent, 0);

        stats.attach_transmitter(Arc::new(FixedTransmitter { bytes: 4096, packets: 3 }));
        let snap = stats.snapshot();
        assert_eq!(snap.bytes_sent, 4096);
        assert_eq!(snap.packets_sent, 3);

        stats.detach_transmitter();
        assert_eq!(stats.snapshot().packets_sent, 0);
    }
}
