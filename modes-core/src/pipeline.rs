//! Acquisition → decode handoff and the decode loop.
//!
//! An acquisition thread reads framed messages and pushes them through a
//! capacity-1 channel: it blocks while the slot is full and the decode side
//! blocks while it is empty, so at most one frame is in flight. The decode
//! side owns all mutable state (`Pipeline`), so nothing needs locking.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::decode::Decoder;
use crate::tracker::Tracker;
use crate::types::*;

/// How often stale aircraft are evicted, seconds.
pub const EVICT_INTERVAL: f64 = 1.0;

const IDLE_POLL: Duration = Duration::from_millis(500);

/// Current Unix time in seconds.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Frames and sources
// ---------------------------------------------------------------------------

/// One framed message as handed over by the acquisition layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReceivedFrame {
    pub bytes: [u8; LONG_MSG_BYTES],
    pub len: usize,
    /// Receive time, Unix seconds.
    pub timestamp: f64,
}

impl ReceivedFrame {
    pub fn new(data: &[u8], timestamp: f64) -> Result<Self> {
        if data.is_empty() || data.len() > LONG_MSG_BYTES {
            return Err(ModesError::InvalidLength {
                expected: LONG_MSG_BYTES,
                actual: data.len(),
            });
        }
        let mut bytes = [0u8; LONG_MSG_BYTES];
        bytes[..data.len()].copy_from_slice(data);
        Ok(ReceivedFrame {
            bytes,
            len: data.len(),
            timestamp,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// Anything that yields framed messages: a file, stdin, a network socket.
///
/// `None` means the source is exhausted. An `Err` is fatal for the source.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<Result<ReceivedFrame>>;
}

/// The capacity-1 channel between acquisition and decode.
pub fn handoff() -> (Sender<ReceivedFrame>, Receiver<ReceivedFrame>) {
    bounded(1)
}

/// Drain `source` into `tx` until it is exhausted or the decode side hangs
/// up. Returns the number of frames sent.
pub fn feed<S: FrameSource>(source: &mut S, tx: &Sender<ReceivedFrame>) -> Result<u64> {
    let mut sent = 0;
    while let Some(frame) = source.next_frame() {
        if tx.send(frame?).is_err() {
            debug!("decode side disconnected");
            break;
        }
        sent += 1;
    }
    Ok(sent)
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Counters over the life of a pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub frames: u64,
    pub malformed: u64,
    pub crc_ok: u64,
    pub single_bit_fixes: u64,
    pub two_bit_fixes: u64,
    pub addresses_recovered: u64,
    pub unknown_addresses: u64,
    pub applied: u64,
    pub evicted: u64,
}

/// Decoder, ICAO cache and aircraft table under one owner.
pub struct Pipeline {
    config: Config,
    decoder: Decoder,
    tracker: Tracker,
    malformed: u64,
    applied: u64,
    evicted: u64,
    last_evict: Option<f64>,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Pipeline {
            decoder: Decoder::new(&config),
            tracker: Tracker::new(),
            config,
            malformed: 0,
            applied: 0,
            evicted: 0,
            last_evict: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn stats(&self) -> PipelineStats {
        let d = self.decoder.stats();
        PipelineStats {
            frames: d.frames + self.malformed,
            malformed: self.malformed,
            crc_ok: d.crc_ok,
            single_bit_fixes: d.single_bit_fixes,
            two_bit_fixes: d.two_bit_fixes,
            addresses_recovered: d.addresses_recovered,
            unknown_addresses: d.unknown_addresses,
            applied: self.applied,
            evicted: self.evicted,
        }
    }

    /// Decode one frame and, if it is trusted, apply it to the tracker.
    ///
    /// With `check_crc` off every decoded message is applied.
    pub fn process(&mut self, frame: &ReceivedFrame) -> Result<DecodedMessage> {
        let msg = match self.decoder.decode(frame.data(), frame.timestamp) {
            Ok(msg) => msg,
            Err(e) => {
                self.malformed += 1;
                return Err(e);
            }
        };
        if !self.config.check_crc || msg.crc_ok {
            self.tracker.apply_message(&msg);
            self.applied += 1;
        }
        Ok(msg)
    }

    /// Evict stale aircraft if at least `EVICT_INTERVAL` has passed since
    /// the last sweep. Returns the count removed.
    pub fn maintain(&mut self, now: f64) -> usize {
        let due = self
            .last_evict
            .map_or(true, |last| now - last >= EVICT_INTERVAL);
        if !due {
            return 0;
        }
        self.last_evict = Some(now);
        let removed = self.tracker.evict_stale(self.config.aircraft_ttl, now);
        self.evicted += removed as u64;
        removed
    }

    /// Decode frames from `rx` until every sender is dropped, handing each
    /// decoded message to `sink`.
    ///
    /// Time is frame time: eviction runs against the latest frame timestamp,
    /// advanced by wall-clock time while the channel is idle.
    pub fn run<F>(&mut self, rx: &Receiver<ReceivedFrame>, mut sink: F) -> PipelineStats
    where
        F: FnMut(&DecodedMessage),
    {
        let mut clock: Option<(f64, Instant)> = None;

        loop {
            match rx.recv_timeout(IDLE_POLL) {
                Ok(frame) => {
                    clock = Some((frame.timestamp, Instant::now()));
                    match self.process(&frame) {
                        Ok(msg) => sink(&msg),
                        Err(e) => debug!("dropping frame: {e}"),
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if let Some((ts, at)) = clock {
                self.maintain(ts + at.elapsed().as_secs_f64());
            }
        }

        let stats = self.stats();
        info!(
            frames = stats.frames,
            crc_ok = stats.crc_ok,
            aircraft = self.tracker.len(),
            "frame source closed"
        );
        stats
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
