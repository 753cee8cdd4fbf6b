//! In-memory aircraft table fed by decoded messages.
//!
//! Pure state: no I/O and no timers. The caller applies messages as they
//! arrive and calls `evict_stale` periodically.
//!
//! Tracks per-aircraft: callsign, altitude, speed/track, squawk, the last
//! even and odd raw CPR positions, and the resolved position once a pair
//! decodes.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, trace};

use crate::cpr::{self, CprFrame};
use crate::types::*;

/// Default seconds of silence before an aircraft is evicted.
pub const AIRCRAFT_TTL: f64 = 60.0;

// ---------------------------------------------------------------------------
// Aircraft state
// ---------------------------------------------------------------------------

/// State of one tracked aircraft.
///
/// `lat`/`lon` read (0, 0) until the first CPR pair resolves. Use
/// `position()` rather than the raw fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aircraft {
    pub addr: u32,
    pub hex_addr: String,
    /// Empty until an identification message arrives.
    pub flight: String,
    pub altitude: i32,
    /// Knots.
    pub speed: f64,
    /// Degrees.
    pub track: f64,
    pub vertical_rate: Option<i32>,
    pub squawk: Option<u16>,

    pub even_cpr: Option<CprFrame>,
    pub odd_cpr: Option<CprFrame>,
    pub lat: f64,
    pub lon: f64,

    pub first_seen: f64,
    pub last_seen: f64,
    pub messages: u64,
}

impl Aircraft {
    pub fn new(addr: u32, timestamp: f64) -> Self {
        Aircraft {
            addr,
            hex_addr: icao_to_string(&icao_from_u32(addr)),
            flight: String::new(),
            altitude: 0,
            speed: 0.0,
            track: 0.0,
            vertical_rate: None,
            squawk: None,
            even_cpr: None,
            odd_cpr: None,
            lat: 0.0,
            lon: 0.0,
            first_seen: timestamp,
            last_seen: timestamp,
            messages: 0,
        }
    }

    /// Resolved position, `None` while still at the (0, 0) sentinel.
    pub fn position(&self) -> Option<(f64, f64)> {
        if self.lat == 0.0 && self.lon == 0.0 {
            None
        } else {
            Some((self.lat, self.lon))
        }
    }

    pub fn age(&self, now: f64) -> f64 {
        now - self.last_seen
    }

    pub fn is_stale(&self, ttl: f64, now: f64) -> bool {
        self.age(now) > ttl
    }

    /// Update from one message. Returns true when a new position resolved.
    pub fn apply(&mut self, msg: &DecodedMessage) -> bool {
        self.last_seen = msg.timestamp;
        self.messages += 1;

        match &msg.body {
            MessageBody::AltitudeReply(r) => self.altitude = r.altitude.feet(),
            MessageBody::IdentityReply(r) => self.squawk = Some(r.squawk),
            MessageBody::ExtendedSquitter(es) => match &es.data {
                SquitterData::Identification(id) => self.flight = id.flight.clone(),
                SquitterData::AirbornePosition(pos) => {
                    self.altitude = pos.altitude.feet();
                    return self.update_position(pos, msg.timestamp);
                }
                SquitterData::Velocity(v) => {
                    self.speed = v.speed;
                    self.track = v.heading;
                    self.vertical_rate = v.vertical_rate_fpm();
                }
                SquitterData::Heading(h) if h.valid => self.track = h.heading,
                _ => {}
            },
            _ => {}
        }
        false
    }

    fn update_position(&mut self, pos: &AirbornePosition, timestamp: f64) -> bool {
        let frame = CprFrame {
            lat: pos.raw_lat,
            lon: pos.raw_lon,
            time: timestamp,
        };
        if pos.odd {
            self.odd_cpr = Some(frame);
        } else {
            self.even_cpr = Some(frame);
        }

        let (Some(even), Some(odd)) = (&self.even_cpr, &self.odd_cpr) else {
            return false;
        };
        if !cpr::within_pair_window(even, odd) {
            trace!(icao = %self.hex_addr, "CPR pair too far apart");
            return false;
        }

        match cpr::global_decode(even, odd) {
            Some((lat, lon)) => {
                self.lat = lat;
                self.lon = lon;
                true
            }
            None => {
                trace!(icao = %self.hex_addr, "CPR pair straddles a zone boundary");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Address-keyed table of aircraft.
#[derive(Debug, Default)]
pub struct Tracker {
    aircraft: HashMap<u32, Aircraft>,
    pub positions_resolved: u64,
}

impl Tracker {
    pub fn new() -> Self {
        Tracker::default()
    }

    /// Existing aircraft for `addr`, or a fresh one first seen at `now`.
    pub fn lookup_or_create(&mut self, addr: u32, now: f64) -> &mut Aircraft {
        self.aircraft
            .entry(addr)
            .or_insert_with(|| new_aircraft(addr, now))
    }

    /// Apply a message to the aircraft it came from, creating it if needed.
    ///
    /// Does not look at `crc_ok`; gating untrusted messages is up to the caller.
    pub fn apply_message(&mut self, msg: &DecodedMessage) -> &Aircraft {
        let addr = msg.icao_u32();
        let ac = self
            .aircraft
            .entry(addr)
            .or_insert_with(|| new_aircraft(addr, msg.timestamp));
        if ac.apply(msg) {
            self.positions_resolved += 1;
        }
        ac
    }

    /// Remove every aircraft silent for more than `ttl` seconds. Returns
    /// the count removed.
    pub fn evict_stale(&mut self, ttl: f64, now: f64) -> usize {
        let before = self.aircraft.len();
        self.aircraft.retain(|_, ac| !ac.is_stale(ttl, now));
        let removed = before - self.aircraft.len();
        if removed > 0 {
            debug!(removed, remaining = self.aircraft.len(), "evicted stale aircraft");
        }
        removed
    }

    pub fn get(&self, addr: u32) -> Option<&Aircraft> {
        self.aircraft.get(&addr)
    }

    pub fn aircraft(&self) -> impl Iterator<Item = &Aircraft> {
        self.aircraft.values()
    }

    pub fn len(&self) -> usize {
        self.aircraft.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aircraft.is_empty()
    }

    /// Copy of every aircraft, most recently seen first.
    pub fn snapshot(&self) -> Vec<Aircraft> {
        let mut all: Vec<Aircraft> = self.aircraft.values().cloned().collect();
        all.sort_by(|a, b| b.last_seen.total_cmp(&a.last_seen));
        all
    }
}

fn new_aircraft(addr: u32, now: f64) -> Aircraft {
    let ac = Aircraft::new(addr, now);
    debug!(icao = %ac.hex_addr, "new aircraft");
    ac
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Decoder;
    use assert_approx_eq::assert_approx_eq;

    const KLM1023: &str = "8D4840D6202CC371C32CE0576098";
    const POS_EVEN: &str = "8D40621D58C382D690C8AC2863A7";
    const POS_ODD: &str = "8D40621D58C386435CC412692AD6";
    const VELOCITY: &str = "8D485020994409940838175B284F";

    fn decode(hex: &str, ts: f64) -> DecodedMessage {
        Decoder::default()
            .decode(&hex_decode(hex).unwrap(), ts)
            .expect("valid frame")
    }

    fn position_msg(addr: u32, odd: bool, raw_lat: u32, raw_lon: u32, ts: f64) -> DecodedMessage {
        DecodedMessage {
            raw: [0; LONG_MSG_BYTES],
            bits: LONG_MSG_BITS,
            df: 17,
            crc: 0,
            computed_crc: 0,
            crc_ok: true,
            corrected: None,
            icao: icao_from_u32(addr),
            timestamp: ts,
            body: MessageBody::ExtendedSquitter(ExtendedSquitter {
                capability: 5,
                metype: 11,
                mesub: 0,
                data: SquitterData::AirbornePosition(AirbornePosition {
                    altitude: Altitude::Feet(10000),
                    odd,
                    utc: false,
                    raw_lat,
                    raw_lon,
                }),
            }),
        }
    }

    #[test]
    fn test_aircraft_created_with_sentinel() {
        let mut tracker = Tracker::new();
        let ac = tracker.apply_message(&decode(KLM1023, 10.0));
        assert_eq!(ac.hex_addr, "4840D6");
        assert_eq!(ac.messages, 1);
        assert_eq!(ac.first_seen, 10.0);
        assert_eq!((ac.lat, ac.lon), (0.0, 0.0));
        assert!(ac.position().is_none());
    }

    #[test]
    fn test_lookup_or_create_reuses_entry() {
        let mut tracker = Tracker::new();
        tracker.lookup_or_create(0x4840D6, 1.0).messages = 7;
        assert_eq!(tracker.lookup_or_create(0x4840D6, 2.0).messages, 7);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_flight_update() {
        let mut tracker = Tracker::new();
        tracker.apply_message(&decode(KLM1023, 1.0));
        assert_eq!(tracker.get(0x4840D6).unwrap().flight, "KLM1023 ");
    }

    #[test]
    fn test_cpr_pairing_resolves_position() {
        let mut tracker = Tracker::new();
        tracker.apply_message(&decode(POS_ODD, 0.0));
        assert!(tracker.get(0x40621D).unwrap().position().is_none());

        tracker.apply_message(&decode(POS_EVEN, 1.0));
        let ac = tracker.get(0x40621D).unwrap();
        let (lat, lon) = ac.position().expect("resolved");
        assert_approx_eq!(lat, 52.2572, 1e-3);
        assert_approx_eq!(lon, 3.9194, 1e-3);
        assert_eq!(ac.altitude, 38000);
        assert_eq!(ac.messages, 2);
        assert_eq!(tracker.positions_resolved, 1);
    }

    #[test]
    fn test_cpr_pair_too_old() {
        let mut tracker = Tracker::new();
        tracker.apply_message(&decode(POS_ODD, 0.0));
        tracker.apply_message(&decode(POS_EVEN, 10.5));
        assert!(tracker.get(0x40621D).unwrap().position().is_none());
        assert_eq!(tracker.positions_resolved, 0);
    }

    #[test]
    fn test_zone_mismatch_keeps_position() {
        let mut tracker = Tracker::new();
        tracker.apply_message(&position_msg(0xABCDEF, true, 74158, 50194, 0.0));
        tracker.apply_message(&position_msg(0xABCDEF, false, 93000, 51372, 1.0));
        let before = tracker.get(0xABCDEF).unwrap().position().expect("resolved");

        // Odd frame too late to pair with the old even one, then the even
        // frame completing a pair that straddles the 10.47° boundary
        tracker.apply_message(&position_msg(0xABCDEF, true, 94372, 0, 20.0));
        tracker.apply_message(&position_msg(0xABCDEF, false, 97648, 0, 21.0));
        assert_eq!(tracker.get(0xABCDEF).unwrap().position(), Some(before));
    }

    #[test]
    fn test_velocity_update() {
        let mut tracker = Tracker::new();
        let ac = tracker.apply_message(&decode(VELOCITY, 1.0));
        assert_approx_eq!(ac.speed, 160.2529, 1e-3);
        assert_approx_eq!(ac.track, 183.2196, 1e-3);
        assert_eq!(ac.vertical_rate, Some(-832));
    }

    #[test]
    fn test_eviction_boundary() {
        let mut tracker = Tracker::new();
        tracker.lookup_or_create(0x000001, 0.0);
        tracker.lookup_or_create(0x000002, 2.0);

        assert_eq!(tracker.evict_stale(60.0, 61.0), 1);
        assert!(tracker.get(0x000001).is_none());
        assert!(tracker.get(0x000002).is_some());
    }

    #[test]
    fn test_last_seen_refreshes() {
        let mut tracker = Tracker::new();
        tracker.apply_message(&decode(KLM1023, 0.0));
        tracker.apply_message(&decode(KLM1023, 50.0));
        assert_eq!(tracker.evict_stale(60.0, 100.0), 0);
        assert_eq!(tracker.get(0x4840D6).unwrap().first_seen, 0.0);
    }

    #[test]
    fn test_snapshot_most_recent_first() {
        let mut tracker = Tracker::new();
        tracker.apply_message(&decode(KLM1023, 1.0));
        tracker.apply_message(&decode(VELOCITY, 3.0));
        tracker.apply_message(&decode(POS_EVEN, 2.0));

        let order: Vec<_> = tracker.snapshot().into_iter().map(|a| a.hex_addr).collect();
        assert_eq!(order, ["485020", "40621D", "4840D6"]);
    }
}
