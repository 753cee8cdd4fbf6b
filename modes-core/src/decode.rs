//! Decode raw Mode S frames into `DecodedMessage`s.
//!
//! Per frame:
//! - Classify Downlink Format (DF) and message length
//! - Validate the checksum, correcting 1 bit (or 2 in aggressive mode) for DF11/17
//! - Record clean DF11/17 addresses in the ICAO cache
//! - Recover the address of other DFs from the parity field, trusting it
//!   only if the cache knows it
//! - Extract format-specific fields, whether or not the checksum held
//!
//! Handles:
//! - DF0/4/16/20: 13-bit altitude
//! - DF5/21:      identity (squawk)
//! - DF11:        all-call reply (capability)
//! - DF17 metype 1-4:  flight identification
//! - DF17 metype 9-18: airborne position (raw CPR)
//! - DF17 metype 19:   airborne velocity / heading

use tracing::{debug, trace};

use crate::cache::IcaoCache;
use crate::config::Config;
use crate::crc;
use crate::types::*;

// ---------------------------------------------------------------------------
// Altitude decoding
// ---------------------------------------------------------------------------

/// Decode the 13-bit AC field of DF0/4/16/20 (bits 20-32).
///
/// Only M=0, Q=1 (25-ft increments) is decoded.
pub fn decode_ac13(msg: &[u8]) -> Altitude {
    let m_bit = msg[3] & 0x40 != 0;
    let q_bit = msg[3] & 0x10 != 0;

    if m_bit {
        return Altitude::Unsupported(AltitudeUnit::Meters);
    }
    if !q_bit {
        return Altitude::Unsupported(AltitudeUnit::Feet);
    }

    // N is the 11-bit value left after removing the M and Q bits
    let n = ((msg[2] as i32 & 0x1F) << 6)
        | ((msg[3] as i32 & 0x80) >> 2)
        | ((msg[3] as i32 & 0x20) >> 1)
        | (msg[3] as i32 & 0x0F);
    Altitude::Feet(n * 25 - 1000)
}

/// Decode the 12-bit altitude of a DF17 airborne position (bits 41-52).
pub fn decode_ac12(msg: &[u8]) -> Altitude {
    if msg[5] & 1 == 0 {
        return Altitude::Unsupported(AltitudeUnit::Feet);
    }
    let n = ((msg[5] as i32 >> 1) << 4) | ((msg[6] as i32 & 0xF0) >> 4);
    Altitude::Feet(n * 25 - 1000)
}

// ---------------------------------------------------------------------------
// Identity decoding
// ---------------------------------------------------------------------------

/// Decode the 13-bit identity field into a squawk.
///
/// Bits 20-32 are interleaved C1 A1 C2 A2 C4 A4 _ B1 D1 B2 D2 B4 D4. Each
/// of A/B/C/D is one octal digit; the result is A*1000 + B*100 + C*10 + D.
pub fn decode_identity(msg: &[u8]) -> u16 {
    let (b2, b3) = (msg[2] as u16, msg[3] as u16);

    let a = ((b3 & 0x80) >> 5) | (b2 & 0x02) | ((b2 & 0x08) >> 3);
    let b = ((b3 & 0x02) << 1) | ((b3 & 0x08) >> 2) | ((b3 & 0x20) >> 5);
    let c = ((b2 & 0x01) << 2) | ((b2 & 0x04) >> 1) | ((b2 & 0x10) >> 4);
    let d = ((b3 & 0x01) << 2) | ((b3 & 0x04) >> 1) | ((b3 & 0x10) >> 4);

    a * 1000 + b * 100 + c * 10 + d
}

fn surveillance_status(msg: &[u8]) -> SurveillanceStatus {
    SurveillanceStatus {
        flight_status: msg[0] & 7,
        downlink_request: (msg[1] >> 3) & 0x1F,
        utility_message: ((msg[1] & 7) << 3) | (msg[2] >> 5),
    }
}

// ---------------------------------------------------------------------------
// Extended squitter decoding
// ---------------------------------------------------------------------------

/// Decode the 8-character flight id packed 6 bits per char in bytes 5-10.
pub fn decode_flight(msg: &[u8]) -> String {
    let bits = msg[5..11]
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | b as u64);

    (0..8)
        .map(|i| {
            let idx = ((bits >> (42 - i * 6)) & 0x3F) as usize;
            CALLSIGN_CHARSET[idx] as char
        })
        .collect()
}

fn decode_airborne_position(msg: &[u8]) -> AirbornePosition {
    AirbornePosition {
        altitude: decode_ac12(msg),
        odd: msg[6] & 0x04 != 0,
        utc: msg[6] & 0x08 != 0,
        raw_lat: ((msg[6] as u32 & 3) << 15) | ((msg[7] as u32) << 7) | (msg[8] as u32 >> 1),
        raw_lon: ((msg[8] as u32 & 1) << 16) | ((msg[9] as u32) << 8) | msg[10] as u32,
    }
}

/// Decode metype 19 subtypes 1-2 (velocity over ground).
pub fn decode_velocity(msg: &[u8]) -> AirborneVelocity {
    let west = msg[5] & 0x04 != 0;
    let ew_velocity = ((msg[5] as u16 & 3) << 8) | msg[6] as u16;
    let south = msg[7] & 0x80 != 0;
    let ns_velocity = ((msg[7] as u16 & 0x7F) << 3) | ((msg[8] as u16 & 0xE0) >> 5);

    let ewv = if west { -(ew_velocity as f64) } else { ew_velocity as f64 };
    let nsv = if south { -(ns_velocity as f64) } else { ns_velocity as f64 };
    let speed = ewv.hypot(nsv);
    let heading = if speed > 0.0 {
        ewv.atan2(nsv).to_degrees().rem_euclid(360.0)
    } else {
        0.0
    };

    AirborneVelocity {
        west,
        ew_velocity,
        south,
        ns_velocity,
        vert_rate_source: (msg[8] & 0x10) >> 4,
        vert_rate_negative: msg[8] & 0x08 != 0,
        vert_rate: ((msg[8] as u16 & 7) << 6) | ((msg[9] as u16 & 0xFC) >> 2),
        speed,
        heading,
    }
}

/// Decode metype 19 subtypes 3-4 (heading in 360/128 degree steps).
pub fn decode_heading(msg: &[u8]) -> HeadingReport {
    let raw = ((msg[5] as u32 & 3) << 5) | (msg[6] as u32 >> 3);
    HeadingReport {
        heading: 360.0 / 128.0 * raw as f64,
        valid: msg[5] & 0x04 != 0,
    }
}

fn decode_squitter(msg: &[u8]) -> ExtendedSquitter {
    let metype = msg[4] >> 3;
    let mesub = msg[4] & 7;

    let data = match (metype, mesub) {
        (1..=4, _) => SquitterData::Identification(Identification {
            category: metype - 1,
            flight: decode_flight(msg),
        }),
        (9..=18, _) => SquitterData::AirbornePosition(decode_airborne_position(msg)),
        (19, 1 | 2) => SquitterData::Velocity(decode_velocity(msg)),
        (19, 3 | 4) => SquitterData::Heading(decode_heading(msg)),
        _ => SquitterData::Other,
    };

    ExtendedSquitter {
        capability: msg[0] & 7,
        metype,
        mesub,
        data,
    }
}

/// Human-readable name of an extended squitter type/subtype.
pub fn me_description(metype: u8, mesub: u8) -> &'static str {
    match (metype, mesub) {
        (1..=4, _) => "Aircraft Identification and Category",
        (5..=8, _) => "Surface Position",
        (9..=18, _) => "Airborne Position (Baro Altitude)",
        (19, 1..=4) => "Airborne Velocity",
        (20..=22, _) => "Airborne Position (GNSS Height)",
        (23, 0) => "Test Message",
        (24, 1) => "Surface System Status",
        (28, 1) => "Extended Squitter Aircraft Status (Emergency)",
        (28, 2) => "Extended Squitter Aircraft Status (1090ES TCAS RA)",
        (29, 0 | 1) => "Target State and Status Message",
        (31, 0 | 1) => "Aircraft Operational Status Message",
        _ => "Unknown",
    }
}

/// Decode the format-specific fields of a (possibly corrected) message.
pub fn decode_body(msg: &[u8], df: u8) -> MessageBody {
    match df {
        0 | 16 => MessageBody::AltitudeReply(AltitudeReply {
            altitude: decode_ac13(msg),
            status: None,
        }),
        4 | 20 => MessageBody::AltitudeReply(AltitudeReply {
            altitude: decode_ac13(msg),
            status: Some(surveillance_status(msg)),
        }),
        5 | 21 => MessageBody::IdentityReply(IdentityReply {
            squawk: decode_identity(msg),
            status: surveillance_status(msg),
        }),
        11 => MessageBody::AllCall {
            capability: msg[0] & 7,
        },
        17 => MessageBody::ExtendedSquitter(decode_squitter(msg)),
        _ => MessageBody::Other,
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Running counters kept by the decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub frames: u64,
    pub crc_ok: u64,
    pub single_bit_fixes: u64,
    pub two_bit_fixes: u64,
    pub addresses_recovered: u64,
    pub unknown_addresses: u64,
}

/// Stateful frame decoder. Owns the ICAO cache used for address recovery.
pub struct Decoder {
    fix_errors: bool,
    aggressive: bool,
    cache: IcaoCache,
    stats: DecodeStats,
}

impl Decoder {
    pub fn new(config: &Config) -> Self {
        Decoder {
            fix_errors: config.fix_errors,
            aggressive: config.aggressive,
            cache: IcaoCache::new(config.icao_cache_ttl),
            stats: DecodeStats::default(),
        }
    }

    pub fn cache(&self) -> &IcaoCache {
        &self.cache
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    /// Decode one frame received at `now` (seconds).
    ///
    /// `frame` may carry trailing bytes beyond the message length implied
    /// by its DF; they are ignored. A frame shorter than that length is the
    /// only error.
    pub fn decode(&mut self, frame: &[u8], now: f64) -> Result<DecodedMessage> {
        let Some(&first) = frame.first() else {
            return Err(ModesError::InvalidLength {
                expected: SHORT_MSG_BYTES,
                actual: 0,
            });
        };

        let df = downlink_format(first);
        let bits = message_bits(df);
        let n_bytes = bits / 8;
        if frame.len() < n_bytes {
            return Err(ModesError::InvalidLength {
                expected: n_bytes,
                actual: frame.len(),
            });
        }

        self.stats.frames += 1;

        let mut msg = [0u8; LONG_MSG_BYTES];
        msg[..n_bytes].copy_from_slice(&frame[..n_bytes]);

        let mut crc = crc::parity_field(&msg, bits);
        let mut computed_crc = crc::checksum(&msg, bits);
        let mut crc_ok = crc == computed_crc;
        let mut corrected = None;

        // Error correction for DF11/17, where the parity field is a plain checksum
        if !crc_ok && self.fix_errors && (df == 11 || df == 17) {
            if let Some((bit, fixed)) = crc::fix_single_bit(&msg, bits) {
                msg = fixed;
                corrected = Some(CorrectedBits::Single(bit));
                self.stats.single_bit_fixes += 1;
            } else if self.aggressive && df == 17 {
                if let Some(((i, j), fixed)) = crc::fix_two_bits(&msg, bits) {
                    msg = fixed;
                    corrected = Some(CorrectedBits::Double(i, j));
                    self.stats.two_bit_fixes += 1;
                }
            }

            if let Some(bits_fixed) = corrected {
                crc_ok = true;
                crc = crc::parity_field(&msg, bits);
                computed_crc = crc::checksum(&msg, bits);
                debug!(df, corrected = ?bits_fixed, "repaired frame");
            }
        }

        let mut icao: Icao = [msg[1], msg[2], msg[3]];

        if df == 11 || df == 17 {
            // Only uncorrected frames establish trust in an address
            if crc_ok && corrected.is_none() {
                self.cache.record(icao, now);
            }
        } else {
            // Parity field is checksum XOR address: recover the candidate
            let candidate = icao_from_u32(crc ^ computed_crc);
            crc_ok = self.cache.was_recently_seen(&candidate, now);
            if crc_ok {
                icao = candidate;
                self.stats.addresses_recovered += 1;
            } else {
                self.stats.unknown_addresses += 1;
                trace!(df, candidate = %icao_to_string(&candidate), "address not in cache");
            }
        }

        if crc_ok {
            self.stats.crc_ok += 1;
        }

        Ok(DecodedMessage {
            raw: msg,
            bits,
            df,
            crc,
            computed_crc,
            crc_ok,
            corrected,
            icao,
            timestamp: now,
            body: decode_body(&msg, df),
        })
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Decoder::new(&Config::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
