//! Shared types, error enum, and decoded message types for modes-core.

use serde::Serialize;
use thiserror::Error;

/// All errors produced by modes-core.
#[derive(Debug, Error)]
pub enum ModesError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    #[error("invalid frame length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ModesError>;

// ---------------------------------------------------------------------------
// Frame geometry
// ---------------------------------------------------------------------------

pub const LONG_MSG_BITS: usize = 112;
pub const SHORT_MSG_BITS: usize = 56;
pub const LONG_MSG_BYTES: usize = LONG_MSG_BITS / 8;
pub const SHORT_MSG_BYTES: usize = SHORT_MSG_BITS / 8;

/// Downlink Format: top 5 bits of the first byte.
pub fn downlink_format(first_byte: u8) -> u8 {
    first_byte >> 3
}

/// Message length in bits implied by a Downlink Format.
pub fn message_bits(df: u8) -> usize {
    match df {
        16 | 17 | 19 | 20 | 21 => LONG_MSG_BITS,
        _ => SHORT_MSG_BITS,
    }
}

/// Known Downlink Format names.
pub const DF_NAMES: &[(u8, &str)] = &[
    (0, "Short air-air surveillance"),
    (4, "Surveillance altitude reply"),
    (5, "Surveillance identity reply"),
    (11, "All-call reply"),
    (16, "Long air-air surveillance"),
    (17, "ADS-B extended squitter"),
    (19, "Military extended squitter"),
    (20, "Comm-B altitude reply"),
    (21, "Comm-B identity reply"),
    (24, "Comm-D extended length message"),
];

/// Look up a DF name. Returns `None` for unrecognized DFs.
pub fn df_name(df: u8) -> Option<&'static str> {
    DF_NAMES.iter().find(|(d, _)| *d == df).map(|(_, name)| *name)
}

/// Responder capability (CA field) descriptions, indexed by the 3-bit code.
pub const CAPABILITY_NAMES: [&str; 8] = [
    "Level 1 (Surveillance only)",
    "Level 2 (DF0, 4, 5, 11)",
    "Level 3 (DF0, 4, 5, 11, 20, 21)",
    "Level 4 (DF0, 4, 5, 11, 20, 21, 24)",
    "Level 2+3+4 (DF0, 4, 5, 11, 20, 21, 24, code7 - is on ground)",
    "Level 2+3+4 (DF0, 4, 5, 11, 20, 21, 24, code7 - is airborne)",
    "Level 2+3+4 (DF0, 4, 5, 11, 20, 21, 24, code7)",
    "Level 7",
];

/// Flight status (FS field) descriptions, indexed by the 3-bit code.
pub const FLIGHT_STATUS_NAMES: [&str; 8] = [
    "Normal, airborne",
    "Normal, on the ground",
    "Alert, airborne",
    "Alert, on the ground",
    "Alert & SPI, airborne or ground",
    "SPI, airborne or ground",
    "Not assigned",
    "Not assigned",
];

// ---------------------------------------------------------------------------
// ICAO address helpers
// ---------------------------------------------------------------------------

/// 3-byte ICAO address. Stored as raw bytes to avoid per-frame String allocation.
pub type Icao = [u8; 3];

/// Format ICAO address as 6-char uppercase hex string.
pub fn icao_to_string(icao: &Icao) -> String {
    format!("{:02X}{:02X}{:02X}", icao[0], icao[1], icao[2])
}

/// Parse a 6-char hex string into an ICAO address.
pub fn icao_from_hex(hex: &str) -> Option<Icao> {
    if hex.len() != 6 {
        return None;
    }
    let val = u32::from_str_radix(hex, 16).ok()?;
    Some(icao_from_u32(val))
}

/// Convert ICAO bytes to u32 for hashing and numeric comparisons.
pub fn icao_to_u32(icao: &Icao) -> u32 {
    ((icao[0] as u32) << 16) | ((icao[1] as u32) << 8) | (icao[2] as u32)
}

/// Build ICAO from a 24-bit integer.
pub fn icao_from_u32(val: u32) -> Icao {
    [
        ((val >> 16) & 0xFF) as u8,
        ((val >> 8) & 0xFF) as u8,
        (val & 0xFF) as u8,
    ]
}

// ---------------------------------------------------------------------------
// Hex utilities
// ---------------------------------------------------------------------------

/// Decode a hex string into bytes. Case-insensitive, must be even length.
pub fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return None;
    }
    let mut bytes = Vec::with_capacity(hex.len() / 2);
    for chunk in hex.as_bytes().chunks(2) {
        let high = hex_digit(chunk[0])?;
        let low = hex_digit(chunk[1])?;
        bytes.push((high << 4) | low);
    }
    Some(bytes)
}

/// Encode bytes as uppercase hex string.
pub fn hex_encode(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 2);
    for &b in data {
        s.push(HEX_CHARS[(b >> 4) as usize] as char);
        s.push(HEX_CHARS[(b & 0x0F) as usize] as char);
    }
    s
}

const HEX_CHARS: &[u8; 16] = b"0123456789ABCDEF";

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// ADS-B callsign character set
// ---------------------------------------------------------------------------

/// Character set for flight identification (6 bits per character).
pub const CALLSIGN_CHARSET: &[u8; 64] =
    b"?ABCDEFGHIJKLMNOPQRSTUVWXYZ????? ???????????????0123456789??????";

// ---------------------------------------------------------------------------
// Decoded message types
// ---------------------------------------------------------------------------

/// Bit(s) flipped by the error corrector, as indexes from the first bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CorrectedBits {
    Single(usize),
    Double(usize, usize),
}

impl CorrectedBits {
    /// Packed form: low byte is the first bit, second byte the second bit.
    pub fn packed(&self) -> u32 {
        match *self {
            CorrectedBits::Single(i) => i as u32,
            CorrectedBits::Double(i, j) => i as u32 | (j as u32) << 8,
        }
    }
}

/// Unit an altitude field is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AltitudeUnit {
    Feet,
    Meters,
}

/// Decoded altitude field.
///
/// Only the 25-ft (Q=1, M=0) encoding is decoded. Gillham (Q=0) and metric
/// (M=1) encodings are reported as `Unsupported` and read as 0 ft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Altitude {
    Feet(i32),
    Unsupported(AltitudeUnit),
}

impl Altitude {
    pub fn feet(&self) -> i32 {
        match self {
            Altitude::Feet(ft) => *ft,
            Altitude::Unsupported(_) => 0,
        }
    }

    pub fn unit(&self) -> AltitudeUnit {
        match self {
            Altitude::Feet(_) => AltitudeUnit::Feet,
            Altitude::Unsupported(unit) => *unit,
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, Altitude::Feet(_))
    }
}

/// FS / DR / UM fields of DF4/5/20/21 replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SurveillanceStatus {
    pub flight_status: u8,
    pub downlink_request: u8,
    pub utility_message: u8,
}

impl SurveillanceStatus {
    pub fn flight_status_name(&self) -> &'static str {
        FLIGHT_STATUS_NAMES[(self.flight_status & 7) as usize]
    }
}

/// DF0/4/16/20: altitude reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AltitudeReply {
    pub altitude: Altitude,
    /// Present for DF4/20 only.
    pub status: Option<SurveillanceStatus>,
}

/// DF5/21: identity reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityReply {
    /// Four octal digits written as a decimal number (7700 means 7-7-0-0).
    pub squawk: u16,
    pub status: SurveillanceStatus,
}

/// DF17 metype 1-4: aircraft identification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identification {
    /// Emitter category set, `metype - 1`.
    pub category: u8,
    /// Eight characters, unused positions are spaces.
    pub flight: String,
}

/// DF17 metype 9-18: airborne position, CPR coordinates left undecoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirbornePosition {
    pub altitude: Altitude,
    pub odd: bool,
    pub utc: bool,
    pub raw_lat: u32,
    pub raw_lon: u32,
}

/// DF17 metype 19, subtypes 1-2: velocity over ground.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirborneVelocity {
    pub west: bool,
    pub ew_velocity: u16,
    pub south: bool,
    pub ns_velocity: u16,
    pub vert_rate_source: u8,
    pub vert_rate_negative: bool,
    pub vert_rate: u16,
    /// Euclidean norm of the two components, knots.
    pub speed: f64,
    /// Degrees in [0, 360).
    pub heading: f64,
}

impl AirborneVelocity {
    /// Vertical rate in feet per minute, `None` when the field reads 0.
    pub fn vertical_rate_fpm(&self) -> Option<i32> {
        if self.vert_rate == 0 {
            return None;
        }
        let rate = (self.vert_rate as i32 - 1) * 64;
        Some(if self.vert_rate_negative { -rate } else { rate })
    }
}

/// DF17 metype 19, subtypes 3-4: heading only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadingReport {
    pub heading: f64,
    pub valid: bool,
}

/// Extended squitter payload, by metype.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum SquitterData {
    Identification(Identification),
    AirbornePosition(AirbornePosition),
    Velocity(AirborneVelocity),
    Heading(HeadingReport),
    Other,
}

/// DF17 extended squitter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtendedSquitter {
    pub capability: u8,
    pub metype: u8,
    pub mesub: u8,
    pub data: SquitterData,
}

/// Format-specific part of a decoded message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum MessageBody {
    AltitudeReply(AltitudeReply),
    IdentityReply(IdentityReply),
    AllCall { capability: u8 },
    ExtendedSquitter(ExtendedSquitter),
    Other,
}

/// One decoded Mode S frame.
///
/// Fields are populated whether or not `crc_ok` holds; callers that only
/// trust validated data must check it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedMessage {
    /// Frame bytes after any correction. Short frames use the first 7 bytes.
    pub raw: [u8; LONG_MSG_BYTES],
    /// 56 or 112.
    pub bits: usize,
    pub df: u8,
    /// Trailing 24-bit parity field.
    pub crc: u32,
    /// CRC computed over the data bits.
    pub computed_crc: u32,
    pub crc_ok: bool,
    pub corrected: Option<CorrectedBits>,
    pub icao: Icao,
    /// Receive time, seconds.
    pub timestamp: f64,
    pub body: MessageBody,
}

impl DecodedMessage {
    /// The bytes that make up this message.
    pub fn bytes(&self) -> &[u8] {
        &self.raw[..self.bits / 8]
    }

    /// Uppercase hex of the message bytes.
    pub fn hex(&self) -> String {
        hex_encode(self.bytes())
    }

    /// `*<hex>;` raw output form.
    pub fn raw_line(&self) -> String {
        format!("*{};", self.hex())
    }

    pub fn df_name(&self) -> &'static str {
        df_name(self.df).unwrap_or("Unknown")
    }

    pub fn is_long(&self) -> bool {
        self.bits == LONG_MSG_BITS
    }

    pub fn icao_u32(&self) -> u32 {
        icao_to_u32(&self.icao)
    }

    /// Extended squitter part, for DF17 only.
    pub fn squitter(&self) -> Option<&ExtendedSquitter> {
        match &self.body {
            MessageBody::ExtendedSquitter(es) => Some(es),
            _ => None,
        }
    }

    /// Altitude carried by this message, if any.
    pub fn altitude(&self) -> Option<Altitude> {
        match &self.body {
            MessageBody::AltitudeReply(r) => Some(r.altitude),
            MessageBody::ExtendedSquitter(ExtendedSquitter {
                data: SquitterData::AirbornePosition(p),
                ..
            }) => Some(p.altitude),
            _ => None,
        }
    }

    pub fn squawk(&self) -> Option<u16> {
        match &self.body {
            MessageBody::IdentityReply(r) => Some(r.squawk),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
