//! Compact Position Reporting: global decode of airborne positions.
//!
//! An airborne position frame carries 17-bit latitude/longitude fractions
//! of a zone. An even frame (60 latitude zones) paired with an odd frame
//! (59 zones) resolves to an absolute position with no reference point.
//!
//! Zone sizes:
//! - Dlat_even = 360 / 60 = 6.0 degrees
//! - Dlat_odd = 360 / 59 ≈ 6.1017 degrees
//! - Dlon = 360 / max(1, NL(lat) - odd)

use serde::Serialize;

/// 2^17, the range of a CPR coordinate.
const CPR_MAX: f64 = 131072.0;

const DLAT_EVEN: f64 = 360.0 / 60.0;
const DLAT_ODD: f64 = 360.0 / 59.0;

/// Maximum age difference between the frames of a pair (seconds).
pub const MAX_PAIR_AGE: f64 = 10.0;

/// Latitude thresholds (degrees) of the longitude zone table. `|lat|` below
/// entry `i` gives NL = 59 - i; at or above the last entry NL is 1.
const NL_THRESHOLDS: [f64; 58] = [
    10.47047130, 14.82817437, 18.18626357, 21.02939493, 23.54504487, 25.82924707,
    27.93898710, 29.91135686, 31.77209708, 33.53993436, 35.22899598, 36.85025108,
    38.41241892, 39.92256684, 41.38651832, 42.80914012, 44.19454951, 45.54626723,
    46.86733252, 48.16039128, 49.42776439, 50.67150166, 51.89342469, 53.09516153,
    54.27817472, 55.44378444, 56.59318756, 57.72747354, 58.84763776, 59.95459277,
    61.04917774, 62.13216659, 63.20427479, 64.26616523, 65.31845310, 66.36171008,
    67.39646774, 68.42322022, 69.44242631, 70.45451075, 71.45986473, 72.45884545,
    73.45177442, 74.43893416, 75.42056257, 76.39684391, 77.36789461, 78.33374083,
    79.29428225, 80.24923213, 81.19801349, 82.13956981, 83.07199445, 83.99173563,
    84.89166191, 85.75541621, 86.53536998, 87.00000000,
];

/// One raw CPR position as received, with its receive time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CprFrame {
    pub lat: u32,
    pub lon: u32,
    /// Seconds.
    pub time: f64,
}

/// Number of longitude zones at a latitude (NL function).
///
/// 59 at the equator down to 1 at the poles, symmetric about the equator.
pub fn nl(lat: f64) -> i32 {
    let lat = lat.abs();
    NL_THRESHOLDS
        .iter()
        .position(|&t| lat < t)
        .map_or(1, |i| 59 - i as i32)
}

/// Modulo that always returns a non-negative result.
fn modulo(x: f64, y: f64) -> f64 {
    x - y * (x / y).floor()
}

/// Globally decode an even/odd pair into `(latitude, longitude)` degrees.
///
/// The more recent frame is the reference; on equal times the odd frame is
/// used. Returns `None` when the two candidate latitudes fall in different
/// longitude zones (the aircraft crossed a zone boundary between frames).
/// The caller is responsible for rejecting pairs further apart than
/// `MAX_PAIR_AGE`.
pub fn global_decode(even: &CprFrame, odd: &CprFrame) -> Option<(f64, f64)> {
    let lat0 = even.lat as f64;
    let lat1 = odd.lat as f64;
    let lon0 = even.lon as f64;
    let lon1 = odd.lon as f64;

    // Latitude index
    let j = ((59.0 * lat0 - 60.0 * lat1) / CPR_MAX + 0.5).floor();

    let mut rlat0 = DLAT_EVEN * (modulo(j, 60.0) + lat0 / CPR_MAX);
    let mut rlat1 = DLAT_ODD * (modulo(j, 59.0) + lat1 / CPR_MAX);
    if rlat0 >= 270.0 {
        rlat0 -= 360.0;
    }
    if rlat1 >= 270.0 {
        rlat1 -= 360.0;
    }

    if nl(rlat0) != nl(rlat1) {
        return None;
    }

    let use_even = even.time > odd.time;
    let (lat, lon_ref, odd_flag) = if use_even {
        (rlat0, lon0, 0)
    } else {
        (rlat1, lon1, 1)
    };

    let nl_val = nl(lat);
    let ni = (nl_val - odd_flag).max(1) as f64;
    let m = ((lon0 * (nl_val - 1) as f64 - lon1 * nl_val as f64) / CPR_MAX + 0.5).floor();
    let mut lon = (360.0 / ni) * (modulo(m, ni) + lon_ref / CPR_MAX);
    if lon > 180.0 {
        lon -= 360.0;
    }

    Some((lat, lon))
}

/// True when two frames are close enough in time to be paired.
pub fn within_pair_window(even: &CprFrame, odd: &CprFrame) -> bool {
    (even.time - odd.time).abs() <= MAX_PAIR_AGE
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn frame(lat: u32, lon: u32, time: f64) -> CprFrame {
        CprFrame { lat, lon, time }
    }

    #[test]
    fn test_nl_equator() {
        assert_eq!(nl(0.0), 59);
        assert_eq!(nl(10.47), 59);
    }

    #[test]
    fn test_nl_boundaries() {
        assert_eq!(nl(10.47047130), 58);
        assert_eq!(nl(52.0), 36);
        assert_eq!(nl(86.9), 2);
    }

    #[test]
    fn test_nl_poles() {
        assert_eq!(nl(87.0), 1);
        assert_eq!(nl(-87.0), 1);
        assert_eq!(nl(90.0), 1);
    }

    #[test]
    fn test_nl_symmetric() {
        for lat in [5.0, 33.3, 52.2572, 71.0, 86.6] {
            assert_eq!(nl(lat), nl(-lat), "NL asymmetric at {lat}");
        }
    }

    #[test]
    fn test_global_decode_even_reference() {
        // "The 1090MHz Riddle" pair, even frame received last
        let even = frame(93000, 51372, 1.0);
        let odd = frame(74158, 50194, 0.0);
        let (lat, lon) = global_decode(&even, &odd).expect("same zone");
        assert_approx_eq!(lat, 52.2572, 1e-4);
        assert_approx_eq!(lon, 3.91937, 1e-4);
    }

    #[test]
    fn test_global_decode_odd_reference() {
        let even = frame(93000, 51372, 0.0);
        let odd = frame(74158, 50194, 1.0);
        let (lat, lon) = global_decode(&even, &odd).expect("same zone");
        assert_approx_eq!(lat, 52.26578, 1e-4);
        assert_approx_eq!(lon, 3.93891, 1e-4);
    }

    #[test]
    fn test_equal_times_use_odd() {
        let even = frame(93000, 51372, 5.0);
        let odd = frame(74158, 50194, 5.0);
        let (lat, _) = global_decode(&even, &odd).unwrap();
        assert_approx_eq!(lat, 52.26578, 1e-4);
    }

    #[test]
    fn test_zone_mismatch_rejected() {
        // Candidates straddle the 10.47° NL boundary (59 vs 58)
        let even = frame(97648, 0, 1.0);
        let odd = frame(94372, 0, 0.0);
        assert!(global_decode(&even, &odd).is_none());
    }

    #[test]
    fn test_pair_window() {
        let even = frame(93000, 51372, 20.0);
        assert!(within_pair_window(&even, &frame(74158, 50194, 10.0)));
        assert!(!within_pair_window(&even, &frame(74158, 50194, 9.5)));
    }

    #[test]
    fn test_modulo_positive() {
        assert_approx_eq!(modulo(7.0, 3.0), 1.0);
    }

    #[test]
    fn test_modulo_negative() {
        assert_approx_eq!(modulo(-1.0, 60.0), 59.0);
    }
}
