//! Decoder configuration and its on-disk form.
//!
//! Reads/writes `~/.modes-decode/config.yaml`. One `Config` is built at
//! startup and handed to the decoder, tracker, and pipeline.

use std::path::{Path, PathBuf};

use crate::cache::ICAO_CACHE_TTL;
use crate::tracker::AIRCRAFT_TTL;
use crate::types::ModesError;

/// Full configuration structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Attempt single-bit correction of DF11/17 frames.
    pub fix_errors: bool,
    /// Drop messages whose checksum could not be validated.
    pub check_crc: bool,
    /// Also attempt two-bit correction of DF17 frames.
    pub aggressive: bool,
    /// Seconds a validated address stays usable for address recovery.
    pub icao_cache_ttl: f64,
    /// Seconds of silence before an aircraft is evicted.
    pub aircraft_ttl: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            fix_errors: true,
            check_crc: true,
            aggressive: false,
            icao_cache_ttl: ICAO_CACHE_TTL,
            aircraft_ttl: AIRCRAFT_TTL,
        }
    }
}

/// Get the config directory path (`~/.modes-decode/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".modes-decode")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `~/.modes-decode/config.yaml`.
///
/// Returns default config if the file doesn't exist or can't be read.
pub fn load_config() -> Config {
    let path = config_file();
    if !path.exists() {
        return Config::default();
    }
    load_config_from(&path).unwrap_or_default()
}

/// Load config from an explicit path.
pub fn load_config_from(path: &Path) -> Result<Config, ModesError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ModesError::Config(format!("{}: {e}", path.display())))?;
    Ok(parse_config(&text))
}

/// Save config to `~/.modes-decode/config.yaml`.
pub fn save_config(config: &Config) -> Result<PathBuf, ModesError> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir).map_err(|e| ModesError::Config(e.to_string()))?;

    let path = config_file();
    std::fs::write(&path, serialize_config(config))
        .map_err(|e| ModesError::Config(e.to_string()))?;

    Ok(path)
}

/// Parse simple YAML-like config text.
///
/// Keys live under `decoder:` and `tracker:` sections. Unknown keys and
/// unparseable values leave the default in place.
pub fn parse_config(text: &str) -> Config {
    let mut config = Config::default();
    let mut current_section: Option<String> = None;

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        let is_indented = line.starts_with("  ") || line.starts_with('\t');

        let Some((key, val)) = stripped.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let val = val.trim();

        if !is_indented {
            current_section = val.is_empty().then(|| key.to_string());
            continue;
        }

        match current_section.as_deref() {
            Some("decoder") => match key {
                "fix_errors" => {
                    if let Some(v) = parse_bool_value(val) {
                        config.fix_errors = v;
                    }
                }
                "check_crc" => {
                    if let Some(v) = parse_bool_value(val) {
                        config.check_crc = v;
                    }
                }
                "aggressive" => {
                    if let Some(v) = parse_bool_value(val) {
                        config.aggressive = v;
                    }
                }
                "icao_cache_ttl" => {
                    if let Some(v) = parse_seconds_value(val) {
                        config.icao_cache_ttl = v;
                    }
                }
                _ => {}
            },
            Some("tracker") => {
                if key == "aircraft_ttl" {
                    if let Some(v) = parse_seconds_value(val) {
                        config.aircraft_ttl = v;
                    }
                }
            }
            _ => {}
        }
    }

    config
}

fn parse_bool_value(val: &str) -> Option<bool> {
    match val {
        "true" | "yes" | "on" => Some(true),
        "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_seconds_value(val: &str) -> Option<f64> {
    val.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

/// Serialize config to YAML-like text.
pub fn serialize_config(config: &Config) -> String {
    let lines = [
        "# modes-decode configuration".to_string(),
        String::new(),
        "decoder:".into(),
        format!("  fix_errors: {}", config.fix_errors),
        format!("  check_crc: {}", config.check_crc),
        format!("  aggressive: {}", config.aggressive),
        format!("  icao_cache_ttl: {}", config.icao_cache_ttl),
        String::new(),
        "tracker:".into(),
        format!("  aircraft_ttl: {}", config.aircraft_ttl),
    ];
    lines.join("\n") + "\n"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.fix_errors);
        assert!(config.check_crc);
        assert!(!config.aggressive);
        assert_eq!(config.icao_cache_ttl, 60.0);
        assert_eq!(config.aircraft_ttl, 60.0);
    }

    #[test]
    fn test_parse_config() {
        let text = r#"
decoder:
  fix_errors: false
  check_crc: no
  aggressive: true
  icao_cache_ttl: 30

tracker:
  aircraft_ttl: 120.5
"#;
        let config = parse_config(text);
        assert!(!config.fix_errors);
        assert!(!config.check_crc);
        assert!(config.aggressive);
        assert_eq!(config.icao_cache_ttl, 30.0);
        assert_eq!(config.aircraft_ttl, 120.5);
    }

    #[test]
    fn test_parse_config_bad_values_keep_defaults() {
        let text = r#"
decoder:
  aggressive: maybe
  icao_cache_ttl: -5
  unknown_key: 1
tracker:
  aircraft_ttl: soon
"#;
        assert_eq!(parse_config(text), Config::default());
    }

    #[test]
    fn test_keys_outside_section_ignored() {
        let text = "aggressive: true\n";
        assert!(!parse_config(text).aggressive);
    }

    #[test]
    fn test_roundtrip() {
        let config = Config {
            fix_errors: false,
            check_crc: true,
            aggressive: true,
            icao_cache_ttl: 45.0,
            aircraft_ttl: 90.0,
        };
        let parsed = parse_config(&serialize_config(&config));
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "decoder:\n  aggressive: on\n").unwrap();

        let config = load_config_from(&path).unwrap();
        assert!(config.aggressive);
        assert!(config.fix_errors);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let err = load_config_from(Path::new("/nonexistent/modes.yaml"));
        assert!(matches!(err, Err(ModesError::Config(_))));
    }
}
