//! Configuration file management for nav-guide.
//!
//! Reads/writes `~/.nav-guide/config.yaml`: guidance thresholds and
//! language, deviation sampling, tracking cadence, the routing service,
//! and an optional announcement webhook.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::deviation::DEVIATION_THRESHOLD_M;
use crate::guidance::{ADVANCE_DISTANCE_M, ANNOUNCE_DISTANCE_M, NEAR_DISTANCE_M};
use crate::phrases::Language;
use crate::types::{NavError, Result};

/// Full configuration structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub guidance: GuidanceConfig,
    pub deviation: DeviationConfig,
    pub tracking: TrackingConfig,
    pub routing: RoutingConfig,
    pub webhook: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuidanceConfig {
    pub language: Language,
    pub near_m: f64,
    pub announce_m: f64,
    pub advance_m: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviationConfig {
    pub threshold_m: f64,
    pub check_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackingConfig {
    pub min_interval_ms: u64,
    pub frame_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutingConfig {
    pub url: String,
    pub profile: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            guidance: GuidanceConfig {
                language: Language::English,
                near_m: NEAR_DISTANCE_M,
                announce_m: ANNOUNCE_DISTANCE_M,
                advance_m: ADVANCE_DISTANCE_M,
            },
            deviation: DeviationConfig {
                threshold_m: DEVIATION_THRESHOLD_M,
                check_interval_ms: 1000,
            },
            tracking: TrackingConfig {
                min_interval_ms: 50,
                frame_interval_ms: 16,
            },
            routing: RoutingConfig {
                url: "https://router.project-osrm.org".into(),
                profile: "driving".into(),
            },
            webhook: None,
        }
    }
}

/// Get the config directory path (`~/.nav-guide/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".nav-guide")
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

/// Load config from `~/.nav-guide/config.yaml`.
///
/// Returns default config if file doesn't exist.
pub fn load_config() -> Config {
    load_config_from(&config_file())
}

/// Load config from an explicit path, falling back to defaults.
pub fn load_config_from(path: &Path) -> Config {
    if !path.exists() {
        return Config::default();
    }
    match std::fs::read_to_string(path) {
        Ok(text) => parse_config(&text),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable config, using defaults");
            Config::default()
        }
    }
}

/// Save config to `~/.nav-guide/config.yaml`.
pub fn save_config(config: &Config) -> Result<PathBuf> {
    let path = config_file();
    save_config_to(config, &path)?;
    Ok(path)
}

/// Save config to an explicit path, creating parent directories.
pub fn save_config_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| NavError::Config(e.to_string()))?;
    }
    std::fs::write(path, serialize_config(config)).map_err(|e| NavError::Config(e.to_string()))
}

/// Parse simple YAML-like config text. Unknown keys and bad values are
/// ignored and leave the default in place.
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
            if val.is_empty() {
                current_section = Some(key.to_string());
            } else {
                current_section = None;
                if key == "webhook" {
                    config.webhook = parse_string_value(val);
                }
            }
            continue;
        }

        let Some(section) = current_section.as_deref() else {
            continue;
        };
        match (section, key) {
            ("guidance", "language") => {
                if let Some(v) = parse_string_value(val) {
                    match v.parse::<Language>() {
                        Ok(lang) => config.guidance.language = lang,
                        Err(e) => warn!(error = %e, "ignoring guidance.language"),
                    }
                }
            }
            ("guidance", "near_m") => set_float(&mut config.guidance.near_m, val),
            ("guidance", "announce_m") => set_float(&mut config.guidance.announce_m, val),
            ("guidance", "advance_m") => set_float(&mut config.guidance.advance_m, val),
            ("deviation", "threshold_m") => set_float(&mut config.deviation.threshold_m, val),
            ("deviation", "check_interval_ms") => {
                set_millis(&mut config.deviation.check_interval_ms, val)
            }
            ("tracking", "min_interval_ms") => {
                set_millis(&mut config.tracking.min_interval_ms, val)
            }
            ("tracking", "frame_interval_ms") => {
                set_millis(&mut config.tracking.frame_interval_ms, val)
            }
            ("routing", "url") => {
                if let Some(v) = parse_string_value(val) {
                    config.routing.url = v.trim_end_matches('/').to_string();
                }
            }
            ("routing", "profile") => {
                if let Some(v) = parse_string_value(val) {
                    config.routing.profile = v;
                }
            }
            _ => {}
        }
    }

    check_guidance_distances(&mut config.guidance);
    config
}

/// Zone radii must nest: `0 < advance_m <= announce_m <= near_m`.
/// Otherwise all three fall back to the defaults.
fn check_guidance_distances(guidance: &mut GuidanceConfig) {
    let ordered = 0.0 < guidance.advance_m
        && guidance.advance_m <= guidance.announce_m
        && guidance.announce_m <= guidance.near_m;
    if ordered {
        return;
    }
    warn!(
        near_m = guidance.near_m,
        announce_m = guidance.announce_m,
        advance_m = guidance.advance_m,
        "guidance distances out of order, using defaults"
    );
    guidance.near_m = NEAR_DISTANCE_M;
    guidance.announce_m = ANNOUNCE_DISTANCE_M;
    guidance.advance_m = ADVANCE_DISTANCE_M;
}

fn parse_string_value(val: &str) -> Option<String> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return Some(val[1..val.len() - 1].to_string());
    }
    Some(val.to_string())
}

fn set_float(slot: &mut f64, val: &str) {
    if let Ok(v) = val.parse::<f64>() {
        if v.is_finite() && v >= 0.0 {
            *slot = v;
        }
    }
}

fn set_millis(slot: &mut u64, val: &str) {
    if let Ok(v) = val.parse::<u64>() {
        *slot = v;
    }
}

/// Serialize config to YAML-like text.
pub fn serialize_config(config: &Config) -> String {
    let mut lines = vec!["# nav-guide configuration".to_string(), String::new()];

    lines.push("guidance:".into());
    lines.push(format!("  language: \"{}\"", config.guidance.language.code()));
    lines.push(format!("  near_m: {}", config.guidance.near_m));
    lines.push(format!("  announce_m: {}", config.guidance.announce_m));
    lines.push(format!("  advance_m: {}", config.guidance.advance_m));
    lines.push(String::new());

    lines.push("deviation:".into());
    lines.push(format!("  threshold_m: {}", config.deviation.threshold_m));
    lines.push(format!("  check_interval_ms: {}", config.deviation.check_interval_ms));
    lines.push(String::new());

    lines.push("tracking:".into());
    lines.push(format!("  min_interval_ms: {}", config.tracking.min_interval_ms));
    lines.push(format!("  frame_interval_ms: {}", config.tracking.frame_interval_ms));
    lines.push(String::new());

    lines.push("routing:".into());
    lines.push(format!("  url: \"{}\"", config.routing.url));
    lines.push(format!("  profile: \"{}\"", config.routing.profile));
    lines.push(String::new());

    match &config.webhook {
        Some(url) => lines.push(format!("webhook: \"{url}\"")),
        None => lines.push("webhook: null".into()),
    }

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
        assert_eq!(config.guidance.language, Language::English);
        assert_eq!(config.guidance.near_m, 100.0);
        assert_eq!(config.deviation.threshold_m, 30.0);
        assert_eq!(config.deviation.check_interval_ms, 1000);
        assert_eq!(config.tracking.min_interval_ms, 50);
        assert_eq!(config.routing.profile, "driving");
        assert!(config.webhook.is_none());
    }

    #[test]
    fn test_parse_config() {
        let text = r#"
guidance:
  language: "ko"
  near_m: 150
  announce_m: 60
  advance_m: 15

deviation:
  threshold_m: 25.5
  check_interval_ms: 500

tracking:
  min_interval_ms: 100
  frame_interval_ms: 33

routing:
  url: "http://localhost:5000/"
  profile: foot

webhook: "https://example.com/hook"
"#;
        let config = parse_config(text);
        assert_eq!(config.guidance.language, Language::Korean);
        assert_eq!(config.guidance.near_m, 150.0);
        assert_eq!(config.guidance.announce_m, 60.0);
        assert_eq!(config.guidance.advance_m, 15.0);
        assert_eq!(config.deviation.threshold_m, 25.5);
        assert_eq!(config.deviation.check_interval_ms, 500);
        assert_eq!(config.tracking.min_interval_ms, 100);
        assert_eq!(config.tracking.frame_interval_ms, 33);
        assert_eq!(config.routing.url, "http://localhost:5000");
        assert_eq!(config.routing.profile, "foot");
        assert_eq!(config.webhook, Some("https://example.com/hook".into()));
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let text = r#"
guidance:
  language: fr
  near_m: lots
  advance_m: -3

webhook: ~
"#;
        let config = parse_config(text);
        assert_eq!(config.guidance.language, Language::English);
        assert_eq!(config.guidance.near_m, 100.0);
        assert_eq!(config.guidance.advance_m, 20.0);
        assert!(config.webhook.is_none());
    }

    #[test]
    fn test_guidance_distances_must_nest() {
        let zero_near = parse_config("guidance:\n  near_m: 0\n");
        assert_eq!(zero_near.guidance, Config::default().guidance);

        let advance_past_near = parse_config(
            "guidance:\n  near_m: 40\n  announce_m: 30\n  advance_m: 45\n",
        );
        assert_eq!(advance_past_near.guidance.near_m, 100.0);
        assert_eq!(advance_past_near.guidance.announce_m, 50.0);
        assert_eq!(advance_past_near.guidance.advance_m, 20.0);

        let zero_advance = parse_config("guidance:\n  advance_m: 0\n");
        assert_eq!(zero_advance.guidance.advance_m, 20.0);

        // Equal radii are allowed
        let equal = parse_config(
            "guidance:\n  near_m: 30\n  announce_m: 30\n  advance_m: 30\n",
        );
        assert_eq!(equal.guidance.near_m, 30.0);
        assert_eq!(equal.guidance.advance_m, 30.0);
    }

    #[test]
    fn test_keys_outside_section_ignored() {
        let config = parse_config("  near_m: 5\nnear_m: 7\n");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_roundtrip() {
        let mut config = Config::default();
        config.guidance.language = Language::Korean;
        config.deviation.threshold_m = 42.0;
        config.routing.url = "http://osrm.local".into();
        config.webhook = Some("https://example.com".into());

        let parsed = parse_config(&serialize_config(&config));
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.tracking.frame_interval_ms = 20;
        save_config_to(&config, &path).unwrap();

        assert_eq!(load_config_from(&path), config);
        assert_eq!(load_config_from(&dir.path().join("missing.yaml")), Config::default());
    }
}
