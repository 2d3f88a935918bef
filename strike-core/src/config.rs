//! Configuration file management for strikefeed.
//!
//! Reads/writes `~/.strikefeed/config.yaml` with the feed endpoint,
//! database path, relay cadence, and dashboard settings. Every value is a
//! pure parameter; none depends on another.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Io(#[from] std::io::Error),
}

/// Full configuration structure.
#[derive(Debug, Clone)]
pub struct Config {
    pub feed: FeedConfig,
    pub database: DatabaseConfig,
    pub relay: RelayConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Upstream WebSocket endpoint.
    pub url: String,
    /// Subscription message sent once after connect.
    pub handshake: String,
    /// Delay before re-attempting a lost connection, seconds.
    pub reconnect_secs: u64,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Drain tick period, milliseconds.
    pub tick_ms: u64,
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            feed: FeedConfig {
                url: "wss://ws2.blitzortung.org/".into(),
                handshake: r#"{"a":111}"#.into(),
                reconnect_secs: 5,
            },
            database: DatabaseConfig {
                path: "data/strikes.db".into(),
            },
            relay: RelayConfig { tick_ms: 100 },
            dashboard: DashboardConfig {
                host: "0.0.0.0".into(),
                port: 5000,
            },
        }
    }
}

/// Get the config directory path (`~/.strikefeed/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".strikefeed")
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

/// Load config from `~/.strikefeed/config.yaml`.
///
/// Returns default config if file doesn't exist.
pub fn load_config() -> Config {
    let path = config_file();
    if !path.exists() {
        return Config::default();
    }

    let text = match std::fs::read_to_string(&path) {
        Ok(t) => t,
        Err(_) => return Config::default(),
    };

    parse_config(&text).unwrap_or_default()
}

/// Save config to `~/.strikefeed/config.yaml`.
pub fn save_config(config: &Config) -> Result<PathBuf, ConfigError> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;

    let path = config_file();
    std::fs::write(&path, serialize_config(config))?;

    Ok(path)
}

/// Parse simple YAML-like config text.
fn parse_config(text: &str) -> Option<Config> {
    let mut config = Config::default();
    let mut current_section: Option<String> = None;

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        let is_indented = line.starts_with("  ") || line.starts_with('\t');

        if let Some((key, val)) = stripped.split_once(':') {
            let key = key.trim();
            let val = val.trim();

            if !is_indented {
                // Every top-level key opens a section; there are no
                // top-level scalars.
                current_section = if val.is_empty() {
                    Some(key.to_string())
                } else {
                    None
                };
            } else if let Some(ref section) = current_section {
                match section.as_str() {
                    "feed" => match key {
                        "url" => {
                            if let Some(v) = parse_string_value(val) {
                                config.feed.url = v;
                            }
                        }
                        "handshake" => {
                            if let Some(v) = parse_string_value(val) {
                                config.feed.handshake = v;
                            }
                        }
                        "reconnect_secs" => {
                            if let Ok(v) = val.parse::<u64>() {
                                config.feed.reconnect_secs = v;
                            }
                        }
                        _ => {}
                    },
                    "database" => {
                        if key == "path" {
                            if let Some(v) = parse_string_value(val) {
                                config.database.path = v;
                            }
                        }
                    }
                    "relay" => {
                        if key == "tick_ms" {
                            if let Ok(v) = val.parse::<u64>() {
                                config.relay.tick_ms = v;
                            }
                        }
                    }
                    "dashboard" => match key {
                        "host" => {
                            if let Some(v) = parse_string_value(val) {
                                config.dashboard.host = v;
                            }
                        }
                        "port" => {
                            if let Ok(v) = val.parse::<u16>() {
                                config.dashboard.port = v;
                            }
                        }
                        _ => {}
                    },
                    _ => {}
                }
            }
        }
    }

    Some(config)
}

fn parse_string_value(val: &str) -> Option<String> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    // Strip quotes
    if (val.starts_with('"') && val.ends_with('"'))
        || (val.starts_with('\'') && val.ends_with('\''))
    {
        return Some(val[1..val.len() - 1].to_string());
    }
    Some(val.to_string())
}

/// Serialize config to YAML-like text.
fn serialize_config(config: &Config) -> String {
    let mut lines = vec!["# strikefeed configuration".to_string(), String::new()];

    lines.push("feed:".into());
    lines.push(format!("  url: \"{}\"", config.feed.url));
    lines.push(format!("  handshake: '{}'", config.feed.handshake));
    lines.push(format!("  reconnect_secs: {}", config.feed.reconnect_secs));
    lines.push(String::new());

    lines.push("database:".into());
    lines.push(format!("  path: \"{}\"", config.database.path));
    lines.push(String::new());

    lines.push("relay:".into());
    lines.push(format!("  tick_ms: {}", config.relay.tick_ms));
    lines.push(String::new());

    lines.push("dashboard:".into());
    lines.push(format!("  host: \"{}\"", config.dashboard.host));
    lines.push(format!("  port: {}", config.dashboard.port));

    lines.join("\n") + "\n"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
