//! Application-level configuration loading: overlay bounds, spotlight timing and channel sizes.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::overlay::{OverlayDisplayState, OverlayPosition, ScaleBounds};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SCOREBOARD_BACK_CONFIG_PATH";
const DEFAULT_SPOTLIGHT_MS: u64 = 3_000;
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Overlay presentation settings shared by controllers and viewers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlaySettings {
    /// Range accepted for operator scale commands.
    pub scale_bounds: ScaleBounds,
    /// State a viewer starts from before any command arrives.
    pub initial: OverlayDisplayState,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            scale_bounds: ScaleBounds::DEFAULT,
            initial: OverlayDisplayState::default(),
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Initial overlay and accepted scale range.
    pub overlay: OverlaySettings,
    /// How long a player popup stays on screen.
    pub spotlight_duration: Duration,
    /// Capacity of the change feed and of each per-game broadcast channel.
    pub channel_capacity: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json_str(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        spotlight_ms = app_config.spotlight_duration.as_millis() as u64,
                        channel_capacity = app_config.channel_capacity,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document, filling omitted keys with defaults.
    pub fn from_json_str(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    spotlight_duration_ms: u64,
    channel_capacity: usize,
    overlay: RawOverlay,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            spotlight_duration_ms: DEFAULT_SPOTLIGHT_MS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            overlay: RawOverlay::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawOverlay {
    min_scale: f32,
    max_scale: f32,
    default_position: OverlayPosition,
    default_scale: f32,
}

impl Default for RawOverlay {
    fn default() -> Self {
        let initial = OverlayDisplayState::default();
        Self {
            min_scale: ScaleBounds::DEFAULT.min,
            max_scale: ScaleBounds::DEFAULT.max,
            default_position: initial.position,
            default_scale: initial.scale,
        }
    }
}

impl From<RawOverlay> for OverlaySettings {
    fn from(value: RawOverlay) -> Self {
        let valid_bounds = value.min_scale.is_finite()
            && value.max_scale.is_finite()
            && value.min_scale > 0.0
            && value.min_scale <= value.max_scale;
        let scale_bounds = if valid_bounds {
            ScaleBounds {
                min: value.min_scale,
                max: value.max_scale,
            }
        } else {
            warn!(
                min = value.min_scale,
                max = value.max_scale,
                "invalid overlay scale bounds; using defaults"
            );
            ScaleBounds::DEFAULT
        };

        Self {
            scale_bounds,
            initial: OverlayDisplayState {
                position: value.default_position,
                scale: scale_bounds.clamp(value.default_scale, 1.0),
            },
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let spotlight_ms = if value.spotlight_duration_ms == 0 {
            DEFAULT_SPOTLIGHT_MS
        } else {
            value.spotlight_duration_ms
        };
        Self {
            overlay: value.overlay.into(),
            spotlight_duration: Duration::from_millis(spotlight_ms),
            channel_capacity: value.channel_capacity.max(1),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
