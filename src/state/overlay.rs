//! Per-viewer overlay presentation state and the transient player spotlight.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use utoipa::ToSchema;

use super::scoreboard::TeamSide;

/// Screen anchor for the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum OverlayPosition {
    #[default]
    TopLeft,
    TopCenter,
    TopRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

/// Inclusive range a requested overlay scale must fall into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleBounds {
    /// Smallest accepted scale.
    pub min: f32,
    /// Largest accepted scale.
    pub max: f32,
}

impl ScaleBounds {
    /// Bounds offered by the operator slider.
    pub const DEFAULT: Self = Self { min: 0.5, max: 3.0 };

    /// Whether `scale` is finite and inside the bounds.
    pub fn contains(&self, scale: f32) -> bool {
        scale.is_finite() && scale >= self.min && scale <= self.max
    }

    /// Clamp a scale into the bounds; non-finite input falls back to `fallback`.
    pub fn clamp(&self, scale: f32, fallback: f32) -> f32 {
        if scale.is_finite() {
            scale.clamp(self.min, self.max)
        } else {
            fallback.clamp(self.min, self.max)
        }
    }
}

impl Default for ScaleBounds {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Where and how large a viewer renders its overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct OverlayDisplayState {
    /// Anchor corner or edge of the overlay.
    pub position: OverlayPosition,
    /// Render scale, `1.0` being the natural size.
    pub scale: f32,
}

impl Default for OverlayDisplayState {
    fn default() -> Self {
        Self {
            position: OverlayPosition::TopLeft,
            scale: 1.0,
        }
    }
}

/// Minimal player descriptor carried by a spotlight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PlayerRef {
    /// Roster identifier, when the operator picked a known player.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name.
    pub name: String,
    /// Jersey number as printed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// Headshot shown next to the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// A player highlight currently shown by a viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSpotlight {
    /// Player being highlighted.
    pub player: PlayerRef,
    /// Team the player belongs to, which picks the panel colours.
    pub side: TeamSide,
    /// Moment the highlight is taken down.
    pub expires_at: Instant,
}

impl PlayerSpotlight {
    /// Start showing `player` now for `duration`.
    pub fn show(player: PlayerRef, side: TeamSide, duration: Duration) -> Self {
        Self {
            player,
            side,
            expires_at: Instant::now() + duration,
        }
    }

    /// Whether the display window has elapsed at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Time left before the spotlight disappears.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_use_kebab_case_on_the_wire() {
        let json = serde_json::to_string(&OverlayPosition::BottomCenter).expect("serialize");
        assert_eq!(json, "\"bottom-center\"");
        let parsed: OverlayPosition = serde_json::from_str("\"top-right\"").expect("parse");
        assert_eq!(parsed, OverlayPosition::TopRight);
        assert!(serde_json::from_str::<OverlayPosition>("\"middle\"").is_err());
    }

    #[test]
    fn scale_bounds_reject_out_of_range_values() {
        let bounds = ScaleBounds::default();
        assert!(bounds.contains(0.5));
        assert!(bounds.contains(3.0));
        assert!(!bounds.contains(0.4));
        assert!(!bounds.contains(f32::NAN));
        assert_eq!(bounds.clamp(7.0, 1.0), 3.0);
        assert_eq!(bounds.clamp(f32::INFINITY, 1.0), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn spotlight_expires_after_its_duration() {
        let spotlight = PlayerSpotlight::show(
            PlayerRef {
                id: None,
                name: "Kim".into(),
                number: Some("17".into()),
                photo_url: None,
            },
            TeamSide::Home,
            Duration::from_secs(3),
        );
        assert!(!spotlight.is_expired(Instant::now()));

        tokio::time::advance(Duration::from_millis(2_999)).await;
        assert_eq!(spotlight.remaining(Instant::now()), Duration::from_millis(1));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(spotlight.is_expired(Instant::now()));
    }
}
