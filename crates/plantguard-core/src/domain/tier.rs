//! Presentation tiers for light readings.
//!
//! A dashboard colours each reading by the band it falls in.  Bands are
//! defined by *inclusive* upper bounds checked in ascending order:
//!
//! ```text
//! value <= 30  -> Critical  (red)
//! value <= 50  -> Warning   (yellow)
//! value <= 70  -> Ideal     (green)
//! value <= 90  -> Warning   (yellow)
//! otherwise    -> Critical  (red)
//! ```
//!
//! [`BandTable::new`] refuses tables whose bounds are not strictly increasing,
//! so every value maps to exactly one tier and no band can be unreachable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a reading should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Critical,
    Warning,
    Ideal,
}

/// Display colour of a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Yellow,
    Green,
}

impl Tier {
    pub fn color(self) -> Color {
        match self {
            Tier::Critical => Color::Red,
            Tier::Warning => Color::Yellow,
            Tier::Ideal => Color::Green,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::Critical => "critical",
            Tier::Warning => "warning",
            Tier::Ideal => "ideal",
        }
    }
}

/// One band: every value `<= max` not claimed by an earlier band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub max: f64,
    pub tier: Tier,
}

impl Band {
    pub const fn new(max: f64, tier: Tier) -> Self {
        Self { max, tier }
    }
}

/// Reasons a band table is rejected.
#[derive(Debug, Error, PartialEq)]
pub enum BandError {
    #[error("band bound {0} is not a finite number")]
    NonFinite(f64),
    #[error("band bound {next} does not exceed the previous bound {previous}")]
    NotIncreasing { previous: f64, next: f64 },
}

/// An ordered, validated set of bands.
#[derive(Debug, Clone, PartialEq)]
pub struct BandTable {
    bands: Vec<Band>,
    above: Tier,
}

impl BandTable {
    /// Builds a table from bands in ascending order plus the tier used above
    /// the last bound.
    ///
    /// # Errors
    ///
    /// [`BandError::NonFinite`] for NaN/infinite bounds and
    /// [`BandError::NotIncreasing`] when a bound is not strictly greater than
    /// the one before it (such a band would overlap or never match).
    pub fn new(bands: Vec<Band>, above: Tier) -> Result<Self, BandError> {
        let mut previous: Option<f64> = None;
        for band in &bands {
            if !band.max.is_finite() {
                return Err(BandError::NonFinite(band.max));
            }
            if let Some(prev) = previous {
                if band.max <= prev {
                    return Err(BandError::NotIncreasing {
                        previous: prev,
                        next: band.max,
                    });
                }
            }
            previous = Some(band.max);
        }
        Ok(Self { bands, above })
    }

    /// The table used by the browser dashboard.
    pub fn browser() -> Self {
        Self {
            bands: vec![
                Band::new(30.0, Tier::Critical),
                Band::new(50.0, Tier::Warning),
                Band::new(70.0, Tier::Ideal),
                Band::new(90.0, Tier::Warning),
            ],
            above: Tier::Critical,
        }
    }

    /// The table burned into the firmware, which splits off `<= 15` as its
    /// own band (the firmware sounds its buzzer there).
    pub fn firmware() -> Self {
        Self {
            bands: vec![
                Band::new(15.0, Tier::Critical),
                Band::new(30.0, Tier::Critical),
                Band::new(50.0, Tier::Warning),
                Band::new(70.0, Tier::Ideal),
                Band::new(90.0, Tier::Warning),
            ],
            above: Tier::Critical,
        }
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// Maps `value` to its tier; `None` for NaN or infinite values.
    pub fn classify(&self, value: f64) -> Option<Tier> {
        if !value.is_finite() {
            return None;
        }
        let tier = self
            .bands
            .iter()
            .find(|band| value <= band.max)
            .map_or(self.above, |band| band.tier);
        Some(tier)
    }
}

impl Default for BandTable {
    fn default() -> Self {
        Self::browser()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
