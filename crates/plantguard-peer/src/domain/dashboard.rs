//! Dashboard state: the last reading, its tier and the window toggle.
//!
//! The dashboard mirrors what the browser page shows:
//!
//! - a percentage label and a bar whose width follows the reading,
//! - the bar colour taken from the reading's [`Tier`],
//! - one button that alternates between opening and closing the window.
//!
//! The toggle is local: a press from another peer is broadcast by the hub but
//! does not flip this dashboard's button.

use std::fmt;

use plantguard_core::{Action, BandTable, Command, Scalar, Tier};

/// Window state as far as this dashboard knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowState {
    #[default]
    Closed,
    Open,
}

impl fmt::Display for WindowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowState::Closed => f.write_str("closed"),
            WindowState::Open => f.write_str("open"),
        }
    }
}

/// What to redraw after a numeric reading.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayUpdate {
    /// The reading as shown, e.g. `"55%"`.
    pub percent_label: String,
    pub tier: Tier,
    /// Bar width in percent, clamped to `0..=100`.
    pub width_percent: f64,
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    bands: BandTable,
    window: WindowState,
    last_reading: Option<Scalar>,
    last_tier: Option<Tier>,
}

impl Dashboard {
    pub fn new(bands: BandTable) -> Self {
        Self {
            bands,
            window: WindowState::Closed,
            last_reading: None,
            last_tier: None,
        }
    }

    pub fn window(&self) -> WindowState {
        self.window
    }

    pub fn last_reading(&self) -> Option<&Scalar> {
        self.last_reading.as_ref()
    }

    pub fn last_tier(&self) -> Option<Tier> {
        self.last_tier
    }

    /// Flips the window state and returns the command to send.
    ///
    /// `Closed → Open` yields [`Action::Open`], `Open → Closed` yields
    /// [`Action::Close`].
    pub fn toggle(&mut self) -> Command {
        let (next, action) = match self.window {
            WindowState::Closed => (WindowState::Open, Action::Open),
            WindowState::Open => (WindowState::Closed, Action::Close),
        };
        self.window = next;
        Command::new(action)
    }

    /// Records a reading and returns the redraw for it.
    ///
    /// Non-numeric readings are remembered but yield `None`; the previous tier
    /// stays on screen.
    pub fn on_reading(&mut self, value: &Scalar) -> Option<DisplayUpdate> {
        self.last_reading = Some(value.clone());
        let numeric = value.as_f64()?;
        let tier = self.bands.classify(numeric)?;
        self.last_tier = Some(tier);

        Some(DisplayUpdate {
            percent_label: format!("{}%", value.to_string().trim()),
            tier,
            width_percent: numeric.clamp(0.0, 100.0),
        })
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new(BandTable::default())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
