//! Peer use cases: react to broadcasts, press the button, report the window.

use plantguard_core::{Action, ActionCode, ClientEvent, Color, CommandCodes, HubEvent, Scalar};

use crate::domain::config::PeerConfig;
use crate::domain::dashboard::{Dashboard, DisplayUpdate};

/// Width of the rendered bar in characters.
const BAR_WIDTH: usize = 20;

/// What a hub broadcast means for this dashboard.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerOutput {
    /// A numeric reading to draw.
    Reading(DisplayUpdate),
    /// A reading with no numeric value; shown as-is, no tier.
    Unclassified(Scalar),
    /// Someone pressed the button.  `action` is `None` for codes outside the
    /// configured table.
    ButtonPressed {
        code: ActionCode,
        action: Option<Action>,
    },
}

#[derive(Debug, Clone)]
pub struct PeerService {
    dashboard: Dashboard,
    codes: CommandCodes,
}

impl PeerService {
    pub fn new(config: &PeerConfig) -> Self {
        Self {
            dashboard: Dashboard::new(config.bands.clone()),
            codes: config.codes.clone(),
        }
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    pub fn on_hub_event(&mut self, event: HubEvent) -> PeerOutput {
        match event {
            HubEvent::Luminosidade(reading) => match self.dashboard.on_reading(&reading.value) {
                Some(update) => PeerOutput::Reading(update),
                None => PeerOutput::Unclassified(reading.value),
            },
            HubEvent::BotaoClicado(code) => {
                let action = self.codes.decode(&code);
                PeerOutput::ButtonPressed { code, action }
            }
        }
    }

    /// Toggles the window and returns the `botao_clicado` event to send.
    pub fn press_button(&mut self) -> ClientEvent {
        let command = self.dashboard.toggle();
        ClientEvent::BotaoClicado {
            acao: self.codes.encode(command.action),
        }
    }

    /// A `janela` status report with the current window state.
    pub fn window_report(&self) -> ClientEvent {
        ClientEvent::Janela {
            status: serde_json::Value::String(self.dashboard.window().to_string()),
        }
    }
}

/// One terminal line for `output`.
pub fn render(output: &PeerOutput) -> String {
    match output {
        PeerOutput::Reading(update) => {
            let filled = ((update.width_percent / 100.0) * BAR_WIDTH as f64).round() as usize;
            let filled = filled.min(BAR_WIDTH);
            format!(
                "light {:>7} [{}{}] {} ({})",
                update.percent_label,
                "#".repeat(filled),
                ".".repeat(BAR_WIDTH - filled),
                update.tier.label(),
                color_name(update.tier.color()),
            )
        }
        PeerOutput::Unclassified(value) => format!("light {value} (not a number)"),
        PeerOutput::ButtonPressed {
            code,
            action: Some(action),
        } => format!("button pressed: {action} ({code})"),
        PeerOutput::ButtonPressed { code, action: None } => {
            format!("button pressed: unknown code {code}")
        }
    }
}

fn color_name(color: Color) -> &'static str {
    match color {
        Color::Red => "red",
        Color::Yellow => "yellow",
        Color::Green => "green",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use plantguard_core::{SensorReading, Tier};

    #[test]
    fn test_press_button_alternates_codes() {
        // Arrange
        let mut service = PeerService::new(&PeerConfig::default());

        // Act
        let first = service.press_button();
        let second = service.press_button();

        // Assert
        assert_eq!(first, ClientEvent::BotaoClicado { acao: ActionCode::new("A") });
        assert_eq!(second, ClientEvent::BotaoClicado { acao: ActionCode::new("F") });
    }

    #[test]
    fn test_press_button_serializes_like_the_browser() {
        let mut service = PeerService::new(&PeerConfig::default());
        let json = serde_json::to_value(service.press_button()).unwrap();
        assert_eq!(json, serde_json::json!({"event":"botao_clicado","data":{"acao":"A"}}));
    }

    #[test]
    fn test_reading_broadcast_becomes_display_update() {
        let mut service = PeerService::new(&PeerConfig::default());

        let output = service.on_hub_event(HubEvent::Luminosidade(SensorReading::new(20)));

        match output {
            PeerOutput::Reading(update) => assert_eq!(update.tier, Tier::Critical),
            other => panic!("expected a reading, got {other:?}"),
        }
    }

    #[test]
    fn test_text_reading_is_unclassified() {
        let mut service = PeerService::new(&PeerConfig::default());
        let output = service.on_hub_event(HubEvent::Luminosidade(SensorReading::new("dark")));
        assert_eq!(output, PeerOutput::Unclassified(Scalar::Text("dark".to_string())));
    }

    #[test]
    fn test_button_broadcast_is_decoded() {
        let mut service = PeerService::new(&PeerConfig::default());
        let output = service.on_hub_event(HubEvent::BotaoClicado(ActionCode::new("F")));
        assert_eq!(
            output,
            PeerOutput::ButtonPressed {
                code: ActionCode::new("F"),
                action: Some(Action::Close)
            }
        );
    }

    #[test]
    fn test_window_report_tracks_toggle() {
        let mut service = PeerService::new(&PeerConfig::default());
        service.press_button();
        assert_eq!(
            service.window_report(),
            ClientEvent::Janela {
                status: serde_json::json!("open")
            }
        );
    }

    #[test]
    fn test_render_draws_bar_proportionally() {
        let line = render(&PeerOutput::Reading(DisplayUpdate {
            percent_label: "50%".to_string(),
            tier: Tier::Warning,
            width_percent: 50.0,
        }));
        assert_eq!(line, "light     50% [##########..........] warning (yellow)");
    }
}
