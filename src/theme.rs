//! Color themes for the dashboard
//!
//! Every theme maps the risk vocabulary (levels, actions, connection state) to colors
//! so that BLOCK always reads as danger and ALLOW as safe, whatever the palette.

use crate::types::{Action, ConnectionState, RiskLevel};
use ratatui::style::Color;
use std::fmt;

/// Available color themes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    /// Nord-inspired muted palette (default)
    #[default]
    Nord,
    /// Pure ANSI colors for terminals without truecolor
    HighContrast,
    /// Amber CRT - orange text on black, risk colors kept saturated
    Amber,
}

impl std::str::FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nord" => Ok(Theme::Nord),
            "contrast" | "high-contrast" | "highcontrast" => Ok(Theme::HighContrast),
            "amber" | "amber-crt" => Ok(Theme::Amber),
            _ => Err(format!(
                "Unknown theme '{s}'. Available: nord, high-contrast, amber"
            )),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Nord => write!(f, "nord"),
            Theme::HighContrast => write!(f, "high-contrast"),
            Theme::Amber => write!(f, "amber"),
        }
    }
}

impl Theme {
    /// Next theme in the Ctrl+T cycle
    pub fn next(self) -> Self {
        match self {
            Theme::Nord => Theme::HighContrast,
            Theme::HighContrast => Theme::Amber,
            Theme::Amber => Theme::Nord,
        }
    }

    pub fn colors(&self) -> ColorScheme {
        match self {
            Theme::Nord => ColorScheme::nord(),
            Theme::HighContrast => ColorScheme::high_contrast(),
            Theme::Amber => ColorScheme::amber(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColorScheme {
    pub text: Color,
    pub text_dim: Color,
    pub focus_border: Color,
    pub unfocused_border: Color,
    pub selection_bg: Color,
    pub selection_fg: Color,
    /// LOW risk / ALLOW / verified
    pub safe: Color,
    /// MEDIUM risk / OTP / connecting
    pub caution: Color,
    /// HIGH risk / BLOCK / rejected / disconnected
    pub danger: Color,
    pub accent: Color,
}

impl ColorScheme {
    pub fn nord() -> Self {
        Self {
            text: Color::Rgb(216, 222, 233),
            text_dim: Color::Rgb(129, 161, 193),
            focus_border: Color::Rgb(136, 192, 208),
            unfocused_border: Color::Rgb(76, 86, 106),
            selection_bg: Color::Rgb(67, 76, 94),
            selection_fg: Color::Rgb(236, 239, 244),
            safe: Color::Rgb(163, 190, 140),
            caution: Color::Rgb(235, 203, 139),
            danger: Color::Rgb(191, 97, 106),
            accent: Color::Rgb(180, 142, 173),
        }
    }

    pub fn high_contrast() -> Self {
        Self {
            text: Color::White,
            text_dim: Color::Gray,
            focus_border: Color::Cyan,
            unfocused_border: Color::DarkGray,
            selection_bg: Color::White,
            selection_fg: Color::Black,
            safe: Color::Green,
            caution: Color::Yellow,
            danger: Color::Red,
            accent: Color::Magenta,
        }
    }

    pub fn amber() -> Self {
        let amber = Color::Rgb(255, 176, 0);
        let amber_dim = Color::Rgb(180, 120, 0);
        Self {
            text: amber,
            text_dim: amber_dim,
            focus_border: Color::Rgb(255, 200, 100),
            unfocused_border: amber_dim,
            selection_bg: amber,
            selection_fg: Color::Black,
            safe: Color::Rgb(100, 255, 100),
            caution: Color::Rgb(255, 230, 80),
            danger: Color::Rgb(255, 60, 60),
            accent: Color::Rgb(255, 100, 255),
        }
    }

    pub fn risk(&self, level: RiskLevel) -> Color {
        match level {
            RiskLevel::Low => self.safe,
            RiskLevel::Medium => self.caution,
            RiskLevel::High => self.danger,
        }
    }

    pub fn action(&self, action: Action) -> Color {
        match action {
            Action::Allow => self.safe,
            Action::Otp => self.caution,
            Action::Block => self.danger,
        }
    }

    pub fn connection(&self, state: ConnectionState) -> Color {
        match state {
            ConnectionState::Connected => self.safe,
            ConnectionState::Connecting => self.caution,
            ConnectionState::Disconnected => self.danger,
        }
    }

    /// Gauge color by score band (matches the backend's 40/70 thresholds)
    pub fn score(&self, score: u8) -> Color {
        match score {
            0..=39 => self.safe,
            40..=69 => self.caution,
            _ => self.danger,
        }
    }
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self::nord()
    }
}
