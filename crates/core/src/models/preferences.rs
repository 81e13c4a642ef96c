use serde::{Deserialize, Serialize};

use super::currency::CurrencyCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

/// Display preferences for the presentation layer.
///
/// Constructed once at startup and handed to whatever renders the UI.
/// Not persisted and not part of the data model.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UiPreferences {
    theme: Theme,
    currency: CurrencyCode,
    compact: bool,
}

impl UiPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// The display currency valuations should be requested in.
    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    pub fn is_compact(&self) -> bool {
        self.compact
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    pub fn set_currency(&mut self, currency: CurrencyCode) {
        self.currency = currency;
    }

    pub fn set_compact(&mut self, compact: bool) {
        self.compact = compact;
    }

    pub fn toggle_compact(&mut self) {
        self.compact = !self.compact;
    }
}
