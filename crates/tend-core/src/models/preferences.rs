//! Device-local preferences stored under singleton keys

use serde::{Deserialize, Serialize};

use crate::storage::{keys, LocalStore};

/// Theme mode options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    /// Light theme
    Light,
    /// Dark theme
    Dark,
    /// Follow system preference
    #[default]
    System,
}

/// Preferences that never sync; they live beside the domain keys locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    /// Theme mode
    pub theme: ThemeMode,
    /// ISO 4217 currency code used when displaying amounts
    pub currency: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: ThemeMode::System,
            currency: "USD".to_string(),
        }
    }
}

impl Preferences {
    /// Load preferences, falling back to defaults per key.
    #[must_use]
    pub fn load(local: &LocalStore) -> Self {
        let defaults = Self::default();
        let currency = local
            .load(keys::CURRENCY, defaults.currency)
            .trim()
            .to_ascii_uppercase();
        Self {
            theme: local.load(keys::THEME, defaults.theme),
            currency: if currency.is_empty() {
                "USD".to_string()
            } else {
                currency
            },
        }
    }

    pub fn save(&self, local: &LocalStore) -> crate::Result<()> {
        local.save(keys::THEME, &self.theme)?;
        local.save(keys::CURRENCY, &self.currency)
    }

    /// Render an amount with the preferred currency code.
    #[must_use]
    pub fn format_amount(&self, amount: f64) -> String {
        format!("{amount:.2} {}", self.currency)
    }
}
