//! Provider/model pricing definitions for real-money cost calculation.
//!
//! Rates are expressed in USD: per 1k tokens for token-priced models, per
//! single unit (character, image) otherwise. Defaults cover the providers the
//! platform ships with and can be replaced programmatically.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

const TOKENS_PER_RATE_UNIT: Decimal = dec!(1000);

/// How a provider bills for a given model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingUnit {
    /// Billed per 1k input/output tokens.
    PerToken,
    /// Billed per character of input (e.g. speech synthesis).
    PerCharacter,
    /// Billed per generated item (e.g. images).
    PerItem,
}

/// Raw usage reported by a provider for one completed request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Characters or items for non-token pricing.
    pub quantity: u64,
}

impl ProviderUsage {
    pub fn tokens(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            quantity: 0,
        }
    }

    pub fn units(quantity: u64) -> Self {
        Self {
            input_tokens: 0,
            output_tokens: 0,
            quantity,
        }
    }
}

/// Unit rates for one (provider, model) pair. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TariffEntry {
    pub unit: PricingUnit,
    /// USD per 1k input tokens, or per unit for non-token pricing.
    pub input_rate: Decimal,
    /// USD per 1k output tokens; zero for non-token pricing.
    pub output_rate: Decimal,
}

impl TariffEntry {
    pub const fn per_token(input_rate: Decimal, output_rate: Decimal) -> Self {
        Self {
            unit: PricingUnit::PerToken,
            input_rate,
            output_rate,
        }
    }

    pub const fn per_character(rate: Decimal) -> Self {
        Self {
            unit: PricingUnit::PerCharacter,
            input_rate: rate,
            output_rate: Decimal::ZERO,
        }
    }

    pub const fn per_item(rate: Decimal) -> Self {
        Self {
            unit: PricingUnit::PerItem,
            input_rate: rate,
            output_rate: Decimal::ZERO,
        }
    }

    pub fn cost(&self, usage: &ProviderUsage) -> Decimal {
        match self.unit {
            PricingUnit::PerToken => {
                let input = Decimal::from(usage.input_tokens) / TOKENS_PER_RATE_UNIT;
                let output = Decimal::from(usage.output_tokens) / TOKENS_PER_RATE_UNIT;
                input * self.input_rate + output * self.output_rate
            }
            PricingUnit::PerCharacter | PricingUnit::PerItem => {
                Decimal::from(usage.quantity) * self.input_rate
            }
        }
    }
}

/// Lookup table of provider/model rates. Read-only after startup.
#[derive(Debug, Clone)]
pub struct TariffTable {
    entries: HashMap<(String, String), TariffEntry>,
}

impl TariffTable {
    pub fn builder() -> TariffTableBuilder {
        TariffTableBuilder::new()
    }

    pub fn get(&self, provider: &str, model: &str) -> Option<&TariffEntry> {
        self.entries
            .get(&(provider.to_lowercase(), model.to_lowercase()))
    }

    /// Cost of one completed request. Unknown provider/model prices at zero;
    /// admission has already validated the pair.
    pub fn cost(&self, provider: &str, model: &str, usage: &ProviderUsage) -> Decimal {
        self.get(provider, model)
            .map(|entry| entry.cost(usage))
            .unwrap_or(Decimal::ZERO)
    }
}

impl Default for TariffTable {
    fn default() -> Self {
        TariffTableBuilder::new().with_defaults().build()
    }
}

#[derive(Debug, Default)]
pub struct TariffTableBuilder {
    entries: HashMap<(String, String), TariffEntry>,
}

impl TariffTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shipped rates for the providers the platform integrates with.
    pub fn with_defaults(self) -> Self {
        self.entry("openai", "gpt-4", TariffEntry::per_token(dec!(0.03), dec!(0.06)))
            .entry(
                "openai",
                "gpt-4-turbo",
                TariffEntry::per_token(dec!(0.01), dec!(0.03)),
            )
            .entry(
                "openai",
                "gpt-3.5-turbo",
                TariffEntry::per_token(dec!(0.0005), dec!(0.0015)),
            )
            .entry("openai", "dall-e-3", TariffEntry::per_item(dec!(0.04)))
            .entry(
                "anthropic",
                "claude-sonnet",
                TariffEntry::per_token(dec!(0.003), dec!(0.015)),
            )
            .entry(
                "elevenlabs",
                "multilingual-v2",
                TariffEntry::per_character(dec!(0.00003)),
            )
    }

    pub fn entry(
        mut self,
        provider: impl Into<String>,
        model: impl Into<String>,
        entry: TariffEntry,
    ) -> Self {
        self.entries.insert(
            (provider.into().to_lowercase(), model.into().to_lowercase()),
            entry,
        );
        self
    }

    pub fn build(self) -> TariffTable {
        TariffTable {
            entries: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_pricing() {
        let table = TariffTable::default();
        let usage = ProviderUsage::tokens(1000, 500);

        // 1k * 0.03 + 0.5k * 0.06 = 0.06
        let cost = table.cost("openai", "gpt-4", &usage);
        assert_eq!(cost, dec!(0.06));
    }

    #[test]
    fn test_per_item_pricing() {
        let table = TariffTable::default();
        let cost = table.cost("openai", "dall-e-3", &ProviderUsage::units(3));
        assert_eq!(cost, dec!(0.12));
    }

    #[test]
    fn test_per_character_pricing() {
        let table = TariffTable::default();
        let cost = table.cost("elevenlabs", "multilingual-v2", &ProviderUsage::units(10_000));
        assert_eq!(cost, dec!(0.3));
    }

    #[test]
    fn test_unknown_model_is_free() {
        let table = TariffTable::default();
        let cost = table.cost("openai", "gpt-99", &ProviderUsage::tokens(1000, 1000));
        assert_eq!(cost, Decimal::ZERO);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let table = TariffTable::default();
        assert!(table.get("OpenAI", "GPT-4").is_some());
    }

    #[test]
    fn test_custom_entry_overrides_default() {
        let table = TariffTable::builder()
            .with_defaults()
            .entry("openai", "gpt-4", TariffEntry::per_token(dec!(0.01), dec!(0.02)))
            .build();

        let cost = table.cost("openai", "gpt-4", &ProviderUsage::tokens(1000, 0));
        assert_eq!(cost, dec!(0.01));
    }
}
