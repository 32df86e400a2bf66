//! Internal token prices per feature.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Price charged for a feature that has no explicit entry. Charging one token
/// instead of zero keeps mistyped feature names from riding for free.
pub const DEFAULT_TOKEN_PRICE: u64 = 1;

/// Maps (category, feature) to the token price deducted from an account
/// balance per invocation. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenCostTable {
    features: HashMap<(String, String), u64>,
}

impl TokenCostTable {
    pub fn builder() -> TokenCostTableBuilder {
        TokenCostTableBuilder::new()
    }

    pub fn token_price(&self, category: &str, feature: &str) -> u64 {
        self.features
            .get(&(category.to_string(), feature.to_string()))
            .copied()
            .unwrap_or(DEFAULT_TOKEN_PRICE)
    }
}

impl Default for TokenCostTable {
    fn default() -> Self {
        TokenCostTableBuilder::new().with_defaults().build()
    }
}

#[derive(Debug, Default)]
pub struct TokenCostTableBuilder {
    features: HashMap<(String, String), u64>,
}

impl TokenCostTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(self) -> Self {
        self.price("prompts", "generate", 1)
            .price("course", "generate_outline", 5)
            .price("course", "generate_lesson", 10)
            .price("contact", "auto_reply", 1)
            .price("audio", "text_to_speech", 15)
            .price("video", "generate_clip", 25)
            .price("email", "render_template", 2)
    }

    pub fn price(mut self, category: impl Into<String>, feature: impl Into<String>, tokens: u64) -> Self {
        self.features.insert((category.into(), feature.into()), tokens);
        self
    }

    pub fn build(self) -> TokenCostTable {
        TokenCostTable {
            features: self.features,
        }
    }
}
