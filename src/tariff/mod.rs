//! Provider tariffs and internal token prices.
//!
//! Two static lookup tables, loaded at startup and read-only afterwards:
//! [`TariffTable`] maps (provider, model) to real-money unit rates, and
//! [`TokenCostTable`] maps (category, feature) to the internal token price
//! charged against an account balance.

mod pricing;
mod tokens;

pub use pricing::{PricingUnit, ProviderUsage, TariffEntry, TariffTable, TariffTableBuilder};
pub use tokens::{DEFAULT_TOKEN_PRICE, TokenCostTable, TokenCostTableBuilder};
