//! Feature-flag store.

use std::collections::HashMap;

use dashmap::DashMap;

/// Runtime kill switches for billable features. `is_enabled` sits on the
/// admission hot path and is synchronous; flag updates are an operator
/// surface, not part of request handling.
pub trait FeatureFlags: Send + Sync {
    /// Flags without an explicit value are enabled.
    fn is_enabled(&self, flag: &str) -> bool;

    fn set_flag(&self, flag: &str, enabled: bool);

    fn set_flags(&self, flags: &HashMap<String, bool>) {
        for (flag, enabled) in flags {
            self.set_flag(flag, *enabled);
        }
    }
}

/// Process-local flag store.
#[derive(Debug, Default)]
pub struct InMemoryFlags {
    flags: DashMap<String, bool>,
}

impl InMemoryFlags {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeatureFlags for InMemoryFlags {
    fn is_enabled(&self, flag: &str) -> bool {
        self.flags.get(flag).map(|entry| *entry).unwrap_or(true)
    }

    fn set_flag(&self, flag: &str, enabled: bool) {
        self.flags.insert(flag.to_string(), enabled);
    }
}
