// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Tunables for a [`Link`](crate::Link).
use crate::history::Millis;

/// Configuration of a [`Link`](crate::Link).
///
/// With the `serde` feature, missing fields fall back to their defaults, so a partial
/// configuration file is enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct LinkConfig {
    /// The instant both watermarks start at. Nothing before it can ever be demanded or
    /// responded to.
    pub start_millis: Millis,

    /// The deepest [`Value`](crate::Value) an inbound message may carry.
    pub max_value_depth: usize,

    /// The most demand and response batches, combined, an inbound message may carry.
    pub max_batches: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            start_millis: 0,
            max_value_depth: 32,
            max_batches: 4096,
        }
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;

    #[test]
    fn partial_config_uses_defaults() {
        let config: LinkConfig = serde_json::from_str(r#"{ "maxValueDepth": 4 }"#).unwrap();
        assert_eq!(
            config,
            LinkConfig {
                max_value_depth: 4,
                ..LinkConfig::default()
            }
        );
    }
}
