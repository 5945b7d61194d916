#![forbid(unsafe_code)]

use std::str::FromStr;

/// Forces the counting strategy of the frequency aggregates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum StrategyOverride {
    /// Let the selector weigh table size against element count.
    #[default]
    Auto,
    Table,
    Set,
}

impl FromStr for StrategyOverride {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(StrategyOverride::Auto),
            "table" => Ok(StrategyOverride::Table),
            "set" => Ok(StrategyOverride::Set),
            other => Err(format!("unknown strategy override: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggrOptions {
    /// Dispatch tiles over the crate-local thread pool (default: true).
    pub parallel: bool,
    /// Fewer tiles than this run on the calling thread (default: 2).
    pub min_parallel_tiles: usize,
    pub strategy: StrategyOverride,
}

impl Default for AggrOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            min_parallel_tiles: 2,
            strategy: StrategyOverride::Auto,
        }
    }
}

impl AggrOptions {
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    pub fn with_strategy(self, strategy: StrategyOverride) -> Self {
        Self { strategy, ..self }
    }

    /// Defaults overridden by `TESSERA_PARALLEL` and `TESSERA_STRATEGY`.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::default();
        if let Some(raw) = get("TESSERA_PARALLEL") {
            match raw.trim().to_ascii_lowercase().as_str() {
                "0" | "false" | "off" | "no" => options.parallel = false,
                "1" | "true" | "on" | "yes" => options.parallel = true,
                other => log::warn!("ignoring TESSERA_PARALLEL={other}"),
            }
        }
        if let Some(raw) = get("TESSERA_STRATEGY") {
            match raw.parse() {
                Ok(strategy) => options.strategy = strategy,
                Err(err) => log::warn!("ignoring TESSERA_STRATEGY: {err}"),
            }
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn environment_overrides_defaults() {
        let options = AggrOptions::from_vars(vars(&[
            ("TESSERA_PARALLEL", "off"),
            ("TESSERA_STRATEGY", "Set"),
        ]));
        assert!(!options.parallel);
        assert_eq!(options.strategy, StrategyOverride::Set);
    }

    #[test]
    fn malformed_values_keep_defaults() {
        let options = AggrOptions::from_vars(vars(&[
            ("TESSERA_PARALLEL", "maybe"),
            ("TESSERA_STRATEGY", "dense"),
        ]));
        assert_eq!(options, AggrOptions::default());
    }
}
