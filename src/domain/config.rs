// ============================================================================
// Engine Configuration
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const DEFAULT_SYMBOLS: &[&str] = &["BTCUSD", "ETHUSD"];
pub const DEFAULT_TRADE_LIMIT: usize = 50;
pub const MAX_TRADE_LIMIT: usize = 100;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("symbol list contains an empty entry")]
    EmptySymbol,

    #[error("default trade limit {default} must be between 1 and the maximum {max}")]
    TradeLimit { default: usize, max: usize },

    #[error("invalid value for {key}: {value}")]
    InvalidVar { key: &'static str, value: String },
}

/// Runtime settings for the matching engine
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineConfig {
    /// Symbols whose books are rebuilt from the store at startup
    pub known_symbols: BTreeSet<String>,

    /// Trade count returned when the caller's limit is out of range
    pub default_trade_limit: usize,

    /// Largest trade count a caller may request
    pub max_trade_limit: usize,

    /// Reject orders for symbols outside `known_symbols` instead of
    /// creating their books on first use
    pub reject_unknown_symbols: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            known_symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            default_trade_limit: DEFAULT_TRADE_LIMIT,
            max_trade_limit: MAX_TRADE_LIMIT,
            reject_unknown_symbols: false,
        }
    }
}

impl EngineConfig {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known_symbols: symbols.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Load from the environment, reading a `.env` file first if present.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `MATCHING_SYMBOLS` | `BTCUSD,ETHUSD` |
    /// | `MATCHING_DEFAULT_TRADE_LIMIT` | `50` |
    /// | `MATCHING_MAX_TRADE_LIMIT` | `100` |
    /// | `MATCHING_REJECT_UNKNOWN_SYMBOLS` | `false` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(symbols) = lookup("MATCHING_SYMBOLS") {
            config.known_symbols = symbols
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(value) = lookup("MATCHING_DEFAULT_TRADE_LIMIT") {
            config.default_trade_limit = parse_var("MATCHING_DEFAULT_TRADE_LIMIT", &value)?;
        }
        if let Some(value) = lookup("MATCHING_MAX_TRADE_LIMIT") {
            config.max_trade_limit = parse_var("MATCHING_MAX_TRADE_LIMIT", &value)?;
        }
        if let Some(value) = lookup("MATCHING_REJECT_UNKNOWN_SYMBOLS") {
            config.reject_unknown_symbols = parse_var("MATCHING_REJECT_UNKNOWN_SYMBOLS", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Builder method: add a known symbol
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.known_symbols.insert(symbol.into());
        self
    }

    /// Builder method: set default and maximum trade query limits
    pub fn with_trade_limits(mut self, default: usize, max: usize) -> Self {
        self.default_trade_limit = default;
        self.max_trade_limit = max;
        self
    }

    /// Builder method: only accept orders for known symbols
    pub fn reject_unknown_symbols(mut self, reject: bool) -> Self {
        self.reject_unknown_symbols = reject;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.known_symbols.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::EmptySymbol);
        }

        if self.default_trade_limit == 0 || self.default_trade_limit > self.max_trade_limit {
            return Err(ConfigError::TradeLimit {
                default: self.default_trade_limit,
                max: self.max_trade_limit,
            });
        }

        Ok(())
    }

    /// Clamp a caller-supplied trade limit: anything outside
    /// `1..=max_trade_limit` falls back to the default.
    pub fn effective_trade_limit(&self, requested: usize) -> usize {
        if requested == 0 || requested > self.max_trade_limit {
            self.default_trade_limit
        } else {
            requested
        }
    }

    pub fn is_known_symbol(&self, symbol: &str) -> bool {
        self.known_symbols.contains(symbol)
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidVar {
        key,
        value: value.to_string(),
    })
}
