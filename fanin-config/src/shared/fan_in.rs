use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Strategy used to race two or more input signals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One watcher task per input, all racing on a shared single-fire output.
    #[default]
    FanOut,
    /// Race inputs two at a time, each pair against a signal standing for the remainder.
    Pairwise,
}

impl Strategy {
    /// Returns the label used for this strategy in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::FanOut => "fan_out",
            Strategy::Pairwise => "pairwise",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for combining completion signals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FanInConfig {
    /// Strategy used when two or more inputs are combined.
    #[serde(default)]
    pub strategy: Strategy,
    /// Largest input count for which [`Strategy::Pairwise`] is honored.
    ///
    /// The pairwise strategy chains one level per two inputs, so larger input sets fall back to
    /// [`Strategy::FanOut`]. Never exceeds [`FanInConfig::MAX_PAIRWISE_INPUTS`] in effect.
    #[serde(default = "default_pairwise_max_inputs")]
    pub pairwise_max_inputs: usize,
}

impl FanInConfig {
    /// Default upper bound on inputs raced with [`Strategy::Pairwise`].
    pub const DEFAULT_PAIRWISE_MAX_INPUTS: usize = 8;

    /// Hard upper bound on inputs raced with [`Strategy::Pairwise`].
    pub const MAX_PAIRWISE_INPUTS: usize = 64;

    /// Validates fan-in configuration settings.
    ///
    /// Ensures `pairwise_max_inputs` admits at least one pair and stays within
    /// [`FanInConfig::MAX_PAIRWISE_INPUTS`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.pairwise_max_inputs < 2 {
            return Err(ValidationError::InvalidFieldValue {
                field: "pairwise_max_inputs".to_string(),
                constraint: "must be at least 2".to_string(),
            });
        }

        if self.pairwise_max_inputs > Self::MAX_PAIRWISE_INPUTS {
            return Err(ValidationError::InvalidFieldValue {
                field: "pairwise_max_inputs".to_string(),
                constraint: format!("must be at most {}", Self::MAX_PAIRWISE_INPUTS),
            });
        }

        Ok(())
    }

    /// Returns `pairwise_max_inputs` clamped to [`FanInConfig::MAX_PAIRWISE_INPUTS`].
    ///
    /// Applies even to configurations that were never validated.
    pub fn effective_pairwise_max_inputs(&self) -> usize {
        self.pairwise_max_inputs.min(Self::MAX_PAIRWISE_INPUTS)
    }

    /// Returns the strategy to use for `input_count` inputs.
    pub fn effective_strategy(&self, input_count: usize) -> Strategy {
        match self.strategy {
            Strategy::Pairwise if input_count > self.effective_pairwise_max_inputs() => {
                Strategy::FanOut
            }
            strategy => strategy,
        }
    }
}

impl Default for FanInConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            pairwise_max_inputs: default_pairwise_max_inputs(),
        }
    }
}

fn default_pairwise_max_inputs() -> usize {
    FanInConfig::DEFAULT_PAIRWISE_MAX_INPUTS
}
