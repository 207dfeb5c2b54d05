//! FILENAME: core/pivot-pipeline/src/settings.rs
//! Tunables for routing, debouncing and cache sizing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSettings {
    /// Record count at or above which a request may be offloaded.
    #[serde(default = "default_offload_threshold")]
    pub offload_threshold: usize,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_offload_timeout_ms")]
    pub offload_timeout_ms: u64,
    #[serde(default = "default_cache_capacity")]
    pub input_cache_capacity: usize,
    #[serde(default = "default_cache_capacity")]
    pub result_cache_capacity: usize,
    /// Master switch; false keeps every computation inline.
    #[serde(default = "default_offload")]
    pub offload: bool,
}

fn default_offload_threshold() -> usize {
    10_000
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_offload_timeout_ms() -> u64 {
    60_000
}

fn default_cache_capacity() -> usize {
    5
}

fn default_offload() -> bool {
    true
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            offload_threshold: default_offload_threshold(),
            debounce_ms: default_debounce_ms(),
            offload_timeout_ms: default_offload_timeout_ms(),
            input_cache_capacity: default_cache_capacity(),
            result_cache_capacity: default_cache_capacity(),
            offload: default_offload(),
        }
    }
}

impl PipelineSettings {
    pub fn from_json_str(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn offload_timeout(&self) -> Duration {
        Duration::from_millis(self.offload_timeout_ms)
    }

    pub fn inline_only() -> Self {
        PipelineSettings { offload: false, ..Default::default() }
    }
}
