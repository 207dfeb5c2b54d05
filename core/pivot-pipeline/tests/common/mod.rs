//! FILENAME: tests/common/mod.rs
//! Record fixtures and scripted offload channels for pipeline tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pivot_engine::{record, PivotConfig, Record, RecordSource};
use pivot_pipeline::{handle_request, OffloadChannel, PipelineError, PipelineSettings};
use tokio::sync::oneshot;

// ============================================================================
// TEST DATA FIXTURES
// ============================================================================

const REGIONS: [&str; 4] = ["North", "South", "East", "West"];
const PRODUCTS: [&str; 3] = ["Widget", "Gadget", "Gizmo"];

/// Synthetic sales with fractional amounts, so float accumulation order
/// matters when comparing offloaded and inline results.
pub fn sales_records(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| {
            record! {
                "region" => REGIONS[i % REGIONS.len()],
                "product" => PRODUCTS[(i / 5) % PRODUCTS.len()],
                "amount" => (i % 97) as f64 * 0.1 + 0.01,
                "units" => (i % 11) as i64 + 1,
            }
        })
        .collect()
}

pub fn sales_source(count: usize) -> Arc<RecordSource> {
    Arc::new(RecordSource::from(sales_records(count)))
}

pub fn region_config() -> PivotConfig {
    PivotConfig::new()
        .with_rows(["region"])
        .with_cols(["product"])
        .with_aggregator("Sum", ["amount"])
        .with_aggregator("Average", ["amount"])
        .with_aggregator("Sum over Sum", ["amount", "units"])
}

pub fn product_config() -> PivotConfig {
    PivotConfig::new().with_rows(["product"]).with_aggregator("Count", Vec::<String>::new())
}

/// Offloads everything, with a short timeout.
pub fn eager_settings() -> PipelineSettings {
    PipelineSettings {
        offload_threshold: 0,
        offload_timeout_ms: 50,
        ..Default::default()
    }
}

// ============================================================================
// SCRIPTED CHANNELS
// ============================================================================

/// Every submit fails at the transport level.
pub struct FailingChannel;

impl OffloadChannel for FailingChannel {
    fn is_available(&self) -> bool {
        true
    }

    fn submit(&self, _payload: String) -> Result<oneshot::Receiver<String>, PipelineError> {
        Err(PipelineError::Transport("link down".to_string()))
    }
}

/// Accepts requests and never answers.
#[derive(Default)]
pub struct SilentChannel {
    pending: Mutex<Vec<oneshot::Sender<String>>>,
}

impl OffloadChannel for SilentChannel {
    fn is_available(&self) -> bool {
        true
    }

    fn submit(&self, _payload: String) -> Result<oneshot::Receiver<String>, PipelineError> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().push(tx);
        Ok(rx)
    }
}

/// Reports itself unavailable.
pub struct OfflineChannel;

impl OffloadChannel for OfflineChannel {
    fn is_available(&self) -> bool {
        false
    }

    fn submit(&self, _payload: String) -> Result<oneshot::Receiver<String>, PipelineError> {
        panic!("submit called on an unavailable channel")
    }
}

/// Answers correctly but with the wrong correlation id.
pub struct MisroutingChannel;

impl OffloadChannel for MisroutingChannel {
    fn is_available(&self) -> bool {
        true
    }

    fn submit(&self, payload: String) -> Result<oneshot::Receiver<String>, PipelineError> {
        let (tx, rx) = oneshot::channel();
        let response = handle_request(&payload).replacen("\"id\":", "\"id\":1000", 1);
        let _ = tx.send(response);
        Ok(rx)
    }
}

/// Answers correctly after `delay`, using tokio time.
pub struct SlowChannel {
    pub delay: Duration,
}

impl OffloadChannel for SlowChannel {
    fn is_available(&self) -> bool {
        true
    }

    fn submit(&self, payload: String) -> Result<oneshot::Receiver<String>, PipelineError> {
        let (tx, rx) = oneshot::channel();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(handle_request(&payload));
        });
        Ok(rx)
    }
}
