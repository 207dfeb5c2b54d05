//! FILENAME: core/pivot-pipeline/src/pipeline.rs
//! One pivot instance's computation path: input cache, result cache,
//! offload routing with timeout, and inline fallback.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use pivot_engine::{
    compute, log_debug, log_enter, log_error, log_exit, log_info, log_warn, panic_message, Derivation,
    NormalizedInput, PivotConfig, PivotResult, Record, RecordSource, TransferableConfig,
};

use crate::cache::{InputCache, ResultCache};
use crate::error::PipelineError;
use crate::fingerprint::{InputFingerprint, ResultFingerprint};
use crate::protocol;
use crate::settings::PipelineSettings;
use crate::worker::OffloadChannel;

// ============================================================================
// STATS
// ============================================================================

/// Counters shared between the pipeline and whoever observes it.
#[derive(Debug, Default)]
pub struct PipelineStats {
    computations: AtomicU64,
    offloaded: AtomicU64,
    fallbacks: AtomicU64,
    input_cache_hits: AtomicU64,
    result_cache_hits: AtomicU64,
    stale_discards: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Requests that missed the result cache and ran the engine.
    pub computations: u64,
    pub offloaded: u64,
    pub fallbacks: u64,
    pub input_cache_hits: u64,
    pub result_cache_hits: u64,
    pub stale_discards: u64,
}

impl PipelineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            computations: self.computations.load(Ordering::Relaxed),
            offloaded: self.offloaded.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            input_cache_hits: self.input_cache_hits.load(Ordering::Relaxed),
            result_cache_hits: self.result_cache_hits.load(Ordering::Relaxed),
            stale_discards: self.stale_discards.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_stale_discard(&self) {
        self.stale_discards.fetch_add(1, Ordering::Relaxed);
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

enum Route {
    Inline(&'static str),
    Offload(TransferableConfig),
}

pub struct PivotPipeline {
    settings: PipelineSettings,
    channel: Option<Arc<dyn OffloadChannel>>,
    source: Option<Arc<RecordSource>>,
    /// Bumped on every new source; part of the input fingerprint.
    source_identity: u64,
    input_cache: InputCache,
    result_cache: ResultCache,
    next_request_id: u64,
    stats: Arc<PipelineStats>,
}

impl PivotPipeline {
    pub fn new(settings: PipelineSettings) -> Self {
        PivotPipeline {
            input_cache: InputCache::new(settings.input_cache_capacity),
            result_cache: ResultCache::new(settings.result_cache_capacity),
            settings,
            channel: None,
            source: None,
            source_identity: 0,
            next_request_id: 0,
            stats: Arc::new(PipelineStats::default()),
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn OffloadChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn cached_results(&self) -> usize {
        self.result_cache.len()
    }

    /// Installs a new raw input. Handing over the same `Arc` again is a
    /// no-op; anything else invalidates both caches.
    pub fn set_source(&mut self, source: Arc<RecordSource>) {
        if let Some(current) = &self.source {
            if Arc::ptr_eq(current, &source) {
                return;
            }
        }
        self.source = Some(source);
        self.source_identity += 1;
        self.input_cache.clear();
        self.result_cache.clear();
        log_info!("PIPELINE", "new record source (identity {}); caches cleared", self.source_identity);
    }

    /// Normalized records plus value inventory, through the input cache.
    pub fn normalized_input(
        &mut self,
        derived: &BTreeMap<String, Derivation>,
    ) -> Result<Arc<NormalizedInput>, PipelineError> {
        let source = self.source.clone().ok_or(PipelineError::NoSource)?;
        let fingerprint = InputFingerprint::of(&source, self.source_identity, derived)?;
        if let Some(hit) = self.input_cache.get(&fingerprint) {
            self.stats.input_cache_hits.fetch_add(1, Ordering::Relaxed);
            log_debug!("PIPELINE", "input cache hit ({} records)", hit.records.len());
            return Ok(hit);
        }

        let input = panic::catch_unwind(AssertUnwindSafe(|| source.materialize(derived)))
            .map_err(|payload| PipelineError::Computation(panic_message(payload.as_ref())))?;
        let input = Arc::new(input);
        self.input_cache.put(fingerprint, Arc::clone(&input));
        log_debug!("PIPELINE", "input cache miss; normalized {} records", input.records.len());
        Ok(input)
    }

    fn route(&self, records: usize, config: &PivotConfig) -> Route {
        if !self.settings.offload {
            return Route::Inline("offload disabled");
        }
        if records < self.settings.offload_threshold {
            return Route::Inline("below offload threshold");
        }
        let Some(transferable) = config.to_transferable() else {
            return Route::Inline("configuration holds closures");
        };
        match &self.channel {
            Some(channel) if channel.is_available() => Route::Offload(transferable),
            _ => Route::Inline("no offload context"),
        }
    }

    /// Runs one request to completion. Recoverable offload failures are
    /// absorbed by computing inline; anything else is returned as is.
    pub async fn calculate(&mut self, config: &PivotConfig) -> Result<Arc<PivotResult>, PipelineError> {
        log_enter!("PIPELINE", "calculate", "rows={:?} cols={:?}", config.rows, config.cols);

        let input = self.normalized_input(&config.derived_attributes)?;
        let fingerprint = ResultFingerprint::of(input.records.len(), config)?;
        if let Some(hit) = self.result_cache.get(&fingerprint) {
            self.stats.result_cache_hits.fetch_add(1, Ordering::Relaxed);
            log_exit!("PIPELINE", "calculate", "result cache hit");
            return Ok(hit);
        }

        self.stats.computations.fetch_add(1, Ordering::Relaxed);
        let result = match self.route(input.records.len(), config) {
            Route::Inline(reason) => {
                log_debug!("PIPELINE", "computing {} records inline: {}", input.records.len(), reason);
                compute_inline(Arc::clone(&input), config.clone()).await?
            }
            Route::Offload(transferable) => match self.offload(&input.records, &transferable).await {
                Ok(result) => {
                    self.stats.offloaded.fetch_add(1, Ordering::Relaxed);
                    result
                }
                Err(e) if !e.is_recoverable() => {
                    log_error!("PIPELINE", "offload failed and cannot fall back: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    log_warn!("PIPELINE", "offload failed, computing inline: {}", e);
                    self.stats.fallbacks.fetch_add(1, Ordering::Relaxed);
                    compute_inline(Arc::clone(&input), config.clone()).await?
                }
            },
        };

        let result = Arc::new(result);
        if let Some(evicted) = self.result_cache.put(fingerprint, Arc::clone(&result)) {
            log_debug!("PIPELINE", "evicted cached result {}", evicted.as_str());
        }
        log_exit!("PIPELINE", "calculate", "{} rows x {} cols", result.row_keys.len(), result.col_keys.len());
        Ok(result)
    }

    async fn offload(
        &mut self,
        records: &[Record],
        config: &TransferableConfig,
    ) -> Result<PivotResult, PipelineError> {
        let channel = self.channel.clone().ok_or(PipelineError::Unavailable)?;
        self.next_request_id += 1;
        let id = self.next_request_id;

        let payload = protocol::encode_request(id, records, config)?;
        let reply = channel.submit(payload)?;
        let timeout = self.settings.offload_timeout();
        let response = match tokio::time::timeout(timeout, reply).await {
            Err(_) => return Err(PipelineError::Timeout(timeout)),
            Ok(Err(_)) => {
                return Err(PipelineError::Transport(format!("request {} dropped by worker", id)))
            }
            Ok(Ok(response)) => response,
        };
        log_debug!("PIPELINE", "offloaded request {} answered ({} bytes)", id, response.len());
        protocol::decode_response(id, &response)
    }
}

/// Runs the engine on the blocking pool so a long computation does not
/// stall the runtime driving timers and commands.
async fn compute_inline(input: Arc<NormalizedInput>, config: PivotConfig) -> Result<PivotResult, PipelineError> {
    let task = tokio::task::spawn_blocking(move || compute(&input.records, &config));
    match task.await {
        Ok(result) => Ok(result?),
        Err(e) => Err(PipelineError::Computation(format!("inline computation aborted: {}", e))),
    }
}
