//! FILENAME: tests/test_driver.rs
//! Debounce, generation tracking and stale-result discard.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use pivot_engine::{compute, PivotConfig, Sorter};
use pivot_pipeline::{PipelineDriver, PipelineError, PipelineSettings, PipelineStatus, PivotPipeline};
use tokio::time::Instant;

fn debounced(ms: u64) -> PivotPipeline {
    PivotPipeline::new(PipelineSettings { debounce_ms: ms, ..Default::default() })
}

#[tokio::test(start_paused = true)]
async fn test_first_request_skips_debounce() {
    let mut handle = PipelineDriver::spawn(debounced(300));
    let started = Instant::now();
    handle.set_source(sales_source(100)).unwrap();
    handle.configure(region_config()).unwrap();
    handle.wait_settled().await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(300));

    let started = Instant::now();
    handle.configure(product_config()).unwrap();
    handle.wait_settled().await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_rapid_changes_collapse_into_one_computation() {
    let mut handle = PipelineDriver::spawn(debounced(300));
    handle.set_source(sales_source(100)).unwrap();
    handle.configure(product_config()).unwrap();
    handle.wait_settled().await.unwrap();

    let last = PivotConfig::new().with_rows(["region"]).with_aggregator("Sum", ["units"]);
    handle.configure(region_config()).unwrap();
    handle.configure(PivotConfig::new().with_cols(["product"])).unwrap();
    let generation = handle.configure(last.clone()).unwrap();
    let result = handle.wait_settled().await.unwrap();

    assert_eq!(*result, compute(&sales_records(100), &last).unwrap());
    assert_eq!(handle.stats().computations, 2);
    match handle.status() {
        PipelineStatus::Settled { generation: settled, .. } => assert_eq!(settled, generation),
        other => panic!("unexpected status {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_stale_offloaded_result_is_discarded() {
    let settings = PipelineSettings { debounce_ms: 10, offload_threshold: 0, ..Default::default() };
    let pipeline = PivotPipeline::new(settings)
        .with_channel(Arc::new(SlowChannel { delay: Duration::from_millis(100) }));
    let mut handle = PipelineDriver::spawn(pipeline);

    handle.set_source(sales_source(100)).unwrap();
    handle.configure(region_config()).unwrap();
    handle.configure(product_config()).unwrap();
    let result = handle.wait_settled().await.unwrap();

    assert_eq!(*result, compute(&sales_records(100), &product_config()).unwrap());
    let stats = handle.stats();
    assert_eq!(stats.stale_discards, 1);
    assert_eq!(stats.offloaded, 2);

    // The discarded result still landed in the cache.
    handle.configure(region_config()).unwrap();
    handle.wait_settled().await.unwrap();
    assert_eq!(handle.stats().result_cache_hits, 1);
}

#[tokio::test(start_paused = true)]
async fn test_configuration_without_source_stays_idle() {
    let mut handle = PipelineDriver::spawn(debounced(50));
    handle.configure(product_config()).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(matches!(handle.status(), PipelineStatus::Idle));

    handle.set_source(sales_source(20)).unwrap();
    let result = handle.wait_settled().await.unwrap();
    assert_eq!(result.row_keys.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failure_is_published() {
    let mut handle = PipelineDriver::spawn(debounced(50));
    handle.set_source(sales_source(20)).unwrap();
    let config = product_config().with_sorter("product", Sorter::custom(|_, _| panic!("bad sorter")));
    handle.configure(config).unwrap();

    assert!(matches!(handle.wait_settled().await, Err(PipelineError::Computation(_))));
    assert!(matches!(handle.status(), PipelineStatus::Failed { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_returns_pipeline() {
    let mut handle = PipelineDriver::spawn(debounced(50));
    handle.set_source(sales_source(20)).unwrap();
    handle.configure(product_config()).unwrap();
    handle.wait_settled().await.unwrap();

    let pipeline = handle.shutdown().await.unwrap();
    assert_eq!(pipeline.cached_results(), 1);
    assert_eq!(pipeline.stats().snapshot().computations, 1);
}
