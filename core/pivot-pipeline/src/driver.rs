//! FILENAME: core/pivot-pipeline/src/driver.rs
//! Debounced driver task.
//!
//! The driver owns a `PivotPipeline` on a tokio task. Every source or
//! configuration change gets a generation number. The first computable
//! request runs immediately; later ones wait until changes settle for
//! the debounce delay, and each new change restarts the delay. A result
//! whose generation is older than the latest change is still cached but
//! never published.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pivot_engine::{log_debug, log_info, PivotConfig, PivotResult, RecordSource};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::PipelineError;
use crate::pipeline::{PipelineStats, PivotPipeline, StatsSnapshot};

#[derive(Debug, Clone)]
pub enum PipelineStatus {
    /// Nothing to compute yet (no source or no configuration).
    Idle,
    /// Waiting for changes to settle.
    Scheduled { generation: u64 },
    Running { generation: u64 },
    Settled { generation: u64, result: Arc<PivotResult> },
    Failed { generation: u64, message: String },
}

enum Command {
    SetSource(Arc<RecordSource>),
    Configure(PivotConfig),
}

pub struct PipelineDriver;

impl PipelineDriver {
    /// Moves the pipeline onto a new task. Must be called inside a tokio
    /// runtime.
    pub fn spawn(pipeline: PivotPipeline) -> PipelineHandle {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(PipelineStatus::Idle);
        let generation = Arc::new(AtomicU64::new(0));
        let stats = pipeline.stats();
        let debounce = pipeline.settings().debounce();
        let task = tokio::spawn(drive(pipeline, receiver, status_tx, Arc::clone(&generation), debounce));
        PipelineHandle { commands, status, generation, stats, task }
    }
}

pub struct PipelineHandle {
    commands: mpsc::UnboundedSender<(u64, Command)>,
    status: watch::Receiver<PipelineStatus>,
    generation: Arc<AtomicU64>,
    stats: Arc<PipelineStats>,
    task: JoinHandle<PivotPipeline>,
}

impl PipelineHandle {
    fn send(&self, command: Command) -> Result<u64, PipelineError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.commands.send((generation, command)).map_err(|_| PipelineError::Closed)?;
        Ok(generation)
    }

    /// Returns the generation assigned to this change.
    pub fn set_source(&self, source: Arc<RecordSource>) -> Result<u64, PipelineError> {
        self.send(Command::SetSource(source))
    }

    pub fn configure(&self, config: PivotConfig) -> Result<u64, PipelineError> {
        self.send(Command::Configure(config))
    }

    pub fn status(&self) -> PipelineStatus {
        self.status.borrow().clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Waits until the latest generation issued so far is settled or failed.
    pub async fn wait_settled(&mut self) -> Result<Arc<PivotResult>, PipelineError> {
        let target = self.generation.load(Ordering::SeqCst);
        loop {
            match &*self.status.borrow_and_update() {
                PipelineStatus::Settled { generation, result } if *generation >= target => {
                    return Ok(Arc::clone(result));
                }
                PipelineStatus::Failed { generation, message } if *generation >= target => {
                    return Err(PipelineError::Computation(message.clone()));
                }
                _ => {}
            }
            self.status.changed().await.map_err(|_| PipelineError::Closed)?;
        }
    }

    /// Stops the driver after pending commands and hands the pipeline back.
    pub async fn shutdown(self) -> Result<PivotPipeline, PipelineError> {
        let PipelineHandle { commands, task, .. } = self;
        drop(commands);
        task.await.map_err(|_| PipelineError::Closed)
    }
}

fn apply(pipeline: &mut PivotPipeline, config: &mut Option<PivotConfig>, command: Command) {
    match command {
        Command::SetSource(source) => pipeline.set_source(source),
        Command::Configure(next) => *config = Some(next),
    }
}

async fn drive(
    mut pipeline: PivotPipeline,
    mut commands: mpsc::UnboundedReceiver<(u64, Command)>,
    status: watch::Sender<PipelineStatus>,
    generation: Arc<AtomicU64>,
    debounce: Duration,
) -> PivotPipeline {
    let mut config: Option<PivotConfig> = None;
    let mut first_load = true;

    while let Some((mut latest, command)) = commands.recv().await {
        apply(&mut pipeline, &mut config, command);

        if !first_load {
            status.send_replace(PipelineStatus::Scheduled { generation: latest });
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(debounce) => break,
                    next = commands.recv() => match next {
                        Some((g, command)) => {
                            apply(&mut pipeline, &mut config, command);
                            latest = g;
                            status.send_replace(PipelineStatus::Scheduled { generation: latest });
                            log_debug!("DRIVER", "rescheduled for generation {}", latest);
                        }
                        None => return pipeline,
                    },
                }
            }
        }

        let Some(current) = config.as_ref() else {
            status.send_replace(PipelineStatus::Idle);
            continue;
        };
        if !pipeline.has_source() {
            status.send_replace(PipelineStatus::Idle);
            continue;
        }
        first_load = false;

        status.send_replace(PipelineStatus::Running { generation: latest });
        let outcome = pipeline.calculate(current).await;

        if generation.load(Ordering::SeqCst) != latest {
            pipeline.stats().record_stale_discard();
            log_info!("DRIVER", "discarding result of stale generation {}", latest);
            continue;
        }
        let next = match outcome {
            Ok(result) => PipelineStatus::Settled { generation: latest, result },
            Err(e) => PipelineStatus::Failed { generation: latest, message: e.to_string() },
        };
        status.send_replace(next);
    }
    pipeline
}
