// THEORY:
// Per-image processing is embarrassingly parallel: images share no mutable
// state, so each worker owns a full `SlidePipeline` and processes whole
// images independently. This module provides the run-level orchestration: a
// dispatcher fans image tasks out to a fixed pool of workers over channels,
// and the coordinator collects per-image results through oneshot replies in
// the original submission order, so the shared accumulating report files
// (area report, count log) are appended deterministically no matter which
// worker finishes first.
//
// A failed image (unreadable file, I/O error on its outputs) is logged and
// skipped; per the run's error taxonomy nothing propagates past a single
// image except configuration errors, which abort before any task is
// submitted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};

use crate::core_modules::detector::ObjectDetector;
use crate::core_modules::report;
use crate::pipeline::{ImageSummary, RunConfig, SlidePipeline};

pub struct ImageTask {
    pub path: PathBuf,
    pub result_sender: oneshot::Sender<Result<ImageSummary>>,
}

pub struct WorkerPool {
    task_sender: mpsc::UnboundedSender<ImageTask>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(
        config: RunConfig,
        detector: Arc<dyn ObjectDetector>,
        pool_size: usize,
    ) -> Result<Self> {
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<ImageTask>();
        let mut workers = Vec::new();

        // Create a single dispatcher that distributes tasks to workers.
        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..pool_size)
            .map(|_| mpsc::unbounded_channel::<ImageTask>())
            .unzip();

        // Spawn dispatcher.
        let dispatcher_senders = worker_senders;
        tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                let _ = dispatcher_senders[worker_idx].send(task);
                worker_idx = (worker_idx + 1) % dispatcher_senders.len();
            }
        });

        // Spawn workers, each owning its own pipeline.
        for mut worker_receiver in worker_receivers {
            let pipeline = SlidePipeline::new(config.clone(), detector.clone())?;

            let worker = tokio::task::spawn_blocking(move || {
                while let Some(task) = worker_receiver.blocking_recv() {
                    let result = pipeline.process_file(&task.path);
                    let _ = task.result_sender.send(result);
                }
            });

            workers.push(worker);
        }

        Ok(Self {
            task_sender,
            workers,
        })
    }

    /// Submits one image and returns the receiver for its result.
    pub fn submit(&self, path: PathBuf) -> Result<oneshot::Receiver<Result<ImageSummary>>> {
        let (result_sender, result_receiver) = oneshot::channel();
        self.task_sender
            .send(ImageTask {
                path,
                result_sender,
            })
            .map_err(|_| anyhow::anyhow!("worker pool is shut down"))?;
        Ok(result_receiver)
    }

    /// Closes the task channel and waits for every worker to drain.
    pub async fn shutdown(self) {
        drop(self.task_sender);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

/// Lists the processable images of the input directory: regular files,
/// hidden names (leading dot) skipped, sorted for a reproducible run order.
fn list_images(config: &RunConfig) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    let entries = std::fs::read_dir(&config.img_dir)
        .with_context(|| format!("reading input directory {}", config.img_dir.display()))?;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if name.to_string_lossy().starts_with('.') {
            continue;
        }
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

/// Processes every image of the configured input directory through a worker
/// pool and accumulates the shared run reports. Returns the per-image
/// summaries in input order (failed images omitted).
pub async fn process_directory(
    config: RunConfig,
    detector: Arc<dyn ObjectDetector>,
) -> Result<Vec<ImageSummary>> {
    config.validate()?;
    if !config.out_dir.exists() {
        std::fs::create_dir_all(&config.out_dir)
            .with_context(|| format!("creating output directory {}", config.out_dir.display()))?;
    }

    let images = list_images(&config)?;
    if images.is_empty() {
        log::warn!("no images found in {}", config.img_dir.display());
        return Ok(Vec::new());
    }

    let pool_size = num_cpus::get().min(images.len()).max(1);
    log::info!("processing {} images on {pool_size} workers", images.len());

    let area_report = config.out_dir.join(report::AREA_REPORT_FILENAME);
    let count_report = config.out_dir.join(report::COUNT_REPORT_FILENAME);
    let pool = WorkerPool::new(config, detector, pool_size)?;

    // Submit everything up front, then collect in submission order so the
    // shared reports are appended deterministically.
    let mut receivers = Vec::with_capacity(images.len());
    for path in &images {
        receivers.push(pool.submit(path.clone())?);
    }

    let mut summaries = Vec::new();
    let results = join_all(receivers).await;
    for (path, received) in images.iter().zip(results) {
        let result = received
            .map_err(|_| anyhow::anyhow!("worker dropped result for {}", path.display()))?;
        match result {
            Ok(summary) => {
                report::append_count_line(
                    &count_report,
                    &summary.image_id,
                    summary.detections.len(),
                )?;
                report::append_area_line(&area_report, &summary.areas)?;
                summaries.push(summary);
            }
            Err(err) => {
                log::error!("skipping {}: {err:#}", path.display());
            }
        }
    }

    pool.shutdown().await;
    Ok(summaries)
}
