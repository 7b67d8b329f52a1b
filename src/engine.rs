//! Asynchronous extraction engine.
//!
//! An [`Engine`] owns a pool of worker threads fed from a single unbounded queue. Submitting an
//! image returns a [`JobHandle`] right away; [`JobHandle::features`] blocks until a worker has
//! produced the [`FeatureCollection`] for it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use image::GrayImage;
use tracing::{debug, error, info, warn};

use crate::config::{Config, LogMode};
use crate::error::EngineError;
use crate::features::FeatureCollection;
use crate::processing::ImageprocProcessing;
use crate::pyramid::GaussTable;
use crate::sift::extract_with_processing;

/// What the produced feature collections are going to be used for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProcessingMode {
    /// Features can only be inspected.
    ExtractingMode,
    /// Features can additionally be matched against each other.
    #[default]
    MatchingMode,
}

/// Lifecycle of a submitted job.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Submitted,
    Processing,
    Completed,
    Consumed,
}

impl JobStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => JobStatus::Submitted,
            1 => JobStatus::Processing,
            2 => JobStatus::Completed,
            _ => JobStatus::Consumed,
        }
    }
}

#[derive(Debug, Clone)]
struct SharedStatus(Arc<AtomicU8>);

impl SharedStatus {
    fn new() -> Self {
        SharedStatus(Arc::new(AtomicU8::new(JobStatus::Submitted as u8)))
    }

    fn set(&self, status: JobStatus) {
        self.0.store(status as u8, Ordering::Release);
    }

    fn get(&self) -> JobStatus {
        JobStatus::from_u8(self.0.load(Ordering::Acquire))
    }
}

struct Job {
    id: u64,
    image: GrayImage,
    status: SharedStatus,
    reply: Sender<FeatureCollection>,
}

/// Pending result of a submitted image. Resolving it consumes the handle.
#[derive(Debug)]
pub struct JobHandle {
    id: u64,
    status: SharedStatus,
    result: Receiver<FeatureCollection>,
    alive: Arc<AtomicBool>,
}

impl JobHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn status(&self) -> JobStatus {
        self.status.get()
    }

    /// Block until the job is done and take its features.
    pub fn features(self) -> Result<FeatureCollection, EngineError> {
        if !self.alive.load(Ordering::Acquire) {
            return Err(EngineError::TornDown);
        }
        let features = self
            .result
            .recv()
            .map_err(|_| EngineError::WorkerLost(self.id))?;
        self.status.set(JobStatus::Consumed);
        debug!(job = self.id, "job consumed");
        Ok(features)
    }
}

/// Pool of extraction workers sharing one immutable [`Config`].
pub struct Engine {
    config: Arc<Config>,
    mode: ProcessingMode,
    queue: Option<Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
    alive: Arc<AtomicBool>,
    next_id: AtomicU64,
}

impl Engine {
    /// Validate `config` and start the worker threads.
    pub fn new(config: Config, mode: ProcessingMode) -> crate::Result<Self> {
        config.validate()?;
        if config.print_gauss_tables {
            print!("{}", GaussTable::new(&config));
        }

        let config = Arc::new(config);
        let n_workers = config.worker_count();
        let (queue, jobs) = unbounded::<Job>();
        let workers = (0..n_workers)
            .map(|index| spawn_worker(index, jobs.clone(), Arc::clone(&config), mode))
            .collect::<Result<Vec<_>, _>>()?;
        info!(workers = n_workers, ?mode, "engine started");

        Ok(Engine {
            config,
            mode,
            queue: Some(queue),
            workers,
            alive: Arc::new(AtomicBool::new(true)),
            next_id: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Submit an image for extraction. Never blocks.
    pub fn enqueue(&self, image: GrayImage) -> Result<JobHandle, EngineError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(EngineError::InvalidImage(format!(
                "image has zero size ({}x{})",
                image.width(),
                image.height()
            )));
        }
        let queue = match (&self.queue, self.is_alive()) {
            (Some(queue), true) => queue,
            _ => return Err(EngineError::TornDown),
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let status = SharedStatus::new();
        let (reply, result) = bounded(1);
        queue
            .send(Job {
                id,
                image,
                status: status.clone(),
                reply,
            })
            .map_err(|_| EngineError::WorkerLost(id))?;
        debug!(job = id, "job submitted");

        Ok(JobHandle {
            id,
            status,
            result,
            alive: Arc::clone(&self.alive),
        })
    }

    /// Submit a row-major 8-bit grayscale buffer.
    pub fn enqueue_raw(
        &self,
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    ) -> Result<JobHandle, EngineError> {
        let len = pixels.len();
        let image = GrayImage::from_raw(width, height, pixels)
            .filter(|_| len == width as usize * height as usize)
            .ok_or_else(|| {
                EngineError::InvalidImage(format!(
                    "buffer of {len} bytes does not match {width}x{height}"
                ))
            })?;
        self.enqueue(image)
    }

    /// Let the workers finish every queued job, then stop them.
    /// Handles that were not resolved before this call can no longer be resolved.
    pub fn teardown(&mut self) -> Result<(), EngineError> {
        if !self.is_alive() {
            return Err(EngineError::TornDown);
        }
        // Workers exit once the queue is drained and disconnected.
        self.queue.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("worker thread panicked");
            }
        }
        self.alive.store(false, Ordering::Release);
        info!("engine torn down");
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.is_alive() {
            let _ = self.teardown();
        }
    }
}

fn spawn_worker(
    index: usize,
    jobs: Receiver<Job>,
    config: Arc<Config>,
    mode: ProcessingMode,
) -> Result<thread::JoinHandle<()>, EngineError> {
    thread::Builder::new()
        .name(format!("sift-worker-{index}"))
        .spawn(move || {
            for job in jobs.iter() {
                run_job(job, &config, mode);
            }
            debug!(worker = index, "worker exiting");
        })
        .map_err(|err| EngineError::Spawn(err.to_string()))
}

fn run_job(job: Job, config: &Config, mode: ProcessingMode) {
    let Job {
        id,
        image,
        status,
        reply,
    } = job;
    status.set(JobStatus::Processing);
    debug!(job = id, width = image.width(), height = image.height(), "job started");

    let dump_dir = match config.log_mode {
        LogMode::All => Some(config.log_dir.join(format!("job-{id}"))),
        LogMode::None => None,
    };
    let result = catch_unwind(AssertUnwindSafe(|| {
        extract_with_processing::<ImageprocProcessing>(&image, config, mode, dump_dir.as_deref())
    }));
    match result {
        Ok(features) => {
            info!(
                job = id,
                features = features.feature_count(),
                descriptors = features.descriptor_count(),
                elapsed_ms = features.processing_time().as_millis() as u64,
                "job completed"
            );
            status.set(JobStatus::Completed);
            // The handle may have been dropped already, nobody is waiting then.
            let _ = reply.send(features);
        }
        // Dropping `reply` lets the handle report the lost result.
        Err(_) => error!(job = id, "extraction panicked"),
    }
}
