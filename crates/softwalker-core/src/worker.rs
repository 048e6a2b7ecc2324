//! Background evolution worker.
//!
//! One worker per orchestrator: requests go over an mpsc channel, each reply
//! comes back on its own oneshot. Every request carries a sequence number and
//! the worker answers any queued request older than the newest one with
//! [`WorkerError::Superseded`] instead of evolving it.

use crate::evolution::{evolve, EvolutionConfig, EvolutionError, ScoredGenome};
use crate::genome::Genome;
use crate::rng::derive_generation_rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::{error::Error, fmt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Work item: the scored population of one generation plus GA parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvolveRequest {
    pub creatures: Vec<ScoredGenome>,
    pub config: EvolutionConfig,
    pub seed: u64,
    pub generation: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvolveResponse {
    Genomes { genomes: Vec<Genome> },
    Error { message: String },
}

/// Evolve a request in-process. Worker and fallback both run this, so the
/// same request yields the same genomes on either path.
pub fn run_request(request: EvolveRequest) -> Result<Vec<Genome>, EvolutionError> {
    let EvolveRequest {
        creatures,
        config,
        seed,
        generation,
    } = request;
    let mut rng = derive_generation_rng(seed, generation);
    evolve(creatures, &config, &mut rng)
}

/// [`run_request`] in transport form.
pub fn evolve_request(request: EvolveRequest) -> EvolveResponse {
    match run_request(request) {
        Ok(genomes) => EvolveResponse::Genomes { genomes },
        Err(err) => EvolveResponse::Error {
            message: err.to_string(),
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerError {
    NoRuntime,
    Closed,
    Superseded { seq: u64, newest: u64 },
    Failed(String),
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::NoRuntime => write!(f, "no tokio runtime to host the evolution worker"),
            WorkerError::Closed => write!(f, "evolution worker channel closed"),
            WorkerError::Superseded { seq, newest } => {
                write!(f, "request {seq} superseded by request {newest}")
            }
            WorkerError::Failed(message) => write!(f, "evolution worker failed: {message}"),
        }
    }
}

impl Error for WorkerError {}

impl EvolveResponse {
    pub fn into_result(self) -> Result<Vec<Genome>, WorkerError> {
        match self {
            EvolveResponse::Genomes { genomes } => Ok(genomes),
            EvolveResponse::Error { message } => Err(WorkerError::Failed(message)),
        }
    }
}

struct Job {
    seq: u64,
    request: EvolveRequest,
    reply: oneshot::Sender<Result<Vec<Genome>, WorkerError>>,
}

/// Reply handle for a submitted request.
pub struct PendingEvolution {
    pub seq: u64,
    rx: oneshot::Receiver<Result<Vec<Genome>, WorkerError>>,
}

impl PendingEvolution {
    pub async fn wait(self) -> Result<Vec<Genome>, WorkerError> {
        self.rx.await.map_err(|_| WorkerError::Closed)?
    }
}

pub struct EvolutionWorker {
    tx: mpsc::UnboundedSender<Job>,
    newest: Arc<AtomicU64>,
    handle: JoinHandle<()>,
}

impl EvolutionWorker {
    /// Spawn the worker task on the current tokio runtime.
    pub fn spawn() -> Result<Self, WorkerError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| WorkerError::NoRuntime)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let newest = Arc::new(AtomicU64::new(0));
        let handle = runtime.spawn(serve(rx, Arc::clone(&newest)));
        Ok(Self { tx, newest, handle })
    }

    /// Queue a request. Any request still queued behind it is superseded.
    pub fn submit(&self, request: EvolveRequest) -> Result<PendingEvolution, WorkerError> {
        let seq = self.newest.fetch_add(1, Ordering::AcqRel) + 1;
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Job {
                seq,
                request,
                reply,
            })
            .map_err(|_| WorkerError::Closed)?;
        Ok(PendingEvolution { seq, rx })
    }

    pub async fn evolve(&self, request: EvolveRequest) -> Result<Vec<Genome>, WorkerError> {
        self.submit(request)?.wait().await
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Close the request channel and wait for the task to drain.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(err) = self.handle.await {
            error!("evolution worker join error: {err}");
        }
    }
}

async fn serve(mut rx: mpsc::UnboundedReceiver<Job>, newest: Arc<AtomicU64>) {
    while let Some(job) = rx.recv().await {
        let latest = newest.load(Ordering::Acquire);
        if job.seq < latest {
            debug!(seq = job.seq, newest = latest, "dropping superseded evolve request");
            let _ = job.reply.send(Err(WorkerError::Superseded {
                seq: job.seq,
                newest: latest,
            }));
            continue;
        }
        let Job { seq, request, reply } = job;
        let outcome = tokio::task::spawn_blocking(move || evolve_request(request)).await;
        let result = match outcome {
            Ok(response) => response.into_result(),
            Err(err) => Err(WorkerError::Failed(format!("join error: {err}"))),
        };
        debug!(seq, ok = result.is_ok(), "evolve request finished");
        let _ = reply.send(result);
    }
}
