//! Mining workers
//!
//! Each worker is one OS thread driving one [`Solver`] on its own backend
//! and solver memory. A worker loops over the latest job: claim a range of
//! nonces, run one solve attempt per nonce, check any proof found, and
//! submit it if it meets the job target. A newer job is picked up at the
//! next nonce; a clean job also aborts the attempt in flight.
//!
//! Backend failures are fatal to the attempt only. The worker rebuilds its
//! backend and memory through the [`BackendFactory`] up to
//! `backend_retries` times in a row before giving up.

use crate::config::MinerConfig;
use crate::error::MinerError;
use crate::job::{ActiveJob, JobBoard};
use crate::share::{Share, ShareSink};
use crate::stats::MinerStats;
use cuckaroo::{
    Backend, CpuBackend, Cuckaroo, Monitor, Outcome, Params, SipKeys, Solver, SolverMemory, Stage,
};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Backend type driven by every worker
pub type BoxedBackend = Box<dyn Backend + Send>;

/// Builds the backend for a worker, given the worker's index
pub type BackendFactory = Arc<dyn Fn(usize) -> Result<BoxedBackend, cuckaroo::Error> + Send + Sync>;

/// What a worker is doing right now
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, strum::Display, strum::FromRepr, strum::EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
#[repr(u8)]
#[non_exhaustive]
pub enum MinerState {
    /// Waiting for a job to be published
    AwaitingJob,
    /// Filling the edge buckets
    Generating,
    /// Running trimming rounds
    Trimming,
    /// Searching the residual graph and recovering nonces
    Extracting,
    /// Checking and handing over a proof
    Submitting,
    /// The worker has exited
    Stopped,
}

/// A [`MinerState`] readable from other threads
#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: MinerState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    fn set(&self, state: MinerState) {
        self.0.store(state as u8, Ordering::Relaxed);
    }

    fn get(&self) -> MinerState {
        MinerState::from_repr(self.0.load(Ordering::Relaxed)).unwrap_or(MinerState::Stopped)
    }
}

/// Monitor for one attempt: tracks the stage, aborts on stale jobs
struct AttemptMonitor<'a> {
    /// Board the job came from
    board: &'a JobBoard,
    /// Job being mined
    job: &'a ActiveJob,
    /// Worker state to update
    state: &'a StateCell,
}

impl Monitor for AttemptMonitor<'_> {
    fn enter(&self, stage: Stage) {
        self.state.set(match stage {
            Stage::Generate => MinerState::Generating,
            Stage::Trim { .. } => MinerState::Trimming,
            _ => MinerState::Extracting,
        });
    }

    fn should_abort(&self) -> bool {
        self.board.is_stale(self.job)
    }
}

/// Default backend factory: a CPU backend per worker
fn cpu_factory(threads: Option<usize>) -> BackendFactory {
    Arc::new(move |device: usize| -> Result<BoxedBackend, cuckaroo::Error> {
        let backend = match threads {
            Some(threads) => CpuBackend::with_threads(device, threads)?,
            None => CpuBackend::new(),
        };
        Ok(Box::new(backend) as BoxedBackend)
    })
}

/// A configured miner that hasn't started yet
pub struct Miner {
    /// Settings for every worker
    config: MinerConfig,
    /// Where jobs come from
    board: Arc<JobBoard>,
    /// Shared counters
    stats: Arc<MinerStats>,
    /// Backend constructor
    factory: BackendFactory,
}

impl Miner {
    /// Miner running CPU backends.
    pub fn new(config: MinerConfig) -> Self {
        let factory = cpu_factory(config.threads);
        Self::with_backend_factory(config, factory)
    }

    /// Miner running backends built by `factory`.
    pub fn with_backend_factory(config: MinerConfig, factory: BackendFactory) -> Self {
        Self {
            config,
            board: Arc::new(JobBoard::new()),
            stats: Arc::new(MinerStats::new()),
            factory,
        }
    }

    /// The board to publish jobs on
    pub fn board(&self) -> &Arc<JobBoard> {
        &self.board
    }

    /// Counters shared with the workers
    pub fn stats(&self) -> &Arc<MinerStats> {
        &self.stats
    }

    /// Start one thread per worker, submitting shares to `sink`.
    pub fn start<S: ShareSink + 'static>(self, sink: S) -> Result<MinerHandle, MinerError> {
        self.config.validate()?;
        if self.board.is_closed() {
            return Err(MinerError::Stopped);
        }
        let params = self.config.params();
        let sink: Arc<dyn ShareSink> = Arc::new(sink);
        let mut handle = MinerHandle {
            board: self.board.clone(),
            stats: self.stats.clone(),
            workers: Vec::with_capacity(self.config.workers),
        };

        for index in 0..self.config.workers {
            let state = Arc::new(StateCell::new(MinerState::AwaitingJob));
            let worker = Worker {
                index,
                intensity: self.config.intensity,
                backend_retries: self.config.backend_retries,
                params,
                board: self.board.clone(),
                stats: self.stats.clone(),
                sink: sink.clone(),
                factory: self.factory.clone(),
                state: state.clone(),
            };
            let spawned = thread::Builder::new()
                .name(format!("cr29-worker{}", index))
                .spawn(move || worker.run());
            match spawned {
                Ok(thread) => handle.workers.push(WorkerHandle {
                    index,
                    state,
                    thread,
                }),
                Err(err) => {
                    let _ = handle.stop();
                    return Err(MinerError::Spawn(err));
                }
            }
        }
        info!(
            workers = self.config.workers,
            edge_bits = params.edge_bits,
            "miner started"
        );
        Ok(handle)
    }
}

/// One running worker thread
struct WorkerHandle {
    /// Worker index
    index: usize,
    /// Worker's current state
    state: Arc<StateCell>,
    /// The thread itself
    thread: JoinHandle<Result<(), MinerError>>,
}

/// A running miner
pub struct MinerHandle {
    /// Where jobs come from
    board: Arc<JobBoard>,
    /// Shared counters
    stats: Arc<MinerStats>,
    /// Worker threads
    workers: Vec<WorkerHandle>,
}

impl MinerHandle {
    /// The board to publish jobs on
    pub fn board(&self) -> &Arc<JobBoard> {
        &self.board
    }

    /// Counters shared with the workers
    pub fn stats(&self) -> &Arc<MinerStats> {
        &self.stats
    }

    /// Current state of every worker
    pub fn states(&self) -> Vec<MinerState> {
        self.workers.iter().map(|w| w.state.get()).collect()
    }

    /// Have all workers exited?
    pub fn is_finished(&self) -> bool {
        self.workers.iter().all(|w| w.thread.is_finished())
    }

    /// Close the job board and wait for every worker to exit.
    ///
    /// Attempts in flight are aborted at their next stage boundary. Returns
    /// the first error any worker stopped with.
    pub fn stop(self) -> Result<(), MinerError> {
        self.board.close();
        self.join()
    }

    /// Wait for every worker to exit without closing the board.
    pub fn join(self) -> Result<(), MinerError> {
        let mut result = Ok(());
        for worker in self.workers {
            let index = worker.index;
            let outcome = worker
                .thread
                .join()
                .unwrap_or_else(|_| Err(MinerError::Panicked(index)));
            if result.is_ok() {
                result = outcome;
            }
        }
        result
    }
}

/// Everything one worker thread owns or shares
struct Worker {
    /// Worker index, also the backend device index
    index: usize,
    /// Nonces claimed at a time
    intensity: u32,
    /// Rebuilds allowed after consecutive backend failures
    backend_retries: u32,
    /// Solver parameters
    params: Params,
    /// Where jobs come from
    board: Arc<JobBoard>,
    /// Shared counters
    stats: Arc<MinerStats>,
    /// Where shares go
    sink: Arc<dyn ShareSink>,
    /// Backend constructor
    factory: BackendFactory,
    /// This worker's state
    state: Arc<StateCell>,
}

impl Worker {
    fn run(self) -> Result<(), MinerError> {
        let result = self.mine();
        self.state.set(MinerState::Stopped);
        match &result {
            Ok(()) => debug!(worker = self.index, "worker stopped"),
            Err(err) => error!(worker = self.index, %err, "worker failed"),
        }
        result
    }

    /// Count a backend failure, erroring out once retries are used up.
    fn backend_failed(&self, failures: &mut u32, err: &cuckaroo::Error) -> Result<(), MinerError> {
        *failures += 1;
        error!(worker = self.index, failures = *failures, %err, "backend failure");
        if *failures > self.backend_retries {
            return Err(MinerError::BackendExhausted {
                worker: self.index,
                failures: *failures,
            });
        }
        self.stats.record_backend_restart();
        Ok(())
    }

    /// Build a backend and its solver memory, retrying backend failures.
    fn build(&self, failures: &mut u32) -> Result<(Solver<BoxedBackend>, SolverMemory), MinerError> {
        loop {
            let built = (self.factory)(self.index).and_then(|backend| {
                let solver = Solver::new(backend, self.params)?;
                let mem = solver.memory()?;
                Ok((solver, mem))
            });
            match built {
                Ok((solver, mem)) => {
                    debug!(
                        worker = self.index,
                        backend = solver.backend().name(),
                        bytes = mem.bytes(),
                        "solver ready"
                    );
                    return Ok((solver, mem));
                }
                Err(err) if err.is_backend_failure() => self.backend_failed(failures, &err)?,
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn mine(&self) -> Result<(), MinerError> {
        let mut failures = 0;
        let (mut solver, mut mem) = self.build(&mut failures)?;
        let mut active: Option<ActiveJob> = None;

        loop {
            if self.board.is_closed() {
                return Ok(());
            }
            let job = match active.take() {
                Some(job) if self.board.is_latest(&job) => job,
                _ => {
                    self.state.set(MinerState::AwaitingJob);
                    match self.board.wait_for_job() {
                        Some(job) => {
                            debug!(worker = self.index, job = %job.job().id, "mining job");
                            job
                        }
                        None => return Ok(()),
                    }
                }
            };

            for nonce in job.claim(self.intensity) {
                if !self.board.is_latest(&job) || self.board.is_closed() {
                    break;
                }
                match self.attempt(&mut solver, &mut mem, &job, nonce) {
                    Ok(()) => failures = 0,
                    Err(MinerError::Core(err)) if err.is_backend_failure() => {
                        self.backend_failed(&mut failures, &err)?;
                        (solver, mem) = self.build(&mut failures)?;
                    }
                    Err(err) => return Err(err),
                }
            }
            active = Some(job);
        }
    }

    /// Run one solve attempt and submit its proof, if any.
    fn attempt(
        &self,
        solver: &mut Solver<BoxedBackend>,
        mem: &mut SolverMemory,
        active: &ActiveJob,
        nonce: u64,
    ) -> Result<(), MinerError> {
        let job = active.job();
        let keys = SipKeys::from_header(&job.header, Some(nonce));
        let monitor = AttemptMonitor {
            board: &self.board,
            job: active,
            state: &self.state,
        };

        let report = match solver.solve(&keys, mem, &monitor) {
            Ok(report) => report,
            Err(err) if err.is_backend_failure() => return Err(err.into()),
            Err(err) => {
                warn!(worker = self.index, nonce, %err, "discarding cycle");
                self.stats.record_invalid();
                return Ok(());
            }
        };
        let proof = match report.outcome {
            Outcome::Found(proof) => proof,
            Outcome::Aborted => {
                debug!(worker = self.index, nonce, "attempt aborted");
                // Shutdown aborts attempts too; only a replaced job makes them stale.
                if !self.board.is_closed() {
                    self.stats.record_stale();
                }
                return Ok(());
            }
            _ => {
                self.stats.record_graph();
                return Ok(());
            }
        };
        self.stats.record_graph();
        self.stats.record_cycle();

        self.state.set(MinerState::Submitting);
        if let Err(err) = Cuckaroo::from_keys(keys, self.params)?.verify(&proof) {
            warn!(worker = self.index, nonce, %err, "found proof failed verification");
            self.stats.record_invalid();
            return Ok(());
        }
        let edge_bits = self.params.edge_bits;
        if !job.target.meets(&proof, edge_bits) {
            debug!(worker = self.index, nonce, "proof below target");
            return Ok(());
        }
        if self.board.is_stale(active) {
            debug!(worker = self.index, nonce, "dropping share for stale job");
            if !self.board.is_closed() {
                self.stats.record_stale();
            }
            return Ok(());
        }

        let share = Share {
            job_id: job.id.clone(),
            nonce,
            difficulty: proof.difficulty(edge_bits),
            proof,
        };
        info!(
            worker = self.index,
            job = %share.job_id,
            nonce,
            difficulty = share.difficulty,
            "submitting share"
        );
        self.sink.submit(share)?;
        self.stats.record_submitted();
        Ok(())
    }
}
