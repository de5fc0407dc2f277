//! Find cycle proofs
//!
//! One solve attempt runs the full pipeline on a single graph:
//! generate every edge, trim toward the 2-core, consolidate the residual
//! edges, search them for a 42-cycle, and map the cycle back to nonces.
//! Most graphs have no 42-cycle at all; that is a normal outcome, not an
//! error.

use crate::backend::Backend;
use crate::bucket_store::BucketStore;
use crate::cycle::CycleFinder;
use crate::edge::{Edge, EdgeHasher};
use crate::err::Error;
use crate::generator::FillReport;
use crate::params::{Geometry, Params};
use crate::siphash::SipKeys;
use crate::solution::Proof;
use crate::trimmer::{self, DegreeTable, TrimReport, TrimStop};
use crate::PROOF_SIZE;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Pipeline stage about to start, as reported to a [`Monitor`]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[non_exhaustive]
pub enum Stage {
    /// Hashing the nonce space into buckets
    Generate,
    /// One trimming round
    Trim {
        /// Zero-based round number
        round: u32,
    },
    /// Searching the residual graph
    Extract,
    /// Mapping a found cycle back to nonces
    Recover,
}

/// Observer of a solve attempt, able to cancel it between stages
///
/// The solver checks [`Monitor::should_abort()`] before each stage and each
/// trimming round. Work already dispatched always finishes first.
pub trait Monitor {
    /// Called as each stage begins.
    fn enter(&self, _stage: Stage) {}

    /// Should the attempt stop now?
    fn should_abort(&self) -> bool {
        false
    }
}

impl Monitor for () {}

impl Monitor for AtomicBool {
    fn should_abort(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

/// Final result of one solve attempt
#[derive(Debug, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum Outcome {
    /// A 42-cycle was found and its nonces recovered
    Found(Proof),
    /// The residual graph holds no 42-cycle
    NoCycle,
    /// The monitor cancelled the attempt
    Aborted,
}

/// Everything learned from one solve attempt
#[derive(Debug, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub struct SolveReport {
    /// How the attempt ended
    pub outcome: Outcome,
    /// Edge generation counts
    pub fill: FillReport,
    /// Trimming counts
    pub trim: TrimReport,
    /// Edges handed to the cycle search
    pub residual: usize,
    /// Residual edges beyond the configured limit, never searched
    pub residual_dropped: usize,
}

impl SolveReport {
    /// The proof, if one was found
    pub fn proof(&self) -> Option<&Proof> {
        match &self.outcome {
            Outcome::Found(proof) => Some(proof),
            _ => None,
        }
    }

    /// Report for an attempt cancelled after `fill` and `trim`
    fn aborted(fill: FillReport, trim: TrimReport) -> Self {
        Self {
            outcome: Outcome::Aborted,
            fill,
            trim,
            residual: 0,
            residual_dropped: 0,
        }
    }
}

/// Memory used by one solver, reusable across attempts
///
/// Dominated by the two edge buffers. At full size this is several
/// gigabytes, so callers should allocate it once per device.
pub struct SolverMemory {
    /// Double-buffered edge storage
    store: BucketStore,
    /// Degree counters
    degrees: DegreeTable,
    /// Sorted residual edges for the cycle search
    residual: Vec<Edge>,
    /// Cycle search state
    finder: CycleFinder,
}

impl SolverMemory {
    /// Allocate memory for graphs described by `params`.
    pub fn new(params: &Params) -> Result<Self, Error> {
        let geometry = params.validate()?;
        Self::with_geometry(&geometry)
    }

    /// Allocate memory for a validated geometry.
    pub fn with_geometry(geometry: &Geometry) -> Result<Self, Error> {
        Ok(Self {
            store: BucketStore::new(geometry)?,
            degrees: DegreeTable::new(geometry)?,
            residual: Vec::new(),
            finder: CycleFinder::new(),
        })
    }

    /// Graph layout this memory was sized for
    pub fn geometry(&self) -> &Geometry {
        self.store.geometry()
    }

    /// Residual edges from the most recent attempt, sorted
    pub fn residual(&self) -> &[Edge] {
        &self.residual
    }

    /// Size of the large allocations in bytes
    pub fn bytes(&self) -> usize {
        self.store.bytes() + self.degrees.bytes()
    }
}

/// Drives the solve pipeline on one [`Backend`]
#[derive(Debug)]
pub struct Solver<B> {
    /// Device running each stage
    backend: B,
    /// Validated solver parameters
    params: Params,
    /// Layout derived from `params`
    geometry: Geometry,
}

impl<B: Backend> Solver<B> {
    /// Solver for `params` on `backend`.
    pub fn new(backend: B, params: Params) -> Result<Self, Error> {
        let geometry = params.validate()?;
        Ok(Self {
            backend,
            params,
            geometry,
        })
    }

    /// The backend in use
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Solver parameters
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Allocate memory suitable for this solver.
    pub fn memory(&self) -> Result<SolverMemory, Error> {
        SolverMemory::with_geometry(&self.geometry)
    }

    /// Run one attempt on the graph keyed by `keys`.
    ///
    /// `mem` must have been allocated for this solver's parameters; it is
    /// fully overwritten. Returns an error only when the backend fails or
    /// a found cycle can't be mapped back to a well-formed proof.
    pub fn solve<M: Monitor + ?Sized>(
        &mut self,
        keys: &SipKeys,
        mem: &mut SolverMemory,
        monitor: &M,
    ) -> Result<SolveReport, Error> {
        if mem.geometry() != &self.geometry {
            return Err(Error::MemoryMismatch);
        }
        let hasher = EdgeHasher::new(*keys, &self.geometry);

        monitor.enter(Stage::Generate);
        if monitor.should_abort() {
            return Ok(SolveReport::aborted(FillReport::default(), TrimReport::new(0)));
        }
        let fill = self
            .backend
            .generate(&hasher, self.params.lane_batch as usize, &mut mem.store)?;
        debug!(
            backend = self.backend.name(),
            stored = fill.stored,
            dropped = fill.dropped,
            "edges generated"
        );

        let trim = trimmer::run_rounds(
            &mut self.backend,
            &mut mem.store,
            &mut mem.degrees,
            self.params.trim_rounds,
            monitor,
        )?;
        if trim.stop == TrimStop::Aborted {
            return Ok(SolveReport::aborted(fill, trim));
        }

        let residual_dropped = self.backend.consolidate(
            &mem.store,
            self.params.max_residual as usize,
            &mut mem.residual,
        )?;
        if residual_dropped > 0 {
            warn!(
                kept = mem.residual.len(),
                dropped = residual_dropped,
                "residual graph exceeds limit, truncating"
            );
        }

        monitor.enter(Stage::Extract);
        if monitor.should_abort() {
            return Ok(SolveReport::aborted(fill, trim));
        }
        let mut report = SolveReport {
            outcome: Outcome::NoCycle,
            fill,
            trim,
            residual: mem.residual.len(),
            residual_dropped,
        };
        let Some(cycle) = mem.finder.find(&mem.residual) else {
            return Ok(report);
        };

        monitor.enter(Stage::Recover);
        if monitor.should_abort() {
            report.outcome = Outcome::Aborted;
            return Ok(report);
        }
        let nonces = self.backend.recover(&hasher, &cycle)?;
        if nonces.len() < PROOF_SIZE {
            return Err(Error::Recovery {
                found: nonces.len(),
            });
        }
        let proof = Proof::try_from_slice(&nonces)?;
        info!(nonces = ?proof.nonces(), "cycle found");
        report.outcome = Outcome::Found(proof);
        Ok(report)
    }
}

#[cfg(test)]
mod test {
    use super::{Monitor, Outcome, Solver, Stage};
    use crate::backend::CpuBackend;
    use crate::err::Error;
    use crate::params::Params;
    use crate::siphash::SipKeys;
    use crate::trimmer::TrimStop;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Records stages and aborts after a number of trimming rounds
    struct AbortAfter {
        rounds: u32,
        seen: AtomicU32,
        stages: Mutex<Vec<Stage>>,
    }

    impl Monitor for AbortAfter {
        fn enter(&self, stage: Stage) {
            if let Stage::Trim { .. } = stage {
                self.seen.fetch_add(1, Ordering::Relaxed);
            }
            self.stages.lock().unwrap().push(stage);
        }

        fn should_abort(&self) -> bool {
            self.seen.load(Ordering::Relaxed) > self.rounds
        }
    }

    fn small_params() -> Params {
        let mut params = Params::with_edge_bits(12);
        params.trim_rounds = 512;
        params
    }

    #[test]
    fn trims_to_fixed_point() {
        let mut solver = Solver::new(CpuBackend::new(), small_params()).unwrap();
        let mut mem = solver.memory().unwrap();
        let keys = SipKeys::from_header(b"fixed point", Some(1));
        let report = solver.solve(&keys, &mut mem, &()).unwrap();

        assert_ne!(report.outcome, Outcome::Aborted);
        assert!(report.trim.converged());
        assert_eq!(report.fill.stored, 4096);
        assert_eq!(report.residual as u64, report.trim.residual());
        assert!(report
            .trim
            .remaining
            .windows(2)
            .all(|pair| pair[1] <= pair[0]));

        // Every residual node has degree two or more.
        let residual = mem.residual();
        for edge in residual {
            assert!(residual.iter().filter(|e| e.u() == edge.u()).count() >= 2);
            assert!(residual.iter().filter(|e| e.v() == edge.v()).count() >= 2);
        }
    }

    #[test]
    fn abort_between_rounds() {
        let mut solver = Solver::new(CpuBackend::new(), small_params()).unwrap();
        let mut mem = solver.memory().unwrap();
        let keys = SipKeys::from_header(b"abort", None);
        let monitor = AbortAfter {
            rounds: 3,
            seen: AtomicU32::new(0),
            stages: Mutex::new(Vec::new()),
        };
        let report = solver.solve(&keys, &mut mem, &monitor).unwrap();

        assert_eq!(report.outcome, Outcome::Aborted);
        assert_eq!(report.trim.stop, TrimStop::Aborted);
        assert_eq!(report.trim.rounds(), 3);
        let stages = monitor.stages.into_inner().unwrap();
        assert_eq!(stages[0], Stage::Generate);
        assert_eq!(stages[1], Stage::Trim { round: 0 });
        assert!(!stages.contains(&Stage::Extract));
    }

    #[test]
    fn abort_before_start() {
        let mut solver = Solver::new(CpuBackend::new(), small_params()).unwrap();
        let mut mem = solver.memory().unwrap();
        let stop = AtomicBool::new(true);
        let report = solver
            .solve(&SipKeys::from_header(b"", None), &mut mem, &stop)
            .unwrap();
        assert_eq!(report.outcome, Outcome::Aborted);
        assert_eq!(report.fill.generated, 0);
    }

    #[test]
    fn memory_must_match() {
        let mut solver = Solver::new(CpuBackend::new(), small_params()).unwrap();
        let mut mem = Solver::new(CpuBackend::new(), Params::with_edge_bits(10))
            .unwrap()
            .memory()
            .unwrap();
        let keys = SipKeys::from_header(b"", None);
        let err = solver.solve(&keys, &mut mem, &()).unwrap_err();
        assert!(matches!(err, Error::MemoryMismatch));
        assert!(!err.is_backend_failure());
    }

    /// Aborts as soon as a given stage begins
    struct AbortAt {
        stage: Stage,
        hit: AtomicBool,
    }

    impl Monitor for AbortAt {
        fn enter(&self, stage: Stage) {
            if stage == self.stage {
                self.hit.store(true, Ordering::Relaxed);
            }
        }

        fn should_abort(&self) -> bool {
            self.hit.load(Ordering::Relaxed)
        }
    }

    #[test]
    fn abort_before_recovery() {
        let mut params = Params::with_edge_bits(16);
        params.bucket_bits = 2;
        params.bucket_slack = 1024;
        params.trim_rounds = 512;
        let mut solver = Solver::new(CpuBackend::new(), params).unwrap();
        let mut mem = solver.memory().unwrap();
        let keys = SipKeys::from_header(b"cr29 test header", Some(20));

        let monitor = AbortAt {
            stage: Stage::Recover,
            hit: AtomicBool::new(false),
        };
        let report = solver.solve(&keys, &mut mem, &monitor).unwrap();
        assert_eq!(report.outcome, Outcome::Aborted);
        assert!(report.residual >= 42);

        // The same graph does hold a cycle when left to finish.
        let report = solver.solve(&keys, &mut mem, &()).unwrap();
        assert!(report.proof().is_some());
    }
}
