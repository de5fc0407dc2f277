#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(noop_method_call)]
#![warn(unreachable_pub)]
#![warn(clippy::all)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::cargo_common_metadata)]
#![deny(clippy::checked_conversions)]
#![warn(clippy::cognitive_complexity)]
#![deny(clippy::debug_assert_with_mut_call)]
#![deny(clippy::exhaustive_enums)]
#![deny(clippy::exhaustive_structs)]
#![deny(clippy::expl_impl_clone_on_copy)]
#![deny(clippy::fallible_impl_from)]
#![deny(clippy::implicit_clone)]
#![deny(clippy::large_stack_arrays)]
#![warn(clippy::manual_ok_or)]
#![deny(clippy::missing_docs_in_private_items)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::option_option)]
#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]
#![warn(clippy::rc_buffer)]
#![deny(clippy::ref_option_ref)]
#![warn(clippy::semicolon_if_nothing_returned)]
#![warn(clippy::trait_duplication_in_bounds)]
#![deny(clippy::unnecessary_wraps)]
#![warn(clippy::unseparated_literal_suffix)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::mod_module_files)]
#![allow(clippy::let_unit_value)]
#![allow(clippy::uninlined_format_args)]

mod backend;
mod bucket_store;
mod cycle;
mod edge;
mod err;
mod generator;
mod params;
mod siphash;
mod solution;
mod solver;
mod trimmer;

pub use backend::{Backend, CpuBackend};
pub use bucket_store::{BucketStore, EdgeBuffer};
pub use cycle::{CycleEdges, CycleFinder, MAX_PATH_LEN};
pub use edge::{Edge, EdgeHasher, Node, Nonce, Side};
pub use err::{Error, ParamsError};
pub use generator::FillReport;
pub use params::{Geometry, Params, MAX_EDGE_BITS, MIN_EDGE_BITS};
pub use siphash::{siphash24, SipKeys};
pub use solution::{check_cycle, Proof, ProofArray, ProofByteArray};
pub use solver::{Monitor, Outcome, SolveReport, Solver, SolverMemory, Stage};
pub use trimmer::{DegreeTable, RoundReport, TrimReport, TrimStop};

/// Number of edges in a proof cycle
pub const PROOF_SIZE: usize = 42;

/// One puzzle instance, keyed by a header and optional nonce
///
/// Holds the puzzle keys and the solver parameters. Verifying is cheap;
/// solving allocates [`SolverMemory`] unless one is supplied.
#[derive(Debug, Clone)]
pub struct Cuckaroo {
    /// Keys derived from the header
    keys: SipKeys,
    /// Solver parameters
    params: Params,
    /// Layout derived from `params`
    geometry: Geometry,
}

impl Cuckaroo {
    /// Make a new [`Cuckaroo`] instance keyed by `header` alone, with
    /// default parameters.
    pub fn new(header: &[u8]) -> Result<Self, Error> {
        CuckarooBuilder::new().build(header, None)
    }

    /// Make a new [`Cuckaroo`] instance keyed by `header` and `nonce`, with
    /// default parameters.
    pub fn with_nonce(header: &[u8], nonce: u64) -> Result<Self, Error> {
        CuckarooBuilder::new().build(header, Some(nonce))
    }

    /// Make a new [`Cuckaroo`] instance from explicit keys.
    pub fn from_keys(keys: SipKeys, params: Params) -> Result<Self, Error> {
        let geometry = params.validate()?;
        Ok(Self {
            keys,
            params,
            geometry,
        })
    }

    /// Puzzle keys
    pub fn keys(&self) -> &SipKeys {
        &self.keys
    }

    /// Solver parameters
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The edge function of this instance
    pub fn hasher(&self) -> EdgeHasher {
        EdgeHasher::new(self.keys, &self.geometry)
    }

    /// Check a [`Proof`] against this particular graph.
    ///
    /// Having a [`Proof`] instance guarantees that the nonces are already
    /// sorted. This checks their range, then walks the cycle.
    pub fn verify(&self, proof: &Proof) -> Result<(), Error> {
        solution::verify(&self.hasher(), proof)
    }

    /// Search this graph for a proof.
    ///
    /// Memory for the solver is allocated dynamically and not reused.
    pub fn solve(&self) -> Result<Option<Proof>, Error> {
        let mut mem = SolverMemory::with_geometry(&self.geometry)?;
        self.solve_with_memory(&mut mem)
    }

    /// Search this graph for a proof, using the provided [`SolverMemory`].
    ///
    /// Runs on rayon's global thread pool.
    pub fn solve_with_memory(&self, mem: &mut SolverMemory) -> Result<Option<Proof>, Error> {
        let mut solver = Solver::new(CpuBackend::new(), self.params)?;
        let report = solver.solve(&self.keys, mem, &())?;
        match report.outcome {
            Outcome::Found(proof) => Ok(Some(proof)),
            _ => Ok(None),
        }
    }
}

/// Builder for creating [`Cuckaroo`] instances with custom parameters
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct CuckarooBuilder {
    /// Parameters for instances built from here
    params: Params,
}

impl CuckarooBuilder {
    /// Create a new [`CuckarooBuilder`] with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all parameters at once.
    pub fn params(&mut self, params: Params) -> &mut Self {
        self.params = params;
        self
    }

    /// Select the graph size, resizing the bucket count to match.
    pub fn edge_bits(&mut self, edge_bits: u32) -> &mut Self {
        self.params.edge_bits = edge_bits;
        self.params.bucket_bits = Params::with_edge_bits(edge_bits).bucket_bits;
        self
    }

    /// Select the number of buckets, as a power of two.
    pub fn bucket_bits(&mut self, bucket_bits: u32) -> &mut Self {
        self.params.bucket_bits = bucket_bits;
        self
    }

    /// Select the spare capacity of each bucket.
    pub fn bucket_slack(&mut self, bucket_slack: u32) -> &mut Self {
        self.params.bucket_slack = bucket_slack;
        self
    }

    /// Select the degree counter table size per bucket.
    pub fn degree_bits(&mut self, degree_bits: Option<u32>) -> &mut Self {
        self.params.degree_bits = degree_bits;
        self
    }

    /// Select the maximum number of trimming rounds.
    pub fn trim_rounds(&mut self, trim_rounds: u32) -> &mut Self {
        self.params.trim_rounds = trim_rounds;
        self
    }

    /// Select the largest residual graph searched for cycles.
    pub fn max_residual(&mut self, max_residual: u32) -> &mut Self {
        self.params.max_residual = max_residual;
        self
    }

    /// Select the minimum number of nonces per generation task.
    pub fn lane_batch(&mut self, lane_batch: u32) -> &mut Self {
        self.params.lane_batch = lane_batch;
        self
    }

    /// Build a [`Cuckaroo`] instance for a header and optional nonce.
    pub fn build(&self, header: &[u8], nonce: Option<u64>) -> Result<Cuckaroo, Error> {
        Cuckaroo::from_keys(SipKeys::from_header(header, nonce), self.params)
    }

    /// Search for a proof for a header and nonce.
    ///
    /// Memory for the solver is allocated dynamically and not reused.
    pub fn solve(&self, header: &[u8], nonce: u64) -> Result<Option<Proof>, Error> {
        self.build(header, Some(nonce))?.solve()
    }

    /// Check a [`Proof`] against a header and nonce.
    pub fn verify(&self, header: &[u8], nonce: u64, proof: &Proof) -> Result<(), Error> {
        self.build(header, Some(nonce))?.verify(proof)
    }

    /// Check a [`ProofArray`].
    ///
    /// Returns an error if the array is not a well formed [`Proof`] or it's
    /// not a cycle in the given graph.
    pub fn verify_array(&self, header: &[u8], nonce: u64, array: &ProofArray) -> Result<(), Error> {
        // Check the proof's shape before hashing anything
        self.verify(header, nonce, &Proof::try_from_array(array)?)
    }
}

/// Search for a proof, using default parameters.
///
/// Most graphs have no 42-cycle, so `Ok(None)` is the common result.
/// Memory for the solver is allocated dynamically and not reused.
pub fn solve(header: &[u8], nonce: u64) -> Result<Option<Proof>, Error> {
    Cuckaroo::with_nonce(header, nonce)?.solve()
}

/// Check a [`Proof`] against a header and nonce, using default parameters.
pub fn verify(header: &[u8], nonce: u64, proof: &Proof) -> Result<(), Error> {
    Cuckaroo::with_nonce(header, nonce)?.verify(proof)
}

/// Check a [`ProofByteArray`] against a header and nonce.
///
/// Returns an error if the bytes are not a well formed [`Proof`] or it's
/// not a cycle in the given graph. Uses default parameters.
pub fn verify_bytes(header: &[u8], nonce: u64, bytes: &ProofByteArray) -> Result<(), Error> {
    // Check the proof's shape before hashing anything
    verify(header, nonce, &Proof::try_from_bytes(bytes)?)
}
