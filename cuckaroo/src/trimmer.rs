//! Degree-based edge trimming
//!
//! A node with fewer than two incident edges can't be part of a cycle, and
//! neither can its one edge. Each round looks at one side of the graph: it
//! counts how many current edges touch every node on that side, then copies
//! forward only the edges whose node there was seen at least twice. Rounds
//! alternate between U and V nodes, and the edge set shrinks toward the
//! graph's 2-core, the largest subgraph with no degree-one nodes.
//!
//! Counters are two bits wide and saturate at 2, packed sixteen to a 32-bit
//! word. Each bucket owns a contiguous run of words indexed by its nodes'
//! in-bucket offsets. Trimming re-buckets surviving edges by the endpoint
//! the next round will count, so every edge touching a given node always
//! lands in the same bucket and sees the same counter.
//!
//! Counting must finish before any edge is judged. The count kernel takes
//! the table by `&mut` and the trim kernel by `&`, so a round can't start
//! judging edges while another borrow is still counting.

use crate::backend::Backend;
use crate::bucket_store::{try_alloc, BucketStore, EdgeBuffer};
use crate::edge::Side;
use crate::err::Error;
use crate::params::Geometry;
use crate::solver::{Monitor, Stage};
use rayon::prelude::*;
use std::ops::Add;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, trace};

/// Minimum number of edges per parallel task inside one bucket
const EDGE_CHUNK: usize = 1 << 12;

/// Saturating two-bit degree counters for every bucket
pub struct DegreeTable {
    /// Counter words, `words_per_bucket` per bucket
    words: Vec<AtomicU32>,
    /// Layout used to locate counters
    geometry: Geometry,
}

impl DegreeTable {
    /// Allocate zeroed counters for `geometry`.
    pub fn new(geometry: &Geometry) -> Result<Self, Error> {
        let len = geometry
            .num_buckets()
            .checked_mul(geometry.words_per_bucket())
            .ok_or(Error::Allocation { bytes: usize::MAX })?;
        Ok(Self {
            words: try_alloc(len, || AtomicU32::new(0))?,
            geometry: *geometry,
        })
    }

    /// Reset every counter to zero.
    pub fn clear(&mut self) {
        self.words
            .par_iter_mut()
            .with_min_len(EDGE_CHUNK)
            .for_each(|word| *word.get_mut() = 0);
    }

    /// Word index and bit offset of a node's counter
    #[inline(always)]
    fn locate(&self, bucket: usize, node: u32) -> (usize, u32) {
        let index = self.geometry.counter_index(node);
        (
            bucket * self.geometry.words_per_bucket() + index / 16,
            2 * (index % 16) as u32,
        )
    }

    /// Count one more edge at `node`, saturating at 2.
    #[inline(always)]
    pub fn increment(&self, bucket: usize, node: u32) {
        let (word, shift) = self.locate(bucket, node);
        let word = &self.words[word];
        if (word.load(Ordering::Relaxed) >> shift) & 3 >= 2 {
            return;
        }
        // An Err here means another thread saturated the counter first.
        let _ = word.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |w| {
            ((w >> shift) & 3 < 2).then(|| w + (1 << shift))
        });
    }

    /// Counted degree of `node`, at most 2
    #[inline(always)]
    pub fn degree(&self, bucket: usize, node: u32) -> u32 {
        let (word, shift) = self.locate(bucket, node);
        (self.words[word].load(Ordering::Relaxed) >> shift) & 3
    }

    /// Size of the counter table in bytes
    pub fn bytes(&self) -> usize {
        self.words.len() * std::mem::size_of::<AtomicU32>()
    }
}

/// Count the degree of every `side` node touched by `source`.
///
/// `source` must be bucketed by its `side` endpoints.
pub(crate) fn count_degrees(source: &EdgeBuffer, side: Side, table: &mut DegreeTable) {
    table.clear();
    let table = &*table;
    (0..source.num_buckets())
        .into_par_iter()
        .for_each(|bucket| {
            source
                .par_bucket(bucket)
                .with_min_len(EDGE_CHUNK)
                .for_each(|edge| table.increment(bucket, edge.node(side)));
        });
}

/// Per-kernel edge counts, merged across tasks
#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    /// Edges copied to the destination
    kept: u64,
    /// Edges that survived but found their destination bucket full
    dropped: u64,
}

impl Add for Tally {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            kept: self.kept + rhs.kept,
            dropped: self.dropped + rhs.dropped,
        }
    }
}

/// Copy every `source` edge whose `side` node has degree 2 or more.
///
/// Survivors are bucketed by their opposite endpoint in `destination`.
pub(crate) fn trim(
    source: &EdgeBuffer,
    side: Side,
    table: &DegreeTable,
    geometry: &Geometry,
    destination: &EdgeBuffer,
) -> RoundReport {
    let next = side.other();
    let tally = (0..source.num_buckets())
        .into_par_iter()
        .map(|bucket| {
            source
                .par_bucket(bucket)
                .with_min_len(EDGE_CHUNK)
                .fold(Tally::default, |mut tally, edge| {
                    if table.degree(bucket, edge.node(side)) >= 2 {
                        if destination.push(geometry.bucket_of(edge.node(next)), edge) {
                            tally.kept += 1;
                        } else {
                            tally.dropped += 1;
                        }
                    }
                    tally
                })
                .reduce(Tally::default, Add::add)
        })
        .reduce(Tally::default, Add::add);
    RoundReport {
        side,
        before: source.len() as u64,
        kept: tally.kept,
        dropped: tally.dropped,
    }
}

/// Edge counts for one trimming round
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[non_exhaustive]
pub struct RoundReport {
    /// Side whose degrees were counted
    pub side: Side,
    /// Edges at the start of the round
    pub before: u64,
    /// Edges copied forward
    pub kept: u64,
    /// Surviving edges lost to full destination buckets
    pub dropped: u64,
}

impl RoundReport {
    /// Edges removed for having a degree-one endpoint
    pub fn removed(&self) -> u64 {
        self.before - self.kept - self.dropped
    }
}

/// Why the trimming loop ended
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[non_exhaustive]
pub enum TrimStop {
    /// The configured number of rounds ran
    Budget,
    /// Two consecutive rounds removed nothing, so no further round can
    Converged,
    /// The caller asked to stop
    Aborted,
}

/// Summary of a whole trimming run
#[derive(Debug, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub struct TrimReport {
    /// Edges before the first round
    pub initial: u64,
    /// Edges remaining after each round, in order
    pub remaining: Vec<u64>,
    /// Total surviving edges lost to full buckets
    pub dropped: u64,
    /// Why trimming ended
    pub stop: TrimStop,
}

impl TrimReport {
    /// A report for a run that hasn't started
    pub(crate) fn new(initial: u64) -> Self {
        Self {
            initial,
            remaining: Vec::new(),
            dropped: 0,
            stop: TrimStop::Budget,
        }
    }

    /// Number of rounds that ran
    pub fn rounds(&self) -> u32 {
        self.remaining.len() as u32
    }

    /// Edges left after the last round
    pub fn residual(&self) -> u64 {
        self.remaining.last().copied().unwrap_or(self.initial)
    }

    /// Did trimming reach its fixed point?
    pub fn converged(&self) -> bool {
        self.stop == TrimStop::Converged
    }
}

/// Trim the store's edge set for up to `max_rounds` rounds.
///
/// Stops early once the edge set stops changing, and checks `monitor`
/// before every round.
pub(crate) fn run_rounds<B, M>(
    backend: &mut B,
    store: &mut BucketStore,
    degrees: &mut DegreeTable,
    max_rounds: u32,
    monitor: &M,
) -> Result<TrimReport, Error>
where
    B: Backend + ?Sized,
    M: Monitor + ?Sized,
{
    let mut report = TrimReport::new(store.len() as u64);
    let mut unchanged = 0;
    for round in 0..max_rounds {
        monitor.enter(Stage::Trim { round });
        if monitor.should_abort() {
            report.stop = TrimStop::Aborted;
            return Ok(report);
        }
        debug_assert_eq!(store.keyed_by(), Side::of_round(round));

        backend.count_degrees(store, degrees)?;
        let result = backend.trim(store, degrees)?;
        trace!(
            round,
            side = ?result.side,
            before = result.before,
            kept = result.kept,
            dropped = result.dropped,
            "trim round"
        );

        report.remaining.push(result.kept);
        report.dropped += result.dropped;
        if result.kept == result.before {
            unchanged += 1;
        } else {
            unchanged = 0;
        }
        if unchanged >= 2 || result.kept == 0 {
            report.stop = TrimStop::Converged;
            break;
        }
    }
    debug!(
        rounds = report.rounds(),
        residual = report.residual(),
        dropped = report.dropped,
        stop = ?report.stop,
        "trimming finished"
    );
    Ok(report)
}
