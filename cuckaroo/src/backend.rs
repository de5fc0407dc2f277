//! Compute backends
//!
//! The solver drives every stage through the [`Backend`] trait, one
//! dispatch per call. A call returning means all of its writes are visible
//! to the next call; that is the only barrier the solver relies on.
//!
//! [`CpuBackend`] runs each dispatch as a rayon parallel job, either on
//! the global pool or on a dedicated pool sized for one mining device.

use crate::bucket_store::BucketStore;
use crate::edge::{Edge, EdgeHasher, Nonce};
use crate::err::Error;
use crate::generator::{self, FillReport};
use crate::trimmer::{self, DegreeTable, RoundReport};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// One device capable of running the solver's stages
pub trait Backend {
    /// Short human-readable name, used in logs
    fn name(&self) -> &str;

    /// Reset `store` and fill it with every edge produced by `hasher`,
    /// bucketed by U endpoint.
    fn generate(
        &mut self,
        hasher: &EdgeHasher,
        lane_batch: usize,
        store: &mut BucketStore,
    ) -> Result<FillReport, Error>;

    /// Count degrees of the current edge set on the side it is keyed by.
    fn count_degrees(&mut self, store: &BucketStore, degrees: &mut DegreeTable)
        -> Result<(), Error>;

    /// Keep the edges whose counted endpoint has degree 2 or more, and
    /// make them the current set keyed by their other endpoint.
    fn trim(&mut self, store: &mut BucketStore, degrees: &DegreeTable)
        -> Result<RoundReport, Error>;

    /// Copy the current edge set into `residual`, sorted, keeping at most
    /// `limit` edges.
    ///
    /// Returns the number of edges that didn't fit.
    fn consolidate(
        &mut self,
        store: &BucketStore,
        limit: usize,
        residual: &mut Vec<Edge>,
    ) -> Result<usize, Error>;

    /// Find the nonces producing `cycle`'s edges.
    ///
    /// Returns the lowest matching nonce for each distinct edge found, in
    /// ascending order. Missing edges are left to the caller to detect.
    fn recover(&mut self, hasher: &EdgeHasher, cycle: &[Edge]) -> Result<Vec<Nonce>, Error>;
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn generate(
        &mut self,
        hasher: &EdgeHasher,
        lane_batch: usize,
        store: &mut BucketStore,
    ) -> Result<FillReport, Error> {
        (**self).generate(hasher, lane_batch, store)
    }

    fn count_degrees(
        &mut self,
        store: &BucketStore,
        degrees: &mut DegreeTable,
    ) -> Result<(), Error> {
        (**self).count_degrees(store, degrees)
    }

    fn trim(
        &mut self,
        store: &mut BucketStore,
        degrees: &DegreeTable,
    ) -> Result<RoundReport, Error> {
        (**self).trim(store, degrees)
    }

    fn consolidate(
        &mut self,
        store: &BucketStore,
        limit: usize,
        residual: &mut Vec<Edge>,
    ) -> Result<usize, Error> {
        (**self).consolidate(store, limit, residual)
    }

    fn recover(&mut self, hasher: &EdgeHasher, cycle: &[Edge]) -> Result<Vec<Nonce>, Error> {
        (**self).recover(hasher, cycle)
    }
}

/// Data-parallel CPU backend
#[derive(Debug)]
pub struct CpuBackend {
    /// Dedicated thread pool, or `None` for rayon's global pool
    pool: Option<rayon::ThreadPool>,
    /// Name reported in logs
    name: String,
}

impl CpuBackend {
    /// Backend running on rayon's global thread pool
    pub fn new() -> Self {
        Self {
            pool: None,
            name: "cpu".to_owned(),
        }
    }

    /// Backend running on its own pool of `threads` threads.
    ///
    /// `device` only labels the pool's threads.
    pub fn with_threads(device: usize, threads: usize) -> Result<Self, Error> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |i| format!("cr29-cpu{}-{}", device, i))
            .build()
            .map_err(|e| Error::Backend(e.to_string()))?;
        Ok(Self {
            pool: Some(pool),
            name: format!("cpu{}", device),
        })
    }

    /// Number of worker threads used by each dispatch
    pub fn threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    /// Run one dispatch on this backend's pool.
    fn dispatch<R: Send, F: FnOnce() -> R + Send>(&self, op: F) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for CpuBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(
        &mut self,
        hasher: &EdgeHasher,
        lane_batch: usize,
        store: &mut BucketStore,
    ) -> Result<FillReport, Error> {
        store.reset();
        let geometry = *store.geometry();
        let report = self.dispatch(|| generator::fill(hasher, &geometry, lane_batch, store.front()));
        if report.dropped > 0 {
            debug!(
                backend = %self.name,
                dropped = report.dropped,
                "bucket overflow during edge generation"
            );
        }
        Ok(report)
    }

    fn count_degrees(
        &mut self,
        store: &BucketStore,
        degrees: &mut DegreeTable,
    ) -> Result<(), Error> {
        let side = store.keyed_by();
        self.dispatch(|| trimmer::count_degrees(store.front(), side, degrees));
        Ok(())
    }

    fn trim(
        &mut self,
        store: &mut BucketStore,
        degrees: &DegreeTable,
    ) -> Result<RoundReport, Error> {
        let side = store.keyed_by();
        let geometry = *store.geometry();
        let (source, destination) = store.source_and_destination();
        let destination = &*destination;
        let report =
            self.dispatch(|| trimmer::trim(source, side, degrees, &geometry, destination));
        store.swap(side.other());
        Ok(report)
    }

    fn consolidate(
        &mut self,
        store: &BucketStore,
        limit: usize,
        residual: &mut Vec<Edge>,
    ) -> Result<usize, Error> {
        residual.clear();
        residual.extend(store.front().edges());
        self.dispatch(|| residual.par_sort_unstable());
        let excess = residual.len().saturating_sub(limit);
        residual.truncate(limit);
        Ok(excess)
    }

    fn recover(&mut self, hasher: &EdgeHasher, cycle: &[Edge]) -> Result<Vec<Nonce>, Error> {
        let wanted: HashSet<Edge> = cycle.iter().copied().collect();
        let matches: Vec<(Edge, Nonce)> = self.dispatch(|| {
            (0..hasher.num_edges())
                .into_par_iter()
                .with_min_len(1 << 12)
                .filter_map(|nonce| {
                    let edge = hasher.edge(nonce);
                    wanted.contains(&edge).then_some((edge, nonce))
                })
                .collect()
        });

        let mut lowest: HashMap<Edge, Nonce> = HashMap::with_capacity(cycle.len());
        for (edge, nonce) in matches {
            lowest
                .entry(edge)
                .and_modify(|n| *n = (*n).min(nonce))
                .or_insert(nonce);
        }
        let mut nonces: Vec<Nonce> = lowest.into_values().collect();
        nonces.sort_unstable();
        Ok(nonces)
    }
}

#[cfg(test)]
mod test {
    use super::{Backend, CpuBackend};
    use crate::bucket_store::BucketStore;
    use crate::edge::EdgeHasher;
    use crate::params::Params;
    use crate::siphash::SipKeys;

    #[test]
    fn dedicated_pool() {
        let backend = CpuBackend::with_threads(3, 2).unwrap();
        assert_eq!(backend.threads(), 2);
        assert_eq!(backend.name(), "cpu3");
    }

    #[test]
    fn consolidate_sorts_and_limits() {
        let geometry = Params::with_edge_bits(10).validate().unwrap();
        let hasher = EdgeHasher::new(SipKeys::from_header(b"residual", None), &geometry);
        let mut store = BucketStore::new(&geometry).unwrap();
        let mut backend = CpuBackend::new();
        backend.generate(&hasher, 16, &mut store).unwrap();

        let mut residual = Vec::new();
        let excess = backend.consolidate(&store, 1000, &mut residual).unwrap();
        assert_eq!(excess, 24);
        assert_eq!(residual.len(), 1000);
        assert!(residual.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn recover_finds_lowest_nonces() {
        let geometry = Params::with_edge_bits(10).validate().unwrap();
        let hasher = EdgeHasher::new(SipKeys::from_header(b"recover", None), &geometry);
        let mut backend = CpuBackend::new();
        let cycle = [hasher.edge(700), hasher.edge(3), hasher.edge(512)];
        let nonces = backend.recover(&hasher, &cycle).unwrap();
        assert_eq!(nonces.len(), 3);
        assert!(nonces.windows(2).all(|w| w[0] < w[1]));
        for nonce in nonces {
            assert!(cycle.contains(&hasher.edge(nonce)));
        }
    }
}
