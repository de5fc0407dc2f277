//! Miner configuration
//!
//! [`MinerConfig`] can be filled from command-line flags, through its
//! `clap::Args` derive, or loaded from a JSON file. Any field missing from
//! the file takes its default.

use crate::error::MinerError;
use clap::Args;
use cuckaroo::Params;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Mining and solver settings
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, Args)]
#[serde(default)]
pub struct MinerConfig {
    /// Number of workers, each with its own backend and solver memory
    #[arg(long, default_value_t = 1)]
    pub workers: usize,
    /// Threads per worker; uses the shared global pool when unset
    #[arg(long)]
    pub threads: Option<usize>,
    /// Nonces a worker claims from the job at a time
    #[arg(long, default_value_t = 4)]
    pub intensity: u32,
    /// Graph size in bits of edge index
    #[arg(long, default_value_t = 29)]
    pub edge_bits: u32,
    /// Bucket count, as a power of two
    #[arg(long, default_value_t = 6)]
    pub bucket_bits: u32,
    /// Degree counter index bits per bucket; exact counting when unset
    #[arg(long)]
    pub degree_bits: Option<u32>,
    /// Spare slots per bucket
    #[arg(long, default_value_t = 4096)]
    pub bucket_slack: u32,
    /// Upper bound on trimming rounds
    #[arg(long, default_value_t = 176)]
    pub trim_rounds: u32,
    /// Largest residual graph searched for cycles
    #[arg(long, default_value_t = 1 << 20)]
    pub max_residual: u32,
    /// Smallest batch of nonces hashed by one task during generation
    #[arg(long, default_value_t = 4096)]
    pub lane_batch: u32,
    /// Backend rebuilds allowed before a worker gives up
    #[arg(long, default_value_t = 3)]
    pub backend_retries: u32,
}

impl Default for MinerConfig {
    fn default() -> Self {
        let params = Params::default();
        Self {
            workers: 1,
            threads: None,
            intensity: 4,
            edge_bits: params.edge_bits,
            bucket_bits: params.bucket_bits,
            degree_bits: params.degree_bits,
            bucket_slack: params.bucket_slack,
            trim_rounds: params.trim_rounds,
            max_residual: params.max_residual,
            lane_batch: params.lane_batch,
            backend_retries: 3,
        }
    }
}

impl MinerConfig {
    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, MinerError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|err| MinerError::Config(format!("{}: {}", path.display(), err)))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|err| MinerError::Config(format!("{}: {}", path.display(), err)))
    }

    /// Solver parameters described by this configuration
    pub fn params(&self) -> Params {
        let mut params = Params::with_edge_bits(self.edge_bits);
        params.bucket_bits = self.bucket_bits;
        params.degree_bits = self.degree_bits;
        params.bucket_slack = self.bucket_slack;
        params.trim_rounds = self.trim_rounds;
        params.max_residual = self.max_residual;
        params.lane_batch = self.lane_batch;
        params
    }

    /// Check the settings that don't depend on the solver.
    ///
    /// Solver parameters are checked separately when each worker builds
    /// its solver.
    pub fn validate(&self) -> Result<(), MinerError> {
        if self.workers == 0 {
            return Err(MinerError::Config("at least one worker is required".into()));
        }
        if self.intensity == 0 {
            return Err(MinerError::Config("intensity must be at least 1".into()));
        }
        if self.threads == Some(0) {
            return Err(MinerError::Config("threads must be at least 1".into()));
        }
        self.params().validate().map_err(cuckaroo::Error::from)?;
        Ok(())
    }
}
