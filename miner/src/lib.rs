#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(noop_method_call)]
#![warn(unreachable_pub)]
#![warn(clippy::all)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::debug_assert_with_mut_call)]
#![deny(clippy::exhaustive_enums)]
#![deny(clippy::fallible_impl_from)]
#![deny(clippy::implicit_clone)]
#![warn(clippy::needless_borrow)]
#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]
#![warn(clippy::semicolon_if_nothing_returned)]
#![deny(clippy::unwrap_used)]
#![allow(clippy::uninlined_format_args)]

mod config;
mod error;
mod job;
mod share;
mod stats;
mod target;
mod worker;

pub use config::MinerConfig;
pub use error::MinerError;
pub use job::{ActiveJob, Job, JobBoard};
pub use share::{Share, ShareResponse, ShareSink, SubmitError};
pub use stats::{MinerStats, StatsSnapshot};
pub use target::Target;
pub use worker::{BackendFactory, BoxedBackend, Miner, MinerHandle, MinerState};
