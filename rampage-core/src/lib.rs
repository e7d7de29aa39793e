//! Shared data model for rampage: run plans, request/response types, checks, run statistics and
//! configuration.
mod check;
mod config;
mod constants;
mod duration;
mod error;
mod http;
mod plan;
mod state;
mod stats;

pub use check::*;
pub use config::*;
pub use constants::*;
pub use error::*;
pub use http::*;
pub use plan::*;
pub use state::*;
pub use stats::*;
