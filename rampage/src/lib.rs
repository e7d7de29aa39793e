#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod client;

pub(crate) mod controller;
pub(crate) mod stats;
pub(crate) mod timer;
pub(crate) mod user;

pub use client::HttpClient;
#[cfg(feature = "http")]
pub use client::ReqwestClient;
pub use load_test::{LoadTest, RunHandle, RunReport};
pub use rampage_core as core;

pub mod prelude {
    pub use crate::client::{HttpClient, LocalHttpClient};
    #[cfg(feature = "http")]
    pub use crate::client::ReqwestClient;
    pub use crate::load_test::{LoadTest, RunHandle, RunReport};
    pub use rampage_core::{
        Check, CheckKind, CheckResult, CheckSpec, ConfigError, Method, Progress, Request,
        Response, RunConfig, RunPlan, RunState, RunStats, Stage, Thresholds, TransportError,
    };
}
