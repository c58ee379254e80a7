#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use policy_runner_core as core;
pub use policy_runner_k8s_api as k8s;
pub use policy_runner_policies as policies;

mod args;
pub mod config;
pub mod provider;

pub use self::{
    args::Args,
    config::Config,
    provider::{Capability, IncidentContext, Provider, Report},
};
