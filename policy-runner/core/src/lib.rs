#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod error;
pub mod evaluator;
pub mod issue;
pub mod location;
mod policy_set;

pub use self::{
    error::Error,
    evaluator::{Evaluation, Evaluator, PolicyEngine, PreparedQuery},
    issue::{Incident, Issue, Issues},
    location::LocationResolver,
    policy_set::PolicySet,
};
pub use policy_runner_k8s_api as k8s;
