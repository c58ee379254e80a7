#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod bestpractices;
pub mod registry;
pub mod rego;

pub use self::{
    bestpractices::BestPractices,
    registry::{PolicySetKind, Registry},
    rego::{RegoEngine, RegoQuery},
};
