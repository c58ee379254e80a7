use crate::k8s::DataSourceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Listing objects from the cluster failed.
    #[error(transparent)]
    DataSource(#[from] DataSourceError),

    /// A policy set's query could not be prepared.
    #[error("failed to prepare policy set {policy_set}: {source}")]
    Compile {
        policy_set: String,
        #[source]
        source: anyhow::Error,
    },

    /// A prepared query failed against a single object.
    #[error("policy set {policy_set} failed to evaluate {kind} {namespace}/{name}: {source}")]
    Eval {
        policy_set: String,
        kind: String,
        namespace: String,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("unrecognized policy set: {0}")]
    UnknownPolicySet(String),

    /// No REST resource serves the kind.
    #[error("no REST mapping for kind {kind} in {group:?} {version}")]
    UnmappableKind {
        group: String,
        version: String,
        kind: String,
    },
}
