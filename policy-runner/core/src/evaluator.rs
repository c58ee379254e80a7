use crate::{k8s::Snapshot, Error, Issue, PolicySet};

/// Runs one policy set against every object in a snapshot.
pub trait Evaluator: Send {
    /// The identifier recorded on every issue this evaluator emits.
    fn policy_set(&self) -> &str;

    /// Scans the snapshot and reports issues.
    ///
    /// A failure on a single object does not stop the scan: the last such
    /// error is returned alongside the issues found on every other object.
    fn evaluate(&mut self, snapshot: &Snapshot) -> Evaluation;
}

/// Prepares policy set queries.
pub trait PolicyEngine {
    type Query: PreparedQuery;

    /// Loads the policy set's sources, skipping excluded paths, and prepares
    /// its query.
    fn prepare(&self, policy_set: &PolicySet) -> Result<Self::Query, Error>;
}

/// A policy set query ready to be evaluated against objects.
pub trait PreparedQuery: Send {
    /// Evaluates the query with `input` as the document and returns the value
    /// of each result expression.
    fn eval(&mut self, input: &serde_json::Value) -> anyhow::Result<Vec<serde_json::Value>>;
}

/// The issues produced by an evaluation and the error, if any, that left
/// them incomplete.
///
/// An error does not mean the issues are absent; it means they may not be
/// all of them.
#[derive(Debug, Default)]
pub struct Evaluation {
    pub issues: Vec<Issue>,
    pub error: Option<Error>,
}

// === impl Evaluation ===

impl Evaluation {
    pub fn new(issues: Vec<Issue>, error: Option<Error>) -> Self {
        Self { issues, error }
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_parts(self) -> (Vec<Issue>, Option<Error>) {
        (self.issues, self.error)
    }
}
