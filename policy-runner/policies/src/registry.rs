use crate::{bestpractices, BestPractices, RegoEngine};
use policy_runner_core::{k8s::Snapshot, Error, Evaluation, Evaluator, PolicySet};
use std::{fmt, str::FromStr};
use tracing::{debug, info_span, warn};

/// The policy sets this runner knows how to evaluate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PolicySetKind {
    BestPractices,
}

/// Owns one evaluator per registered policy set.
///
/// Evaluators run in the order their names were first registered.
#[derive(Default)]
pub struct Registry {
    evaluators: Vec<(String, Box<dyn Evaluator>)>,
}

// === impl PolicySetKind ===

impl PolicySetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BestPractices => bestpractices::IDENTIFIER,
        }
    }

    fn build(self, policy_set: &PolicySet) -> Result<Box<dyn Evaluator>, Error> {
        match self {
            Self::BestPractices => {
                let evaluator = BestPractices::new(&RegoEngine::new(), policy_set)?;
                Ok(Box::new(evaluator))
            }
        }
    }
}

impl FromStr for PolicySetKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            bestpractices::IDENTIFIER => Ok(Self::BestPractices),
            _ => Err(Error::UnknownPolicySet(s.to_string())),
        }
    }
}

impl fmt::Display for PolicySetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl Registry ===

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the evaluator for a policy set and stores it under the set's
    /// name. The registry is left unchanged if the name is unknown or the set
    /// fails to compile.
    pub fn register_policy_set(&mut self, policy_set: &PolicySet) -> Result<(), Error> {
        let kind = policy_set.name.parse::<PolicySetKind>()?;
        let evaluator = kind.build(policy_set)?;
        debug!(%kind, path = %policy_set.path, "Registered policy set");
        self.insert(policy_set.name.clone(), evaluator);
        Ok(())
    }

    /// Stores an evaluator. A name that is already registered is replaced in
    /// place.
    pub fn insert(&mut self, name: impl Into<String>, evaluator: Box<dyn Evaluator>) {
        let name = name.into();
        match self.evaluators.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = evaluator,
            None => self.evaluators.push((name, evaluator)),
        }
    }

    /// Runs every evaluator against the snapshot.
    ///
    /// Stops at the first evaluator that reports an error, returning it with
    /// the issues of the evaluators that ran before it.
    pub fn evaluate_all(&mut self, snapshot: &Snapshot) -> Evaluation {
        let mut issues = Vec::new();
        for (name, evaluator) in &mut self.evaluators {
            let _span = info_span!(
                "evaluate",
                policy_set = %name,
                evaluator = evaluator.policy_set()
            )
            .entered();
            let Evaluation {
                issues: found,
                error,
            } = evaluator.evaluate(snapshot);
            if let Some(error) = error {
                warn!(%error, dropped = found.len(), "Policy set failed");
                return Evaluation::new(issues, Some(error));
            }
            issues.extend(found);
        }
        Evaluation::new(issues, None)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.evaluators.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("evaluators", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
