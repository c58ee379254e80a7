//! Evaluates the redhat-cop OpenShift best practices policy set.
//!
//! See <https://github.com/redhat-cop/rego-policies/tree/main/policy/ocp/bestpractices>.
//!
//! The policy set's query yields, per object, a document keyed by rule name:
//!
//! ```json
//! { "container-image-latest": { "violation": [
//!     { "msg": "...", "details": { "policyID": "RHCOP-OCP_BESTPRACT-00005" } }
//! ] } }
//! ```

use policy_runner_core::{
    k8s::{DynamicObject, GroupVersionKind, ResourceExt, Snapshot},
    Error, Evaluation, Evaluator, Incident, Issues, PolicyEngine, PolicySet, PreparedQuery,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

pub const IDENTIFIER: &str = "bestpractices";

#[derive(Debug)]
pub struct BestPractices<Q> {
    query: Q,
    severity: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Rule {
    #[serde(default)]
    violation: Vec<Violation>,
}

#[derive(Debug, Deserialize)]
struct Violation {
    #[serde(default)]
    msg: String,
    #[serde(default)]
    details: Details,
}

#[derive(Debug, Default, Deserialize)]
struct Details {
    #[serde(rename = "policyID", default)]
    policy_id: String,
}

// === impl BestPractices ===

impl<Q: PreparedQuery> BestPractices<Q> {
    /// Prepares the policy set's query. Fails if the sources do not compile.
    pub fn new<E>(engine: &E, policy_set: &PolicySet) -> Result<Self, Error>
    where
        E: PolicyEngine<Query = Q>,
    {
        let query = engine.prepare(policy_set)?;
        Ok(Self::from_query(query, policy_set.severity.clone()))
    }

    pub fn from_query(query: Q, severity: Option<String>) -> Self {
        Self { query, severity }
    }

    fn eval_object(
        &mut self,
        gvk: &GroupVersionKind,
        object: &DynamicObject,
        issues: &mut Issues,
    ) -> anyhow::Result<()> {
        let input = serde_json::to_value(object)?;
        for value in self.query.eval(&input)? {
            for (rule, violations) in decode(value)? {
                for Violation { msg, details } in violations {
                    trace!(%rule, %msg, "Violation");
                    issues.record(
                        &rule,
                        &details.policy_id,
                        Incident::from_object(msg, gvk, object),
                    );
                }
            }
        }
        Ok(())
    }
}

impl<Q: PreparedQuery> Evaluator for BestPractices<Q> {
    fn policy_set(&self) -> &str {
        IDENTIFIER
    }

    fn evaluate(&mut self, snapshot: &Snapshot) -> Evaluation {
        let mut issues = Issues::new(IDENTIFIER, self.severity.clone());
        let mut error = None;
        for (_, gvk, object) in snapshot.objects() {
            if let Err(source) = self.eval_object(gvk, object, &mut issues) {
                let error = error.insert(Error::Eval {
                    policy_set: IDENTIFIER.to_string(),
                    kind: gvk.kind.clone(),
                    namespace: object.namespace().unwrap_or_default(),
                    name: object.name_any(),
                    source,
                });
                warn!(%error, "Skipping object");
            }
        }
        debug!(
            objects = snapshot.len(),
            issues = issues.len(),
            failed = error.is_some(),
            "Evaluated"
        );
        Evaluation::new(issues.into_vec(), error)
    }
}

/// Splits a result expression into violations keyed by rule name. Entries
/// that don't describe a rule are ignored.
fn decode(value: serde_json::Value) -> anyhow::Result<Vec<(String, Vec<Violation>)>> {
    let rules = BTreeMap::<String, serde_json::Value>::deserialize(value)?;
    Ok(rules
        .into_iter()
        .filter_map(|(name, rule)| match Rule::deserialize(rule) {
            Ok(Rule { violation }) if !violation.is_empty() => Some((name, violation)),
            Ok(_) => None,
            Err(error) => {
                trace!(%name, %error, "Not a rule");
                None
            }
        })
        .collect())
}
