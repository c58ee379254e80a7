use crate::k8s::{DynamicObject, GroupVersionKind, ResourceExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// All violations of a single rule within one policy set.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub policy_set: String,

    /// The rule name reported by the policy set.
    pub name: String,

    /// The policy id of the first violation seen for this rule.
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,

    pub incidents: Vec<Incident>,
}

/// A single object that violated a rule.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct Incident {
    pub message: String,
    pub namespace: String,
    pub name: String,
    pub group: String,
    pub version: String,
    pub kind: String,
}

/// Folds violations into one [`Issue`] per rule name.
///
/// Owned by a single evaluation; issues are emitted sorted by rule name.
#[derive(Debug)]
pub struct Issues {
    policy_set: String,
    severity: Option<String>,
    by_rule: BTreeMap<String, Issue>,
}

// === impl Incident ===

impl Incident {
    pub fn from_object(
        message: impl Into<String>,
        gvk: &GroupVersionKind,
        object: &DynamicObject,
    ) -> Self {
        Self {
            message: message.into(),
            namespace: object.namespace().unwrap_or_default(),
            name: object.name_any(),
            group: gvk.group.clone(),
            version: gvk.version.clone(),
            kind: gvk.kind.clone(),
        }
    }

    pub fn is_namespaced(&self) -> bool {
        !self.namespace.is_empty()
    }
}

// === impl Issues ===

impl Issues {
    pub fn new(policy_set: impl Into<String>, severity: Option<String>) -> Self {
        Self {
            policy_set: policy_set.into(),
            severity,
            by_rule: BTreeMap::new(),
        }
    }

    /// Adds an incident to the rule's issue. The issue is created on the
    /// rule's first violation and keeps that violation's policy id.
    pub fn record(&mut self, rule: &str, policy_id: &str, incident: Incident) {
        self.by_rule
            .entry(rule.to_string())
            .or_insert_with(|| Issue {
                policy_set: self.policy_set.clone(),
                name: rule.to_string(),
                id: policy_id.to_string(),
                severity: self.severity.clone(),
                incidents: Vec::new(),
            })
            .incidents
            .push(incident);
    }

    pub fn len(&self) -> usize {
        self.by_rule.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_rule.is_empty()
    }

    pub fn into_vec(self) -> Vec<Issue> {
        self.by_rule.into_values().collect()
    }
}
