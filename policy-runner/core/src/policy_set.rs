use serde::{Deserialize, Serialize};
use std::path::Path;

/// Describes a policy set to load and the query used to evaluate it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySet {
    /// Selects the evaluator that runs this set, e.g. `bestpractices`.
    pub name: String,

    /// A policy file or a directory of policy files.
    pub path: String,

    /// Source files whose path contains any of these substrings are skipped.
    #[serde(default)]
    pub exclude_substrings: Vec<String>,

    /// The query evaluated against each object, e.g. `data.ocp.bestpractices`.
    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
}

impl PolicySet {
    pub fn is_excluded(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        self.exclude_substrings
            .iter()
            .any(|exclude| path.contains(exclude.as_str()))
    }
}
