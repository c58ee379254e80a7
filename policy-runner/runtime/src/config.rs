use crate::{core::PolicySet, k8s::GroupVersionKind};
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

/// What to scan and which policy sets to evaluate, read once at startup.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Namespaces to gather objects from. An empty name gathers from all
    /// namespaces.
    #[serde(default)]
    pub namespaces: Vec<String>,

    /// Kinds gathered from each namespace.
    #[serde(default, deserialize_with = "gvks")]
    pub group_version_kinds: Vec<GroupVersionKind>,

    #[serde(default)]
    pub policy_sets: Vec<PolicySet>,

    /// A kubeconfig to connect with instead of the client flags.
    #[serde(default)]
    pub kube_config_path: Option<PathBuf>,

    /// Prefix of resolved incident locations.
    #[serde(default)]
    pub location_authority: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_slice(&bytes).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let config = serde_json::from_slice::<Self>(bytes)?;
        anyhow::ensure!(
            !config.policy_sets.is_empty(),
            "at least one policy set must be configured"
        );
        Ok(config)
    }
}

/// Accepts both `group`/`version`/`kind` and `Group`/`Version`/`Kind` keys.
fn gvks<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<GroupVersionKind>, D::Error> {
    #[derive(Deserialize)]
    struct Gvk {
        #[serde(default, alias = "Group")]
        group: String,
        #[serde(alias = "Version")]
        version: String,
        #[serde(alias = "Kind")]
        kind: String,
    }

    let gvks = Vec::<Gvk>::deserialize(deserializer)?;
    Ok(gvks
        .into_iter()
        .map(|Gvk { group, version, kind }| GroupVersionKind::gvk(&group, &version, &kind))
        .collect())
}
