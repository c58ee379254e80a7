use crate::{
    core::{Error, Evaluation, Issue, LocationResolver},
    k8s::{ClusterSource, GroupVersionKind, RestMapper, Snapshot},
    policies::Registry,
    Config,
};
use serde::{Serialize, Serializer};
use tracing::{debug, info, info_span, Instrument};

/// Runs evaluation cycles for an analysis host.
pub struct Provider<S, M> {
    source: S,
    registry: Registry,
    resolver: Option<LocationResolver<M>>,
    namespaces: Vec<String>,
    gvks: Vec<GroupVersionKind>,
}

/// A condition capability advertised to the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Capability {
    pub name: &'static str,
}

/// An incident located in the cluster API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentContext {
    pub uri: String,
    pub message: String,
    pub issue: String,
    pub policy_set: String,
}

/// The outcome of one evaluation cycle.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub issues: Vec<Issue>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub incidents: Vec<IncidentContext>,

    /// Set when a policy set failed; the issues may then be incomplete.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_error"
    )]
    pub error: Option<Error>,
}

// === impl Provider ===

impl<S: ClusterSource, M: RestMapper> Provider<S, M> {
    pub fn new(
        source: S,
        registry: Registry,
        namespaces: Vec<String>,
        gvks: Vec<GroupVersionKind>,
    ) -> Self {
        Self {
            source,
            registry,
            resolver: None,
            namespaces,
            gvks,
        }
    }

    /// Registers every configured policy set. Any unknown or uncompilable set
    /// fails construction.
    pub fn from_config(config: &Config, source: S) -> Result<Self, Error> {
        let mut registry = Registry::new();
        for policy_set in &config.policy_sets {
            registry.register_policy_set(policy_set)?;
        }
        info!(policy_sets = registry.len(), "Registered policy sets");
        Ok(Self::new(
            source,
            registry,
            config.namespaces.clone(),
            config.group_version_kinds.clone(),
        ))
    }

    /// Resolves incidents to cluster API locations after each evaluation.
    pub fn with_locations(mut self, resolver: LocationResolver<M>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        vec![Capability { name: "rego" }]
    }

    /// Builds a fresh snapshot of every configured namespace.
    pub async fn gather(&self) -> Result<Snapshot, Error> {
        let mut snapshot = Snapshot::new();
        for ns in &self.namespaces {
            snapshot
                .gather(&self.source, ns, &self.gvks)
                .instrument(info_span!("gather", %ns))
                .await?;
        }
        debug!(objects = snapshot.len(), "Gathered snapshot");
        Ok(snapshot)
    }

    /// Runs one cycle: gather, evaluate every policy set, then resolve
    /// incident locations.
    ///
    /// Gather and location failures abort the cycle. A failed policy set is
    /// reported on the returned [`Report`] alongside the issues found before
    /// it.
    pub async fn evaluate(&mut self) -> Result<Report, Error> {
        let snapshot = self.gather().await?;
        let Evaluation { issues, error } = self.registry.evaluate_all(&snapshot);
        let incidents = match self.resolver {
            Some(ref resolver) => locate(resolver, &issues)?,
            None => Vec::new(),
        };
        info!(
            issues = issues.len(),
            incidents = issues.iter().map(|i| i.incidents.len()).sum::<usize>(),
            complete = error.is_none(),
            "Evaluated"
        );
        Ok(Report {
            issues,
            incidents,
            error,
        })
    }
}

fn locate<M: RestMapper>(
    resolver: &LocationResolver<M>,
    issues: &[Issue],
) -> Result<Vec<IncidentContext>, Error> {
    let mut located = Vec::new();
    for issue in issues {
        for incident in &issue.incidents {
            located.push(IncidentContext {
                uri: resolver.resolve(incident)?,
                message: incident.message.clone(),
                issue: issue.name.clone(),
                policy_set: issue.policy_set.clone(),
            });
        }
    }
    Ok(located)
}

fn serialize_error<S: Serializer>(error: &Option<Error>, s: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(error) => s.collect_str(error),
        None => s.serialize_none(),
    }
}

// === impl Report ===

impl Report {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}
