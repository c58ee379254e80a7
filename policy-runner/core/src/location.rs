use crate::{k8s::RestMapper, Error, Incident};

pub const DEFAULT_AUTHORITY: &str = "https://cluster-uri-api";

/// Builds the API URI of the object behind an incident.
#[derive(Clone, Debug)]
pub struct LocationResolver<M> {
    authority: String,
    mapper: M,
}

// === impl LocationResolver ===

impl<M: RestMapper> LocationResolver<M> {
    pub fn new(mapper: M) -> Self {
        Self {
            authority: DEFAULT_AUTHORITY.to_string(),
            mapper,
        }
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Resolves an incident to
    /// `<authority>/api/<version>[/namespaces/<ns>]/<plural>/<name>` for the
    /// core group, or `<authority>/apis/<group>/<version>/...` otherwise.
    pub fn resolve(&self, incident: &Incident) -> Result<String, Error> {
        let mapping = self
            .mapper
            .map(&incident.group, &incident.kind, &incident.version)
            .ok_or_else(|| Error::UnmappableKind {
                group: incident.group.clone(),
                version: incident.version.clone(),
                kind: incident.kind.clone(),
            })?;

        let mut uri = self.authority.trim_end_matches('/').to_string();
        if mapping.group.is_empty() {
            push_segments(&mut uri, &["api", mapping.version.as_str()]);
        } else {
            push_segments(&mut uri, &["apis", mapping.group.as_str(), mapping.version.as_str()]);
        }
        if incident.is_namespaced() {
            push_segments(&mut uri, &["namespaces", incident.namespace.as_str()]);
        }
        push_segments(&mut uri, &[mapping.plural.as_str(), incident.name.as_str()]);
        Ok(uri)
    }
}

fn push_segments(uri: &mut String, segments: &[&str]) {
    for segment in segments {
        uri.push('/');
        uri.push_str(segment);
    }
}
