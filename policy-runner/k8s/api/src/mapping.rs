use ahash::AHashMap as HashMap;
use kube::{
    core::{ApiResource, GroupVersionKind},
    discovery::{Discovery, Scope},
    Client,
};

/// The REST resource a kind is served as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestMapping {
    /// The canonical API group; empty for the core group.
    pub group: String,
    pub version: String,
    /// The plural resource name, e.g. `deployments`.
    pub plural: String,
    pub namespaced: bool,
}

/// Resolves a kind to the REST resource that serves it.
pub trait RestMapper {
    fn map(&self, group: &str, kind: &str, version: &str) -> Option<RestMapping>;
}

/// Answers from the API groups served by a cluster at startup.
pub struct DiscoveryMapper(Discovery);

/// A fixed set of mappings.
#[derive(Clone, Debug, Default)]
pub struct StaticMapper {
    mappings: HashMap<GroupVersionKind, RestMapping>,
}

// === impl RestMapping ===

impl RestMapping {
    pub fn from_resource(resource: &ApiResource, namespaced: bool) -> Self {
        Self {
            group: resource.group.clone(),
            version: resource.version.clone(),
            plural: resource.plural.clone(),
            namespaced,
        }
    }
}

// === impl DiscoveryMapper ===

impl DiscoveryMapper {
    pub async fn discover(client: Client) -> Result<Self, kube::Error> {
        let discovery = Discovery::new(client).run().await?;
        tracing::debug!(groups = discovery.groups().count(), "Discovered API groups");
        Ok(Self(discovery))
    }
}

impl RestMapper for DiscoveryMapper {
    fn map(&self, group: &str, kind: &str, version: &str) -> Option<RestMapping> {
        let gvk = GroupVersionKind::gvk(group, version, kind);
        self.0.resolve_gvk(&gvk).map(|(resource, caps)| {
            RestMapping::from_resource(&resource, matches!(caps.scope, Scope::Namespaced))
        })
    }
}

// === impl StaticMapper ===

impl StaticMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resource: ApiResource, namespaced: bool) -> Self {
        self.insert(resource, namespaced);
        self
    }

    pub fn insert(&mut self, resource: ApiResource, namespaced: bool) {
        let gvk = GroupVersionKind::gvk(&resource.group, &resource.version, &resource.kind);
        self.mappings
            .insert(gvk, RestMapping::from_resource(&resource, namespaced));
    }
}

impl RestMapper for StaticMapper {
    fn map(&self, group: &str, kind: &str, version: &str) -> Option<RestMapping> {
        self.mappings
            .get(&GroupVersionKind::gvk(group, version, kind))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_mapper_resolves_registered_kinds() {
        let mapper = StaticMapper::new()
            .with(
                ApiResource::from_gvk_with_plural(
                    &GroupVersionKind::gvk("apps", "v1", "Deployment"),
                    "deployments",
                ),
                true,
            )
            .with(
                ApiResource::from_gvk_with_plural(
                    &GroupVersionKind::gvk("", "v1", "Namespace"),
                    "namespaces",
                ),
                false,
            );

        assert_eq!(
            mapper.map("apps", "Deployment", "v1"),
            Some(RestMapping {
                group: "apps".to_string(),
                version: "v1".to_string(),
                plural: "deployments".to_string(),
                namespaced: true,
            })
        );
        assert_eq!(mapper.map("", "Namespace", "v1").unwrap().plural, "namespaces");
        assert!(!mapper.map("", "Namespace", "v1").unwrap().namespaced);
        assert_eq!(mapper.map("apps", "Deployment", "v1beta1"), None);
        assert_eq!(mapper.map("", "Pod", "v1"), None);
    }
}
