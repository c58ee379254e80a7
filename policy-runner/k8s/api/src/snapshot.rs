use crate::source::{ClusterSource, DataSourceError};
use ahash::AHashMap as HashMap;
use kube::core::{DynamicObject, GroupVersionKind, TypeMeta};
use tracing::{debug, instrument};

/// A namespace-partitioned cache of the objects scanned in one evaluation
/// cycle.
///
/// Gathering is additive: every successful list is appended under its
/// namespace, so gathering the same (namespace, GVK) pair twice stores the
/// objects twice.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    namespaces: Vec<NamespaceLists>,
    by_name: HashMap<String, usize>,
}

/// All objects of a single GVK returned by one list call.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectList {
    pub gvk: GroupVersionKind,
    pub items: Vec<DynamicObject>,
}

#[derive(Clone, Debug)]
struct NamespaceLists {
    name: String,
    lists: Vec<ObjectList>,
}

// === impl Snapshot ===

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists every GVK in `namespace` and appends the results.
    ///
    /// Stops at the first failed list. Lists gathered before the failure are
    /// kept.
    #[instrument(skip(self, source, gvks), fields(gvks = gvks.len()))]
    pub async fn gather<S>(
        &mut self,
        source: &S,
        namespace: &str,
        gvks: &[GroupVersionKind],
    ) -> Result<(), DataSourceError>
    where
        S: ClusterSource + ?Sized,
    {
        for gvk in gvks {
            let list = source.list(gvk, namespace).await?;
            debug!(
                group = %gvk.group,
                version = %gvk.version,
                kind = %gvk.kind,
                items = list.items.len(),
                "Gathered objects"
            );
            self.push(namespace, list);
        }
        Ok(())
    }

    /// Appends a list under `namespace`, creating the namespace entry on first
    /// use.
    pub fn push(&mut self, namespace: &str, list: ObjectList) {
        let idx = match self.by_name.get(namespace) {
            Some(idx) => *idx,
            None => {
                let idx = self.namespaces.len();
                self.namespaces.push(NamespaceLists {
                    name: namespace.to_string(),
                    lists: Vec::new(),
                });
                self.by_name.insert(namespace.to_string(), idx);
                idx
            }
        };
        self.namespaces[idx].lists.push(list.stamped());
    }

    /// Returns the lists gathered for `namespace`, in append order.
    pub fn namespace(&self, namespace: &str) -> Option<&[ObjectList]> {
        self.by_name
            .get(namespace)
            .map(|idx| self.namespaces[*idx].lists.as_slice())
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> + '_ {
        self.namespaces.iter().map(|ns| ns.name.as_str())
    }

    /// Iterates over `(namespace, list)` pairs. Namespaces are visited in the
    /// order they were first gathered; lists in the order they were appended.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ObjectList)> + '_ {
        self.namespaces
            .iter()
            .flat_map(|ns| ns.lists.iter().map(move |list| (ns.name.as_str(), list)))
    }

    /// Iterates over every object in snapshot order along with the namespace
    /// it was gathered from and the GVK of its list.
    pub fn objects(
        &self,
    ) -> impl Iterator<Item = (&str, &GroupVersionKind, &DynamicObject)> + '_ {
        self.iter()
            .flat_map(|(ns, list)| list.items.iter().map(move |obj| (ns, &list.gvk, obj)))
    }

    /// The total number of objects across all lists.
    pub fn len(&self) -> usize {
        self.iter().map(|(_, list)| list.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// === impl ObjectList ===

impl ObjectList {
    pub fn new(gvk: GroupVersionKind, items: Vec<DynamicObject>) -> Self {
        Self { gvk, items }
    }

    /// List items returned by the API server usually omit `apiVersion` and
    /// `kind`. Policies match on both, so items are stamped with the list's
    /// type.
    fn stamped(mut self) -> Self {
        for item in &mut self.items {
            if item.types.is_none() {
                item.types = Some(TypeMeta {
                    api_version: self.gvk.api_version(),
                    kind: self.gvk.kind.clone(),
                });
            }
        }
        self
    }
}
