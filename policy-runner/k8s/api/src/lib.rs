#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod mapping;
pub mod snapshot;
pub mod source;

pub use self::{
    mapping::{DiscoveryMapper, RestMapper, RestMapping, StaticMapper},
    snapshot::{ObjectList, Snapshot},
    source::{ClusterSource, DataSourceError, KubeSource},
};
pub use kube::{
    core::{ApiResource, DynamicObject, GroupVersionKind, ObjectMeta, ResourceExt, TypeMeta},
    Client,
};
