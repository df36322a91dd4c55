//! xdeploy composer: the shared abstraction every per-kind resource composer implements.
//!
//! A composer builds one desired object from the composite, decides whether the
//! matching observed object is ready, and names the condition it reports under.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use xdeploy_core::{DesiredComposed, ObservedComposed, ResourceName};

pub mod scheme;

pub use scheme::{ComposedKind, Scheme, SchemeBuilder, SchemeError};

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("cannot decode observed resource {name}: {source}")]
    DecodeObserved {
        name: ResourceName,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot convert {kind} to composed resource: {source}")]
    Convert {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot convert {api_version}/{kind} to composed resource: kind is not registered")]
    Unregistered { api_version: &'static str, kind: &'static str },
}

/// Read-only state shared by all composers for one invocation.
pub struct FunctionContext<XR, D> {
    pub observed: BTreeMap<ResourceName, ObservedComposed>,
    pub xr: XR,
    pub defaults: Option<D>,
    /// Invocation span; composers log under it.
    pub log: tracing::Span,
    pub scheme: Arc<Scheme>,
}

/// Built object paired with the name it is merged under.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredResource {
    pub name: ResourceName,
    pub resource: DesiredComposed,
}

pub trait ComposableResource {
    /// Build the desired object. `Ok(None)` means this invocation does not ask for it.
    fn compose_desired_resource(&self) -> Result<Option<DesiredResource>, ComposeError>;

    /// Whether the observed object is available. No observed object means not ready.
    fn is_ready(&self) -> bool;

    /// Condition type reported on the composite, e.g. `DeploymentReady`.
    fn condition_type(&self) -> &str;
}

/// Fields and helpers common to every composer. Concrete composers hold one.
pub struct BaseComposer<'a, XR, D> {
    pub ctx: &'a FunctionContext<XR, D>,
    pub resource_name: ResourceName,
    pub condition_type: &'static str,
}

impl<'a, XR, D> BaseComposer<'a, XR, D> {
    pub fn new(ctx: &'a FunctionContext<XR, D>, resource_name: ResourceName, condition_type: &'static str) -> Self {
        Self { ctx, resource_name, condition_type }
    }

    pub fn condition_type(&self) -> &str { self.condition_type }

    /// Look up and decode the observed object under this composer's name.
    pub fn observed<T: DeserializeOwned>(&self) -> Result<Option<T>, ComposeError> {
        convert_observed(&self.ctx.observed, &self.resource_name)
    }

    /// Wrap a built object for the response. `None` passes through as "skip",
    /// anything else lands with `ready = READY_FALSE`.
    pub fn compose_desired_resource_from<K>(&self, object: Option<K>) -> Result<Option<DesiredResource>, ComposeError>
    where
        K: ComposedKind + Serialize,
    {
        let Some(object) = object else { return Ok(None) };
        if !self.ctx.scheme.recognizes::<K>() {
            return Err(ComposeError::Unregistered { api_version: K::API_VERSION, kind: K::KIND });
        }
        let mut resource = serde_json::to_value(&object).map_err(|source| ComposeError::Convert { kind: K::KIND, source })?;
        stamp_type_meta::<K>(&mut resource);
        Ok(Some(DesiredResource { name: self.resource_name.clone(), resource: DesiredComposed::new(resource) }))
    }
}

/// Decode the observed object `name` into `T`.
///
/// `Ok(None)` when it has never been observed; an error only when a value is
/// present but does not fit `T`.
pub fn convert_observed<T: DeserializeOwned>(
    observed: &BTreeMap<ResourceName, ObservedComposed>,
    name: &ResourceName,
) -> Result<Option<T>, ComposeError> {
    match observed.get(name) {
        None => Ok(None),
        Some(obs) => serde_json::from_value(obs.resource.clone())
            .map(Some)
            .map_err(|source| ComposeError::DecodeObserved { name: name.clone(), source }),
    }
}

fn stamp_type_meta<K: ComposedKind>(v: &mut serde_json::Value) {
    if let Some(obj) = v.as_object_mut() {
        obj.entry("apiVersion").or_insert_with(|| K::API_VERSION.into());
        obj.entry("kind").or_insert_with(|| K::KIND.into());
    }
}
