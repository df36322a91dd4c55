//! Registry of the object kinds the engine is allowed to emit.
//!
//! Built once by the host at startup. Registration problems come back as
//! [`SchemeError`] so the host decides how to surface them.

use std::str::FromStr;

use kube::core::{GroupVersion, GroupVersionKind};

/// Type metadata of an object a composer builds. Every Kubernetes API type
/// from `k8s-openapi` qualifies; out-of-tree kinds implement it by hand.
pub trait ComposedKind {
    const API_VERSION: &'static str;
    const KIND: &'static str;
}

impl<K: k8s_openapi::Resource> ComposedKind for K {
    const API_VERSION: &'static str = <K as k8s_openapi::Resource>::API_VERSION;
    const KIND: &'static str = <K as k8s_openapi::Resource>::KIND;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchemeError {
    #[error("invalid apiVersion {api_version:?} for kind {kind:?}")]
    InvalidApiVersion { api_version: String, kind: String },
    #[error("empty kind for apiVersion {0:?}")]
    EmptyKind(String),
    #[error("kind {0} registered twice")]
    Duplicate(String),
    #[error("scheme has no registered kinds")]
    Empty,
}

#[derive(Debug, Default)]
pub struct SchemeBuilder {
    kinds: Vec<GroupVersionKind>,
}

impl SchemeBuilder {
    pub fn new() -> Self { Self::default() }

    pub fn register<K: ComposedKind>(self) -> Result<Self, SchemeError> {
        self.register_raw(K::API_VERSION, K::KIND)
    }

    pub fn register_raw(mut self, api_version: &str, kind: &str) -> Result<Self, SchemeError> {
        let gvk = parse_gvk(api_version, kind)?;
        if self.kinds.contains(&gvk) {
            return Err(SchemeError::Duplicate(key(&gvk)));
        }
        self.kinds.push(gvk);
        Ok(self)
    }

    pub fn build(self) -> Result<Scheme, SchemeError> {
        if self.kinds.is_empty() {
            return Err(SchemeError::Empty);
        }
        Ok(Scheme { kinds: self.kinds })
    }
}

/// Validated, immutable set of composable kinds in registration order.
#[derive(Debug, Clone)]
pub struct Scheme {
    kinds: Vec<GroupVersionKind>,
}

impl Scheme {
    pub fn recognizes<K: ComposedKind>(&self) -> bool {
        self.recognizes_raw(K::API_VERSION, K::KIND)
    }

    pub fn recognizes_raw(&self, api_version: &str, kind: &str) -> bool {
        self.kinds.iter().any(|g| g.api_version() == api_version && g.kind == kind)
    }

    /// `group/version/Kind` keys (core group renders as `version/Kind`).
    pub fn keys(&self) -> Vec<String> { self.kinds.iter().map(key).collect() }
}

fn parse_gvk(api_version: &str, kind: &str) -> Result<GroupVersionKind, SchemeError> {
    let invalid = || SchemeError::InvalidApiVersion { api_version: api_version.to_string(), kind: kind.to_string() };
    let gv = GroupVersion::from_str(api_version).map_err(|_| invalid())?;
    if gv.version.is_empty() || gv.version.contains('/') {
        return Err(invalid());
    }
    if kind.is_empty() {
        return Err(SchemeError::EmptyKind(api_version.to_string()));
    }
    Ok(GroupVersionKind::gvk(&gv.group, &gv.version, kind))
}

fn key(g: &GroupVersionKind) -> String {
    if g.group.is_empty() {
        format!("{}/{}", g.version, g.kind)
    } else {
        format!("{}/{}/{}", g.group, g.version, g.kind)
    }
}
