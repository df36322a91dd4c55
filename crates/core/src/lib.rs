//! xdeploy core types: the composition function request/response envelope.
//!
//! JSON shapes follow the function protocol's JSON mapping: camelCase fields and
//! enum values in their protocol spelling (`READY_TRUE`, `SEVERITY_FATAL`, ...).

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod request;
pub mod response;

pub use request::RequestError;

/// Default time the caller may cache a response before invoking again.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Name of a composed resource inside the composite's resource map.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceName(String);

impl ResourceName {
    /// `<engine-id>-<kind>-<xr-name>`; a pure function of its inputs.
    pub fn compose(engine_id: &str, kind: &str, xr_name: &str) -> Self {
        Self(format!("{}-{}-{}", engine_id, kind, xr_name))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for ResourceName {
    fn from(v: &str) -> Self { Self(v.to_string()) }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ready {
    #[default]
    #[serde(rename = "READY_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "READY_TRUE")]
    True,
    #[serde(rename = "READY_FALSE")]
    False,
}

/// A resource as carried on the wire: the raw object plus bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    #[serde(default)]
    pub resource: serde_json::Value,
    /// Base64 values, passed through untouched.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub connection_details: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "is_unspecified")]
    pub ready: Ready,
}

fn is_unspecified(r: &Ready) -> bool { matches!(r, Ready::Unspecified) }

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite: Option<Resource>,
    #[serde(default)]
    pub resources: BTreeMap<ResourceName, Resource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestMeta {
    #[serde(default)]
    pub tag: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunFunctionRequest {
    #[serde(default)]
    pub meta: RequestMeta,
    /// Function input (static configuration), absent unless the pipeline step sets one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
    #[serde(default)]
    pub observed: State,
    #[serde(default)]
    pub desired: State,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

/// Last-known state of a composed resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedComposed {
    pub resource: serde_json::Value,
    pub connection_details: BTreeMap<String, String>,
}

/// Proposed state of a composed resource plus its readiness.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredComposed {
    pub resource: serde_json::Value,
    pub ready: Ready,
}

impl DesiredComposed {
    /// Freshly built objects start not-ready; only a readiness check may flip them.
    pub fn new(resource: serde_json::Value) -> Self { Self { resource, ready: Ready::False } }
}

impl From<DesiredComposed> for Resource {
    fn from(d: DesiredComposed) -> Self {
        Resource { resource: d.resource, connection_details: BTreeMap::new(), ready: d.ready }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "SEVERITY_NORMAL")]
    Normal,
    #[serde(rename = "SEVERITY_WARNING")]
    Warning,
    #[serde(rename = "SEVERITY_FATAL")]
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    #[serde(rename = "TARGET_COMPOSITE")]
    Composite,
    #[serde(rename = "TARGET_COMPOSITE_AND_CLAIM")]
    CompositeAndClaim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "STATUS_CONDITION_UNKNOWN")]
    Unknown,
    #[serde(rename = "STATUS_CONDITION_TRUE")]
    True,
    #[serde(rename = "STATUS_CONDITION_FALSE")]
    False,
}

/// Outcome message surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FnResult {
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
}

/// Status condition for the composite (and optionally its claim).
/// Carries no timestamp: the caller stamps transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: Status,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub target: Target,
}

impl Condition {
    pub fn with_message(&mut self, message: impl Into<String>) -> &mut Self {
        self.message = Some(message.into());
        self
    }

    pub fn target_composite(&mut self) -> &mut Self {
        self.target = Target::Composite;
        self
    }

    pub fn target_composite_and_claim(&mut self) -> &mut Self {
        self.target = Target::CompositeAndClaim;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMeta {
    #[serde(default)]
    pub tag: String,
    #[serde(with = "response::ttl_format", default = "default_ttl")]
    pub ttl: Duration,
}

fn default_ttl() -> Duration { DEFAULT_TTL }

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunFunctionResponse {
    pub meta: ResponseMeta,
    /// Absent when the invocation failed; no partial desired state is returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired: Option<State>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<FnResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}
