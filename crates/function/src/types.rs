//! XDeployment composite resource and function input.

use std::collections::HashMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use xdeploy_composer::{BaseComposer, FunctionContext};

pub const XDEPLOYMENT_API_VERSION: &str = "platform.example.org/v1alpha1";
pub const XDEPLOYMENT_KIND: &str = "XDeployment";

pub const DEFAULTS_API_VERSION: &str = "xdeployment.fn.crossplane.io/v1beta1";
pub const DEFAULTS_KIND: &str = "XDeploymentDefaults";

/// High-level intent: run `image`, optionally expose it on `port` and route `hostname` to it.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct XDeployment {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: XDeploymentSpec,
}

impl XDeployment {
    pub fn name(&self) -> &str { self.metadata.name.as_deref().unwrap_or_default() }
}

impl XDeploymentSpec {
    /// Route hostname; `null` and `""` both count as unset.
    pub fn hostname(&self) -> Option<&str> { non_empty(&self.hostname) }
}

fn non_empty(v: &Option<String>) -> Option<&str> { v.as_deref().filter(|s| !s.is_empty()) }

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct XDeploymentSpec {
    pub image: String,
    /// Defaults to 2 when unset. Passed through unchecked otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// Container port; enables the Service and is required for the HTTPRoute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
}

/// Function input supplied by the composition pipeline step.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct XDeploymentDefaults {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,
}

/// Gateway that HTTPRoutes attach to.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct GatewayConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl GatewayConfig {
    pub fn new(name: &str, namespace: &str) -> Self {
        Self { name: Some(name.to_string()), namespace: Some(namespace.to_string()) }
    }
}

impl XDeploymentDefaults {
    pub fn new(gateway: Option<GatewayConfig>) -> Self {
        Self { api_version: DEFAULTS_API_VERSION.to_string(), kind: DEFAULTS_KIND.to_string(), gateway }
    }

    /// Gateway `(name, namespace)` when both are set and non-empty.
    pub fn gateway(&self) -> Option<(&str, &str)> {
        let g = self.gateway.as_ref()?;
        Some((non_empty(&g.name)?, non_empty(&g.namespace)?))
    }
}

pub type XContext = FunctionContext<XDeployment, XDeploymentDefaults>;
pub type XComposer<'a> = BaseComposer<'a, XDeployment, XDeploymentDefaults>;
