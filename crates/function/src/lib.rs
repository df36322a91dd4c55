//! XDeployment composition function.
//!
//! Turns an `XDeployment` composite into a Deployment, an optional Service and an
//! optional Gateway API HTTPRoute, and reports each one's readiness as a
//! condition on the composite. Pure: output depends only on the request.

#![forbid(unsafe_code)]

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use xdeploy_composer::{Scheme, SchemeBuilder, SchemeError};

pub mod deployment;
pub mod function;
pub mod gateway;
pub mod httproute;
pub mod service;
pub mod types;

pub use deployment::{env_vars, DeploymentComposer};
pub use function::{Function, FunctionError};
pub use gateway::HttpRoute;
pub use httproute::HttpRouteComposer;
pub use service::ServiceComposer;
pub use types::{GatewayConfig, XContext, XDeployment, XDeploymentDefaults, XDeploymentSpec};

/// Prefix of every composed resource name.
pub const ENGINE_ID: &str = "xdeployment";

/// Port the Service listens on and the HTTPRoute forwards to.
pub const EXTERNAL_PORT: i32 = 8080;

pub const NAME_LABEL: &str = "app.kubernetes.io/name";

/// Kinds this function composes.
pub fn scheme() -> Result<Scheme, SchemeError> {
    SchemeBuilder::new().register::<Deployment>()?.register::<Service>()?.register::<HttpRoute>()?.build()
}
