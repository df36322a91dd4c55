use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::debug;
use xdeploy_composer::{ComposableResource, ComposeError, DesiredResource};
use xdeploy_core::ResourceName;

use crate::gateway::{BackendRef, HttpRoute, HttpRouteRule, HttpRouteSpec, ParentRef};
use crate::types::{XComposer, XContext};
use crate::{ENGINE_ID, EXTERNAL_PORT};

/// Composes the HTTPRoute attaching the Service to the configured Gateway.
///
/// Built only when the composite sets both `port` and `hostname` and the
/// function input names a Gateway (name and namespace).
pub struct HttpRouteComposer<'a> {
    base: XComposer<'a>,
    observed: Option<HttpRoute>,
}

impl<'a> HttpRouteComposer<'a> {
    pub fn new(ctx: &'a XContext) -> Result<Self, ComposeError> {
        let name = ResourceName::compose(ENGINE_ID, "httproute", ctx.xr.name());
        let base = XComposer::new(ctx, name, "HttpRouteReady");
        let observed = base.observed::<HttpRoute>()?;
        Ok(Self { base, observed })
    }

    pub fn resource_name(&self) -> &ResourceName { &self.base.resource_name }

    fn create_resource(&self) -> Option<HttpRoute> {
        let ctx = self.base.ctx;
        let xd = &ctx.xr;

        let Some((gateway_name, gateway_namespace)) = ctx.defaults.as_ref().and_then(|d| d.gateway()) else {
            debug!(parent: &ctx.log, name = %self.base.resource_name, "no gateway configured, skipping httpRoute");
            return None;
        };

        let (Some(_), Some(hostname)) = (xd.spec.port, xd.spec.hostname()) else {
            debug!(parent: &ctx.log, name = %self.base.resource_name, "no port or hostname specified, skipping httpRoute");
            return None;
        };

        let spec = HttpRouteSpec {
            parent_refs: vec![ParentRef::gateway(gateway_name, gateway_namespace)],
            hostnames: vec![hostname.to_string()],
            rules: vec![HttpRouteRule {
                backend_refs: vec![BackendRef { kind: None, name: xd.name().to_string(), port: Some(EXTERNAL_PORT) }],
            }],
        };
        Some(HttpRoute::new(ObjectMeta { name: Some(xd.name().to_string()), ..Default::default() }, spec))
    }
}

impl ComposableResource for HttpRouteComposer<'_> {
    fn compose_desired_resource(&self) -> Result<Option<DesiredResource>, ComposeError> {
        self.base.compose_desired_resource_from(self.create_resource())
    }

    fn is_ready(&self) -> bool {
        self.observed.as_ref().is_some_and(HttpRoute::accepted_by_any_parent)
    }

    fn condition_type(&self) -> &str { self.base.condition_type() }
}
