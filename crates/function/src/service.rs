use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use tracing::debug;
use xdeploy_composer::{ComposableResource, ComposeError, DesiredResource};
use xdeploy_core::ResourceName;

use crate::types::{XComposer, XContext};
use crate::{ENGINE_ID, EXTERNAL_PORT, NAME_LABEL};

/// Composes the ClusterIP Service in front of the workload. Only built when the
/// composite sets a port.
pub struct ServiceComposer<'a> {
    base: XComposer<'a>,
    observed: Option<Service>,
}

impl<'a> ServiceComposer<'a> {
    pub fn new(ctx: &'a XContext) -> Result<Self, ComposeError> {
        let name = ResourceName::compose(ENGINE_ID, "service", ctx.xr.name());
        let base = XComposer::new(ctx, name, "ServiceReady");
        let observed = base.observed::<Service>()?;
        Ok(Self { base, observed })
    }

    pub fn resource_name(&self) -> &ResourceName { &self.base.resource_name }

    fn create_resource(&self) -> Option<Service> {
        let xd = &self.base.ctx.xr;
        let Some(port) = xd.spec.port else {
            debug!(parent: &self.base.ctx.log, name = %self.base.resource_name, "no port found, skipping service");
            return None;
        };

        Some(Service {
            metadata: ObjectMeta { name: Some(xd.name().to_string()), ..Default::default() },
            spec: Some(ServiceSpec {
                type_: Some("ClusterIP".to_string()),
                selector: Some(BTreeMap::from([(NAME_LABEL.to_string(), xd.name().to_string())])),
                ports: Some(vec![ServicePort {
                    name: Some("http".to_string()),
                    protocol: Some("TCP".to_string()),
                    port: EXTERNAL_PORT,
                    target_port: Some(IntOrString::Int(port)),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}

impl ComposableResource for ServiceComposer<'_> {
    fn compose_desired_resource(&self) -> Result<Option<DesiredResource>, ComposeError> {
        self.base.compose_desired_resource_from(self.create_resource())
    }

    /// Ready once the Service has been assigned a cluster IP.
    fn is_ready(&self) -> bool {
        self.observed
            .as_ref()
            .and_then(|s| s.spec.as_ref())
            .and_then(|s| s.cluster_ip.as_deref())
            .is_some_and(|ip| !ip.is_empty())
    }

    fn condition_type(&self) -> &str { self.base.condition_type() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{context, observed_with, xdeployment};
    use xdeploy_core::Ready;

    #[test]
    fn names_and_condition_type() {
        let ctx = context(xdeployment("test-app", None), None, Default::default());
        let s = ServiceComposer::new(&ctx).unwrap();
        assert_eq!(s.resource_name().as_str(), "xdeployment-service-test-app");
        assert_eq!(s.condition_type(), "ServiceReady");
    }

    #[test]
    fn absent_without_port() {
        let ctx = context(xdeployment("test-app", None), None, Default::default());
        assert!(ServiceComposer::new(&ctx).unwrap().compose_desired_resource().unwrap().is_none());
    }

    #[test]
    fn forwards_external_port_to_container_port() {
        let ctx = context(xdeployment("test-app", Some(3000)), None, Default::default());
        let svc = ServiceComposer::new(&ctx).unwrap().create_resource().unwrap();
        let spec = svc.spec.unwrap();
        assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));
        assert_eq!(spec.selector.unwrap()[NAME_LABEL], "test-app");
        let p = &spec.ports.unwrap()[0];
        assert_eq!(p.port, 8080);
        assert_eq!(p.protocol.as_deref(), Some("TCP"));
        assert_eq!(p.target_port, Some(IntOrString::Int(3000)));
    }

    #[test]
    fn composed_resource_is_not_ready() {
        let ctx = context(xdeployment("test-app", Some(8080)), None, Default::default());
        let got = ServiceComposer::new(&ctx).unwrap().compose_desired_resource().unwrap().unwrap();
        assert_eq!(got.name.as_str(), "xdeployment-service-test-app");
        assert_eq!(got.resource.ready, Ready::False);
        assert_eq!(got.resource.resource["kind"], "Service");
    }

    #[test]
    fn readiness_follows_cluster_ip() {
        let name = "xdeployment-service-test-app";
        let cases = vec![
            (serde_json::json!({ "apiVersion": "v1", "kind": "Service", "spec": {} }), false),
            (serde_json::json!({ "apiVersion": "v1", "kind": "Service", "spec": { "clusterIP": "" } }), false),
            (serde_json::json!({ "apiVersion": "v1", "kind": "Service", "spec": { "clusterIP": "10.96.0.10" } }), true),
        ];
        for (obs, want) in cases {
            let ctx = context(xdeployment("test-app", Some(8080)), None, observed_with(name, obs.clone()));
            let s = ServiceComposer::new(&ctx).unwrap();
            assert_eq!(s.is_ready(), want, "observed={}", obs);
        }

        let ctx = context(xdeployment("test-app", Some(8080)), None, Default::default());
        assert!(!ServiceComposer::new(&ctx).unwrap().is_ready());
    }
}
