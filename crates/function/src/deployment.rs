use std::collections::{BTreeMap, HashMap};

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use tracing::debug;
use xdeploy_composer::{ComposableResource, ComposeError, DesiredResource};
use xdeploy_core::ResourceName;

use crate::types::{XComposer, XContext};
use crate::{ENGINE_ID, NAME_LABEL};

pub const DEFAULT_REPLICAS: i32 = 2;

/// Composes the workload Deployment. Always built.
pub struct DeploymentComposer<'a> {
    base: XComposer<'a>,
    observed: Option<Deployment>,
}

impl<'a> DeploymentComposer<'a> {
    /// Fails only when an observed Deployment exists but cannot be decoded.
    pub fn new(ctx: &'a XContext) -> Result<Self, ComposeError> {
        let name = ResourceName::compose(ENGINE_ID, "deployment", ctx.xr.name());
        let base = XComposer::new(ctx, name, "DeploymentReady");
        let observed = base.observed::<Deployment>()?;
        Ok(Self { base, observed })
    }

    pub fn resource_name(&self) -> &ResourceName { &self.base.resource_name }

    fn create_resource(&self) -> Deployment {
        let xd = &self.base.ctx.xr;
        let name = xd.name().to_string();

        let replicas = xd.spec.replicas.unwrap_or_else(|| {
            debug!(parent: &self.base.ctx.log, name = %self.base.resource_name, "replicas not set on deployment, defaulting to 2");
            DEFAULT_REPLICAS
        });

        let ports = xd.spec.port.map(|port| {
            vec![ContainerPort { name: Some("http".to_string()), container_port: port, ..Default::default() }]
        });

        let container = Container {
            name: name.clone(),
            image: Some(xd.spec.image.clone()),
            env: Some(env_vars(xd.spec.env.as_ref())),
            ports,
            ..Default::default()
        };

        let labels = BTreeMap::from([(NAME_LABEL.to_string(), name.clone())]);
        Deployment {
            metadata: ObjectMeta { name: Some(name.clone()), ..Default::default() },
            spec: Some(DeploymentSpec {
                replicas: Some(replicas),
                selector: LabelSelector { match_labels: Some(labels.clone()), ..Default::default() },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta { name: Some(name), labels: Some(labels), ..Default::default() }),
                    spec: Some(PodSpec { containers: vec![container], ..Default::default() }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

impl ComposableResource for DeploymentComposer<'_> {
    fn compose_desired_resource(&self) -> Result<Option<DesiredResource>, ComposeError> {
        self.base.compose_desired_resource_from(Some(self.create_resource()))
    }

    fn is_ready(&self) -> bool {
        let Some(observed) = &self.observed else { return false };
        observed
            .status
            .as_ref()
            .and_then(|s| s.conditions.as_ref())
            .is_some_and(|conds| conds.iter().any(|c| c.type_ == "Available" && c.status == "True"))
    }

    fn condition_type(&self) -> &str { self.base.condition_type() }
}

/// Environment map as container env entries, ordered by name so repeated
/// invocations emit identical objects. No map gives an empty list.
pub fn env_vars(env: Option<&HashMap<String, String>>) -> Vec<EnvVar> {
    let Some(env) = env else { return Vec::new() };
    let mut out: Vec<EnvVar> = env
        .iter()
        .map(|(k, v)| EnvVar { name: k.clone(), value: Some(v.clone()), ..Default::default() })
        .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{context, observed_with, xdeployment};
    use xdeploy_core::Ready;

    #[test]
    fn names_and_condition_type() {
        let ctx = context(xdeployment("test-app", None), None, Default::default());
        let d = DeploymentComposer::new(&ctx).unwrap();
        assert_eq!(d.resource_name().as_str(), "xdeployment-deployment-test-app");
        assert_eq!(d.condition_type(), "DeploymentReady");
    }

    #[test]
    fn defaults_replicas_to_two() {
        let ctx = context(xdeployment("test-app", None), None, Default::default());
        let d = DeploymentComposer::new(&ctx).unwrap().create_resource();
        assert_eq!(d.spec.unwrap().replicas, Some(2));
    }

    #[test]
    fn keeps_explicit_replicas() {
        let mut xd = xdeployment("test-app", None);
        xd.spec.replicas = Some(5);
        let ctx = context(xd, None, Default::default());
        let d = DeploymentComposer::new(&ctx).unwrap().create_resource();
        assert_eq!(d.spec.unwrap().replicas, Some(5));
    }

    #[test]
    fn container_port_only_with_spec_port() {
        let ctx = context(xdeployment("test-app", Some(8080)), None, Default::default());
        let d = DeploymentComposer::new(&ctx).unwrap().create_resource();
        let c = &d.spec.unwrap().template.spec.unwrap().containers[0];
        assert_eq!(c.image.as_deref(), Some("nginx:latest"));
        let ports = c.ports.as_ref().unwrap();
        assert_eq!(ports[0].container_port, 8080);
        assert_eq!(ports[0].name.as_deref(), Some("http"));

        let ctx = context(xdeployment("test-app", None), None, Default::default());
        let d = DeploymentComposer::new(&ctx).unwrap().create_resource();
        assert!(d.spec.unwrap().template.spec.unwrap().containers[0].ports.is_none());
    }

    #[test]
    fn selector_matches_pod_labels() {
        let ctx = context(xdeployment("test-app", None), None, Default::default());
        let spec = DeploymentComposer::new(&ctx).unwrap().create_resource().spec.unwrap();
        let sel = spec.selector.match_labels.unwrap();
        assert_eq!(sel[NAME_LABEL], "test-app");
        assert_eq!(spec.template.metadata.unwrap().labels.unwrap(), sel);
    }

    #[test]
    fn composed_resource_is_not_ready() {
        let ctx = context(xdeployment("test-app", None), None, Default::default());
        let got = DeploymentComposer::new(&ctx).unwrap().compose_desired_resource().unwrap().unwrap();
        assert_eq!(got.resource.ready, Ready::False);
        assert_eq!(got.resource.resource["kind"], "Deployment");
        assert_eq!(got.resource.resource["apiVersion"], "apps/v1");
        // empty env is an empty list, not a missing field
        assert_eq!(got.resource.resource["spec"]["template"]["spec"]["containers"][0]["env"], serde_json::json!([]));
    }

    #[test]
    fn env_vars_sorted_by_name() {
        let env = HashMap::from([
            ("ZEBRA".to_string(), "z".to_string()),
            ("ALPHA".to_string(), "a".to_string()),
            ("BETA".to_string(), "b".to_string()),
        ]);
        let got: Vec<(String, Option<String>)> = env_vars(Some(&env)).into_iter().map(|e| (e.name, e.value)).collect();
        assert_eq!(
            got,
            vec![
                ("ALPHA".to_string(), Some("a".to_string())),
                ("BETA".to_string(), Some("b".to_string())),
                ("ZEBRA".to_string(), Some("z".to_string())),
            ]
        );
    }

    #[test]
    fn env_vars_empty_or_absent() {
        assert!(env_vars(None).is_empty());
        assert!(env_vars(Some(&HashMap::new())).is_empty());
    }

    fn observed_deployment(conditions: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": "test-app" },
            "status": { "conditions": conditions }
        })
    }

    #[test]
    fn readiness_follows_available_condition() {
        let name = "xdeployment-deployment-test-app";
        let cases = vec![
            (serde_json::json!([]), false),
            (serde_json::json!([{ "type": "Available", "status": "False" }]), false),
            (serde_json::json!([{ "type": "Progressing", "status": "True" }]), false),
            (
                serde_json::json!([
                    { "type": "Progressing", "status": "True" },
                    { "type": "Available", "status": "True" }
                ]),
                true,
            ),
        ];
        for (conds, want) in cases {
            let ctx = context(xdeployment("test-app", None), None, observed_with(name, observed_deployment(conds.clone())));
            let d = DeploymentComposer::new(&ctx).unwrap();
            assert_eq!(d.is_ready(), want, "conditions={}", conds);
            assert_eq!(d.is_ready(), want, "is_ready must be stable");
        }
    }

    #[test]
    fn not_ready_when_never_observed() {
        let ctx = context(xdeployment("test-app", None), None, Default::default());
        assert!(!DeploymentComposer::new(&ctx).unwrap().is_ready());
    }

    #[test]
    fn corrupt_observed_deployment_fails_construction() {
        let bad = serde_json::json!({ "apiVersion": "apps/v1", "kind": "Deployment", "spec": { "replicas": "many" } });
        let ctx = context(xdeployment("test-app", None), None, observed_with("xdeployment-deployment-test-app", bad));
        assert!(DeploymentComposer::new(&ctx).is_err());
    }
}
