#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use xdeploy_composer::{convert_observed, ComposeError};
use xdeploy_core::{ObservedComposed, ResourceName};

fn observed(entries: Vec<(&str, serde_json::Value)>) -> BTreeMap<ResourceName, ObservedComposed> {
    entries
        .into_iter()
        .map(|(n, v)| (ResourceName::from(n), ObservedComposed { resource: v, connection_details: BTreeMap::new() }))
        .collect()
}

#[test]
fn decodes_typed_kubernetes_objects() {
    let m = observed(vec![(
        "xdeployment-service-web",
        serde_json::json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": { "name": "web" },
            "spec": { "clusterIP": "10.0.0.12" }
        }),
    )]);
    let svc: Service = convert_observed(&m, &"xdeployment-service-web".into()).unwrap().unwrap();
    assert_eq!(svc.spec.and_then(|s| s.cluster_ip).as_deref(), Some("10.0.0.12"));
}

#[test]
fn kind_mismatch_is_corruption() {
    // a Service stored under a name that should hold a Deployment
    let m = observed(vec![(
        "xdeployment-deployment-web",
        serde_json::json!({ "apiVersion": "v1", "kind": "Service", "metadata": { "name": "web" } }),
    )]);
    let err = convert_observed::<Deployment>(&m, &"xdeployment-deployment-web".into()).unwrap_err();
    assert!(matches!(err, ComposeError::DecodeObserved { .. }));
}

#[test]
fn lookup_is_by_exact_name() {
    let m = observed(vec![("xdeployment-service-web", serde_json::json!({ "apiVersion": "v1", "kind": "Service" }))]);
    let got: Option<Service> = convert_observed(&m, &"xdeployment-service-api".into()).unwrap();
    assert!(got.is_none());
}
