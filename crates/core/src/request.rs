//! Typed accessors over a [`RunFunctionRequest`].

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;

use crate::{DesiredComposed, ObservedComposed, Resource, ResourceName, RunFunctionRequest};

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("cannot decode function input: {0}")]
    Input(#[source] serde_json::Error),
    #[error("request has no observed composite resource")]
    MissingComposite,
    #[error("{what} is not a JSON object")]
    NotAnObject { what: String },
}

/// Decode the function input. A request without input yields `None`.
pub fn get_input<T: DeserializeOwned>(req: &RunFunctionRequest) -> Result<Option<T>, RequestError> {
    match &req.input {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v.clone()).map(Some).map_err(RequestError::Input),
    }
}

pub fn get_observed_composite_resource(req: &RunFunctionRequest) -> Result<ObservedComposed, RequestError> {
    let xr = req.observed.composite.as_ref().ok_or(RequestError::MissingComposite)?;
    ensure_object(&xr.resource, || "observed composite resource".to_string())?;
    Ok(ObservedComposed { resource: xr.resource.clone(), connection_details: xr.connection_details.clone() })
}

pub fn get_observed_composed_resources(
    req: &RunFunctionRequest,
) -> Result<BTreeMap<ResourceName, ObservedComposed>, RequestError> {
    let mut out = BTreeMap::new();
    for (name, r) in req.observed.resources.iter() {
        ensure_object(&r.resource, || format!("observed resource {}", name))?;
        out.insert(
            name.clone(),
            ObservedComposed { resource: r.resource.clone(), connection_details: r.connection_details.clone() },
        );
    }
    Ok(out)
}

pub fn get_desired_composed_resources(
    req: &RunFunctionRequest,
) -> Result<BTreeMap<ResourceName, DesiredComposed>, RequestError> {
    let mut out = BTreeMap::new();
    for (name, r) in req.desired.resources.iter() {
        ensure_object(&r.resource, || format!("desired resource {}", name))?;
        out.insert(name.clone(), DesiredComposed { resource: r.resource.clone(), ready: r.ready });
    }
    Ok(out)
}

/// Desired composite as the caller supplied it, if any.
pub fn get_desired_composite_resource(req: &RunFunctionRequest) -> Option<Resource> {
    req.desired.composite.clone()
}

fn ensure_object(v: &serde_json::Value, what: impl FnOnce() -> String) -> Result<(), RequestError> {
    if v.is_object() {
        Ok(())
    } else {
        Err(RequestError::NotAnObject { what: what() })
    }
}
