//! Request handler: decode, compose in a fixed order, report readiness.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{info, info_span, warn};
use xdeploy_composer::{ComposableResource, ComposeError, DesiredResource, Scheme, SchemeError};
use xdeploy_core::request::{self, RequestError};
use xdeploy_core::{
    response, Condition, DesiredComposed, Ready, ResourceName, RunFunctionRequest, RunFunctionResponse, Status, Target,
    DEFAULT_TTL,
};

use crate::deployment::DeploymentComposer;
use crate::httproute::HttpRouteComposer;
use crate::service::ServiceComposer;
use crate::types::{XContext, XDeployment, XDeploymentDefaults};

#[derive(Debug, thiserror::Error)]
pub enum FunctionError {
    #[error("cannot get Function input: {0}")]
    Input(#[source] RequestError),
    #[error("cannot get observed resources: {0}")]
    Observed(#[source] RequestError),
    #[error("cannot get desired resources: {0}")]
    Desired(#[source] RequestError),
    #[error("cannot get observed composite resource: {0}")]
    Composite(#[source] RequestError),
    #[error("cannot convert composite resource to XDeployment: {0}")]
    Convert(#[source] serde_json::Error),
    #[error("composite resource has no metadata.name")]
    MissingName,
    #[error("cannot create {kind}: {source}")]
    Composer {
        kind: &'static str,
        #[source]
        source: ComposeError,
    },
    #[error("cannot compose {condition_type}: {source}")]
    Composition {
        condition_type: String,
        #[source]
        source: ComposeError,
    },
}

impl FunctionError {
    /// Build failures are reported as composition errors; everything else is internal.
    pub fn is_composition(&self) -> bool { matches!(self, FunctionError::Composition { .. }) }
}

/// Successful composition, applied to the response in one step.
struct Composition {
    /// Desired resources the caller already had.
    existing: BTreeMap<ResourceName, DesiredComposed>,
    built: Vec<DesiredResource>,
    conditions: Vec<Condition>,
}

/// The XDeployment composition function.
#[derive(Debug, Clone)]
pub struct Function {
    scheme: Arc<Scheme>,
    ttl: Duration,
}

impl Function {
    /// Validates the scheme of composable kinds; the host surfaces the error.
    pub fn new() -> Result<Self, SchemeError> {
        Ok(Self { scheme: Arc::new(crate::scheme()?), ttl: DEFAULT_TTL })
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn scheme(&self) -> &Scheme { &self.scheme }

    pub fn run_function(&self, req: &RunFunctionRequest) -> RunFunctionResponse {
        info!(tag = %req.meta.tag, "Running function");
        counter!("xdeploy_runs_total", 1u64);

        let mut rsp = response::to(req, self.ttl);
        match self.compose(req) {
            Ok(Composition { existing: mut desired, built, conditions }) => {
                for d in built {
                    info!(name = %d.name, "Added desired resource");
                    counter!("xdeploy_composed_total", 1u64);
                    if d.resource.ready == Ready::True {
                        counter!("xdeploy_ready_total", 1u64);
                    }
                    desired.insert(d.name, d.resource);
                }
                rsp.conditions.extend(conditions);
                rsp.set_desired_composed_resources(request::get_desired_composite_resource(req), desired);
            }
            Err(e) if e.is_composition() => composition_error_response(&mut rsp, &e),
            Err(e) => internal_error_response(&mut rsp, &e),
        }
        rsp
    }

    fn compose(&self, req: &RunFunctionRequest) -> Result<Composition, FunctionError> {
        let defaults: Option<XDeploymentDefaults> = request::get_input(req).map_err(FunctionError::Input)?;
        let observed = request::get_observed_composed_resources(req).map_err(FunctionError::Observed)?;
        let existing = request::get_desired_composed_resources(req).map_err(FunctionError::Desired)?;
        let xr = request::get_observed_composite_resource(req).map_err(FunctionError::Composite)?;

        let xd: XDeployment = serde_json::from_value(xr.resource).map_err(FunctionError::Convert)?;
        if xd.name().is_empty() {
            return Err(FunctionError::MissingName);
        }

        let log = info_span!(
            "xdeployment",
            "xr-version" = %xd.api_version,
            "xr-kind" = %xd.kind,
            "xr-name" = %xd.name(),
        );
        let _enter = log.enter();

        let ctx = XContext { observed, xr: xd, defaults, log: log.clone(), scheme: Arc::clone(&self.scheme) };

        let deployment =
            DeploymentComposer::new(&ctx).map_err(|source| FunctionError::Composer { kind: "deployment", source })?;
        let service = ServiceComposer::new(&ctx).map_err(|source| FunctionError::Composer { kind: "service", source })?;
        let http_route =
            HttpRouteComposer::new(&ctx).map_err(|source| FunctionError::Composer { kind: "httpRoute", source })?;

        // Fixed order: condition and merge order must be stable for callers.
        let resources: [&dyn ComposableResource; 3] = [&deployment, &service, &http_route];

        let mut built = Vec::with_capacity(resources.len());
        let mut conditions = Vec::with_capacity(resources.len());
        for r in resources {
            let composed = r.compose_desired_resource().map_err(|source| FunctionError::Composition {
                condition_type: r.condition_type().to_string(),
                source,
            })?;
            let Some(mut d) = composed else { continue };

            if r.is_ready() {
                d.resource.ready = Ready::True;
                conditions.push(condition(r.condition_type(), Status::True, "Available", None));
            } else {
                let msg = format!("{} is not yet available", r.condition_type());
                conditions.push(condition(r.condition_type(), Status::False, "Unavailable", Some(msg)));
            }
            built.push(d);
        }
        Ok(Composition { existing, built, conditions })
    }
}

fn condition(type_: &str, status: Status, reason: &str, message: Option<String>) -> Condition {
    Condition { type_: type_.to_string(), status, reason: reason.to_string(), message, target: Target::Composite }
}

/// Mark the invocation failed: `FunctionSuccess=False/InternalError` on the
/// composite and claim, plus a fatal result.
pub fn internal_error_response(rsp: &mut RunFunctionResponse, err: &FunctionError) {
    warn!(error = %err, "function failed");
    counter!("xdeploy_fatal_total", 1u64);
    rsp.condition_false("FunctionSuccess", "InternalError").target_composite_and_claim();
    rsp.fatal(err);
}

/// `FunctionSuccess=False/CompositionError` on the composite, plus a fatal result.
pub fn composition_error_response(rsp: &mut RunFunctionResponse, err: &FunctionError) {
    warn!(error = %err, "composition failed");
    counter!("xdeploy_fatal_total", 1u64);
    rsp.condition_false("FunctionSuccess", "CompositionError").with_message(err.to_string()).target_composite();
    rsp.fatal(err);
}
