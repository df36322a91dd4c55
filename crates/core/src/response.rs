//! Builders for [`RunFunctionResponse`].

use std::collections::BTreeMap;
use std::time::Duration;

use crate::{
    Condition, DesiredComposed, FnResult, Resource, ResponseMeta, ResourceName, RunFunctionRequest,
    RunFunctionResponse, Severity, State, Status, Target,
};

/// Start a response for `req`: echoes tag and context, carries no desired state yet.
pub fn to(req: &RunFunctionRequest, ttl: Duration) -> RunFunctionResponse {
    RunFunctionResponse {
        meta: ResponseMeta { tag: req.meta.tag.clone(), ttl },
        desired: None,
        results: Vec::new(),
        conditions: Vec::new(),
        context: req.context.clone(),
    }
}

impl RunFunctionResponse {
    pub fn condition_true(&mut self, type_: impl Into<String>, reason: impl Into<String>) -> &mut Condition {
        self.push_condition(type_.into(), Status::True, reason.into())
    }

    pub fn condition_false(&mut self, type_: impl Into<String>, reason: impl Into<String>) -> &mut Condition {
        self.push_condition(type_.into(), Status::False, reason.into())
    }

    fn push_condition(&mut self, type_: String, status: Status, reason: String) -> &mut Condition {
        self.conditions.push(Condition { type_, status, reason, message: None, target: Target::Composite });
        let last = self.conditions.len() - 1;
        &mut self.conditions[last]
    }

    /// Record a fatal result; the caller stops the pipeline on it.
    pub fn fatal(&mut self, err: &dyn std::error::Error) {
        self.push_result(Severity::Fatal, error_chain(err));
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push_result(Severity::Warning, message.into());
    }

    pub fn normal(&mut self, message: impl Into<String>) {
        self.push_result(Severity::Normal, message.into());
    }

    fn push_result(&mut self, severity: Severity, message: String) {
        self.results.push(FnResult { severity, message, target: Some(Target::Composite) });
    }

    /// Replace the desired composed resources, keeping the desired composite.
    pub fn set_desired_composed_resources(
        &mut self,
        composite: Option<Resource>,
        resources: BTreeMap<ResourceName, DesiredComposed>,
    ) {
        let resources = resources.into_iter().map(|(k, v)| (k, Resource::from(v))).collect();
        self.desired = Some(State { composite, resources });
    }

    pub fn is_fatal(&self) -> bool {
        self.results.iter().any(|r| r.severity == Severity::Fatal)
    }
}

/// Render `err` and its sources as `outer: inner: root`.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut cur = err.source();
    while let Some(e) = cur {
        let s = e.to_string();
        // thiserror variants often already embed their source
        if !out.ends_with(&s) {
            out.push_str(": ");
            out.push_str(&s);
        }
        cur = e.source();
    }
    out
}

/// Protocol duration encoding: `"60s"`, `"1.5s"`.
pub mod ttl_format {
    use std::time::Duration;

    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        if d.subsec_nanos() == 0 {
            s.serialize_str(&format!("{}s", d.as_secs()))
        } else {
            s.serialize_str(&format!("{}s", d.as_secs_f64()))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        let secs = raw
            .strip_suffix('s')
            .and_then(|n| n.parse::<f64>().ok())
            .filter(|n| n.is_finite() && *n >= 0.0)
            .ok_or_else(|| de::Error::custom(format!("invalid duration {:?}", raw)))?;
        Duration::try_from_secs_f64(secs).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn to_echoes_tag_and_context() {
        let req = RunFunctionRequest {
            meta: crate::RequestMeta { tag: "t1".into() },
            context: Some(serde_json::json!({ "k": "v" })),
            ..Default::default()
        };
        let rsp = to(&req, Duration::from_secs(30));
        assert_eq!(rsp.meta.tag, "t1");
        assert_eq!(rsp.meta.ttl, Duration::from_secs(30));
        assert_eq!(rsp.context, req.context);
        assert!(rsp.desired.is_none());
    }

    #[test]
    fn condition_builders_chain() {
        let mut rsp = RunFunctionResponse::default();
        rsp.condition_false("FunctionSuccess", "InternalError").with_message("boom").target_composite_and_claim();
        rsp.condition_true("DeploymentReady", "Available");
        assert_eq!(rsp.conditions.len(), 2);
        assert_eq!(rsp.conditions[0].target, Target::CompositeAndClaim);
        assert_eq!(rsp.conditions[0].message.as_deref(), Some("boom"));
        assert_eq!(rsp.conditions[1].status, Status::True);
        assert_eq!(rsp.conditions[1].target, Target::Composite);
    }

    #[test]
    fn fatal_renders_source_chain() {
        let mut rsp = RunFunctionResponse::default();
        let err = Outer(std::io::Error::new(std::io::ErrorKind::Other, "inner"));
        rsp.fatal(&err);
        assert!(rsp.is_fatal());
        assert_eq!(rsp.results[0].message, "outer: inner");
    }

    #[test]
    fn ttl_uses_protocol_duration_strings() {
        let meta = ResponseMeta { tag: String::new(), ttl: Duration::from_secs(60) };
        let v = serde_json::to_value(&meta).unwrap();
        assert_eq!(v["ttl"], "60s");
        let back: ResponseMeta = serde_json::from_value(serde_json::json!({ "ttl": "1.5s" })).unwrap();
        assert_eq!(back.ttl, Duration::from_millis(1500));
        assert!(serde_json::from_value::<ResponseMeta>(serde_json::json!({ "ttl": "soon" })).is_err());
    }

    #[test]
    fn ttl_out_of_range_is_error() {
        assert!(serde_json::from_value::<ResponseMeta>(serde_json::json!({ "ttl": "1e300s" })).is_err());
        assert!(serde_json::from_value::<ResponseMeta>(serde_json::json!({ "ttl": "-5s" })).is_err());
    }

    #[test]
    fn warning_and_normal_results_are_not_fatal() {
        let mut rsp = RunFunctionResponse::default();
        rsp.warning("gateway not configured");
        rsp.normal("composed 1 resource");
        assert!(!rsp.is_fatal());
        assert_eq!(rsp.results.len(), 2);
        assert_eq!(rsp.results[0].severity, Severity::Warning);
        assert_eq!(rsp.results[0].message, "gateway not configured");
        assert_eq!(rsp.results[1].severity, Severity::Normal);
        assert_eq!(rsp.results[1].target, Some(Target::Composite));
    }
}
