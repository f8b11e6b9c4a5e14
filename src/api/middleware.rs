use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

use crate::api::handlers::gate_error;
use crate::logic::{Gate, GateDecision, GateVerdict, ViewRegistration};
use crate::store::traits::Store;

/// State of one gated route: the gate plus how the route registers itself.
pub struct ViewGuard<S: Store> {
    gate: Gate<S>,
    registration: ViewRegistration,
}

impl<S: Store> ViewGuard<S> {
    pub fn new(gate: Gate<S>, registration: ViewRegistration) -> Self {
        Self { gate, registration }
    }
}

impl<S: Store> Clone for ViewGuard<S> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            registration: self.registration.clone(),
        }
    }
}

/// Body sent to API clients when the gate does not let a request through.
#[derive(Debug, Serialize)]
pub struct GateResponseBody {
    pub code: &'static str,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

fn too_early() -> StatusCode {
    StatusCode::from_u16(425).unwrap_or(StatusCode::BAD_REQUEST)
}

/// HTTP rendering of a verdict; `None` means the request may proceed.
pub fn gate_response(verdict: &GateVerdict) -> Option<Response> {
    let view = &verdict.view_code;
    let (status, code, detail, location) = match &verdict.decision {
        GateDecision::Allow => return None,
        GateDecision::Redirect(url) => (
            StatusCode::TEMPORARY_REDIRECT,
            "unavailable",
            format!("view '{}' is not available, use its replacement", view),
            Some(url.clone()),
        ),
        GateDecision::GoneWithTarget(url) => (
            StatusCode::MOVED_PERMANENTLY,
            "deprecated",
            format!("view '{}' is deprecated and has been replaced", view),
            Some(url.clone()),
        ),
        GateDecision::GoneNoTarget => (
            StatusCode::GONE,
            "gone",
            format!("view '{}' is no longer available", view),
            None,
        ),
        GateDecision::TooEarly => (
            too_early(),
            "too_early",
            format!("view '{}' is not published yet", view),
            None,
        ),
        GateDecision::NotFound => (
            StatusCode::NOT_FOUND,
            "not_registered",
            format!("view '{}' is not registered", view),
            None,
        ),
    };

    let mut response = if verdict.is_api {
        let body = GateResponseBody {
            code,
            detail,
            location: location.clone(),
            help: verdict.help.clone(),
        };
        (status, Json(body)).into_response()
    } else {
        (status, detail).into_response()
    };

    if let Some(url) = location {
        match HeaderValue::from_str(&url) {
            Ok(value) => {
                response.headers_mut().insert(header::LOCATION, value);
            }
            Err(_) => log::error!("redirect target '{}' for view '{}' is not a valid header", url, view),
        }
    }
    Some(response)
}

/// Request gate wrapped around a single route.
pub async fn version_control<S: Store + 'static>(
    State(guard): State<ViewGuard<S>>,
    request: Request,
    next: Next,
) -> Response {
    match guard.gate.decide(&guard.registration).await {
        Ok(verdict) => match gate_response(&verdict) {
            Some(response) => response,
            None => next.run(request).await,
        },
        Err(err) => gate_error(err).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(decision: GateDecision, is_api: bool) -> GateVerdict {
        GateVerdict {
            view_code: "orders".to_string(),
            decision,
            is_api,
            help: None,
        }
    }

    #[test]
    fn allow_passes_through() {
        assert!(gate_response(&verdict(GateDecision::Allow, true)).is_none());
    }

    #[test]
    fn statuses_follow_the_decision() {
        let cases = [
            (GateDecision::Redirect("/v2/orders".into()), 307),
            (GateDecision::GoneWithTarget("/v3/orders".into()), 301),
            (GateDecision::GoneNoTarget, 410),
            (GateDecision::TooEarly, 425),
            (GateDecision::NotFound, 404),
        ];
        for (decision, status) in cases {
            let response = gate_response(&verdict(decision, false)).unwrap();
            assert_eq!(response.status().as_u16(), status);
        }
    }

    #[test]
    fn redirects_carry_location() {
        let response = gate_response(&verdict(GateDecision::GoneWithTarget("https://x/y".into()), true)).unwrap();
        assert_eq!(response.headers()[header::LOCATION], "https://x/y");
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
    }
}
