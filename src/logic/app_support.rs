use serde::Serialize;

use crate::logic::availability::AvailabilityResolver;
use crate::logic::errors::GraphError;
use crate::model::{AppVersion, Deprecatable, EndpointRecord, VersionId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppVersionState {
    pub version_id: VersionId,
    pub supported: bool,
    pub deprecated: bool,
    pub required_endpoints: usize,
    pub available_endpoints: usize,
}

/// An app release is supported while it requires nothing, or while at least
/// one endpoint it requires is still available.
pub fn app_version_state(
    availability: &mut AvailabilityResolver<'_>,
    app: &AppVersion,
    required: &[EndpointRecord],
) -> Result<AppVersionState, GraphError> {
    let mut available_endpoints = 0;
    for endpoint in required {
        if availability.endpoint_available(endpoint)? {
            available_endpoints += 1;
        }
    }
    let supported = required.is_empty() || available_endpoints > 0;
    Ok(AppVersionState {
        version_id: app.version_id,
        supported,
        deprecated: app.is_expired(availability.now()) || !supported,
        required_endpoints: required.len(),
        available_endpoints,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{VersionGraph, WebVersion};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn graph() -> VersionGraph {
        VersionGraph::from_versions([
            WebVersion::new(1, "1.0.0", "Old").deprecated_since(now() - Duration::days(1)),
            WebVersion::new(2, "2.0.0", "New"),
        ])
    }

    #[test]
    fn no_requirements_means_supported() {
        let graph = graph();
        let mut availability = AvailabilityResolver::new(&graph, now());
        let app = AppVersion::new(1, "1.0.0", "App");
        let state = app_version_state(&mut availability, &app, &[]).unwrap();
        assert!(state.supported);
        assert!(!state.deprecated);
    }

    #[test]
    fn unsupported_when_every_required_endpoint_is_gone() {
        let graph = graph();
        let mut availability = AvailabilityResolver::new(&graph, now());
        let app = AppVersion::new(1, "1.0.0", "App");
        let required = vec![EndpointRecord::new("old-a", 1, true), EndpointRecord::new("old-b", 1, true)];
        let state = app_version_state(&mut availability, &app, &required).unwrap();
        assert!(!state.supported);
        assert!(state.deprecated);
        assert_eq!(state.available_endpoints, 0);
    }

    #[test]
    fn one_live_endpoint_keeps_app_supported() {
        let graph = graph();
        let mut availability = AvailabilityResolver::new(&graph, now());
        let app = AppVersion::new(1, "1.0.0", "App");
        let required = vec![EndpointRecord::new("old", 1, true), EndpointRecord::new("new", 2, true)];
        let state = app_version_state(&mut availability, &app, &required).unwrap();
        assert!(state.supported);
        assert!(!state.deprecated);
        assert_eq!(state.available_endpoints, 1);
    }

    #[test]
    fn own_deprecation_date_wins() {
        let graph = graph();
        let mut availability = AvailabilityResolver::new(&graph, now());
        let mut app = AppVersion::new(1, "1.0.0", "App");
        app.deprecated_at = Some(now() - Duration::hours(1));
        let state = app_version_state(&mut availability, &app, &[]).unwrap();
        assert!(state.supported);
        assert!(state.deprecated);
    }
}
