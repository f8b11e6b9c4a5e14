use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::availability::AvailabilityResolver;
use crate::logic::errors::{GraphCycleError, GraphError};
use crate::logic::url::join_path;
use crate::model::{EndpointCatalog, EndpointRecord, VersionGraph, ViewCode};

/// What should happen to a request for one registered view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "url", rename_all = "snake_case")]
pub enum Outcome {
    /// No record exists for the requested code.
    NotRegistered,
    Available,
    TooEarly,
    /// The nearest live successor and the URL to send the caller to.
    GoneWithTarget(String),
    GoneNoTarget,
}

/// Walks `new_compatible_view` chains and resolves view URLs over one snapshot.
pub struct RedirectResolver<'a> {
    catalog: &'a EndpointCatalog,
    availability: AvailabilityResolver<'a>,
}

impl<'a> RedirectResolver<'a> {
    pub fn new(graph: &'a VersionGraph, catalog: &'a EndpointCatalog, now: DateTime<Utc>) -> Self {
        Self {
            catalog,
            availability: AvailabilityResolver::new(graph, now),
        }
    }

    pub fn availability(&mut self) -> &mut AvailabilityResolver<'a> {
        &mut self.availability
    }

    /// Every successor of `record`, nearest first. A dangling link ends the chain.
    pub fn updates(&self, record: &EndpointRecord) -> Result<Vec<&'a EndpointRecord>, GraphCycleError> {
        let mut path: Vec<ViewCode> = vec![record.view_code_name.clone()];
        let mut chain = Vec::new();
        let mut current = record;
        while let Some(code) = current.new_compatible_view.as_deref() {
            if path.iter().any(|seen| seen == code) {
                return Err(GraphCycleError::endpoints(&path, code));
            }
            let Some(successor) = self.catalog.successor(current) else {
                break;
            };
            path.push(successor.view_code_name.clone());
            chain.push(successor);
            current = successor;
        }
        Ok(chain)
    }

    pub fn last_update(&self, record: &EndpointRecord) -> Result<Option<&'a EndpointRecord>, GraphCycleError> {
        Ok(self.updates(record)?.last().copied())
    }

    /// Successors while each hop's version is available; stops at the first one that is not.
    pub fn available_updates(&mut self, record: &EndpointRecord) -> Result<Vec<&'a EndpointRecord>, GraphError> {
        let mut chain = Vec::new();
        for successor in self.updates(record)? {
            let Some(version) = successor.web_version else {
                break;
            };
            if !self.availability.available(version)? {
                break;
            }
            chain.push(successor);
        }
        Ok(chain)
    }

    /// Last record of the first run of available records along the chain.
    ///
    /// Starts at `record` when it is available itself, otherwise at its first
    /// available successor, then walks forward while the next hop is available.
    pub fn last_available_update(&mut self, record: &'a EndpointRecord) -> Result<Option<&'a EndpointRecord>, GraphError> {
        let chain = std::iter::once(record).chain(self.updates(record)?);
        let mut last = None;
        for hop in chain {
            let available = self.availability.endpoint_available(hop)?;
            match (available, last) {
                (true, _) => last = Some(hop),
                (false, Some(_)) => break,
                (false, None) => {}
            }
        }
        Ok(last)
    }

    /// Absolute URL if stored, otherwise the version prefix joined with the relative path.
    pub fn url(&self, record: &EndpointRecord) -> Option<String> {
        if let Some(absolute) = &record.absolute_view_url {
            return Some(absolute.clone());
        }
        let path = record.view_url.as_deref()?;
        let version = self.availability.graph().get(record.web_version?)?;
        let prefix = version.complete_prefix(record.is_api)?;
        Some(join_path(&prefix, path))
    }

    pub fn resolve(&mut self, record: &EndpointRecord) -> Result<Outcome, GraphError> {
        if self.availability.endpoint_available(record)? {
            return Ok(Outcome::Available);
        }
        if self.availability.endpoint_coming_soon(record)? && !self.availability.endpoint_deprecated(record)? {
            return Ok(Outcome::TooEarly);
        }
        for successor in self.updates(record)? {
            if !self.availability.endpoint_available(successor)? {
                continue;
            }
            if let Some(url) = self.url(successor) {
                return Ok(Outcome::GoneWithTarget(url));
            }
        }
        Ok(Outcome::GoneNoTarget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::errors::GraphKind;
    use crate::model::WebVersion;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn graph() -> VersionGraph {
        let past = now() - Duration::days(3);
        VersionGraph::from_versions([
            WebVersion::new(1, "1.0.0", "One").deprecated_since(past).with_api_prefix("/api"),
            WebVersion::new(2, "2.0.0", "Two").deprecated_since(past).with_api_prefix("/api"),
            WebVersion::new(3, "3.0.0", "Three").with_api_prefix("/api"),
            WebVersion::new(4, "3.1.0", "Three One").with_api_prefix("/api"),
        ])
    }

    fn chain_catalog() -> EndpointCatalog {
        EndpointCatalog::from_records([
            EndpointRecord::new("a", 1, true).with_view_url("/users").superseded_by("b"),
            EndpointRecord::new("b", 2, true).with_view_url("/users").superseded_by("c"),
            EndpointRecord::new("c", 3, true).with_view_url("/users"),
        ])
    }

    #[test]
    fn updates_follow_the_chain_in_order() {
        let graph = graph();
        let catalog = chain_catalog();
        let resolver = RedirectResolver::new(&graph, &catalog, now());
        let a = catalog.get("a").unwrap();
        let codes: Vec<_> = resolver.updates(a).unwrap().iter().map(|r| r.view_code_name.as_str()).collect();
        assert_eq!(codes, vec!["b", "c"]);
        assert_eq!(resolver.last_update(a).unwrap().unwrap().view_code_name, "c");
        assert!(resolver.last_update(catalog.get("c").unwrap()).unwrap().is_none());
    }

    #[test]
    fn last_available_update_skips_to_live_tail() {
        let graph = graph();
        let catalog = chain_catalog();
        let mut resolver = RedirectResolver::new(&graph, &catalog, now());
        let a = catalog.get("a").unwrap();
        assert_eq!(resolver.last_available_update(a).unwrap().unwrap().view_code_name, "c");
    }

    #[test]
    fn last_available_update_stops_before_unavailable_hop() {
        let graph = graph();
        let catalog = EndpointCatalog::from_records([
            EndpointRecord::new("x", 3, false).superseded_by("y"),
            EndpointRecord::new("y", 4, false).superseded_by("z"),
            EndpointRecord::new("z", 1, false),
        ]);
        let mut resolver = RedirectResolver::new(&graph, &catalog, now());
        let x = catalog.get("x").unwrap();
        assert_eq!(resolver.last_available_update(x).unwrap().unwrap().view_code_name, "y");
        let z = catalog.get("z").unwrap();
        assert!(resolver.last_available_update(z).unwrap().is_none());
    }

    #[test]
    fn available_updates_stop_at_first_unavailable_version() {
        let graph = graph();
        let catalog = EndpointCatalog::from_records([
            EndpointRecord::new("start", 1, false).superseded_by("live"),
            EndpointRecord::new("live", 3, false).superseded_by("dead"),
            EndpointRecord::new("dead", 2, false).superseded_by("later"),
            EndpointRecord::new("later", 4, false),
        ]);
        let mut resolver = RedirectResolver::new(&graph, &catalog, now());
        let start = catalog.get("start").unwrap();
        let codes: Vec<_> = resolver
            .available_updates(start)
            .unwrap()
            .iter()
            .map(|r| r.view_code_name.clone())
            .collect();
        assert_eq!(codes, vec!["live".to_string()]);
    }

    #[test]
    fn cyclic_chain_is_an_error() {
        let graph = graph();
        let catalog = EndpointCatalog::from_records([
            EndpointRecord::new("a", 1, false).superseded_by("b"),
            EndpointRecord::new("b", 2, false).superseded_by("a"),
        ]);
        let mut resolver = RedirectResolver::new(&graph, &catalog, now());
        let a = catalog.get("a").unwrap();
        let err = resolver.updates(a).unwrap_err();
        assert_eq!(err.kind, GraphKind::Endpoint);
        assert_eq!(err.path, vec!["a", "b", "a"]);
        assert!(matches!(resolver.resolve(a), Err(GraphError::Cycle(_))));
        assert!(matches!(resolver.last_available_update(a), Err(GraphError::Cycle(_))));
    }

    #[test]
    fn url_prefers_absolute_then_composes() {
        let graph = graph();
        let catalog = EndpointCatalog::from_records([
            EndpointRecord::new("abs", 3, true)
                .with_view_url("/ignored")
                .with_absolute_url("https://x/y"),
            EndpointRecord::new("api", 4, true).with_view_url("/users"),
            EndpointRecord::new("page", 4, false).with_view_url("/home"),
            EndpointRecord::new("bare", 4, false),
        ]);
        let resolver = RedirectResolver::new(&graph, &catalog, now());
        assert_eq!(resolver.url(catalog.get("abs").unwrap()).as_deref(), Some("https://x/y"));
        assert_eq!(resolver.url(catalog.get("api").unwrap()).as_deref(), Some("/api/v1/users"));
        assert_eq!(resolver.url(catalog.get("page").unwrap()).as_deref(), Some("v1/home"));
        assert_eq!(resolver.url(catalog.get("bare").unwrap()), None);
    }

    #[test]
    fn api_view_without_prefix_has_no_url() {
        let graph = VersionGraph::from_versions([WebVersion::new(1, "1.0.0", "One")]);
        let catalog = EndpointCatalog::from_records([EndpointRecord::new("api", 1, true).with_view_url("/users")]);
        let resolver = RedirectResolver::new(&graph, &catalog, now());
        assert_eq!(resolver.url(catalog.get("api").unwrap()), None);
    }

    #[test]
    fn resolve_outcomes() {
        let graph = graph();
        let catalog = chain_catalog();
        let mut resolver = RedirectResolver::new(&graph, &catalog, now());
        assert_eq!(resolver.resolve(catalog.get("c").unwrap()).unwrap(), Outcome::Available);
        assert_eq!(
            resolver.resolve(catalog.get("a").unwrap()).unwrap(),
            Outcome::GoneWithTarget("/api/v3/users".to_string())
        );

        let lonely = EndpointRecord::new("lonely", 2, true);
        assert_eq!(resolver.resolve(&lonely).unwrap(), Outcome::GoneNoTarget);
    }

    #[test]
    fn resolve_too_early_when_version_is_coming_soon() {
        let graph = VersionGraph::from_versions([
            WebVersion::new(1, "1.0.0", "One"),
            WebVersion::new(2, "2.0.0", "Two").with_incompatible([1]),
        ]);
        let catalog = EndpointCatalog::from_records([EndpointRecord::new("next", 2, false)]);
        let mut resolver = RedirectResolver::new(&graph, &catalog, now());
        assert_eq!(resolver.resolve(catalog.get("next").unwrap()).unwrap(), Outcome::TooEarly);

        let retired = EndpointRecord::new("retired", 2, false).deprecated_since(now() - Duration::days(1));
        assert_eq!(resolver.resolve(&retired).unwrap(), Outcome::GoneNoTarget);
    }
}
