use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::logic::errors::{GraphCycleError, GraphError};
use crate::model::{Deprecatable, EndpointRecord, VersionGraph, VersionId, WebVersion};

/// Derived lifecycle flags of one version at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionState {
    pub version_id: VersionId,
    pub available: bool,
    pub coming_soon: bool,
    pub deprecated: bool,
    /// Deprecation date passed, before the coming-soon override.
    pub expired: bool,
    /// A deprecation date is set at all.
    pub flagged: bool,
}

/// Evaluates `coming_soon`, `is_deprecated` and `available` over one graph snapshot.
///
/// Results are memoized per version for the lifetime of the resolver only; a
/// new decision must build a new resolver from a fresh snapshot. A version
/// reached again while its own evaluation is still running is a cycle and
/// fails with [`GraphCycleError`] instead of recursing forever.
pub struct AvailabilityResolver<'g> {
    graph: &'g VersionGraph,
    now: DateTime<Utc>,
    coming_soon_memo: HashMap<VersionId, bool>,
    available_memo: HashMap<VersionId, bool>,
    coming_soon_path: Vec<VersionId>,
    available_path: Vec<VersionId>,
}

impl<'g> AvailabilityResolver<'g> {
    pub fn new(graph: &'g VersionGraph, now: DateTime<Utc>) -> Self {
        Self {
            graph,
            now,
            coming_soon_memo: HashMap::new(),
            available_memo: HashMap::new(),
            coming_soon_path: Vec::new(),
            available_path: Vec::new(),
        }
    }

    pub fn graph(&self) -> &'g VersionGraph {
        self.graph
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn node(&self, id: VersionId) -> Result<&'g WebVersion, GraphError> {
        let graph: &'g VersionGraph = self.graph;
        graph.get(id).ok_or(GraphError::UnknownVersion(id))
    }

    pub fn is_expired(&self, id: VersionId) -> Result<bool, GraphError> {
        Ok(self.node(id)?.is_expired(self.now))
    }

    /// A previous version is still coming soon, or an incompatible one has not expired yet.
    pub fn coming_soon(&mut self, id: VersionId) -> Result<bool, GraphError> {
        if let Some(cached) = self.coming_soon_memo.get(&id) {
            return Ok(*cached);
        }
        if self.coming_soon_path.contains(&id) {
            return Err(GraphCycleError::versions(&self.coming_soon_path, id).into());
        }
        let node = self.node(id)?;

        self.coming_soon_path.push(id);
        let result = self.evaluate_coming_soon(node);
        self.coming_soon_path.pop();

        let coming_soon = result?;
        self.coming_soon_memo.insert(id, coming_soon);
        Ok(coming_soon)
    }

    fn evaluate_coming_soon(&mut self, node: &'g WebVersion) -> Result<bool, GraphError> {
        for previous in &node.previous_versions {
            if self.coming_soon(*previous)? {
                return Ok(true);
            }
        }
        for incompatible in &node.incompatible_previous_versions {
            if !self.is_expired(*incompatible)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Expired, unless the version fell back to coming soon.
    pub fn is_deprecated(&mut self, id: VersionId) -> Result<bool, GraphError> {
        Ok(self.is_expired(id)? && !self.coming_soon(id)?)
    }

    /// Neither deprecated nor coming soon, and every incompatible predecessor
    /// is flagged deprecated, unavailable and not coming soon.
    pub fn available(&mut self, id: VersionId) -> Result<bool, GraphError> {
        if let Some(cached) = self.available_memo.get(&id) {
            return Ok(*cached);
        }
        if self.available_path.contains(&id) {
            return Err(GraphCycleError::versions(&self.available_path, id).into());
        }
        let node = self.node(id)?;

        self.available_path.push(id);
        let result = self.evaluate_available(node);
        self.available_path.pop();

        let available = result?;
        self.available_memo.insert(id, available);
        Ok(available)
    }

    fn evaluate_available(&mut self, node: &'g WebVersion) -> Result<bool, GraphError> {
        let id = node.version_id;
        if self.is_deprecated(id)? || self.coming_soon(id)? {
            return Ok(false);
        }
        for incompatible in &node.incompatible_previous_versions {
            let previous = self.node(*incompatible)?;
            let retired = previous.is_flagged_deprecated()
                && !self.available(*incompatible)?
                && !self.coming_soon(*incompatible)?;
            if !retired {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn state(&mut self, id: VersionId) -> Result<VersionState, GraphError> {
        let node = self.node(id)?;
        Ok(VersionState {
            version_id: id,
            available: self.available(id)?,
            coming_soon: self.coming_soon(id)?,
            deprecated: self.is_deprecated(id)?,
            expired: node.is_expired(self.now),
            flagged: node.is_flagged_deprecated(),
        })
    }

    // Endpoint rules: the record's own deprecation date plus its bound version.

    pub fn endpoint_coming_soon(&mut self, record: &EndpointRecord) -> Result<bool, GraphError> {
        match record.web_version {
            Some(version) => self.coming_soon(version),
            None => Ok(false),
        }
    }

    pub fn endpoint_deprecated(&mut self, record: &EndpointRecord) -> Result<bool, GraphError> {
        if record.is_expired(self.now) {
            return Ok(true);
        }
        match record.web_version {
            Some(version) => self.is_deprecated(version),
            None => Ok(false),
        }
    }

    /// Pending records are never available.
    pub fn endpoint_available(&mut self, record: &EndpointRecord) -> Result<bool, GraphError> {
        let Some(version) = record.web_version else {
            return Ok(false);
        };
        Ok(!record.is_expired(self.now) && self.available(version)? && !self.coming_soon(version)?)
    }
}
