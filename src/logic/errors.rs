use crate::model::{VersionId, ViewCode};

/// Which relation a cycle was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphKind {
    /// Previous / incompatible-previous edges between website versions.
    Version,
    /// `new_compatible_view` links between endpoints.
    Endpoint,
}

impl std::fmt::Display for GraphKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphKind::Version => write!(f, "version"),
            GraphKind::Endpoint => write!(f, "endpoint"),
        }
    }
}

/// A node was reached again while still on the current traversal path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cycle detected in {kind} graph: {}", .path.join(" -> "))]
pub struct GraphCycleError {
    pub kind: GraphKind,
    /// Path from the first repeated node back to itself.
    pub path: Vec<String>,
}

impl GraphCycleError {
    pub fn versions(path: &[VersionId], repeated: VersionId) -> Self {
        let start = path.iter().position(|id| *id == repeated).unwrap_or(0);
        let mut path: Vec<String> = path[start..].iter().map(|id| id.to_string()).collect();
        path.push(repeated.to_string());
        Self {
            kind: GraphKind::Version,
            path,
        }
    }

    pub fn endpoints(path: &[ViewCode], repeated: &str) -> Self {
        let start = path.iter().position(|code| code == repeated).unwrap_or(0);
        let mut path = path[start..].to_vec();
        path.push(repeated.to_string());
        Self {
            kind: GraphKind::Endpoint,
            path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error(transparent)]
    Cycle(#[from] GraphCycleError),
    #[error("version {0} is not present in the graph")]
    UnknownVersion(VersionId),
}

/// Raised when registration is required and the view has no record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("view '{code}' is not registered")]
pub struct NotRegisteredError {
    pub code: ViewCode,
}

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    NotRegistered(#[from] NotRegisteredError),
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl From<GraphCycleError> for GateError {
    fn from(err: GraphCycleError) -> Self {
        GateError::Graph(GraphError::Cycle(err))
    }
}

/// Failures of administrative graph edits.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("cannot delete {target}: still referenced by {referenced_by}")]
    Restricted { target: String, referenced_by: String },
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl From<GraphCycleError> for AdminError {
    fn from(err: GraphCycleError) -> Self {
        AdminError::Graph(GraphError::Cycle(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_lists_the_loop_only() {
        let err = GraphCycleError::versions(&[7, 1, 2, 3], 1);
        assert_eq!(err.path, vec!["1", "2", "3", "1"]);
        assert_eq!(err.to_string(), "cycle detected in version graph: 1 -> 2 -> 3 -> 1");
    }

    #[test]
    fn endpoint_cycle_message() {
        let err = GraphCycleError::endpoints(&["a".to_string(), "b".to_string()], "a");
        assert_eq!(err.to_string(), "cycle detected in endpoint graph: a -> b -> a");
    }
}
