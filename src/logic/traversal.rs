use std::collections::HashSet;

use crate::logic::errors::{GraphCycleError, GraphError};
use crate::model::{VersionGraph, VersionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Predecessors,
    Successors,
}

/// Every version reachable backwards through `previous_versions`, depth first.
pub fn all_predecessors(graph: &VersionGraph, id: VersionId) -> Result<Vec<VersionId>, GraphError> {
    walk(graph, id, Direction::Predecessors)
}

/// Every version that (transitively) lists `id` as a previous version.
pub fn all_successors(graph: &VersionGraph, id: VersionId) -> Result<Vec<VersionId>, GraphError> {
    walk(graph, id, Direction::Successors)
}

fn walk(graph: &VersionGraph, start: VersionId, direction: Direction) -> Result<Vec<VersionId>, GraphError> {
    if !graph.contains(start) {
        return Err(GraphError::UnknownVersion(start));
    }
    let mut found = Vec::new();
    let mut seen = HashSet::new();
    let mut path = vec![start];
    seen.insert(start);
    visit(graph, start, direction, &mut path, &mut seen, &mut found)?;
    Ok(found)
}

fn visit(
    graph: &VersionGraph,
    id: VersionId,
    direction: Direction,
    path: &mut Vec<VersionId>,
    seen: &mut HashSet<VersionId>,
    found: &mut Vec<VersionId>,
) -> Result<(), GraphCycleError> {
    let neighbours: Vec<VersionId> = match direction {
        Direction::Predecessors => graph.previous_versions(id).collect(),
        Direction::Successors => graph.next_versions(id).collect(),
    };
    for next in neighbours {
        if path.contains(&next) {
            return Err(GraphCycleError::versions(path, next));
        }
        // Finished branches cannot lead back onto the current path.
        if !seen.insert(next) || !graph.contains(next) {
            continue;
        }
        found.push(next);
        path.push(next);
        visit(graph, next, direction, path, seen, found)?;
        path.pop();
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Open,
    Done,
}

/// First cycle over either edge type, if the graph has one.
pub fn find_cycle(graph: &VersionGraph) -> Option<GraphCycleError> {
    let mut marks = std::collections::HashMap::new();
    for start in graph.ids() {
        let mut path = Vec::new();
        if let Err(cycle) = find_cycle_from(graph, start, &mut marks, &mut path) {
            return Some(cycle);
        }
    }
    None
}

fn find_cycle_from(
    graph: &VersionGraph,
    id: VersionId,
    marks: &mut std::collections::HashMap<VersionId, Mark>,
    path: &mut Vec<VersionId>,
) -> Result<(), GraphCycleError> {
    match marks.get(&id) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Open) => return Err(GraphCycleError::versions(path, id)),
        None => {}
    }
    let Some(node) = graph.get(id) else {
        return Ok(());
    };
    marks.insert(id, Mark::Open);
    path.push(id);
    for next in node.all_edges() {
        find_cycle_from(graph, next, marks, path)?;
    }
    path.pop();
    marks.insert(id, Mark::Done);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WebVersion;

    fn diamond() -> VersionGraph {
        //   1
        //  / \
        // 2   3
        //  \ /
        //   4
        VersionGraph::from_versions([
            WebVersion::new(1, "1.0.0", "One"),
            WebVersion::new(2, "1.1.0", "Left").with_previous([1]),
            WebVersion::new(3, "1.2.0", "Right").with_previous([1]),
            WebVersion::new(4, "2.0.0", "Join").with_previous([2, 3]),
        ])
    }

    #[test]
    fn predecessors_are_deduplicated() {
        let graph = diamond();
        assert_eq!(all_predecessors(&graph, 4).unwrap(), vec![2, 1, 3]);
        assert!(all_predecessors(&graph, 1).unwrap().is_empty());
    }

    #[test]
    fn successors_follow_reverse_edges() {
        let graph = diamond();
        assert_eq!(all_successors(&graph, 1).unwrap(), vec![2, 4, 3]);
        assert!(all_successors(&graph, 4).unwrap().is_empty());
    }

    #[test]
    fn traversal_fails_on_cycle() {
        let graph = VersionGraph::from_versions([
            WebVersion::new(1, "1.0.0", "One").with_previous([3]),
            WebVersion::new(2, "2.0.0", "Two").with_previous([1]),
            WebVersion::new(3, "3.0.0", "Three").with_previous([2]),
        ]);
        let err = all_predecessors(&graph, 1).unwrap_err();
        assert!(matches!(err, GraphError::Cycle(_)));
        assert!(matches!(all_successors(&graph, 2), Err(GraphError::Cycle(_))));
    }

    #[test]
    fn unknown_start_is_an_error() {
        assert_eq!(all_predecessors(&diamond(), 9), Err(GraphError::UnknownVersion(9)));
    }

    #[test]
    fn find_cycle_covers_incompatible_edges() {
        assert!(find_cycle(&diamond()).is_none());

        let graph = VersionGraph::from_versions([
            WebVersion::new(1, "1.0.0", "One").with_incompatible([2]),
            WebVersion::new(2, "2.0.0", "Two").with_previous([1]),
        ]);
        let cycle = find_cycle(&graph).unwrap();
        assert_eq!(cycle.path, vec!["1", "2", "1"]);

        let self_loop = VersionGraph::from_versions([WebVersion::new(1, "1.0.0", "One").with_incompatible([1])]);
        assert!(find_cycle(&self_loop).is_some());
    }
}
