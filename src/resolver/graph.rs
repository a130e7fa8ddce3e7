use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::BTreeSet;

/// Directed graph over module positions; an edge `a → b` means `a` runs first.
///
/// Node `i` is the module registered at position `i`.
pub(super) struct Graph {
    inner: DiGraph<usize, ()>,
}

impl Graph {
    pub(super) fn new(nodes: usize) -> Self {
        let mut inner = DiGraph::with_capacity(nodes, 0);
        for position in 0..nodes {
            inner.add_node(position);
        }
        Self { inner }
    }

    /// Add `from → to`; repeated edges are kept once.
    pub(super) fn edge(&mut self, from: usize, to: usize) {
        self.inner
            .update_edge(NodeIndex::new(from), NodeIndex::new(to), ());
    }

    fn neighbors(&self, node: usize, direction: Direction) -> impl Iterator<Item = usize> + '_ {
        self.inner
            .neighbors_directed(NodeIndex::new(node), direction)
            .map(NodeIndex::index)
    }

    /// Kahn's algorithm, always emitting the lowest ready position first.
    ///
    /// On failure returns one cycle as a closed path (first node repeated last).
    pub(super) fn toposort(&self) -> Result<Vec<usize>, Vec<usize>> {
        let count = self.inner.node_count();
        let mut in_degree: Vec<usize> = (0..count)
            .map(|node| self.neighbors(node, Direction::Incoming).count())
            .collect();
        let mut ready: BTreeSet<usize> = (0..count).filter(|&node| in_degree[node] == 0).collect();
        let mut order = Vec::with_capacity(count);

        while let Some(node) = ready.pop_first() {
            order.push(node);
            for succ in self.neighbors(node, Direction::Outgoing) {
                in_degree[succ] -= 1;
                if in_degree[succ] == 0 {
                    ready.insert(succ);
                }
            }
        }

        if order.len() == count {
            Ok(order)
        } else {
            Err(self.find_cycle(&in_degree))
        }
    }

    /// Every node left with a positive in-degree has a predecessor that is also
    /// left, so walking predecessors from any of them must revisit a node.
    fn find_cycle(&self, in_degree: &[usize]) -> Vec<usize> {
        let stuck = |node: usize| in_degree[node] > 0;
        let Some(start) = (0..in_degree.len()).find(|&node| stuck(node)) else {
            return Vec::new();
        };

        let mut path = vec![start];
        let mut current = start;
        loop {
            let Some(pred) = self
                .neighbors(current, Direction::Incoming)
                .filter(|&p| stuck(p))
                .min()
            else {
                return path;
            };
            if let Some(pos) = path.iter().position(|&n| n == pred) {
                let mut cycle: Vec<usize> = path[pos..].to_vec();
                cycle.reverse();
                let first = cycle[0];
                cycle.push(first);
                return cycle;
            }
            path.push(pred);
            current = pred;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toposort_prefers_lowest_ready_node() {
        let mut graph = Graph::new(4);
        graph.edge(3, 0);
        assert_eq!(graph.toposort().unwrap(), vec![1, 2, 3, 0]);
    }

    #[test]
    fn test_duplicate_edges_are_merged() {
        let mut graph = Graph::new(2);
        graph.edge(1, 0);
        graph.edge(1, 0);
        assert_eq!(graph.inner.edge_count(), 1);
        assert_eq!(graph.toposort().unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_empty_graph() {
        assert!(Graph::new(0).toposort().unwrap().is_empty());
    }

    #[test]
    fn test_cycle_path_excludes_downstream_nodes() {
        // 0 → 1 → 2 → 0, and 2 → 3 hangs off the cycle
        let mut graph = Graph::new(4);
        graph.edge(0, 1);
        graph.edge(1, 2);
        graph.edge(2, 0);
        graph.edge(2, 3);
        let cycle = graph.toposort().unwrap_err();
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 4);
        assert!(!cycle.contains(&3));
        for pair in cycle.windows(2) {
            assert!(
                graph
                    .inner
                    .contains_edge(NodeIndex::new(pair[0]), NodeIndex::new(pair[1]))
            );
        }
    }
}
