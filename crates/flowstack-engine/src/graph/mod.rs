//! Execution graph: forward adjacency derived from a workflow's connections.

use std::collections::HashMap;

use flowstack_core::{ComponentId, Workflow};

/// Successor lists keyed by component id.
///
/// Every component gets an entry, even with no outgoing connections.
/// Successor order follows connection declaration order.
#[derive(Debug, Clone, Default)]
pub struct ExecutionGraph {
    order: Vec<ComponentId>,
    successors: HashMap<ComponentId, Vec<ComponentId>>,
    in_degree: HashMap<ComponentId, usize>,
}

impl ExecutionGraph {
    /// Build the graph from a workflow.
    ///
    /// Connections whose source is not a component of the workflow are
    /// ignored; the validator reports them before execution.
    pub fn build(workflow: &Workflow) -> Self {
        let mut order = Vec::with_capacity(workflow.components().len());
        let mut successors: HashMap<ComponentId, Vec<ComponentId>> = HashMap::new();
        let mut in_degree: HashMap<ComponentId, usize> = HashMap::new();

        for component in workflow.components() {
            order.push(component.id);
            successors.entry(component.id).or_default();
            in_degree.entry(component.id).or_default();
        }

        for conn in workflow.connections() {
            if let Some(list) = successors.get_mut(&conn.source) {
                list.push(conn.target);
                *in_degree.entry(conn.target).or_default() += 1;
            }
        }

        Self {
            order,
            successors,
            in_degree,
        }
    }

    /// Downstream components of `id`, in connection order.
    pub fn successors(&self, id: ComponentId) -> &[ComponentId] {
        self.successors
            .get(&id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Number of incoming connections to `id`.
    pub fn in_degree(&self, id: ComponentId) -> usize {
        self.in_degree.get(&id).copied().unwrap_or(0)
    }

    /// Whether `id` is fed by more than one connection.
    pub fn is_join_point(&self, id: ComponentId) -> bool {
        self.in_degree(id) > 1
    }

    /// The component ids in declaration order.
    pub fn nodes(&self) -> &[ComponentId] {
        &self.order
    }

    /// Find a component lying on a directed cycle, if any.
    ///
    /// Depth-first search from each component in declaration order; the first
    /// back edge found names the component it points to.
    pub fn find_cycle(&self) -> Option<ComponentId> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Open,
            Done,
        }

        let mut marks: HashMap<ComponentId, Mark> = HashMap::new();

        for &root in &self.order {
            if marks.contains_key(&root) {
                continue;
            }
            // Stack of (node, index of next successor to inspect).
            let mut stack: Vec<(ComponentId, usize)> = vec![(root, 0)];
            marks.insert(root, Mark::Open);

            while let Some((node, next)) = stack.last().copied() {
                let succ = self.successors(node);
                if next >= succ.len() {
                    marks.insert(node, Mark::Done);
                    stack.pop();
                    continue;
                }
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                let target = succ[next];
                match marks.get(&target) {
                    Some(Mark::Open) => return Some(target),
                    Some(Mark::Done) => {}
                    None => {
                        // Targets outside the component set have no successors.
                        if self.successors.contains_key(&target) {
                            marks.insert(target, Mark::Open);
                            stack.push((target, 0));
                        }
                    }
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowstack_core::{Component, ComponentSpec, Connection};

    fn wf(n: u64, edges: &[(u64, u64)]) -> Workflow {
        let components = (0..n)
            .map(|i| Component::new(ComponentId(i), format!("n{}", i), ComponentSpec::Output))
            .collect();
        let connections = edges
            .iter()
            .map(|&(s, t)| Connection::new(ComponentId(s), ComponentId(t)))
            .collect();
        Workflow::new("wf", "test", components, connections)
    }

    #[test]
    fn test_successors_follow_declaration_order() {
        let graph = ExecutionGraph::build(&wf(4, &[(0, 2), (0, 1), (1, 3), (2, 3)]));
        assert_eq!(graph.successors(ComponentId(0)), &[ComponentId(2), ComponentId(1)]);
        assert!(graph.successors(ComponentId(3)).is_empty());
        assert_eq!(graph.in_degree(ComponentId(3)), 2);
        assert!(graph.is_join_point(ComponentId(3)));
        assert!(!graph.is_join_point(ComponentId(1)));
    }

    #[test]
    fn test_every_component_has_an_entry() {
        let graph = ExecutionGraph::build(&wf(3, &[]));
        assert_eq!(graph.nodes().len(), 3);
        for id in graph.nodes() {
            assert!(graph.successors(*id).is_empty());
        }
        assert!(graph.successors(ComponentId(99)).is_empty());
    }

    #[test]
    fn test_unknown_source_ignored() {
        let graph = ExecutionGraph::build(&wf(2, &[(7, 1), (0, 1)]));
        assert_eq!(graph.successors(ComponentId(0)), &[ComponentId(1)]);
        assert_eq!(graph.in_degree(ComponentId(1)), 1);
    }

    #[test]
    fn test_find_cycle() {
        assert_eq!(ExecutionGraph::build(&wf(3, &[(0, 1), (1, 2)])).find_cycle(), None);
        assert_eq!(
            ExecutionGraph::build(&wf(3, &[(0, 1), (1, 2), (2, 1)])).find_cycle(),
            Some(ComponentId(1))
        );
        assert_eq!(
            ExecutionGraph::build(&wf(2, &[(1, 1)])).find_cycle(),
            Some(ComponentId(1))
        );
        // Diamond is not a cycle.
        assert_eq!(
            ExecutionGraph::build(&wf(4, &[(0, 1), (0, 2), (1, 3), (2, 3)])).find_cycle(),
            None
        );
    }
}
