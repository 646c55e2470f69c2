//! Task graph construction and validation.
//!
//! The TaskGraph resolves predecessor ids to indices, rejects duplicate
//! ids, dangling references, invalid estimates and cycles, and computes a
//! deterministic topological order. Tasks keep their insertion order;
//! node index i is the i-th task of the input sequence, which makes the
//! tie-break rules of sink selection and critical-path reconstruction
//! reproducible.

use crate::core::task::Task;
use crate::error::{Error, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Immutable project network shared read-only by all trial executors.
pub struct TaskGraph {
    /// The underlying directed graph; edges point predecessor -> successor.
    graph: DiGraph<Task, ()>,
    /// Index mapping from task id to NodeIndex for fast lookups.
    task_index: HashMap<String, NodeIndex>,
    /// Topological order (indices into insertion order).
    topo: Vec<usize>,
    /// Predecessor indices per task, sorted ascending.
    preds: Vec<Vec<usize>>,
}

impl TaskGraph {
    /// Build and validate a graph from task records in insertion order.
    ///
    /// # Errors
    ///
    /// - `EmptyProject` when no tasks are given
    /// - `DuplicateId` when two records share an id
    /// - `InvalidEstimate` when an estimate violates `0 <= O <= M <= P`
    /// - `UnknownPredecessor` when a predecessor id does not resolve
    /// - `CyclicDependency` when the dependencies contain a cycle
    pub fn build(tasks: Vec<Task>) -> Result<Self> {
        if tasks.is_empty() {
            return Err(Error::EmptyProject);
        }

        let mut graph = DiGraph::with_capacity(tasks.len(), tasks.len());
        let mut task_index = HashMap::with_capacity(tasks.len());

        for task in tasks {
            if task_index.contains_key(&task.id) {
                return Err(Error::DuplicateId { id: task.id });
            }
            task.estimate
                .validate()
                .map_err(|reason| Error::InvalidEstimate {
                    task: task.id.clone(),
                    reason,
                })?;
            let id = task.id.clone();
            let node = graph.add_node(task);
            task_index.insert(id, node);
        }

        // Resolve predecessor ids to edges.
        for node in graph.node_indices().collect::<Vec<_>>() {
            let predecessors = graph[node].predecessors.clone();
            for pred_id in &predecessors {
                let pred = *task_index.get(pred_id).ok_or_else(|| {
                    Error::UnknownPredecessor {
                        task: graph[node].id.clone(),
                        missing: pred_id.clone(),
                    }
                })?;
                if graph.find_edge(pred, node).is_none() {
                    graph.add_edge(pred, node, ());
                }
            }
        }

        // Sorted predecessor index lists for the trial hot path.
        let preds: Vec<Vec<usize>> = graph
            .node_indices()
            .map(|node| {
                let mut p: Vec<usize> = graph
                    .neighbors_directed(node, Direction::Incoming)
                    .map(|n| n.index())
                    .collect();
                p.sort_unstable();
                p
            })
            .collect();

        let topo = kahn_order(&graph, &preds)?;

        Ok(Self {
            graph,
            task_index,
            topo,
            preds,
        })
    }

    /// Number of tasks.
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of dependency edges.
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Task at the given insertion index.
    pub fn task(&self, index: usize) -> &Task {
        &self.graph[NodeIndex::new(index)]
    }

    /// Iterate over tasks in insertion order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.graph.node_weights()
    }

    /// Insertion index for a task id, if present.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.task_index.get(id).map(|n| n.index())
    }

    /// Predecessor indices of a task, sorted ascending.
    pub fn predecessors(&self, index: usize) -> &[usize] {
        &self.preds[index]
    }

    /// The deterministic topological order.
    pub fn topo_order(&self) -> &[usize] {
        &self.topo
    }
}

impl std::fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGraph")
            .field("tasks", &self.task_count())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}

/// Kahn's algorithm with ties broken by lowest insertion index.
///
/// A min-heap over indices guarantees that whenever several tasks are
/// simultaneously ready, the earliest-inserted one is removed first, so
/// the order is a pure function of the input sequence.
fn kahn_order(graph: &DiGraph<Task, ()>, preds: &[Vec<usize>]) -> Result<Vec<usize>> {
    let n = graph.node_count();
    let mut in_degree: Vec<usize> = preds.iter().map(|p| p.len()).collect();
    let mut heap: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|&i| in_degree[i] == 0)
        .map(Reverse)
        .collect();

    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(i)) = heap.pop() {
        order.push(i);
        for succ in graph.neighbors_directed(NodeIndex::new(i), Direction::Outgoing) {
            let s = succ.index();
            in_degree[s] -= 1;
            if in_degree[s] == 0 {
                heap.push(Reverse(s));
            }
        }
    }

    if order.len() < n {
        let involved: Vec<String> = (0..n)
            .filter(|&i| in_degree[i] > 0)
            .map(|i| graph[NodeIndex::new(i)].id.clone())
            .collect();
        return Err(Error::CyclicDependency { involved });
    }
    Ok(order)
}
