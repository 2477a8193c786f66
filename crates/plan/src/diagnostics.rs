//! Plan diagnostics
//!
//! A symphony is never rejected for a dangling dependency or a cycle. Such
//! tasks simply never become ready and the run ends on its timeout. These
//! diagnostics let callers say so up front.

use crate::graph::TaskGraph;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::fmt;
use syncphony_core::TaskId;

/// A structural problem that will stall part of a symphony
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanDiagnostic {
    /// `task_id` depends on an id that is not in the plan
    UnknownDependency { task_id: TaskId, dependency: TaskId },
    /// The tasks depend on each other, directly or transitively
    Cycle { members: Vec<TaskId> },
}

impl fmt::Display for PlanDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanDiagnostic::UnknownDependency {
                task_id,
                dependency,
            } => write!(
                f,
                "task '{task_id}' depends on unknown task '{dependency}' and will never be ready"
            ),
            PlanDiagnostic::Cycle { members } => {
                let names: Vec<&str> = members.iter().map(TaskId::as_str).collect();
                write!(f, "dependency cycle between {}", names.join(" -> "))
            }
        }
    }
}

impl TaskGraph {
    /// Report unknown dependency ids and dependency cycles, in document order
    pub fn diagnostics(&self) -> Vec<PlanDiagnostic> {
        let mut found = Vec::new();

        let mut graph: DiGraph<&TaskId, ()> = DiGraph::new();
        let nodes: HashMap<&TaskId, NodeIndex> = self
            .ids()
            .map(|id| (id, graph.add_node(id)))
            .collect();

        for spec in self.iter() {
            for dependency in &spec.dependencies {
                match nodes.get(dependency) {
                    // Edge FROM task TO dependency
                    Some(&dep_idx) => {
                        graph.add_edge(nodes[&spec.task_id], dep_idx, ());
                    }
                    None => found.push(PlanDiagnostic::UnknownDependency {
                        task_id: spec.task_id.clone(),
                        dependency: dependency.clone(),
                    }),
                }
            }
        }

        let mut cycles: Vec<Vec<NodeIndex>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .collect();
        for scc in &mut cycles {
            scc.sort();
        }
        cycles.sort();

        found.extend(cycles.into_iter().map(|scc| PlanDiagnostic::Cycle {
            members: scc.into_iter().map(|idx| graph[idx].clone()).collect(),
        }));

        found
    }
}
