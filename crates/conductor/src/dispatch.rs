//! The dispatch engine
//!
//! Every scheduling pass scans the `pending` tasks in document order and
//! enqueues those whose dependencies have all completed. The `pending` guard
//! is the only dispatch gate and the move to `dispatched` happens in the same
//! step as the enqueue, so no task is ever sent twice.

use crate::queue::WorkQueue;
use crate::state::TaskStates;
use syncphony_core::{TaskId, TaskState};
use syncphony_plan::{TaskGraph, TaskSpec};
use tracing::{debug, error, info, warn};

/// A task is ready when every dependency is a known task in `completed`.
///
/// A dependency on an id outside the plan is never satisfied, so such a task
/// stays `pending` for the whole run.
pub fn is_ready(spec: &TaskSpec, graph: &TaskGraph, states: &TaskStates) -> bool {
    spec.dependencies
        .iter()
        .all(|dep| graph.contains(dep) && states.state(dep) == Some(TaskState::Completed))
}

/// Enqueue every ready `pending` task and return the ids sent, in order.
///
/// Nothing is dispatched once any task has failed. A message the queue
/// refuses fails its task, which halts the run on the next check.
pub fn dispatch_ready<Q>(graph: &TaskGraph, states: &mut TaskStates, queue: &mut Q) -> Vec<TaskId>
where
    Q: WorkQueue + ?Sized,
{
    let mut dispatched = Vec::new();
    if states.any_failed() {
        return dispatched;
    }

    for spec in graph {
        if states.state(&spec.task_id) != Some(TaskState::Pending) {
            continue;
        }
        if !is_ready(spec, graph, states) {
            debug!(
                task_id = %spec.task_id,
                dependencies = spec.dependencies.len(),
                "task waiting on dependencies"
            );
            continue;
        }

        info!(
            task_id = %spec.task_id,
            role = %spec.role,
            action = %spec.action,
            "dispatching task"
        );
        let sent = queue.enqueue(spec.dispatch_message());

        if let Err(e) = states.transition(&spec.task_id, TaskState::Dispatched) {
            warn!(task_id = %spec.task_id, error = %e, "invalid state transition");
            continue;
        }
        dispatched.push(spec.task_id.clone());

        if let Err(e) = sent {
            error!(
                task_id = %spec.task_id,
                role = %spec.role,
                error = %e,
                "could not hand task to its musician"
            );
            if let Err(e) = states.fail(&spec.task_id, e.to_string()) {
                warn!(task_id = %spec.task_id, error = %e, "invalid state transition");
            }
            break;
        }
    }

    dispatched
}
