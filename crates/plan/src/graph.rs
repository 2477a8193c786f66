//! In-memory dependency graph of a loaded symphony

use indexmap::{IndexMap, IndexSet};
use syncphony_core::{DispatchMessage, Parameters, Role, TaskId};

/// One task of a symphony. Immutable after load.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    pub task_id: TaskId,
    pub role: Role,
    pub action: String,
    pub parameters: Parameters,
    pub dependencies: IndexSet<TaskId>,
}

impl TaskSpec {
    /// Create a task with no parameters and no dependencies
    pub fn new(task_id: impl Into<TaskId>, role: Role, action: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            role,
            action: action.into(),
            parameters: Parameters::new(),
            dependencies: IndexSet::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskId>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }

    /// Build the message that hands this task to its musician
    pub fn dispatch_message(&self) -> DispatchMessage {
        DispatchMessage {
            recipient_role: self.role,
            task_id: self.task_id.clone(),
            action: self.action.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

/// All tasks of a symphony keyed by id, in document order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskGraph {
    tasks: IndexMap<TaskId, TaskSpec>,
}

impl TaskGraph {
    /// Build a graph from task specs. A later spec with a duplicate id replaces
    /// the earlier one but keeps its position.
    pub fn from_specs(specs: impl IntoIterator<Item = TaskSpec>) -> Self {
        let tasks = specs
            .into_iter()
            .map(|spec| (spec.task_id.clone(), spec))
            .collect();
        Self { tasks }
    }

    pub fn get(&self, task_id: &str) -> Option<&TaskSpec> {
        self.tasks.get(task_id)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.tasks.contains_key(task_id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Iterate over task specs in document order
    pub fn iter(&self) -> impl Iterator<Item = &TaskSpec> {
        self.tasks.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &TaskId> {
        self.tasks.keys()
    }

    /// The dependency set of a task, or `None` for an unknown id
    pub fn dependencies(&self, task_id: &str) -> Option<&IndexSet<TaskId>> {
        self.tasks.get(task_id).map(|spec| &spec.dependencies)
    }

    /// Every role some task needs
    pub fn roles(&self) -> IndexSet<Role> {
        self.tasks.values().map(|spec| spec.role).collect()
    }
}

impl<'a> IntoIterator for &'a TaskGraph {
    type Item = &'a TaskSpec;
    type IntoIter = indexmap::map::Values<'a, TaskId, TaskSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.values()
    }
}
