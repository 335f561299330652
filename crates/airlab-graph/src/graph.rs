//! Enum-tag subgraph engine.
//!
//! Nodes are keyed by static tags; each node returns either the tag of
//! its successor or `End`. Conditional edges are therefore ordinary code
//! in the node body — exactly one successor per evaluation. A step budget
//! guards against accidental infinite cycles in mis-wired graphs.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use airlab_actions::ActionsError;
use airlab_core::CoreError;

/// Node identifier within one subgraph.
pub type NodeTag = &'static str;

/// Errors raised while executing a subgraph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("unknown node tag: {0}")]
    UnknownNode(String),

    #[error("subgraph '{name}' exceeded its step budget of {budget}")]
    StepBudgetExceeded { name: String, budget: u32 },

    #[error(transparent)]
    Actions(#[from] ActionsError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl GraphError {
    /// Short variant label for task-status error strings.
    pub fn kind(&self) -> &'static str {
        match self {
            GraphError::UnknownNode(_) => "UnknownNode",
            GraphError::StepBudgetExceeded { .. } => "StepBudgetExceeded",
            GraphError::Actions(e) => e.kind(),
            GraphError::Core(_) => "Core",
        }
    }
}

/// Where to go after a node ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Goto(NodeTag),
    End,
}

/// One unit of work in a subgraph.
#[async_trait]
pub trait Node<S: Send>: Send + Sync {
    /// Execute against the shared subgraph state and pick a successor.
    async fn run(&self, state: &mut S) -> Result<Step, GraphError>;
}

/// A named state machine over shared state `S`.
pub struct Subgraph<S> {
    name: String,
    entry: NodeTag,
    nodes: HashMap<NodeTag, Box<dyn Node<S>>>,
    max_steps: u32,
}

impl<S: Send> Subgraph<S> {
    pub fn new(name: impl Into<String>, entry: NodeTag) -> Self {
        Self {
            name: name.into(),
            entry,
            nodes: HashMap::new(),
            max_steps: 64,
        }
    }

    /// Register a node under a tag.
    pub fn with_node(mut self, tag: NodeTag, node: impl Node<S> + 'static) -> Self {
        self.nodes.insert(tag, Box::new(node));
        self
    }

    /// Override the step budget.
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Run from the entry node until a node returns `End`.
    pub async fn run(&self, state: &mut S) -> Result<(), GraphError> {
        let mut current = self.entry;
        for step in 1..=self.max_steps {
            let node = self
                .nodes
                .get(current)
                .ok_or_else(|| GraphError::UnknownNode(current.to_string()))?;

            debug!(subgraph = %self.name, node = current, step, "executing node");
            match node.run(state).await? {
                Step::Goto(next) => current = next,
                Step::End => return Ok(()),
            }
        }

        Err(GraphError::StepBudgetExceeded {
            name: self.name.clone(),
            budget: self.max_steps,
        })
    }
}
