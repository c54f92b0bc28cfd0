use std::collections::HashMap;
use std::future::Future;

use futures::future::BoxFuture;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use tracing::{debug, info, warn, Instrument};

use warden_core::{Result, WardenError};

type NodeFn<S> = Box<dyn Fn(S) -> BoxFuture<'static, Result<S>> + Send + Sync>;
type RouterFn<S> = Box<dyn Fn(&S) -> &'static str + Send + Sync>;

/// Where a transition leads: another named node, or out of the flow.
///
/// `&'static str` converts into `Target::Node`, so plain node-to-node edges
/// read as `.edge("A", "B")`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Continue with the named node.
    Node(&'static str),
    /// Finish the run and yield the current state.
    End,
}

impl From<&'static str> for Target {
    fn from(name: &'static str) -> Self {
        Target::Node(name)
    }
}

enum Transition<S> {
    Edge(Target),
    Branch {
        decide: RouterFn<S>,
        routes: Vec<(&'static str, Target)>,
    },
}

/// Builder for a [`Flow`].
///
/// Nodes are async functions from state to state; every registered node needs
/// exactly one outgoing transition, either a fixed [`edge`](Self::edge) or a
/// [`branch`](Self::branch) whose router picks one of a closed set of labels.
/// [`build`](Self::build) validates the whole graph before anything can run.
///
/// # Examples
///
/// ```
/// use warden_flow::{FlowBuilder, Target};
///
/// #[derive(Default)]
/// struct Counter {
///     n: u32,
/// }
///
/// let flow = FlowBuilder::new("demo")
///     .node("INC", |mut s: Counter| async move {
///         s.n += 1;
///         Ok(s)
///     })
///     .entry("INC")
///     .edge("INC", Target::End)
///     .build()
///     .unwrap();
///
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// let out = rt.block_on(flow.run(Counter::default())).unwrap();
/// assert_eq!(out.n, 1);
/// ```
pub struct FlowBuilder<S> {
    name: &'static str,
    entry: Option<&'static str>,
    nodes: Vec<(&'static str, NodeFn<S>)>,
    transitions: Vec<(&'static str, Transition<S>)>,
}

impl<S: Send + 'static> FlowBuilder<S> {
    /// Start a builder for a flow with the given name.
    ///
    /// The name appears in tracing spans and error messages.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entry: None,
            nodes: Vec::new(),
            transitions: Vec::new(),
        }
    }

    /// Register a named node.
    ///
    /// The handler takes the state by value and returns the updated state, or
    /// an error that aborts the run. Handlers that do no I/O use the same
    /// shape; their future is simply already ready.
    pub fn node<F, Fut>(mut self, name: &'static str, handler: F) -> Self
    where
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S>> + Send + 'static,
    {
        self.nodes
            .push((name, Box::new(move |state| Box::pin(handler(state)))));
        self
    }

    /// Declare the node the run starts from.
    pub fn entry(mut self, name: &'static str) -> Self {
        self.entry = Some(name);
        self
    }

    /// Add a fixed transition from `from` to `to`.
    pub fn edge(mut self, from: &'static str, to: impl Into<Target>) -> Self {
        self.transitions.push((from, Transition::Edge(to.into())));
        self
    }

    /// Add a conditional transition after `from`.
    ///
    /// `decide` inspects the state and returns one of the labels declared in
    /// `routes`; the matching target is taken. Returning any other label is a
    /// fault, so routers should be total over their declared set.
    pub fn branch<F>(
        mut self,
        from: &'static str,
        decide: F,
        routes: impl IntoIterator<Item = (&'static str, Target)>,
    ) -> Self
    where
        F: Fn(&S) -> &'static str + Send + Sync + 'static,
    {
        self.transitions.push((
            from,
            Transition::Branch {
                decide: Box::new(decide),
                routes: routes.into_iter().collect(),
            },
        ));
        self
    }

    /// Validate the graph and produce a runnable [`Flow`].
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::Assembly`] when the graph is structurally
    /// unsound: no or unknown entry, duplicate nodes, a transition from or to
    /// an unregistered node, a node with zero or multiple outgoing
    /// transitions, duplicate or empty branch label sets, a node unreachable
    /// from the entry, or a cycle.
    pub fn build(self) -> Result<Flow<S>> {
        let flow = self.name;
        let fail = |msg: String| WardenError::Assembly(format!("flow '{flow}': {msg}"));

        if self.nodes.is_empty() {
            return Err(fail("no nodes registered".into()));
        }

        let mut nodes: HashMap<&'static str, NodeFn<S>> = HashMap::new();
        for (name, handler) in self.nodes {
            if nodes.insert(name, handler).is_some() {
                return Err(fail(format!("duplicate node '{name}'")));
            }
        }

        let entry = self
            .entry
            .ok_or_else(|| fail("no entry node declared".into()))?;
        if !nodes.contains_key(entry) {
            return Err(fail(format!("entry node '{entry}' is not registered")));
        }

        let mut transitions: HashMap<&'static str, Transition<S>> = HashMap::new();
        for (from, transition) in self.transitions {
            if !nodes.contains_key(from) {
                return Err(fail(format!("transition from unregistered node '{from}'")));
            }
            if let Transition::Branch { routes, .. } = &transition {
                if routes.is_empty() {
                    return Err(fail(format!("branch after '{from}' declares no routes")));
                }
                let mut seen = Vec::new();
                for (label, _) in routes {
                    if seen.contains(label) {
                        return Err(fail(format!(
                            "branch after '{from}' declares label '{label}' twice"
                        )));
                    }
                    seen.push(label);
                }
            }
            for target in transition_targets(&transition) {
                if let Target::Node(to) = target {
                    if !nodes.contains_key(to) {
                        return Err(fail(format!(
                            "transition from '{from}' to unregistered node '{to}'"
                        )));
                    }
                }
            }
            if transitions.insert(from, transition).is_some() {
                return Err(fail(format!("node '{from}' has multiple transitions")));
            }
        }

        for name in nodes.keys() {
            if !transitions.contains_key(name) {
                return Err(fail(format!(
                    "node '{name}' has no outgoing transition; add an edge or branch (use Target::End to finish)"
                )));
            }
        }

        // Structural checks over the whole graph: every node reachable from
        // the entry, and no cycles.
        let mut graph: DiGraph<&'static str, ()> = DiGraph::new();
        let mut index: HashMap<&'static str, NodeIndex> = HashMap::new();
        for name in nodes.keys() {
            index.insert(*name, graph.add_node(*name));
        }
        for (from, transition) in &transitions {
            for target in transition_targets(transition) {
                if let Target::Node(to) = target {
                    graph.add_edge(index[from], index[to], ());
                }
            }
        }

        if is_cyclic_directed(&graph) {
            return Err(fail("graph contains a cycle".into()));
        }

        let mut reached = vec![false; graph.node_count()];
        let mut dfs = Dfs::new(&graph, index[entry]);
        while let Some(nx) = dfs.next(&graph) {
            reached[nx.index()] = true;
        }
        let mut unreachable: Vec<&'static str> = index
            .iter()
            .filter(|(_, idx)| !reached[idx.index()])
            .map(|(name, _)| *name)
            .collect();
        if !unreachable.is_empty() {
            unreachable.sort_unstable();
            return Err(fail(format!(
                "nodes unreachable from entry '{entry}': {}",
                unreachable.join(", ")
            )));
        }

        Ok(Flow {
            name: flow,
            entry,
            nodes,
            transitions,
        })
    }
}

fn transition_targets<S>(transition: &Transition<S>) -> Vec<Target> {
    match transition {
        Transition::Edge(target) => vec![*target],
        Transition::Branch { routes, .. } => routes.iter().map(|(_, t)| *t).collect(),
    }
}

/// A validated, runnable flow over state `S`.
///
/// A flow owns its nodes and transitions; nothing is shared or global, so two
/// flows built from the same factory are fully independent. Running consumes
/// an initial state and returns the final state after the single path chosen
/// by the transitions.
pub struct Flow<S> {
    name: &'static str,
    entry: &'static str,
    nodes: HashMap<&'static str, NodeFn<S>>,
    transitions: HashMap<&'static str, Transition<S>>,
}

impl<S> std::fmt::Debug for Flow<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flow")
            .field("name", &self.name)
            .field("entry", &self.entry)
            .finish_non_exhaustive()
    }
}

impl<S: Send + 'static> Flow<S> {
    /// Name the flow was built with.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Execute the flow from its entry node.
    ///
    /// Exactly one transition is taken after each node. The run ends when a
    /// transition reaches [`Target::End`].
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::Node`] wrapping the failing node's error when a
    /// handler faults, or [`WardenError::Assembly`] if a router returns a
    /// label outside its declared set.
    pub async fn run(&self, state: S) -> Result<S> {
        let span = tracing::info_span!("flow", flow = self.name);
        self.run_inner(state).instrument(span).await
    }

    async fn run_inner(&self, mut state: S) -> Result<S> {
        info!(entry = self.entry, "flow started");
        let mut current = self.entry;
        loop {
            let Some(handler) = self.nodes.get(current) else {
                return Err(WardenError::Assembly(format!(
                    "flow '{}': node '{current}' vanished after validation",
                    self.name
                )));
            };
            debug!(node = current, "node started");
            state = match handler(state).await {
                Ok(next) => next,
                Err(e) => {
                    warn!(node = current, error = %e, "node faulted");
                    return Err(WardenError::node(self.name, current, e));
                }
            };
            debug!(node = current, "node finished");

            let Some(transition) = self.transitions.get(current) else {
                return Err(WardenError::Assembly(format!(
                    "flow '{}': node '{current}' lost its transition after validation",
                    self.name
                )));
            };
            let target = match transition {
                Transition::Edge(target) => target,
                Transition::Branch { decide, routes } => {
                    let label = decide(&state);
                    let Some((_, target)) = routes.iter().find(|(l, _)| *l == label) else {
                        return Err(WardenError::Assembly(format!(
                            "flow '{}': router after '{current}' returned undeclared label '{label}'",
                            self.name
                        )));
                    };
                    debug!(node = current, label, "branch taken");
                    target
                }
            };
            match *target {
                Target::Node(next) => current = next,
                Target::End => {
                    info!("flow finished");
                    return Ok(state);
                }
            }
        }
    }
}
