//! A small engine for typed, validated state-machine pipelines.
//!
//! A [`Flow`] is a directed acyclic graph of named async nodes over one owned
//! state type. Nodes take the state by value and return the updated state;
//! transitions are either fixed edges or branches decided by a pure router
//! over a closed label set. [`FlowBuilder::build`] rejects structurally
//! unsound graphs before anything runs, so a flow that constructs is a flow
//! whose every run takes a well-defined path from entry to [`Target::End`].
//!
//! Flows compose: a node of one flow can own and run another flow, copying
//! the fields it needs into the inner flow's state and projecting the results
//! back out. The review pipeline is built exactly this way, one flow per
//! stage under an orchestrating flow.

mod flow;

pub use flow::{Flow, FlowBuilder, Target};
