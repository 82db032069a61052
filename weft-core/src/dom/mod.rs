//! Host Tree
//!
//! An in-memory element tree standing in for the browser document. It is
//! the surface everything else renders into.
//!
//! # Model
//!
//! Nodes live in an arena keyed by [`NodeId`]. Each node is an element
//! (tag, attributes, listeners, children), a text node, or a fragment: a
//! detached container whose children move into the parent it is inserted
//! into.
//!
//! A node reachable from the document root is *connected*. Elements can be
//! registered as hosts; a host is told through [`HostHooks`] whenever it
//! becomes connected or disconnected. Reordering inside the connected tree
//! is a single move and is not a lifecycle transition.
//!
//! # Observability
//!
//! With [`Document::record_mutations`] enabled, every structural and
//! content change is appended to a log of [`Mutation`]s. Tests use the log
//! to assert exactly which operations a patch issued.

mod document;
mod event;
mod mutation;
mod node;

pub use document::{Document, HostHooks};
pub use event::{Event, EventHandler};
pub use mutation::Mutation;
pub use node::{AttrValue, NodeId, NodeKind};
