//! Virtual Tree
//!
//! Declarative descriptions of rendered output and the reconciler that
//! applies them to a [`Document`](crate::dom::Document).
//!
//! # Example
//!
//! ```rust
//! use weft_core::dom::Document;
//! use weft_core::vdom::{h, Reconciler};
//!
//! let doc = Document::new();
//! let reconciler = Reconciler::new();
//!
//! let first = h("ul").children([1, 2].map(|id| h("li").key(id).text(&id.to_string())));
//! let mounted = reconciler.patch(&doc, None, &first.build()).unwrap();
//! doc.append_child(doc.root(), mounted.node()).unwrap();
//!
//! // Reordering keyed children moves the existing elements.
//! let second = h("ul").children([2, 1].map(|id| h("li").key(id).text(&id.to_string())));
//! let mounted = reconciler.patch(&doc, Some(mounted), &second.build()).unwrap();
//! assert_eq!(doc.text_content(mounted.node()), "21");
//! ```

mod diff;
mod lis;
mod node;

pub use diff::{Mounted, Reconciler, ReconcilerConfig};
pub use lis::lis;
pub use node::{fragment, h, text, ElementBuilder, ElementNode, FragmentNode, Key, TextNode, VNode};
