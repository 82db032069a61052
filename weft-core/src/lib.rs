//! Weft Core
//!
//! This crate provides the substrate of the Weft component framework:
//! custom elements bind to view-models, re-render only what changed, and
//! write user input back into the view-model.
//!
//! It implements:
//!
//! - Reactive primitives (observables, tracked expressions, batches)
//! - An in-memory host tree with lifecycle and event delivery
//! - Virtual trees and a keyed reconciler
//! - Components with connect-scoped bindings, rendering, and collections
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: observables, dependency tracking, and expression bindings
//! - `dom`: the live tree components render into
//! - `vdom`: virtual nodes and the reconciler
//! - `component`: the lifecycle core, render layer, and collection view
//! - `config`, `error`: ambient configuration and error types
//!
//! Everything runs on one thread. A write to an observable re-evaluates its
//! dependents and patches the tree before the write returns.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use weft_core::component::Component;
//! use weft_core::dom::Document;
//! use weft_core::reactive::Observable;
//! use weft_core::vdom::h;
//!
//! struct Greeting {
//!     name: Observable<String>,
//! }
//!
//! let doc = Document::new();
//! let host = doc.create_element("x-greeting");
//! let component = Component::new(&doc, host).unwrap();
//!
//! let vm = Rc::new(Greeting { name: Observable::new("world".to_string()) });
//! component.set_view_model(vm.clone());
//! component.set_renderer(|vm: &Greeting| h("p").text(&format!("hello {}", vm.name.get())).into());
//!
//! doc.append_child(doc.root(), host).unwrap();
//! assert_eq!(doc.text_content(host), "hello world");
//!
//! // Writes re-render synchronously.
//! vm.name.set("weft".to_string());
//! assert_eq!(doc.text_content(host), "hello weft");
//! ```

pub mod component;
pub mod config;
pub mod dom;
pub mod error;
pub mod reactive;
pub mod vdom;

pub use error::{Error, Result};
