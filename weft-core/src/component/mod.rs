//! Components
//!
//! This module assembles the reactive layer and the reconciler into the
//! pieces a custom element is built from.
//!
//! - [`Component`]: a view-model bound to a host element, with bindings
//!   scoped to the host's connect cycle, an optional render function, and
//!   scoped `id` lookup.
//! - [`RenderOutput`]: a rendered tree plus the resources that live as long
//!   as it does.
//! - [`CollectionView`]: keyed list rendering without virtual nodes.
//!
//! Leaf components compose these rather than extending them: a component
//! that only binds text uses `watch_expr`, one that renders markup adds a
//! renderer, one that shows a long list owns a `CollectionView` inside its
//! host.

mod base;
mod collection;
mod lifecycle;
mod render;

pub use base::Component;
pub use collection::{CollectionConfig, CollectionView, RefreshStats};
pub use lifecycle::LifecycleState;
pub use render::RenderOutput;
