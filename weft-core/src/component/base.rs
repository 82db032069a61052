//! The component core.
//!
//! A [`Component`] ties a view-model to one host element. It owns a set of
//! expression bindings that live exactly as long as the host is connected,
//! an optional render binding that keeps the host's children in sync with a
//! render function, and the lifecycle hooks around both.
//!
//! # Lifecycle
//!
//! Bindings registered with [`watch_expr`](Component::watch_expr) start on
//! connect (or immediately, if the host is already connected) and are
//! disposed on disconnect. Reconnecting builds them again from scratch, so a
//! binding never observes anything while its host is detached.
//!
//! # Rendering
//!
//! The render function runs inside a tracked binding. Any observable it reads
//! re-triggers it; each successful run is patched into the host against the
//! previously committed tree. A failing render leaves the last good tree on
//! screen and reports the failure through the component's error sink.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, error, trace};

use crate::dom::{Document, HostHooks, NodeId};
use crate::error::{DomError, Error, ExprError};
use crate::reactive::{
    Binding, BindingFactory, BindingId, DisposableBag, Observable, ObservableExpression,
    WhenChangeManager,
};
use crate::vdom::{Mounted, Reconciler, ReconcilerConfig};

use super::lifecycle::LifecycleState;
use super::render::RenderOutput;

type Hook = Rc<dyn Fn()>;

#[derive(Default)]
struct RenderSlot {
    binding: Option<BindingId>,
    mounted: Vec<Mounted>,
    resources: DisposableBag,
    pending: Option<RenderOutput>,
}

struct ComponentInner<VM: 'static> {
    document: Document,
    host: NodeId,
    reconciler: Reconciler,
    view_model: Observable<Option<Rc<VM>>>,
    state: Cell<LifecycleState>,
    bindings: WhenChangeManager,
    on_connect: RefCell<Vec<Hook>>,
    on_disconnect: RefCell<Vec<Hook>>,
    render: RefCell<RenderSlot>,
    mutations: Observable<u64>,
    errors: RefCell<Vec<Error>>,
}

fn same_view_model<VM>(a: &Option<Rc<VM>>, b: &Option<Rc<VM>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

impl<VM: 'static> ComponentInner<VM> {
    fn assert_alive(&self, operation: &str) {
        assert!(
            !self.state.get().is_destroyed(),
            "{operation}() called on a destroyed component"
        );
    }

    fn record_error(&self, failure: Error) {
        error!(host = %self.host, error = %failure, "component error");
        self.errors.borrow_mut().push(failure);
    }

    fn fire(hooks: &RefCell<Vec<Hook>>) {
        let hooks: Vec<Hook> = hooks.borrow().clone();
        for hook in hooks {
            hook();
        }
    }

    fn release_render_resources(&self) {
        let mut resources = std::mem::take(&mut self.render.borrow_mut().resources);
        resources.dispose_all();
    }

    /// Patch the pending render output into the host.
    fn commit_render(&self) {
        let Some(RenderOutput { tree, resources }) = self.render.borrow_mut().pending.take() else {
            return;
        };
        let old = std::mem::take(&mut self.render.borrow_mut().mounted);

        match self.reconciler.patch_children(
            &self.document,
            self.host,
            old,
            std::slice::from_ref(&tree),
        ) {
            Ok(mounted) => {
                let mut superseded = {
                    let mut slot = self.render.borrow_mut();
                    slot.mounted = mounted;
                    std::mem::replace(&mut slot.resources, resources)
                };
                superseded.dispose_all();
                trace!(host = %self.host, "render committed");
            }
            Err(failure) => {
                // The baseline is gone; start over from an empty host.
                self.record_error(failure.into());
                drop(resources);
                self.release_render_resources();
                self.clear_host();
            }
        }
    }

    fn clear_host(&self) {
        for child in self.document.children(self.host) {
            let cleared = self
                .document
                .remove_child(self.host, child)
                .and_then(|()| self.document.release(child));
            if let Err(failure) = cleared {
                self.record_error(failure.into());
            }
        }
    }
}

impl<VM: 'static> HostHooks for ComponentInner<VM> {
    fn connected(&self) {
        if self.state.get().is_destroyed() {
            return;
        }
        self.state.set(LifecycleState::Connected);
        debug!(host = %self.host, bindings = self.bindings.len(), "component connected");

        for failure in self.bindings.start_all() {
            self.record_error(failure.into());
        }
        Self::fire(&self.on_connect);
    }

    fn disconnected(&self) {
        if self.state.get().is_destroyed() {
            return;
        }
        self.state.set(LifecycleState::Disconnected);
        debug!(host = %self.host, "component disconnected");

        Self::fire(&self.on_disconnect);
        self.bindings.stop_all();
        self.release_render_resources();
        self.render.borrow_mut().pending = None;
    }

    fn external_mutation(&self) {
        trace!(host = %self.host, "external mutation");
        self.mutations.update(|count| count + 1);
    }
}

/// A view-model bound to a host element.
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use weft_core::component::Component;
/// use weft_core::dom::Document;
/// use weft_core::reactive::Observable;
///
/// struct Counter {
///     count: Observable<i32>,
/// }
///
/// let doc = Document::new();
/// let host = doc.create_element("x-counter");
/// let component = Component::new(&doc, host).unwrap();
/// component.set_view_model(Rc::new(Counter { count: Observable::new(0) }));
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let log = seen.clone();
/// component.watch_expr(|vm: &Counter| vm.count.get(), move |count| {
///     log.borrow_mut().push(count.copied());
/// });
///
/// // Nothing runs until the host is connected.
/// assert!(seen.borrow().is_empty());
/// doc.append_child(doc.root(), host).unwrap();
/// assert_eq!(*seen.borrow(), vec![Some(0)]);
/// ```
pub struct Component<VM: 'static> {
    inner: Rc<ComponentInner<VM>>,
}

impl<VM: 'static> Component<VM> {
    /// Attach a new component to `host`.
    pub fn new(document: &Document, host: NodeId) -> Result<Self, DomError> {
        Self::with_config(document, host, ReconcilerConfig::default())
    }

    pub fn with_config(
        document: &Document,
        host: NodeId,
        config: ReconcilerConfig,
    ) -> Result<Self, DomError> {
        let inner = Rc::new(ComponentInner {
            document: document.clone(),
            host,
            reconciler: Reconciler::with_config(config),
            view_model: Observable::with_eq(None, same_view_model::<VM>),
            state: Cell::new(LifecycleState::Unattached),
            bindings: WhenChangeManager::new(),
            on_connect: RefCell::new(Vec::new()),
            on_disconnect: RefCell::new(Vec::new()),
            render: RefCell::new(RenderSlot::default()),
            mutations: Observable::new(0),
            errors: RefCell::new(Vec::new()),
        });

        let weak: Weak<ComponentInner<VM>> = Rc::downgrade(&inner);
        let hooks: Weak<dyn HostHooks> = weak;
        document.register_host(host, hooks)?;
        if document.is_connected(host) {
            inner.connected();
        }
        Ok(Self { inner })
    }

    pub fn host(&self) -> NodeId {
        self.inner.host
    }

    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.state.get()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// The current view-model. Reading it inside a binding tracks it.
    pub fn view_model(&self) -> Option<Rc<VM>> {
        self.inner.view_model.get()
    }

    /// Replace the view-model.
    ///
    /// Every live binding re-evaluates against the new view-model before
    /// this returns. Returns `false` if it is the same instance.
    ///
    /// # Panics
    ///
    /// Panics if the component was destroyed.
    pub fn set_view_model(&self, view_model: impl Into<Option<Rc<VM>>>) -> bool {
        self.inner.assert_alive("set_view_model");
        self.inner.view_model.set(view_model.into())
    }

    /// Bind `select` to this component's connect cycle.
    ///
    /// `on_change` receives the selected value (`None` while there is no
    /// view-model) on the first evaluation of each connect cycle and then
    /// whenever the value changes.
    ///
    /// # Panics
    ///
    /// Panics if the component was destroyed.
    pub fn watch_expr<T, S, F>(&self, select: S, on_change: F) -> BindingId
    where
        T: PartialEq + 'static,
        S: Fn(&VM) -> T + 'static,
        F: FnMut(Option<&T>) + 'static,
    {
        self.try_watch_expr(move |vm: &VM| Ok(select(vm)), on_change)
    }

    /// Like [`watch_expr`](Self::watch_expr) with a fallible selector.
    ///
    /// Failures land in the component's error sink and keep the previous
    /// value.
    pub fn try_watch_expr<T, S, F>(&self, select: S, on_change: F) -> BindingId
    where
        T: PartialEq + 'static,
        S: Fn(&VM) -> Result<T, ExprError> + 'static,
        F: FnMut(Option<&T>) + 'static,
    {
        self.inner.assert_alive("watch_expr");

        let select = Rc::new(select);
        let on_change = Rc::new(RefCell::new(on_change));
        let view_model = self.inner.view_model.clone();
        let owner = Rc::downgrade(&self.inner);

        let factory: BindingFactory = Rc::new(move || -> Rc<dyn Binding> {
            let read = {
                let select = select.clone();
                let view_model = view_model.clone();
                move || view_model.with(|vm| vm.as_deref().map(|vm| (*select)(vm)).transpose())
            };
            let notify = {
                let on_change = on_change.clone();
                move |value: &Option<T>| (&mut *on_change.borrow_mut())(value.as_ref())
            };
            let owner = owner.clone();
            Rc::new(
                ObservableExpression::try_new(read, notify).on_error(move |failure| {
                    if let Some(owner) = owner.upgrade() {
                        owner.record_error(failure.into());
                    }
                }),
            )
        });

        let (id, started) = self.inner.bindings.add(factory);
        if let Err(failure) = started {
            self.inner.record_error(failure.into());
        }
        id
    }

    /// Dispose and forget a binding.
    pub fn unwatch(&self, id: BindingId) -> bool {
        self.inner.bindings.remove(id)
    }

    pub fn on_connect(&self, hook: impl Fn() + 'static) {
        self.inner.on_connect.borrow_mut().push(Rc::new(hook));
    }

    pub fn on_disconnect(&self, hook: impl Fn() + 'static) {
        self.inner.on_disconnect.borrow_mut().push(Rc::new(hook));
    }

    /// Find an element with the given `id` attribute in this component's
    /// own content. Content of nested components is not searched.
    pub fn query(&self, id: &str) -> Option<NodeId> {
        self.inner.document.find_by_id(self.inner.host, id)
    }

    /// Install the render function. Replaces any earlier one.
    pub fn set_renderer<R>(&self, render: R)
    where
        R: Fn(&VM) -> RenderOutput + 'static,
    {
        self.set_try_renderer(move |vm: &VM| Ok(render(vm)))
    }

    /// Install a fallible render function.
    ///
    /// While there is no view-model the host renders empty.
    ///
    /// # Panics
    ///
    /// Panics if the component was destroyed.
    pub fn set_try_renderer<R>(&self, render: R)
    where
        R: Fn(&VM) -> Result<RenderOutput, ExprError> + 'static,
    {
        self.inner.assert_alive("set_renderer");
        let previous = self.inner.render.borrow_mut().binding.take();
        if let Some(previous) = previous {
            self.inner.bindings.remove(previous);
        }

        let render = Rc::new(render);
        let view_model = self.inner.view_model.clone();
        let owner = Rc::downgrade(&self.inner);

        let factory: BindingFactory = Rc::new(move || -> Rc<dyn Binding> {
            let read = {
                let render = render.clone();
                let view_model = view_model.clone();
                let owner = owner.clone();
                move || -> Result<(), ExprError> {
                    let output = view_model.with(|vm| match vm.as_deref() {
                        Some(vm) => (*render)(vm),
                        None => Ok(RenderOutput::empty()),
                    })?;
                    if let Some(owner) = owner.upgrade() {
                        owner.render.borrow_mut().pending = Some(output);
                    }
                    Ok(())
                }
            };
            let commit = {
                let owner = owner.clone();
                move |_: &()| {
                    if let Some(owner) = owner.upgrade() {
                        owner.commit_render();
                    }
                }
            };
            let owner = owner.clone();
            Rc::new(
                ObservableExpression::with_eq(read, |_, _| false, commit).on_error(
                    move |failure| {
                        if let Some(owner) = owner.upgrade() {
                            owner.record_error(failure.into());
                        }
                    },
                ),
            )
        });

        let (id, started) = self.inner.bindings.add(factory);
        self.inner.render.borrow_mut().binding = Some(id);
        if let Err(failure) = started {
            self.inner.record_error(failure.into());
        }
    }

    /// Run the render function again now.
    ///
    /// Does nothing while disconnected or without a renderer.
    ///
    /// # Panics
    ///
    /// Panics if the component was destroyed.
    pub fn rerender(&self) -> Result<(), ExprError> {
        self.inner.assert_alive("rerender");
        let binding = self.inner.render.borrow().binding;
        match binding.and_then(|id| self.inner.bindings.refresh(id)) {
            Some(result) => result,
            None => Ok(()),
        }
    }

    /// Live nodes the last committed render placed directly in the host.
    pub fn rendered_root_nodes(&self) -> Vec<NodeId> {
        self.inner
            .render
            .borrow()
            .mounted
            .iter()
            .map(Mounted::node)
            .collect()
    }

    /// Counter bumped each time the host reports an external mutation.
    ///
    /// Read it inside a binding to recompute derived state when light
    /// content changes.
    pub fn mutation_signal(&self) -> Observable<u64> {
        self.inner.mutations.clone()
    }

    /// Drain the failures recorded since the last call.
    pub fn take_errors(&self) -> Vec<Error> {
        std::mem::take(&mut *self.inner.errors.borrow_mut())
    }

    /// Number of bindings currently live.
    pub fn active_bindings(&self) -> usize {
        self.inner.bindings.active_count()
    }

    /// Release everything and stop listening to the host. Terminal.
    pub fn destroy(&self) {
        let inner = &self.inner;
        if inner.state.get().is_destroyed() {
            return;
        }
        inner.bindings.clear();
        inner.release_render_resources();
        {
            let mut slot = inner.render.borrow_mut();
            slot.binding = None;
            slot.pending = None;
        }
        inner.on_connect.borrow_mut().clear();
        inner.on_disconnect.borrow_mut().clear();
        inner.document.unregister_host(inner.host);
        inner.state.set(LifecycleState::Destroyed);
        debug!(host = %inner.host, "component destroyed");
    }
}

impl<VM: 'static> Clone for Component<VM> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<VM: 'static> fmt::Debug for Component<VM> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("host", &self.inner.host)
            .field("state", &self.inner.state.get())
            .field("bindings", &self.inner.bindings)
            .finish()
    }
}

// ---- Tests ----
