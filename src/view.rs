//! Live view instances
//!
//! A `View` is one instantiated template: it owns its DOM nodes (held in a
//! fragment while detached), its bindings, its controllers, its child views
//! and its slot map, and drives the bind/attach/detach/unbind lifecycle.
//! `is_bound` and `is_attached` are independent booleans; every transition
//! is idempotent and strictly paired.

use crate::binding::{Binding, LetBinding, Scope};
use crate::controller::Controller;
use crate::dom::Node;
use crate::resources::ViewResources;
use crate::shadow_dom::SlotMap;
use crate::view_factory::ViewFactory;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

pub struct ViewInner {
    /// Holds the view's nodes while they are out of the document.
    fragment: Node,
    /// Top-level content nodes, in document order. Re-snapshotted from the
    /// fragment whenever the view is inserted, so nodes added relative to
    /// the view's anchors while detached travel with it.
    nodes: RefCell<Vec<Node>>,
    bindings: RefCell<Vec<Rc<Binding>>>,
    let_bindings: RefCell<Vec<Rc<LetBinding>>>,
    controllers: RefCell<Vec<Controller>>,
    children: RefCell<Vec<View>>,
    slots: RefCell<SlotMap>,
    scope: RefCell<Option<Scope>>,
    is_bound: Cell<bool>,
    is_attached: Cell<bool>,
    factory: RefCell<Option<Weak<ViewFactory>>>,
    resources: Rc<ViewResources>,
}

#[derive(Clone)]
pub struct View {
    inner: Rc<ViewInner>,
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("is_bound", &self.inner.is_bound.get())
            .field("is_attached", &self.inner.is_attached.get())
            .finish_non_exhaustive()
    }
}

impl View {
    pub(crate) fn new(fragment: Node, resources: Rc<ViewResources>) -> View {
        let nodes = RefCell::new(fragment.children());
        View {
            inner: Rc::new(ViewInner {
                fragment,
                nodes,
                bindings: RefCell::new(Vec::new()),
                let_bindings: RefCell::new(Vec::new()),
                controllers: RefCell::new(Vec::new()),
                children: RefCell::new(Vec::new()),
                slots: RefCell::new(SlotMap::new()),
                scope: RefCell::new(None),
                is_bound: Cell::new(false),
                is_attached: Cell::new(false),
                factory: RefCell::new(None),
                resources,
            }),
        }
    }

    pub fn resources(&self) -> &Rc<ViewResources> {
        &self.inner.resources
    }

    /// Identity of this view, used as a projection-source key.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    pub fn same(&self, other: &View) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_bound(&self) -> bool {
        self.inner.is_bound.get()
    }

    pub fn is_attached(&self) -> bool {
        self.inner.is_attached.get()
    }

    pub fn scope(&self) -> Option<Scope> {
        self.inner.scope.borrow().clone()
    }

    pub(crate) fn set_factory(&self, factory: &Rc<ViewFactory>) {
        *self.inner.factory.borrow_mut() = Some(Rc::downgrade(factory));
    }

    pub(crate) fn add_binding(&self, binding: Rc<Binding>) {
        self.inner.bindings.borrow_mut().push(binding);
    }

    pub(crate) fn add_let_binding(&self, binding: Rc<LetBinding>) {
        self.inner.let_bindings.borrow_mut().push(binding);
    }

    pub(crate) fn add_controller(&self, controller: Controller) {
        self.inner.controllers.borrow_mut().push(controller);
    }

    pub(crate) fn install_slot(&self, name: String, slot: Rc<crate::shadow_dom::ProjectionSlot>) {
        self.inner.slots.borrow_mut().insert(name, slot);
    }

    pub fn has_slots(&self) -> bool {
        !self.inner.slots.borrow().is_empty()
    }

    pub fn slots(&self) -> SlotMap {
        self.inner.slots.borrow().clone()
    }

    pub fn binding_count(&self) -> usize {
        self.inner.bindings.borrow().len()
    }

    pub fn controller_count(&self) -> usize {
        self.inner.controllers.borrow().len()
    }

    pub fn controllers(&self) -> Vec<Controller> {
        self.inner.controllers.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    /// Register a descendant view; it follows this view's bind/attach
    /// transitions from then on.
    pub fn add_child(&self, child: View) {
        self.inner.children.borrow_mut().push(child);
    }

    pub fn remove_child(&self, child: &View) {
        self.inner.children.borrow_mut().retain(|c| !c.same(child));
    }

    // ---- nodes ---------------------------------------------------------

    pub fn nodes(&self) -> Vec<Node> {
        self.inner.nodes.borrow().clone()
    }

    pub fn first_node(&self) -> Option<Node> {
        self.inner.nodes.borrow().first().cloned()
    }

    /// Re-snapshot the node range from the held fragment.
    pub(crate) fn refresh_nodes(&self) {
        *self.inner.nodes.borrow_mut() = self.inner.fragment.children();
    }

    /// The nodes about to move: the fragment's current children while
    /// detached, the recorded range otherwise.
    fn movable_nodes(&self) -> Vec<Node> {
        let detached = self.inner.fragment.children();
        if detached.is_empty() {
            self.inner.nodes.borrow().clone()
        } else {
            detached
        }
    }

    /// Insert the view's nodes into `parent` before `reference`.
    pub fn insert_nodes_before(&self, parent: &Node, reference: Option<&Node>) {
        let nodes = self.movable_nodes();
        for node in &nodes {
            parent.insert_before(node, reference);
        }
        *self.inner.nodes.borrow_mut() = nodes;
    }

    pub fn append_nodes_to(&self, container: &Node) {
        let nodes = self.movable_nodes();
        for node in &nodes {
            container.append_child(node);
        }
        *self.inner.nodes.borrow_mut() = nodes;
    }

    /// Walk the node range and re-parent every node back into the view's
    /// held fragment, so it can be re-inserted or released later.
    pub fn remove_nodes(&self) {
        for node in self.inner.nodes.borrow().iter() {
            self.inner.fragment.append_child(node);
        }
    }

    // ---- lifecycle -----------------------------------------------------

    /// Bind to `scope`. Calling again with the same context is a no-op;
    /// a different context implicitly unbinds first. Order: let bindings,
    /// bindings, controllers, then descendant views.
    pub fn bind(&self, scope: &Scope) {
        if self.inner.is_bound.get() {
            if self
                .inner
                .scope
                .borrow()
                .as_ref()
                .map(|s| s.same_context(scope))
                .unwrap_or(false)
            {
                return;
            }
            self.unbind();
        }
        self.inner.is_bound.set(true);
        *self.inner.scope.borrow_mut() = Some(scope.clone());

        for let_binding in self.inner.let_bindings.borrow().iter() {
            let_binding.bind(scope);
        }
        for binding in self.inner.bindings.borrow().iter() {
            binding.bind(scope);
        }
        let controllers = self.inner.controllers.borrow().clone();
        for controller in controllers {
            controller.bind(scope);
        }
        let children = self.inner.children.borrow().clone();
        for child in children {
            child.bind(scope);
        }
    }

    /// Mirror of bind: controllers unbind first, then bindings, then
    /// descendant views; contexts are released.
    pub fn unbind(&self) {
        if !self.inner.is_bound.get() {
            return;
        }
        self.inner.is_bound.set(false);

        let controllers = self.inner.controllers.borrow().clone();
        for controller in controllers {
            controller.unbind();
        }
        for binding in self.inner.bindings.borrow().iter() {
            binding.unbind();
        }
        let children = self.inner.children.borrow().clone();
        for child in children {
            child.unbind();
        }
        *self.inner.scope.borrow_mut() = None;
    }

    /// Own controllers attach before child views.
    pub fn attached(&self) {
        if self.inner.is_attached.get() {
            return;
        }
        self.inner.is_attached.set(true);

        let controllers = self.inner.controllers.borrow().clone();
        for controller in controllers {
            controller.attached();
        }
        let children = self.inner.children.borrow().clone();
        for child in children {
            child.attached();
        }
    }

    /// Mirror of attached: child views detach before own controllers.
    pub fn detached(&self) {
        if !self.inner.is_attached.get() {
            return;
        }
        self.inner.is_attached.set(false);

        let children = self.inner.children.borrow().clone();
        for child in children {
            child.detached();
        }
        let controllers = self.inner.controllers.borrow().clone();
        for controller in controllers {
            controller.detached();
        }
    }

    /// Offer the view back to its factory's pool. Requires the view to be
    /// fully unbound and detached; returns whether it was accepted.
    pub fn return_to_cache(&self) -> bool {
        if self.inner.is_bound.get() || self.inner.is_attached.get() {
            return false;
        }
        let factory = match self.inner.factory.borrow().as_ref().and_then(|w| w.upgrade()) {
            Some(factory) => factory,
            None => return false,
        };
        self.remove_nodes();
        factory.try_return_to_cache(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingContext;

    fn empty_view() -> View {
        let fragment = Node::fragment();
        fragment.append_child(&Node::element("div"));
        View::new(fragment, Rc::new(ViewResources::root()))
    }

    #[test]
    fn test_lifecycle_flags_independent() {
        let view = empty_view();
        let scope = Scope::new(BindingContext::new());

        view.bind(&scope);
        view.attached();
        assert!(view.is_bound());
        assert!(view.is_attached());

        // unbind does not imply detach
        view.unbind();
        assert!(!view.is_bound());
        assert!(view.is_attached());

        view.detached();
        assert!(!view.is_attached());
    }

    #[test]
    fn test_bind_same_context_idempotent() {
        let view = empty_view();
        let scope = Scope::new(BindingContext::new());
        view.bind(&scope);
        view.bind(&scope);
        assert!(view.is_bound());
        // a different context implies unbind-then-bind
        let other = Scope::new(BindingContext::new());
        view.bind(&other);
        assert!(view.is_bound());
        assert!(view.scope().unwrap().same_context(&other));
    }

    #[test]
    fn test_remove_nodes_reparents_into_fragment() {
        let fragment = Node::fragment();
        let a = Node::element("a");
        let b = Node::element("b");
        fragment.append_child(&a);
        fragment.append_child(&b);
        let view = View::new(fragment, Rc::new(ViewResources::root()));

        let host = Node::element("div");
        view.append_nodes_to(&host);
        assert_eq!(host.child_count(), 2);

        view.remove_nodes();
        assert_eq!(host.child_count(), 0);
        assert!(a.parent().unwrap().is_fragment());

        // nodes can be re-inserted again afterwards
        view.append_nodes_to(&host);
        assert_eq!(host.child_count(), 2);
    }
}
