//! Dynamic view containers
//!
//! A `ViewSlot` owns an ordered sequence of views anchored at a DOM
//! position. Its children order always matches the DOM order of the
//! corresponding node ranges. When content selectors are installed the
//! slot redirects node placement through slot distribution instead of
//! direct insertion.

use crate::animator::{Animator, NoopAnimator, ANIMATE_CLASS};
use crate::binding::Scope;
use crate::dom::Node;
use crate::shadow_dom::{self, ProjectionContext, SlotMap};
use crate::view::View;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

struct ProjectionTarget {
    slots: SlotMap,
    context: ProjectionContext,
}

struct ViewSlotInner {
    /// Insertion point: a container element or an anchor the views' nodes
    /// are inserted before.
    anchor: Node,
    anchor_is_container: bool,
    children: RefCell<Vec<View>>,
    is_bound: Cell<bool>,
    is_attached: Cell<bool>,
    bound_scope: RefCell<Option<Scope>>,
    animator: RefCell<Rc<dyn Animator>>,
    projection: RefCell<Option<ProjectionTarget>>,
}

#[derive(Clone)]
pub struct ViewSlot {
    inner: Rc<ViewSlotInner>,
}

impl ViewSlot {
    pub fn new(anchor: Node, anchor_is_container: bool) -> ViewSlot {
        ViewSlot {
            inner: Rc::new(ViewSlotInner {
                anchor,
                anchor_is_container,
                children: RefCell::new(Vec::new()),
                is_bound: Cell::new(false),
                is_attached: Cell::new(false),
                bound_scope: RefCell::new(None),
                animator: RefCell::new(Rc::new(NoopAnimator)),
                projection: RefCell::new(None),
            }),
        }
    }

    pub fn set_animator(&self, animator: Rc<dyn Animator>) {
        *self.inner.animator.borrow_mut() = animator;
    }

    /// Redirect subsequent insert/remove operations through slot
    /// distribution instead of direct DOM placement.
    pub fn project_to(&self, slots: SlotMap, context: ProjectionContext) {
        *self.inner.projection.borrow_mut() = Some(ProjectionTarget { slots, context });
    }

    pub fn children(&self) -> Vec<View> {
        self.inner.children.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    pub fn is_attached(&self) -> bool {
        self.inner.is_attached.get()
    }

    pub fn is_bound(&self) -> bool {
        self.inner.is_bound.get()
    }

    fn animatable_element(view: &View) -> Option<Node> {
        view.nodes()
            .iter()
            .find(|n| n.is_element() && n.has_class(ANIMATE_CLASS))
            .cloned()
    }

    fn place_nodes(&self, view: &View, reference: Option<&Node>) {
        if let Some(projection) = self.inner.projection.borrow().as_ref() {
            shadow_dom::distribute_nodes(
                &view.nodes(),
                &projection.slots,
                view.id(),
                &projection.context,
            );
            return;
        }
        if self.inner.anchor_is_container {
            match reference {
                Some(reference) => view.insert_nodes_before(&self.inner.anchor, Some(reference)),
                None => view.append_nodes_to(&self.inner.anchor),
            }
        } else {
            let parent = match self.inner.anchor.parent() {
                Some(parent) => parent,
                None => return,
            };
            view.insert_nodes_before(&parent, Some(reference.unwrap_or(&self.inner.anchor)));
        }
    }

    fn withdraw_nodes(&self, view: &View) {
        if let Some(projection) = self.inner.projection.borrow().as_ref() {
            shadow_dom::remove_source(&projection.slots, view.id(), &projection.context);
            return;
        }
        view.remove_nodes();
    }

    /// Append a view. Not complete until the animator's enter call
    /// returns.
    pub fn add(&self, view: View) {
        self.place_nodes(&view, None);
        self.inner.children.borrow_mut().push(view.clone());
        if self.inner.is_attached.get() {
            view.attached();
            if let Some(element) = Self::animatable_element(&view) {
                self.inner.animator.borrow().enter(&element);
            }
        }
    }

    /// Insert a view at `index`, preserving DOM order.
    pub fn insert(&self, index: usize, view: View) {
        let children_len = self.inner.children.borrow().len();
        if index >= children_len {
            self.add(view);
            return;
        }
        let reference = self.inner.children.borrow()[index].first_node();
        self.place_nodes(&view, reference.as_ref());
        self.inner.children.borrow_mut().insert(index, view.clone());
        if self.inner.is_attached.get() {
            view.attached();
        }
    }

    /// Move the view at `source_index` to `target_index`, relocating its
    /// nodes to match.
    pub fn move_view(&self, source_index: usize, target_index: usize) {
        if source_index == target_index {
            return;
        }
        let view = {
            let mut children = self.inner.children.borrow_mut();
            if source_index >= children.len() || target_index >= children.len() {
                return;
            }
            children.remove(source_index)
        };
        view.remove_nodes();
        let reference = self.inner.children.borrow().get(target_index).and_then(|v| v.first_node());
        self.place_nodes(&view, reference.as_ref());
        self.inner.children.borrow_mut().insert(target_index, view);
    }

    /// Remove a view, returning it to the caller. Runs the leave animation
    /// first when attached.
    pub fn remove(&self, view: &View) -> Option<View> {
        let index = self
            .inner
            .children
            .borrow()
            .iter()
            .position(|c| c.same(view))?;
        self.remove_at(index)
    }

    pub fn remove_at(&self, index: usize) -> Option<View> {
        let view = {
            let mut children = self.inner.children.borrow_mut();
            if index >= children.len() {
                return None;
            }
            children.remove(index)
        };
        if self.inner.is_attached.get() {
            if let Some(element) = Self::animatable_element(&view) {
                self.inner.animator.borrow().leave(&element);
            }
            view.detached();
        }
        self.withdraw_nodes(&view);
        Some(view)
    }

    pub fn remove_all(&self) {
        while self.child_count() > 0 {
            self.remove_at(self.child_count() - 1);
        }
    }

    /// Bind every child view; newly added children are the caller's
    /// responsibility (add does not bind).
    pub fn bind(&self, scope: &Scope) {
        if self.inner.is_bound.get() {
            if self
                .inner
                .bound_scope
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
        *self.inner.bound_scope.borrow_mut() = Some(scope.clone());
        for child in self.children() {
            child.bind(scope);
        }
    }

    pub fn unbind(&self) {
        if !self.inner.is_bound.get() {
            return;
        }
        self.inner.is_bound.set(false);
        *self.inner.bound_scope.borrow_mut() = None;
        for child in self.children() {
            child.unbind();
        }
    }

    pub fn attached(&self) {
        if self.inner.is_attached.get() {
            return;
        }
        self.inner.is_attached.set(true);
        for child in self.children() {
            child.attached();
            if let Some(element) = Self::animatable_element(&child) {
                self.inner.animator.borrow().enter(&element);
            }
        }
    }

    pub fn detached(&self) {
        if !self.inner.is_attached.get() {
            return;
        }
        self.inner.is_attached.set(false);
        for child in self.children() {
            child.detached();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingContext;
    use crate::resources::ViewResources;

    fn view_with_marker(tag: &str) -> View {
        let fragment = Node::fragment();
        fragment.append_child(&Node::element(tag));
        View::new(fragment, Rc::new(ViewResources::root()))
    }

    fn container_slot() -> (Node, ViewSlot) {
        let container = Node::element("div");
        (container.clone(), ViewSlot::new(container, true))
    }

    #[test]
    fn test_add_insert_order_matches_dom() {
        let (container, slot) = container_slot();
        slot.add(view_with_marker("a"));
        slot.add(view_with_marker("c"));
        slot.insert(1, view_with_marker("b"));

        let names: Vec<String> = container.children().iter().map(|n| n.node_name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(slot.child_count(), 3);
    }

    #[test]
    fn test_move_view_relocates_nodes() {
        let (container, slot) = container_slot();
        slot.add(view_with_marker("a"));
        slot.add(view_with_marker("b"));
        slot.add(view_with_marker("c"));

        slot.move_view(2, 0);
        let names: Vec<String> = container.children().iter().map(|n| n.node_name()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_remove_detaches_and_returns_view() {
        let (container, slot) = container_slot();
        let view = view_with_marker("a");
        slot.add(view.clone());
        slot.attached();
        assert!(view.is_attached());

        let removed = slot.remove(&view).unwrap();
        assert!(removed.same(&view));
        assert!(!view.is_attached());
        assert_eq!(container.child_count(), 0);
    }

    #[test]
    fn test_bind_propagates_and_is_idempotent() {
        let (_container, slot) = container_slot();
        let view = view_with_marker("a");
        slot.add(view.clone());

        let scope = Scope::new(BindingContext::new());
        slot.bind(&scope);
        slot.bind(&scope);
        assert!(view.is_bound());
        slot.unbind();
        assert!(!view.is_bound());
    }

    #[test]
    fn test_anchor_mode_inserts_before_anchor() {
        let parent = Node::element("div");
        let anchor = Node::comment("anchor");
        parent.append_child(&anchor);
        let slot = ViewSlot::new(anchor, false);

        slot.add(view_with_marker("x"));
        let kids = parent.children();
        assert_eq!(kids.len(), 2);
        assert_eq!(kids[0].node_name(), "x");
        assert!(kids[1].is_comment());
    }
}
