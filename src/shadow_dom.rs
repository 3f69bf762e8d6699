//! Content projection: slot distribution
//!
//! A component's light-DOM content is routed into the named slots of its
//! own view. `ShadowSlot` is a receiving slot; `PassThroughSlot` forwards
//! everything it receives to a named slot one level up (re-projection
//! through nested components). Per-source anchor comments keep each
//! projection source's node range independently removable.

use crate::dom::Node;
use crate::instruction::ViewCreateInstruction;
use crate::resources::ViewResources;
use crate::binding::Scope;
use crate::view::View;
use crate::view_factory::ViewFactory;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Key of the unnamed slot.
pub const DEFAULT_SLOT_NAME: &str = "default";

pub type SlotMap = HashMap<String, Rc<ProjectionSlot>>;

/// What distribution needs to materialize fallback views.
#[derive(Clone)]
pub struct ProjectionContext {
    pub resources: Rc<ViewResources>,
    pub scope: Scope,
}

struct SourceProjection {
    source: usize,
    /// End-of-range marker; the source's nodes sit immediately before it.
    anchor: Node,
    nodes: Vec<Node>,
}

pub struct ShadowSlotData {
    anchor: Node,
    name: String,
    fallback_factory: Option<Rc<ViewFactory>>,
    fallback_view: RefCell<Option<View>>,
    projections: Cell<usize>,
    sources: RefCell<Vec<SourceProjection>>,
}

pub struct PassThroughSlotData {
    anchor: Node,
    name: String,
    destination_name: String,
    destination: RefCell<Option<Rc<ProjectionSlot>>>,
    pending: RefCell<Vec<(usize, Node)>>,
    projections: Cell<usize>,
}

pub enum ProjectionSlot {
    Shadow(ShadowSlotData),
    PassThrough(PassThroughSlotData),
}

impl ProjectionSlot {
    pub fn shadow(anchor: Node, name: String, fallback: Option<Rc<ViewFactory>>) -> Rc<Self> {
        Rc::new(ProjectionSlot::Shadow(ShadowSlotData {
            anchor,
            name,
            fallback_factory: fallback,
            fallback_view: RefCell::new(None),
            projections: Cell::new(0),
            sources: RefCell::new(Vec::new()),
        }))
    }

    pub fn pass_through(anchor: Node, name: String, destination: String) -> Rc<Self> {
        Rc::new(ProjectionSlot::PassThrough(PassThroughSlotData {
            anchor,
            name,
            destination_name: destination,
            destination: RefCell::new(None),
            pending: RefCell::new(Vec::new()),
            projections: Cell::new(0),
        }))
    }

    pub fn name(&self) -> &str {
        match self {
            ProjectionSlot::Shadow(d) => &d.name,
            ProjectionSlot::PassThrough(d) => &d.name,
        }
    }

    pub fn anchor(&self) -> &Node {
        match self {
            ProjectionSlot::Shadow(d) => &d.anchor,
            ProjectionSlot::PassThrough(d) => &d.anchor,
        }
    }

    /// Count of live projected nodes attributed to this slot.
    pub fn projections(&self) -> usize {
        match self {
            ProjectionSlot::Shadow(d) => d.projections.get(),
            ProjectionSlot::PassThrough(d) => d.projections.get(),
        }
    }

    pub fn has_fallback_rendered(&self) -> bool {
        match self {
            ProjectionSlot::Shadow(d) => d.fallback_view.borrow().is_some(),
            ProjectionSlot::PassThrough(_) => false,
        }
    }

    /// Route one projected node into this slot.
    pub fn add_node(&self, source: usize, node: &Node, context: &ProjectionContext) {
        match self {
            ProjectionSlot::Shadow(data) => {
                if data.projections.get() == 0 {
                    self.tear_down_fallback();
                }
                let parent = match data.anchor.parent() {
                    Some(parent) => parent,
                    None => return,
                };
                let mut sources = data.sources.borrow_mut();
                let index = match sources.iter().position(|s| s.source == source) {
                    Some(index) => index,
                    None => {
                        let source_anchor = Node::comment("projection");
                        parent.insert_before(&source_anchor, Some(&data.anchor));
                        sources.push(SourceProjection {
                            source,
                            anchor: source_anchor,
                            nodes: Vec::new(),
                        });
                        sources.len() - 1
                    }
                };
                let entry = &mut sources[index];
                parent.insert_before(node, Some(&entry.anchor));
                entry.nodes.push(node.clone());
                data.projections.set(data.projections.get() + 1);
            }
            ProjectionSlot::PassThrough(data) => {
                data.projections.set(data.projections.get() + 1);
                let destination = data.destination.borrow().clone();
                match destination {
                    Some(destination) => destination.add_node(source, node, context),
                    None => data.pending.borrow_mut().push((source, node.clone())),
                }
            }
        }
    }

    /// Remove one projected node; re-renders fallback when the count drops
    /// to zero within the same call.
    pub fn remove_node(&self, source: usize, node: &Node, context: &ProjectionContext) {
        match self {
            ProjectionSlot::Shadow(data) => {
                let mut removed = false;
                {
                    let mut sources = data.sources.borrow_mut();
                    if let Some(entry) = sources.iter_mut().find(|s| s.source == source) {
                        if let Some(index) = entry.nodes.iter().position(|n| n.same(node)) {
                            entry.nodes.remove(index);
                            node.remove();
                            removed = true;
                        }
                    }
                }
                if removed {
                    data.projections.set(data.projections.get() - 1);
                    if data.projections.get() == 0 {
                        self.render_fallback(context);
                    }
                }
            }
            ProjectionSlot::PassThrough(data) => {
                data.pending.borrow_mut().retain(|(s, n)| !(*s == source && n.same(node)));
                if let Some(destination) = data.destination.borrow().as_ref() {
                    destination.remove_node(source, node, context);
                }
                if data.projections.get() > 0 {
                    data.projections.set(data.projections.get() - 1);
                }
            }
        }
    }

    /// Drop every node a source contributed, leaving sibling sources'
    /// contributions untouched.
    pub fn remove_source(&self, source: usize, context: &ProjectionContext) {
        match self {
            ProjectionSlot::Shadow(data) => {
                let entry = {
                    let mut sources = data.sources.borrow_mut();
                    match sources.iter().position(|s| s.source == source) {
                        Some(index) => Some(sources.remove(index)),
                        None => None,
                    }
                };
                if let Some(entry) = entry {
                    for node in &entry.nodes {
                        node.remove();
                    }
                    entry.anchor.remove();
                    data.projections
                        .set(data.projections.get() - entry.nodes.len());
                    if data.projections.get() == 0 {
                        self.render_fallback(context);
                    }
                }
            }
            ProjectionSlot::PassThrough(data) => {
                data.pending.borrow_mut().retain(|(s, _)| *s != source);
                if let Some(destination) = data.destination.borrow().as_ref() {
                    destination.remove_source(source, context);
                }
            }
        }
    }

    /// A pass-through slot arriving as projected content claims the
    /// receiving slot map: its nodes are attributed to the destination
    /// slot, not re-scattered.
    pub fn claim(&self, slots: &SlotMap, context: &ProjectionContext) {
        if let ProjectionSlot::PassThrough(data) = self {
            let destination = slots.get(&data.destination_name).cloned();
            *data.destination.borrow_mut() = destination.clone();
            if let Some(destination) = destination {
                for (source, node) in data.pending.borrow_mut().drain(..) {
                    destination.add_node(source, &node, context);
                }
            } else {
                // no matching destination: projected content is discarded
                for (_, node) in data.pending.borrow_mut().drain(..) {
                    node.remove();
                }
            }
        }
    }

    /// Render the fallback view iff there are no live projections.
    pub fn render_fallback(&self, context: &ProjectionContext) {
        if let ProjectionSlot::Shadow(data) = self {
            if data.projections.get() > 0 || data.fallback_view.borrow().is_some() {
                return;
            }
            let factory = match &data.fallback_factory {
                Some(factory) => factory.clone(),
                None => return,
            };
            let instruction = ViewCreateInstruction {
                suppress_bind: true,
                ..Default::default()
            };
            match factory.create(&context.resources, instruction) {
                Ok(view) => {
                    view.bind(&context.scope);
                    if let Some(parent) = data.anchor.parent() {
                        view.insert_nodes_before(&parent, Some(&data.anchor));
                    }
                    *data.fallback_view.borrow_mut() = Some(view);
                }
                Err(e) => log::warn!("Slot '{}' fallback failed to render: {}", data.name, e),
            }
        }
    }

    fn tear_down_fallback(&self) {
        if let ProjectionSlot::Shadow(data) = self {
            if let Some(view) = data.fallback_view.borrow_mut().take() {
                view.unbind();
                view.remove_nodes();
            }
        }
    }
}

/// Distribute a host's light-DOM node list into its component's slots.
///
/// Whitespace-only text is dropped; nodes route to the slot named by their
/// `slot` attribute (default slot when absent); a node matching no declared
/// slot is discarded — including when the host declares no slots at all.
pub fn distribute_nodes(
    nodes: &[Node],
    slots: &SlotMap,
    source: usize,
    context: &ProjectionContext,
) {
    for node in nodes {
        if let Some(payload) = node.payload() {
            if let Ok(slot) = payload.downcast::<ProjectionSlot>() {
                // nested projection source: it takes the whole slot map
                slot.claim(slots, context);
                return;
            }
        }
        if node.is_whitespace_text() {
            node.remove();
            continue;
        }
        let name = node
            .get_attribute("slot")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_SLOT_NAME.to_string());
        match slots.get(&name) {
            Some(slot) => slot.add_node(source, node, context),
            None => {
                log::debug!("Projected node matches no declared slot '{}'; discarded", name);
                node.remove();
            }
        }
    }
}

/// Render fallbacks for every slot still without projections.
pub fn settle_fallbacks(slots: &SlotMap, context: &ProjectionContext) {
    for slot in slots.values() {
        slot.render_fallback(context);
    }
}

/// Withdraw one source's contributions from every slot.
pub fn remove_source(slots: &SlotMap, source: usize, context: &ProjectionContext) {
    for slot in slots.values() {
        slot.remove_source(source, context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingContext;

    fn context() -> ProjectionContext {
        ProjectionContext {
            resources: Rc::new(ViewResources::root()),
            scope: Scope::new(BindingContext::new()),
        }
    }

    fn host_with_slot(name: &str) -> (Node, SlotMap) {
        let container = Node::element("div");
        let anchor = Node::comment("slot");
        container.append_child(&anchor);
        let slot = ProjectionSlot::shadow(anchor, name.to_string(), None);
        let mut slots = SlotMap::new();
        slots.insert(name.to_string(), slot);
        (container, slots)
    }

    #[test]
    fn test_routes_by_slot_attribute_with_default() {
        let (container, slots) = host_with_slot(DEFAULT_SLOT_NAME);
        let plain = Node::element("p");
        let named = Node::element("p");
        named.set_attribute("slot", "missing");

        distribute_nodes(&[plain.clone(), named.clone()], &slots, 1, &context());

        // plain routed into default slot, named one discarded
        assert!(plain.parent().map(|p| p.same(&container)).unwrap_or(false));
        assert!(named.parent().is_none());
        assert_eq!(slots[DEFAULT_SLOT_NAME].projections(), 1);
    }

    #[test]
    fn test_whitespace_text_dropped() {
        let (_container, slots) = host_with_slot(DEFAULT_SLOT_NAME);
        let ws = Node::text("   \n  ");
        let significant = Node::text("hello");
        distribute_nodes(&[ws, significant], &slots, 1, &context());
        assert_eq!(slots[DEFAULT_SLOT_NAME].projections(), 1);
    }

    #[test]
    fn test_per_source_removal_keeps_siblings() {
        let (container, slots) = host_with_slot(DEFAULT_SLOT_NAME);
        let from_a = Node::element("a");
        let from_b = Node::element("b");
        distribute_nodes(std::slice::from_ref(&from_a), &slots, 1, &context());
        distribute_nodes(std::slice::from_ref(&from_b), &slots, 2, &context());
        assert_eq!(slots[DEFAULT_SLOT_NAME].projections(), 2);

        remove_source(&slots, 1, &context());
        assert!(from_a.parent().is_none());
        assert!(from_b.parent().map(|p| p.same(&container)).unwrap_or(false));
        assert_eq!(slots[DEFAULT_SLOT_NAME].projections(), 1);
    }

    #[test]
    fn test_pass_through_forwards_after_claim() {
        // inner component's pass-through slot, not yet linked
        let inner_anchor = Node::comment("slot");
        let pass = ProjectionSlot::pass_through(inner_anchor, "inner".into(), "outer".into());
        let ctx = context();
        let node = Node::element("span");
        pass.add_node(7, &node, &ctx);
        assert_eq!(pass.projections(), 1);

        // outer slot map arrives; pending nodes flush to the destination
        let (container, slots) = host_with_slot("outer");
        let outer = slots["outer"].clone();
        pass.claim(&slots, &ctx);
        assert!(node.parent().map(|p| p.same(&container)).unwrap_or(false));
        assert_eq!(outer.projections(), 1);
    }
}
