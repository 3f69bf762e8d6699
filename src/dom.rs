//! Headless DOM abstraction for the templating core
//!
//! The compiler and the instantiation pipeline never touch a live document;
//! they operate on this node tree, which a host embeds or mirrors. Nodes are
//! cheap shared handles, so views, slots and controllers can all point at the
//! same underlying element.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Elements that never carry children in serialized markup.
pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
    "param", "source", "track", "wbr",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Comment,
    Fragment,
}

/// Explicit child-mutation observer. Registered against a single node;
/// notified synchronously after every child-list mutation of that node.
pub trait ChildObserver {
    fn children_changed(&self, node: &Node, added: &[Node], removed: &[Node]);
}

struct NodeData {
    kind: NodeKind,
    name: String,
    text: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
    parent: Weak<RefCell<NodeData>>,
    /// Anchor comments keep a handle to the element they replaced so that
    /// attribute access keeps working for behaviors created afterward.
    proxy: Option<Node>,
    /// Opaque runtime payload (projection slots tag their anchors here).
    payload: Option<Rc<dyn Any>>,
    observers: Vec<Rc<dyn ChildObserver>>,
}

impl NodeData {
    fn new(kind: NodeKind, name: &str, text: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            text: text.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
            parent: Weak::new(),
            proxy: None,
            payload: None,
            observers: Vec::new(),
        }
    }
}

/// Shared handle to one DOM node. Cloning the handle does not clone the node.
#[derive(Clone)]
pub struct Node(Rc<RefCell<NodeData>>);

impl Node {
    pub fn element(name: &str) -> Node {
        Node(Rc::new(RefCell::new(NodeData::new(
            NodeKind::Element,
            &name.to_ascii_lowercase(),
            "",
        ))))
    }

    pub fn text(content: &str) -> Node {
        Node(Rc::new(RefCell::new(NodeData::new(NodeKind::Text, "", content))))
    }

    pub fn comment(content: &str) -> Node {
        Node(Rc::new(RefCell::new(NodeData::new(
            NodeKind::Comment,
            "",
            content,
        ))))
    }

    pub fn fragment() -> Node {
        Node(Rc::new(RefCell::new(NodeData::new(NodeKind::Fragment, "", ""))))
    }

    /// Zero-width anchor comment standing in for `original`. Attribute
    /// access on the anchor is forwarded to the original element.
    pub fn anchor_for(original: &Node) -> Node {
        let anchor = Node::comment("anchor");
        anchor.0.borrow_mut().proxy = Some(original.clone());
        anchor
    }

    pub fn kind(&self) -> NodeKind {
        self.0.borrow().kind
    }

    pub fn is_element(&self) -> bool {
        self.kind() == NodeKind::Element
    }

    pub fn is_text(&self) -> bool {
        self.kind() == NodeKind::Text
    }

    pub fn is_comment(&self) -> bool {
        self.kind() == NodeKind::Comment
    }

    pub fn is_fragment(&self) -> bool {
        self.kind() == NodeKind::Fragment
    }

    /// Lowercased tag name; empty for non-elements.
    pub fn node_name(&self) -> String {
        self.0.borrow().name.clone()
    }

    pub fn text_content(&self) -> String {
        let data = self.0.borrow();
        match data.kind {
            NodeKind::Text | NodeKind::Comment => data.text.clone(),
            _ => {
                drop(data);
                self.children()
                    .iter()
                    .map(|c| c.text_content())
                    .collect::<Vec<_>>()
                    .concat()
            }
        }
    }

    pub fn set_text_content(&self, content: &str) {
        self.0.borrow_mut().text = content.to_string();
    }

    pub fn is_whitespace_text(&self) -> bool {
        let data = self.0.borrow();
        data.kind == NodeKind::Text && data.text.trim().is_empty()
    }

    /// Identity comparison (same underlying node, not structural equality).
    pub fn same(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Stable identity key, usable as a map key for per-node bookkeeping.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    // ---- attributes ----------------------------------------------------

    fn attribute_target(&self) -> Node {
        let proxy = self.0.borrow().proxy.clone();
        proxy.unwrap_or_else(|| self.clone())
    }

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        let target = self.attribute_target();
        let data = target.0.borrow();
        data.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.get_attribute(name).is_some()
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        let target = self.attribute_target();
        let mut data = target.0.borrow_mut();
        match data.attributes.iter().position(|(k, _)| k == name) {
            Some(index) => data.attributes[index].1 = value.to_string(),
            None => data.attributes.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_attribute(&self, name: &str) {
        let target = self.attribute_target();
        let mut data = target.0.borrow_mut();
        data.attributes.retain(|(k, _)| k != name);
    }

    /// Snapshot of the attribute list in document order.
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.attribute_target().0.borrow().attributes.clone()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.get_attribute("class")
            .map(|v| v.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn add_class(&self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let merged = match self.get_attribute("class") {
            Some(existing) if !existing.is_empty() => format!("{} {}", existing, class),
            _ => class.to_string(),
        };
        self.set_attribute("class", &merged);
    }

    // ---- tree structure ------------------------------------------------

    pub fn parent(&self) -> Option<Node> {
        self.0.borrow().parent.upgrade().map(Node)
    }

    pub fn children(&self) -> Vec<Node> {
        self.0.borrow().children.clone()
    }

    pub fn child_count(&self) -> usize {
        self.0.borrow().children.len()
    }

    pub fn first_child(&self) -> Option<Node> {
        self.0.borrow().children.first().cloned()
    }

    pub fn last_child(&self) -> Option<Node> {
        self.0.borrow().children.last().cloned()
    }

    fn index_in_parent(&self) -> Option<(Node, usize)> {
        let parent = self.parent()?;
        let index = parent
            .0
            .borrow()
            .children
            .iter()
            .position(|c| c.same(self))?;
        Some((parent, index))
    }

    pub fn next_sibling(&self) -> Option<Node> {
        let (parent, index) = self.index_in_parent()?;
        let sibling = parent.0.borrow().children.get(index + 1).cloned();
        sibling
    }

    pub fn previous_sibling(&self) -> Option<Node> {
        let (parent, index) = self.index_in_parent()?;
        if index == 0 {
            return None;
        }
        let sibling = parent.0.borrow().children.get(index - 1).cloned();
        sibling
    }

    /// Detach from the current parent without observer notification on self.
    fn detach(&self) {
        if let Some((parent, index)) = self.index_in_parent() {
            parent.0.borrow_mut().children.remove(index);
            self.0.borrow_mut().parent = Weak::new();
            parent.notify_observers(&[], std::slice::from_ref(self));
        }
    }

    pub fn append_child(&self, child: &Node) {
        child.detach();
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        self.0.borrow_mut().children.push(child.clone());
        self.notify_observers(std::slice::from_ref(child), &[]);
    }

    /// Insert `new` into this node's child list immediately before
    /// `reference`; appends when `reference` is `None`.
    pub fn insert_before(&self, new: &Node, reference: Option<&Node>) {
        new.detach();
        let index = match reference {
            Some(r) => self
                .0
                .borrow()
                .children
                .iter()
                .position(|c| c.same(r))
                .unwrap_or_else(|| self.0.borrow().children.len()),
            None => self.0.borrow().children.len(),
        };
        new.0.borrow_mut().parent = Rc::downgrade(&self.0);
        self.0.borrow_mut().children.insert(index, new.clone());
        self.notify_observers(std::slice::from_ref(new), &[]);
    }

    pub fn remove_child(&self, child: &Node) {
        if child.parent().map(|p| p.same(self)).unwrap_or(false) {
            child.detach();
        }
    }

    /// Remove this node from its parent, if any.
    pub fn remove(&self) {
        self.detach();
    }

    /// Swap this node for `replacement` at the same position.
    pub fn replace_with(&self, replacement: &Node) {
        let parent = match self.parent() {
            Some(parent) => parent,
            None => return,
        };
        replacement.detach();
        let index = match parent
            .0
            .borrow()
            .children
            .iter()
            .position(|c| c.same(self))
        {
            Some(index) => index,
            None => return,
        };
        {
            let mut data = parent.0.borrow_mut();
            data.children[index] = replacement.clone();
        }
        replacement.0.borrow_mut().parent = Rc::downgrade(&parent.0);
        self.0.borrow_mut().parent = Weak::new();
        parent.notify_observers(
            std::slice::from_ref(replacement),
            std::slice::from_ref(self),
        );
    }

    /// Move all children of `fragment` into this node, preserving order.
    pub fn append_fragment(&self, fragment: &Node) {
        for child in fragment.children() {
            self.append_child(&child);
        }
    }

    /// Deep copy. Attribute order round-trips exactly; anchor proxies and
    /// observers do not survive the copy.
    pub fn clone_subtree(&self) -> Node {
        let data = self.0.borrow();
        let copy = Node(Rc::new(RefCell::new(NodeData::new(
            data.kind, &data.name, &data.text,
        ))));
        copy.0.borrow_mut().attributes = data.attributes.clone();
        let children: Vec<Node> = data.children.clone();
        drop(data);
        for child in children {
            copy.append_child(&child.clone_subtree());
        }
        copy
    }

    /// Depth-first, document-order collection of elements carrying `class`.
    pub fn find_marked(&self, class: &str) -> Vec<Node> {
        let mut out = Vec::new();
        self.collect_marked(class, &mut out);
        out
    }

    fn collect_marked(&self, class: &str, out: &mut Vec<Node>) {
        if self.is_element() && self.has_class(class) {
            out.push(self.clone());
        }
        for child in self.children() {
            child.collect_marked(class, out);
        }
    }

    // ---- payload -------------------------------------------------------

    pub fn set_payload(&self, payload: Rc<dyn Any>) {
        self.0.borrow_mut().payload = Some(payload);
    }

    pub fn payload(&self) -> Option<Rc<dyn Any>> {
        self.0.borrow().payload.clone()
    }

    // ---- observation ---------------------------------------------------

    pub fn observe_children(&self, observer: Rc<dyn ChildObserver>) {
        self.0.borrow_mut().observers.push(observer);
    }

    pub fn clear_child_observers(&self) {
        self.0.borrow_mut().observers.clear();
    }

    fn notify_observers(&self, added: &[Node], removed: &[Node]) {
        let observers: Vec<Rc<dyn ChildObserver>> = self.0.borrow().observers.clone();
        for observer in observers {
            observer.children_changed(self, added, removed);
        }
    }

    // ---- serialization -------------------------------------------------

    /// Serialize the subtree back to markup, for diagnostics and the CLI.
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        let data = self.0.borrow();
        match data.kind {
            NodeKind::Text => out.push_str(&data.text),
            NodeKind::Comment => {
                out.push_str("<!--");
                out.push_str(&data.text);
                out.push_str("-->");
            }
            NodeKind::Fragment => {
                let children = data.children.clone();
                drop(data);
                for child in children {
                    child.write_html(out);
                }
            }
            NodeKind::Element => {
                out.push('<');
                out.push_str(&data.name);
                for (key, value) in &data.attributes {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(value);
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&data.name.as_str()) {
                    return;
                }
                let name = data.name.clone();
                let children = data.children.clone();
                drop(data);
                for child in children {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(&name);
                out.push('>');
            }
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.borrow();
        match data.kind {
            NodeKind::Element => write!(f, "<{}> ({} children)", data.name, data.children.len()),
            NodeKind::Text => write!(f, "#text {:?}", data.text),
            NodeKind::Comment => write!(f, "#comment {:?}", data.text),
            NodeKind::Fragment => write!(f, "#fragment ({} children)", data.children.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_tree_mutation() {
        let parent = Node::element("div");
        let a = Node::text("a");
        let b = Node::element("span");
        parent.append_child(&a);
        parent.append_child(&b);
        assert_eq!(parent.child_count(), 2);
        assert!(a.next_sibling().unwrap().same(&b));
        assert!(b.previous_sibling().unwrap().same(&a));

        let c = Node::element("em");
        parent.insert_before(&c, Some(&b));
        assert!(a.next_sibling().unwrap().same(&c));

        c.remove();
        assert_eq!(parent.child_count(), 2);
        assert!(c.parent().is_none());
    }

    #[test]
    fn test_clone_subtree_is_independent() {
        let root = Node::element("div");
        root.set_attribute("class", "au-target");
        root.set_attribute("au-target-id", "0");
        let child = Node::text("hello");
        root.append_child(&child);

        let copy = root.clone_subtree();
        assert_eq!(copy.get_attribute("au-target-id").as_deref(), Some("0"));
        assert_eq!(copy.child_count(), 1);

        copy.set_attribute("au-target-id", "9");
        assert_eq!(root.get_attribute("au-target-id").as_deref(), Some("0"));
    }

    #[test]
    fn test_anchor_proxies_attributes() {
        let element = Node::element("input");
        element.set_attribute("placeholder", "name");
        let anchor = Node::anchor_for(&element);

        assert!(anchor.has_attribute("placeholder"));
        anchor.set_attribute("title", "t");
        assert_eq!(element.get_attribute("title").as_deref(), Some("t"));
    }

    #[test]
    fn test_find_marked_document_order() {
        let root = Node::element("div");
        let first = Node::element("span");
        first.add_class("au-target");
        let nested = Node::element("b");
        nested.add_class("au-target");
        first.append_child(&nested);
        let second = Node::element("i");
        second.add_class("au-target");
        root.append_child(&first);
        root.append_child(&second);

        let marked = root.find_marked("au-target");
        assert_eq!(marked.len(), 3);
        assert!(marked[0].same(&first));
        assert!(marked[1].same(&nested));
        assert!(marked[2].same(&second));
    }

    #[test]
    fn test_child_observer_notified() {
        struct Counter {
            added: Cell<usize>,
            removed: Cell<usize>,
        }
        impl ChildObserver for Counter {
            fn children_changed(&self, _node: &Node, added: &[Node], removed: &[Node]) {
                self.added.set(self.added.get() + added.len());
                self.removed.set(self.removed.get() + removed.len());
            }
        }

        let parent = Node::element("ul");
        let counter = Rc::new(Counter {
            added: Cell::new(0),
            removed: Cell::new(0),
        });
        parent.observe_children(counter.clone());

        let li = Node::element("li");
        parent.append_child(&li);
        li.remove();
        assert_eq!(counter.added.get(), 1);
        assert_eq!(counter.removed.get(), 1);
    }

    #[test]
    fn test_outer_html_round_trip_markers() {
        let div = Node::element("div");
        div.set_attribute("class", "au-target");
        div.append_child(&Node::text("x"));
        assert_eq!(div.outer_html(), "<div class=\"au-target\">x</div>");
    }
}
