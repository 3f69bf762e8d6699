//! Animation seam
//!
//! View-slot insert/remove operations route through this contract; an
//! operation is complete only once the animator call returns. The default
//! implementation animates nothing.

use crate::dom::Node;

/// Class marking elements that participate in enter/leave animations.
pub const ANIMATE_CLASS: &str = "au-animate";

/// Host-provided animation backend. Each call returns whether an animation
/// actually ran.
pub trait Animator {
    fn enter(&self, _element: &Node) -> bool {
        false
    }

    fn leave(&self, _element: &Node) -> bool {
        false
    }

    fn add_class(&self, element: &Node, class: &str) -> bool {
        element.add_class(class);
        false
    }

    fn remove_class(&self, element: &Node, class: &str) -> bool {
        if !element.has_class(class) {
            return false;
        }
        let remaining: Vec<String> = element
            .get_attribute("class")
            .unwrap_or_default()
            .split_whitespace()
            .filter(|c| *c != class)
            .map(|c| c.to_string())
            .collect();
        element.set_attribute("class", &remaining.join(" "));
        true
    }
}

/// No-op animator used unless the host installs one.
pub struct NoopAnimator;

impl Animator for NoopAnimator {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_animator_class_handling() {
        let animator = NoopAnimator;
        let element = Node::element("div");
        animator.add_class(&element, "x");
        assert!(element.has_class("x"));
        assert!(animator.remove_class(&element, "x"));
        assert!(!element.has_class("x"));
        assert!(!animator.remove_class(&element, "x"));
    }
}
