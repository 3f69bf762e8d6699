//! Compile-time instruction model
//!
//! The compiler's output is a rewritten "instructable" template plus a flat
//! table of `TargetInstruction`s keyed by injected marker ids. Instructions
//! are immutable once compilation finishes; the factory only reads them.

use crate::behavior::HtmlBehaviorResource;
use crate::binding::{AttributeValue, Interpolation, LetExpression};
use crate::view_factory::ViewFactory;
use std::collections::HashMap;
use std::rc::Rc;

/// Marker class stamped on every instructable node. The instantiation phase
/// re-locates all targets with a single query for this class.
pub const TARGET_CLASS: &str = "au-target";

/// Per-node attribute correlating a cloned node back to its compile-time
/// instruction. Must round-trip exactly through node cloning.
pub const TARGET_ID_ATTRIBUTE: &str = "au-target-id";

/// Synthetic wrapper for a non-shadow custom element's light DOM content.
pub const CONTENT_ELEMENT: &str = "au-content";

/// Marker element inserted before interpolated text nodes.
pub const MARKER_ELEMENT: &str = "au-marker";

/// Attribute tagging a child template as a named part replacement.
pub const REPLACE_PART_ATTRIBUTE: &str = "replace-part";

/// Attribute naming the part a slot's fallback replaces.
pub const PART_ATTRIBUTE: &str = "part";

/// Describes how to construct one behavior instance at a target node.
#[derive(Clone)]
pub struct BehaviorInstruction {
    pub behavior: Rc<HtmlBehaviorResource>,
    /// Property assignments in declaration (document) order.
    pub attributes: Vec<(String, AttributeValue)>,
    /// Nested factory: the lifted view for template controllers.
    pub view_factory: Option<Rc<ViewFactory>>,
    /// Named `replace-part` templates extracted from the element's content.
    pub part_replacements: HashMap<String, Rc<ViewFactory>>,
    /// Whether the target node itself can anchor lifted content (comment
    /// anchors qualify; plain elements are swapped at instantiation).
    pub anchor_is_container: bool,
}

impl BehaviorInstruction {
    pub fn new(behavior: Rc<HtmlBehaviorResource>) -> Self {
        Self {
            behavior,
            attributes: Vec::new(),
            view_factory: None,
            part_replacements: HashMap::new(),
            anchor_is_container: false,
        }
    }

    pub fn set_attribute(&mut self, property: &str, value: AttributeValue) {
        match self.attributes.iter().position(|(name, _)| name == property) {
            Some(index) => self.attributes[index].1 = value,
            None => self.attributes.push((property.to_string(), value)),
        }
    }

    pub fn attribute(&self, property: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }
}

/// What static compilation decided for one marked node.
pub enum TargetInstruction {
    /// Text interpolation anchored at a marker element.
    ContentExpression(Interpolation),
    /// A `<slot>` rewritten into a projection destination.
    Slot {
        name: String,
        /// Pass-through destination one level up, from the `slot` attribute
        /// on the slot element itself.
        destination: Option<String>,
        fallback: Option<Rc<ViewFactory>>,
    },
    /// `<let>` element: scope assignments with no DOM footprint.
    LetElement(Vec<LetExpression>),
    /// A lifted template controller; always the node's only instruction.
    Lifted(BehaviorInstruction),
    /// Ordinary target: optional element behavior, attribute behaviors and
    /// plain DOM-attribute bindings.
    Behaviors {
        element: Option<BehaviorInstruction>,
        attributes: Vec<BehaviorInstruction>,
        bindings: Vec<(String, AttributeValue)>,
    },
}

impl TargetInstruction {
    pub fn behavior_count(&self) -> usize {
        match self {
            TargetInstruction::Lifted(_) => 1,
            TargetInstruction::Behaviors {
                element,
                attributes,
                ..
            } => attributes.len() + usize::from(element.is_some()),
            _ => 0,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            TargetInstruction::ContentExpression(_) => "content-expression",
            TargetInstruction::Slot { .. } => "slot",
            TargetInstruction::LetElement(_) => "let",
            TargetInstruction::Lifted(_) => "template-controller",
            TargetInstruction::Behaviors { .. } => "behaviors",
        }
    }
}

/// Surrogate attributes: compiled from the template's own root element and
/// merged onto the eventual host.
#[derive(Clone, Default)]
pub struct SurrogateInstruction {
    /// Literal attribute values; class/style merge instead of overwrite.
    pub values: Vec<(String, String)>,
    /// Bound surrogate attributes.
    pub bindings: Vec<(String, AttributeValue)>,
}

impl SurrogateInstruction {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.bindings.is_empty()
    }
}

/// Options for one compile invocation.
#[derive(Clone, Default)]
pub struct ViewCompileInstruction {
    /// Compile root-element attributes as surrogates (component templates).
    pub compile_surrogate: bool,
    /// The element's own declared slots receive distributed content.
    pub target_shadow_dom: bool,
    /// Module id recorded for diagnostics and registry keys.
    pub associated_module_id: Option<String>,
}

impl ViewCompileInstruction {
    pub fn for_component() -> Self {
        Self {
            compile_surrogate: true,
            ..Default::default()
        }
    }
}

/// Options for one `ViewFactory::create` invocation.
#[derive(Clone, Default)]
pub struct ViewCreateInstruction {
    /// Create without binding; the caller binds later.
    pub suppress_bind: bool,
    /// Retrofit an already-rendered fragment in place instead of cloning.
    pub enhance: bool,
    /// Part replacements supplied by the consuming element.
    pub part_replacements: Option<HashMap<String, Rc<ViewFactory>>>,
    /// Binding context applied after creation unless binding is suppressed.
    pub scope: Option<crate::binding::Scope>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::HtmlBehaviorResource;

    #[test]
    fn test_behavior_instruction_attribute_dedupe() {
        let mut resource = HtmlBehaviorResource::attribute("x");
        resource.initialize().unwrap();
        let mut instruction = BehaviorInstruction::new(Rc::new(resource));
        instruction.set_attribute("value", AttributeValue::Literal("a".into()));
        instruction.set_attribute("value", AttributeValue::Literal("b".into()));
        assert_eq!(instruction.attributes.len(), 1);
        assert!(matches!(
            instruction.attribute("value"),
            Some(AttributeValue::Literal(v)) if v == "b"
        ));
    }

    #[test]
    fn test_target_instruction_counts() {
        let mut resource = HtmlBehaviorResource::attribute("x");
        resource.initialize().unwrap();
        let resource = Rc::new(resource);
        let instruction = TargetInstruction::Behaviors {
            element: None,
            attributes: vec![BehaviorInstruction::new(resource.clone())],
            bindings: Vec::new(),
        };
        assert_eq!(instruction.behavior_count(), 1);
        assert_eq!(instruction.kind_name(), "behaviors");

        let lifted = TargetInstruction::Lifted(BehaviorInstruction::new(resource));
        assert_eq!(lifted.behavior_count(), 1);
    }
}
