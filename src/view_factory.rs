//! View instantiation
//!
//! A `ViewFactory` pairs a compiled instructable template with its
//! instruction table and stamps out live views: clone the template (or
//! reuse it in place for enhance mode), locate every marked target with a
//! single query, and dispatch each instruction in document order.

use crate::binding::{Binding, BindingTarget, LetBinding};
use crate::controller::Controller;
use crate::dom::Node;
use crate::error::{Result, TemplatingError};
use crate::instruction::{
    BehaviorInstruction, SurrogateInstruction, TargetInstruction, CONTENT_ELEMENT,
    PART_ATTRIBUTE, TARGET_CLASS, TARGET_ID_ATTRIBUTE,
};
pub use crate::instruction::ViewCreateInstruction;
use crate::resources::ViewResources;
use crate::shadow_dom::ProjectionSlot;
use crate::view::View;
use crate::view_slot::ViewSlot;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Everything a behavior can resolve while it is being created at a
/// target. The explicit replacement for sentinel-keyed container lookups:
/// each collaborator has a typed resolution method.
#[derive(Clone)]
pub struct CreationContext {
    pub resources: Rc<ViewResources>,
    /// Host element (or attribute-proxying anchor) of the behavior.
    pub element: Option<Node>,
    /// Detached light-DOM content holder of a non-shadow custom element.
    pub content_node: Option<Node>,
    /// Slot at the anchor, for template controllers.
    pub view_slot: Option<ViewSlot>,
    /// The lifted nested factory, for template controllers.
    pub view_factory: Option<Rc<ViewFactory>>,
    pub part_replacements: HashMap<String, Rc<ViewFactory>>,
    /// The view the behavior lives in.
    pub owning_view: Option<View>,
    /// The element's own view, populated before `created` fires.
    pub own_view: Option<View>,
    /// Handle back to the behavior's controller, populated before
    /// `created` fires; the view-model reads its properties through it.
    pub controller: Option<crate::controller::WeakController>,
}

impl CreationContext {
    pub fn new(resources: Rc<ViewResources>) -> Self {
        Self {
            resources,
            element: None,
            content_node: None,
            view_slot: None,
            view_factory: None,
            part_replacements: HashMap::new(),
            owning_view: None,
            own_view: None,
            controller: None,
        }
    }

    pub fn resolve_element(&self) -> Result<Node> {
        self.element
            .clone()
            .ok_or_else(|| TemplatingError::resolution("No element in creation context"))
    }

    pub fn resolve_view_slot(&self) -> Result<ViewSlot> {
        self.view_slot
            .clone()
            .ok_or_else(|| TemplatingError::resolution("No view slot in creation context"))
    }

    pub fn resolve_view_factory(&self) -> Result<Rc<ViewFactory>> {
        self.view_factory
            .clone()
            .ok_or_else(|| TemplatingError::resolution("No view factory in creation context"))
    }
}

pub struct ViewFactory {
    template: Node,
    instructions: HashMap<String, TargetInstruction>,
    surrogate: SurrogateInstruction,
    cache: RefCell<Vec<View>>,
    cache_size: Cell<usize>,
}

impl std::fmt::Debug for ViewFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewFactory")
            .field("instructions", &self.instructions.len())
            .field("cache_size", &self.cache_size.get())
            .finish_non_exhaustive()
    }
}

impl ViewFactory {
    pub(crate) fn new(
        template: Node,
        instructions: HashMap<String, TargetInstruction>,
        surrogate: SurrogateInstruction,
    ) -> ViewFactory {
        ViewFactory {
            template,
            instructions,
            surrogate,
            cache: RefCell::new(Vec::new()),
            cache_size: Cell::new(0),
        }
    }

    pub fn instructions(&self) -> &HashMap<String, TargetInstruction> {
        &self.instructions
    }

    pub fn surrogate(&self) -> &SurrogateInstruction {
        &self.surrogate
    }

    pub fn template(&self) -> &Node {
        &self.template
    }

    /// Bound LIFO view pool. `do_not_override` keeps an earlier explicit
    /// setting in place.
    pub fn set_cache_size(&self, size: usize, do_not_override: bool) {
        if do_not_override && self.cache_size.get() != 0 {
            return;
        }
        self.cache_size.set(size);
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size.get()
    }

    /// Pop the most recently pooled view, in whatever structural state it
    /// was left. Callers must re-bind before use.
    pub fn get_cached_view(&self) -> Option<View> {
        self.cache.borrow_mut().pop()
    }

    pub(crate) fn try_return_to_cache(&self, view: View) -> bool {
        if self.cache.borrow().len() >= self.cache_size.get() {
            return false;
        }
        self.cache.borrow_mut().push(view);
        true
    }

    /// Instantiate one view. Views come from the pool when available;
    /// otherwise the template is cloned (or, for enhance mode, consumed in
    /// place) and every instruction applied in document order.
    pub fn create(
        self: &Rc<Self>,
        resources: &Rc<ViewResources>,
        instruction: ViewCreateInstruction,
    ) -> Result<View> {
        if !instruction.enhance {
            if let Some(view) = self.get_cached_view() {
                if !instruction.suppress_bind {
                    if let Some(scope) = &instruction.scope {
                        view.bind(scope);
                    }
                }
                return Ok(view);
            }
        }

        let content = if instruction.enhance {
            self.template.clone()
        } else {
            self.template.clone_subtree()
        };
        let fragment = Node::fragment();
        fragment.append_fragment(&content);

        let view = View::new(fragment.clone(), resources.clone());
        view.set_factory(self);

        let parts = instruction.part_replacements.clone().unwrap_or_default();
        for target in fragment.find_marked(TARGET_CLASS) {
            let id = target.get_attribute(TARGET_ID_ATTRIBUTE).ok_or_else(|| {
                TemplatingError::InvalidFormat {
                    message: "Marked node carries no target id".to_string(),
                }
            })?;
            let target_instruction = self.instructions.get(&id).ok_or_else(|| {
                TemplatingError::InvalidFormat {
                    message: format!("No instruction recorded for target id {}", id),
                }
            })?;
            self.apply_instruction(&view, &target, target_instruction, resources, &parts)?;
        }

        view.refresh_nodes();
        if !instruction.suppress_bind {
            if let Some(scope) = &instruction.scope {
                view.bind(scope);
            }
        }
        view.refresh_nodes();
        Ok(view)
    }

    fn apply_instruction(
        self: &Rc<Self>,
        view: &View,
        target: &Node,
        instruction: &TargetInstruction,
        resources: &Rc<ViewResources>,
        parts: &HashMap<String, Rc<ViewFactory>>,
    ) -> Result<()> {
        match instruction {
            TargetInstruction::ContentExpression(interpolation) => {
                if let Some(text_node) = target.next_sibling().filter(|n| n.is_text()) {
                    view.add_binding(Rc::new(Binding::text(
                        interpolation.clone(),
                        text_node,
                        resources.clone(),
                    )));
                }
                target.remove();
            }
            TargetInstruction::Slot {
                name,
                destination,
                fallback,
            } => {
                let anchor = Node::anchor_for(target);
                target.replace_with(&anchor);
                // a supplied part replaces the slot's own fallback
                let fallback = target
                    .get_attribute(PART_ATTRIBUTE)
                    .and_then(|part| parts.get(&part).cloned())
                    .or_else(|| fallback.clone());
                let slot = match destination {
                    Some(destination) => ProjectionSlot::pass_through(
                        anchor.clone(),
                        name.clone(),
                        destination.clone(),
                    ),
                    None => ProjectionSlot::shadow(anchor.clone(), name.clone(), fallback),
                };
                anchor.set_payload(slot.clone());
                view.install_slot(name.clone(), slot);
            }
            TargetInstruction::LetElement(expressions) => {
                for expression in expressions {
                    view.add_let_binding(Rc::new(LetBinding::new(
                        expression.clone(),
                        resources.clone(),
                    )));
                }
                target.remove();
            }
            TargetInstruction::Lifted(behavior_instruction) => {
                let anchor = if behavior_instruction.anchor_is_container {
                    target.clone()
                } else {
                    let anchor = Node::anchor_for(target);
                    target.replace_with(&anchor);
                    anchor
                };
                let slot = ViewSlot::new(anchor.clone(), behavior_instruction.anchor_is_container);
                let mut context = CreationContext::new(resources.clone());
                context.element = Some(anchor);
                context.view_slot = Some(slot);
                context.view_factory = behavior_instruction.view_factory.clone();
                context.part_replacements = behavior_instruction.part_replacements.clone();
                context.owning_view = Some(view.clone());
                self.create_behavior(view, &context, behavior_instruction)?;
            }
            TargetInstruction::Behaviors {
                element,
                attributes,
                bindings,
            } => {
                for (attribute, value) in bindings {
                    if let Some(binding) = Binding::from_attribute_value(
                        value,
                        BindingTarget::Attribute(target.clone()),
                        attribute,
                        resources.clone(),
                    ) {
                        view.add_binding(Rc::new(binding));
                    }
                }

                let mut context = CreationContext::new(resources.clone());
                context.element = Some(target.clone());
                context.owning_view = Some(view.clone());

                if let Some(element_instruction) = element {
                    // the synthetic content holder becomes the element's
                    // replaceable content view
                    let content_node = target
                        .children()
                        .into_iter()
                        .find(|c| c.is_element() && c.node_name() == CONTENT_ELEMENT);
                    if let Some(content) = &content_node {
                        content.remove();
                    }
                    let mut element_context = context.clone();
                    element_context.content_node = content_node;
                    element_context.part_replacements =
                        element_instruction.part_replacements.clone();
                    self.create_behavior(view, &element_context, element_instruction)?;
                }
                for attribute_instruction in attributes {
                    self.create_behavior(view, &context, attribute_instruction)?;
                }
            }
        }
        Ok(())
    }

    fn create_behavior(
        self: &Rc<Self>,
        view: &View,
        context: &CreationContext,
        instruction: &BehaviorInstruction,
    ) -> Result<Controller> {
        let controller = instruction.behavior.create(context, instruction)?;
        view.add_controller(controller.clone());
        controller.created(context);
        Ok(controller)
    }

    /// Merge surrogate attributes onto a component's host element; class
    /// and style concatenate rather than overwrite. Surrogate bindings are
    /// attached to the component's own view.
    pub fn apply_surrogate_to(
        &self,
        host: &Node,
        view: &View,
        resources: &Rc<ViewResources>,
    ) {
        for (name, value) in &self.surrogate.values {
            match name.as_str() {
                "class" => host.add_class(value),
                "style" => {
                    let merged = match host.get_attribute("style") {
                        Some(existing) if !existing.is_empty() => {
                            format!("{}; {}", existing.trim_end_matches(';'), value)
                        }
                        _ => value.clone(),
                    };
                    host.set_attribute("style", &merged);
                }
                _ => {
                    if !host.has_attribute(name) {
                        host.set_attribute(name, value);
                    }
                }
            }
        }
        for (name, value) in &self.surrogate.bindings {
            if let Some(binding) = Binding::from_attribute_value(
                value,
                BindingTarget::Attribute(host.clone()),
                name,
                resources.clone(),
            ) {
                view.add_binding(Rc::new(binding));
            }
        }
    }
}
