//! Behavior resources: custom elements, custom attributes and template
//! controllers
//!
//! One `HtmlBehaviorResource` exists per behavior type, registered once and
//! reused for every instance. It owns the bindable property declarations,
//! the content-processing policy and the lifecycle capability flags, and it
//! stamps out live [`Controller`](crate::controller::Controller)s.

use crate::bindable::BindableProperty;
use crate::binding::Value;
use crate::controller::Controller;
use crate::dom::Node;
use crate::error::{Result, TemplatingError};
use crate::instruction::BehaviorInstruction;
use crate::resources::ViewResources;
use crate::utils::hyphenate;
use crate::view_factory::{CreationContext, ViewFactory};
use bitflags::bitflags;
use std::cell::RefCell;
use std::rc::Rc;

bitflags! {
    /// Which lifecycle hooks a view-model type implements. Computed once at
    /// behavior registration from a probe instance, never via per-instance
    /// inspection.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LifecycleHooks: u16 {
        const CREATED          = 1 << 0;
        const BIND             = 1 << 1;
        const UNBIND           = 1 << 2;
        const ATTACHED         = 1 << 3;
        const DETACHED         = 1 << 4;
        const PROPERTY_CHANGED = 1 << 5;
        const CHILDREN_CHANGED = 1 << 6;
    }
}

/// A component's view-model. Hook defaults are no-ops; `hooks()` must
/// report which ones the type actually implements.
pub trait ViewModel: 'static {
    fn hooks(&self) -> LifecycleHooks {
        LifecycleHooks::empty()
    }

    /// Declared change handlers must be reported here; a bindable property
    /// naming an unreported handler is a fatal configuration error.
    fn has_change_handler(&self, _handler: &str) -> bool {
        false
    }

    fn created(&mut self, _context: &CreationContext) {}

    fn bind(&mut self, _scope: &crate::binding::Scope) {}

    fn unbind(&mut self) {}

    fn attached(&mut self) {}

    fn detached(&mut self) {}

    fn property_changed(&mut self, _name: &str, _new_value: &Value, _old_value: &Value) {}

    fn children_changed(&mut self, _children: &[Node]) {}
}

/// Placeholder view-model for behaviors registered without one.
pub struct DefaultViewModel;

impl ViewModel for DefaultViewModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorKind {
    Element,
    Attribute,
}

/// How an element behavior obtains its own view.
pub enum ViewStrategy {
    /// No view (attribute behaviors, containerless elements without one).
    None,
    /// Markup compiled lazily on first instantiation.
    InlineMarkup(String),
    /// Pre-compiled factory.
    Factory(Rc<ViewFactory>),
}

pub type ViewModelFactory = Box<dyn Fn() -> Box<dyn ViewModel>>;

/// Template-time content hook. Returning `false` opts the element out of
/// default content processing. Errors are recovered by the compiler.
pub type ProcessContentHook =
    Box<dyn Fn(&ViewResources, &Node, &mut BehaviorInstruction) -> Result<bool>>;

/// Template-time attribute hook, applied before attribute classification.
pub type ProcessAttributesHook = Box<dyn Fn(&ViewResources, &Node) -> Result<()>>;

/// Metadata and factory for one custom element or custom attribute type.
pub struct HtmlBehaviorResource {
    pub kind: BehaviorKind,
    /// Normalized (hyphenated lowercase) resource name.
    pub name: String,
    pub properties: Vec<BindableProperty>,
    /// Template controllers lift their node into a nested view factory.
    pub lifts_content: bool,
    pub uses_shadow_dom: bool,
    /// The primary property intercepts all unrecognized attributes as
    /// ad-hoc dynamic properties.
    pub dynamic_options: bool,
    /// Tag name filter for explicit child tracking; `*` matches any element.
    pub track_children: Option<String>,
    pub process_content: Option<ProcessContentHook>,
    pub process_attributes: Option<ProcessAttributesHook>,
    /// Capability flags of the view-model type, captured at registration.
    pub hooks: LifecycleHooks,
    view_strategy: ViewStrategy,
    resolved_factory: RefCell<Option<Rc<ViewFactory>>>,
    view_model_factory: ViewModelFactory,
}

impl HtmlBehaviorResource {
    fn new(kind: BehaviorKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            properties: Vec::new(),
            lifts_content: false,
            uses_shadow_dom: false,
            dynamic_options: false,
            track_children: None,
            process_content: None,
            process_attributes: None,
            hooks: LifecycleHooks::empty(),
            view_strategy: ViewStrategy::None,
            resolved_factory: RefCell::new(None),
            view_model_factory: Box::new(|| Box::new(DefaultViewModel)),
        }
    }

    pub fn element(name: &str) -> Self {
        Self::new(BehaviorKind::Element, name)
    }

    pub fn attribute(name: &str) -> Self {
        Self::new(BehaviorKind::Attribute, name)
    }

    /// A template controller: an attribute behavior that lifts its host
    /// element (and subtree) into a nested view factory it controls.
    pub fn template_controller(name: &str) -> Self {
        let mut resource = Self::new(BehaviorKind::Attribute, name);
        resource.lifts_content = true;
        resource
    }

    pub fn with_bindable(mut self, property: BindableProperty) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_view_model<F, T>(mut self, factory: F) -> Self
    where
        F: Fn() -> T + 'static,
        T: ViewModel,
    {
        self.view_model_factory = Box::new(move || Box::new(factory()));
        self
    }

    pub fn with_inline_view(mut self, markup: &str) -> Self {
        self.view_strategy = ViewStrategy::InlineMarkup(markup.to_string());
        self
    }

    pub fn with_view_factory(mut self, factory: Rc<ViewFactory>) -> Self {
        self.view_strategy = ViewStrategy::Factory(factory);
        self
    }

    pub fn with_shadow_dom(mut self) -> Self {
        self.uses_shadow_dom = true;
        self
    }

    pub fn with_dynamic_options(mut self) -> Self {
        self.dynamic_options = true;
        self
    }

    pub fn with_process_content(mut self, hook: ProcessContentHook) -> Self {
        self.process_content = Some(hook);
        self
    }

    pub fn with_process_attributes(mut self, hook: ProcessAttributesHook) -> Self {
        self.process_attributes = Some(hook);
        self
    }

    pub fn tracking_children(mut self, selector: &str) -> Self {
        self.track_children = Some(selector.to_string());
        self
    }

    /// True when the behavior declares a view source of its own.
    pub fn has_view(&self) -> bool {
        !matches!(self.view_strategy, ViewStrategy::None)
    }

    /// One-time setup performed at registration: name normalization, the
    /// implicit `value` property for bare attributes, primary-property
    /// validation and the capability-flag probe.
    pub(crate) fn initialize(&mut self) -> Result<()> {
        self.name = hyphenate(&self.name).to_ascii_lowercase();

        if self.kind == BehaviorKind::Attribute && self.properties.is_empty() {
            self.properties.push(BindableProperty::new("value").primary());
        }

        let primary_count = self.properties.iter().filter(|p| p.primary).count();
        if primary_count > 1 {
            return Err(TemplatingError::configuration(format!(
                "Behavior '{}' declares {} primary properties; at most one is allowed",
                self.name, primary_count
            )));
        }
        if self.dynamic_options && primary_count == 0 {
            return Err(TemplatingError::configuration(format!(
                "Dynamic-options behavior '{}' needs a primary property",
                self.name
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for property in &self.properties {
            if !seen.insert(property.name.clone()) {
                return Err(TemplatingError::configuration(format!(
                    "Behavior '{}' declares property '{}' more than once",
                    self.name, property.name
                )));
            }
        }

        let probe = (self.view_model_factory)();
        self.hooks = probe.hooks();
        Ok(())
    }

    pub fn primary_property(&self) -> Option<&BindableProperty> {
        self.properties.iter().find(|p| p.primary)
    }

    pub fn property(&self, name: &str) -> Option<&BindableProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn property_for_attribute(&self, attribute: &str) -> Option<&BindableProperty> {
        self.properties.iter().find(|p| p.attribute == attribute)
    }

    pub fn new_view_model(&self) -> Box<dyn ViewModel> {
        (self.view_model_factory)()
    }

    /// Resolve the behavior's own view factory, compiling inline markup on
    /// first use and caching the result for every later instance.
    pub fn ensure_view_factory(
        self: &Rc<Self>,
        resources: &Rc<ViewResources>,
    ) -> Result<Option<Rc<ViewFactory>>> {
        match &self.view_strategy {
            ViewStrategy::None => Ok(None),
            ViewStrategy::Factory(factory) => Ok(Some(factory.clone())),
            ViewStrategy::InlineMarkup(markup) => {
                if let Some(factory) = self.resolved_factory.borrow().as_ref() {
                    return Ok(Some(factory.clone()));
                }
                let compiler = crate::view_compiler::ViewCompiler::new();
                let factory = compiler.compile_markup(markup, resources, None)?;
                *self.resolved_factory.borrow_mut() = Some(factory.clone());
                Ok(Some(factory))
            }
        }
    }

    /// Instantiate the behavior at a target, producing its live controller.
    pub fn create(
        self: &Rc<Self>,
        context: &CreationContext,
        instruction: &BehaviorInstruction,
    ) -> Result<Controller> {
        Controller::create(self.clone(), context, instruction)
    }
}

impl std::fmt::Debug for HtmlBehaviorResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlBehaviorResource")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("properties", &self.properties.len())
            .field("lifts_content", &self.lifts_content)
            .field("uses_shadow_dom", &self.uses_shadow_dom)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingMode;

    #[test]
    fn test_attribute_gains_implicit_value_property() {
        let mut resource = HtmlBehaviorResource::attribute("highlight");
        resource.initialize().unwrap();
        let property = resource.primary_property().unwrap();
        assert_eq!(property.name, "value");
        assert_eq!(property.attribute, "value");
    }

    #[test]
    fn test_uppercase_name_is_hyphenated() {
        let mut resource = HtmlBehaviorResource::element("myButton");
        resource.initialize().unwrap();
        assert_eq!(resource.name, "my-button");
    }

    #[test]
    fn test_duplicate_primary_rejected() {
        let mut resource = HtmlBehaviorResource::attribute("tool")
            .with_bindable(BindableProperty::new("a").primary())
            .with_bindable(BindableProperty::new("b").primary());
        assert!(resource.initialize().is_err());
    }

    #[test]
    fn test_hooks_probe() {
        struct Hooked;
        impl ViewModel for Hooked {
            fn hooks(&self) -> LifecycleHooks {
                LifecycleHooks::BIND | LifecycleHooks::ATTACHED
            }
        }

        let mut resource = HtmlBehaviorResource::element("hooked").with_view_model(|| Hooked);
        resource.initialize().unwrap();
        assert!(resource.hooks.contains(LifecycleHooks::BIND));
        assert!(!resource.hooks.contains(LifecycleHooks::DETACHED));
    }

    #[test]
    fn test_property_lookup_by_attribute() {
        let mut resource = HtmlBehaviorResource::element("card").with_bindable(
            BindableProperty::new("headerText").with_mode(BindingMode::TwoWay),
        );
        resource.initialize().unwrap();
        let property = resource.property_for_attribute("header-text").unwrap();
        assert_eq!(property.name, "headerText");
        assert_eq!(property.default_binding_mode, BindingMode::TwoWay);
    }
}
