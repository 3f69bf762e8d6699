//! Lexically scoped view resource registry
//!
//! Each view owns (or shares) a `ViewResources`; lookups fall back to the
//! parent registry, giving templates lexical scoping of custom elements,
//! custom attributes, value converters and binding behaviors.

use crate::behavior::{BehaviorKind, HtmlBehaviorResource};
use crate::bindable::TaskQueue;
use crate::binding::{BindingBehavior, BindingLanguage, DefaultBindingLanguage, ValueConverter};
use crate::error::{Result, TemplatingError};
use crate::utils::is_valid_resource_name;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub struct ViewResources {
    parent: Option<Rc<ViewResources>>,
    binding_language: RefCell<Rc<dyn BindingLanguage>>,
    task_queue: Rc<TaskQueue>,
    elements: RefCell<HashMap<String, Rc<HtmlBehaviorResource>>>,
    attributes: RefCell<HashMap<String, Rc<HtmlBehaviorResource>>>,
    attribute_aliases: RefCell<HashMap<String, String>>,
    value_converters: RefCell<HashMap<String, Rc<dyn ValueConverter>>>,
    binding_behaviors: RefCell<HashMap<String, Rc<dyn BindingBehavior>>>,
}

impl ViewResources {
    /// Root registry with the default binding language and a fresh task
    /// queue.
    pub fn root() -> ViewResources {
        ViewResources {
            parent: None,
            binding_language: RefCell::new(Rc::new(DefaultBindingLanguage::new())),
            task_queue: TaskQueue::new(),
            elements: RefCell::new(HashMap::new()),
            attributes: RefCell::new(HashMap::new()),
            attribute_aliases: RefCell::new(HashMap::new()),
            value_converters: RefCell::new(HashMap::new()),
            binding_behaviors: RefCell::new(HashMap::new()),
        }
    }

    /// Child registry scoped under `parent`; binding language and task
    /// queue are shared.
    pub fn child(parent: Rc<ViewResources>) -> ViewResources {
        ViewResources {
            binding_language: RefCell::new(parent.binding_language()),
            task_queue: parent.task_queue.clone(),
            parent: Some(parent),
            elements: RefCell::new(HashMap::new()),
            attributes: RefCell::new(HashMap::new()),
            attribute_aliases: RefCell::new(HashMap::new()),
            value_converters: RefCell::new(HashMap::new()),
            binding_behaviors: RefCell::new(HashMap::new()),
        }
    }

    pub fn binding_language(&self) -> Rc<dyn BindingLanguage> {
        self.binding_language.borrow().clone()
    }

    pub fn set_binding_language(&self, language: Rc<dyn BindingLanguage>) {
        *self.binding_language.borrow_mut() = language;
    }

    pub fn task_queue(&self) -> Rc<TaskQueue> {
        self.task_queue.clone()
    }

    fn validate_registration(
        resource: &HtmlBehaviorResource,
        expected: BehaviorKind,
    ) -> Result<()> {
        if resource.kind != expected {
            return Err(TemplatingError::configuration(format!(
                "Resource '{}' registered with the wrong kind",
                resource.name
            )));
        }
        if !is_valid_resource_name(&resource.name) {
            return Err(TemplatingError::configuration(format!(
                "'{}' is not a valid resource name",
                resource.name
            )));
        }
        Ok(())
    }

    /// Register a custom element. The name is normalized (uppercase letters
    /// hyphenate to lowercase) before insertion.
    pub fn register_element(
        &self,
        mut resource: HtmlBehaviorResource,
    ) -> Result<Rc<HtmlBehaviorResource>> {
        resource.initialize()?;
        Self::validate_registration(&resource, BehaviorKind::Element)?;
        let resource = Rc::new(resource);
        if self
            .elements
            .borrow_mut()
            .insert(resource.name.clone(), resource.clone())
            .is_some()
        {
            log::debug!("Element '{}' re-registered", resource.name);
        }
        Ok(resource)
    }

    /// Register a custom attribute or template controller. Name
    /// normalization matches element registration exactly.
    pub fn register_attribute(
        &self,
        mut resource: HtmlBehaviorResource,
    ) -> Result<Rc<HtmlBehaviorResource>> {
        resource.initialize()?;
        Self::validate_registration(&resource, BehaviorKind::Attribute)?;
        let resource = Rc::new(resource);
        if self
            .attributes
            .borrow_mut()
            .insert(resource.name.clone(), resource.clone())
            .is_some()
        {
            log::debug!("Attribute '{}' re-registered", resource.name);
        }
        Ok(resource)
    }

    pub fn get_element(&self, name: &str) -> Option<Rc<HtmlBehaviorResource>> {
        match self.elements.borrow().get(name) {
            Some(resource) => Some(resource.clone()),
            None => self.parent.as_ref().and_then(|p| p.get_element(name)),
        }
    }

    pub fn get_attribute(&self, name: &str) -> Option<Rc<HtmlBehaviorResource>> {
        match self.attributes.borrow().get(name) {
            Some(resource) => Some(resource.clone()),
            None => self.parent.as_ref().and_then(|p| p.get_attribute(name)),
        }
    }

    /// Register an attribute alias: occurrences of `alias` compile as if
    /// they were written as `target`.
    pub fn register_attribute_alias(&self, alias: &str, target: &str) {
        self.attribute_aliases
            .borrow_mut()
            .insert(alias.to_string(), target.to_string());
    }

    /// Resolve an attribute name through the alias map, if mapped.
    pub fn map_attribute(&self, attribute: &str) -> Option<String> {
        match self.attribute_aliases.borrow().get(attribute) {
            Some(target) => Some(target.clone()),
            None => self.parent.as_ref().and_then(|p| p.map_attribute(attribute)),
        }
    }

    pub fn register_value_converter(&self, name: &str, converter: Rc<dyn ValueConverter>) {
        self.value_converters
            .borrow_mut()
            .insert(name.to_string(), converter);
    }

    pub fn get_value_converter(&self, name: &str) -> Option<Rc<dyn ValueConverter>> {
        match self.value_converters.borrow().get(name) {
            Some(converter) => Some(converter.clone()),
            None => self.parent.as_ref().and_then(|p| p.get_value_converter(name)),
        }
    }

    pub fn register_binding_behavior(&self, name: &str, behavior: Rc<dyn BindingBehavior>) {
        self.binding_behaviors
            .borrow_mut()
            .insert(name.to_string(), behavior);
    }

    pub fn get_binding_behavior(&self, name: &str) -> Option<Rc<dyn BindingBehavior>> {
        match self.binding_behaviors.borrow().get(name) {
            Some(behavior) => Some(behavior.clone()),
            None => self
                .parent
                .as_ref()
                .and_then(|p| p.get_binding_behavior(name)),
        }
    }
}
