//! Live behavior instances
//!
//! A `Controller` binds one view-model instance to its declared properties
//! and, for custom elements, to the element's own view. Property values
//! live in an explicit observer map owned by the controller; change
//! notifications are batched through the shared task queue.

use crate::behavior::{BehaviorKind, HtmlBehaviorResource, LifecycleHooks};
use crate::bindable::{BehaviorPropertyObserver, TaskQueue};
use crate::binding::{
    AttributeValue, Binding, BindingContext, BindingTarget, PropertySink, Scope, Value,
};
use crate::dom::{ChildObserver, Node};
use crate::error::{Result, TemplatingError};
use crate::instruction::BehaviorInstruction;
use crate::resources::ViewResources;
use crate::shadow_dom::{self, ProjectionContext};
use crate::view::View;
use crate::view_factory::{CreationContext, ViewCreateInstruction};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};

enum PropertyInitializer {
    Literal(String, Value),
    Binding(Rc<Binding>),
}

pub struct ControllerInner {
    behavior: Rc<HtmlBehaviorResource>,
    view_model: RefCell<Box<dyn crate::behavior::ViewModel>>,
    observers: RefCell<Vec<BehaviorPropertyObserver>>,
    /// Property values mirrored as a binding context; the component's own
    /// view binds against this.
    context: BindingContext,
    view: RefCell<Option<View>>,
    host: Option<Node>,
    content_node: Option<Node>,
    initializers: RefCell<Vec<PropertyInitializer>>,
    initialized: RefCell<HashSet<String>>,
    scope: RefCell<Option<Scope>>,
    is_bound: Cell<bool>,
    is_attached: Cell<bool>,
    suppress_changes: Cell<bool>,
    notifying: Cell<bool>,
    notification_queued: Cell<bool>,
    task_queue: Rc<TaskQueue>,
    resources: Rc<ViewResources>,
}

/// Shared handle to one live behavior instance.
#[derive(Clone)]
pub struct Controller {
    inner: Rc<ControllerInner>,
}

/// Non-owning controller handle; what a view-model keeps without creating
/// a reference cycle through its own controller.
#[derive(Clone)]
pub struct WeakController(Weak<ControllerInner>);

impl WeakController {
    pub fn upgrade(&self) -> Option<Controller> {
        self.0.upgrade().map(|inner| Controller { inner })
    }
}

impl Controller {
    pub(crate) fn create(
        behavior: Rc<HtmlBehaviorResource>,
        context: &CreationContext,
        instruction: &BehaviorInstruction,
    ) -> Result<Controller> {
        let view_model = behavior.new_view_model();

        // declared change handlers must exist before any observer is built
        for property in &behavior.properties {
            if let Some(handler) = &property.change_handler {
                if !view_model.has_change_handler(handler) {
                    return Err(TemplatingError::configuration(format!(
                        "Behavior '{}' declares change handler '{}' for property '{}', \
                         but the view-model does not implement it",
                        behavior.name, handler, property.name
                    )));
                }
            }
        }

        let observers = behavior
            .properties
            .iter()
            .map(|p| BehaviorPropertyObserver::new(&p.name))
            .collect();

        let inner = Rc::new(ControllerInner {
            view_model: RefCell::new(view_model),
            observers: RefCell::new(observers),
            context: BindingContext::new(),
            view: RefCell::new(None),
            host: context.element.clone(),
            content_node: context.content_node.clone(),
            initializers: RefCell::new(Vec::new()),
            initialized: RefCell::new(HashSet::new()),
            scope: RefCell::new(None),
            is_bound: Cell::new(false),
            is_attached: Cell::new(false),
            suppress_changes: Cell::new(false),
            notifying: Cell::new(false),
            notification_queued: Cell::new(false),
            task_queue: context.resources.task_queue(),
            resources: context.resources.clone(),
            behavior: behavior.clone(),
        });
        let controller = Controller { inner };

        controller.process_attribute_instructions(instruction)?;
        controller.create_own_view(context, instruction)?;

        Ok(controller)
    }

    fn process_attribute_instructions(&self, instruction: &BehaviorInstruction) -> Result<()> {
        let behavior = &self.inner.behavior;
        for (name, value) in &instruction.attributes {
            let declared = behavior.property(name).is_some();
            if !declared {
                if !behavior.dynamic_options {
                    log::warn!(
                        "Behavior '{}' received undeclared property '{}'; ignoring",
                        behavior.name,
                        name
                    );
                    continue;
                }
                self.ensure_observer(name);
            }
            match value {
                AttributeValue::Literal(text) => {
                    self.inner.initializers.borrow_mut().push(
                        PropertyInitializer::Literal(name.clone(), Value::from_literal(text)),
                    );
                }
                bound => {
                    let sink: Rc<dyn PropertySink> = Rc::new(self.clone());
                    let binding = Binding::from_attribute_value(
                        bound,
                        BindingTarget::Property(sink),
                        name,
                        self.inner.resources.clone(),
                    )
                    .ok_or_else(|| {
                        TemplatingError::binding(format!(
                            "Property '{}' of '{}' has no bindable value",
                            name, behavior.name
                        ))
                    })?;
                    self.inner
                        .initializers
                        .borrow_mut()
                        .push(PropertyInitializer::Binding(Rc::new(binding)));
                }
            }
            self.inner.initialized.borrow_mut().insert(name.clone());
        }
        Ok(())
    }

    fn create_own_view(
        &self,
        context: &CreationContext,
        instruction: &BehaviorInstruction,
    ) -> Result<()> {
        if self.inner.behavior.kind != BehaviorKind::Element || !self.inner.behavior.has_view() {
            return Ok(());
        }
        let factory = match self.inner.behavior.ensure_view_factory(&context.resources)? {
            Some(factory) => factory,
            None => return Ok(()),
        };
        let create_instruction = ViewCreateInstruction {
            suppress_bind: true,
            part_replacements: Some(instruction.part_replacements.clone()),
            ..Default::default()
        };
        let view = factory.create(&context.resources, create_instruction)?;
        if let Some(host) = &self.inner.host {
            factory.apply_surrogate_to(host, &view, &context.resources);
            view.append_nodes_to(host);
        }
        *self.inner.view.borrow_mut() = Some(view);
        Ok(())
    }

    pub fn behavior(&self) -> &Rc<HtmlBehaviorResource> {
        &self.inner.behavior
    }

    pub fn view(&self) -> Option<View> {
        self.inner.view.borrow().clone()
    }

    pub fn host(&self) -> Option<Node> {
        self.inner.host.clone()
    }

    pub fn is_bound(&self) -> bool {
        self.inner.is_bound.get()
    }

    pub fn is_attached(&self) -> bool {
        self.inner.is_attached.get()
    }

    /// Identity of this instance, used as a projection-source key.
    pub fn source_id(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    /// Read a property from the observer map.
    pub fn property(&self, name: &str) -> Value {
        self.inner
            .observers
            .borrow()
            .iter()
            .find(|o| o.name() == name)
            .map(|o| o.get())
            .unwrap_or(Value::Null)
    }

    fn ensure_observer(&self, name: &str) {
        let mut observers = self.inner.observers.borrow_mut();
        if !observers.iter().any(|o| o.name() == name) {
            observers.push(BehaviorPropertyObserver::new(name));
        }
    }

    fn set_property_internal(&self, name: &str, value: Value, notify: bool) {
        self.ensure_observer(name);
        let changed = {
            let observers = self.inner.observers.borrow();
            let observer = observers.iter().find(|o| o.name() == name).unwrap();
            let changed = observer.set_value(value.clone());
            if changed && !notify {
                observer.discard_pending();
            }
            changed
        };
        if changed {
            self.inner.context.set(name, value);
            if notify {
                self.schedule_notification();
            }
        }
    }

    fn schedule_notification(&self) {
        if !self.inner.behavior.hooks.contains(LifecycleHooks::PROPERTY_CHANGED) {
            // no handler to call; keep observers clean
            for observer in self.inner.observers.borrow().iter() {
                observer.discard_pending();
            }
            return;
        }
        if self.inner.task_queue.is_flushing() {
            self.deliver_pending();
            return;
        }
        if self.inner.notification_queued.get() {
            return;
        }
        self.inner.notification_queued.set(true);
        let weak: Weak<ControllerInner> = Rc::downgrade(&self.inner);
        self.inner.task_queue.queue_task(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                Controller { inner }.deliver_pending();
            }
        }));
    }

    /// Deliver pending property changes to the view-model. Changes raised
    /// by a handler are delivered within the same call.
    fn deliver_pending(&self) {
        if self.inner.notifying.get() {
            return;
        }
        self.inner.notifying.set(true);
        loop {
            let pending: Vec<(String, Value, Value)> = self
                .inner
                .observers
                .borrow()
                .iter()
                .filter_map(|o| {
                    o.take_pending()
                        .map(|(new, old)| (o.name().to_string(), new, old))
                })
                .collect();
            if pending.is_empty() {
                break;
            }
            let mut view_model = self.inner.view_model.borrow_mut();
            for (name, new_value, old_value) in pending {
                view_model.property_changed(&name, &new_value, &old_value);
            }
        }
        self.inner.notifying.set(false);
        self.inner.notification_queued.set(false);
    }

    pub fn downgrade(&self) -> WeakController {
        WeakController(Rc::downgrade(&self.inner))
    }

    /// Invoke the view-model's `created` hook.
    pub(crate) fn created(&self, context: &CreationContext) {
        if self.inner.behavior.hooks.contains(LifecycleHooks::CREATED) {
            let mut context = context.clone();
            context.own_view = self.inner.view.borrow().clone();
            context.controller = Some(self.downgrade());
            self.inner.view_model.borrow_mut().created(&context);
        }
    }

    /// Bind to `scope`. Rebinding with the same context is a no-op; a
    /// different context implicitly unbinds first. Initial values are
    /// applied with change notification suppressed; defaults for untouched
    /// properties notify exactly once with a `Null` old value.
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

        self.inner.suppress_changes.set(true);
        for initializer in self.inner.initializers.borrow().iter() {
            match initializer {
                PropertyInitializer::Literal(name, value) => {
                    self.set_property_internal(name, value.clone(), false);
                }
                PropertyInitializer::Binding(binding) => binding.bind(scope),
            }
        }
        self.inner.suppress_changes.set(false);

        let defaults: Vec<(String, Value)> = self
            .inner
            .behavior
            .properties
            .iter()
            .filter(|p| !self.inner.initialized.borrow().contains(&p.name))
            .filter_map(|p| p.default_value.clone().map(|d| (p.name.clone(), d)))
            .collect();
        for (name, default) in defaults {
            self.set_property_internal(&name, default, true);
        }

        if self.inner.behavior.hooks.contains(LifecycleHooks::BIND) {
            self.inner.view_model.borrow_mut().bind(scope);
        }

        if let Some(view) = self.inner.view.borrow().as_ref() {
            let own_scope = Scope::new(self.inner.context.clone());
            view.bind(&own_scope);
            self.distribute_content(view, &own_scope);
        }

        self.inner.task_queue.flush();
    }

    fn distribute_content(&self, view: &View, own_scope: &Scope) {
        if !view.has_slots() {
            return;
        }
        let nodes = self
            .inner
            .content_node
            .as_ref()
            .map(|n| n.children())
            .unwrap_or_default();
        let context = ProjectionContext {
            resources: self.inner.resources.clone(),
            scope: own_scope.clone(),
        };
        shadow_dom::distribute_nodes(&nodes, &view.slots(), self.source_id(), &context);
        shadow_dom::settle_fallbacks(&view.slots(), &context);
    }

    pub fn unbind(&self) {
        if !self.inner.is_bound.get() {
            return;
        }
        self.inner.is_bound.set(false);

        if self.inner.behavior.hooks.contains(LifecycleHooks::UNBIND) {
            self.inner.view_model.borrow_mut().unbind();
        }
        for initializer in self.inner.initializers.borrow().iter() {
            if let PropertyInitializer::Binding(binding) = initializer {
                binding.unbind();
            }
        }
        if let Some(view) = self.inner.view.borrow().as_ref() {
            view.unbind();
        }
        *self.inner.scope.borrow_mut() = None;
    }

    pub fn attached(&self) {
        if self.inner.is_attached.get() {
            return;
        }
        self.inner.is_attached.set(true);

        if self.inner.behavior.hooks.contains(LifecycleHooks::ATTACHED) {
            self.inner.view_model.borrow_mut().attached();
        }
        if let Some(view) = self.inner.view.borrow().as_ref() {
            view.attached();
        }
        self.register_child_tracking();
    }

    pub fn detached(&self) {
        if !self.inner.is_attached.get() {
            return;
        }
        self.inner.is_attached.set(false);

        if let Some(host) = &self.inner.host {
            if self.inner.behavior.track_children.is_some() {
                host.clear_child_observers();
            }
        }
        if let Some(view) = self.inner.view.borrow().as_ref() {
            view.detached();
        }
        if self.inner.behavior.hooks.contains(LifecycleHooks::DETACHED) {
            self.inner.view_model.borrow_mut().detached();
        }
    }

    fn register_child_tracking(&self) {
        let selector = match &self.inner.behavior.track_children {
            Some(selector) => selector.clone(),
            None => return,
        };
        let host = match &self.inner.host {
            Some(host) => host.clone(),
            None => return,
        };
        if !self
            .inner
            .behavior
            .hooks
            .contains(LifecycleHooks::CHILDREN_CHANGED)
        {
            return;
        }
        let observer = Rc::new(TrackedChildren {
            controller: Rc::downgrade(&self.inner),
            selector,
        });
        observer.deliver(&host);
        host.observe_children(observer);
    }
}

impl PropertySink for Controller {
    fn set_property(&self, name: &str, value: Value) {
        let notify = !self.inner.suppress_changes.get();
        self.set_property_internal(name, value, notify);
    }

    fn get_property(&self, name: &str) -> Value {
        self.property(name)
    }
}

/// Explicit child tracking: matched children are recomputed in document
/// order on every mutation of the host's child list.
struct TrackedChildren {
    controller: Weak<ControllerInner>,
    selector: String,
}

impl TrackedChildren {
    fn matches(&self, node: &Node) -> bool {
        node.is_element() && (self.selector == "*" || node.node_name() == self.selector)
    }

    fn deliver(&self, host: &Node) {
        let inner = match self.controller.upgrade() {
            Some(inner) => inner,
            None => return,
        };
        let matched: Vec<Node> = host.children().into_iter().filter(|c| self.matches(c)).collect();
        match inner.view_model.try_borrow_mut() {
            Ok(mut view_model) => view_model.children_changed(&matched),
            Err(_) => {
                // the view-model is mid-callback; deliver on the next flush
                let weak = self.controller.clone();
                let host = host.clone();
                let selector = self.selector.clone();
                inner.task_queue.queue_task(Box::new(move || {
                    TrackedChildren {
                        controller: weak,
                        selector,
                    }
                    .deliver(&host);
                }));
            }
        };
    }
}

impl ChildObserver for TrackedChildren {
    fn children_changed(&self, node: &Node, _added: &[Node], _removed: &[Node]) {
        self.deliver(node);
    }
}
