//! Bindable property declarations, per-instance observers and the task queue

use crate::binding::{BindingMode, Value};
use crate::utils::hyphenate;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// Declares one property of a behavior: its DOM attribute mapping, default
/// binding mode, optional default value and change handler.
#[derive(Debug, Clone)]
pub struct BindableProperty {
    /// camelCased property name.
    pub name: String,
    /// Hyphenated attribute name; defaults to the hyphenated property name.
    pub attribute: String,
    pub default_binding_mode: BindingMode,
    pub default_value: Option<Value>,
    /// Name of the view-model change handler, checked for existence when the
    /// observer is created.
    pub change_handler: Option<String>,
    /// Marks the behavior's primary property: the target of a bare
    /// `my-attr.bind` usage and, for dynamic-options behaviors, the anchor
    /// for ad-hoc attribute interception.
    pub primary: bool,
}

impl BindableProperty {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attribute: hyphenate(name),
            default_binding_mode: BindingMode::OneWay,
            default_value: None,
            change_handler: None,
            primary: false,
        }
    }

    pub fn with_attribute(mut self, attribute: &str) -> Self {
        self.attribute = attribute.to_string();
        self
    }

    pub fn with_mode(mut self, mode: BindingMode) -> Self {
        self.default_binding_mode = mode;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_change_handler(mut self, handler: &str) -> Self {
        self.change_handler = Some(handler.to_string());
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }
}

/// Cooperative single-threaded microtask queue. Work queued during a flush
/// runs within the same flush; `is_flushing` lets observers decide between
/// queueing and synchronous delivery.
pub struct TaskQueue {
    queue: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    flushing: Cell<bool>,
}

impl TaskQueue {
    pub fn new() -> Rc<TaskQueue> {
        Rc::new(TaskQueue {
            queue: RefCell::new(VecDeque::new()),
            flushing: Cell::new(false),
        })
    }

    pub fn queue_task(&self, task: Box<dyn FnOnce()>) {
        self.queue.borrow_mut().push_back(task);
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing.get()
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Drain the queue. Re-entrant flush calls are no-ops; the outer flush
    /// picks up anything queued meanwhile.
    pub fn flush(&self) {
        if self.flushing.get() {
            return;
        }
        self.flushing.set(true);
        loop {
            let task = self.queue.borrow_mut().pop_front();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
        self.flushing.set(false);
    }
}

/// Per-instance property value holder with de-duplicated pending-change
/// tracking. The owning controller decides how pending changes are
/// delivered (queued or synchronous).
pub struct BehaviorPropertyObserver {
    name: String,
    value: RefCell<Value>,
    old_value: RefCell<Value>,
    pending: Cell<bool>,
}

impl BehaviorPropertyObserver {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: RefCell::new(Value::Null),
            old_value: RefCell::new(Value::Null),
            pending: Cell::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self) -> Value {
        self.value.borrow().clone()
    }

    /// Write a value. Same-value writes are no-ops. Returns `true` when the
    /// stored value changed. Consecutive writes before delivery collapse
    /// into a single pending change carrying the original old value.
    pub fn set_value(&self, new_value: Value) -> bool {
        if *self.value.borrow() == new_value {
            return false;
        }
        if !self.pending.get() {
            *self.old_value.borrow_mut() = self.value.borrow().clone();
            self.pending.set(true);
        }
        *self.value.borrow_mut() = new_value;
        true
    }

    pub fn has_pending(&self) -> bool {
        self.pending.get()
    }

    /// Consume the pending change, returning `(new, old)`.
    pub fn take_pending(&self) -> Option<(Value, Value)> {
        if !self.pending.get() {
            return None;
        }
        self.pending.set(false);
        Some((self.value.borrow().clone(), self.old_value.borrow().clone()))
    }

    /// Drop any pending change without delivering it. Used while initial
    /// values are applied with the self-subscriber suppressed.
    pub fn discard_pending(&self) {
        self.pending.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bindable_property_defaults() {
        let property = BindableProperty::new("firstName");
        assert_eq!(property.attribute, "first-name");
        assert_eq!(property.default_binding_mode, BindingMode::OneWay);
        assert!(property.default_value.is_none());
        assert!(!property.primary);
    }

    #[test]
    fn test_observer_dedupes_same_value() {
        let observer = BehaviorPropertyObserver::new("count");
        assert!(observer.set_value(Value::Int(1)));
        assert!(!observer.set_value(Value::Int(1)));
        assert_eq!(observer.take_pending(), Some((Value::Int(1), Value::Null)));
        assert!(observer.take_pending().is_none());
    }

    #[test]
    fn test_observer_collapses_consecutive_writes() {
        let observer = BehaviorPropertyObserver::new("count");
        observer.set_value(Value::Int(1));
        observer.set_value(Value::Int(2));
        // one notification, old value from before the first write
        assert_eq!(observer.take_pending(), Some((Value::Int(2), Value::Null)));
    }

    #[test]
    fn test_task_queue_flush_runs_queued_during_flush() {
        let queue = TaskQueue::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let order_a = order.clone();
        let queue_inner = queue.clone();
        let order_b = order.clone();
        queue.queue_task(Box::new(move || {
            order_a.borrow_mut().push("a");
            queue_inner.queue_task(Box::new(move || {
                order_b.borrow_mut().push("b");
            }));
        }));

        queue.flush();
        assert_eq!(*order.borrow(), vec!["a", "b"]);
        assert_eq!(queue.pending(), 0);
    }
}
