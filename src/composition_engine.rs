//! Dynamic composition
//!
//! Runtime-driven instantiation of a view-model + view pair into a
//! `ViewSlot`, bypassing static compilation: compose a registered behavior
//! (its view strategy supplies the view) or a bare view factory bound to a
//! caller-provided scope.

use crate::behavior::HtmlBehaviorResource;
use crate::binding::Scope;
use crate::controller::Controller;
use crate::dom::Node;
use crate::error::{Result, TemplatingError};
use crate::instruction::{BehaviorInstruction, ViewCreateInstruction};
use crate::resources::ViewResources;
use crate::view::View;
use crate::view_engine::ViewEngine;
use crate::view_factory::{CreationContext, ViewFactory};
use crate::view_slot::ViewSlot;
use std::rc::Rc;

pub struct CompositionContext {
    pub resources: Rc<ViewResources>,
    /// Registered component to instantiate; its view strategy supplies the
    /// view and its factory supplies the view-model.
    pub behavior: Option<Rc<HtmlBehaviorResource>>,
    /// Pre-compiled view to instantiate without a behavior.
    pub view_factory: Option<Rc<ViewFactory>>,
    /// Template URL resolved through the view engine when no factory is
    /// given.
    pub view_url: Option<String>,
    pub view_slot: ViewSlot,
    pub host: Option<Node>,
    /// Binding context; composition is created unbound when absent.
    pub scope: Option<Scope>,
}

impl CompositionContext {
    pub fn new(resources: Rc<ViewResources>, view_slot: ViewSlot) -> Self {
        Self {
            resources,
            behavior: None,
            view_factory: None,
            view_url: None,
            view_slot,
            host: None,
            scope: None,
        }
    }
}

pub enum CompositionResult {
    Controller(Controller),
    View(View),
}

pub struct CompositionEngine {
    engine: Rc<ViewEngine>,
}

impl CompositionEngine {
    pub fn new(engine: Rc<ViewEngine>) -> CompositionEngine {
        CompositionEngine { engine }
    }

    /// Compose into the context's view slot. Errors surface to the caller;
    /// there is no retry.
    pub fn compose(&self, context: CompositionContext) -> Result<CompositionResult> {
        if let Some(behavior) = context.behavior.clone() {
            return self.compose_behavior(context, behavior);
        }

        let factory = match (&context.view_factory, &context.view_url) {
            (Some(factory), _) => factory.clone(),
            (None, Some(url)) => self.engine.load_view_factory(url)?,
            (None, None) => {
                return Err(TemplatingError::resolution(
                    "Composition needs a behavior, a view factory or a view URL",
                ))
            }
        };
        self.compose_view(context, factory)
    }

    fn compose_behavior(
        &self,
        context: CompositionContext,
        behavior: Rc<HtmlBehaviorResource>,
    ) -> Result<CompositionResult> {
        let instruction = BehaviorInstruction::new(behavior.clone());
        let mut creation = CreationContext::new(context.resources.clone());
        creation.element = context.host.clone();
        creation.view_slot = Some(context.view_slot.clone());

        let controller = behavior.create(&creation, &instruction)?;
        controller.created(&creation);
        if let Some(scope) = &context.scope {
            controller.bind(scope);
        }
        if let Some(view) = controller.view() {
            if context.host.is_none() {
                context.view_slot.add(view);
            }
        }
        log::debug!("Composed behavior '{}'", behavior.name);
        Ok(CompositionResult::Controller(controller))
    }

    fn compose_view(
        &self,
        context: CompositionContext,
        factory: Rc<ViewFactory>,
    ) -> Result<CompositionResult> {
        let view = factory.create(
            &context.resources,
            ViewCreateInstruction {
                suppress_bind: true,
                ..Default::default()
            },
        )?;
        if let Some(scope) = &context.scope {
            view.bind(scope);
        }
        context.view_slot.add(view.clone());
        Ok(CompositionResult::View(view))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindingContext, Value};
    use crate::view_engine::FileTemplateLoader;

    fn setup() -> (Rc<ViewResources>, CompositionEngine, Node, ViewSlot) {
        let resources = Rc::new(ViewResources::root());
        let engine = Rc::new(ViewEngine::new(
            resources.clone(),
            Box::new(FileTemplateLoader),
        ));
        let container = Node::element("div");
        let slot = ViewSlot::new(container.clone(), true);
        (resources, CompositionEngine::new(engine), container, slot)
    }

    #[test]
    fn test_compose_view_factory_into_slot() {
        let (resources, engine, container, slot) = setup();
        let factory = crate::view_compiler::ViewCompiler::new()
            .compile_markup("<p>${msg}</p>", &resources, None)
            .unwrap();

        let mut context = CompositionContext::new(resources, slot.clone());
        context.view_factory = Some(factory);
        context.scope = Some(Scope::new(BindingContext::from_pairs(&[(
            "msg",
            Value::String("hi".into()),
        )])));

        let result = engine.compose(context).unwrap();
        assert!(matches!(result, CompositionResult::View(_)));
        assert_eq!(slot.child_count(), 1);
        assert_eq!(container.text_content(), "hi");
    }

    #[test]
    fn test_compose_registered_component() {
        let (resources, engine, container, slot) = setup();
        let behavior = resources
            .register_element(
                crate::behavior::HtmlBehaviorResource::element("my-note")
                    .with_inline_view("<em>note</em>"),
            )
            .unwrap();

        let mut context = CompositionContext::new(resources, slot.clone());
        context.behavior = Some(behavior);
        context.scope = Some(Scope::new(BindingContext::new()));

        let result = engine.compose(context).unwrap();
        match result {
            CompositionResult::Controller(controller) => {
                assert!(controller.view().is_some());
                assert!(controller.is_bound());
            }
            CompositionResult::View(_) => panic!("expected a controller"),
        }
        assert_eq!(container.text_content(), "note");
    }

    #[test]
    fn test_compose_without_source_is_error() {
        let (resources, engine, _container, slot) = setup();
        let context = CompositionContext::new(resources, slot);
        assert!(engine.compose(context).is_err());
    }
}
