//! Weft component templating runtime
//!
//! The runtime core of a component-oriented UI templating framework:
//! compiles HTML templates into executable view factories, instantiates
//! component trees bound to view-models, and manages their
//! attach/detach/bind lifecycle against a headless DOM.
//!
//! # Features
//!
//! - Custom elements, custom attributes and template controllers
//! - `${...}` interpolation and `.bind`-style attribute commands through a
//!   pluggable binding language
//! - Content projection with named slots, fallbacks and re-projection
//! - Surrogate attributes, `replace-part` templates and `let` bindings
//! - Bounded view pooling per factory
//! - Dynamic composition of view-model/view pairs into live view slots
//!
//! # Basic Usage
//!
//! ```rust
//! use weft::{compile_markup, BindingContext, Scope, Value, ViewCreateInstruction, ViewResources};
//! use std::rc::Rc;
//!
//! fn main() -> weft::Result<()> {
//!     let resources = Rc::new(ViewResources::root());
//!     let factory = compile_markup("<div>Hello ${name}!</div>", &resources)?;
//!
//!     let scope = Scope::new(BindingContext::from_pairs(&[
//!         ("name", Value::String("world".into())),
//!     ]));
//!     let view = factory.create(&resources, ViewCreateInstruction {
//!         scope: Some(scope),
//!         ..Default::default()
//!     })?;
//!     assert_eq!(view.nodes()[0].text_content(), "Hello world!");
//!     Ok(())
//! }
//! ```
//!
//! # Compilation Pipeline
//!
//! 1. **Markup** — lex and parse template markup into a DOM fragment
//! 2. **Compile** — walk the tree, classify attributes through the binding
//!    language, resolve behaviors, lift template controllers, rewrite
//!    slots and interpolated text, emit the instruction table
//! 3. **Instantiate** — clone the instructable template, locate marked
//!    targets with one query, apply each instruction in document order
//! 4. **Lifecycle** — bind, attach, detach, unbind; strictly paired and
//!    idempotent

pub mod error;
pub mod dom;
pub mod markup;
pub mod utils;

pub mod binding;
pub mod resources;
pub mod instruction;
pub mod bindable;
pub mod behavior;
pub mod controller;
pub mod view;
pub mod view_factory;
pub mod view_compiler;
pub mod view_slot;
pub mod shadow_dom;
pub mod animator;
pub mod module_analyzer;
pub mod view_engine;
pub mod composition_engine;
pub mod cli;

use serde::Serialize;

// Re-export commonly used types and functions
pub use error::{Result, TemplatingError};
pub use dom::{ChildObserver, Node, NodeKind};
pub use markup::{parse_fragment, parse_template};
pub use utils::{camelize, hyphenate, is_valid_resource_name};
pub use binding::{
    AttributeValue, Binding, BindingContext, BindingLanguage, BindingMode,
    DefaultBindingLanguage, Expression, Interpolation, LetBinding, PropertySink, Scope, Value,
    ValueConverter,
};
pub use resources::ViewResources;
pub use instruction::{
    BehaviorInstruction, SurrogateInstruction, TargetInstruction, ViewCompileInstruction,
    ViewCreateInstruction, TARGET_CLASS, TARGET_ID_ATTRIBUTE,
};
pub use bindable::{BehaviorPropertyObserver, BindableProperty, TaskQueue};
pub use behavior::{BehaviorKind, HtmlBehaviorResource, LifecycleHooks, ViewModel};
pub use controller::{Controller, WeakController};
pub use view::View;
pub use view_factory::{CreationContext, ViewFactory};
pub use view_compiler::ViewCompiler;
pub use view_slot::ViewSlot;
pub use shadow_dom::{ProjectionContext, ProjectionSlot, SlotMap, DEFAULT_SLOT_NAME};
pub use animator::{Animator, NoopAnimator};
pub use module_analyzer::{ModuleAnalyzer, ModuleExport, ModuleExports, ResourceModule};
pub use view_engine::{FileTemplateLoader, TemplateLoader, ViewEngine};
pub use composition_engine::{CompositionContext, CompositionEngine, CompositionResult};
pub use cli::Cli;

/// Runtime version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Runtime build information
pub const BUILD_INFO: EngineInfo = EngineInfo {
    version: VERSION,
    name: NAME,
    description: DESCRIPTION,
    supported_features: &[
        "custom-elements",
        "custom-attributes",
        "template-controllers",
        "slots",
        "surrogates",
        "interpolation",
        "let-bindings",
        "replace-part",
        "view-caching",
        "composition",
    ],
};

/// Engine information structure
#[derive(Debug, Clone)]
pub struct EngineInfo {
    pub version: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub supported_features: &'static [&'static str],
}

/// Check whether the runtime supports a specific templating feature
pub fn supports_feature(feature: &str) -> bool {
    BUILD_INFO.supported_features.contains(&feature)
}

/// Get runtime build information
pub fn build_info() -> &'static EngineInfo {
    &BUILD_INFO
}

/// Compilation statistics and metrics
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompileStats {
    /// Number of instructable targets, nested factories included
    pub target_count: usize,

    /// Behavior instances the factories will create per instantiation
    pub behavior_count: usize,

    /// Binding expressions (content, attribute and let expressions)
    pub expression_count: usize,

    /// Declared projection slots
    pub slot_count: usize,

    /// Lifted template controllers
    pub lifted_count: usize,

    /// `let` assignments
    pub let_count: usize,

    /// Nested view factories (lifted views, fallbacks, part replacements)
    pub nested_factory_count: usize,
}

impl CompileStats {
    /// Walk a factory and its nested factories, accumulating counts.
    pub fn collect(factory: &ViewFactory) -> CompileStats {
        let mut stats = CompileStats::default();
        stats.accumulate(factory);
        stats
    }

    fn accumulate(&mut self, factory: &ViewFactory) {
        self.expression_count += factory.surrogate().bindings.len();
        for instruction in factory.instructions().values() {
            self.target_count += 1;
            self.behavior_count += instruction.behavior_count();
            match instruction {
                TargetInstruction::ContentExpression(_) => self.expression_count += 1,
                TargetInstruction::Slot { fallback, .. } => {
                    self.slot_count += 1;
                    if let Some(fallback) = fallback {
                        self.nested_factory_count += 1;
                        self.accumulate(fallback);
                    }
                }
                TargetInstruction::LetElement(expressions) => {
                    self.let_count += expressions.len();
                    self.expression_count += expressions.len();
                }
                TargetInstruction::Lifted(behavior) => {
                    self.lifted_count += 1;
                    self.count_behavior(behavior);
                    if let Some(nested) = &behavior.view_factory {
                        self.nested_factory_count += 1;
                        self.accumulate(nested);
                    }
                }
                TargetInstruction::Behaviors {
                    element,
                    attributes,
                    bindings,
                } => {
                    self.expression_count += bindings.len();
                    if let Some(element) = element {
                        self.count_behavior(element);
                    }
                    for attribute in attributes {
                        self.count_behavior(attribute);
                    }
                }
            }
        }
    }

    fn count_behavior(&mut self, instruction: &BehaviorInstruction) {
        self.expression_count += instruction
            .attributes
            .iter()
            .filter(|(_, v)| !matches!(v, AttributeValue::Literal(_)))
            .count();
        for factory in instruction.part_replacements.values() {
            self.nested_factory_count += 1;
            self.accumulate(factory);
        }
    }
}

/// Compile markup against a resource registry.
pub fn compile_markup(
    markup: &str,
    resources: &std::rc::Rc<ViewResources>,
) -> Result<std::rc::Rc<ViewFactory>> {
    ViewCompiler::new().compile_markup(markup, resources, None)
}

/// Compile markup and report statistics.
pub fn compile_markup_with_stats(
    markup: &str,
    resources: &std::rc::Rc<ViewResources>,
    instruction: Option<ViewCompileInstruction>,
) -> Result<(std::rc::Rc<ViewFactory>, CompileStats)> {
    let factory = ViewCompiler::new().compile_markup(markup, resources, instruction)?;
    let stats = CompileStats::collect(&factory);
    Ok((factory, stats))
}

/// Compile a template file.
pub fn compile_file(
    path: &str,
    resources: &std::rc::Rc<ViewResources>,
    instruction: Option<ViewCompileInstruction>,
) -> Result<(std::rc::Rc<ViewFactory>, CompileStats)> {
    let markup = std::fs::read_to_string(path)?;
    let factory =
        ViewCompiler::new().compile_markup_named(&markup, path, resources, instruction)?;
    let stats = CompileStats::collect(&factory);
    Ok((factory, stats))
}
