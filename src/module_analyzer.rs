//! Module export classification
//!
//! A loaded module's exports are classified into registerable resources:
//! behaviors, value converters and binding behaviors. The first behavior
//! export is the module's main resource. A module exposing nothing usable
//! is a resolution error.

use crate::behavior::{BehaviorKind, HtmlBehaviorResource};
use crate::binding::{BindingBehavior, ValueConverter};
use crate::error::{Result, TemplatingError};
use crate::resources::ViewResources;
use std::rc::Rc;

pub enum ModuleExport {
    Element(HtmlBehaviorResource),
    Attribute(HtmlBehaviorResource),
    ValueConverter(String, Rc<dyn ValueConverter>),
    BindingBehavior(String, Rc<dyn BindingBehavior>),
    /// Anything the analyzer cannot classify (constants, helpers).
    Other,
}

/// The raw export surface of one loaded module.
pub struct ModuleExports {
    pub id: String,
    pub exports: Vec<(String, ModuleExport)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    Element,
    Attribute,
    ValueConverter,
    BindingBehavior,
}

/// Classification record for one usable export.
#[derive(Debug, Clone)]
pub struct ResourceDescription {
    pub export_name: String,
    pub kind: ResourceKind,
}

/// An analyzed module: descriptions plus the pending registrations.
pub struct ResourceModule {
    pub id: String,
    descriptions: Vec<ResourceDescription>,
    main_index: usize,
    pending: Vec<(String, ModuleExport)>,
}

impl std::fmt::Debug for ResourceModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceModule")
            .field("id", &self.id)
            .field("descriptions", &self.descriptions.len())
            .field("main_index", &self.main_index)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl ResourceModule {
    pub fn descriptions(&self) -> &[ResourceDescription] {
        &self.descriptions
    }

    /// Description of the module's main (first behavior) resource.
    pub fn main_resource(&self) -> &ResourceDescription {
        &self.descriptions[self.main_index]
    }

    /// Install every classified resource into `resources`. Returns the
    /// registered behaviors in export order.
    pub fn register(self, resources: &ViewResources) -> Result<Vec<Rc<HtmlBehaviorResource>>> {
        let mut registered = Vec::new();
        for (_, export) in self.pending {
            match export {
                ModuleExport::Element(resource) => {
                    registered.push(resources.register_element(resource)?);
                }
                ModuleExport::Attribute(resource) => {
                    registered.push(resources.register_attribute(resource)?);
                }
                ModuleExport::ValueConverter(name, converter) => {
                    resources.register_value_converter(&name, converter);
                }
                ModuleExport::BindingBehavior(name, behavior) => {
                    resources.register_binding_behavior(&name, behavior);
                }
                ModuleExport::Other => {}
            }
        }
        Ok(registered)
    }
}

pub struct ModuleAnalyzer;

impl ModuleAnalyzer {
    pub fn new() -> ModuleAnalyzer {
        ModuleAnalyzer
    }

    /// Classify a module's exports. Fails when nothing registerable is
    /// found.
    pub fn analyze(&self, module: ModuleExports) -> Result<ResourceModule> {
        let mut descriptions = Vec::new();
        let mut main_index = None;

        for (name, export) in &module.exports {
            let kind = match export {
                ModuleExport::Element(resource) => {
                    debug_assert_eq!(resource.kind, BehaviorKind::Element);
                    Some(ResourceKind::Element)
                }
                ModuleExport::Attribute(resource) => {
                    debug_assert_eq!(resource.kind, BehaviorKind::Attribute);
                    Some(ResourceKind::Attribute)
                }
                ModuleExport::ValueConverter(..) => Some(ResourceKind::ValueConverter),
                ModuleExport::BindingBehavior(..) => Some(ResourceKind::BindingBehavior),
                ModuleExport::Other => None,
            };
            if let Some(kind) = kind {
                let is_behavior =
                    matches!(kind, ResourceKind::Element | ResourceKind::Attribute);
                if is_behavior && main_index.is_none() {
                    main_index = Some(descriptions.len());
                }
                descriptions.push(ResourceDescription {
                    export_name: name.clone(),
                    kind,
                });
            }
        }

        if descriptions.is_empty() {
            return Err(TemplatingError::resolution(format!(
                "Module '{}' exports no usable resources",
                module.id
            )));
        }

        Ok(ResourceModule {
            id: module.id,
            main_index: main_index.unwrap_or(0),
            descriptions,
            pending: module.exports,
        })
    }
}

impl Default for ModuleAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Value;

    struct Upper;
    impl ValueConverter for Upper {
        fn to_view(&self, value: Value) -> Value {
            Value::String(value.to_string().to_uppercase())
        }
    }

    #[test]
    fn test_analyze_classifies_and_registers() {
        let module = ModuleExports {
            id: "widgets".to_string(),
            exports: vec![
                ("upper".to_string(), ModuleExport::ValueConverter("upper".into(), Rc::new(Upper))),
                ("MyCard".to_string(), ModuleExport::Element(HtmlBehaviorResource::element("myCard"))),
                ("helper".to_string(), ModuleExport::Other),
            ],
        };

        let analyzed = ModuleAnalyzer::new().analyze(module).unwrap();
        assert_eq!(analyzed.descriptions().len(), 2);
        assert_eq!(analyzed.main_resource().export_name, "MyCard");
        assert_eq!(analyzed.main_resource().kind, ResourceKind::Element);

        let resources = ViewResources::root();
        let registered = analyzed.register(&resources).unwrap();
        assert_eq!(registered.len(), 1);
        assert!(resources.get_element("my-card").is_some());
        assert!(resources.get_value_converter("upper").is_some());
    }

    #[test]
    fn test_empty_module_is_resolution_error() {
        let module = ModuleExports {
            id: "empty".to_string(),
            exports: vec![("x".to_string(), ModuleExport::Other)],
        };
        let err = ModuleAnalyzer::new().analyze(module).unwrap_err();
        assert!(matches!(err, TemplatingError::Resolution { .. }));
    }
}
