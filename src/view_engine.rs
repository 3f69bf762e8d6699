//! Template-to-factory registry
//!
//! Each distinct template URL compiles exactly once; later requests are
//! served from the registry. A registry entry observed in the loading
//! state on the same turn means the template transitively references
//! itself, which is reported instead of recursing forever. Anonymous
//! inline markup is keyed by content hash.

use crate::error::{Result, TemplatingError};
use crate::instruction::ViewCompileInstruction;
use crate::resources::ViewResources;
use crate::view_compiler::ViewCompiler;
use crate::view_factory::ViewFactory;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::rc::Rc;

/// Host seam for template IO.
pub trait TemplateLoader {
    fn load(&self, url: &str) -> Result<String>;
}

/// Default loader: URLs are filesystem paths.
pub struct FileTemplateLoader;

impl TemplateLoader for FileTemplateLoader {
    fn load(&self, url: &str) -> Result<String> {
        fs::read_to_string(url).map_err(|e| {
            TemplatingError::resolution(format!("Template '{}' could not be loaded: {}", url, e))
        })
    }
}

enum RegistryEntry {
    Loading,
    Ready(Rc<ViewFactory>),
}

pub struct ViewEngine {
    compiler: ViewCompiler,
    resources: Rc<ViewResources>,
    loader: Box<dyn TemplateLoader>,
    registry: RefCell<HashMap<String, RegistryEntry>>,
}

impl ViewEngine {
    pub fn new(resources: Rc<ViewResources>, loader: Box<dyn TemplateLoader>) -> ViewEngine {
        ViewEngine {
            compiler: ViewCompiler::new(),
            resources,
            loader,
            registry: RefCell::new(HashMap::new()),
        }
    }

    pub fn resources(&self) -> &Rc<ViewResources> {
        &self.resources
    }

    pub fn is_cached(&self, url: &str) -> bool {
        matches!(
            self.registry.borrow().get(url),
            Some(RegistryEntry::Ready(_))
        )
    }

    /// Load and compile the template at `url`, or return the cached
    /// factory.
    pub fn load_view_factory(&self, url: &str) -> Result<Rc<ViewFactory>> {
        self.load_view_factory_with(url, None)
    }

    pub fn load_view_factory_with(
        &self,
        url: &str,
        instruction: Option<ViewCompileInstruction>,
    ) -> Result<Rc<ViewFactory>> {
        match self.registry.borrow().get(url) {
            Some(RegistryEntry::Ready(factory)) => return Ok(factory.clone()),
            Some(RegistryEntry::Loading) => {
                return Err(TemplatingError::resolution(format!(
                    "Template '{}' transitively references itself",
                    url
                )))
            }
            None => {}
        }

        self.registry
            .borrow_mut()
            .insert(url.to_string(), RegistryEntry::Loading);

        let result = self
            .loader
            .load(url)
            .and_then(|markup| {
                self.compiler
                    .compile_markup_named(&markup, url, &self.resources, instruction)
            });

        match result {
            Ok(factory) => {
                self.registry
                    .borrow_mut()
                    .insert(url.to_string(), RegistryEntry::Ready(factory.clone()));
                Ok(factory)
            }
            Err(e) => {
                self.registry.borrow_mut().remove(url);
                Err(e)
            }
        }
    }

    /// Compile anonymous markup, cached by its md5 content hash.
    pub fn factory_for_markup(&self, markup: &str) -> Result<Rc<ViewFactory>> {
        let key = format!("md5:{}", hex::encode(md5::compute(markup.as_bytes()).0));
        if let Some(RegistryEntry::Ready(factory)) = self.registry.borrow().get(&key) {
            return Ok(factory.clone());
        }
        let factory = self
            .compiler
            .compile_markup(markup, &self.resources, None)?;
        self.registry
            .borrow_mut()
            .insert(key, RegistryEntry::Ready(factory.clone()));
        Ok(factory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn engine() -> ViewEngine {
        ViewEngine::new(Rc::new(ViewResources::root()), Box::new(FileTemplateLoader))
    }

    #[test]
    fn test_each_url_compiles_exactly_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("card.html");
        fs::write(&path, "<div>${title}</div>").unwrap();
        let url = path.to_str().unwrap();

        let engine = engine();
        let first = engine.load_view_factory(url).unwrap();
        let second = engine.load_view_factory(url).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert!(engine.is_cached(url));
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let engine = engine();
        assert!(engine.load_view_factory("/nonexistent.html").is_err());
        assert!(!engine.is_cached("/nonexistent.html"));
        // a later request retries the load rather than replaying the error
        assert!(engine.load_view_factory("/nonexistent.html").is_err());
    }

    #[test]
    fn test_inline_markup_keyed_by_content_hash() {
        let engine = engine();
        let a = engine.factory_for_markup("<div>${x}</div>").unwrap();
        let b = engine.factory_for_markup("<div>${x}</div>").unwrap();
        let c = engine.factory_for_markup("<div>${y}</div>").unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert!(!Rc::ptr_eq(&a, &c));
    }
}
