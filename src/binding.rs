//! Binding-language contract and the default binding syntax
//!
//! The compiler is agnostic to binding syntax: it consumes the
//! [`BindingLanguage`] trait and never inspects attribute text itself.
//! [`DefaultBindingLanguage`] implements the stock syntax — `.bind` style
//! attribute commands and `${...}` interpolation — with plain access-path
//! expressions. Continuous observation belongs to the host's binding
//! library; runtime bindings here apply on bind and re-apply on demand via
//! `update_target` / `update_source`.

use crate::dom::Node;
use crate::error::{Result, TemplatingError};
use crate::resources::ViewResources;
use crate::utils::camelize;
use regex::Regex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

// ---------------------------------------------------------------------------
// Values and scopes
// ---------------------------------------------------------------------------

/// Runtime value model shared by scopes, bindings and behavior properties.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Value {
    /// Parse an attribute literal into the narrowest matching value.
    pub fn from_literal(text: &str) -> Value {
        match text {
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            "null" => return Value::Null,
            _ => {}
        }
        if let Ok(i) = text.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = text.parse::<f64>() {
            return Value::Float(f);
        }
        Value::String(text.to_string())
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::List(l) => {
                let parts: Vec<String> = l.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
            Value::Map(_) => write!(f, "[object]"),
        }
    }
}

/// One binding context: a shared, mutable name/value map.
#[derive(Clone)]
pub struct BindingContext(Rc<RefCell<HashMap<String, Value>>>);

impl BindingContext {
    pub fn new() -> Self {
        BindingContext(Rc::new(RefCell::new(HashMap::new())))
    }

    pub fn from_pairs(pairs: &[(&str, Value)]) -> Self {
        let ctx = Self::new();
        for (key, value) in pairs {
            ctx.set(key, value.clone());
        }
        ctx
    }

    /// Identity, not structural, comparison. Used by the lifecycle
    /// idempotence checks.
    pub fn same(&self, other: &BindingContext) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn has(&self, name: &str) -> bool {
        self.0.borrow().contains_key(name)
    }

    pub fn get(&self, name: &str) -> Value {
        self.0.borrow().get(name).cloned().unwrap_or(Value::Null)
    }

    pub fn set(&self, name: &str, value: Value) {
        self.0.borrow_mut().insert(name.to_string(), value);
    }

    pub fn get_path(&self, path: &[String]) -> Value {
        let map = self.0.borrow();
        let mut current = match map.get(path[0].as_str()) {
            Some(v) => v.clone(),
            None => return Value::Null,
        };
        for segment in &path[1..] {
            current = match current {
                Value::Map(ref m) => m.get(segment.as_str()).cloned().unwrap_or(Value::Null),
                _ => Value::Null,
            };
        }
        current
    }

    pub fn set_path(&self, path: &[String], value: Value) {
        if path.len() == 1 {
            self.set(&path[0], value);
            return;
        }
        let mut root = self.get(&path[0]);
        {
            let mut current = &mut root;
            for segment in &path[1..path.len() - 1] {
                if !matches!(current, Value::Map(_)) {
                    *current = Value::Map(HashMap::new());
                }
                if let Value::Map(m) = current {
                    current = m.entry(segment.clone()).or_insert(Value::Null);
                }
            }
            if !matches!(current, Value::Map(_)) {
                *current = Value::Map(HashMap::new());
            }
            if let Value::Map(m) = current {
                m.insert(path[path.len() - 1].clone(), value);
            }
        }
        self.set(&path[0], root);
    }
}

impl Default for BindingContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A binding context plus its chain of enclosing contexts.
#[derive(Clone)]
pub struct Scope {
    context: BindingContext,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    pub fn new(context: BindingContext) -> Self {
        Scope { context, parent: None }
    }

    pub fn nested(context: BindingContext, parent: &Scope) -> Self {
        Scope {
            context,
            parent: Some(Rc::new(parent.clone())),
        }
    }

    pub fn context(&self) -> &BindingContext {
        &self.context
    }

    pub fn same_context(&self, other: &Scope) -> bool {
        self.context.same(&other.context)
    }

    /// Find the owning context for `name`: nearest context that defines it,
    /// falling back to the local one.
    fn owner_of(&self, name: &str) -> BindingContext {
        let mut scope = self;
        loop {
            if scope.context.has(name) {
                return scope.context.clone();
            }
            match &scope.parent {
                Some(parent) => scope = parent,
                None => return self.context.clone(),
            }
        }
    }

    pub fn get_path(&self, path: &[String]) -> Value {
        self.owner_of(&path[0]).get_path(path)
    }

    pub fn set_path(&self, path: &[String], value: Value) {
        self.owner_of(&path[0]).set_path(path, value);
    }
}

// ---------------------------------------------------------------------------
// Expressions and interpolation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingMode {
    OneTime,
    OneWay,
    TwoWay,
}

/// Access-path expression with an optional value-converter pipe:
/// `customer.address.city | upper`.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    path: Vec<String>,
    converter: Option<String>,
    raw: String,
}

impl Expression {
    pub fn parse(raw: &str) -> Result<Expression> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TemplatingError::binding("Empty binding expression"));
        }
        let (body, converter) = match trimmed.split_once('|') {
            Some((body, conv)) => (body.trim(), Some(conv.trim().to_string())),
            None => (trimmed, None),
        };
        let path: Vec<String> = body.split('.').map(|s| s.trim().to_string()).collect();
        for segment in &path {
            if segment.is_empty()
                || !segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
            {
                return Err(TemplatingError::binding(format!(
                    "Invalid access path '{}' in expression '{}'",
                    segment, raw
                )));
            }
        }
        Ok(Expression {
            path,
            converter,
            raw: trimmed.to_string(),
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn evaluate(&self, scope: &Scope, resources: &ViewResources) -> Value {
        let value = scope.get_path(&self.path);
        match &self.converter {
            Some(name) => match resources.get_value_converter(name) {
                Some(converter) => converter.to_view(value),
                None => {
                    log::warn!("Value converter '{}' not found; passing value through", name);
                    value
                }
            },
            None => value,
        }
    }

    /// Write `value` back through the expression (two-way bindings).
    pub fn assign(&self, scope: &Scope, value: Value, resources: &ViewResources) {
        let value = match &self.converter {
            Some(name) => match resources.get_value_converter(name) {
                Some(converter) => converter.from_view(value),
                None => value,
            },
            None => value,
        };
        scope.set_path(&self.path, value);
    }
}

/// A text or attribute value mixing literal runs with `${...}` expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum InterpolationPart {
    Literal(String),
    Expression(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Interpolation {
    pub parts: Vec<InterpolationPart>,
}

impl Interpolation {
    pub fn evaluate(&self, scope: &Scope, resources: &ViewResources) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                InterpolationPart::Literal(text) => out.push_str(text),
                InterpolationPart::Expression(expr) => {
                    out.push_str(&expr.evaluate(scope, resources).to_string())
                }
            }
        }
        out
    }

    pub fn expression_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, InterpolationPart::Expression(_)))
            .count()
    }
}

// ---------------------------------------------------------------------------
// Value converters
// ---------------------------------------------------------------------------

pub trait ValueConverter {
    fn to_view(&self, value: Value) -> Value;

    fn from_view(&self, value: Value) -> Value {
        value
    }
}

/// Binding behaviors are opaque to this core; registration metadata only.
pub trait BindingBehavior {
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Binding-language contract
// ---------------------------------------------------------------------------

/// What the language decided about one attribute.
#[derive(Debug, Clone)]
pub struct AttributeInfo {
    /// Attribute name with any command suffix stripped.
    pub attr_name: String,
    pub attr_value: String,
    /// Binding command (`bind`, `one-way`, `two-way`, `one-time`).
    pub command: Option<String>,
    /// Interpolation detected in a plain attribute value.
    pub interpolation: Option<Interpolation>,
}

/// Compile-time description of how an attribute feeds its target.
#[derive(Debug, Clone)]
pub enum AttributeValue {
    /// Static string; applied directly at instantiation.
    Literal(String),
    /// Expression binding with an explicit or defaulted mode.
    Binding { expression: Expression, mode: BindingMode },
    /// String interpolation binding.
    Interpolation(Interpolation),
}

/// One `<let>` assignment target.
#[derive(Debug, Clone)]
pub struct LetExpression {
    pub target: String,
    pub value: AttributeValue,
}

pub trait BindingLanguage {
    /// Classify a raw attribute. Unknown binding commands are configuration
    /// errors (fatal at compile time).
    fn inspect_attribute(
        &self,
        resources: &ViewResources,
        element_name: &str,
        attr_name: &str,
        attr_value: &str,
    ) -> Result<AttributeInfo>;

    /// Turn an inspected attribute into a bound [`AttributeValue`];
    /// `None` means the attribute is a plain literal with no binding.
    fn create_attribute_instruction(
        &self,
        resources: &ViewResources,
        element: &Node,
        info: &AttributeInfo,
        default_mode: BindingMode,
    ) -> Result<Option<AttributeValue>>;

    /// Detect interpolation in text content.
    fn inspect_text_content(&self, resources: &ViewResources, text: &str) -> Option<Interpolation>;

    /// Build the assignments declared by a `<let>` element.
    fn create_let_expressions(
        &self,
        resources: &ViewResources,
        element: &Node,
    ) -> Result<Vec<LetExpression>>;
}

const KNOWN_COMMANDS: &[&str] = &["bind", "one-way", "two-way", "one-time"];

/// The stock syntax: `.bind` command suffixes and `${...}` interpolation.
pub struct DefaultBindingLanguage {
    interpolation_regex: Regex,
}

impl DefaultBindingLanguage {
    pub fn new() -> Self {
        Self {
            interpolation_regex: Regex::new(r"\$\{([^}]+)\}").unwrap(),
        }
    }

    fn parse_interpolation(&self, text: &str) -> Option<Result<Interpolation>> {
        if !self.interpolation_regex.is_match(text) {
            return None;
        }
        let mut parts = Vec::new();
        let mut last = 0;
        for captures in self.interpolation_regex.captures_iter(text) {
            let whole = captures.get(0).unwrap();
            if whole.start() > last {
                parts.push(InterpolationPart::Literal(text[last..whole.start()].to_string()));
            }
            match Expression::parse(captures.get(1).unwrap().as_str()) {
                Ok(expr) => parts.push(InterpolationPart::Expression(expr)),
                Err(e) => return Some(Err(e)),
            }
            last = whole.end();
        }
        if last < text.len() {
            parts.push(InterpolationPart::Literal(text[last..].to_string()));
        }
        Some(Ok(Interpolation { parts }))
    }

    fn mode_for_command(command: &str, default_mode: BindingMode) -> BindingMode {
        match command {
            "bind" => default_mode,
            "one-way" => BindingMode::OneWay,
            "two-way" => BindingMode::TwoWay,
            "one-time" => BindingMode::OneTime,
            _ => default_mode,
        }
    }
}

impl Default for DefaultBindingLanguage {
    fn default() -> Self {
        Self::new()
    }
}

impl BindingLanguage for DefaultBindingLanguage {
    fn inspect_attribute(
        &self,
        _resources: &ViewResources,
        element_name: &str,
        attr_name: &str,
        attr_value: &str,
    ) -> Result<AttributeInfo> {
        if let Some((name, command)) = attr_name.rsplit_once('.') {
            if KNOWN_COMMANDS.contains(&command) {
                return Ok(AttributeInfo {
                    attr_name: name.to_string(),
                    attr_value: attr_value.to_string(),
                    command: Some(command.to_string()),
                    interpolation: None,
                });
            }
            return Err(TemplatingError::configuration(format!(
                "Unknown binding command '{}' on <{}> attribute '{}'",
                command, element_name, attr_name
            )));
        }

        let interpolation = match self.parse_interpolation(attr_value) {
            Some(result) => Some(result?),
            None => None,
        };
        Ok(AttributeInfo {
            attr_name: attr_name.to_string(),
            attr_value: attr_value.to_string(),
            command: None,
            interpolation,
        })
    }

    fn create_attribute_instruction(
        &self,
        _resources: &ViewResources,
        _element: &Node,
        info: &AttributeInfo,
        default_mode: BindingMode,
    ) -> Result<Option<AttributeValue>> {
        if let Some(command) = &info.command {
            let expression = Expression::parse(&info.attr_value)?;
            let mode = Self::mode_for_command(command, default_mode);
            return Ok(Some(AttributeValue::Binding { expression, mode }));
        }
        if let Some(interpolation) = &info.interpolation {
            return Ok(Some(AttributeValue::Interpolation(interpolation.clone())));
        }
        Ok(None)
    }

    fn inspect_text_content(&self, _resources: &ViewResources, text: &str) -> Option<Interpolation> {
        match self.parse_interpolation(text) {
            Some(Ok(interpolation)) => Some(interpolation),
            Some(Err(e)) => {
                log::warn!("Ignoring malformed interpolation in text: {}", e);
                None
            }
            None => None,
        }
    }

    fn create_let_expressions(
        &self,
        resources: &ViewResources,
        element: &Node,
    ) -> Result<Vec<LetExpression>> {
        let mut expressions = Vec::new();
        for (attr_name, attr_value) in element.attributes() {
            let info = self.inspect_attribute(resources, "let", &attr_name, &attr_value)?;
            let value = match self
                .create_attribute_instruction(resources, element, &info, BindingMode::OneWay)?
            {
                Some(value) => value,
                None => AttributeValue::Literal(attr_value.clone()),
            };
            expressions.push(LetExpression {
                target: camelize(&info.attr_name),
                value,
            });
        }
        Ok(expressions)
    }
}

// ---------------------------------------------------------------------------
// Runtime bindings
// ---------------------------------------------------------------------------

/// Receiver of behavior property writes; implemented by `Controller`.
pub trait PropertySink {
    fn set_property(&self, name: &str, value: Value);
    fn get_property(&self, name: &str) -> Value;
}

/// Where a binding delivers its value.
#[derive(Clone)]
pub enum BindingTarget {
    /// DOM attribute on an element.
    Attribute(Node),
    /// Text content of a node.
    Text(Node),
    /// Declared property of a behavior instance.
    Property(Rc<dyn PropertySink>),
}

#[derive(Clone)]
enum BindingSource {
    Expression { expression: Expression, mode: BindingMode },
    Interpolation(Interpolation),
}

/// A live binding: evaluates its source against the bound scope and writes
/// the result into its target. Bind/unbind are idempotent.
pub struct Binding {
    target: BindingTarget,
    target_property: String,
    source: BindingSource,
    resources: Rc<ViewResources>,
    scope: RefCell<Option<Scope>>,
}

impl Binding {
    pub fn from_attribute_value(
        value: &AttributeValue,
        target: BindingTarget,
        target_property: &str,
        resources: Rc<ViewResources>,
    ) -> Option<Binding> {
        let source = match value {
            AttributeValue::Binding { expression, mode } => BindingSource::Expression {
                expression: expression.clone(),
                mode: *mode,
            },
            AttributeValue::Interpolation(interpolation) => {
                BindingSource::Interpolation(interpolation.clone())
            }
            AttributeValue::Literal(_) => return None,
        };
        Some(Binding {
            target,
            target_property: target_property.to_string(),
            source,
            resources,
            scope: RefCell::new(None),
        })
    }

    pub fn text(interpolation: Interpolation, node: Node, resources: Rc<ViewResources>) -> Binding {
        Binding {
            target: BindingTarget::Text(node),
            target_property: "textContent".to_string(),
            source: BindingSource::Interpolation(interpolation),
            resources,
            scope: RefCell::new(None),
        }
    }

    pub fn mode(&self) -> BindingMode {
        match &self.source {
            BindingSource::Expression { mode, .. } => *mode,
            BindingSource::Interpolation(_) => BindingMode::OneWay,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.scope.borrow().is_some()
    }

    pub fn bind(&self, scope: &Scope) {
        if let Some(existing) = self.scope.borrow().as_ref() {
            if existing.same_context(scope) {
                return;
            }
        }
        *self.scope.borrow_mut() = Some(scope.clone());
        self.update_target();
    }

    pub fn unbind(&self) {
        *self.scope.borrow_mut() = None;
    }

    /// Re-evaluate the source and write the target.
    pub fn update_target(&self) {
        let scope = match self.scope.borrow().as_ref() {
            Some(scope) => scope.clone(),
            None => return,
        };
        let value = match &self.source {
            BindingSource::Expression { expression, .. } => {
                expression.evaluate(&scope, &self.resources)
            }
            BindingSource::Interpolation(interpolation) => {
                Value::String(interpolation.evaluate(&scope, &self.resources))
            }
        };
        match &self.target {
            BindingTarget::Attribute(node) => {
                node.set_attribute(&self.target_property, &value.to_string())
            }
            BindingTarget::Text(node) => node.set_text_content(&value.to_string()),
            BindingTarget::Property(sink) => sink.set_property(&self.target_property, value),
        }
    }

    /// Read the target and write it back through the expression. Only
    /// meaningful for two-way expression bindings.
    pub fn update_source(&self) {
        let scope = match self.scope.borrow().as_ref() {
            Some(scope) => scope.clone(),
            None => return,
        };
        if let BindingSource::Expression { expression, mode } = &self.source {
            if *mode != BindingMode::TwoWay {
                return;
            }
            let value = match &self.target {
                BindingTarget::Attribute(node) => node
                    .get_attribute(&self.target_property)
                    .map(|v| Value::from_literal(&v))
                    .unwrap_or(Value::Null),
                BindingTarget::Text(node) => Value::String(node.text_content()),
                BindingTarget::Property(sink) => sink.get_property(&self.target_property),
            };
            expression.assign(&scope, value, &self.resources);
        }
    }
}

/// A `<let>` assignment: computes its value once per bind and publishes it
/// into the binding context, DOM-free.
pub struct LetBinding {
    target: String,
    value: AttributeValue,
    resources: Rc<ViewResources>,
}

impl LetBinding {
    pub fn new(expression: LetExpression, resources: Rc<ViewResources>) -> LetBinding {
        LetBinding {
            target: expression.target,
            value: expression.value,
            resources,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn bind(&self, scope: &Scope) {
        let value = match &self.value {
            AttributeValue::Literal(text) => Value::from_literal(text),
            AttributeValue::Binding { expression, .. } => {
                expression.evaluate(scope, &self.resources)
            }
            AttributeValue::Interpolation(interpolation) => {
                Value::String(interpolation.evaluate(scope, &self.resources))
            }
        };
        scope.context().set(&self.target, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ViewResources;

    fn resources() -> ViewResources {
        ViewResources::root()
    }

    #[test]
    fn test_expression_parse_and_evaluate() {
        let scope = Scope::new(BindingContext::from_pairs(&[(
            "customer",
            Value::Map(
                [("name".to_string(), Value::String("Ada".into()))]
                    .into_iter()
                    .collect(),
            ),
        )]));
        let expr = Expression::parse("customer.name").unwrap();
        assert_eq!(
            expr.evaluate(&scope, &resources()),
            Value::String("Ada".into())
        );
    }

    #[test]
    fn test_expression_assign_deep_path() {
        let scope = Scope::new(BindingContext::new());
        let expr = Expression::parse("form.field.value").unwrap();
        expr.assign(&scope, Value::Int(5), &resources());
        assert_eq!(expr.evaluate(&scope, &resources()), Value::Int(5));
    }

    #[test]
    fn test_scope_chain_lookup_prefers_owner() {
        let outer = Scope::new(BindingContext::from_pairs(&[("x", Value::Int(1))]));
        let inner = Scope::nested(BindingContext::new(), &outer);
        let expr = Expression::parse("x").unwrap();
        assert_eq!(expr.evaluate(&inner, &resources()), Value::Int(1));

        expr.assign(&inner, Value::Int(2), &resources());
        assert_eq!(expr.evaluate(&outer, &resources()), Value::Int(2));
    }

    #[test]
    fn test_invalid_expression_rejected() {
        assert!(Expression::parse("").is_err());
        assert!(Expression::parse("a..b").is_err());
        assert!(Expression::parse("a b").is_err());
    }

    #[test]
    fn test_inspect_attribute_commands() {
        let language = DefaultBindingLanguage::new();
        let info = language
            .inspect_attribute(&resources(), "input", "value.two-way", "name")
            .unwrap();
        assert_eq!(info.attr_name, "value");
        assert_eq!(info.command.as_deref(), Some("two-way"));

        let err = language
            .inspect_attribute(&resources(), "input", "value.stream", "name")
            .unwrap_err();
        assert!(matches!(err, TemplatingError::Configuration { .. }));
    }

    #[test]
    fn test_interpolation_detection_and_evaluation() {
        let language = DefaultBindingLanguage::new();
        let interpolation = language
            .inspect_text_content(&resources(), "Hello ${first} ${last}!")
            .unwrap();
        assert_eq!(interpolation.expression_count(), 2);

        let scope = Scope::new(BindingContext::from_pairs(&[
            ("first", Value::String("Ada".into())),
            ("last", Value::String("Lovelace".into())),
        ]));
        assert_eq!(
            interpolation.evaluate(&scope, &resources()),
            "Hello Ada Lovelace!"
        );

        assert!(language
            .inspect_text_content(&resources(), "no bindings here")
            .is_none());
    }

    #[test]
    fn test_let_expressions() {
        let language = DefaultBindingLanguage::new();
        let element = Node::element("let");
        element.set_attribute("full-name.bind", "name");
        element.set_attribute("greeting", "hi");
        let lets = language.create_let_expressions(&resources(), &element).unwrap();
        assert_eq!(lets.len(), 2);
        assert_eq!(lets[0].target, "fullName");
        assert!(matches!(lets[0].value, AttributeValue::Binding { .. }));
        assert!(matches!(lets[1].value, AttributeValue::Literal(_)));
    }

    #[test]
    fn test_value_from_literal() {
        assert_eq!(Value::from_literal("42"), Value::Int(42));
        assert_eq!(Value::from_literal("4.5"), Value::Float(4.5));
        assert_eq!(Value::from_literal("true"), Value::Bool(true));
        assert_eq!(Value::from_literal("abc"), Value::String("abc".into()));
    }

    #[test]
    fn test_binding_writes_attribute_target() {
        let node = Node::element("a");
        let value = AttributeValue::Binding {
            expression: Expression::parse("url").unwrap(),
            mode: BindingMode::OneWay,
        };
        let binding = Binding::from_attribute_value(
            &value,
            BindingTarget::Attribute(node.clone()),
            "href",
            Rc::new(resources()),
        )
        .unwrap();

        let scope = Scope::new(BindingContext::from_pairs(&[(
            "url",
            Value::String("/home".into()),
        )]));
        binding.bind(&scope);
        assert_eq!(node.get_attribute("href").as_deref(), Some("/home"));

        // same-context rebind is a no-op
        binding.bind(&scope);
        assert!(binding.is_bound());
        binding.unbind();
        assert!(!binding.is_bound());
    }

    #[test]
    fn test_two_way_binding_update_source() {
        let node = Node::element("input");
        let value = AttributeValue::Binding {
            expression: Expression::parse("count").unwrap(),
            mode: BindingMode::TwoWay,
        };
        let binding = Binding::from_attribute_value(
            &value,
            BindingTarget::Attribute(node.clone()),
            "value",
            Rc::new(resources()),
        )
        .unwrap();

        let scope = Scope::new(BindingContext::from_pairs(&[("count", Value::Int(1))]));
        binding.bind(&scope);
        assert_eq!(node.get_attribute("value").as_deref(), Some("1"));

        node.set_attribute("value", "7");
        binding.update_source();
        assert_eq!(scope.context().get("count"), Value::Int(7));
    }

    #[test]
    fn test_let_binding_publishes_into_context() {
        let language = DefaultBindingLanguage::new();
        let element = Node::element("let");
        element.set_attribute("total.bind", "count");
        let lets = language.create_let_expressions(&resources(), &element).unwrap();

        let scope = Scope::new(BindingContext::from_pairs(&[("count", Value::Int(3))]));
        let let_binding = LetBinding::new(lets[0].clone(), Rc::new(resources()));
        let_binding.bind(&scope);
        assert_eq!(scope.context().get("total"), Value::Int(3));
    }
}
