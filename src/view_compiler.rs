//! Template compilation
//!
//! Walks a template's node tree depth-first, classifying attributes through
//! the binding language, resolving behaviors against the resource registry,
//! lifting template controllers, rewriting slots and interpolated text, and
//! emitting the flat instruction table the factory replays at instantiation
//! time. Target ids are scoped to one compile invocation.

use crate::binding::{AttributeValue, BindingMode};
use crate::dom::Node;
use crate::error::{Result, TemplatingError};
use crate::instruction::{
    BehaviorInstruction, SurrogateInstruction, TargetInstruction, ViewCompileInstruction,
    CONTENT_ELEMENT, MARKER_ELEMENT, REPLACE_PART_ATTRIBUTE, TARGET_CLASS, TARGET_ID_ATTRIBUTE,
};
use crate::markup;
use crate::resources::ViewResources;
use crate::shadow_dom::DEFAULT_SLOT_NAME;
use crate::utils::camelize;
use crate::view_factory::ViewFactory;
use std::collections::HashMap;
use std::rc::Rc;

/// Per-invocation compilation state. Target ids are monotonically
/// increasing stringified integers, assigned in document order and never
/// shared across compile invocations.
struct CompileContext {
    next_target_id: u32,
    file: String,
}

impl CompileContext {
    fn new(file: &str) -> Self {
        Self {
            next_target_id: 0,
            file: file.to_string(),
        }
    }

    fn next_id(&mut self) -> String {
        let id = self.next_target_id;
        self.next_target_id += 1;
        id.to_string()
    }
}

pub struct ViewCompiler;

impl ViewCompiler {
    pub fn new() -> ViewCompiler {
        ViewCompiler
    }

    /// Compile raw markup into a view factory.
    pub fn compile_markup(
        &self,
        markup_source: &str,
        resources: &Rc<ViewResources>,
        instruction: Option<ViewCompileInstruction>,
    ) -> Result<Rc<ViewFactory>> {
        self.compile_markup_named(markup_source, "<inline>", resources, instruction)
    }

    pub fn compile_markup_named(
        &self,
        markup_source: &str,
        filename: &str,
        resources: &Rc<ViewResources>,
        instruction: Option<ViewCompileInstruction>,
    ) -> Result<Rc<ViewFactory>> {
        let template = markup::parse_template(markup_source, filename)?;
        self.compile_template_named(template, filename, resources, instruction)
    }

    /// Compile an already-parsed template element.
    pub fn compile_template(
        &self,
        template: Node,
        resources: &Rc<ViewResources>,
        instruction: Option<ViewCompileInstruction>,
    ) -> Result<Rc<ViewFactory>> {
        self.compile_template_named(template, "<template>", resources, instruction)
    }

    fn compile_template_named(
        &self,
        template: Node,
        filename: &str,
        resources: &Rc<ViewResources>,
        instruction: Option<ViewCompileInstruction>,
    ) -> Result<Rc<ViewFactory>> {
        let compile_instruction = instruction.unwrap_or_default();
        let mut context = CompileContext::new(filename);
        let mut instructions = HashMap::new();

        let surrogate = if compile_instruction.compile_surrogate {
            self.compile_surrogate(&template, resources, &context)?
        } else {
            SurrogateInstruction::default()
        };

        for child in template.children() {
            self.compile_node(&child, resources, &mut instructions, &mut context)?;
        }

        log::debug!(
            "Compiled {} with {} targets",
            filename,
            instructions.len()
        );
        Ok(Rc::new(ViewFactory::new(template, instructions, surrogate)))
    }

    fn compile_node(
        &self,
        node: &Node,
        resources: &Rc<ViewResources>,
        instructions: &mut HashMap<String, TargetInstruction>,
        context: &mut CompileContext,
    ) -> Result<()> {
        if node.is_text() {
            return self.compile_text(node, resources, instructions, context);
        }
        if node.is_element() {
            return self.compile_element(node, resources, instructions, context);
        }
        Ok(())
    }

    /// Interpolated text collapses to a single space and gains a marker
    /// element in front of it; the factory re-anchors the binding through
    /// the marker's next sibling.
    fn compile_text(
        &self,
        node: &Node,
        resources: &Rc<ViewResources>,
        instructions: &mut HashMap<String, TargetInstruction>,
        context: &mut CompileContext,
    ) -> Result<()> {
        // merge adjacent text siblings so only one marker is inserted
        while let Some(next) = node.next_sibling().filter(|n| n.is_text()) {
            let merged = format!("{}{}", node.text_content(), next.text_content());
            node.set_text_content(&merged);
            next.remove();
        }

        let language = resources.binding_language();
        let interpolation = match language.inspect_text_content(resources, &node.text_content()) {
            Some(interpolation) => interpolation,
            None => return Ok(()),
        };

        let marker = Node::element(MARKER_ELEMENT);
        if let Some(parent) = node.parent() {
            parent.insert_before(&marker, Some(node));
        }
        node.set_text_content(" ");
        self.mark(
            &marker,
            context,
            instructions,
            TargetInstruction::ContentExpression(interpolation),
        );
        Ok(())
    }

    fn compile_element(
        &self,
        node: &Node,
        resources: &Rc<ViewResources>,
        instructions: &mut HashMap<String, TargetInstruction>,
        context: &mut CompileContext,
    ) -> Result<()> {
        let tag = node.node_name();
        if tag == "slot" {
            return self.compile_slot(node, resources, instructions, context);
        }
        if tag == "let" {
            let language = resources.binding_language();
            let expressions = language.create_let_expressions(resources, node)?;
            self.mark(
                node,
                context,
                instructions,
                TargetInstruction::LetElement(expressions),
            );
            return Ok(());
        }

        let language = resources.binding_language();
        let effective_name = node.get_attribute("as-element").unwrap_or_else(|| tag.clone());
        let element_resource = resources.get_element(&effective_name);

        if let Some(resource) = &element_resource {
            if let Some(hook) = &resource.process_attributes {
                if let Err(e) = hook(resources, node) {
                    log::warn!(
                        "processAttributes hook of '{}' failed: {}; attributes left as-is",
                        resource.name,
                        e
                    );
                }
            }
        }

        // the element-level instruction exists before attribute iteration
        // so attribute instructions can bind to declared element properties
        let mut element_instruction = element_resource.map(BehaviorInstruction::new);
        let mut attribute_instructions: Vec<BehaviorInstruction> = Vec::new();
        let mut plain_bindings: Vec<(String, AttributeValue)> = Vec::new();
        let mut lifting: Option<BehaviorInstruction> = None;

        for (attr_name, attr_value) in node.attributes() {
            if attr_name == "as-element" {
                continue;
            }
            let info = language.inspect_attribute(resources, &tag, &attr_name, &attr_value)?;
            let mapped = resources
                .map_attribute(&info.attr_name)
                .unwrap_or_else(|| info.attr_name.clone());

            if let Some(attr_resource) = resources.get_attribute(&mapped) {
                let mut instruction = BehaviorInstruction::new(attr_resource.clone());
                let primary = attr_resource.primary_property().cloned();
                let primary_name = primary
                    .as_ref()
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| "value".to_string());
                let default_mode = primary
                    .as_ref()
                    .map(|p| p.default_binding_mode)
                    .unwrap_or(BindingMode::OneWay);

                if info.command.is_some() {
                    let value = language
                        .create_attribute_instruction(resources, node, &info, default_mode)?
                        .ok_or_else(|| {
                            TemplatingError::compile(
                                context.file.clone(),
                                format!("Command on '{}' produced no binding", attr_name),
                            )
                        })?;
                    instruction.set_attribute(&primary_name, value);
                } else if attr_resource.properties.len() > 1 && attr_value.contains(':') {
                    self.compile_options(
                        &tag,
                        node,
                        resources,
                        &attr_value,
                        &mut instruction,
                        context,
                    )?;
                } else {
                    let value = match language
                        .create_attribute_instruction(resources, node, &info, default_mode)?
                    {
                        Some(bound) => bound,
                        None => AttributeValue::Literal(attr_value.clone()),
                    };
                    instruction.set_attribute(&primary_name, value);
                }

                if attr_resource.lifts_content {
                    // template-controller priority: first match wins and
                    // attribute processing for this node stops here
                    node.remove_attribute(&attr_name);
                    lifting = Some(instruction);
                    break;
                }
                attribute_instructions.push(instruction);
                continue;
            }

            if let Some(element_instruction) = element_instruction.as_mut() {
                let declared = element_instruction
                    .behavior
                    .property_for_attribute(&mapped)
                    .cloned();
                if let Some(property) = declared {
                    let value = match language.create_attribute_instruction(
                        resources,
                        node,
                        &info,
                        property.default_binding_mode,
                    )? {
                        Some(bound) => bound,
                        None => AttributeValue::Literal(attr_value.clone()),
                    };
                    element_instruction.set_attribute(&property.name, value);
                    continue;
                }
                if element_instruction.behavior.dynamic_options {
                    // options-bag element: unrecognized attributes become
                    // ad-hoc dynamic properties
                    let value = match language.create_attribute_instruction(
                        resources,
                        node,
                        &info,
                        BindingMode::OneWay,
                    )? {
                        Some(bound) => bound,
                        None => AttributeValue::Literal(attr_value.clone()),
                    };
                    element_instruction.set_attribute(&camelize(&mapped), value);
                    continue;
                }
            }

            if let Some(bound) =
                language.create_attribute_instruction(resources, node, &info, BindingMode::OneWay)?
            {
                plain_bindings.push((mapped, bound));
            }
        }

        if let Some(mut lifting_instruction) = lifting {
            let marker = Node::element(MARKER_ELEMENT);
            node.replace_with(&marker);
            let template = Node::element("template");
            template.append_child(node);
            let factory =
                self.compile_template_named(template, &context.file, resources, None)?;
            lifting_instruction.view_factory = Some(factory);
            self.mark(
                &marker,
                context,
                instructions,
                TargetInstruction::Lifted(lifting_instruction),
            );
            return Ok(());
        }

        if let Some(element_instruction) = element_instruction.as_mut() {
            self.process_element_content(node, resources, element_instruction, context)?;
        }

        let has_work = element_instruction.is_some()
            || !attribute_instructions.is_empty()
            || !plain_bindings.is_empty();
        if has_work {
            self.mark(
                node,
                context,
                instructions,
                TargetInstruction::Behaviors {
                    element: element_instruction,
                    attributes: attribute_instructions,
                    bindings: plain_bindings,
                },
            );
        }

        for child in node.children() {
            self.compile_node(&child, resources, instructions, context)?;
        }
        Ok(())
    }

    /// Options syntax for multi-property attributes: `a: x; b: ${y}`.
    fn compile_options(
        &self,
        tag: &str,
        node: &Node,
        resources: &Rc<ViewResources>,
        attr_value: &str,
        instruction: &mut BehaviorInstruction,
        context: &CompileContext,
    ) -> Result<()> {
        let language = resources.binding_language();
        for pair in attr_value.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once(':').ok_or_else(|| {
                TemplatingError::compile(
                    context.file.clone(),
                    format!("Malformed options segment '{}' for '{}'", pair, instruction.behavior.name),
                )
            })?;
            let property = camelize(key.trim());
            let value = value.trim();
            let info = language.inspect_attribute(resources, tag, &property, value)?;
            let attribute_value = match language
                .create_attribute_instruction(resources, node, &info, BindingMode::OneWay)?
            {
                Some(bound) => bound,
                None => AttributeValue::Literal(value.to_string()),
            };
            instruction.set_attribute(&property, attribute_value);
        }
        Ok(())
    }

    /// Default content processing for non-shadow custom elements: extract
    /// `replace-part` templates into the part map, then move the remaining
    /// light DOM under a synthetic content holder.
    fn process_element_content(
        &self,
        node: &Node,
        resources: &Rc<ViewResources>,
        instruction: &mut BehaviorInstruction,
        context: &CompileContext,
    ) -> Result<()> {
        // shadow elements distribute natively; view-less elements keep
        // their light DOM in place
        if instruction.behavior.uses_shadow_dom || !instruction.behavior.has_view() {
            return Ok(());
        }
        let behavior = instruction.behavior.clone();
        let proceed = match &behavior.process_content {
            Some(hook) => match hook(resources, node, instruction) {
                Ok(proceed) => proceed,
                Err(e) => {
                    log::warn!(
                        "processContent hook of '{}' failed: {}; content left untouched",
                        behavior.name,
                        e
                    );
                    false
                }
            },
            None => true,
        };
        if !proceed {
            return Ok(());
        }

        for child in node.children() {
            if child.is_element()
                && child.node_name() == "template"
                && child.has_attribute(REPLACE_PART_ATTRIBUTE)
            {
                let part = child.get_attribute(REPLACE_PART_ATTRIBUTE).unwrap_or_default();
                child.remove();
                child.remove_attribute(REPLACE_PART_ATTRIBUTE);
                let factory =
                    self.compile_template_named(child, &context.file, resources, None)?;
                instruction.part_replacements.insert(part, factory);
            }
        }

        if node.child_count() > 0 {
            let content = Node::element(CONTENT_ELEMENT);
            for child in node.children() {
                content.append_child(&child);
            }
            node.append_child(&content);
        }
        Ok(())
    }

    /// `<slot>` elements become projection destinations; inline children
    /// compile into the slot's fallback factory.
    fn compile_slot(
        &self,
        node: &Node,
        resources: &Rc<ViewResources>,
        instructions: &mut HashMap<String, TargetInstruction>,
        context: &mut CompileContext,
    ) -> Result<()> {
        let name = node
            .get_attribute("name")
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_SLOT_NAME.to_string());
        let destination = node.get_attribute("slot").filter(|n| !n.is_empty());

        let fallback = if node.child_count() > 0 {
            let template = Node::element("template");
            for child in node.children() {
                template.append_child(&child);
            }
            Some(self.compile_template_named(template, &context.file, resources, None)?)
        } else {
            None
        };

        self.mark(
            node,
            context,
            instructions,
            TargetInstruction::Slot {
                name,
                destination,
                fallback,
            },
        );
        Ok(())
    }

    /// Attributes on the template's own root element merge onto the host
    /// of each instance. A template controller here is a fatal
    /// configuration error.
    fn compile_surrogate(
        &self,
        template: &Node,
        resources: &Rc<ViewResources>,
        context: &CompileContext,
    ) -> Result<SurrogateInstruction> {
        let language = resources.binding_language();
        let mut surrogate = SurrogateInstruction::default();

        for (attr_name, attr_value) in template.attributes() {
            let info =
                language.inspect_attribute(resources, "template", &attr_name, &attr_value)?;
            let mapped = resources
                .map_attribute(&info.attr_name)
                .unwrap_or_else(|| info.attr_name.clone());

            if let Some(attr_resource) = resources.get_attribute(&mapped) {
                if attr_resource.lifts_content {
                    return Err(TemplatingError::compile(
                        context.file.clone(),
                        format!(
                            "Template controller '{}' cannot be placed on a surrogate element",
                            mapped
                        ),
                    ));
                }
                log::warn!(
                    "Custom attribute '{}' on a surrogate compiles as a plain attribute",
                    mapped
                );
            }

            match language.create_attribute_instruction(
                resources,
                template,
                &info,
                BindingMode::OneWay,
            )? {
                Some(bound) => surrogate.bindings.push((mapped, bound)),
                None => surrogate.values.push((mapped, attr_value)),
            }
        }
        Ok(surrogate)
    }

    fn mark(
        &self,
        node: &Node,
        context: &mut CompileContext,
        instructions: &mut HashMap<String, TargetInstruction>,
        instruction: TargetInstruction,
    ) {
        let id = context.next_id();
        node.add_class(TARGET_CLASS);
        node.set_attribute(TARGET_ID_ATTRIBUTE, &id);
        instructions.insert(id, instruction);
    }
}

impl Default for ViewCompiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::HtmlBehaviorResource;
    use crate::bindable::BindableProperty;

    fn root() -> Rc<ViewResources> {
        Rc::new(ViewResources::root())
    }

    fn compile(markup: &str, resources: &Rc<ViewResources>) -> Rc<ViewFactory> {
        ViewCompiler::new()
            .compile_markup(markup, resources, None)
            .unwrap()
    }

    #[test]
    fn test_plain_markup_produces_no_instructions() {
        let factory = compile("<div><span>static</span></div>", &root());
        assert!(factory.instructions().is_empty());
    }

    #[test]
    fn test_text_interpolation_gets_marker() {
        let resources = root();
        let factory = compile("<div>Hello ${name}!</div>", &resources);
        assert_eq!(factory.instructions().len(), 1);
        let (_, instruction) = factory.instructions().iter().next().unwrap();
        assert_eq!(instruction.kind_name(), "content-expression");

        // the marker carries the class and id in the rewritten template
        let marked = factory.template().find_marked(TARGET_CLASS);
        assert_eq!(marked.len(), 1);
        assert_eq!(marked[0].node_name(), MARKER_ELEMENT);
        assert!(marked[0].has_attribute(TARGET_ID_ATTRIBUTE));
        // interpolated text collapsed to a single space
        assert_eq!(marked[0].next_sibling().unwrap().text_content(), " ");
    }

    #[test]
    fn test_bound_attribute_on_plain_element() {
        let factory = compile("<a href.bind=\"url\">x</a>", &root());
        assert_eq!(factory.instructions().len(), 1);
        match factory.instructions().values().next().unwrap() {
            TargetInstruction::Behaviors { element, attributes, bindings } => {
                assert!(element.is_none());
                assert!(attributes.is_empty());
                assert_eq!(bindings.len(), 1);
                assert_eq!(bindings[0].0, "href");
            }
            other => panic!("unexpected instruction {}", other.kind_name()),
        }
    }

    #[test]
    fn test_custom_element_instruction_before_attributes() {
        let resources = root();
        resources
            .register_element(
                HtmlBehaviorResource::element("my-card")
                    .with_bindable(BindableProperty::new("headerText")),
            )
            .unwrap();
        let factory = compile(
            "<my-card header-text.bind=\"title\"></my-card>",
            &resources,
        );
        assert_eq!(factory.instructions().len(), 1);
        match factory.instructions().values().next().unwrap() {
            TargetInstruction::Behaviors { element, bindings, .. } => {
                let element = element.as_ref().expect("element instruction");
                assert!(matches!(
                    element.attribute("headerText"),
                    Some(AttributeValue::Binding { .. })
                ));
                assert!(bindings.is_empty());
            }
            other => panic!("unexpected instruction {}", other.kind_name()),
        }
    }

    #[test]
    fn test_template_controller_lifts_and_wins() {
        let resources = root();
        resources
            .register_attribute(HtmlBehaviorResource::template_controller("when"))
            .unwrap();
        let factory = compile(
            "<div when.bind=\"visible\" title.bind=\"t\">body</div>",
            &resources,
        );

        // exactly one instruction for the node: the lifted one
        assert_eq!(factory.instructions().len(), 1);
        let lifted = match factory.instructions().values().next().unwrap() {
            TargetInstruction::Lifted(instruction) => instruction,
            other => panic!("expected lift, got {}", other.kind_name()),
        };
        let inner = lifted.view_factory.as_ref().expect("nested factory");
        // the remaining bound attribute compiled inside the nested factory
        assert_eq!(inner.instructions().len(), 1);
        match inner.instructions().values().next().unwrap() {
            TargetInstruction::Behaviors { bindings, .. } => {
                assert_eq!(bindings[0].0, "title");
            }
            other => panic!("unexpected inner instruction {}", other.kind_name()),
        }
    }

    #[test]
    fn test_slot_rewrite_with_fallback_factory() {
        let factory = compile(
            "<div><slot name=\"items\"><em>empty</em></slot></div>",
            &root(),
        );
        let slot = factory
            .instructions()
            .values()
            .find(|i| i.kind_name() == "slot")
            .expect("slot instruction");
        match slot {
            TargetInstruction::Slot { name, destination, fallback } => {
                assert_eq!(name, "items");
                assert!(destination.is_none());
                assert!(fallback.is_some());
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_let_element_compiles_expressions() {
        let factory = compile("<let total.bind=\"count\"></let>", &root());
        match factory.instructions().values().next().unwrap() {
            TargetInstruction::LetElement(expressions) => {
                assert_eq!(expressions.len(), 1);
                assert_eq!(expressions[0].target, "total");
            }
            other => panic!("unexpected instruction {}", other.kind_name()),
        }
    }

    #[test]
    fn test_content_wrapped_for_non_shadow_element() {
        let resources = root();
        resources
            .register_element(HtmlBehaviorResource::element("my-panel").with_inline_view("<div><slot></slot></div>"))
            .unwrap();
        let factory = compile("<my-panel><p>light</p></my-panel>", &resources);
        let marked = factory.template().find_marked(TARGET_CLASS);
        let panel = marked
            .iter()
            .find(|n| n.node_name() == "my-panel")
            .expect("panel marked");
        let content = panel.first_child().unwrap();
        assert_eq!(content.node_name(), CONTENT_ELEMENT);
        assert_eq!(content.first_child().unwrap().node_name(), "p");
    }

    #[test]
    fn test_replace_part_extracted_before_content() {
        let resources = root();
        resources
            .register_element(HtmlBehaviorResource::element("my-panel").with_inline_view("<slot></slot>"))
            .unwrap();
        let factory = compile(
            "<my-panel><template replace-part=\"header\"><b>H</b></template><p>body</p></my-panel>",
            &resources,
        );
        match factory.instructions().values().next().unwrap() {
            TargetInstruction::Behaviors { element, .. } => {
                let element = element.as_ref().unwrap();
                assert!(element.part_replacements.contains_key("header"));
            }
            other => panic!("unexpected instruction {}", other.kind_name()),
        }
    }

    #[test]
    fn test_template_controller_on_surrogate_is_fatal() {
        let resources = root();
        resources
            .register_attribute(HtmlBehaviorResource::template_controller("when"))
            .unwrap();
        let err = ViewCompiler::new()
            .compile_markup(
                "<template when.bind=\"x\"><div></div></template>",
                &resources,
                Some(ViewCompileInstruction::for_component()),
            )
            .unwrap_err();
        assert!(err.to_string().contains("surrogate"), "{}", err);
    }

    #[test]
    fn test_surrogate_values_and_bindings_collected() {
        let factory = ViewCompiler::new()
            .compile_markup(
                "<template class=\"card\" title.bind=\"t\"><div></div></template>",
                &root(),
                Some(ViewCompileInstruction::for_component()),
            )
            .unwrap();
        let surrogate = factory.surrogate();
        assert_eq!(surrogate.values.len(), 1);
        assert_eq!(surrogate.values[0].0, "class");
        assert_eq!(surrogate.bindings.len(), 1);
        assert_eq!(surrogate.bindings[0].0, "title");
    }

    #[test]
    fn test_target_ids_document_order() {
        let factory = compile(
            "<div title.bind=\"a\"><span class.bind=\"b\"></span></div><p id.bind=\"c\"></p>",
            &root(),
        );
        let marked = factory.template().find_marked(TARGET_CLASS);
        let ids: Vec<String> = marked
            .iter()
            .map(|n| n.get_attribute(TARGET_ID_ATTRIBUTE).unwrap())
            .collect();
        assert_eq!(ids, vec!["0", "1", "2"]);
    }

    #[test]
    fn test_as_element_resolves_resource() {
        let resources = root();
        resources
            .register_element(HtmlBehaviorResource::element("my-row"))
            .unwrap();
        let factory = compile("<tr as-element=\"my-row\"></tr>", &resources);
        match factory.instructions().values().next().unwrap() {
            TargetInstruction::Behaviors { element, .. } => {
                assert_eq!(element.as_ref().unwrap().behavior.name, "my-row");
            }
            other => panic!("unexpected instruction {}", other.kind_name()),
        }
    }

    #[test]
    fn test_custom_attribute_options_syntax() {
        let resources = root();
        resources
            .register_attribute(
                HtmlBehaviorResource::attribute("pin")
                    .with_bindable(BindableProperty::new("top").primary())
                    .with_bindable(BindableProperty::new("left")),
            )
            .unwrap();
        let factory = compile("<div pin=\"top: 1; left: 2\"></div>", &resources);
        match factory.instructions().values().next().unwrap() {
            TargetInstruction::Behaviors { attributes, .. } => {
                let pin = &attributes[0];
                assert!(pin.attribute("top").is_some());
                assert!(pin.attribute("left").is_some());
            }
            other => panic!("unexpected instruction {}", other.kind_name()),
        }
    }
}
