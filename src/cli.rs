//! Command-line interface for the Weft template compiler
//!
//! Compiles templates ahead of time for inspection: dump instruction
//! tables, validate whole template directories, print statistics, and
//! recompile on change. Behaviors a template depends on are declared as
//! stubs in a `weft.toml` project file.

use crate::behavior::HtmlBehaviorResource;
use crate::bindable::BindableProperty;
use crate::binding::AttributeValue;
use crate::error::{Result, TemplatingError};
use crate::instruction::{TargetInstruction, ViewCompileInstruction};
use crate::resources::ViewResources;
use crate::view_factory::ViewFactory;
use crate::{compile_file, NAME, VERSION};
use clap::{Arg, ArgAction, Command, ValueEnum};
use notify::{RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::sync::mpsc::channel;
use std::time::Duration;
use walkdir::WalkDir;

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    /// Instruction table as JSON
    Json,
    /// Human-readable debug format
    Debug,
    /// The rewritten instructable template markup
    Html,
}

/// Project file declaring the behaviors templates may reference.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    elements: Option<Vec<String>>,
    attributes: Option<Vec<String>>,
    template_controllers: Option<Vec<String>>,
    attribute_aliases: Option<HashMap<String, String>>,
    compile_surrogate: Option<bool>,
}

pub struct Cli {
    config: ConfigFile,
}

impl Cli {
    pub fn new() -> Self {
        Self {
            config: ConfigFile::default(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let matches = self.build_cli().get_matches();

        if let Some(config_path) = matches.get_one::<String>("config") {
            self.load_config_file(config_path)?;
        } else if Path::new("weft.toml").exists() {
            self.load_config_file("weft.toml")?;
        }

        match matches.subcommand() {
            Some(("compile", sub_matches)) => {
                let input = sub_matches.get_one::<String>("input").unwrap();
                let format = sub_matches
                    .get_one::<OutputFormat>("format")
                    .cloned()
                    .unwrap_or(OutputFormat::Debug);
                self.handle_compile(input, &format)
            }
            Some(("check", sub_matches)) => {
                let dir = sub_matches.get_one::<String>("dir").unwrap();
                self.handle_check(dir)
            }
            Some(("analyze", sub_matches)) => {
                let input = sub_matches.get_one::<String>("input").unwrap();
                self.handle_analyze(input)
            }
            Some(("watch", sub_matches)) => {
                let input = sub_matches.get_one::<String>("input").unwrap();
                self.handle_watch(input)
            }
            _ => {
                eprintln!("No subcommand given; try '{} --help'", NAME);
                Ok(())
            }
        }
    }

    fn build_cli(&self) -> Command {
        Command::new(NAME)
            .version(VERSION)
            .about("Weft template compiler - inspect templates as instruction tables")
            .arg(
                Arg::new("config")
                    .long("config")
                    .short('c')
                    .help("Project file with behavior stubs (default: weft.toml)")
                    .action(ArgAction::Set),
            )
            .subcommand(
                Command::new("compile")
                    .about("Compile one template and dump its instruction table")
                    .arg(Arg::new("input").required(true))
                    .arg(
                        Arg::new("format")
                            .long("format")
                            .short('f')
                            .value_parser(clap::builder::EnumValueParser::<OutputFormat>::new())
                            .help("Output format"),
                    ),
            )
            .subcommand(
                Command::new("check")
                    .about("Compile every .html template under a directory")
                    .arg(Arg::new("dir").required(true)),
            )
            .subcommand(
                Command::new("analyze")
                    .about("Print compilation statistics for a template")
                    .arg(Arg::new("input").required(true)),
            )
            .subcommand(
                Command::new("watch")
                    .about("Recompile a template whenever it changes")
                    .arg(Arg::new("input").required(true)),
            )
    }

    fn load_config_file(&mut self, path: &str) -> Result<()> {
        let content = fs::read_to_string(path)?;
        self.config = toml::from_str(&content).map_err(|e| TemplatingError::InvalidFormat {
            message: format!("{}: {}", path, e),
        })?;
        log::debug!("Loaded project config from {}", path);
        Ok(())
    }

    /// Registry with stub behaviors for everything the config declares.
    fn build_resources(&self) -> Result<Rc<ViewResources>> {
        let resources = Rc::new(ViewResources::root());
        for name in self.config.elements.iter().flatten() {
            resources.register_element(
                HtmlBehaviorResource::element(name)
                    .with_bindable(BindableProperty::new("value").primary())
                    .with_dynamic_options(),
            )?;
        }
        for name in self.config.attributes.iter().flatten() {
            resources.register_attribute(HtmlBehaviorResource::attribute(name))?;
        }
        for name in self.config.template_controllers.iter().flatten() {
            resources.register_attribute(HtmlBehaviorResource::template_controller(name))?;
        }
        for (alias, target) in self.config.attribute_aliases.iter().flatten() {
            resources.register_attribute_alias(alias, target);
        }
        Ok(resources)
    }

    fn compile_instruction(&self) -> Option<ViewCompileInstruction> {
        if self.config.compile_surrogate.unwrap_or(false) {
            Some(ViewCompileInstruction::for_component())
        } else {
            None
        }
    }

    fn handle_compile(&self, input: &str, format: &OutputFormat) -> Result<()> {
        let resources = self.build_resources()?;
        let (factory, stats) = compile_file(input, &resources, self.compile_instruction())?;

        match format {
            OutputFormat::Json => {
                let dump = serde_json::json!({
                    "template": input,
                    "stats": stats,
                    "instructions": describe_factory(&factory),
                });
                println!("{}", serde_json::to_string_pretty(&dump).unwrap());
            }
            OutputFormat::Debug => {
                println!("{} v{}", NAME, VERSION);
                println!("Compiled '{}': {} targets", input, factory.instructions().len());
                print_factory(&factory, 0);
            }
            OutputFormat::Html => {
                println!("{}", factory.template().outer_html());
            }
        }
        Ok(())
    }

    fn handle_check(&self, dir: &str) -> Result<()> {
        let resources = self.build_resources()?;
        let mut checked = 0usize;
        let mut failed = 0usize;

        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }
            checked += 1;
            let path_str = path.to_string_lossy();
            match compile_file(&path_str, &resources, self.compile_instruction()) {
                Ok((_, stats)) => {
                    println!("ok   {} ({} targets)", path_str, stats.target_count)
                }
                Err(e) => {
                    failed += 1;
                    eprintln!("FAIL {}: {}", path_str, e);
                }
            }
        }

        println!("{} templates checked, {} failed", checked, failed);
        if failed > 0 {
            return Err(TemplatingError::compile(
                dir.to_string(),
                format!("{} template(s) failed to compile", failed),
            ));
        }
        Ok(())
    }

    fn handle_analyze(&self, input: &str) -> Result<()> {
        let resources = self.build_resources()?;
        let (_, stats) = compile_file(input, &resources, self.compile_instruction())?;
        println!("Template: {}", input);
        println!("  targets:          {}", stats.target_count);
        println!("  behaviors:        {}", stats.behavior_count);
        println!("  expressions:      {}", stats.expression_count);
        println!("  slots:            {}", stats.slot_count);
        println!("  lifted templates: {}", stats.lifted_count);
        println!("  let bindings:     {}", stats.let_count);
        println!("  nested factories: {}", stats.nested_factory_count);
        Ok(())
    }

    fn handle_watch(&self, input: &str) -> Result<()> {
        let compile_once = |config: &Cli| match config
            .build_resources()
            .and_then(|r| compile_file(input, &r, config.compile_instruction()))
        {
            Ok((_, stats)) => println!("ok   {} ({} targets)", input, stats.target_count),
            Err(e) => eprintln!("FAIL {}: {}", input, e),
        };
        compile_once(self);

        let (tx, rx) = channel();
        let mut watcher = notify::recommended_watcher(move |event| {
            let _ = tx.send(event);
        })
        .map_err(|e| TemplatingError::configuration(format!("Watcher setup failed: {}", e)))?;
        watcher
            .watch(Path::new(input), RecursiveMode::NonRecursive)
            .map_err(|e| TemplatingError::configuration(format!("Cannot watch '{}': {}", input, e)))?;

        println!("Watching {} (ctrl-c to stop)...", input);
        loop {
            match rx.recv_timeout(Duration::from_millis(500)) {
                Ok(Ok(event)) if event.kind.is_modify() || event.kind.is_create() => {
                    compile_once(self);
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => eprintln!("watch error: {}", e),
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
        Ok(())
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self::new()
    }
}

fn attribute_value_summary(value: &AttributeValue) -> serde_json::Value {
    match value {
        AttributeValue::Literal(text) => serde_json::json!({"literal": text}),
        AttributeValue::Binding { expression, mode } => serde_json::json!({
            "expression": expression.raw(),
            "mode": format!("{:?}", mode),
        }),
        AttributeValue::Interpolation(interpolation) => serde_json::json!({
            "interpolation": interpolation.expression_count(),
        }),
    }
}

/// Instruction table as JSON, nested factories included.
pub fn describe_factory(factory: &ViewFactory) -> serde_json::Value {
    let mut ids: Vec<&String> = factory.instructions().keys().collect();
    ids.sort_by_key(|id| id.parse::<u32>().unwrap_or(u32::MAX));

    let entries: Vec<serde_json::Value> = ids
        .iter()
        .map(|id| {
            let instruction = &factory.instructions()[*id];
            let mut entry = serde_json::json!({
                "target": id,
                "kind": instruction.kind_name(),
            });
            match instruction {
                TargetInstruction::Slot { name, destination, fallback } => {
                    entry["name"] = serde_json::json!(name);
                    if let Some(destination) = destination {
                        entry["destination"] = serde_json::json!(destination);
                    }
                    if let Some(fallback) = fallback {
                        entry["fallback"] = describe_factory(fallback);
                    }
                }
                TargetInstruction::Lifted(behavior) => {
                    entry["behavior"] = serde_json::json!(behavior.behavior.name);
                    if let Some(nested) = &behavior.view_factory {
                        entry["view"] = describe_factory(nested);
                    }
                }
                TargetInstruction::Behaviors { element, attributes, bindings } => {
                    if let Some(element) = element {
                        entry["element"] = serde_json::json!(element.behavior.name);
                    }
                    if !attributes.is_empty() {
                        entry["attributes"] = serde_json::json!(attributes
                            .iter()
                            .map(|a| a.behavior.name.clone())
                            .collect::<Vec<_>>());
                    }
                    if !bindings.is_empty() {
                        let bindings: serde_json::Map<String, serde_json::Value> = bindings
                            .iter()
                            .map(|(name, value)| (name.clone(), attribute_value_summary(value)))
                            .collect();
                        entry["bindings"] = serde_json::Value::Object(bindings);
                    }
                }
                _ => {}
            }
            entry
        })
        .collect();
    serde_json::Value::Array(entries)
}

fn print_factory(factory: &ViewFactory, depth: usize) {
    let indent = "  ".repeat(depth + 1);
    let mut ids: Vec<&String> = factory.instructions().keys().collect();
    ids.sort_by_key(|id| id.parse::<u32>().unwrap_or(u32::MAX));
    for id in ids {
        let instruction = &factory.instructions()[id];
        println!("{}[{}] {}", indent, id, instruction.kind_name());
        match instruction {
            TargetInstruction::Lifted(behavior) => {
                println!("{}  controller: {}", indent, behavior.behavior.name);
                if let Some(nested) = &behavior.view_factory {
                    print_factory(nested, depth + 1);
                }
            }
            TargetInstruction::Slot { name, fallback, .. } => {
                println!("{}  slot: {}", indent, name);
                if let Some(fallback) = fallback {
                    print_factory(fallback, depth + 1);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile_markup_with_stats;
    use tempfile::TempDir;

    #[test]
    fn test_config_round_trip() {
        let toml_source = r#"
elements = ["my-card"]
template_controllers = ["when"]

[attribute_aliases]
"data-toggle" = "toggle"
"#;
        let config: ConfigFile = toml::from_str(toml_source).unwrap();
        assert_eq!(config.elements.as_deref(), Some(&["my-card".to_string()][..]));

        let cli = Cli { config };
        let resources = cli.build_resources().unwrap();
        assert!(resources.get_element("my-card").is_some());
        assert!(resources.get_attribute("when").is_some());
        assert_eq!(resources.map_attribute("data-toggle").as_deref(), Some("toggle"));
    }

    #[test]
    fn test_describe_factory_shape() {
        let resources = Rc::new(ViewResources::root());
        let (factory, _) = compile_markup_with_stats(
            "<a href.bind=\"url\">${label}</a>",
            &resources,
            None,
        )
        .unwrap();
        let dump = describe_factory(&factory);
        let entries = dump.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["kind"], "behaviors");
        assert_eq!(entries[1]["kind"], "content-expression");
        assert!(entries[0]["bindings"]["href"]["expression"].is_string());
    }

    #[test]
    fn test_check_reports_failures() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("good.html"), "<div>${x}</div>").unwrap();
        fs::write(dir.path().join("bad.html"), "<div><span></div>").unwrap();

        let cli = Cli::new();
        let result = cli.handle_check(dir.path().to_str().unwrap());
        assert!(result.is_err());
    }
}
