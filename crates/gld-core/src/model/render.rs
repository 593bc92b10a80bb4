//! GLM rendering for model items.
//!
//! Every item starts with a one-line tag comment carrying its attributes.
//! Kinds with a GLM syntax of their own append their block after the tag;
//! the rest append a `#warning` and their properties as comment lines.

use serde_json::{Map, Value, json};
use std::fmt::Write as _;
use std::sync::LazyLock;

use super::item::{ItemType, ModelItem};
use crate::settings::ModelSettings;

static DEFAULT_SETTINGS: LazyLock<ModelSettings> = LazyLock::new(ModelSettings::default);

/// Access level a global needs before it is written as `#set`.
pub const PUBLIC_ACCESS: &str = "PUBLIC";

const INDENT: &str = "    ";

impl ModelItem {
    /// Render the item as GLM with the default hidden sets.
    pub fn glm(&self) -> String {
        self.glm_with(&DEFAULT_SETTINGS)
    }

    /// Render the item as GLM.
    pub fn glm_with(&self, settings: &ModelSettings) -> String {
        let mut out = self.tag_comment();
        let body = match self.itype() {
            ItemType::Module => render_module(self),
            ItemType::Class => render_named_block(self, "class"),
            ItemType::Object => render_object(self, settings),
            ItemType::Clock => Some(render_block("clock", self.data().iter())),
            ItemType::Global => render_global(self, settings),
            ItemType::Include => render_include(self),
            ItemType::Input => render_input(self),
            ItemType::Comment => render_comment(self),
            ItemType::Filter
            | ItemType::Schedule
            | ItemType::Template
            | ItemType::Output
            | ItemType::Group
            | ItemType::Code
            | ItemType::Source => Some(render_unprocessed(self)),
        };
        if let Some(body) = body {
            out.push_str(&body);
        }
        out
    }

    /// The `// {"ITYPE":..,"IPARENT":..,"IID":..}` line.
    pub fn tag_comment(&self) -> String {
        let tag = json!({
            "ITYPE": self.itype().as_str(),
            "IPARENT": self.iparent(),
            "IID": self.iid(),
        });
        format!("// {tag}\n")
    }
}

fn render_block<'a>(header: &str, entries: impl Iterator<Item = (&'a String, &'a String)>) -> String {
    let mut out = format!("{header} {{\n");
    for (key, value) in entries {
        let _ = writeln!(out, "{INDENT}{key} \"{value}\";");
    }
    out.push_str("}\n");
    out
}

fn render_named_block(item: &ModelItem, keyword: &str) -> Option<String> {
    let name = item.name()?;
    let entries = item.data().iter().filter(|(k, _)| k.as_str() != "name");
    Some(render_block(&format!("{keyword} {name}"), entries))
}

fn render_module(item: &ModelItem) -> Option<String> {
    let name = item.name()?;
    if item.data().keys().all(|k| k == "name") {
        return Some(format!("module {name};\n"));
    }
    render_named_block(item, "module")
}

fn render_object(item: &ModelItem, settings: &ModelSettings) -> Option<String> {
    let class = item.get("class")?;
    let header = match item.name() {
        Some(name) => format!("object {class}:{name}"),
        None => format!("object {class}"),
    };
    let entries = item
        .data()
        .iter()
        .filter(|(k, _)| k.as_str() != "name" && !settings.is_hidden_property(k));
    Some(render_block(&header, entries))
}

fn render_global(item: &ModelItem, settings: &ModelSettings) -> Option<String> {
    let name = item.name()?;
    let value = item.get("value").unwrap_or_default();
    let access = item.get("access");
    let initial = item.get("initial");

    let settable = !settings.is_hidden_global(name)
        && access == Some(PUBLIC_ACCESS)
        && initial != Some(value)
        && !value.is_empty();

    if settable {
        Some(format!("#set {name}={value}\n"))
    } else {
        Some(format!(
            "// global {name}=\"{value}\" not set (access {}, initial \"{}\")\n",
            access.unwrap_or("none"),
            initial.unwrap_or_default(),
        ))
    }
}

fn render_include(item: &ModelItem) -> Option<String> {
    let name = item.name()?;
    let args: Vec<String> = item
        .data()
        .iter()
        .filter(|(k, _)| k.as_str() != "name")
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    if args.is_empty() {
        Some(format!("#include \"{name}\";\n"))
    } else {
        Some(format!("#include using({}) \"{name}\";\n", args.join(",")))
    }
}

fn render_input(item: &ModelItem) -> Option<String> {
    let name = item.name()?;
    let mut out = format!("#input \"{name}\"");
    for (key, value) in item.data().iter().filter(|(k, _)| k.as_str() != "name") {
        let _ = write!(out, " --{key} {value}");
    }
    out.push_str(";\n");
    Some(out)
}

fn render_comment(item: &ModelItem) -> Option<String> {
    let text = item.get("text")?;
    Some(text.lines().map(|line| format!("// {line}\n")).collect())
}

/// Warn that the item is not rendered and keep its properties as comments.
fn render_unprocessed(item: &ModelItem) -> String {
    let label = item.name().map(|name| format!(" {name}")).unwrap_or_default();
    let props: Map<String, Value> = item
        .data()
        .iter()
        .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
        .collect();
    let pretty = serde_json::to_string_pretty(&Value::Object(props)).unwrap_or_default();

    let mut out = format!("#warning {}{label} not processed\n", item.itype());
    for line in pretty.lines() {
        let _ = writeln!(out, "// {line}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(itype: ItemType, payload: &[(&str, &str)]) -> ModelItem {
        ModelItem::new(itype, payload.iter().copied())
    }

    #[test]
    fn test_tag_comment_shape() {
        let module = item(ItemType::Module, &[("name", "m"), ("iid", "12")]);
        assert_eq!(
            module.tag_comment(),
            "// {\"ITYPE\":\"module\",\"IPARENT\":null,\"IID\":\"12\"}\n"
        );
    }

    #[test]
    fn test_module_block() {
        for name in ["powerflow", "tape", "x"] {
            let module = item(ItemType::Module, &[("name", name), ("value", "123")]);
            let expected = format!(
                "{}module {name} {{\n    value \"123\";\n}}\n",
                module.tag_comment()
            );
            assert_eq!(module.glm(), expected);
        }
    }

    #[test]
    fn test_module_without_properties() {
        let module = item(ItemType::Module, &[("name", "climate")]);
        assert!(module.glm().ends_with("module climate;\n"));
    }

    #[test]
    fn test_object_hides_properties() {
        let object = item(
            ItemType::Object,
            &[
                ("name", "n1"),
                ("class", "node"),
                ("id", "4"),
                ("rank", "1"),
                ("flags", "0"),
                ("phases", "ABC"),
            ],
        );
        let glm = object.glm();
        assert!(glm.contains("object node:n1 {\n    phases \"ABC\";\n}\n"));
        assert!(!glm.contains("rank"));
        assert!(!glm.contains("flags"));
    }

    #[test]
    fn test_object_hidden_set_is_configurable() {
        let object = item(
            ItemType::Object,
            &[("class", "meter"), ("rank", "2"), ("phases", "AN")],
        );
        let mut settings = ModelSettings::default();
        settings.hidden_properties.remove("rank");
        settings.hidden_properties.insert("phases".to_string());
        assert!(object
            .glm_with(&settings)
            .contains("object meter {\n    rank \"2\";\n}\n"));
    }

    #[test]
    fn test_clock_block() {
        let clock = item(
            ItemType::Clock,
            &[("timezone", "PST+8PDT"), ("starttime", "2020-01-01 00:00:00")],
        );
        assert!(clock.glm().ends_with(
            "clock {\n    timezone \"PST+8PDT\";\n    starttime \"2020-01-01 00:00:00\";\n}\n"
        ));
    }

    #[test]
    fn test_global_requires_public_access() {
        let global = item(
            ItemType::Global,
            &[("name", "x"), ("value", "2"), ("initial", "1"), ("access", "PROTECTED")],
        );
        let glm = global.glm();
        assert!(!glm.contains("#set"));
        assert!(glm.contains("access PROTECTED"));
    }

    #[test]
    fn test_global_unchanged_value_not_set() {
        let global = item(
            ItemType::Global,
            &[("name", "x"), ("value", "1"), ("initial", "1"), ("access", "PUBLIC")],
        );
        assert!(!global.glm().contains("#set"));
    }

    #[test]
    fn test_global_empty_value_not_set() {
        let global = item(
            ItemType::Global,
            &[("name", "x"), ("value", ""), ("initial", "1"), ("access", "PUBLIC")],
        );
        assert!(!global.glm().contains("#set"));
    }

    #[test]
    fn test_global_changed_value_is_set() {
        let global = item(
            ItemType::Global,
            &[("name", "x"), ("value", "2"), ("initial", "1"), ("access", "PUBLIC")],
        );
        assert!(global.glm().ends_with("#set x=2\n"));
    }

    #[test]
    fn test_hidden_global_not_set() {
        let global = item(
            ItemType::Global,
            &[("name", "pid"), ("value", "99"), ("initial", "0"), ("access", "PUBLIC")],
        );
        assert!(!global.glm().contains("#set"));
    }

    #[test]
    fn test_include_forms() {
        let plain = item(ItemType::Include, &[("name", "lib.glm")]);
        assert!(plain.glm().ends_with("#include \"lib.glm\";\n"));

        let using = item(
            ItemType::Include,
            &[("name", "feeder.glm"), ("A", "1"), ("B", "x")],
        );
        assert!(using.glm().ends_with("#include using(A=1,B=x) \"feeder.glm\";\n"));
    }

    #[test]
    fn test_input_macro() {
        let input = item(ItemType::Input, &[("name", "data.csv"), ("format", "csv")]);
        assert!(input.glm().ends_with("#input \"data.csv\" --format csv;\n"));
    }

    #[test]
    fn test_comment_lines() {
        let comment = item(ItemType::Comment, &[("text", "first\nsecond")]);
        assert!(comment.glm().ends_with("// first\n// second\n"));
    }

    #[test]
    fn test_kinds_without_syntax_warn_and_keep_properties() {
        let filter = item(ItemType::Filter, &[("name", "f1"), ("domain", "z")]);
        let expected = format!(
            "{}#warning filter f1 not processed\n// {{\n//   \"name\": \"f1\",\n//   \"domain\": \"z\"\n// }}\n",
            filter.tag_comment()
        );
        assert_eq!(filter.glm(), expected);
    }

    #[test]
    fn test_unprocessed_kinds_never_emit_glm_statements() {
        for itype in [
            ItemType::Schedule,
            ItemType::Template,
            ItemType::Output,
            ItemType::Group,
            ItemType::Code,
            ItemType::Source,
        ] {
            let glm = item(itype, &[("name", "x"), ("path", "a\nb")]).glm();
            assert!(glm.contains(&format!("#warning {itype} x not processed\n")));
            let body: Vec<&str> = glm.lines().skip(2).collect();
            assert!(body.iter().all(|line| line.starts_with("// ")));
            assert!(body.iter().any(|line| line.contains("\"path\": \"a\\nb\"")));
        }
    }
}
