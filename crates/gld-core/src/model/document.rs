//! Structured interchange document import and export.
//!
//! Each item kind is registered once in [`KINDS`] with the document section
//! it lives in and its loader. Loading a document runs every registered
//! loader in table order; each one may add zero or more items.
//!
//! Section entries are keyed by item name. When the key is not the name
//! (duplicate names, unnamed items) the entry carries its own `name`, with
//! `null` marking an unnamed item.

use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::collection::GldModel;
use super::error::{ModelError, ModelResult};
use super::item::{ItemType, ModelItem, is_reserved, value_to_text};

/// Separator between a module name and one of its globals.
pub const NAMESPACE_SEPARATOR: &str = "::";

/// Adds the items of one kind found in a document; returns how many.
pub type Loader = fn(&mut GldModel, &Map<String, Value>) -> ModelResult<usize>;

/// Registration of one item kind.
#[derive(Debug, Clone, Copy)]
pub struct ItemKind {
    pub itype: ItemType,
    /// Top-level document key holding items of this kind.
    pub section: &'static str,
    pub loader: Loader,
}

/// Every item kind, in load order.
pub static KINDS: &[ItemKind] = &[
    ItemKind {
        itype: ItemType::Clock,
        section: "clock",
        loader: load_clock,
    },
    ItemKind {
        itype: ItemType::Global,
        section: "globals",
        loader: load_globals,
    },
    ItemKind {
        itype: ItemType::Module,
        section: "modules",
        loader: load_modules,
    },
    ItemKind {
        itype: ItemType::Include,
        section: "includes",
        loader: load_includes,
    },
    ItemKind {
        itype: ItemType::Class,
        section: "classes",
        loader: load_classes,
    },
    ItemKind {
        itype: ItemType::Schedule,
        section: "schedules",
        loader: load_schedules,
    },
    ItemKind {
        itype: ItemType::Filter,
        section: "filters",
        loader: load_filters,
    },
    ItemKind {
        itype: ItemType::Template,
        section: "templates",
        loader: load_templates,
    },
    ItemKind {
        itype: ItemType::Input,
        section: "inputs",
        loader: load_inputs,
    },
    ItemKind {
        itype: ItemType::Object,
        section: "objects",
        loader: load_objects,
    },
    ItemKind {
        itype: ItemType::Comment,
        section: "comments",
        loader: load_comments,
    },
    ItemKind {
        itype: ItemType::Output,
        section: "outputs",
        loader: load_outputs,
    },
    ItemKind {
        itype: ItemType::Group,
        section: "groups",
        loader: load_groups,
    },
    ItemKind {
        itype: ItemType::Code,
        section: "code",
        loader: load_code,
    },
    ItemKind {
        itype: ItemType::Source,
        section: "sources",
        loader: load_sources,
    },
];

/// Registration entry for an item type.
pub fn kind_of(itype: ItemType) -> &'static ItemKind {
    KINDS
        .iter()
        .find(|kind| kind.itype == itype)
        .unwrap_or_else(|| unreachable!("item type {itype} is not registered"))
}

fn section<'a>(doc: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    doc.get(name).filter(|v| !v.is_null())
}

fn section_object<'a>(
    doc: &'a Map<String, Value>,
    name: &str,
) -> ModelResult<Option<&'a Map<String, Value>>> {
    match section(doc, name) {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(ModelError::document(format!(
            "section '{name}' must be an object"
        ))),
    }
}

/// Build an item from a section entry.
///
/// The name is the entry's own `name` when it has one (`null` for none),
/// otherwise the section key. A scalar entry becomes the `value` entry.
fn named_item(itype: ItemType, key: &str, entry: &Value) -> ModelItem {
    let name = match entry.get("name") {
        None => Some(key.to_string()),
        Some(Value::Null) => None,
        Some(other) => Some(value_to_text(other)),
    };
    let mut item = ModelItem::empty(itype);
    if let Some(name) = name {
        item.insert("name", name);
    }
    match entry {
        Value::Object(props) => item.set_data(
            props
                .iter()
                .filter(|(k, _)| k.as_str() != "name" && !is_reserved(k))
                .map(|(k, v)| (k.clone(), value_to_text(v))),
        ),
        Value::Null => {}
        scalar => item.insert("value", value_to_text(scalar)),
    }
    item
}

fn load_named_section(
    model: &mut GldModel,
    doc: &Map<String, Value>,
    itype: ItemType,
) -> ModelResult<usize> {
    let Some(entries) = section_object(doc, kind_of(itype).section)? else {
        return Ok(0);
    };
    for (name, entry) in entries {
        model.push(named_item(itype, name, entry));
    }
    Ok(entries.len())
}

fn load_clock(model: &mut GldModel, doc: &Map<String, Value>) -> ModelResult<usize> {
    let Some(clock) = section_object(doc, "clock")? else {
        return Ok(0);
    };
    model.push(ModelItem::from_json_map(ItemType::Clock, clock));
    Ok(1)
}

/// Plain globals only; namespaced ones belong to their module.
fn load_globals(model: &mut GldModel, doc: &Map<String, Value>) -> ModelResult<usize> {
    let Some(globals) = section_object(doc, "globals")? else {
        return Ok(0);
    };
    let mut count = 0;
    for (name, entry) in globals {
        if name.contains(NAMESPACE_SEPARATOR) {
            continue;
        }
        model.push(named_item(ItemType::Global, name, entry));
        count += 1;
    }
    Ok(count)
}

fn global_value(entry: &Value) -> String {
    match entry {
        Value::Object(props) => props.get("value").map(value_to_text).unwrap_or_default(),
        other => value_to_text(other),
    }
}

fn load_modules(model: &mut GldModel, doc: &Map<String, Value>) -> ModelResult<usize> {
    let mut modules: Vec<ModelItem> = match section(doc, "modules") {
        None => Vec::new(),
        Some(Value::Array(names)) => names
            .iter()
            .map(|name| match name {
                Value::String(name) => Ok(ModelItem::new(ItemType::Module, [("name", name)])),
                other => Err(ModelError::document(format!(
                    "module name must be a string, got {other}"
                ))),
            })
            .collect::<ModelResult<_>>()?,
        // Version entries such as `major`/`minor` are not module properties.
        Some(Value::Object(entries)) => entries
            .keys()
            .map(|name| ModelItem::new(ItemType::Module, [("name", name)]))
            .collect(),
        Some(_) => {
            return Err(ModelError::document(
                "section 'modules' must be a list or an object",
            ));
        }
    };

    if let Some(globals) = section_object(doc, "globals")? {
        let index: HashMap<String, usize> = modules
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.name().map(|n| (n.to_string(), i)))
            .collect();
        for (name, entry) in globals {
            let Some((module, property)) = name.split_once(NAMESPACE_SEPARATOR) else {
                continue;
            };
            match index.get(module) {
                Some(&i) => modules[i].insert(property, global_value(entry)),
                None => warn!(global = %name, "dropping global of a module that is not loaded"),
            }
        }
    }

    let count = modules.len();
    for module in modules {
        model.push(module);
    }
    Ok(count)
}

fn load_includes(model: &mut GldModel, doc: &Map<String, Value>) -> ModelResult<usize> {
    match section(doc, "includes") {
        None => Ok(0),
        Some(Value::Array(files)) => {
            for file in files {
                let name = value_to_text(file);
                model.push(ModelItem::new(ItemType::Include, [("name", name)]));
            }
            Ok(files.len())
        }
        Some(Value::Object(_)) => load_named_section(model, doc, ItemType::Include),
        Some(_) => Err(ModelError::document(
            "section 'includes' must be a list or an object",
        )),
    }
}

fn load_classes(model: &mut GldModel, doc: &Map<String, Value>) -> ModelResult<usize> {
    load_named_section(model, doc, ItemType::Class)
}

fn load_schedules(model: &mut GldModel, doc: &Map<String, Value>) -> ModelResult<usize> {
    load_named_section(model, doc, ItemType::Schedule)
}

fn load_filters(model: &mut GldModel, doc: &Map<String, Value>) -> ModelResult<usize> {
    load_named_section(model, doc, ItemType::Filter)
}

fn load_templates(model: &mut GldModel, doc: &Map<String, Value>) -> ModelResult<usize> {
    load_named_section(model, doc, ItemType::Template)
}

fn load_inputs(model: &mut GldModel, doc: &Map<String, Value>) -> ModelResult<usize> {
    load_named_section(model, doc, ItemType::Input)
}

fn load_outputs(model: &mut GldModel, doc: &Map<String, Value>) -> ModelResult<usize> {
    load_named_section(model, doc, ItemType::Output)
}

fn load_groups(model: &mut GldModel, doc: &Map<String, Value>) -> ModelResult<usize> {
    load_named_section(model, doc, ItemType::Group)
}

fn load_code(model: &mut GldModel, doc: &Map<String, Value>) -> ModelResult<usize> {
    load_named_section(model, doc, ItemType::Code)
}

fn load_sources(model: &mut GldModel, doc: &Map<String, Value>) -> ModelResult<usize> {
    load_named_section(model, doc, ItemType::Source)
}

/// Objects, with each `parent` property resolved to the parent's id.
fn load_objects(model: &mut GldModel, doc: &Map<String, Value>) -> ModelResult<usize> {
    let Some(objects) = section_object(doc, "objects")? else {
        return Ok(0);
    };
    let mut added = Vec::with_capacity(objects.len());
    let mut by_name: HashMap<String, u64> = HashMap::with_capacity(objects.len());
    for (key, entry) in objects {
        let item = named_item(ItemType::Object, key, entry);
        let name = item.name().map(str::to_string);
        let id = model.push(item);
        if let Some(name) = name {
            // first object wins a duplicated name
            by_name.entry(name).or_insert(id);
        }
        added.push(id);
    }

    for id in &added {
        let Some(item) = model.get_item_mut(*id) else {
            continue;
        };
        let parent = item.get("parent").and_then(|p| by_name.get(p)).copied();
        if let Some(parent) = parent {
            item.set_iparent(Some(parent.to_string()));
        }
    }
    Ok(added.len())
}

fn load_comments(model: &mut GldModel, doc: &Map<String, Value>) -> ModelResult<usize> {
    match section(doc, "comments") {
        None => Ok(0),
        Some(Value::Array(lines)) => {
            for line in lines {
                model.push(ModelItem::new(
                    ItemType::Comment,
                    [("text", value_to_text(line))],
                ));
            }
            Ok(lines.len())
        }
        Some(Value::String(text)) => {
            model.push(ModelItem::new(ItemType::Comment, [("text", text)]));
            Ok(1)
        }
        Some(_) => Err(ModelError::document(
            "section 'comments' must be a list or a string",
        )),
    }
}

/// Run every registered loader against `doc`.
pub(crate) fn load_document(model: &mut GldModel, doc: &Map<String, Value>) -> ModelResult<usize> {
    let mut total = 0;
    for kind in KINDS {
        let count = (kind.loader)(model, doc)?;
        debug!(itype = %kind.itype, count, "loaded items");
        total += count;
    }
    Ok(total)
}

/// Payload of a section entry stored under `key`.
///
/// The name is carried inside the entry when the key does not give it.
fn section_payload(item: &ModelItem, key: &str) -> Value {
    let mut payload: Map<String, Value> = item
        .data()
        .iter()
        .filter(|(k, _)| k.as_str() != "name")
        .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
        .collect();
    match item.name() {
        Some(name) if name == key => {}
        Some(name) => {
            payload.insert("name".to_string(), Value::from(name));
        }
        None => {
            payload.insert("name".to_string(), Value::Null);
        }
    }
    Value::Object(payload)
}

/// A key not yet used in `section`, starting from `base`.
fn unique_key(section: &Map<String, Value>, base: &str, iid: Option<&str>) -> String {
    if !section.contains_key(base) {
        return base.to_string();
    }
    let stem = iid.map_or_else(|| base.to_string(), |iid| format!("{base}:{iid}"));
    if !section.contains_key(&stem) {
        return stem;
    }
    let mut n = 2_u64;
    loop {
        let key = format!("{stem}:{n}");
        if !section.contains_key(&key) {
            return key;
        }
        n += 1;
    }
}

fn section_entry<'a>(doc: &'a mut Map<String, Value>, name: &str) -> &'a mut Map<String, Value> {
    let entry = doc
        .entry(name.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    match entry {
        Value::Object(map) => map,
        _ => unreachable!("section entry was just made an object"),
    }
}

/// Build the interchange document for a collection.
pub(crate) fn export_document(model: &GldModel) -> Value {
    let mut doc = Map::new();
    doc.insert(
        "application".to_string(),
        Value::from(model.settings().application.as_str()),
    );

    let mut modules = Vec::new();
    let mut comments = Vec::new();
    for (id, item) in model.items() {
        match item.itype() {
            ItemType::Clock => {
                doc.insert("clock".to_string(), item.to_json(false));
            }
            ItemType::Comment => {
                comments.push(Value::from(item.get("text").unwrap_or_default()));
            }
            ItemType::Module => {
                let Some(name) = item.name() else {
                    warn!(id, "module without a name skipped on export");
                    continue;
                };
                modules.push(Value::from(name));
                let globals = section_entry(&mut doc, "globals");
                for (property, value) in item.data().iter().filter(|(k, _)| k.as_str() != "name") {
                    let mut entry = Map::new();
                    entry.insert("value".to_string(), Value::from(value.as_str()));
                    globals.insert(
                        format!("{name}{NAMESPACE_SEPARATOR}{property}"),
                        Value::Object(entry),
                    );
                }
            }
            itype => {
                let base = item
                    .name()
                    .map_or_else(|| format!("{itype}:{id}"), str::to_string);
                let section = section_entry(&mut doc, kind_of(itype).section);
                let key = unique_key(section, &base, item.iid());
                if key != base {
                    debug!(%itype, id, key = %key, "section key differs from item name");
                }
                let payload = section_payload(item, &key);
                section.insert(key, payload);
            }
        }
    }
    if !modules.is_empty() {
        doc.insert("modules".to_string(), Value::Array(modules));
    }
    if !comments.is_empty() {
        doc.insert("comments".to_string(), Value::Array(comments));
    }
    debug!(sections = doc.len(), "exported document");
    Value::Object(doc)
}
