//! Ordered, uniquely keyed collection of model items.
//!
//! `GldModel` owns its items exclusively. Ids come from the injected
//! [`IdGenerator`]; the order sequence alone decides iteration and GLM
//! emission order.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

use super::document::{export_document, load_document};
use super::error::{ModelError, ModelResult};
use super::ids::{IdGenerator, RandomIds};
use super::item::{ItemType, ModelItem};
use crate::settings::{ModelSettings, validate_settings};

/// Where `add_item` places the new id in the order sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Position {
    /// Append after the last item.
    #[default]
    End,
    /// Insert before the item currently at this index (clamped to the end).
    At(usize),
}

/// A GridLAB-D model as an ordered collection of items.
pub struct GldModel {
    items: HashMap<u64, ModelItem>,
    order: Vec<u64>,
    settings: ModelSettings,
    ids: Box<dyn IdGenerator>,
}

impl fmt::Debug for GldModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GldModel")
            .field("len", &self.order.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Default for GldModel {
    fn default() -> Self {
        Self::new()
    }
}

impl GldModel {
    /// Create an empty model with default settings and random ids.
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
            order: Vec::new(),
            settings: ModelSettings::default(),
            ids: Box::new(RandomIds),
        }
    }

    /// Create an empty model with the given settings.
    pub fn with_settings(settings: ModelSettings) -> ModelResult<Self> {
        validate_settings(&settings)?;
        Ok(Self {
            settings,
            ..Self::new()
        })
    }

    /// Replace the id generator.
    #[must_use]
    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    /// Create a model from an interchange document.
    pub fn from_json(doc: &Value) -> ModelResult<Self> {
        let mut model = Self::new();
        model.load_json(doc)?;
        Ok(model)
    }

    pub const fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.items.contains_key(&id)
    }

    fn fresh_id(&mut self) -> u64 {
        loop {
            let id = self.ids.next_id();
            if !self.items.contains_key(&id) {
                return id;
            }
        }
    }

    /// Add an item and return its id.
    ///
    /// The id is also recorded as the item's `iid`.
    pub fn add_item(&mut self, mut item: ModelItem, at: Position) -> u64 {
        let id = self.fresh_id();
        item.set_iid(Some(id.to_string()));
        self.items.insert(id, item);
        match at {
            Position::End => self.order.push(id),
            Position::At(index) => self.order.insert(index.min(self.order.len()), id),
        }
        id
    }

    /// Append an item and return its id.
    pub fn push(&mut self, item: ModelItem) -> u64 {
        self.add_item(item, Position::End)
    }

    /// Add an item described as a JSON object with an `itype` entry.
    ///
    /// Anything that is not such an object is rejected with
    /// `ModelError::InvalidItem`.
    pub fn add_json_item(&mut self, value: &Value, at: Position) -> ModelResult<u64> {
        let Some(payload) = value.as_object() else {
            return Err(ModelError::InvalidItem(value.to_string()));
        };
        let itype: ItemType = payload
            .get("itype")
            .and_then(Value::as_str)
            .ok_or_else(|| ModelError::InvalidItem(format!("missing itype in {value}")))?
            .parse()?;
        Ok(self.add_item(ModelItem::from_json_map(itype, payload), at))
    }

    /// Remove an item, returning it.
    pub fn del_item(&mut self, id: u64) -> ModelResult<ModelItem> {
        let item = self.items.remove(&id).ok_or(ModelError::NotFound(id))?;
        self.order.retain(|other| *other != id);
        Ok(item)
    }

    pub fn get_item(&self, id: u64) -> Option<&ModelItem> {
        self.items.get(&id)
    }

    pub fn get_item_mut(&mut self, id: u64) -> Option<&mut ModelItem> {
        self.items.get_mut(&id)
    }

    /// Ids in collection order.
    pub fn keys(&self) -> impl Iterator<Item = u64> + '_ {
        self.order.iter().copied()
    }

    /// Items in collection order.
    pub fn values(&self) -> impl Iterator<Item = &ModelItem> + '_ {
        self.items().map(|(_, item)| item)
    }

    /// `(id, item)` pairs in collection order.
    pub fn items(&self) -> impl Iterator<Item = (u64, &ModelItem)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.items.get(id).map(|item| (*id, item)))
    }

    /// First item of the given type whose `name` matches.
    pub fn find_by_name(&self, itype: ItemType, name: &str) -> Option<u64> {
        self.items()
            .find(|(_, item)| item.itype() == itype && item.name() == Some(name))
            .map(|(id, _)| id)
    }

    /// Render the whole model as GLM, in collection order.
    pub fn glm(&self) -> String {
        self.values()
            .map(|item| item.glm_with(&self.settings))
            .collect()
    }

    /// Import items from an interchange document.
    ///
    /// The document must carry the configured application marker. On any
    /// failure no items are added.
    pub fn load_json(&mut self, doc: &Value) -> ModelResult<usize> {
        let Some(map) = doc.as_object() else {
            return Err(ModelError::document("document is not an object"));
        };
        match map.get("application").and_then(Value::as_str) {
            Some(app) if app == self.settings.application => {}
            Some(app) => {
                return Err(ModelError::document(format!(
                    "expected application '{}', found '{app}'",
                    self.settings.application
                )));
            }
            None => return Err(ModelError::document("missing application marker")),
        }

        let mark = self.order.len();
        match load_document(self, map) {
            Ok(count) => {
                debug!(count, "loaded model document");
                Ok(count)
            }
            Err(err) => {
                for id in self.order.split_off(mark) {
                    self.items.remove(&id);
                }
                Err(err)
            }
        }
    }

    /// Import items from interchange document text.
    pub fn load_json_str(&mut self, text: &str) -> ModelResult<usize> {
        let doc: Value = serde_json::from_str(text)?;
        self.load_json(&doc)
    }

    /// Import items from an interchange document file.
    pub fn load(&mut self, path: impl AsRef<Path>) -> ModelResult<usize> {
        let text = std::fs::read_to_string(path.as_ref())?;
        self.load_json_str(&text)
    }

    /// Export the model as an interchange document.
    pub fn to_json(&self) -> Value {
        export_document(self)
    }

    /// Write the interchange document to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> ModelResult<()> {
        let text = serde_json::to_string_pretty(&self.to_json())?;
        std::fs::write(path.as_ref(), text)?;
        Ok(())
    }
}
