//! Model items.
//!
//! A `ModelItem` is one typed element of a model: a type tag, two optional
//! relation attributes (`iparent`, `iid`) and an ordered text payload.
//! The reserved attribute keys never appear in the payload when it is set
//! through the constructors or `set_data`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::error::{LookupError, ModelError};

/// Keys held as typed attributes rather than payload entries.
pub const RESERVED_KEYS: [&str; 3] = ["itype", "iparent", "iid"];

/// Returns true for `itype`, `iparent` and `iid`.
pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Item type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Module,
    Class,
    Object,
    Clock,
    Global,
    Include,
    Output,
    Filter,
    Schedule,
    Group,
    Template,
    Code,
    Comment,
    Input,
    Source,
}

impl ItemType {
    pub const ALL: [Self; 15] = [
        Self::Module,
        Self::Class,
        Self::Object,
        Self::Clock,
        Self::Global,
        Self::Include,
        Self::Output,
        Self::Filter,
        Self::Schedule,
        Self::Group,
        Self::Template,
        Self::Code,
        Self::Comment,
        Self::Input,
        Self::Source,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Class => "class",
            Self::Object => "object",
            Self::Clock => "clock",
            Self::Global => "global",
            Self::Include => "include",
            Self::Output => "output",
            Self::Filter => "filter",
            Self::Schedule => "schedule",
            Self::Group => "group",
            Self::Template => "template",
            Self::Code => "code",
            Self::Comment => "comment",
            Self::Input => "input",
            Self::Source => "source",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ModelError::UnknownItemType(s.to_string()))
    }
}

/// Render a document value as payload text.
///
/// Strings are taken verbatim, `null` becomes empty, and everything else
/// uses its compact JSON form.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// One typed element of a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelItem {
    itype: ItemType,
    iparent: Option<String>,
    iid: Option<String>,
    data: IndexMap<String, String>,
}

impl ModelItem {
    /// Create an item from a flat payload.
    ///
    /// `iparent` and `iid` entries become attributes; an `itype` entry is
    /// ignored because the type is fixed by `itype`.
    pub fn new<I, K, V>(itype: ItemType, payload: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        let mut item = Self::empty(itype);
        item.set_data(payload);
        item
    }

    /// Create an item with no payload and no attributes.
    pub fn empty(itype: ItemType) -> Self {
        Self {
            itype,
            iparent: None,
            iid: None,
            data: IndexMap::new(),
        }
    }

    /// Create an item from a JSON object, coercing values to text.
    pub fn from_json_map(itype: ItemType, payload: &Map<String, Value>) -> Self {
        Self::new(
            itype,
            payload.iter().map(|(k, v)| (k.clone(), value_to_text(v))),
        )
    }

    pub const fn itype(&self) -> ItemType {
        self.itype
    }

    pub fn iparent(&self) -> Option<&str> {
        self.iparent.as_deref()
    }

    pub fn iid(&self) -> Option<&str> {
        self.iid.as_deref()
    }

    pub fn set_iparent(&mut self, iparent: Option<String>) {
        self.iparent = iparent;
    }

    pub fn set_iid(&mut self, iid: Option<String>) {
        self.iid = iid;
    }

    /// The whole payload.
    pub const fn data(&self) -> &IndexMap<String, String> {
        &self.data
    }

    /// Look up one payload value.
    ///
    /// An absent key is `Ok(None)`, or `Err(KeyNotFound)` when `strict`.
    pub fn get_data(&self, key: &str, strict: bool) -> Result<Option<&str>, LookupError> {
        match self.data.get(key) {
            Some(value) => Ok(Some(value.as_str())),
            None if strict => Err(LookupError::KeyNotFound(key.to_string())),
            None => Ok(None),
        }
    }

    /// Merge a payload into the item.
    ///
    /// Non-reserved keys are written last-write-wins. `iparent` and `iid`
    /// are reset from the payload and cleared when it omits them.
    pub fn set_data<I, K, V>(&mut self, payload: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        let mut iparent = None;
        let mut iid = None;
        for (key, value) in payload {
            let key = key.into();
            let value = value.to_string();
            match key.as_str() {
                "itype" => {}
                "iparent" => iparent = Some(value),
                "iid" => iid = Some(value),
                _ => {
                    self.data.insert(key, value);
                }
            }
        }
        self.iparent = iparent;
        self.iid = iid;
    }

    /// Indexed get: the payload value or `None`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    /// Indexed set: always writes the payload, reserved keys included.
    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.data.insert(key.into(), value.to_string());
    }

    /// The `name` payload entry, if any.
    pub fn name(&self) -> Option<&str> {
        self.get("name")
    }

    fn attributes(&self) -> [(&'static str, Option<&str>); 3] {
        [
            ("itype", Some(self.itype.as_str())),
            ("iparent", self.iparent()),
            ("iid", self.iid()),
        ]
    }

    /// Payload (or the set attributes) as an ordered mapping.
    pub fn to_dict(&self, attributes: bool) -> IndexMap<String, String> {
        if attributes {
            self.attributes()
                .into_iter()
                .filter_map(|(k, v)| v.map(|v| (k.to_string(), v.to_string())))
                .collect()
        } else {
            self.data.clone()
        }
    }

    /// Payload (or the set attributes) as key/value pairs.
    pub fn to_list(&self, attributes: bool) -> Vec<(String, String)> {
        self.to_dict(attributes).into_iter().collect()
    }

    /// Payload (or all attributes, unset ones as `null`) as a JSON object.
    pub fn to_json(&self, attributes: bool) -> Value {
        let map: Map<String, Value> = if attributes {
            self.attributes()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.map_or(Value::Null, Value::from)))
                .collect()
        } else {
            self.data
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                .collect()
        };
        Value::Object(map)
    }
}
