//! The in-memory model: typed items, the ordered collection that owns
//! them, GLM rendering, and interchange document import/export.

pub mod collection;
pub mod document;
pub mod error;
pub mod ids;
pub mod item;
pub mod render;
pub mod run;

pub use collection::{GldModel, Position};
pub use document::{ItemKind, KINDS, Loader, NAMESPACE_SEPARATOR, kind_of};
pub use error::{LookupError, ModelError, ModelResult};
pub use ids::{IdGenerator, RandomIds, SequentialIds};
pub use item::{ItemType, ModelItem, RESERVED_KEYS, is_reserved, value_to_text};
pub use render::PUBLIC_ACCESS;
pub use run::{ModelRunResult, RunOptions};
