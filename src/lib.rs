//! Editing core for XDAT game UI descriptor documents.
//! Provides a schema-checked entity tree, a filterable tree mirror kept in sync
//! with every edit, and an undo history of reversible commands covering property
//! edits, insert/delete/move, clipboard, drag-and-drop and batch replace.

pub mod clipboard;
mod clone;
pub mod codec;
pub mod command;
pub mod dragdrop;
pub mod entity;
mod error;
pub mod history;
pub mod mirror;
mod save;
pub mod schema;
pub mod search;
pub mod session;
pub mod settings;
pub mod statics;
mod value;
pub mod workspace;

pub use clone::deep_clone;
pub use entity::{AttrValue, Document, EntityId, ListRef};
pub use error::{CodecError, EditorError, EditorResult};
pub use history::UndoManager;
pub use mirror::{NodeId, TreeMirror};
pub use save::{DocumentFile, DocumentFormat, LoadedDocument, generate_bytes_for_format};
pub use schema::Schema;
pub use search::{Replacer, SearchCriteria};
pub use session::EditorSession;
pub use settings::EditorSettings;
pub use value::{DocNumber, DocValue};
pub use workspace::{DocumentEvent, Workspace};
