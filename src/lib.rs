//! confdoc - durable, process-coordinated CRUD for file-backed documents.
//!
//! Each document is one YAML file on a shared filesystem, identified by a
//! path derived from typed arguments (e.g. `(cluster, node)` ->
//! `/var/lib/x/clusters/{cluster}/nodes/{node}.yaml`). Independent
//! processes may create, read, update, and delete the same document
//! concurrently; writers serialize on an exclusive advisory file lock,
//! readers proceed without locking.
//!
//! # Modules
//!
//! - [`document`] - document handles, the schema trait, and persistence
//! - [`ops`] - the read/create/update/delete access protocols
//! - [`glob`] - multi-document discovery over path templates
//! - [`data`] - nested key-value document content
//! - [`lock`] - placeholder-based exclusive file locking
//! - [`error`] - error taxonomy
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//!
//! use confdoc::{DocData, Document, DocumentType, Error, Result};
//!
//! struct NodeConfig;
//!
//! impl DocumentType for NodeConfig {
//!     fn path(args: &[String]) -> Result<PathBuf> {
//!         match args {
//!             [cluster, node] => Ok(PathBuf::from(format!(
//!                 "/var/lib/x/clusters/{cluster}/nodes/{node}.yaml"
//!             ))),
//!             other => Err(Error::PathUndefined(format!("{} args", other.len()))),
//!         }
//!     }
//!
//!     fn initialize(data: &mut DocData) {
//!         let _ = data.set(&["state"], "pending");
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     Document::<NodeConfig>::create(&["prod", "node01"], |doc| {
//!         doc.data_mut().set(&["address"], "10.0.0.1")
//!     })?;
//!     let snapshot = Document::<NodeConfig>::read(&["prod", "node01"])?;
//!     println!("{:?}", snapshot.data().get(&["address"]));
//!     Ok(())
//! }
//! ```

pub mod data;
pub mod document;
pub mod error;
pub mod glob;
pub mod lock;
pub mod ops;

pub use data::DocData;
pub use document::{Document, DocumentType, Snapshot};
pub use error::{Error, Result};
pub use glob::Registry;
pub use lock::PLACEHOLDER;
