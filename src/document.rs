//! Document handles: path binding, read-mode state machine, and the
//! load/store persistence core.
//!
//! A [`Document`] is the in-memory representative of one file-backed
//! record. It is constructed per protocol invocation, bound to the
//! concrete arguments that determine its path, and discarded afterwards.

use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::data::DocData;
use crate::error::{Error, Result};
use crate::lock::PLACEHOLDER;

/// Schema hook implemented by each document class.
///
/// Implementations define how positional arguments map to a filesystem
/// path, whether a missing file is tolerated on read, and what a freshly
/// created document contains before the caller's mutation runs.
pub trait DocumentType {
    /// Downgrade a missing file on read to an empty document.
    const ALLOW_MISSING_READ: bool = false;

    /// Map bound arguments to an absolute path.
    ///
    /// Must be a pure function of `args`: no filesystem access, identical
    /// output for identical input.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PathUndefined`] when no mapping exists for the
    /// given argument shape.
    fn path(args: &[String]) -> Result<PathBuf>;

    /// Populate defaults for a document created in write mode.
    fn initialize(data: &mut DocData) {
        let _ = data;
    }
}

/// Where a handle's data comes from when it is first materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadMode {
    /// No protocol has claimed the handle yet.
    Unset,
    /// Data starts from the schema initializer; disk is ignored.
    Write,
    /// Data must come from disk (or be empty, if missing reads are allowed).
    Read,
}

/// In-memory handle for one document, bound to concrete path arguments.
///
/// Handles are only obtainable through the access protocols; write-class
/// protocols hand one to the mutation callback and return it afterwards.
pub struct Document<T: DocumentType> {
    args: Vec<String>,
    path: PathBuf,
    mode: ReadMode,
    data: DocData,
    materialized: bool,
    _schema: PhantomData<T>,
}

impl<T: DocumentType> fmt::Debug for Document<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("args", &self.args)
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("data", &self.data)
            .field("materialized", &self.materialized)
            .finish()
    }
}

impl<T: DocumentType> Document<T> {
    /// Bind a handle to `args`, computing its path once up front.
    pub(crate) fn new<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let args: Vec<String> = args.iter().map(|a| a.as_ref().to_string()).collect();
        let path = T::path(&args)?;
        Ok(Self {
            args,
            path,
            mode: ReadMode::Unset,
            data: DocData::new(),
            materialized: false,
            _schema: PhantomData,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub fn data(&self) -> &DocData {
        &self.data
    }

    /// Mutable access to the document content.
    ///
    /// Only reachable from write-class protocol callbacks and their
    /// returned handles; read snapshots never expose this.
    pub fn data_mut(&mut self) -> &mut DocData {
        &mut self.data
    }

    /// Claim the handle for read or write materialization.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadMode`] once data has been materialized.
    pub(crate) fn set_mode(&mut self, mode: ReadMode) -> Result<()> {
        if self.materialized {
            return Err(Error::BadMode);
        }
        self.mode = mode;
        Ok(())
    }

    /// Materialize `data`, at most once per handle.
    ///
    /// Write mode runs the schema initializer and never consults disk.
    /// Read mode loads from disk; a missing file is an error unless the
    /// schema allows missing reads, in which case the document stays
    /// empty and the skip is logged.
    pub(crate) fn materialize(&mut self) -> Result<()> {
        if self.materialized {
            return Ok(());
        }
        match self.mode {
            ReadMode::Unset => return Err(Error::BadMode),
            ReadMode::Write => T::initialize(&mut self.data),
            ReadMode::Read => {
                if self.path.exists() {
                    self.read_from_disk()?;
                } else if T::ALLOW_MISSING_READ {
                    tracing::info!(path = %self.path.display(), "read (missing)");
                } else {
                    return Err(Error::MissingFile(self.path.clone()));
                }
            }
        }
        self.materialized = true;
        Ok(())
    }

    /// Read the file and merge its mapping into the current data.
    ///
    /// Placeholder content and empty/null documents contribute nothing.
    pub(crate) fn read_from_disk(&mut self) -> Result<()> {
        let text = fs::read_to_string(&self.path)?;
        if text == PLACEHOLDER {
            return Ok(());
        }
        match DocData::parse(&text)? {
            None => Ok(()),
            Some(Value::Mapping(map)) => {
                self.data.merge(map);
                Ok(())
            }
            Some(_) => Err(Error::InvalidDocument(self.path.clone())),
        }
    }

    /// Serialize the current data to the document path, overwriting
    /// whatever is there. Exclusion of concurrent writers is the lock
    /// manager's job, not this function's.
    pub(crate) fn store(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.data.write_to(&self.path, true)
    }
}

/// Immutable view of a document produced by the read protocols.
///
/// Holding a snapshot guarantees the underlying data cannot be mutated
/// through it; write-class protocols return plain [`Document`] handles
/// instead.
pub struct Snapshot<T: DocumentType> {
    doc: Document<T>,
}

impl<T: DocumentType> fmt::Debug for Snapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot").field("doc", &self.doc).finish()
    }
}

impl<T: DocumentType> Snapshot<T> {
    pub(crate) fn new(doc: Document<T>) -> Self {
        Self { doc }
    }

    #[must_use]
    pub fn data(&self) -> &DocData {
        self.doc.data()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.doc.path()
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        self.doc.args()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    struct Plain;

    impl DocumentType for Plain {
        fn path(args: &[String]) -> Result<PathBuf> {
            match args {
                [root, id] => Ok(PathBuf::from(root).join(format!("{id}.yaml"))),
                other => Err(Error::PathUndefined(format!("{} args", other.len()))),
            }
        }

        fn initialize(data: &mut DocData) {
            let _ = data.set(&["defaulted"], true);
        }
    }

    #[test]
    fn path_is_pure_and_stable() {
        let a = Plain::path(&["/tmp/x".into(), "one".into()]).unwrap();
        let b = Plain::path(&["/tmp/x".into(), "one".into()]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, PathBuf::from("/tmp/x/one.yaml"));
    }

    #[test]
    fn unmapped_arity_is_path_undefined() {
        let err = Document::<Plain>::new(&["only-one"]).unwrap_err();
        assert!(matches!(err, Error::PathUndefined(_)));
    }

    #[test]
    fn mode_change_after_materialize_is_bad_mode() {
        let mut doc = Document::<Plain>::new(&["/tmp/x", "one"]).unwrap();
        doc.set_mode(ReadMode::Write).unwrap();
        doc.materialize().unwrap();
        assert!(matches!(doc.set_mode(ReadMode::Read), Err(Error::BadMode)));
    }

    #[test]
    fn materialize_without_mode_is_bad_mode() {
        let mut doc = Document::<Plain>::new(&["/tmp/x", "one"]).unwrap();
        assert!(matches!(doc.materialize(), Err(Error::BadMode)));
    }

    #[test]
    fn materialize_runs_once() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_string_lossy().to_string();
        let mut doc = Document::<Plain>::new(&[root.as_str(), "one"]).unwrap();
        doc.set_mode(ReadMode::Write).unwrap();
        doc.materialize().unwrap();
        doc.data_mut().set(&["defaulted"], false).unwrap();

        // A second materialize must not re-run the initializer.
        doc.materialize().unwrap();
        assert_eq!(
            doc.data().get(&["defaulted"]),
            Some(&serde_yaml::Value::from(false))
        );
    }

    #[test]
    fn write_mode_ignores_disk() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_string_lossy().to_string();
        let mut doc = Document::<Plain>::new(&[root.as_str(), "one"]).unwrap();
        std::fs::write(doc.path(), "ondisk: true\n").unwrap();

        doc.set_mode(ReadMode::Write).unwrap();
        doc.materialize().unwrap();
        assert_eq!(doc.data().get(&["ondisk"]), None);
        assert_eq!(
            doc.data().get(&["defaulted"]),
            Some(&serde_yaml::Value::from(true))
        );
    }

    #[test]
    fn read_mode_missing_file_errors() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_string_lossy().to_string();
        let mut doc = Document::<Plain>::new(&[root.as_str(), "absent"]).unwrap();
        doc.set_mode(ReadMode::Read).unwrap();
        assert!(matches!(doc.materialize(), Err(Error::MissingFile(_))));
    }

    #[test]
    fn placeholder_content_loads_as_empty() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_string_lossy().to_string();
        let mut doc = Document::<Plain>::new(&[root.as_str(), "slot"]).unwrap();
        std::fs::write(doc.path(), PLACEHOLDER).unwrap();

        doc.set_mode(ReadMode::Read).unwrap();
        doc.materialize().unwrap();
        assert!(doc.data().is_empty());
    }

    #[test]
    fn load_merges_over_initialized_data() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_string_lossy().to_string();
        let mut doc = Document::<Plain>::new(&[root.as_str(), "merge"]).unwrap();
        std::fs::write(doc.path(), "fresh: 1\n").unwrap();

        doc.data_mut().set(&["seeded"], "kept").unwrap();
        doc.set_mode(ReadMode::Read).unwrap();
        doc.materialize().unwrap();
        assert_eq!(
            doc.data().get(&["seeded"]),
            Some(&serde_yaml::Value::from("kept"))
        );
        assert_eq!(doc.data().get(&["fresh"]), Some(&serde_yaml::Value::from(1)));
    }

    #[test]
    fn scalar_root_document_is_invalid() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_string_lossy().to_string();
        let mut doc = Document::<Plain>::new(&[root.as_str(), "scalar"]).unwrap();
        std::fs::write(doc.path(), "just a string\n").unwrap();

        doc.set_mode(ReadMode::Read).unwrap();
        assert!(matches!(doc.materialize(), Err(Error::InvalidDocument(_))));
    }
}
