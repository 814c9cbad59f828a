//! Access protocols: the CRUD surface composed from the lock manager and
//! the persistence core.
//!
//! Every write-class protocol has the same shape: check the existence
//! precondition, claim a read or write mode, then materialize, run the
//! caller's callback, and store the result under the exclusive lock.
//! Read never locks and returns a frozen [`Snapshot`] instead of a
//! mutable handle.

use std::fs;

use crate::document::{Document, DocumentType, ReadMode, Snapshot};
use crate::error::{Error, Result};
use crate::lock::with_lock;

impl<T: DocumentType> Document<T> {
    /// Read a document without locking and freeze the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingFile`] when the file is absent and the
    /// schema does not allow missing reads.
    pub fn read<S: AsRef<str>>(args: &[S]) -> Result<Snapshot<T>> {
        let mut doc = Self::new(args)?;
        doc.set_mode(ReadMode::Read)?;
        tracing::info!(path = %doc.path().display(), "read");
        doc.materialize()?;
        Ok(Snapshot::new(doc))
    }

    /// Alias for [`Document::read`].
    ///
    /// # Errors
    ///
    /// Same as [`Document::read`].
    pub fn load<S: AsRef<str>>(args: &[S]) -> Result<Snapshot<T>> {
        Self::read(args)
    }

    /// Create a document that must not exist yet.
    ///
    /// The schema initializer runs first, then `mutate`, then the result
    /// is stored, all under the exclusive lock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] if the file is already present,
    /// [`Error::ResourceBusy`] if the lock cannot be acquired in time, or
    /// whatever `mutate` itself fails with.
    pub fn create<S, F>(args: &[S], mutate: F) -> Result<Self>
    where
        S: AsRef<str>,
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let mut doc = Self::new(args)?;
        if doc.path().exists() {
            return Err(Error::AlreadyExists(doc.path().to_path_buf()));
        }
        doc.set_mode(ReadMode::Write)?;
        doc.store_locked("create", mutate)
    }

    /// Update a document that must already exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingFile`] if the file is absent,
    /// [`Error::ResourceBusy`] on lock contention, or the callback's own
    /// failure.
    pub fn update<S, F>(args: &[S], mutate: F) -> Result<Self>
    where
        S: AsRef<str>,
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let mut doc = Self::new(args)?;
        if !doc.path().exists() {
            return Err(Error::MissingFile(doc.path().to_path_buf()));
        }
        doc.set_mode(ReadMode::Read)?;
        doc.store_locked("update", mutate)
    }

    /// Update an existing document or create it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceBusy`] on lock contention, or the
    /// callback's own failure.
    pub fn create_or_update<S, F>(args: &[S], mutate: F) -> Result<Self>
    where
        S: AsRef<str>,
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let mut doc = Self::new(args)?;
        let mode = if doc.path().exists() {
            ReadMode::Read
        } else {
            ReadMode::Write
        };
        doc.set_mode(mode)?;
        doc.store_locked("create_or_update", mutate)
    }

    /// Delete a document that must already exist, guarded by a predicate.
    ///
    /// The loaded document is handed to `confirm`; a `true` return
    /// commits the unlink, while `false` aborts the deletion and stores
    /// the (possibly mutated) document back in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeleteMissing`] if the file is absent,
    /// [`Error::ResourceBusy`] on lock contention, or the predicate's own
    /// failure.
    pub fn delete<S, F>(args: &[S], confirm: F) -> Result<Self>
    where
        S: AsRef<str>,
        F: FnOnce(&mut Self) -> Result<bool>,
    {
        let mut doc = Self::new(args)?;
        if !doc.path().exists() {
            return Err(Error::DeleteMissing(doc.path().to_path_buf()));
        }
        doc.set_mode(ReadMode::Read)?;
        tracing::info!(path = %doc.path().display(), "delete");

        let path = doc.path().to_path_buf();
        with_lock(&path, move || {
            doc.materialize()?;
            if confirm(&mut doc)? {
                fs::remove_file(doc.path())?;
                tracing::info!(path = %doc.path().display(), "delete (done)");
            } else {
                doc.store()?;
                tracing::info!(path = %doc.path().display(), "delete (saved)");
            }
            Ok(doc)
        })
    }

    /// Shared write path: materialize, mutate, store, all under the lock.
    fn store_locked<F>(mut self, action: &str, mutate: F) -> Result<Self>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let path = self.path().to_path_buf();
        tracing::info!(path = %path.display(), "{action}");
        with_lock(&path, move || {
            self.materialize()?;
            mutate(&mut self)?;
            self.store()?;
            tracing::info!(path = %self.path().display(), "{action} (done)");
            Ok(self)
        })
    }
}
