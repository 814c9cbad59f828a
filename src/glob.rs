//! Multi-document discovery.
//!
//! A path template with unbound positional arguments doubles as both a
//! filesystem glob (the caller supplies `*` per unbound position) and a
//! capture regex (the template is rendered once with placeholder tokens,
//! which become named capture groups). Each matched path yields its
//! argument tuple back, and the tuple is routed through the read
//! protocol.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;

use crate::document::{Document, DocumentType, Snapshot};
use crate::error::Result;

/// Recovers argument tuples from paths produced by a schema's template.
struct Matcher {
    regex: Regex,
    arity: usize,
}

impl Matcher {
    fn new<T: DocumentType>(arity: usize) -> Result<Self> {
        let tokens: Vec<String> = (0..arity).map(|i| format!("__glob_arg_{i}__")).collect();
        let rendered = T::path(&tokens)?;
        let mut pattern = regex::escape(&rendered.to_string_lossy());
        for (i, token) in tokens.iter().enumerate() {
            pattern = pattern.replacen(&regex::escape(token), &format!("(?P<arg{i}>.*)"), 1);
        }
        let regex = Regex::new(&format!("^{pattern}$"))?;
        Ok(Self { regex, arity })
    }

    /// Extract the bound argument values from one matched path.
    fn recover(&self, path: &Path) -> Option<Vec<String>> {
        let caps = self.regex.captures(path.to_str()?)?;
        (0..self.arity)
            .map(|i| caps.name(&format!("arg{i}")).map(|m| m.as_str().to_string()))
            .collect()
    }
}

/// Per-batch cache that deduplicates reads by path.
///
/// One registry is scoped to one glob call by default; callers that want
/// to share hydrated snapshots across several batches can pass their own
/// to [`Document::glob_read_with`].
pub struct Registry<T: DocumentType> {
    cache: HashMap<PathBuf, Arc<Snapshot<T>>>,
}

impl<T: DocumentType> Registry<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// Read through the cache, hydrating at most once per path.
    ///
    /// # Errors
    ///
    /// Same as [`Document::read`].
    pub fn read<S: AsRef<str>>(&mut self, args: &[S]) -> Result<Arc<Snapshot<T>>> {
        let args: Vec<String> = args.iter().map(|a| a.as_ref().to_string()).collect();
        let path = T::path(&args)?;
        if let Some(snapshot) = self.cache.get(&path) {
            return Ok(Arc::clone(snapshot));
        }
        let snapshot = Arc::new(Document::<T>::read(&args)?);
        self.cache.insert(path, Arc::clone(&snapshot));
        Ok(snapshot)
    }
}

impl<T: DocumentType> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DocumentType> Document<T> {
    /// Discover and read every document matching the template.
    ///
    /// `glob_args` supplies one glob expression per path argument,
    /// typically `*`. Results are sorted by recovered argument tuple so
    /// the order is stable across filesystems.
    ///
    /// # Errors
    ///
    /// Propagates pattern, enumeration, and read failures.
    pub fn glob_read<S: AsRef<str>>(glob_args: &[S]) -> Result<Vec<Arc<Snapshot<T>>>> {
        let mut registry = Registry::new();
        Self::glob_read_with(glob_args, &mut registry)
    }

    /// [`Document::glob_read`] with a caller-shared [`Registry`].
    ///
    /// # Errors
    ///
    /// Propagates pattern, enumeration, and read failures.
    pub fn glob_read_with<S: AsRef<str>>(
        glob_args: &[S],
        registry: &mut Registry<T>,
    ) -> Result<Vec<Arc<Snapshot<T>>>> {
        let matcher = Matcher::new::<T>(glob_args.len())?;
        let glob_args: Vec<String> = glob_args.iter().map(|a| a.as_ref().to_string()).collect();
        let pattern_path = T::path(&glob_args)?;
        let pattern = pattern_path.to_string_lossy();

        let mut tuples = Vec::new();
        for entry in glob::glob(&pattern)? {
            let path = entry?;
            match matcher.recover(&path) {
                Some(args) => tuples.push(args),
                None => {
                    tracing::warn!(path = %path.display(), "glob match skipped, arguments not recoverable");
                }
            }
        }
        tuples.sort();

        tuples
            .iter()
            .map(|args| registry.read(args))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;

    struct Node;

    impl DocumentType for Node {
        fn path(args: &[String]) -> Result<PathBuf> {
            match args {
                [cluster, node] => Ok(PathBuf::from(format!(
                    "/var/lib/x/clusters/{cluster}/nodes/{node}.yaml"
                ))),
                other => Err(Error::PathUndefined(format!("{} args", other.len()))),
            }
        }
    }

    #[test]
    fn matcher_recovers_arguments_in_order() {
        let matcher = Matcher::new::<Node>(2).unwrap();
        let args = matcher
            .recover(Path::new("/var/lib/x/clusters/prod/nodes/node01.yaml"))
            .unwrap();
        assert_eq!(args, vec!["prod".to_string(), "node01".to_string()]);
    }

    #[test]
    fn matcher_rejects_foreign_paths() {
        let matcher = Matcher::new::<Node>(2).unwrap();
        assert!(matcher.recover(Path::new("/etc/passwd")).is_none());
        assert!(
            matcher
                .recover(Path::new("/var/lib/x/clusters/prod/nodes/node01.json"))
                .is_none()
        );
    }

    #[test]
    fn matcher_anchors_whole_path() {
        let matcher = Matcher::new::<Node>(2).unwrap();
        assert!(
            matcher
                .recover(Path::new("/prefix/var/lib/x/clusters/a/nodes/b.yaml"))
                .is_none()
        );
    }
}
