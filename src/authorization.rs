// src/authorization.rs
//
// Identifier allow-list lookup. The backing store is a plain text file with
// one identifier per line. Entries and lookups go through the same
// normalization as detector text, so case and separators never matter.
//
// A missing file means "nobody is authorized" (warned, not fatal). A file
// that exists but cannot be read is a lookup failure, which the decision
// engine reports as ERROR and retries on the next cycle.

use crate::detection::normalize_identifier;
use crate::error::GateError;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub trait AuthorizationStore {
    fn is_authorized(&self, identifier: &str) -> Result<bool, GateError>;
}

impl<S: AuthorizationStore + ?Sized> AuthorizationStore for Box<S> {
    fn is_authorized(&self, identifier: &str) -> Result<bool, GateError> {
        (**self).is_authorized(identifier)
    }
}

/// Authorizes every identifier. Used when no allow-list is configured.
#[derive(Debug, Default)]
pub struct AllowAllStore;

impl AuthorizationStore for AllowAllStore {
    fn is_authorized(&self, _identifier: &str) -> Result<bool, GateError> {
        Ok(true)
    }
}

pub struct AllowListStore {
    path: PathBuf,
}

impl AllowListStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every entry, normalized. `None` when the file does not exist.
    fn load_entries(&self) -> Result<Option<Vec<String>>, GateError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(
                contents
                    .lines()
                    .map(normalize_identifier)
                    .filter(|l| !l.is_empty())
                    .collect(),
            )),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(GateError::lookup(format!(
                "read allow-list {:?}: {}",
                self.path, e
            ))),
        }
    }

    /// Append `identifier` (normalized) unless it is already listed.
    /// Returns `true` when a new entry was written.
    pub fn add_authorized(&self, identifier: &str) -> Result<bool, GateError> {
        let entry = normalize_identifier(identifier);
        if entry.is_empty() {
            return Err(GateError::input("cannot authorize an empty identifier"));
        }

        if let Some(existing) = self.load_entries()? {
            if existing.contains(&entry) {
                debug!("{} already authorized", entry);
                return Ok(false);
            }
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| GateError::lookup(format!("create_dir_all {:?}: {}", parent, e)))?;
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| GateError::lookup(format!("open allow-list {:?}: {}", self.path, e)))?;
        writeln!(f, "{}", entry)
            .map_err(|e| GateError::lookup(format!("write allow-list {:?}: {}", self.path, e)))?;

        info!("✓ Added {} to allow-list", entry);
        Ok(true)
    }
}

impl AuthorizationStore for AllowListStore {
    fn is_authorized(&self, identifier: &str) -> Result<bool, GateError> {
        let entries = match self.load_entries()? {
            Some(entries) => entries,
            None => {
                warn!("Allow-list {:?} not found, treating as unauthorized", self.path);
                return Ok(false);
            }
        };

        let wanted = normalize_identifier(identifier);
        let authorized = !wanted.is_empty() && entries.iter().any(|e| *e == wanted);
        debug!(
            "Authorization check: {} -> {}",
            identifier,
            if authorized { "AUTHORIZED" } else { "UNAUTHORIZED" }
        );
        Ok(authorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_match() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allow.txt");
        fs::write(&path, "ab1234\n  XY9876  \n\n").unwrap();

        let store = AllowListStore::new(&path);
        assert!(store.is_authorized("AB1234").unwrap());
        assert!(store.is_authorized("xy9876").unwrap());
        assert!(!store.is_authorized("ZZ0000").unwrap());
        assert!(!store.is_authorized("").unwrap());
    }

    #[test]
    fn test_missing_file_is_unauthorized_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = AllowListStore::new(dir.path().join("absent.txt"));
        assert!(!store.is_authorized("AB1234").unwrap());
    }

    #[test]
    fn test_unreadable_store_is_lookup_error() {
        // A directory exists but cannot be read as a file
        let dir = tempfile::tempdir().unwrap();
        let store = AllowListStore::new(dir.path());
        assert!(matches!(
            store.is_authorized("AB1234"),
            Err(GateError::Lookup(_))
        ));
    }

    #[test]
    fn test_add_authorized_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        let store = AllowListStore::new(dir.path().join("nested/allow.txt"));

        assert!(store.add_authorized("ab-1234").unwrap());
        assert!(!store.add_authorized("AB1234").unwrap());
        assert!(store.is_authorized("Ab1234").unwrap());

        let contents = fs::read_to_string(store.path()).unwrap();
        assert_eq!(contents, "AB1234\n");
    }

    #[test]
    fn test_separators_in_entries_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allow.txt");
        fs::write(&path, "KA-01-AB1234\nxy 9876\n").unwrap();

        let store = AllowListStore::new(&path);
        assert!(store.is_authorized("KA01AB1234").unwrap());
        assert!(store.is_authorized("ka 01 ab-1234").unwrap());
        assert!(store.is_authorized("XY9876").unwrap());
        assert!(!store.add_authorized("ka01ab1234").unwrap(), "already listed");
    }

    #[test]
    fn test_separator_only_identifier_cannot_be_added() {
        let dir = tempfile::tempdir().unwrap();
        let store = AllowListStore::new(dir.path().join("allow.txt"));
        assert!(matches!(
            store.add_authorized(" - "),
            Err(GateError::Input(_))
        ));
    }

    #[test]
    fn test_allow_all() {
        assert!(AllowAllStore.is_authorized("anything").unwrap());
    }
}
