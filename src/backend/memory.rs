//! A backend that only remembers the snapshots it was asked to create.
//!
//! Useful for dry runs: plug it in instead of snapper and look at the recorded descriptors
//! afterwards.
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::{Connect, SnapshotBackend, SnapshotHandle, SnapshotKind};
use crate::error::{Error, ErrorKind};
use crate::scd::Scd;

/// A snapshot the memory backend "created".
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SnapshotRecord {
    pub kind: SnapshotKind,
    pub number: u32,
    /// For post snapshots, the number of the pre snapshot they are paired with.
    pub pre_number: Option<u32>,
    pub config_name: String,
    pub scd: Scd,
}

#[derive(Debug, Default)]
struct Store {
    snapshots: Vec<SnapshotRecord>,
    last_number: u32,
    fail_next: Option<SnapshotKind>,
}

/// Connector for the memory backend. Clones share the same record of snapshots.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapper {
    /// config name -> subvolume
    configs: BTreeMap<String, PathBuf>,
    store: Rc<RefCell<Store>>,
}

impl MemorySnapper {
    /// A backend without any config.
    pub fn new() -> Self {
        Default::default()
    }

    /// Add a config snapshotting `subvolume`.
    pub fn with_config(mut self, name: impl Into<String>, subvolume: impl AsRef<Path>) -> Self {
        self.configs
            .insert(name.into(), subvolume.as_ref().to_owned());
        self
    }

    /// Every snapshot created so far, oldest first.
    pub fn snapshots(&self) -> Vec<SnapshotRecord> {
        self.store.borrow().snapshots.clone()
    }

    /// Make the next request for a `kind` snapshot fail.
    pub fn fail_next(&self, kind: SnapshotKind) {
        self.store.borrow_mut().fail_next = Some(kind);
    }
}

impl Connect for MemorySnapper {
    fn connect(&self, config_name: &str, root: &Path) -> Result<Box<dyn SnapshotBackend>, Error> {
        let subvolume = self
            .configs
            .get(config_name)
            .ok_or_else(|| Error::config_not_found(config_name))?;
        let subvolume_dir = match subvolume.strip_prefix("/") {
            Ok(rel) if rel.as_os_str().is_empty() => root.to_owned(),
            Ok(rel) => root.join(rel),
            Err(_) => root.join(subvolume),
        };
        Ok(Box::new(MemoryBackend {
            config_name: config_name.to_owned(),
            subvolume_dir,
            store: self.store.clone(),
        }))
    }
}

#[derive(Debug)]
struct MemoryBackend {
    config_name: String,
    subvolume_dir: PathBuf,
    store: Rc<RefCell<Store>>,
}

impl MemoryBackend {
    fn create(
        &mut self,
        kind: SnapshotKind,
        pre: Option<&SnapshotHandle>,
        scd: &Scd,
    ) -> Result<SnapshotHandle, Error> {
        let mut store = self.store.borrow_mut();
        if store.fail_next == Some(kind) {
            store.fail_next = None;
            return Err(Error::create_snapshot(kind, "injected failure"));
        }
        if let Some(pre) = pre {
            let paired = store.snapshots.iter().any(|s| {
                s.kind == SnapshotKind::Pre
                    && s.number == pre.number()
                    && s.config_name == self.config_name
            });
            if !paired {
                return Err(Error::create_snapshot(
                    kind,
                    format!("pre snapshot {} does not exist", pre),
                ));
            }
        }
        store.last_number += 1;
        let number = store.last_number;
        store.snapshots.push(SnapshotRecord {
            kind,
            number,
            pre_number: pre.map(SnapshotHandle::number),
            config_name: self.config_name.clone(),
            scd: scd.clone(),
        });
        Ok(SnapshotHandle::new(number))
    }
}

impl SnapshotBackend for MemoryBackend {
    fn config_name(&self) -> &str {
        &self.config_name
    }

    fn subvolume_dir(&self) -> &Path {
        &self.subvolume_dir
    }

    fn create_pre_snapshot(&mut self, scd: &Scd) -> Result<SnapshotHandle, Error> {
        self.create(SnapshotKind::Pre, None, scd)
    }

    fn create_post_snapshot(
        &mut self,
        pre: &SnapshotHandle,
        scd: &Scd,
    ) -> Result<SnapshotHandle, Error> {
        self.create(SnapshotKind::Post, Some(pre), scd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect() {
        let snapper = MemorySnapper::new()
            .with_config("root", "/")
            .with_config("home", "/home");
        let root = snapper.connect("root", Path::new("/")).unwrap();
        assert_eq!(root.subvolume_dir(), Path::new("/"));
        let home = snapper.connect("home", Path::new("/mnt")).unwrap();
        assert_eq!(home.subvolume_dir(), Path::new("/mnt/home"));
        let err = snapper.connect("var", Path::new("/")).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ConfigNotFound("var".into()));
    }

    #[test]
    fn records_pairs() {
        let snapper = MemorySnapper::new().with_config("root", "/");
        let mut backend = snapper.connect("root", Path::new("/")).unwrap();
        let pre = backend.create_pre_snapshot(&Scd::new("pre")).unwrap();
        let post = backend.create_post_snapshot(&pre, &Scd::new("post")).unwrap();
        assert_eq!((pre.number(), post.number()), (1, 2));

        let records = snapper.snapshots();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].kind, SnapshotKind::Post);
        assert_eq!(records[1].pre_number, Some(1));
        assert_eq!(records[1].scd.description, "post");
    }

    #[test]
    fn unknown_pre() {
        let snapper = MemorySnapper::new().with_config("root", "/");
        let mut backend = snapper.connect("root", Path::new("/")).unwrap();
        let err = backend
            .create_post_snapshot(&SnapshotHandle::new(7), &Scd::new("post"))
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::CreateSnapshot(SnapshotKind::Post));
        assert!(snapper.snapshots().is_empty());
    }

    #[test]
    fn injected_failure() {
        let snapper = MemorySnapper::new().with_config("root", "/");
        let mut backend = snapper.connect("root", Path::new("/")).unwrap();
        snapper.fail_next(SnapshotKind::Pre);
        assert!(backend.create_pre_snapshot(&Scd::new("pre")).is_err());
        assert_eq!(backend.create_pre_snapshot(&Scd::new("pre")).unwrap().number(), 1);
    }
}
