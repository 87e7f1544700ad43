//! The snapshot backend: something that can create pre and post snapshots for one snapper
//! config.
use std::fmt::{self, Debug, Display};
use std::path::Path;

use crate::error::Error;
use crate::scd::Scd;

pub mod cli;
pub mod memory;

pub use self::cli::SnapperCli;
pub use self::memory::MemorySnapper;

/// The two halves of a snapshot pair.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum SnapshotKind {
    /// Taken before the transaction.
    Pre,
    /// Taken after the transaction, linked to a pre snapshot.
    Post,
}

impl Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SnapshotKind::Pre => f.write_str("pre"),
            SnapshotKind::Post => f.write_str("post"),
        }
    }
}

/// A snapshot created by the backend, identified by its number.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SnapshotHandle {
    number: u32,
}

impl SnapshotHandle {
    pub fn new(number: u32) -> Self {
        SnapshotHandle { number }
    }

    /// The number snapper assigned to the snapshot.
    pub fn number(&self) -> u32 {
        self.number
    }
}

impl Display for SnapshotHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(&self.number, f)
    }
}

/// A connection to one snapper config.
pub trait SnapshotBackend: Debug {
    /// The name of the config this backend is bound to.
    fn config_name(&self) -> &str;

    /// The directory of the subvolume being snapshotted.
    fn subvolume_dir(&self) -> &Path;

    /// Create a snapshot of type pre.
    fn create_pre_snapshot(&mut self, scd: &Scd) -> Result<SnapshotHandle, Error>;

    /// Create a snapshot of type post, paired with `pre`.
    fn create_post_snapshot(
        &mut self,
        pre: &SnapshotHandle,
        scd: &Scd,
    ) -> Result<SnapshotHandle, Error>;
}

/// Something that can bind to a snapper config.
pub trait Connect {
    /// Bind to the config `config_name` of the system rooted at `root`.
    ///
    /// Fails with `ErrorKind::ConfigNotFound` if there is no such config.
    fn connect(&self, config_name: &str, root: &Path) -> Result<Box<dyn SnapshotBackend>, Error>;
}
