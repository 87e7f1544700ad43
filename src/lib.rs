//! A package manager plugin that takes snapper snapshots before and after every transaction, so
//! that an unwanted update can be rolled back.
//!
//! The work is split in two:
//!
//!  - the [`Classifier`] looks at the packages in a transaction and builds a snapshot
//!    description, marking the snapshots important when protected or install-only packages are
//!    involved;
//!  - the [`SnapshotController`] asks snapper for a pre snapshot before the transaction and a
//!    post snapshot paired with it afterwards, and quietly does nothing when snapper is not set
//!    up.
//!
//! [`SnapperPlugin`] ties both to the host's plugin interface.
//!
//! ```
//! # use dnf_snapper::{Action, ConfigParser, HostConfig, MemorySnapper, Package, Plugin,
//! #                   TransactionPlan, REQUIRED_PLUGIN_API_VERSION};
//! let snapper = MemorySnapper::new().with_config("root", "/");
//! let mut plugin = dnf_snapper::new_instance(
//!     REQUIRED_PLUGIN_API_VERSION,
//!     HostConfig::default(),
//!     &ConfigParser::new(),
//!     Box::new(snapper.clone()),
//! ).unwrap();
//! plugin.init().unwrap();
//!
//! let plan = TransactionPlan::new()
//!     .with(Package::new("kernel", "6.8.5-301.fc40", "x86_64"), Action::Installed);
//! plugin.pre_transaction(&plan).unwrap();
//! plugin.post_transaction(&plan).unwrap();
//!
//! let snapshots = snapper.snapshots();
//! assert_eq!(snapshots[0].scd.description, "DNF (installed 1)");
//! assert!(snapshots[0].scd.is_important());
//! ```
//!
//! [`Classifier`]: classifier/struct.Classifier.html
//! [`SnapshotController`]: controller/struct.SnapshotController.html
//! [`SnapperPlugin`]: plugin/struct.SnapperPlugin.html

extern crate glob;
extern crate itertools;
#[macro_use]
extern crate log;
#[macro_use]
extern crate nom;
extern crate serde;
#[macro_use]
extern crate serde_derive;

pub mod action;
pub mod backend;
pub mod classifier;
pub mod config;
pub mod controller;
mod error;
pub mod evr;
pub mod package;
pub mod plugin;
pub mod scd;
pub mod transaction;

pub use action::Action;
pub use backend::{Connect, MemorySnapper, SnapperCli, SnapshotBackend, SnapshotHandle,
                  SnapshotKind};
pub use classifier::{classify, Classifier, ClassifierOptions};
pub use config::{ConfigParser, HostConfig, ImportancePolicy, PluginConfig};
pub use controller::{ControllerState, SnapshotController};
pub use error::{Error, ErrorContext, ErrorKind};
pub use package::Package;
pub use plugin::{new_instance, Plugin, PluginApiVersion, SnapperPlugin,
                 REQUIRED_PLUGIN_API_VERSION};
pub use scd::Scd;
pub use transaction::{PackageAction, TransactionPlan};
