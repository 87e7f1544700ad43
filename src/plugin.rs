//! The interface between the package manager and its plugins, and the snapper plugin itself.
use std::fmt;

use crate::backend::{Connect, SnapshotHandle};
use crate::classifier::Classifier;
use crate::config::{ConfigParser, HostConfig, PluginConfig};
use crate::controller::SnapshotController;
use crate::error::{Error, ErrorKind};
use crate::transaction::TransactionPlan;

/// The name the plugin is registered under.
pub const PLUGIN_NAME: &str = "snapper";

/// The plugin API this plugin is written against.
pub const REQUIRED_PLUGIN_API_VERSION: PluginApiVersion = PluginApiVersion { major: 2, minor: 0 };

/// Static attributes of the plugin.
const ATTRIBUTES: &[(&str, &str)] = &[
    ("author.name", "Sergei von Alis"),
    ("author.email", "gasinvein@gmail.com"),
    ("description", "Snapper Plugin."),
];

/// Version of the interface between host and plugins.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PluginApiVersion {
    pub major: u16,
    pub minor: u16,
}

impl PluginApiVersion {
    /// A host can load us if it has the same major version and at least our minor version.
    pub fn is_satisfied_by(self, host: PluginApiVersion) -> bool {
        host.major == self.major && host.minor >= self.minor
    }
}

impl fmt::Display for PluginApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Version of a plugin.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PluginVersion {
    pub major: u16,
    pub minor: u16,
    pub micro: u16,
}

impl PluginVersion {
    /// The version of this crate.
    pub fn current() -> Self {
        PluginVersion {
            major: env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
            minor: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
            micro: env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0),
        }
    }
}

impl fmt::Display for PluginVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)
    }
}

/// What the host calls on a plugin.
///
/// The host calls `init` once, then `pre_transaction` and `post_transaction` once each per
/// transaction, in that order, from a single thread.
pub trait Plugin {
    fn api_version(&self) -> PluginApiVersion;

    fn name(&self) -> &'static str;

    fn version(&self) -> PluginVersion;

    /// Names of the attributes this plugin has.
    fn attributes(&self) -> Vec<&'static str>;

    /// The value of an attribute, if present.
    fn attribute(&self, name: &str) -> Option<&'static str>;

    fn init(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Called after the transaction is resolved, before anything is changed on the system.
    fn pre_transaction(&mut self, _transaction: &TransactionPlan) -> Result<(), Error> {
        Ok(())
    }

    /// Called after the transaction has been applied.
    fn post_transaction(&mut self, _transaction: &TransactionPlan) -> Result<(), Error> {
        Ok(())
    }
}

/// Creates snapper snapshots before and after every transaction.
pub struct SnapperPlugin {
    config: PluginConfig,
    host: HostConfig,
    connector: Box<dyn Connect>,
    classifier: Classifier,
    controller: SnapshotController,
    /// The last completed pre/post pair.
    last_pair: Option<(SnapshotHandle, SnapshotHandle)>,
}

impl SnapperPlugin {
    pub fn new(config: PluginConfig, host: HostConfig, connector: Box<dyn Connect>) -> Self {
        let classifier = Classifier::from_config(&config, &host);
        SnapperPlugin {
            config,
            host,
            connector,
            classifier,
            controller: SnapshotController::unbound("plugin not initialized"),
            last_pair: None,
        }
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn controller(&self) -> &SnapshotController {
        &self.controller
    }

    /// The snapshots taken around the last transaction, if both were taken.
    pub fn last_pair(&self) -> Option<(SnapshotHandle, SnapshotHandle)> {
        self.last_pair
    }
}

impl fmt::Debug for SnapperPlugin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SnapperPlugin")
            .field("config", &self.config)
            .field("host", &self.host)
            .field("controller", &self.controller)
            .field("last_pair", &self.last_pair)
            .finish()
    }
}

impl Plugin for SnapperPlugin {
    fn api_version(&self) -> PluginApiVersion {
        REQUIRED_PLUGIN_API_VERSION
    }

    fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    fn version(&self) -> PluginVersion {
        PluginVersion::current()
    }

    fn attributes(&self) -> Vec<&'static str> {
        ATTRIBUTES.iter().map(|(name, _)| *name).collect()
    }

    fn attribute(&self, name: &str) -> Option<&'static str> {
        ATTRIBUTES
            .iter()
            .find(|(attr, _)| *attr == name)
            .map(|(_, value)| *value)
    }

    fn init(&mut self) -> Result<(), Error> {
        self.controller = SnapshotController::initialize(
            &*self.connector,
            &self.config.snapper_config,
            &self.host.installroot,
        );
        Ok(())
    }

    fn pre_transaction(&mut self, transaction: &TransactionPlan) -> Result<(), Error> {
        let scd = self.classifier.classify(transaction);
        self.controller.before_transaction(&scd)?;
        Ok(())
    }

    fn post_transaction(&mut self, transaction: &TransactionPlan) -> Result<(), Error> {
        let scd = self.classifier.classify(transaction);
        let pre = self.controller.pending();
        if let (Some(pre), Some(post)) = (pre, self.controller.after_transaction(&scd)?) {
            self.last_pair = Some((pre, post));
        }
        Ok(())
    }
}

/// Create the plugin for a host speaking `host_api`, configured by the plugin config `config`.
pub fn new_instance(
    host_api: PluginApiVersion,
    host: HostConfig,
    config: &ConfigParser,
    connector: Box<dyn Connect>,
) -> Result<SnapperPlugin, Error> {
    if !REQUIRED_PLUGIN_API_VERSION.is_satisfied_by(host_api) {
        return Err(ErrorKind::IncompatibleApiVersion {
            required: REQUIRED_PLUGIN_API_VERSION,
            found: host_api,
        }
        .into());
    }
    let config = PluginConfig::from_parser(config);
    debug!("Snapper plugin: {:?}", config);
    Ok(SnapperPlugin::new(config, host, connector))
}
