//! Sequencing the pre and post snapshots around a transaction.
//!
//! The controller is either unbound (no snapper, every request is skipped) or bound to a
//! backend. A bound controller may hold the pre snapshot of the transaction in progress, which
//! the post snapshot is then paired with.
use std::fmt;
use std::path::Path;

use crate::backend::{Connect, SnapshotBackend, SnapshotHandle};
use crate::error::Error;
use crate::scd::Scd;

/// What the controller can currently do.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ControllerState {
    /// No backend, snapshots are skipped.
    Unbound,
    /// Ready to take a pre snapshot.
    Bound,
    /// A pre snapshot was taken and is waiting for its post snapshot.
    PrePending,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ControllerState::Unbound => f.write_str("unbound"),
            ControllerState::Bound => f.write_str("bound"),
            ControllerState::PrePending => f.write_str("pre snapshot pending"),
        }
    }
}

/// The connection to the backend, if there is one.
#[derive(Debug)]
pub enum Binding {
    Unbound {
        /// Why there is no backend.
        reason: String,
    },
    Bound {
        backend: Box<dyn SnapshotBackend>,
        /// The pre snapshot waiting for its post snapshot.
        pending: Option<SnapshotHandle>,
    },
}

/// Takes pre and post snapshots.
#[derive(Debug)]
pub struct SnapshotController {
    binding: Binding,
}

impl SnapshotController {
    /// Bind to `config_name` on the system at `root`.
    ///
    /// Never fails: if the backend cannot be reached the controller stays unbound and skips all
    /// snapshots.
    pub fn initialize(connector: &dyn Connect, config_name: &str, root: &Path) -> Self {
        match connector.connect(config_name, root) {
            Ok(backend) => {
                info!(
                    "Snapper plugin: using config \"{}\" at {}",
                    backend.config_name(),
                    backend.subvolume_dir().display()
                );
                SnapshotController::bound(backend)
            }
            Err(e) => {
                let reason = match std::error::Error::source(&e) {
                    Some(source) => format!("{}: {}", e, source),
                    None => e.to_string(),
                };
                warn!("Snapper plugin: failed to init: {}", reason);
                SnapshotController::unbound(reason)
            }
        }
    }

    /// A controller with a backend already bound.
    pub fn bound(backend: Box<dyn SnapshotBackend>) -> Self {
        SnapshotController {
            binding: Binding::Bound {
                backend,
                pending: None,
            },
        }
    }

    /// A controller that skips every snapshot.
    pub fn unbound(reason: impl Into<String>) -> Self {
        SnapshotController {
            binding: Binding::Unbound {
                reason: reason.into(),
            },
        }
    }

    pub fn state(&self) -> ControllerState {
        match &self.binding {
            Binding::Unbound { .. } => ControllerState::Unbound,
            Binding::Bound { pending: None, .. } => ControllerState::Bound,
            Binding::Bound {
                pending: Some(_), ..
            } => ControllerState::PrePending,
        }
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    /// The pre snapshot waiting for its post snapshot, if any.
    pub fn pending(&self) -> Option<SnapshotHandle> {
        match &self.binding {
            Binding::Bound { pending, .. } => *pending,
            Binding::Unbound { .. } => None,
        }
    }

    /// Take the pre snapshot. Returns `None` when unbound.
    ///
    /// If the backend fails, the error is returned and the state is unchanged.
    pub fn before_transaction(&mut self, scd: &Scd) -> Result<Option<SnapshotHandle>, Error> {
        match &mut self.binding {
            Binding::Unbound { .. } => {
                info!("Snapper plugin: no Snapper - not creating pre snapshot");
                Ok(None)
            }
            Binding::Bound { backend, pending } => {
                if let Some(stale) = pending {
                    warn!(
                        "Snapper plugin: pre snapshot {} was never paired with a post snapshot",
                        stale
                    );
                }
                debug!("Snapper plugin: creating pre snapshot");
                let pre = backend.create_pre_snapshot(scd)?;
                info!("Snapper plugin: created pre snapshot {}", pre);
                *pending = Some(pre);
                Ok(Some(pre))
            }
        }
    }

    /// Take the post snapshot, paired with the pending pre snapshot. Returns `None` when unbound
    /// or when there is no pre snapshot to pair with.
    ///
    /// The pending pre snapshot is consumed even if the backend fails.
    pub fn after_transaction(&mut self, scd: &Scd) -> Result<Option<SnapshotHandle>, Error> {
        match &mut self.binding {
            Binding::Unbound { .. } => {
                info!("Snapper plugin: no Snapper - not creating post snapshot");
                Ok(None)
            }
            Binding::Bound { backend, pending } => match pending.take() {
                None => {
                    warn!("Snapper plugin: no pre snapshot - not creating post snapshot");
                    Ok(None)
                }
                Some(pre) => {
                    debug!("Snapper plugin: creating post snapshot for pre snapshot {}", pre);
                    let post = backend.create_post_snapshot(&pre, scd)?;
                    info!("Snapper plugin: created post snapshot {}", post);
                    Ok(Some(post))
                }
            },
        }
    }
}
