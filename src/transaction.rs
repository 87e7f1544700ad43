//! The host's view of a transaction. These are read-only for the plugin: the host resolves the
//! transaction, we only look at it.

use std::iter::FromIterator;
use std::slice;

use crate::action::Action;
use crate::package::Package;

/// One package and what the transaction does to it.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PackageAction {
    #[serde(flatten)]
    pub package: Package,
    pub action: Action,
}

impl PackageAction {
    pub fn new(package: Package, action: Action) -> Self {
        PackageAction { package, action }
    }
}

/// An ordered list of package actions.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionPlan {
    actions: Vec<PackageAction>,
}

impl TransactionPlan {
    pub fn new() -> Self {
        Default::default()
    }

    /// Add an action to the end of the plan.
    pub fn push(&mut self, package: Package, action: Action) {
        self.actions.push(PackageAction::new(package, action));
    }

    /// Builder-style `push`.
    pub fn with(mut self, package: Package, action: Action) -> Self {
        self.push(package, action);
        self
    }

    /// The total number of package actions, including bookkeeping ones.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, PackageAction> {
        self.actions.iter()
    }
}

impl<'a> IntoIterator for &'a TransactionPlan {
    type Item = &'a PackageAction;
    type IntoIter = slice::Iter<'a, PackageAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<PackageAction> for TransactionPlan {
    fn from_iter<I: IntoIterator<Item = PackageAction>>(iter: I) -> Self {
        TransactionPlan {
            actions: iter.into_iter().collect(),
        }
    }
}
