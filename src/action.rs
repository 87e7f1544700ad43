//! What a transaction does to a package.
use std::fmt;
use std::str::FromStr;

/// The action a transaction performs on one package.
///
/// Variants are declared in the order the package manager enumerates them, and `Ord` follows
/// that order. Summaries are always printed in this order, whatever order the transaction lists
/// its packages in.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// A new package was installed.
    Installed,
    /// A package was upgraded to a newer version.
    Upgraded,
    /// A package was downgraded to an older version.
    Downgraded,
    /// The same version of a package was installed again.
    Reinstalled,
    /// A package was removed.
    Removed,
    /// The old version of an upgraded, downgraded or obsoleted package.
    Replaced,
    /// Only the reason a package is installed changed.
    ReasonChanged,
}

impl Action {
    /// Every action, in canonical order.
    pub const ALL: [Action; 7] = [
        Action::Installed,
        Action::Upgraded,
        Action::Downgraded,
        Action::Reinstalled,
        Action::Removed,
        Action::Replaced,
        Action::ReasonChanged,
    ];

    /// The label used in descriptions and userdata.
    pub fn label(self) -> &'static str {
        match self {
            Action::Installed => "installed",
            Action::Upgraded => "upgraded",
            Action::Downgraded => "downgraded",
            Action::Reinstalled => "reinstalled",
            Action::Removed => "removed",
            Action::Replaced => "replaced",
            Action::ReasonChanged => "reason-changed",
        }
    }

    /// Bookkeeping actions that do not change files on disk.
    pub fn is_trivial(self) -> bool {
        match self {
            Action::Replaced | Action::ReasonChanged => true,
            _ => false,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The given string is not the name of an action.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UnknownAction(pub String);

impl fmt::Display for UnknownAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\" is not a package action", self.0)
    }
}

impl std::error::Error for UnknownAction {}

impl FromStr for Action {
    type Err = UnknownAction;

    /// Accepts our labels as well as the host's names ("Install", "Reason Change", ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(' ', "-");
        let action = match normalized.as_str() {
            "installed" | "install" => Action::Installed,
            "upgraded" | "upgrade" => Action::Upgraded,
            "downgraded" | "downgrade" => Action::Downgraded,
            "reinstalled" | "reinstall" => Action::Reinstalled,
            "removed" | "remove" => Action::Removed,
            "replaced" => Action::Replaced,
            "reason-changed" | "reason-change" => Action::ReasonChanged,
            _ => return Err(UnknownAction(s.to_owned())),
        };
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::Action;

    #[test]
    fn canonical_order() {
        let mut sorted = vec![Action::Removed, Action::ReasonChanged, Action::Installed, Action::Upgraded];
        sorted.sort();
        assert_eq!(
            sorted,
            vec![Action::Installed, Action::Upgraded, Action::Removed, Action::ReasonChanged]
        );
        let mut all = Action::ALL.to_vec();
        all.sort();
        assert_eq!(&all[..], &Action::ALL[..]);
    }

    #[test]
    fn parse() {
        let test_set = vec![
            ("installed", Action::Installed),
            ("Install", Action::Installed),
            ("Reason Change", Action::ReasonChanged),
            ("reason-changed", Action::ReasonChanged),
            (" removed ", Action::Removed),
        ];
        for (input, expected) in test_set {
            assert_eq!(input.parse::<Action>().unwrap(), expected, "{:?}", input);
        }
        assert!("obsoleted".parse::<Action>().is_err());
    }

    #[test]
    fn trivial() {
        let trivial: Vec<_> = Action::ALL.iter().cloned().filter(|a| a.is_trivial()).collect();
        assert_eq!(trivial, vec![Action::Replaced, Action::ReasonChanged]);
    }
}
