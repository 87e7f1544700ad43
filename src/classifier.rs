//! Deciding how to describe a transaction, and whether its snapshots are important.
//!
//! The result is an [`Scd`](../scd/struct.Scd.html) that is handed unchanged to the snapshot
//! backend. Classification never fails: a transaction we cannot say anything interesting about
//! still gets a descriptor with an empty summary.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use itertools::Itertools;

use crate::action::Action;
use crate::config::{HostConfig, ImportancePolicy, PluginConfig, DEFAULT_DESCRIPTION_LABEL,
                    DEFAULT_EXCLUDE_TRIVIAL_ACTIONS};
use crate::package::Package;
use crate::scd::Scd;
use crate::transaction::TransactionPlan;

/// Prefix of the userdata keys holding per-action counts.
pub const COUNT_KEY_PREFIX: &str = "rpm:";

/// How packages are compared against the protected and install-only lists.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MatchMode {
    /// Only the package name is compared.
    Exact,
    /// The package name and everything the package provides are compared.
    Provides,
}

/// What goes in the userdata of the descriptor, besides the important tag.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UserdataMode {
    /// Nothing else.
    Important,
    /// `rpm:<action>` = number of packages, for each action in the transaction.
    Counts,
    /// One entry per package, nevra = action. When a package appears more than once, a
    /// bookkeeping action never hides a real one, otherwise the first action listed is kept.
    Packages,
}

/// The format of the snapshot description.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DescriptionMode {
    /// `DNF (installed 2, removed 1)`
    Detailed,
    /// `DNF (3 package actions)`
    Summary,
}

impl Default for MatchMode {
    fn default() -> Self {
        MatchMode::Exact
    }
}

impl Default for UserdataMode {
    fn default() -> Self {
        UserdataMode::Important
    }
}

impl Default for DescriptionMode {
    fn default() -> Self {
        DescriptionMode::Detailed
    }
}

/// Just to avoid repeating myself
macro_rules! option_names {
    ($ty:ident { $($variant:ident => $name:literal),* $(,)* }) => {
        impl $ty {
            pub fn name(self) -> &'static str {
                match self {
                    $($ty::$variant => $name,)*
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, String> {
                match s.trim() {
                    $($name => Ok($ty::$variant),)*
                    other => Err(format!("unknown {} \"{}\"", stringify!($ty), other)),
                }
            }
        }
    };
}

option_names!(MatchMode {
    Exact => "exact",
    Provides => "provides",
});

option_names!(UserdataMode {
    Important => "important",
    Counts => "counts",
    Packages => "packages",
});

option_names!(DescriptionMode {
    Detailed => "detailed",
    Summary => "summary",
});

/// The knobs of the classifier.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ClassifierOptions {
    /// Skip `replaced` and `reason-changed` actions entirely.
    pub exclude_trivial: bool,
    pub match_mode: MatchMode,
    pub userdata_mode: UserdataMode,
    pub description_mode: DescriptionMode,
    /// Text in front of the summary in the description.
    pub label: String,
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        ClassifierOptions {
            exclude_trivial: DEFAULT_EXCLUDE_TRIVIAL_ACTIONS,
            match_mode: MatchMode::default(),
            userdata_mode: UserdataMode::default(),
            description_mode: DescriptionMode::default(),
            label: DEFAULT_DESCRIPTION_LABEL.to_owned(),
        }
    }
}

/// Which list a package matched.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum MatchReason {
    Protected,
    InstallOnly,
}

impl fmt::Display for MatchReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MatchReason::Protected => f.write_str("protected"),
            MatchReason::InstallOnly => f.write_str("install-only"),
        }
    }
}

/// A package that made the transaction important.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct Match {
    pub reason: MatchReason,
    pub package: Package,
}

/// A descriptor together with the packages that made it important.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Classification {
    pub scd: Scd,
    /// Sorted, without duplicates.
    pub matches: Vec<Match>,
}

/// Turns transaction plans into snapshot descriptors.
#[derive(Debug, Clone)]
pub struct Classifier {
    options: ClassifierOptions,
    policy: ImportancePolicy,
    protected: BTreeSet<String>,
    installonly: BTreeSet<String>,
}

impl Classifier {
    pub fn new<P, I, S, T>(
        options: ClassifierOptions,
        policy: ImportancePolicy,
        protected_names: P,
        installonly_names: I,
    ) -> Self
    where
        P: IntoIterator<Item = S>,
        I: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Classifier {
            options,
            policy,
            protected: protected_names.into_iter().map(Into::into).collect(),
            installonly: installonly_names.into_iter().map(Into::into).collect(),
        }
    }

    /// Build a classifier from the plugin and host configuration. Lists whose policy flag is off
    /// are not loaded at all.
    pub fn from_config(config: &PluginConfig, host: &HostConfig) -> Self {
        let policy = config.policy;
        let protected = if policy.protected_are_important {
            host.protected_packages.clone()
        } else {
            Vec::new()
        };
        let installonly = if policy.installonly_are_important {
            host.installonly_packages.clone()
        } else {
            Vec::new()
        };
        Classifier::new(config.classifier.clone(), policy, protected, installonly)
    }

    pub fn options(&self) -> &ClassifierOptions {
        &self.options
    }

    pub fn policy(&self) -> &ImportancePolicy {
        &self.policy
    }

    /// Build the descriptor for `plan`.
    pub fn classify(&self, plan: &TransactionPlan) -> Scd {
        self.classify_detailed(plan).scd
    }

    /// Like `classify`, but also report which packages made the transaction important.
    pub fn classify_detailed(&self, plan: &TransactionPlan) -> Classification {
        let mut counts: BTreeMap<Action, usize> = BTreeMap::new();
        let mut records: BTreeMap<String, Action> = BTreeMap::new();
        let mut matches = Vec::new();

        for item in plan {
            if self.options.exclude_trivial && item.action.is_trivial() {
                continue;
            }
            *counts.entry(item.action).or_insert(0) += 1;

            if self.options.userdata_mode == UserdataMode::Packages {
                // a reinstall lists the same nevra as reinstalled and replaced
                let action = records.entry(item.package.nevra()).or_insert(item.action);
                if action.is_trivial() && !item.action.is_trivial() {
                    *action = item.action;
                }
            }

            if self.policy.protected_are_important && self.is_listed(&item.package, &self.protected) {
                matches.push(Match {
                    reason: MatchReason::Protected,
                    package: item.package.clone(),
                });
            }
            if self.policy.installonly_are_important
                && self.is_listed(&item.package, &self.installonly)
            {
                matches.push(Match {
                    reason: MatchReason::InstallOnly,
                    package: item.package.clone(),
                });
            }
        }
        matches.sort();
        matches.dedup();

        let mut scd = Scd::new(self.describe(&counts));
        if !matches.is_empty() {
            scd.mark_important();
            self.log_matches(&matches);
        }

        match self.options.userdata_mode {
            UserdataMode::Important => (),
            UserdataMode::Counts => {
                for (action, count) in &counts {
                    scd.userdata.insert(
                        format!("{}{}", COUNT_KEY_PREFIX, action.label()),
                        count.to_string(),
                    );
                }
            }
            UserdataMode::Packages => scd.userdata.extend(
                records
                    .into_iter()
                    .map(|(nevra, action)| (nevra, action.label().to_owned())),
            ),
        }

        debug!("Snapper plugin: transaction description \"{}\"", scd.description);
        Classification { scd, matches }
    }

    fn describe(&self, counts: &BTreeMap<Action, usize>) -> String {
        let label = &self.options.label;
        match self.options.description_mode {
            DescriptionMode::Detailed => format!(
                "{} ({})",
                label,
                counts
                    .iter()
                    .map(|(action, count)| format!("{} {}", action, count))
                    .join(", ")
            ),
            DescriptionMode::Summary => format!(
                "{} ({} package actions)",
                label,
                counts.values().sum::<usize>()
            ),
        }
    }

    fn is_listed(&self, package: &Package, names: &BTreeSet<String>) -> bool {
        if names.contains(package.name.as_str()) {
            return true;
        }
        match self.options.match_mode {
            MatchMode::Exact => false,
            MatchMode::Provides => package.provide_names().any(|name| names.contains(name)),
        }
    }

    fn log_matches(&self, matches: &[Match]) {
        for reason in &[MatchReason::Protected, MatchReason::InstallOnly] {
            let listed = matches
                .iter()
                .filter(|m| m.reason == *reason)
                .map(|m| match self.options.match_mode {
                    MatchMode::Exact => m.package.name.clone(),
                    MatchMode::Provides => m.package.nevra(),
                })
                .unique()
                .join(", ");
            if !listed.is_empty() {
                info!("Snapper plugin: {} packages in transaction: {}", reason, listed);
            }
        }
    }
}

/// Build the descriptor for `plan` in one go.
pub fn classify<S: AsRef<str>>(
    plan: &TransactionPlan,
    policy: &ImportancePolicy,
    protected_names: &[S],
    installonly_names: &[S],
    options: &ClassifierOptions,
) -> Scd {
    Classifier::new(
        options.clone(),
        *policy,
        protected_names.iter().map(|s| s.as_ref()),
        installonly_names.iter().map(|s| s.as_ref()),
    )
    .classify(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scd::{CLEANUP_ALGORITHM, IMPORTANT_KEY};
    use crate::transaction::PackageAction;

    const NONE: &[&str] = &[];

    fn pkg(name: &str) -> Package {
        Package::new(name, "1.0-1.fc40", "x86_64")
    }

    fn policy(protected: bool, installonly: bool) -> ImportancePolicy {
        ImportancePolicy {
            protected_are_important: protected,
            installonly_are_important: installonly,
        }
    }

    fn foo_bar_baz() -> TransactionPlan {
        TransactionPlan::new()
            .with(pkg("foo"), Action::Installed)
            .with(pkg("bar"), Action::Removed)
            .with(pkg("baz"), Action::Installed)
    }

    #[test]
    fn protected_package_is_important() {
        let scd = classify(
            &foo_bar_baz(),
            &policy(true, true),
            &["bar"],
            NONE,
            &ClassifierOptions::default(),
        );
        assert_eq!(scd.userdata.get(IMPORTANT_KEY).map(String::as_str), Some("yes"));
        assert_eq!(scd.description, "DNF (installed 2, removed 1)");
        assert_eq!(scd.cleanup, CLEANUP_ALGORITHM);
    }

    #[test]
    fn protected_ignored_when_policy_off() {
        let scd = classify(
            &foo_bar_baz(),
            &policy(false, true),
            &["foo", "bar", "baz"],
            NONE,
            &ClassifierOptions::default(),
        );
        assert!(!scd.is_important());
        assert!(scd.userdata.is_empty());
    }

    #[test]
    fn installonly_package_is_important() {
        let plan = TransactionPlan::new()
            .with(pkg("kernel"), Action::Installed)
            .with(pkg("kernel"), Action::Removed);
        let options = ClassifierOptions::default();
        let scd = classify(&plan, &policy(false, true), NONE, &["kernel"], &options);
        assert!(scd.is_important());
        let scd = classify(&plan, &policy(true, false), NONE, &["kernel"], &options);
        assert!(!scd.is_important());
    }

    #[test]
    fn empty_plan() {
        let classifier = Classifier::new(
            ClassifierOptions::default(),
            policy(true, true),
            vec!["dnf5"],
            vec!["kernel"],
        );
        let classification = classifier.classify_detailed(&TransactionPlan::new());
        let scd = classification.scd;
        assert_eq!(scd.description, "DNF ()");
        assert_eq!(scd.cleanup, "number");
        assert!(scd.userdata.get(IMPORTANT_KEY).is_none());
        assert!(classification.matches.is_empty());
    }

    #[test]
    fn canonical_order_and_determinism() {
        let plan = TransactionPlan::new()
            .with(pkg("a"), Action::Removed)
            .with(pkg("b"), Action::Downgraded)
            .with(pkg("c"), Action::Installed)
            .with(pkg("d"), Action::Upgraded)
            .with(pkg("e"), Action::Reinstalled)
            .with(pkg("f"), Action::Upgraded);
        let reversed: TransactionPlan = plan.iter().rev().cloned().collect();
        let classifier = Classifier::new(
            ClassifierOptions {
                userdata_mode: UserdataMode::Counts,
                ..Default::default()
            },
            policy(true, true),
            vec!["e"],
            NONE.iter().cloned(),
        );

        let first = classifier.classify(&plan);
        assert_eq!(
            first.description,
            "DNF (installed 1, upgraded 2, downgraded 1, reinstalled 1, removed 1)"
        );
        assert_eq!(first, classifier.classify(&plan));
        assert_eq!(first, classifier.classify(&reversed));
    }

    #[test]
    fn trivial_actions_excluded() {
        let plan = TransactionPlan::new()
            .with(pkg("dnf5"), Action::Replaced)
            .with(pkg("kernel"), Action::ReasonChanged);
        let options = ClassifierOptions::default();
        assert!(options.exclude_trivial);

        let scd = classify(&plan, &policy(true, true), &["dnf5"], &["kernel"], &options);
        assert_eq!(scd.description, "DNF ()");
        assert!(!scd.is_important());

        let summary = ClassifierOptions {
            description_mode: DescriptionMode::Summary,
            ..Default::default()
        };
        let scd = classify(&plan, &policy(true, true), &["dnf5"], &["kernel"], &summary);
        assert_eq!(scd.description, "DNF (0 package actions)");
    }

    #[test]
    fn trivial_actions_counted() {
        let plan = TransactionPlan::new()
            .with(pkg("dnf5"), Action::Replaced)
            .with(pkg("sudo"), Action::Upgraded)
            .with(pkg("vim"), Action::ReasonChanged);
        let options = ClassifierOptions {
            exclude_trivial: false,
            ..Default::default()
        };
        let scd = classify(&plan, &policy(true, true), &["dnf5"], NONE, &options);
        assert_eq!(scd.description, "DNF (upgraded 1, replaced 1, reason-changed 1)");
        assert!(scd.is_important());
    }

    #[test]
    fn provides_matching() {
        let kernel_core = Package::new("kernel-core", "6.8.5-301.fc40", "x86_64")
            .with_provides(vec!["installonlypkg(kernel)", "kernel-uname-r = 6.8.5-301.fc40.x86_64"]);
        let plan = TransactionPlan::new()
            .with(kernel_core, Action::Installed)
            .with(pkg("bash"), Action::Upgraded);
        let installonly = &["installonlypkg(kernel)"];

        let exact = Classifier::new(
            ClassifierOptions::default(),
            policy(true, true),
            NONE.iter().cloned(),
            installonly.iter().cloned(),
        );
        assert!(!exact.classify(&plan).is_important());

        let provides = Classifier::new(
            ClassifierOptions {
                match_mode: MatchMode::Provides,
                ..Default::default()
            },
            policy(true, true),
            NONE.iter().cloned(),
            installonly.iter().cloned(),
        );
        let classification = provides.classify_detailed(&plan);
        assert!(classification.scd.is_important());
        let matched: Vec<_> = classification
            .matches
            .iter()
            .map(|m| (m.reason, m.package.nevra()))
            .collect();
        assert_eq!(
            matched,
            vec![(MatchReason::InstallOnly, "kernel-core-6.8.5-301.fc40.x86_64".to_owned())]
        );
    }

    #[test]
    fn matches_sorted_and_unique() {
        let plan = TransactionPlan::new()
            .with(Package::new("kernel", "6.9.1-200.fc40", "x86_64"), Action::Installed)
            .with(pkg("dnf5"), Action::Upgraded)
            .with(Package::new("kernel", "6.8.5-301.fc40", "x86_64"), Action::Removed)
            .with(pkg("dnf5").with_provides(vec!["dnf5-command(upgrade)"]), Action::Reinstalled);
        let classifier = Classifier::new(
            ClassifierOptions::default(),
            policy(true, true),
            vec!["dnf5", "kernel"],
            vec!["kernel"],
        );
        let matched: Vec<_> = classifier
            .classify_detailed(&plan)
            .matches
            .into_iter()
            .map(|m| (m.reason, m.package.nevra()))
            .collect();
        assert_eq!(
            matched,
            vec![
                (MatchReason::Protected, "dnf5-1.0-1.fc40.x86_64".to_owned()),
                (MatchReason::Protected, "kernel-6.8.5-301.fc40.x86_64".to_owned()),
                (MatchReason::Protected, "kernel-6.9.1-200.fc40.x86_64".to_owned()),
                (MatchReason::InstallOnly, "kernel-6.8.5-301.fc40.x86_64".to_owned()),
                (MatchReason::InstallOnly, "kernel-6.9.1-200.fc40.x86_64".to_owned()),
            ]
        );
    }

    #[test]
    fn userdata_counts() {
        let options = ClassifierOptions {
            userdata_mode: UserdataMode::Counts,
            ..Default::default()
        };
        let scd = classify(&foo_bar_baz(), &policy(true, true), &["bar"], NONE, &options);
        let userdata: Vec<_> = scd
            .userdata
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            userdata,
            vec![("important", "yes"), ("rpm:installed", "2"), ("rpm:removed", "1")]
        );
    }

    #[test]
    fn userdata_packages() {
        let plan = TransactionPlan::new()
            .with(Package::new("vim-enhanced", "2:9.1.393-1.fc40", "x86_64"), Action::Upgraded)
            .with(Package::new("vim-enhanced", "2:9.1.300-1.fc40", "x86_64"), Action::Replaced)
            .with(pkg("tzdata"), Action::Removed);
        let options = ClassifierOptions {
            userdata_mode: UserdataMode::Packages,
            ..Default::default()
        };
        let scd = classify(&plan, &policy(true, true), NONE, NONE, &options);
        let userdata: Vec<_> = scd
            .userdata
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            userdata,
            vec![
                ("tzdata-1.0-1.fc40.x86_64", "removed"),
                ("vim-enhanced-2:9.1.393-1.fc40.x86_64", "upgraded"),
            ]
        );
    }

    #[test]
    fn userdata_packages_reinstall() {
        let options = ClassifierOptions {
            exclude_trivial: false,
            userdata_mode: UserdataMode::Packages,
            ..Default::default()
        };
        let test_set = vec![
            vec![Action::Reinstalled, Action::Replaced],
            vec![Action::Replaced, Action::Reinstalled],
        ];
        for actions in test_set {
            let plan: TransactionPlan = actions
                .iter()
                .map(|action| PackageAction::new(pkg("foo"), *action))
                .collect();
            let scd = classify(&plan, &policy(true, true), NONE, NONE, &options);
            assert_eq!(scd.description, "DNF (reinstalled 1, replaced 1)");
            assert_eq!(
                scd.userdata.get("foo-1.0-1.fc40.x86_64").map(String::as_str),
                Some("reinstalled"),
                "{:?}",
                actions
            );
            assert_eq!(scd.userdata.len(), 1);
        }
    }

    #[test]
    fn summary_description_with_label() {
        let options = ClassifierOptions {
            description_mode: DescriptionMode::Summary,
            label: "dnf5 upgrade".to_owned(),
            ..Default::default()
        };
        let scd = classify(&foo_bar_baz(), &policy(true, true), NONE, NONE, &options);
        assert_eq!(scd.description, "dnf5 upgrade (3 package actions)");
    }

    #[test]
    fn from_config_skips_disabled_lists() {
        let mut config = PluginConfig::default();
        config.policy.protected_are_important = false;
        let host = HostConfig::default();
        let classifier = Classifier::from_config(&config, &host);
        assert!(classifier.protected.is_empty());
        assert!(classifier.installonly.contains("kernel"));
    }

    #[test]
    fn option_names() {
        assert_eq!("provides".parse::<MatchMode>(), Ok(MatchMode::Provides));
        assert_eq!(" counts ".parse::<UserdataMode>(), Ok(UserdataMode::Counts));
        assert_eq!("summary".parse::<DescriptionMode>(), Ok(DescriptionMode::Summary));
        assert!("verbose".parse::<DescriptionMode>().is_err());
        assert_eq!(UserdataMode::Packages.to_string(), "packages");
    }
}
