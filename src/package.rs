use std::cmp::Ordering;
use std::fmt;

use crate::evr::Evr;

/// A package as seen by a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub evr: Evr,
    pub arch: String,
    /// The capabilities this package provides, as written in the package header (for example
    /// `kernel-uname-r = 6.8.5-301.fc40.x86_64`).
    #[serde(default)]
    pub provides: Vec<String>,
}

impl Package {
    pub fn new(name: impl Into<String>, evr: impl AsRef<str>, arch: impl Into<String>) -> Self {
        Package {
            name: name.into(),
            evr: Evr::parse(evr.as_ref()),
            arch: arch.into(),
            provides: Vec::new(),
        }
    }

    /// Add provides to this package.
    pub fn with_provides<I, S>(mut self, provides: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provides.extend(provides.into_iter().map(Into::into));
        self
    }

    /// The full identity of this package, `name-[epoch:]version-release.arch`.
    pub fn nevra(&self) -> String {
        self.to_string()
    }

    /// The names of the capabilities this package provides, without any version constraint.
    pub fn provide_names(&self) -> impl Iterator<Item = &str> {
        self.provides.iter().filter_map(|p| provide_name(p))
    }
}

/// The name part of a provide like `foo(x86-64) >= 1.0`.
fn provide_name(provide: &str) -> Option<&str> {
    provide
        .split(|c: char| c.is_whitespace() || c == '<' || c == '>' || c == '=')
        .find(|s| !s.is_empty())
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.evr)?;
        if !self.arch.is_empty() {
            write!(f, ".{}", self.arch)?;
        }
        Ok(())
    }
}

impl PartialOrd for Package {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Packages are the same when their name, evr and arch are, whatever they provide.
impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Package {}

/// Name, then evr, then arch.
impl Ord for Package {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.evr.cmp(&other.evr))
            .then_with(|| self.arch.cmp(&other.arch))
    }
}
