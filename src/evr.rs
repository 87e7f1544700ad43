//! Parsing and comparing rpm `epoch:version-release` strings.
use std::{
    cmp::Ordering,
    fmt,
};

const DEFAULT_EPOCH: &str = "0";

/// An rpm epoch/version/release triple.
///
/// It has a custom Ord impl matching rpm's version ordering. See the tests to get a feel for how
/// it works.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Evr {
    /// The epoch (optional, defaults to "0")
    pub epoch: String,
    /// The version
    pub version: String,
    /// The release (optional)
    pub release: Option<String>,
}

impl Evr {
    /// Helper function to create an evr
    pub fn new(epoch: &str, version: &str, release: Option<&str>) -> Self {
        Evr {
            epoch: epoch.to_owned(),
            version: version.to_owned(),
            release: release.map(str::to_owned),
        }
    }

    /// Parse a string into an evr.
    ///
    /// There is an epoch only if the string starts with `digit* ':'`, and a release only if there
    /// is a `-` after the epoch.
    pub fn parse(input: &str) -> Evr {
        let digits = input.bytes().take_while(u8::is_ascii_digit).count();
        let (epoch, rest) = match input[digits..].starts_with(':') {
            true if digits > 0 => (&input[..digits], &input[digits + 1..]),
            true => (DEFAULT_EPOCH, &input[1..]),
            false => (DEFAULT_EPOCH, input),
        };
        match rest.rfind('-') {
            Some(idx) => Evr::new(epoch, &rest[..idx], Some(&rest[idx + 1..])),
            None => Evr::new(epoch, rest, None),
        }
    }

    /// Whether the epoch is the implicit default.
    pub fn has_default_epoch(&self) -> bool {
        rpmvercmp(&self.epoch, DEFAULT_EPOCH) == Ordering::Equal
    }

    /// Checks for byte equality, you can use this to see if the evr is the same, but written
    /// differently.
    pub fn byte_eq(&self, other: &Self) -> bool {
        self.epoch == other.epoch && self.version == other.version && self.release == other.release
    }
}

impl fmt::Display for Evr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !self.has_default_epoch() {
            write!(f, "{}:", self.epoch)?;
        }
        f.write_str(&self.version)?;
        if let Some(release) = &self.release {
            write!(f, "-{}", release)?;
        }
        Ok(())
    }
}

impl From<String> for Evr {
    fn from(s: String) -> Self {
        Evr::parse(&s)
    }
}

impl From<Evr> for String {
    fn from(evr: Evr) -> Self {
        evr.to_string()
    }
}

impl PartialOrd for Evr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Evr {
    fn cmp(&self, other: &Self) -> Ordering {
        match rpmvercmp(&self.epoch, &other.epoch) {
            Ordering::Equal => (),
            gtlt => return gtlt,
        };
        match rpmvercmp(&self.version, &other.version) {
            Ordering::Equal => (),
            gtlt => return gtlt,
        };
        // If either is missing just evaluate to equal - this matches rpm.
        match (&self.release, &other.release) {
            (Some(left), Some(right)) => rpmvercmp(left, right),
            _ => Ordering::Equal,
        }
    }
}

impl PartialEq for Evr {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Evr {}

/// Split `input` after the longest prefix whose bytes satisfy `test`.
fn split_while(input: &str, test: impl Fn(&u8) -> bool) -> (&str, &str) {
    let end = input.bytes().take_while(|b| test(b)).count();
    input.split_at(end)
}

fn is_separator(b: &u8) -> bool {
    !b.is_ascii_alphanumeric() && *b != b'~' && *b != b'^'
}

/// Find which version section is newer, or if they are equal
///
///  - Separators (anything that is not alphanumeric, `~` or `^`) only split segments, their
///    length does not matter.
///  - `~` sorts before everything, even the end of the string (so "1.0~rc1" is older than "1.0").
///  - `^` sorts after the end of the string but before anything else (so "1.0^git1" is newer
///    than "1.0" but older than "1.0.1").
///  - A numeric segment is newer than an alpha segment. Numeric segments are compared by value
///    (skip leading zeros, compare lengths, then bytes), alpha segments lexicographically.
///  - If all segments so far are equal, whichever side still has segments left is newer.
fn rpmvercmp(left: &str, right: &str) -> Ordering {
    if left == right {
        return Ordering::Equal;
    }
    let (mut one, mut two) = (left, right);
    loop {
        one = split_while(one, is_separator).1;
        two = split_while(two, is_separator).1;

        if one.starts_with('~') || two.starts_with('~') {
            if !one.starts_with('~') {
                return Ordering::Greater;
            }
            if !two.starts_with('~') {
                return Ordering::Less;
            }
            one = &one[1..];
            two = &two[1..];
            continue;
        }

        if one.starts_with('^') || two.starts_with('^') {
            if one.is_empty() {
                return Ordering::Less;
            }
            if two.is_empty() {
                return Ordering::Greater;
            }
            if !one.starts_with('^') {
                return Ordering::Greater;
            }
            if !two.starts_with('^') {
                return Ordering::Less;
            }
            one = &one[1..];
            two = &two[1..];
            continue;
        }

        if one.is_empty() || two.is_empty() {
            break;
        }

        let numeric = one.as_bytes()[0].is_ascii_digit();
        let class: fn(&u8) -> bool = if numeric {
            u8::is_ascii_digit
        } else {
            u8::is_ascii_alphabetic
        };
        let (seg1, rest1) = split_while(one, class);
        let (seg2, rest2) = split_while(two, class);
        one = rest1;
        two = rest2;

        // segments of different types, numeric is newer
        if seg2.is_empty() {
            return if numeric { Ordering::Greater } else { Ordering::Less };
        }

        let ord = if numeric {
            let seg1 = seg1.trim_start_matches('0');
            let seg2 = seg2.trim_start_matches('0');
            seg1.len().cmp(&seg2.len()).then_with(|| seg1.cmp(seg2))
        } else {
            seg1.cmp(seg2)
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    match (one.is_empty(), two.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        _ => Ordering::Greater,
    }
}
