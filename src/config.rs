//! Configuration of the plugin and the parts of the host's configuration it reads.
//!
//! Both come from ini files:
//!
//! ```ini
//! [main]
//! enabled = 1
//!
//! [snapper]
//! config = root
//! protected_are_important = yes
//! ```
use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use nom::types::CompleteStr;

use crate::classifier::{ClassifierOptions, DescriptionMode, MatchMode, UserdataMode};
use crate::error::{Error, ErrorKind};

/// The section of the plugin config holding our options.
pub const PLUGIN_SECTION: &str = "snapper";
/// The section of the host config holding global options.
pub const HOST_SECTION: &str = "main";

/// Snapper config used when none is configured.
pub const DEFAULT_SNAPPER_CONFIG: &str = "root";
pub const DEFAULT_PROTECTED_ARE_IMPORTANT: bool = true;
pub const DEFAULT_INSTALLONLY_ARE_IMPORTANT: bool = true;
pub const DEFAULT_EXCLUDE_TRIVIAL_ACTIONS: bool = true;
pub const DEFAULT_DESCRIPTION_LABEL: &str = "DNF";

pub const DEFAULT_INSTALLROOT: &str = "/";
pub const DEFAULT_PROTECTED_PACKAGES: &[&str] = &["dnf5", "glob:/etc/dnf/protected.d/*.conf"];

/// List entries starting with this are expanded to the package names in the matching files.
pub const GLOB_PREFIX: &str = "glob:";
pub const DEFAULT_INSTALLONLY_PACKAGES: &[&str] = &[
    "kernel",
    "kernel-PAE",
    "installonlypkg(kernel)",
    "installonlypkg(kernel-module)",
    "installonlypkg(vm)",
    "multiversion(kernel)",
];

/// An ini file, as sections of `key = value` options.
///
/// Lines starting with `#` or `;` are comments. An indented line continues the value of the
/// option above it.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ConfigParser {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl ConfigParser {
    pub fn new() -> Self {
        Default::default()
    }

    /// Read and parse the file at `path`.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        debug!("read configuration from {}", path.display());
        raw.parse()
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    pub fn has_option(&self, section: &str, key: &str) -> bool {
        self.get_value(section, key).is_some()
    }

    /// Get the raw value of an option.
    pub fn get_value(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|options| options.get(key))
            .map(String::as_str)
    }

    /// Set an option, creating the section if needed.
    pub fn set_value(
        &mut self,
        section: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.sections
            .entry(section.into())
            .or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
    }

    /// Builder-style `set_value`.
    pub fn with_value(
        mut self,
        section: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.set_value(section, key, value);
        self
    }

    /// Get a boolean option, falling back to `default` when it is missing or not a boolean.
    pub fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.get_parsed(section, key, parse_bool, default)
    }

    /// Get a list option. Items are separated by commas and/or whitespace.
    pub fn get_list(&self, section: &str, key: &str) -> Option<Vec<String>> {
        self.get_value(section, key).map(split_list)
    }

    fn get_parsed<T, F>(&self, section: &str, key: &str, parse: F, default: T) -> T
    where
        F: FnOnce(&str) -> Option<T>,
        T: Display,
    {
        match self.get_value(section, key) {
            None => default,
            Some(raw) => parse(raw).unwrap_or_else(|| {
                warn!(
                    r#"invalid value "{}" for option {}.{}, using "{}""#,
                    raw, section, key, default
                );
                default
            }),
        }
    }
}

impl FromStr for ConfigParser {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Error> {
        let mut parser = ConfigParser::new();
        let mut section: Option<String> = None;
        // (section, key) of the last option, for continuation lines
        let mut last: Option<(String, String)> = None;

        for (idx, raw_line) in input.lines().enumerate() {
            let syntax_error = || Error::from(ErrorKind::ConfigSyntax { line: idx + 1 });
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if nom_parsers::is_continuation(CompleteStr(raw_line)) {
                if let Some((sec, key)) = &last {
                    if let Some(value) = parser.sections.get_mut(sec).and_then(|o| o.get_mut(key)) {
                        value.push('\n');
                        value.push_str(line);
                        continue;
                    }
                }
            }

            if line.starts_with('[') {
                let name = match nom_parsers::section_header(CompleteStr(line)) {
                    Ok((rest, name)) if rest.0.is_empty() && !name.0.trim().is_empty() => {
                        name.0.trim().to_owned()
                    }
                    _ => return Err(syntax_error()),
                };
                parser.sections.entry(name.clone()).or_insert_with(BTreeMap::new);
                section = Some(name);
                last = None;
                continue;
            }

            let sec = match &section {
                Some(sec) => sec.clone(),
                None => return Err(syntax_error()),
            };
            let (value, key) = match nom_parsers::option_key(CompleteStr(line)) {
                Ok((value, key)) if !key.0.trim().is_empty() => (value.0.trim(), key.0.trim()),
                _ => return Err(syntax_error()),
            };
            parser.set_value(sec.clone(), key, value);
            last = Some((sec, key.to_owned()));
        }
        Ok(parser)
    }
}

/// The line grammar of the config format.
mod nom_parsers {
    use nom::types::CompleteStr;

    fn is_indent(chr: char) -> bool {
        chr == ' ' || chr == '\t'
    }

    fn is_list_separator(chr: char) -> bool {
        chr == ',' || chr.is_whitespace()
    }

    fn is_list_item(chr: char) -> bool {
        !is_list_separator(chr)
    }

    named!(indent(CompleteStr) -> CompleteStr, take_while1!(is_indent));

    /// An indented line continues the value above it.
    pub fn is_continuation(input: CompleteStr) -> bool {
        indent(input).is_ok()
    }

    named!(pub section_header(CompleteStr) -> CompleteStr, delimited!(
        char!('['),
        take_till1!(|chr: char| chr == ']'),
        char!(']')
    ));

    // the value is the remaining input
    named!(pub option_key(CompleteStr) -> CompleteStr, terminated!(
        take_till1!(|chr: char| chr == '='),
        char!('=')
    ));

    named!(pub list_items(CompleteStr) -> Vec<CompleteStr>, many0!(preceded!(
        take_while!(is_list_separator),
        take_while1!(is_list_item)
    )));
}

/// Parse a boolean the way the host does: `1`, `yes`, `true` and `on` are true, `0`, `no`,
/// `false` and `off` are false. Case-insensitive.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

fn split_list(value: &str) -> Vec<String> {
    match nom_parsers::list_items(CompleteStr(value)) {
        Ok((_, items)) => items.into_iter().map(|item| item.0.to_owned()).collect(),
        Err(_) => Vec::new(),
    }
}

/// Which kinds of package make a transaction important.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ImportancePolicy {
    pub protected_are_important: bool,
    pub installonly_are_important: bool,
}

impl Default for ImportancePolicy {
    fn default() -> Self {
        ImportancePolicy {
            protected_are_important: DEFAULT_PROTECTED_ARE_IMPORTANT,
            installonly_are_important: DEFAULT_INSTALLONLY_ARE_IMPORTANT,
        }
    }
}

/// The options in the plugin's own config file.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PluginConfig {
    /// Name of the snapper config to snapshot.
    pub snapper_config: String,
    pub policy: ImportancePolicy,
    pub classifier: ClassifierOptions,
}

impl Default for PluginConfig {
    fn default() -> Self {
        PluginConfig {
            snapper_config: DEFAULT_SNAPPER_CONFIG.to_owned(),
            policy: ImportancePolicy::default(),
            classifier: ClassifierOptions::default(),
        }
    }
}

impl PluginConfig {
    /// Read the `[snapper]` section. Missing options get their defaults, invalid ones are logged
    /// and also get their defaults.
    pub fn from_parser(parser: &ConfigParser) -> Self {
        let s = PLUGIN_SECTION;
        let defaults = ClassifierOptions::default();
        PluginConfig {
            snapper_config: parser
                .get_value(s, "config")
                .unwrap_or(DEFAULT_SNAPPER_CONFIG)
                .to_owned(),
            policy: ImportancePolicy {
                protected_are_important: parser.get_bool(
                    s,
                    "protected_are_important",
                    DEFAULT_PROTECTED_ARE_IMPORTANT,
                ),
                installonly_are_important: parser.get_bool(
                    s,
                    "installonly_are_important",
                    DEFAULT_INSTALLONLY_ARE_IMPORTANT,
                ),
            },
            classifier: ClassifierOptions {
                exclude_trivial: parser.get_bool(
                    s,
                    "exclude_trivial_actions",
                    DEFAULT_EXCLUDE_TRIVIAL_ACTIONS,
                ),
                match_mode: parser.get_parsed(
                    s,
                    "match",
                    |v| v.parse::<MatchMode>().ok(),
                    defaults.match_mode,
                ),
                userdata_mode: parser.get_parsed(
                    s,
                    "userdata",
                    |v| v.parse::<UserdataMode>().ok(),
                    defaults.userdata_mode,
                ),
                description_mode: parser.get_parsed(
                    s,
                    "description",
                    |v| v.parse::<DescriptionMode>().ok(),
                    defaults.description_mode,
                ),
                label: parser
                    .get_value(s, "description_label")
                    .filter(|label| !label.is_empty())
                    .unwrap_or(DEFAULT_DESCRIPTION_LABEL)
                    .to_owned(),
            },
        }
    }
}

/// The options of the host package manager the plugin depends on.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct HostConfig {
    /// Root of the system the transaction is applied to.
    pub installroot: PathBuf,
    pub protected_packages: Vec<String>,
    pub installonly_packages: Vec<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            installroot: PathBuf::from(DEFAULT_INSTALLROOT),
            protected_packages: expand_globs(to_owned_list(DEFAULT_PROTECTED_PACKAGES)),
            installonly_packages: to_owned_list(DEFAULT_INSTALLONLY_PACKAGES),
        }
    }
}

impl HostConfig {
    /// Read the host's `[main]` section.
    pub fn from_parser(parser: &ConfigParser) -> Self {
        let s = HOST_SECTION;
        let mut host = HostConfig::default();
        if let Some(root) = parser.get_value(s, "installroot").filter(|r| !r.is_empty()) {
            host.installroot = PathBuf::from(root);
        }
        if let Some(list) = parser.get_list(s, "protected_packages") {
            host.protected_packages = expand_globs(list);
        }
        if let Some(list) = parser.get_list(s, "installonlypkgs") {
            host.installonly_packages = list;
        }
        host
    }

    /// Read the host's config file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let parser = ConfigParser::read(path)?;
        Ok(HostConfig::from_parser(&parser))
    }
}

fn to_owned_list(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_owned()).collect()
}

/// Replace `glob:<pattern>` entries with the package names listed in the files the pattern
/// matches, one or more per line, `#` starting a comment.
fn expand_globs(list: Vec<String>) -> Vec<String> {
    let mut expanded = Vec::with_capacity(list.len());
    for item in list {
        if !item.starts_with(GLOB_PREFIX) {
            expanded.push(item);
            continue;
        }
        let pattern = &item[GLOB_PREFIX.len()..];
        let paths = match glob::glob(pattern) {
            Ok(paths) => paths,
            Err(e) => {
                warn!("invalid pattern \"{}\": {}", pattern, e);
                continue;
            }
        };
        for entry in paths {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("cannot read {}: {}", e.path().display(), e.error());
                    continue;
                }
            };
            match fs::read_to_string(&path) {
                Ok(contents) => {
                    debug!("reading package names from {}", path.display());
                    for line in contents.lines() {
                        let line = line.split('#').next().unwrap_or("");
                        expanded.extend(split_list(line));
                    }
                }
                Err(e) => warn!("cannot read {}: {}", path.display(), e),
            }
        }
    }
    expanded
}
