use std::collections::BTreeMap;

/// The cleanup algorithm every snapshot we create is tagged with. Snapper keeps the last N
/// snapshots under this algorithm, but never removes ones tagged important before the others.
pub const CLEANUP_ALGORITHM: &str = "number";

/// Userdata key marking a snapshot as important.
pub const IMPORTANT_KEY: &str = "important";
/// Value of `IMPORTANT_KEY` for important snapshots.
pub const IMPORTANT_VALUE: &str = "yes";

/// Snapshot creation descriptor: everything the backend needs to know about a snapshot apart
/// from its type and pairing.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Scd {
    pub description: String,
    pub cleanup: String,
    pub userdata: BTreeMap<String, String>,
}

impl Scd {
    pub fn new(description: impl Into<String>) -> Self {
        Scd {
            description: description.into(),
            cleanup: CLEANUP_ALGORITHM.to_owned(),
            userdata: BTreeMap::new(),
        }
    }

    /// Mark the snapshot as important.
    pub fn mark_important(&mut self) {
        self.userdata
            .insert(IMPORTANT_KEY.to_owned(), IMPORTANT_VALUE.to_owned());
    }

    pub fn is_important(&self) -> bool {
        self.userdata.get(IMPORTANT_KEY).map(String::as_str) == Some(IMPORTANT_VALUE)
    }
}
