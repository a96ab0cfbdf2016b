//! Key layout: how a flat sorted key space encodes a tree.
//!
//! Two separators split a key into segments:
//!
//! - the **leaf** separator (default `.`) precedes a field directly under a
//!   prefix: `app.mail.sender`
//! - the **collection** separator (default `/`) precedes a named entry of a
//!   collection: `app.mail/inbox.size`
//!
//! The collection separator's code point is exactly one above the leaf
//! separator's. Everything stored under entry `name` of a collection at `p`
//! therefore falls in the half-open range `[p + name + leaf, p + name + coll)`,
//! and nothing belonging to an entry that merely shares a prefix with `name`
//! (`foo` vs `foobar`) does, because no name character sorts between the two
//! separators.
//!
//! Entry names must match `[A-Za-z][A-Za-z0-9_]*`.

use crate::error::{RegistryError, Result};

/// Returns `true` for characters allowed after the first one in entry names.
fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Validate a collection entry name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use regis_registry::keys::validate_entry_name;
///
/// assert!(validate_entry_name("inbox").is_ok());
/// assert!(validate_entry_name("inbox_2").is_ok());
/// assert!(validate_entry_name("2inbox").is_err());
/// assert!(validate_entry_name("in.box").is_err());
/// ```
pub fn validate_entry_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(RegistryError::InvalidKey {
            key: name.to_string(),
            reason: "entry name must not be empty".into(),
        });
    };
    if !first.is_ascii_alphabetic() {
        return Err(RegistryError::InvalidKey {
            key: name.to_string(),
            reason: "entry name must start with a letter".into(),
        });
    }
    if let Some(bad) = chars.find(|c| !is_name_char(*c)) {
        return Err(RegistryError::InvalidKey {
            key: name.to_string(),
            reason: format!("contains forbidden character: {bad:?}"),
        });
    }
    Ok(())
}

/// The pair of separators in use, with the adjacency invariant checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyLayout {
    leaf: char,
    collection: char,
    /// The character right after `collection`; upper bound of collection scans.
    after_collection: char,
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self {
            leaf: '.',
            collection: '/',
            after_collection: '0',
        }
    }
}

impl KeyLayout {
    /// Build a layout, enforcing that `collection` is exactly one code point
    /// above `leaf` and that neither can appear in an entry name.
    pub fn new(leaf: char, collection: char) -> Result<Self> {
        if collection as u32 != leaf as u32 + 1 {
            return Err(RegistryError::InvalidConfig(format!(
                "collection separator {collection:?} must directly follow leaf separator {leaf:?}"
            )));
        }
        for sep in [leaf, collection] {
            if is_name_char(sep) {
                return Err(RegistryError::InvalidConfig(format!(
                    "separator {sep:?} is a legal entry-name character"
                )));
            }
        }
        let after_collection = char::from_u32(collection as u32 + 1).ok_or_else(|| {
            RegistryError::InvalidConfig(format!(
                "collection separator {collection:?} has no successor character"
            ))
        })?;
        Ok(Self {
            leaf,
            collection,
            after_collection,
        })
    }

    pub fn leaf(&self) -> char {
        self.leaf
    }

    pub fn collection(&self) -> char {
        self.collection
    }

    /// Prefix for a single-record proxy: the given prefix (or the schema
    /// identifier) terminated by the leaf separator.
    pub fn proxy_prefix(&self, identifier: &str, prefix: Option<&str>) -> String {
        let mut prefix = prefix.unwrap_or(identifier).to_string();
        if !prefix.ends_with(self.leaf) {
            prefix.push(self.leaf);
        }
        prefix
    }

    /// Prefix for a collection: the given prefix (or the schema identifier)
    /// terminated by the collection separator.
    pub fn collection_prefix(&self, identifier: &str, prefix: Option<&str>) -> String {
        let mut prefix = prefix.unwrap_or(identifier).to_string();
        if !prefix.ends_with(self.collection) {
            prefix.push(self.collection);
        }
        prefix
    }

    /// Range holding every key of entry `name` under `collection_prefix`,
    /// own fields and nested collections alike.
    pub fn entry_range(&self, collection_prefix: &str, name: &str) -> (String, String) {
        let base = format!("{collection_prefix}{name}");
        (format!("{base}{}", self.leaf), format!("{base}{}", self.collection))
    }

    /// Range holding every key of every entry under `collection_prefix`.
    pub fn collection_range(&self, collection_prefix: &str) -> (String, String) {
        let stem = collection_prefix
            .strip_suffix(self.collection)
            .unwrap_or(collection_prefix);
        (
            collection_prefix.to_string(),
            format!("{stem}{}", self.after_collection),
        )
    }

    /// The entry name a key belongs to, if the key lies under
    /// `collection_prefix` and has a separator after a non-empty name.
    pub fn entry_name<'k>(&self, collection_prefix: &str, key: &'k str) -> Option<&'k str> {
        let rest = key.strip_prefix(collection_prefix)?;
        let end = rest.find(|c: char| c == self.leaf || c == self.collection)?;
        (end > 0).then(|| &rest[..end])
    }

    /// Prefix of a collection named `child` nested under the entry whose
    /// records live at `entry_prefix`: `entry + leaf + child + collection`.
    pub fn nested_collection_prefix(&self, entry_prefix: &str, child: &str) -> String {
        let mut prefix = entry_prefix.to_string();
        if !prefix.ends_with(self.leaf) {
            prefix.push(self.leaf);
        }
        prefix.push_str(child);
        prefix.push(self.collection);
        prefix
    }
}
