//! Revision identifiers and immutable revision snapshots

use crate::document::{DocumentId, Limits};
use crate::error::{Error, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Property map of a revision
pub type Properties = BTreeMap<String, Value>;

/// Keys starting with this prefix are reserved for revision metadata
pub const RESERVED_PREFIX: char = '_';

pub const ID_KEY: &str = "_id";
pub const REV_KEY: &str = "_rev";
pub const DELETED_KEY: &str = "_deleted";

/// Number of digest bytes kept in a revision ID
const DIGEST_LEN: usize = 16;

/// Revision identifier, rendered as `"{generation}-{digest}"`.
///
/// Ordering is by generation first, then by digest compared as a string.
/// The winning revision of a tree is the greatest leaf under this ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RevisionId {
    generation: u64,
    digest: String,
}

impl RevisionId {
    /// Derive the ID of a revision from its parent and canonical content
    pub fn derive(parent: Option<&RevisionId>, deleted: bool, content: &[u8]) -> Self {
        let generation = parent.map_or(1, |p| p.generation + 1);

        let mut hasher = Sha256::new();
        if let Some(parent) = parent {
            hasher.update(parent.to_string().as_bytes());
        }
        hasher.update([0u8, deleted as u8]);
        hasher.update(content);
        let hash = hasher.finalize();

        Self {
            generation,
            digest: hex::encode(&hash[..DIGEST_LEN]),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl std::fmt::Display for RevisionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.generation, self.digest)
    }
}

impl FromStr for RevisionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (generation, digest) = s
            .split_once('-')
            .ok_or_else(|| Error::Validation(format!("Malformed revision ID: {}", s)))?;

        // canonical decimal only, so parsing and display round-trip
        if generation.is_empty()
            || generation.starts_with('0')
            || !generation.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(Error::Validation(format!("Invalid revision generation: {}", s)));
        }
        let generation: u64 = generation
            .parse()
            .map_err(|_| Error::Validation(format!("Invalid revision generation: {}", s)))?;

        if digest.is_empty()
            || !digest.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(Error::Validation(format!("Invalid revision digest: {}", s)));
        }

        Ok(Self {
            generation,
            digest: digest.to_string(),
        })
    }
}

impl TryFrom<String> for RevisionId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<RevisionId> for String {
    fn from(id: RevisionId) -> Self {
        id.to_string()
    }
}

/// One immutable version of a document's content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    id: RevisionId,
    parent: Option<RevisionId>,
    document_id: DocumentId,
    properties: Properties,
    deleted: bool,
    /// Insertion order within the owning document, starting at 1
    sequence: u64,
}

impl Revision {
    pub(crate) fn new(
        id: RevisionId,
        parent: Option<RevisionId>,
        document_id: DocumentId,
        properties: Properties,
        deleted: bool,
        sequence: u64,
    ) -> Self {
        Self {
            id,
            parent,
            document_id,
            properties,
            deleted,
            sequence,
        }
    }

    pub fn id(&self) -> &RevisionId {
        &self.id
    }

    pub fn parent_id(&self) -> Option<&RevisionId> {
        self.parent.as_ref()
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    pub fn generation(&self) -> u64 {
        self.id.generation
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Properties exactly as they were written
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Properties plus `_id`, `_rev` and, for tombstones, `_deleted`
    pub fn properties_with_metadata(&self) -> Properties {
        let mut props = self.properties.clone();
        props.insert(ID_KEY.to_string(), Value::from(self.document_id.as_str()));
        props.insert(REV_KEY.to_string(), Value::from(self.id.to_string()));
        if self.deleted {
            props.insert(DELETED_KEY.to_string(), Value::Bool(true));
        }
        props
    }

    /// Recompute the ID from this revision's content and compare
    pub fn verify(&self) -> Result<()> {
        let content = canonical_bytes(&self.properties)?;
        let expected = RevisionId::derive(self.parent.as_ref(), self.deleted, &content);
        if expected != self.id {
            return Err(Error::Validation(format!(
                "Revision {} does not match its content (expected {})",
                self.id, expected
            )));
        }
        Ok(())
    }
}

/// Canonical serialized form of a property map
pub(crate) fn canonical_bytes(properties: &Properties) -> Result<Vec<u8>> {
    serde_json::to_vec(properties).map_err(|e| Error::Validation(e.to_string()))
}

/// Check a property map against reserved keys and limits, returning its
/// canonical bytes for digesting
pub(crate) fn validate_properties(properties: &Properties, limits: &Limits) -> Result<Vec<u8>> {
    for (key, value) in properties {
        if key.starts_with(RESERVED_PREFIX) {
            return Err(Error::Validation(format!("Reserved property key: {}", key)));
        }

        if !value.is_finite() {
            return Err(Error::Validation(format!(
                "Property {} contains a non-finite number",
                key
            )));
        }

        // the property map itself is one level
        let depth = value.depth() + 1;
        if depth > limits.max_nesting_depth {
            return Err(Error::Validation(format!(
                "Nesting depth exceeds limit: {} > {}",
                depth, limits.max_nesting_depth
            )));
        }
    }

    let bytes = canonical_bytes(properties)?;
    if bytes.len() > limits.max_document_size {
        return Err(Error::Validation(format!(
            "Document size exceeds limit: {} > {}",
            bytes.len(),
            limits.max_document_size
        )));
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, Value)]) -> Properties {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_parse_and_display() {
        let id: RevisionId = "3-0a1b".parse().unwrap();
        assert_eq!(id.generation(), 3);
        assert_eq!(id.digest(), "0a1b");
        assert_eq!(id.to_string(), "3-0a1b");
    }

    #[test]
    fn test_parse_invalid() {
        assert!("".parse::<RevisionId>().is_err());
        assert!("abc".parse::<RevisionId>().is_err());
        assert!("0-ab".parse::<RevisionId>().is_err());
        assert!("x-ab".parse::<RevisionId>().is_err());
        assert!("1-".parse::<RevisionId>().is_err());
        assert!("1-XYZ".parse::<RevisionId>().is_err());
    }

    #[test]
    fn test_parse_requires_canonical_generation() {
        for text in ["+2-ab", "02-ab", " 2-ab", "2 -ab", "-2-ab", "99999999999999999999-ab"] {
            assert!(text.parse::<RevisionId>().is_err(), "{} should not parse", text);
        }

        let id: RevisionId = "10-ab".parse().unwrap();
        assert_eq!(id.to_string().parse::<RevisionId>().unwrap(), id);
    }

    #[test]
    fn test_ordering() {
        let a: RevisionId = "2-ff".parse().unwrap();
        let b: RevisionId = "10-00".parse().unwrap();
        let c: RevisionId = "10-01".parse().unwrap();

        assert!(a < b, "higher generation wins over digest");
        assert!(b < c, "digest breaks generation ties");
    }

    #[test]
    fn test_derive_is_deterministic() {
        let content = canonical_bytes(&props(&[("a", Value::from(1i64))])).unwrap();
        let one = RevisionId::derive(None, false, &content);
        let two = RevisionId::derive(None, false, &content);

        assert_eq!(one, two);
        assert_eq!(one.generation(), 1);
        assert_eq!(one.digest().len(), DIGEST_LEN * 2);
    }

    #[test]
    fn test_derive_depends_on_inputs() {
        let content = canonical_bytes(&props(&[("a", Value::from(1i64))])).unwrap();
        let root = RevisionId::derive(None, false, &content);
        let child = RevisionId::derive(Some(&root), false, &content);
        let tombstone = RevisionId::derive(Some(&root), true, &content);

        assert_eq!(child.generation(), 2);
        assert_ne!(root.digest(), child.digest());
        assert_ne!(child, tombstone);
    }

    #[test]
    fn test_serde_as_string() {
        let id: RevisionId = "4-beef".parse().unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"4-beef\"");

        let back: RevisionId = serde_json::from_str("\"4-beef\"").unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<RevisionId>("\"nope\"").is_err());
    }

    #[test]
    fn test_reserved_keys_rejected() {
        let limits = Limits::default();
        let reserved = props(&[("_rev", Value::from("1-a"))]);
        let err = validate_properties(&reserved, &limits).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_limits_enforced() {
        let limits = Limits {
            max_document_size: 16,
            max_nesting_depth: 2,
        };

        let nested = Value::from(serde_json::json!({"a": {"b": 1}}));
        assert!(validate_properties(&props(&[("x", nested)]), &limits).is_err());

        let big = Value::from("x".repeat(64));
        assert!(validate_properties(&props(&[("x", big)]), &limits).is_err());

        let nan = props(&[("x", Value::from(f64::NAN))]);
        assert!(validate_properties(&nan, &Limits::default()).is_err());
    }

    #[test]
    fn test_metadata_properties() {
        let id: RevisionId = "1-ab".parse().unwrap();
        let doc = DocumentId::new("book").unwrap();
        let rev = Revision::new(id, None, doc, props(&[("a", Value::from(1i64))]), true, 1);

        let full = rev.properties_with_metadata();
        assert_eq!(full.get(ID_KEY), Some(&Value::from("book")));
        assert_eq!(full.get(REV_KEY), Some(&Value::from("1-ab")));
        assert_eq!(full.get(DELETED_KEY), Some(&Value::Bool(true)));
        assert_eq!(rev.properties().len(), 1);
    }
}
