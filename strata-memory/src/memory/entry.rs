//! Memory Entries - Tiers, Types and the Entry Record
//!
//! TigerStyle: Ids generated once, timestamps at millisecond precision,
//! validation explicit.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::{ENTRY_CONTENT_BYTES_MAX, ENTRY_HASH_HEX_CHARS, ENTRY_ID_SUFFIX_CHARS};

/// Free-form entry metadata.
pub type Metadata = BTreeMap<String, serde_json::Value>;

// =============================================================================
// Tier
// =============================================================================

/// Memory scope with its own durability and lifetime rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Volatile session key/value state, never persisted
    Scratchpad,
    /// Recent interaction history, bounded by compaction
    Episodic,
    /// Long-term knowledge and compaction summaries
    Semantic,
}

impl Tier {
    /// Tiers that hold `MemoryEntry` values.
    pub const DURABLE: [Tier; 2] = [Tier::Episodic, Tier::Semantic];

    /// Name as stored in the `tier` column.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scratchpad => "scratchpad",
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
        }
    }

    /// Whether entries in this tier are persisted.
    #[must_use]
    pub fn is_durable(&self) -> bool {
        !matches!(self, Self::Scratchpad)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scratchpad" => Ok(Self::Scratchpad),
            "episodic" => Ok(Self::Episodic),
            "semantic" => Ok(Self::Semantic),
            other => Err(format!("unknown tier: {other}")),
        }
    }
}

// =============================================================================
// EntryType
// =============================================================================

/// Kind of content an entry holds.
///
/// Unknown names round-trip through `Custom` so rows written by newer code
/// still load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntryType {
    /// Conversation turn or agent interaction
    Interaction,
    /// Durable fact
    Knowledge,
    /// Compaction-produced summary
    Summary,
    /// Observation about the environment
    Observation,
    /// Any other tag
    Custom(String),
}

impl EntryType {
    /// Lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Interaction => "interaction",
            Self::Knowledge => "knowledge",
            Self::Summary => "summary",
            Self::Observation => "observation",
            Self::Custom(name) => name,
        }
    }
}

impl From<&str> for EntryType {
    fn from(s: &str) -> Self {
        match s {
            "interaction" => Self::Interaction,
            "knowledge" => Self::Knowledge,
            "summary" => Self::Summary,
            "observation" => Self::Observation,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for EntryType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<EntryType> for String {
    fn from(t: EntryType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// MemoryEntry
// =============================================================================

/// A single episodic or semantic memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryEntry {
    /// Globally unique id, fixed at creation
    pub id: String,
    /// Text content
    pub content: String,
    /// Content kind
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// Creation time (millisecond precision)
    pub timestamp: DateTime<Utc>,
    /// Optional key/value metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// Optional embedding, attached after creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl MemoryEntry {
    /// Create an entry stamped with the current system time.
    #[must_use]
    pub fn new(content: impl Into<String>, entry_type: EntryType) -> Self {
        Self::at(content, entry_type, Utc::now())
    }

    /// Create an entry with an explicit timestamp (truncated to milliseconds).
    #[must_use]
    pub fn at(content: impl Into<String>, entry_type: EntryType, timestamp: DateTime<Utc>) -> Self {
        let timestamp = truncate_to_ms(timestamp);
        Self {
            id: generate_id(timestamp),
            content: content.into(),
            entry_type,
            timestamp,
            metadata: None,
            embedding: None,
        }
    }

    /// Replace the generated id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Attach metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Attach a single metadata value.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata
            .get_or_insert_with(Metadata::new)
            .insert(key.into(), value.into());
        self
    }

    /// Attach an embedding.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Check the entry can be stored.
    ///
    /// # Errors
    /// Returns a message when the id or content is empty, or the content is
    /// larger than `ENTRY_CONTENT_BYTES_MAX`.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("entry id is empty".to_string());
        }
        if self.content.is_empty() {
            return Err(format!("entry {} has empty content", self.id));
        }
        if self.content.len() > ENTRY_CONTENT_BYTES_MAX {
            return Err(format!(
                "entry {} content is {} bytes, max {ENTRY_CONTENT_BYTES_MAX}",
                self.id,
                self.content.len()
            ));
        }
        Ok(())
    }

    /// Short content digest used for change detection.
    #[must_use]
    pub fn content_hash(&self) -> String {
        content_hash(&self.content)
    }

    /// Non-empty embedding, if any.
    #[must_use]
    pub fn usable_embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref().filter(|e| !e.is_empty())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Generate an entry id: `mem_<hex millis>_<random suffix>`.
///
/// The prefix sorts by creation time; the suffix comes from a v4 uuid.
#[must_use]
pub fn generate_id(timestamp: DateTime<Utc>) -> String {
    let millis = u64::try_from(timestamp.timestamp_millis()).unwrap_or(0);
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let id = format!("mem_{millis:x}_{}", &suffix[..ENTRY_ID_SUFFIX_CHARS]);

    debug_assert!(id.starts_with("mem_"));
    id
}

/// SHA-256 of `content`, first `ENTRY_HASH_HEX_CHARS` hex characters.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(ENTRY_HASH_HEX_CHARS);
    hash
}

/// Drop sub-millisecond precision so timestamps survive storage unchanged.
#[must_use]
pub fn truncate_to_ms(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(timestamp.timestamp_millis()).unwrap_or(timestamp)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[test]
    fn test_id_format() {
        let entry = MemoryEntry::at("hello", EntryType::Interaction, ts(0xabc));
        let parts: Vec<&str> = entry.id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "mem");
        assert_eq!(parts[1], "abc");
        assert_eq!(parts[2].len(), ENTRY_ID_SUFFIX_CHARS);
    }

    #[test]
    fn test_ids_unique() {
        let ids: std::collections::HashSet<String> =
            (0..1000).map(|_| generate_id(ts(1))).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_timestamp_truncated() {
        let precise = DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        let entry = MemoryEntry::at("x", EntryType::Knowledge, precise);
        assert_eq!(entry.timestamp.timestamp_subsec_nanos(), 123_000_000);
    }

    #[test]
    fn test_entry_type_strings() {
        assert_eq!(EntryType::from("interaction"), EntryType::Interaction);
        assert_eq!(EntryType::from("summary").as_str(), "summary");
        assert_eq!(
            EntryType::from("decision"),
            EntryType::Custom("decision".into())
        );
        assert_eq!(String::from(EntryType::Custom("x".into())), "x");
    }

    #[test]
    fn test_tier_parse() {
        assert_eq!("episodic".parse::<Tier>(), Ok(Tier::Episodic));
        assert!("archive".parse::<Tier>().is_err());
        assert!(!Tier::Scratchpad.is_durable());
    }

    #[test]
    fn test_serde_shape() {
        let entry = MemoryEntry::at("note", EntryType::Observation, ts(1000))
            .with_id("mem_1")
            .with_meta("source", "test");
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["type"], "observation");
        assert_eq!(json["metadata"]["source"], "test");
        assert!(json.get("embedding").is_none());

        let back: MemoryEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_validate() {
        let ok = MemoryEntry::new("content", EntryType::Knowledge);
        assert!(ok.validate().is_ok());

        let empty = MemoryEntry::new("", EntryType::Knowledge);
        assert!(empty.validate().unwrap_err().contains("empty content"));
    }

    #[test]
    fn test_content_hash() {
        let hash = content_hash("hello");
        assert_eq!(hash.len(), ENTRY_HASH_HEX_CHARS);
        // sha256("hello") = 2cf24dba5fb0a30e...
        assert_eq!(hash, "2cf24dba5fb0a30e");
        assert_eq!(hash, MemoryEntry::new("hello", EntryType::Summary).content_hash());
    }

    #[test]
    fn test_usable_embedding() {
        let entry = MemoryEntry::new("x", EntryType::Knowledge).with_embedding(vec![]);
        assert!(entry.usable_embedding().is_none());
        let entry = entry.with_embedding(vec![1.0]);
        assert_eq!(entry.usable_embedding(), Some(&[1.0][..]));
    }
}
