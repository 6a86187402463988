// crates/settings-audit-core/src/core/model.rs
// ============================================================================
// Module: Hub Data Model
// Description: Records, collection metadata, signatures, and signer resources.
// Purpose: Give hub JSON documents typed, validated Rust representations.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Records are kept as raw JSON objects because signature verification must
//! reproduce the exact published content, including fields this crate knows
//! nothing about. Everything else (metadata, signatures, signer resources,
//! registry entries) is strongly typed.
//!
//! Invariants:
//! - A [`Record`] always carries a string `id`.
//! - [`SignedResource`] templates are never mutated; specializing one for a
//!   concrete collection produces a new [`ResolvedResource`] value.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde::Serializer;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Record field holding the record identifier.
pub const ID_FIELD: &str = "id";
/// Record field holding the server-assigned modification timestamp.
pub const LAST_MODIFIED_FIELD: &str = "last_modified";
/// Record field marking a tombstone.
pub const DELETED_FIELD: &str = "deleted";
/// Record field holding the schema version stamp.
pub const SCHEMA_FIELD: &str = "schema";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when hub documents do not match the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The record has no string `id` field.
    #[error("record is missing a string `id` field")]
    MissingId,
    /// The record is not a JSON object.
    #[error("record must be a json object")]
    NotAnObject,
    /// A registry entry is missing required attributes.
    #[error("invalid registry entry {id}: {message}")]
    InvalidChangeEntry {
        /// Identifier of the offending entry.
        id: String,
        /// Decoding failure detail.
        message: String,
    },
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// A hub record: an arbitrary JSON object with a mandatory string `id`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct Record {
    /// Raw record attributes, including `id`.
    fields: Map<String, Value>,
}

impl Record {
    /// Builds a record from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::MissingId`] when `id` is absent or not a string.
    pub fn new(fields: Map<String, Value>) -> Result<Self, RecordError> {
        match fields.get(ID_FIELD) {
            Some(Value::String(_)) => Ok(Self {
                fields,
            }),
            _ => Err(RecordError::MissingId),
        }
    }

    /// Returns the record identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        self.fields.get(ID_FIELD).and_then(Value::as_str).unwrap_or_default()
    }

    /// Returns the record modification timestamp, when present.
    #[must_use]
    pub fn last_modified(&self) -> Option<u64> {
        self.fields.get(LAST_MODIFIED_FIELD).and_then(Value::as_u64)
    }

    /// Returns true when the record is a tombstone (`deleted: true`).
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        matches!(self.fields.get(DELETED_FIELD), Some(Value::Bool(true)))
    }

    /// Returns a single attribute.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns all record attributes.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Consumes the record and returns its attributes.
    #[must_use]
    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

impl TryFrom<Map<String, Value>> for Record {
    type Error = RecordError;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        Self::new(fields)
    }
}

impl TryFrom<Value> for Record {
    type Error = RecordError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Self::new(fields),
            _ => Err(RecordError::NotAnObject),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_json::to_string(&self.fields).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

// ============================================================================
// SECTION: Collection Metadata
// ============================================================================

/// Review workflow status of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollectionStatus {
    /// Edits are in progress; source may diverge from preview/destination.
    WorkInProgress,
    /// A review was requested; preview mirrors source.
    ToReview,
    /// Signing was requested.
    ToSign,
    /// A signature refresh was requested.
    ToResign,
    /// A rollback of pending edits was requested.
    ToRollback,
    /// Source, preview, and destination are published and signed.
    Signed,
    /// Any status value this crate does not recognize.
    #[serde(other)]
    Unknown,
}

impl CollectionStatus {
    /// Returns the wire representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WorkInProgress => "work-in-progress",
            Self::ToReview => "to-review",
            Self::ToSign => "to-sign",
            Self::ToResign => "to-resign",
            Self::ToRollback => "to-rollback",
            Self::Signed => "signed",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes of a (bucket, collection) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMetadata {
    /// Collection-level timestamp, bumped on any record or metadata change.
    pub last_modified: u64,
    /// Review workflow status, absent on collections never reviewed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CollectionStatus>,
    /// Raw signature object, absent until the first signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Value>,
    /// Remaining attributes, preserved as published.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CollectionMetadata {
    /// Decodes the signature object, if any.
    ///
    /// Returns `None` when the collection has never been signed.
    #[must_use]
    pub fn parsed_signature(&self) -> Option<Result<Signature, serde_json::Error>> {
        self.signature.as_ref().map(|value| Signature::deserialize(value))
    }
}

/// Content signature attached to a collection at sign time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Verification key, PEM encoded (headers optional).
    pub public_key: String,
    /// Raw `r||s` ECDSA signature, base64url encoded.
    pub signature: String,
    /// URL of the certificate chain used to sign.
    pub x5u: String,
}

// ============================================================================
// SECTION: Registry Entries
// ============================================================================

/// Entry of the registry collection enumerating published collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    /// Published bucket identifier.
    pub bucket: String,
    /// Published collection identifier.
    pub collection: String,
    /// Timestamp of the collection when the entry was last refreshed.
    pub last_modified: u64,
}

impl ChangeEntry {
    /// Decodes a registry entry from its record form.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::InvalidChangeEntry`] when required fields are missing.
    pub fn from_record(record: &Record) -> Result<Self, RecordError> {
        Self::deserialize(Value::Object(record.fields().clone())).map_err(|err| {
            RecordError::InvalidChangeEntry {
                id: record.id().to_string(),
                message: err.to_string(),
            }
        })
    }

    /// Returns the `bucket/collection` identifier of the entry.
    #[must_use]
    pub fn identifier(&self) -> String {
        format!("{}/{}", self.bucket, self.collection)
    }
}

// ============================================================================
// SECTION: Signer Resources
// ============================================================================

/// One stage of a signer resource; a null collection applies bucket-wide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLocation {
    /// Bucket identifier.
    pub bucket: String,
    /// Collection identifier, or `None` for every collection in the bucket.
    #[serde(default)]
    pub collection: Option<String>,
}

impl ResourceLocation {
    /// Resolves the location for a concrete collection id.
    fn resolve(&self, collection: &str) -> CollectionRef {
        CollectionRef {
            bucket: self.bucket.clone(),
            collection: self.collection.clone().unwrap_or_else(|| collection.to_string()),
        }
    }
}

/// Signer capability entry: source -> optional preview -> destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedResource {
    /// Where edits land.
    pub source: ResourceLocation,
    /// Review staging area, when the review workflow is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<ResourceLocation>,
    /// Where signed content is published.
    pub destination: ResourceLocation,
}

impl SignedResource {
    /// Builds the concrete triple for `collection` without touching `self`.
    #[must_use]
    pub fn specialize(&self, collection: &str) -> ResolvedResource {
        ResolvedResource {
            source: self.source.resolve(collection),
            preview: self.preview.as_ref().map(|preview| preview.resolve(collection)),
            destination: self.destination.resolve(collection),
        }
    }

    /// Returns true when the resource publishes to `bucket/collection`.
    #[must_use]
    pub fn matches_destination(&self, bucket: &str, collection: &str) -> bool {
        self.destination.bucket == bucket
            && self.destination.collection.as_deref().is_none_or(|cid| cid == collection)
    }
}

/// Concrete (bucket, collection) pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CollectionRef {
    /// Bucket identifier.
    pub bucket: String,
    /// Collection identifier.
    pub collection: String,
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.collection)
    }
}

/// Signer resource specialized for one monitored collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedResource {
    /// Source collection.
    pub source: CollectionRef,
    /// Preview collection, when review is enabled.
    pub preview: Option<CollectionRef>,
    /// Destination collection.
    pub destination: CollectionRef,
}

impl ResolvedResource {
    /// Returns the identifier used in reports (the destination).
    #[must_use]
    pub fn identifier(&self) -> String {
        self.destination.to_string()
    }
}

// ============================================================================
// SECTION: Server Info
// ============================================================================

/// Hub self-description document (`GET /`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Capabilities advertised by the hub plugins.
    #[serde(default)]
    pub capabilities: Map<String, Value>,
    /// Remaining attributes.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServerInfo {
    /// Decodes the signer resources, if the signer capability is advertised.
    ///
    /// Returns `None` when the hub has no `signer.resources` capability.
    #[must_use]
    pub fn signer_resources(&self) -> Option<Result<Vec<SignedResource>, serde_json::Error>> {
        let resources = self.capabilities.get("signer")?.get("resources")?;
        Some(Vec::<SignedResource>::deserialize(resources))
    }
}
