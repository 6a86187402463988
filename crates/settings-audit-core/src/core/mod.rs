// crates/settings-audit-core/src/core/mod.rs
// ============================================================================
// Module: Settings Audit Core Types
// Description: Data model, canonical serialization, and shared settings.
// Purpose: Group the transport-independent building blocks of the auditors.
// Dependencies: serde, serde_json, serde_jcs, time
// ============================================================================

//! ## Overview
//! Core types model hub records and collection metadata, reproduce the exact
//! byte sequence covered by a content signature, and carry the settings shared
//! by every audit run.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod canonical;
pub mod dates;
pub mod model;
pub mod settings;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use canonical::CanonicalError;
pub use canonical::SIGNATURE_PREFIX;
pub use canonical::canonical_json;
pub use canonical::signed_payload;
pub use dates::timestamp_to_date;
pub use model::ChangeEntry;
pub use model::CollectionMetadata;
pub use model::CollectionRef;
pub use model::CollectionStatus;
pub use model::Record;
pub use model::RecordError;
pub use model::ResolvedResource;
pub use model::ResourceLocation;
pub use model::ServerInfo;
pub use model::Signature;
pub use model::SignedResource;
pub use settings::AuditSettings;
