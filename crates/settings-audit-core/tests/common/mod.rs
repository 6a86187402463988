// crates/settings-audit-core/tests/common/mod.rs
// ============================================================================
// Module: Test Fixtures
// Description: In-memory hub, certificate source, and signing fixture.
// ============================================================================
//! ## Overview
//! Shared fixtures for the core integration tests. The in-memory hub keeps
//! collections in a map and records every status patch so tests can assert
//! on writes.

#![allow(
    dead_code,
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only fixtures; not every test uses every helper."
)]

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use p384::ecdsa::Signature as EcdsaSignature;
use p384::ecdsa::SigningKey;
use p384::ecdsa::signature::Signer;
use p384::pkcs8::DecodePrivateKey;
use p384::pkcs8::EncodePublicKey;
use p384::pkcs8::LineEnding;
use rcgen::CertificateParams;
use rcgen::DistinguishedName;
use rcgen::DnType;
use rcgen::KeyPair;
use serde_json::Value;
use serde_json::json;
use settings_audit_core::CertificateSource;
use settings_audit_core::CollectionMetadata;
use settings_audit_core::CollectionStatus;
use settings_audit_core::FetchError;
use settings_audit_core::HubClient;
use settings_audit_core::Record;
use settings_audit_core::RecordQuery;
use settings_audit_core::ServerInfo;
use settings_audit_core::signed_payload;
use time::Duration;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Signing Fixture
// ============================================================================

/// Trusted common name used by default fixtures.
pub const TRUSTED_NAME: &str = "remote-settings.content-signature.mozilla.org";
/// Certificate URL used by default fixtures.
pub const X5U: &str = "https://certs.example/chain.pem";

/// Self-signed P-384 certificate plus the matching signing key.
pub struct SigningFixture {
    pub signing_key: SigningKey,
    pub certificate_pem: String,
    pub public_key_pem: String,
}

impl SigningFixture {
    pub fn new(common_name: &str, not_before: OffsetDateTime, not_after: OffsetDateTime) -> Self {
        let key_pair = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P384_SHA384).unwrap();
        let mut params = CertificateParams::new(vec![common_name.to_string()]).unwrap();
        let mut name = DistinguishedName::new();
        name.push(DnType::CommonName, common_name);
        params.distinguished_name = name;
        params.not_before = not_before;
        params.not_after = not_after;
        let certificate_pem = params.self_signed(&key_pair).unwrap().pem();
        let signing_key = SigningKey::from_pkcs8_pem(&key_pair.serialize_pem()).unwrap();
        let public_key_pem =
            signing_key.verifying_key().to_public_key_pem(LineEnding::LF).unwrap();
        Self {
            signing_key,
            certificate_pem,
            public_key_pem,
        }
    }

    /// Certificate valid from yesterday for thirty days.
    pub fn valid() -> Self {
        let now = OffsetDateTime::now_utc();
        Self::new(TRUSTED_NAME, now - Duration::days(1), now + Duration::days(30))
    }

    /// Raw `r||s` signature, base64url without padding.
    pub fn sign(&self, payload: &[u8]) -> String {
        let signature: EcdsaSignature = self.signing_key.sign(payload);
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    }

    /// Signature object over `records` at `timestamp`.
    pub fn signature_for(&self, records: &[Record], timestamp: u64) -> Value {
        let payload = signed_payload(records, timestamp).unwrap();
        json!({
            "public_key": self.public_key_pem,
            "signature": self.sign(&payload),
            "x5u": X5U,
        })
    }
}

// ============================================================================
// SECTION: Certificate Source
// ============================================================================

/// Serves fixed PEM documents and counts downloads.
#[derive(Default)]
pub struct StaticCertificates {
    documents: BTreeMap<String, Vec<u8>>,
    downloads: AtomicUsize,
}

impl StaticCertificates {
    pub fn with(url: &str, pem: &str) -> Self {
        let mut documents = BTreeMap::new();
        documents.insert(url.to_string(), pem.as_bytes().to_vec());
        Self {
            documents,
            downloads: AtomicUsize::new(0),
        }
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

impl CertificateSource for StaticCertificates {
    fn fetch_certificate(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.documents.get(url).cloned().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

// ============================================================================
// SECTION: In-Memory Hub
// ============================================================================

/// One stored collection.
#[derive(Clone)]
pub struct StoredCollection {
    pub metadata: CollectionMetadata,
    /// Live records.
    pub records: Vec<Record>,
    /// Tombstones, returned only for `_since` queries.
    pub tombstones: Vec<Record>,
    pub timestamp: u64,
}

/// Hub backed by a map of collections.
#[derive(Default)]
pub struct InMemoryHub {
    server_info: ServerInfo,
    collections: Mutex<BTreeMap<(String, String), StoredCollection>>,
    patches: Mutex<Vec<(String, String, CollectionStatus)>>,
    queries: Mutex<Vec<(String, String, RecordQuery)>>,
}

pub fn record(value: Value) -> Record {
    Record::try_from(value).unwrap()
}

pub fn records(value: Value) -> Vec<Record> {
    match value {
        Value::Array(items) => items.into_iter().map(record).collect(),
        other => panic!("expected an array, got {other}"),
    }
}

impl InMemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signer(mut self, resources: Value) -> Self {
        self.server_info = serde_json::from_value(json!({
            "project_name": "Remote Settings",
            "capabilities": {"signer": {"resources": resources}},
        }))
        .unwrap();
        self
    }

    /// Stores a collection with the given metadata attributes and records.
    pub fn with_collection(
        self,
        bucket: &str,
        collection: &str,
        metadata: Value,
        live: Vec<Record>,
        timestamp: u64,
    ) -> Self {
        let metadata: CollectionMetadata = serde_json::from_value(metadata).unwrap();
        self.lock_collections().insert(
            (bucket.to_string(), collection.to_string()),
            StoredCollection {
                metadata,
                records: live,
                tombstones: Vec::new(),
                timestamp,
            },
        );
        self
    }

    /// Stores the registry listing `(bucket, collection, last_modified)`.
    pub fn with_registry(self, entries: &[(&str, &str, u64)]) -> Self {
        let listed = entries
            .iter()
            .enumerate()
            .map(|(index, (bucket, collection, last_modified))| {
                record(json!({
                    "id": format!("entry-{index}"),
                    "bucket": bucket,
                    "collection": collection,
                    "last_modified": last_modified,
                }))
            })
            .collect();
        self.with_collection("monitor", "changes", json!({"last_modified": 1}), listed, 1)
    }

    pub fn with_tombstones(self, bucket: &str, collection: &str, tombstones: Vec<Record>) -> Self {
        if let Some(stored) =
            self.lock_collections().get_mut(&(bucket.to_string(), collection.to_string()))
        {
            stored.tombstones = tombstones;
        }
        self
    }

    pub fn patches(&self) -> Vec<(String, String, CollectionStatus)> {
        self.patches.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn queries(&self) -> Vec<(String, String, RecordQuery)> {
        self.queries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn lock_collections(
        &self,
    ) -> std::sync::MutexGuard<'_, BTreeMap<(String, String), StoredCollection>> {
        self.collections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stored(&self, bucket: &str, collection: &str) -> Result<StoredCollection, FetchError> {
        self.lock_collections()
            .get(&(bucket.to_string(), collection.to_string()))
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: self.collection_endpoint(bucket, collection),
                status: 404,
            })
    }
}

impl HubClient for InMemoryHub {
    fn collection_endpoint(&self, bucket: &str, collection: &str) -> String {
        format!("memory://hub/buckets/{bucket}/collections/{collection}")
    }

    fn server_info(&self) -> Result<ServerInfo, FetchError> {
        Ok(self.server_info.clone())
    }

    fn get_collection_metadata(
        &self,
        bucket: &str,
        collection: &str,
        _expected: Option<u64>,
    ) -> Result<CollectionMetadata, FetchError> {
        Ok(self.stored(bucket, collection)?.metadata)
    }

    fn get_records(
        &self,
        bucket: &str,
        collection: &str,
        query: &RecordQuery,
    ) -> Result<Vec<Record>, FetchError> {
        self.queries.lock().unwrap_or_else(PoisonError::into_inner).push((
            bucket.to_string(),
            collection.to_string(),
            query.clone(),
        ));
        let stored = self.stored(bucket, collection)?;
        let mut result = stored.records;
        if query.since.is_some() {
            result.extend(stored.tombstones);
        }
        Ok(result)
    }

    fn get_record_set_timestamp(
        &self,
        bucket: &str,
        collection: &str,
        _expected: Option<u64>,
    ) -> Result<u64, FetchError> {
        Ok(self.stored(bucket, collection)?.timestamp)
    }

    fn patch_collection_status(
        &self,
        bucket: &str,
        collection: &str,
        status: CollectionStatus,
    ) -> Result<CollectionMetadata, FetchError> {
        let mut collections = self.lock_collections();
        let stored = collections.get_mut(&(bucket.to_string(), collection.to_string())).ok_or_else(
            || FetchError::Status {
                url: format!("memory://hub/buckets/{bucket}/collections/{collection}"),
                status: 403,
            },
        )?;
        stored.metadata.status = Some(status);
        stored.metadata.last_modified += 1;
        self.patches.lock().unwrap_or_else(PoisonError::into_inner).push((
            bucket.to_string(),
            collection.to_string(),
            status,
        ));
        Ok(stored.metadata.clone())
    }
}
