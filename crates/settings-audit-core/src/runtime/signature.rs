// crates/settings-audit-core/src/runtime/signature.rs
// ============================================================================
// Module: Content Signature Verification
// Description: ECDSA P-384 verification plus certificate trust checks.
// Purpose: Decide whether a signed payload is authentic and trusted.
// Dependencies: base64, p384, time, x509-parser, tracing
// ============================================================================

//! ## Overview
//! Verification runs in a fixed order and stops at the first failure:
//! 1. decode the public key and the raw `r||s` signature,
//! 2. check the ECDSA P-384 / SHA-384 signature over the payload,
//! 3. download (or reuse) the signing certificate from `x5u`,
//! 4. require `not_before < now < not_after`,
//! 5. require the certificate common name to end with the trust suffix,
//! 6. require the certificate public key to equal the signature public key.
//!
//! Certificates are cached per run by `x5u` URL so a chain shared by many
//! collections is downloaded once.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use base64::Engine;
use base64::alphabet;
use base64::engine::DecodePaddingMode;
use base64::engine::GeneralPurpose;
use base64::engine::GeneralPurposeConfig;
use base64::engine::general_purpose::STANDARD;
use p384::ecdsa::Signature as EcdsaSignature;
use p384::ecdsa::VerifyingKey;
use p384::ecdsa::signature::Verifier;
use p384::pkcs8::DecodePublicKey;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;
use x509_parser::pem::parse_x509_pem;

use crate::core::model::Signature;
use crate::interfaces::CertificateSource;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Base64url engine accepting both padded and unpadded input.
const BASE64_URL_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Reasons a signature is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// The collection has records but was never signed.
    #[error("collection has records but no signature")]
    MissingSignature,
    /// The signature metadata could not be decoded.
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
    /// The public key is not a valid P-384 key.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    /// The signature does not match the payload.
    #[error("signature does not match the collection content")]
    BadSignature,
    /// The certificate chain could not be downloaded.
    #[error("failed to fetch certificate {url}: {message}")]
    CertificateFetch {
        /// Certificate chain URL.
        url: String,
        /// Download failure detail.
        message: String,
    },
    /// The certificate chain could not be parsed.
    #[error("invalid certificate at {url}: {message}")]
    InvalidCertificate {
        /// Certificate chain URL.
        url: String,
        /// Parse failure detail.
        message: String,
    },
    /// The certificate validity window has not started.
    #[error("certificate not yet valid (not before {not_before})")]
    CertificateNotYetValid {
        /// Start of the validity window.
        not_before: OffsetDateTime,
    },
    /// The certificate validity window has ended.
    #[error("certificate expired (not after {not_after})")]
    CertificateExpired {
        /// End of the validity window.
        not_after: OffsetDateTime,
    },
    /// The certificate common name lacks the trusted suffix.
    #[error("certificate subject \"{common_name}\" is not trusted")]
    InvalidCertificateSubject {
        /// Common name found on the certificate (empty when absent).
        common_name: String,
    },
    /// The certificate key differs from the signature key.
    #[error("signature public key does not match the certificate")]
    PublicKeyMismatch,
}

// ============================================================================
// SECTION: Certificates
// ============================================================================

/// Signing certificate attributes used by the trust checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// Start of the validity window.
    pub not_before: OffsetDateTime,
    /// End of the validity window.
    pub not_after: OffsetDateTime,
    /// First subject common name, when present.
    pub common_name: Option<String>,
    /// `SubjectPublicKeyInfo` DER bytes.
    pub public_key_der: Vec<u8>,
}

impl Certificate {
    /// Parses the leaf (first) certificate of a PEM chain.
    ///
    /// # Errors
    ///
    /// Returns a description of the failure when the PEM or DER is invalid.
    pub fn from_pem(pem: &[u8]) -> Result<Self, String> {
        let (_, pem) = parse_x509_pem(pem).map_err(|err| err.to_string())?;
        let cert = pem.parse_x509().map_err(|err| err.to_string())?;
        let validity = cert.validity();
        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .map(str::to_string);
        Ok(Self {
            not_before: validity.not_before.to_datetime(),
            not_after: validity.not_after.to_datetime(),
            common_name,
            public_key_der: cert.public_key().raw.to_vec(),
        })
    }

    /// Returns the public key as header-less base64 PEM body.
    #[must_use]
    pub fn public_key_base64(&self) -> String {
        STANDARD.encode(&self.public_key_der)
    }
}

/// Per-run certificate cache keyed by `x5u` URL.
#[derive(Debug, Default)]
pub struct CertificateCache {
    /// Parsed certificates.
    entries: Mutex<HashMap<String, Arc<Certificate>>>,
}

impl CertificateCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached certificate for `url`.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<Arc<Certificate>> {
        self.lock().get(url).cloned()
    }

    /// Caches `certificate` under `url` and returns the shared handle.
    pub fn insert(&self, url: &str, certificate: Certificate) -> Arc<Certificate> {
        let certificate = Arc::new(certificate);
        self.lock().insert(url.to_string(), Arc::clone(&certificate));
        certificate
    }

    /// Returns the number of cached certificates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Locks the cache, recovering from poisoning.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Certificate>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// Verifies content signatures against downloaded certificates.
pub struct SignatureVerifier<'a> {
    /// Certificate downloader.
    certificates: &'a dyn CertificateSource,
    /// Required common-name suffix.
    trust_suffix: String,
}

impl<'a> SignatureVerifier<'a> {
    /// Creates a verifier trusting certificates whose common name ends with
    /// `trust_suffix`.
    #[must_use]
    pub fn new(certificates: &'a dyn CertificateSource, trust_suffix: impl Into<String>) -> Self {
        Self {
            certificates,
            trust_suffix: trust_suffix.into(),
        }
    }

    /// Verifies `signature` over `payload` at the current time.
    ///
    /// # Errors
    ///
    /// Returns the first [`VerificationError`] encountered.
    pub fn verify(
        &self,
        payload: &[u8],
        signature: &Signature,
        cache: &CertificateCache,
    ) -> Result<(), VerificationError> {
        self.verify_at(payload, signature, cache, OffsetDateTime::now_utc())
    }

    /// Verifies `signature` over `payload` as of `now`.
    ///
    /// # Errors
    ///
    /// Returns the first [`VerificationError`] encountered.
    pub fn verify_at(
        &self,
        payload: &[u8],
        signature: &Signature,
        cache: &CertificateCache,
        now: OffsetDateTime,
    ) -> Result<(), VerificationError> {
        let public_key = unpem(&signature.public_key);
        let verifying_key = decode_public_key(&public_key)?;
        let raw = BASE64_URL_LENIENT
            .decode(signature.signature.trim())
            .map_err(|err| VerificationError::MalformedSignature(err.to_string()))?;
        let ecdsa =
            EcdsaSignature::from_slice(&raw).map_err(|_| VerificationError::BadSignature)?;
        verifying_key.verify(payload, &ecdsa).map_err(|_| VerificationError::BadSignature)?;

        let certificate = self.certificate(&signature.x5u, cache)?;
        check_validity(&certificate, now)?;
        check_subject(&certificate, &self.trust_suffix)?;
        if certificate.public_key_base64() != public_key {
            return Err(VerificationError::PublicKeyMismatch);
        }
        Ok(())
    }

    /// Returns the certificate behind `url`, downloading it on first use.
    fn certificate(
        &self,
        url: &str,
        cache: &CertificateCache,
    ) -> Result<Arc<Certificate>, VerificationError> {
        if let Some(certificate) = cache.get(url) {
            return Ok(certificate);
        }
        let pem = self.certificates.fetch_certificate(url).map_err(|err| {
            VerificationError::CertificateFetch {
                url: url.to_string(),
                message: err.to_string(),
            }
        })?;
        let certificate =
            Certificate::from_pem(&pem).map_err(|message| VerificationError::InvalidCertificate {
                url: url.to_string(),
                message,
            })?;
        debug!(x5u = url, "downloaded signing certificate");
        Ok(cache.insert(url, certificate))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Strips PEM armor lines and whitespace, leaving the base64 body.
#[must_use]
pub fn unpem(pem: &str) -> String {
    pem.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("-----"))
        .collect()
}

/// Decodes a base64 `SubjectPublicKeyInfo` into a P-384 key.
fn decode_public_key(body: &str) -> Result<VerifyingKey, VerificationError> {
    let der = STANDARD
        .decode(body)
        .map_err(|err| VerificationError::InvalidPublicKey(err.to_string()))?;
    VerifyingKey::from_public_key_der(&der)
        .map_err(|err| VerificationError::InvalidPublicKey(err.to_string()))
}

/// Requires `not_before < now < not_after`.
fn check_validity(certificate: &Certificate, now: OffsetDateTime) -> Result<(), VerificationError> {
    if now <= certificate.not_before {
        return Err(VerificationError::CertificateNotYetValid {
            not_before: certificate.not_before,
        });
    }
    if now >= certificate.not_after {
        return Err(VerificationError::CertificateExpired {
            not_after: certificate.not_after,
        });
    }
    Ok(())
}

/// Requires the common name to end with the trust suffix.
fn check_subject(certificate: &Certificate, trust_suffix: &str) -> Result<(), VerificationError> {
    match certificate.common_name.as_deref() {
        Some(name) if name.ends_with(trust_suffix) => Ok(()),
        other => Err(VerificationError::InvalidCertificateSubject {
            common_name: other.unwrap_or_default().to_string(),
        }),
    }
}
