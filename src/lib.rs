//! # Boothwarden
//!
//! **License lifecycle and trust engine for kiosk fleets.**
//!
//! Boothwarden issues human-readable license keys, binds each license to
//! exactly one physical device at first activation, signs license
//! assertions with a service-wide Ed25519 key, and produces device-locked
//! offline bundles that a permanently offline kiosk can verify without
//! ever contacting the server again.
//!
//! ## Features
//!
//! - **Collision-resistant license keys** — `PREFIX-COUNTRY-YEAR-XXXX-XXXX-XXXX-XXXX`
//!   segments drawn from the OS CSPRNG, never a counter
//! - **One-way device binding** — only a SHA-256 fingerprint of the device
//!   id is ever stored; raw ids are never persisted
//! - **Atomic activation** — the pending→active transition is a single
//!   conditional store operation, so exactly one device can win a binding race
//! - **Ed25519-signed assertions** — verification never panics; any
//!   malformed input yields `false`
//! - **Device-locked offline bundles** — PBKDF2-derived AES-256-GCM keyed
//!   on the raw device id, so only the bound device can decrypt
//!
//! ## Quickstart
//!
//! ```no_run
//! use std::sync::Arc;
//! use boothwarden::{
//!     EngineConfig, IssueRequest, LifecycleEngine, KeyMaterial,
//!     MemoryAuditLog, MemoryStore,
//! };
//!
//! fn main() -> Result<(), boothwarden::LicenseError> {
//!     let config = EngineConfig::default();
//!     let keys = KeyMaterial::with_namespace("boothwarden")?;
//!     let engine = LifecycleEngine::new(
//!         config,
//!         keys,
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(MemoryAuditLog::new()),
//!     )?;
//!
//!     let license = engine.issue(IssueRequest {
//!         kiosk_name: "Terminal 4 South".to_string(),
//!         location: Some("JFK".to_string()),
//!         country_code: "US".to_string(),
//!         validity_days: Some(365),
//!     })?;
//!
//!     let assertion = engine.activate(&license.key, "dev-serial-0042")?;
//!     println!("bound to {}", assertion.assertion.device_id);
//!     Ok(())
//! }
//! ```
//!
//! ## Threat Model
//!
//! Boothwarden protects against:
//! - **Forged assertions** — every assertion is Ed25519-signed; only the
//!   public verification key ever leaves the service
//! - **License sharing** — a license binds irreversibly to one device
//!   fingerprint; a second device gets `DeviceMismatch`, never a rebind
//! - **Bundle theft** — offline bundles decrypt only with the key derived
//!   from the bound device's raw id
//!
//! Boothwarden does **not** prevent tampering with the kiosk binary
//! itself, and rotating the service key invalidates verification of
//! bundles signed with the old key unless old public keys are retained.

#![deny(warnings)]
#![deny(missing_docs)]
#![doc(html_root_url = "https://docs.rs/boothwarden/0.1.0")]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Crypto layer
pub mod crypto;

// License key generation
pub mod keygen;

// Protocol layer
pub mod protocol;

// Storage contracts
pub mod audit;
pub mod store;

// Engine (main public API)
pub mod engine;

// Re-exports for public API
pub use audit::{AuditLog, FileAuditLog, MemoryAuditLog};
pub use clock::{Clock, SystemClock};
pub use config::EngineConfig;
pub use crypto::keys::KeyMaterial;
pub use engine::{IssueRequest, LifecycleEngine};
pub use errors::LicenseError;
pub use protocol::models::{
    AttemptKind, License, LicenseAssertion, LicenseStatus, OfflineBundle, SignedAssertion,
    ValidationLogEntry, ValidationOutcome,
};
pub use store::{memory::MemoryStore, LicenseStore};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
