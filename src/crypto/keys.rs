//! Service-wide Ed25519 signing key material.
//!
//! One key pair signs every license assertion the service produces. It is
//! created lazily on first boot, persisted as a hex-encoded seed, and
//! loaded unchanged for the lifetime of the deployment. The value is
//! explicitly constructed and injected into the engine at startup, never a
//! module-level singleton, so tests can use ephemeral throwaway keys.
//!
//! Rotating the seed invalidates verification of previously issued
//! offline assertions unless old public keys are retained by verifiers.

use crate::LicenseError;
use ed25519_dalek::pkcs8::{spki::der::pem::LineEnding, EncodePublicKey};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use std::fs;
use std::path::{Path, PathBuf};
use zeroize::Zeroize;

/// Immutable Ed25519 key pair for assertion signing.
///
/// The private half never crosses the crate boundary; only
/// [`KeyMaterial::public_key_hex`] and [`KeyMaterial::public_key_pem`]
/// are exposed to callers.
#[derive(Clone)]
pub struct KeyMaterial {
    signing: SigningKey,
    verifying: VerifyingKey,
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

impl KeyMaterial {
    /// Generate a fresh ephemeral key pair from the OS CSPRNG.
    pub fn generate() -> Result<Self, LicenseError> {
        let mut seed = [0u8; 32];
        getrandom::getrandom(&mut seed)
            .map_err(|e| LicenseError::KeyMaterial(format!("RNG failure: {}", e)))?;

        let signing = SigningKey::from_bytes(&seed);
        seed.zeroize();

        let verifying = signing.verifying_key();
        Ok(Self { signing, verifying })
    }

    /// Construct key material from a hex-encoded 32-byte seed.
    pub fn from_seed_hex(seed_hex: &str) -> Result<Self, LicenseError> {
        let mut bytes = hex::decode(seed_hex.trim())
            .map_err(|e| LicenseError::KeyMaterial(format!("Invalid seed hex: {}", e)))?;

        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| LicenseError::KeyMaterial("Seed must be 32 bytes".to_string()))?;
        bytes.zeroize();

        let signing = SigningKey::from_bytes(&seed);
        let verifying = signing.verifying_key();
        Ok(Self { signing, verifying })
    }

    /// Load the seed from `path`, generating and persisting a new one if
    /// the file does not exist yet.
    pub fn load_or_generate(path: &Path) -> Result<Self, LicenseError> {
        if path.exists() {
            let seed_hex = fs::read_to_string(path)
                .map_err(|e| LicenseError::KeyMaterial(format!("Failed to read key file: {}", e)))?;
            return Self::from_seed_hex(&seed_hex);
        }

        let material = Self::generate()?;
        material.persist(path)?;
        Ok(material)
    }

    /// Load or generate key material under `dirs::data_dir()/<namespace>/`.
    pub fn with_namespace(namespace: &str) -> Result<Self, LicenseError> {
        let base_dir = dirs::data_dir()
            .ok_or_else(|| LicenseError::KeyMaterial("Could not find data directory".to_string()))?;

        let dir = base_dir.join(namespace);
        fs::create_dir_all(&dir)
            .map_err(|e| LicenseError::KeyMaterial(format!("Failed to create key dir: {}", e)))?;

        Self::load_or_generate(&dir.join("signing_key.hex"))
    }

    /// Persist the seed atomically via temp file + rename.
    fn persist(&self, path: &Path) -> Result<(), LicenseError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| LicenseError::KeyMaterial(format!("Failed to create dir: {}", e)))?;
        }

        let seed_hex = hex::encode(self.signing.to_bytes());
        let temp_path = temp_sibling(path);
        fs::write(&temp_path, &seed_hex)
            .map_err(|e| LicenseError::KeyMaterial(format!("Failed to write key file: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600)).map_err(|e| {
                LicenseError::KeyMaterial(format!("Failed to set key file mode: {}", e))
            })?;
        }

        fs::rename(&temp_path, path)
            .map_err(|e| LicenseError::KeyMaterial(format!("Failed to rename key file: {}", e)))?;

        Ok(())
    }

    /// Sign a canonical byte string.
    pub(crate) fn sign(&self, message: &[u8]) -> Signature {
        self.signing.sign(message)
    }

    /// Hex-encoded Ed25519 public verification key (64 hex chars).
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying.to_bytes())
    }

    /// PEM-encoded (SPKI) public verification key.
    ///
    /// This is the only cryptographic material ever exposed outside the
    /// service boundary.
    pub fn public_key_pem(&self) -> Result<String, LicenseError> {
        self.verifying
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| LicenseError::KeyMaterial(format!("PEM encoding failed: {}", e)))
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn generate_produces_distinct_keys() {
        let a = KeyMaterial::generate().unwrap();
        let b = KeyMaterial::generate().unwrap();
        assert_ne!(a.public_key_hex(), b.public_key_hex());
        assert_eq!(a.public_key_hex().len(), 64);
    }

    #[test]
    fn seed_roundtrip_is_stable() {
        // Well-known Ed25519 test vector seed (DO NOT USE IN PRODUCTION).
        let seed = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
        let material = KeyMaterial::from_seed_hex(seed).unwrap();
        assert_eq!(
            material.public_key_hex(),
            "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a"
        );
    }

    #[test]
    fn from_seed_hex_rejects_bad_input() {
        assert!(KeyMaterial::from_seed_hex("not hex").is_err());
        assert!(KeyMaterial::from_seed_hex("0000").is_err());
    }

    #[test]
    fn load_or_generate_persists_first_boot_key() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("signing_key.hex");

        let first = KeyMaterial::load_or_generate(&path).unwrap();
        assert!(path.exists());

        let second = KeyMaterial::load_or_generate(&path).unwrap();
        assert_eq!(first.public_key_hex(), second.public_key_hex());
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("signing_key.hex");
        KeyMaterial::load_or_generate(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn pem_export_has_spki_framing() {
        let material = KeyMaterial::generate().unwrap();
        let pem = material.public_key_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));
        assert!(pem.trim_end().ends_with("-----END PUBLIC KEY-----"));
    }

    #[test]
    fn debug_does_not_leak_private_half() {
        let material = KeyMaterial::generate().unwrap();
        let rendered = format!("{:?}", material);
        assert!(rendered.contains(&material.public_key_hex()));
        assert!(!rendered.contains(&hex::encode(material.signing.to_bytes())));
    }
}
