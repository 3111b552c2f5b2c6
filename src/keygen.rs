//! License key generation.
//!
//! Keys follow `PREFIX-COUNTRY-YEAR-XXXX-XXXX-XXXX-XXXX`. Every `XXXX`
//! segment is drawn from the OS CSPRNG, never a counter, so valid-looking
//! keys cannot be guessed. Collision checking against the store is the
//! engine's responsibility; this module only consumes randomness.

use crate::clock::Clock;
use crate::LicenseError;
use chrono::Datelike;

/// Characters used for random segments. Ambiguous glyphs (0/O, 1/I/L)
/// are excluded so keys survive being read over the phone.
const SEGMENT_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Number of random segments per key.
const SEGMENT_COUNT: usize = 4;

/// Characters per random segment.
const SEGMENT_LEN: usize = 4;

/// Generate a license key with the given prefix and country code.
///
/// The year component comes from the provided clock. The random portion
/// carries `31^16` possible values, so collisions are negligible — but
/// callers must still collision-check against the store before treating
/// the key as issued.
pub fn generate_key<C: Clock + ?Sized>(
    prefix: &str,
    country_code: &str,
    clock: &C,
) -> Result<String, LicenseError> {
    let mut raw = [0u8; SEGMENT_COUNT * SEGMENT_LEN];
    getrandom::getrandom(&mut raw)
        .map_err(|e| LicenseError::KeyMaterial(format!("RNG failure: {}", e)))?;

    let year = clock.now_utc().year();
    let mut key = format!(
        "{}-{}-{}",
        prefix.to_ascii_uppercase(),
        country_code.to_ascii_uppercase(),
        year
    );

    for segment in raw.chunks(SEGMENT_LEN) {
        key.push('-');
        for byte in segment {
            // Modulo bias over a 31-char alphabet is ~0.4% per position;
            // irrelevant for uniqueness, which is all this needs.
            key.push(SEGMENT_ALPHABET[*byte as usize % SEGMENT_ALPHABET.len()] as char);
        }
    }

    Ok(key)
}
