/// Secret material and token minting
///
/// Everything here draws from the OS CSPRNG. Secrets generated at manager
/// construction (HMAC keys) live for the process lifetime only; a restart
/// regenerates them, which deliberately invalidates outstanding CSRF
/// tokens.
use crate::error::{AuthError, AuthResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, Rng, RngCore};
use sha2::{Digest, Sha256, Sha512};
use std::time::Duration;

/// Byte length of per-manager HMAC key material.
const HMAC_SECRET_LEN: usize = 2048;

/// Random bytes folded into every minted token.
const TOKEN_ENTROPY_LEN: usize = 256;

/// Attempts before a failed CSPRNG read becomes fatal.
const SECRET_RETRIES: u32 = 3;

/// Fill a buffer from the OS CSPRNG, retrying with a linear backoff in
/// case the system entropy source is momentarily unavailable. Fails with
/// [`AuthError::RandomnessUnavailable`] after the last attempt; callers
/// treat that as fatal, not retryable.
pub async fn create_secret(length: usize, retries: u32) -> AuthResult<Vec<u8>> {
    let mut buf = vec![0u8; length];

    for attempt in 0..retries {
        if OsRng.try_fill_bytes(&mut buf).is_ok() {
            return Ok(buf);
        }
        tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
    }

    Err(AuthError::RandomnessUnavailable)
}

/// Process-lifetime HMAC key material.
pub async fn hmac_secret() -> AuthResult<Vec<u8>> {
    create_secret(HMAC_SECRET_LEN, SECRET_RETRIES).await
}

/// Mint a session secret: SHA-512 over 256 random bytes followed by the
/// current Unix timestamp as a varint, URL-safe base64 without padding.
/// The timestamp suffix keeps the hash input unique even against an
/// (assumed impossible) repeated CSPRNG read.
pub async fn random_sha512_token() -> AuthResult<String> {
    let entropy = create_secret(TOKEN_ENTROPY_LEN, SECRET_RETRIES).await?;

    let mut hasher = Sha512::new();
    hasher.update(&entropy);
    hasher.update(timestamp_varint());

    Ok(URL_SAFE_NO_PAD.encode(hasher.finalize()))
}

/// Mint an access-token secret; same recipe as the session secret over
/// SHA-256.
pub async fn random_sha256_token() -> AuthResult<String> {
    let entropy = create_secret(TOKEN_ENTROPY_LEN, SECRET_RETRIES).await?;

    let mut hasher = Sha256::new();
    hasher.update(&entropy);
    hasher.update(timestamp_varint());

    Ok(URL_SAFE_NO_PAD.encode(hasher.finalize()))
}

/// A random 64-bit LCG seed, rejecting primes. Prime seeds are avoided so
/// the seed shares no structure with the (odd) multiplier.
pub fn random_u64_not_prime() -> u64 {
    let mut rng = rand::thread_rng();
    loop {
        let n: u64 = rng.gen();
        if !is_prime(n) {
            return n;
        }
    }
}

/// Current Unix seconds, zigzag varint encoded in a fixed 10-byte buffer.
fn timestamp_varint() -> [u8; 10] {
    let secs = chrono::Utc::now().timestamp();

    let mut buf = [0u8; 10];
    let mut ux = ((secs as u64) << 1) ^ ((secs >> 63) as u64);
    let mut i = 0;
    while ux >= 0x80 {
        buf[i] = (ux as u8) | 0x80;
        ux >>= 7;
        i += 1;
    }
    buf[i] = ux as u8;
    buf
}

/// Deterministic Miller–Rabin for u64. The witness set {2..37} is proven
/// sufficient for the full 64-bit range.
fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    for p in [2u64, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37] {
        if n == p {
            return true;
        }
        if n % p == 0 {
            return false;
        }
    }

    let mut d = n - 1;
    let mut r = 0u32;
    while d % 2 == 0 {
        d /= 2;
        r += 1;
    }

    'witness: for a in [2u64, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37] {
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 0..r - 1 {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }

    true
}

fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut result = 1u64;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_mod(result, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_secret_length() {
        let s = create_secret(64, 3).await.unwrap();
        assert_eq!(s.len(), 64);
    }

    #[tokio::test]
    async fn test_tokens_are_distinct() {
        let a = random_sha512_token().await.unwrap();
        let b = random_sha512_token().await.unwrap();
        assert_ne!(a, b);

        let c = random_sha256_token().await.unwrap();
        let d = random_sha256_token().await.unwrap();
        assert_ne!(c, d);
    }

    #[tokio::test]
    async fn test_token_is_url_safe() {
        let t = random_sha512_token().await.unwrap();
        assert!(!t.contains('+'));
        assert!(!t.contains('/'));
        assert!(!t.contains('='));
        // SHA-512 digest: 64 bytes -> 86 base64 chars unpadded
        assert_eq!(t.len(), 86);

        let t = random_sha256_token().await.unwrap();
        // SHA-256 digest: 32 bytes -> 43 base64 chars unpadded
        assert_eq!(t.len(), 43);
    }

    #[test]
    fn test_is_prime() {
        assert!(is_prime(2));
        assert!(is_prime(3));
        assert!(is_prime(104_729));
        assert!(is_prime(18_446_744_073_709_551_557)); // largest u64 prime

        assert!(!is_prime(0));
        assert!(!is_prime(1));
        assert!(!is_prime(104_730));
        assert!(!is_prime(u64::MAX));
    }

    #[test]
    fn test_seed_is_never_prime() {
        for _ in 0..100 {
            assert!(!is_prime(random_u64_not_prime()));
        }
    }
}
