use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::fmt;

/// Plaintext password. `Debug` is redacted so it cannot end up in logs.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Newtype for password hash
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Hash a password using Argon2id with a fresh random salt.
///
/// The result is a PHC string carrying algorithm, parameters and salt.
pub fn hash_password(password: &Password) -> Result<PasswordHashString, anyhow::Error> {
    if password.as_str().is_empty() {
        return Err(anyhow::anyhow!("Password must not be empty"));
    }

    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(PasswordHashString::new(password_hash))
}

/// Verify a password against a stored hash in constant time.
///
/// Argon2 PHC strings and legacy bcrypt (`$2a$`, `$2b$`, `$2y$`) hashes are
/// accepted. Malformed hashes simply fail verification.
pub fn verify_password(password: &Password, password_hash: &str) -> bool {
    if is_bcrypt_hash(password_hash) {
        return bcrypt::verify(password.as_str(), password_hash).unwrap_or(false);
    }

    let Ok(parsed_hash) = PasswordHash::new(password_hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_str().as_bytes(), &parsed_hash)
        .is_ok()
}

/// Structural check that `value` is a password hash we can verify rather
/// than, say, a plaintext password left over from an old import.
pub fn is_valid_hash(value: &str) -> bool {
    if is_bcrypt_hash(value) {
        return true;
    }
    match PasswordHash::new(value) {
        Ok(parsed) => parsed.algorithm.as_str().starts_with("argon2") && parsed.hash.is_some(),
        Err(_) => false,
    }
}

/// Legacy hashes verify but should be replaced with Argon2id on next login.
pub fn needs_rehash(value: &str) -> bool {
    is_bcrypt_hash(value)
}

const BCRYPT_ALPHABET: &[u8] = b"./ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// `$2b$12$` followed by 22 salt and 31 digest characters.
fn is_bcrypt_hash(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 60 {
        return false;
    }
    let version_ok = matches!(&bytes[..4], b"$2a$" | b"$2b$" | b"$2y$");
    let cost_ok = match (bytes[4], bytes[5]) {
        (tens @ b'0'..=b'3', ones @ b'0'..=b'9') => {
            (4..=31).contains(&((tens - b'0') * 10 + (ones - b'0')))
        }
        _ => false,
    };

    version_ok
        && cost_ok
        && bytes[6] == b'$'
        && bytes[7..].iter().all(|b| BCRYPT_ALPHABET.contains(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password() {
        let password = Password::new("mySecurePassword123".to_string());
        let hash = hash_password(&password).expect("Failed to hash password");

        assert!(hash.as_str().starts_with("$argon2id$"));
        assert!(is_valid_hash(hash.as_str()));
    }

    #[test]
    fn test_empty_password_is_rejected() {
        assert!(hash_password(&Password::new(String::new())).is_err());
    }

    #[test]
    fn test_verify_password_correct() {
        let password = Password::new("mySecurePassword123".to_string());
        let hash = hash_password(&password).expect("Failed to hash password");

        assert!(verify_password(&password, hash.as_str()));
    }

    #[test]
    fn test_verify_password_incorrect() {
        let password = Password::new("mySecurePassword123".to_string());
        let hash = hash_password(&password).expect("Failed to hash password");

        let wrong_password = Password::new("wrongPassword".to_string());
        assert!(!verify_password(&wrong_password, hash.as_str()));
    }

    #[test]
    fn test_different_hashes_for_same_password() {
        let password = Password::new("mySecurePassword123".to_string());
        let hash1 = hash_password(&password).expect("Failed to hash password");
        let hash2 = hash_password(&password).expect("Failed to hash password");

        // Random salt per call
        assert_ne!(hash1.as_str(), hash2.as_str());

        assert!(verify_password(&password, hash1.as_str()));
        assert!(verify_password(&password, hash2.as_str()));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        let password = Password::new("secret1".to_string());
        assert!(!verify_password(&password, "secret1"));
        assert!(!verify_password(&password, ""));
        assert!(!verify_password(&password, "$argon2id$garbage"));
    }

    // bcrypt of "secret123" at cost 4, as written by the previous backend
    const LEGACY_BCRYPT: &str = "$2b$04$..CA.uOD/eaGAOmJB.yMBuplSUM5vth.zCNlv0VcOK.FEHcfNJRFu";

    #[test]
    fn test_is_valid_hash_rejects_plaintext() {
        assert!(!is_valid_hash("secret1"));
        assert!(!is_valid_hash(""));
        assert!(!is_valid_hash("$2b$12$notreallybcryptbutclose"));
        assert!(!is_valid_hash("$2x$04$..CA.uOD/eaGAOmJB.yMBuplSUM5vth.zCNlv0VcOK.FEHcfNJRFu"));
    }

    #[test]
    fn test_legacy_bcrypt_hash_is_accepted() {
        assert!(is_valid_hash(LEGACY_BCRYPT));
        assert!(needs_rehash(LEGACY_BCRYPT));

        assert!(verify_password(&Password::new("secret123".to_string()), LEGACY_BCRYPT));
        assert!(!verify_password(&Password::new("secret124".to_string()), LEGACY_BCRYPT));
    }

    #[test]
    fn test_published_bcrypt_vector_verifies() {
        let hash = "$2a$05$CCCCCCCCCCCCCCCCCCCCC.E5YPO9kmyuRGyh0XouQYb4YMJKvyOeW";
        assert!(is_valid_hash(hash));
        assert!(verify_password(&Password::new("U*U".to_string()), hash));
    }

    #[test]
    fn test_argon2_hash_needs_no_rehash() {
        let hash = hash_password(&Password::new("secret123".to_string())).unwrap();
        assert!(!needs_rehash(hash.as_str()));
    }

    #[test]
    fn test_debug_is_redacted() {
        let password = Password::new("hunter22".to_string());
        assert!(!format!("{:?}", password).contains("hunter22"));
    }
}
