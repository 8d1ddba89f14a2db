use crate::{error::AuthError, types::HashedPassword};

const SALT_LENGTH: usize = 16;

/// Hash `password` with argon2 and a fresh random salt, so hashing the same
/// password twice never yields the same digest.
pub fn hash_password(password: &str) -> Result<HashedPassword, AuthError> {
    let salt: [u8; SALT_LENGTH] = rand::random();
    let encoded = argon2::hash_encoded(password.as_bytes(), &salt, &Default::default())?;

    Ok(HashedPassword(encoded))
}

/// Check `password` against a stored digest.
///
/// A wrong password is reported as [AuthError::LoginFailed]. A digest that
/// cannot be decoded is a [AuthError::Hashing] fault.
pub fn verify_password(password: &str, hash: &HashedPassword) -> Result<(), AuthError> {
    if argon2::verify_encoded(&hash.0, password.as_bytes())? {
        Ok(())
    } else {
        Err(AuthError::LoginFailed)
    }
}
