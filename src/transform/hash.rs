//! Salted one-way hashing of sensitive column values.

use bcrypt::BcryptError;

use crate::data::Value;

pub use bcrypt::DEFAULT_COST;

pub const MIN_COST: u32 = 4;
pub const MAX_COST: u32 = 31;

/// Replaces a value with a bcrypt hash of its text form, salted per call.
///
/// Null and empty values are hashed too; a null hashes like the empty string.
pub fn hash_value(value: &Value, cost: u32) -> Result<Value, BcryptError> {
    let hashed = match value {
        Value::Bytes(bytes) => bcrypt::hash(bytes, cost)?,
        other => bcrypt::hash(other.as_display(), cost)?,
    };
    Ok(Value::String(hashed))
}

/// True when `hashed` is a bcrypt hash of `plain`.
pub fn verify_value(plain: &Value, hashed: &Value) -> bool {
    let Some(hashed) = hashed.as_str() else {
        return false;
    };
    let checked = match plain {
        Value::Bytes(bytes) => bcrypt::verify(bytes, hashed),
        other => bcrypt::verify(other.as_display(), hashed),
    };
    checked.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_salted_bcrypt() {
        let first = hash_value(&Value::from("secret"), MIN_COST).unwrap();
        let second = hash_value(&Value::from("secret"), MIN_COST).unwrap();
        assert_ne!(first, second);
        assert!(first.as_str().is_some_and(|hash| hash.starts_with("$2")));
        assert!(verify_value(&Value::from("secret"), &first));
        assert!(verify_value(&Value::from("secret"), &second));
        assert!(!verify_value(&Value::from("Secret"), &first));
    }

    #[test]
    fn null_and_empty_hash_alike() {
        let hashed = hash_value(&Value::Null, MIN_COST).unwrap();
        assert!(verify_value(&Value::from(""), &hashed));
        assert!(!verify_value(&Value::from("null"), &hashed));
    }

    #[test]
    fn invalid_cost_is_an_error() {
        assert!(hash_value(&Value::from("secret"), MAX_COST + 1).is_err());
    }
}
