pub mod password;
pub mod validation;

pub use password::{
    hash_password, is_valid_hash, needs_rehash, verify_password, Password, PasswordHashString,
};
pub use validation::ValidatedJson;
