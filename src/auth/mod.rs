//! Authentication: JWT issuance, password hashing and request extractors.

mod extractor;
mod jwt;
mod password;

pub use extractor::{AdminUser, MaybeUser, CART_TOKEN_HEADER};
pub use jwt::{Claims, CurrentUser, JwtError, JwtService, Role};
pub use password::{hash_password, verify_password};
