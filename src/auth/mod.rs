/// Authentication module
///
/// Password hashing, access-token signing and validation, refresh-token
/// rotation, and the service that ties them into login/refresh/logout.

mod claims;
mod jwt;
mod password;
mod refresh_token;
mod seed;
mod service;

pub use claims::Claims;
pub use jwt::{validate_access_token, AccessToken, TokenSigner};
pub use password::{hash_password, verify_password, HashedPassword};
pub use refresh_token::{generate_refresh_token, hash_token, IssuedRefreshToken, RefreshTokenStore};
pub use seed::seed_account;
pub use service::{AuthService, LoginResult};
