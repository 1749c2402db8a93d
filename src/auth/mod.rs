/// Authentication module
///
/// Password hashing, JWT access tokens, refresh token storage and the
/// session lifecycle built on top of them.

mod claims;
mod jwt;
mod password;
mod refresh_token;
mod session;

pub use claims::{Claims, Principal};
pub use jwt::AccessTokenIssuer;
pub use password::PasswordHasher;
pub use refresh_token::{generate_refresh_token, RefreshTokenRecord, RefreshTokenStore};
pub use session::{AuthSession, SessionManager};
