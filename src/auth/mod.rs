/// Authentication module
///
/// The token core: access token issuance and validation, the revocation
/// blacklist, single-use refresh token rotation, and password hashing for
/// the login step in front of it.

mod blacklist;
mod claims;
mod jwt;
mod password;
mod refresh_token;
mod session;
mod validator;

pub use blacklist::JwtBlacklistRepository;
pub use claims::{AuthenticatedUser, Claims};
pub use jwt::TokenIssuer;
pub use password::{hash_password, verify_against_dummy, verify_password};
pub use refresh_token::{generate_refresh_token, RefreshTokenRepository};
pub use session::{SessionManager, TokenPair};
pub use validator::{Rejection, TokenValidation, TokenValidator};
