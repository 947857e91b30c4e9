/// Middleware module
///
/// The authorization gate and the role gate that runs behind it.

mod jwt_middleware;
mod role_middleware;

pub use jwt_middleware::{bearer_token, JwtMiddleware};
pub use role_middleware::RequireRoles;
