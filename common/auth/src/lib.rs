pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod tokens;

pub use claims::Claims;
pub use config::JwtConfig;
pub use error::{AuthError, AuthResult};
pub use extractors::AuthContext;
pub use tokens::{IssuedToken, TokenService};
