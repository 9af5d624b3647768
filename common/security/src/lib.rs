pub mod error;
pub mod policy;
pub mod roles;

pub use error::SecurityError;
pub use policy::{AccessPolicy, Decision, LookupError, RoleDirectory, Scope};
pub use roles::{Role, UnknownRole};
