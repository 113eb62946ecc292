pub mod auth;
pub mod error;

pub use auth::{Actor, UserRole};
pub use error::ErrorKind;
