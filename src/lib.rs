mod auth;
mod chirps;
pub mod config;
mod error;
pub mod headers;
pub mod password;
mod routes;
pub mod store;
pub mod token;
mod types;

pub use auth::*;
pub use chirps::*;
pub use error::*;
pub use routes::*;
pub use types::*;
