pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod service;

pub use codec::FieldCodec;
pub use db::IdentityStorage;
pub use error::RegistryError;
