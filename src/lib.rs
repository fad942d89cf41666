pub mod client;
pub mod common;
pub mod error;
pub mod utils;

pub use error::ClientError;
