//! Token claims and the signed-token codec.

pub mod claims;
pub mod codec;

pub use claims::{Claims, TokenType};
pub use codec::{DecodeError, TokenCodec};
