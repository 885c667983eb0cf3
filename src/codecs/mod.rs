//! Cache Codec Implementations
//!
//! Built-in [`CacheCodec`](crate::traits::CacheCodec) implementations used by
//! the tenant cache to turn typed values into backend bytes.

mod json;
pub use json::JsonCodec;
