//! Serializer Adapters
//!
//! Implementations of the `IndexSerializer` trait.

mod bincode;

pub use self::bincode::BincodeIndexSerializer;
