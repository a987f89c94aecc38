//! Provider implementations for cairn.
//!
//! All providers implement the `cairn_core::Provider` trait.
//! [`build_from_config`] picks the backend named in the configuration.

pub mod hashing;
pub mod openai_compat;
pub mod router;

pub use hashing::HashingProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::build_from_config;
