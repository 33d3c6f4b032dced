//! Response decoder module
//!
//! # Overview
//!
//! Pulumi Cloud answers with JSON bodies. A decoder pulls the record list out
//! of a body with a configured selector (`$.stacks[*]`, `$`, `$[*]`), and the
//! transform helpers normalize record keys before they reach the sink.

mod decoders;
mod transform;
mod types;

pub use decoders::JsonDecoder;
pub use transform::{normalize_keys, to_snake_case};
pub use types::RecordDecoder;
