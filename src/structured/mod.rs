//! Structured output handling for generated artifacts.
//!
//! Model output is untrusted text. Before it can become an artifact it must:
//! - contain a JSON document (`extract_json`)
//! - satisfy the artifact's JSON schema (`ResponseSchema`)
//! - deserialize into the artifact type (`parse_artifact`)
//!
//! Any failed step is a [`GenerationFailure`](crate::error::GenerationFailure), which
//! the cache answers with a fallback artifact.
//!
//! # Examples
//!
//! ```
//! use gencache::structured::{parse_artifact, ResponseSchema};
//!
//! #[derive(serde::Deserialize, schemars::JsonSchema)]
//! struct Hint {
//!     text: String,
//! }
//!
//! let schema = ResponseSchema::for_type::<Hint>().unwrap();
//! let hint: Hint = parse_artifact(r#"Here you go: {"text": "think about halves"}"#, &schema).unwrap();
//! assert_eq!(hint.text, "think about halves");
//! ```

pub mod extract;
pub mod schema;

pub use extract::extract_json;
pub use schema::{json_schema_from_type, parse_artifact, ResponseSchema};
