//! LLM probe output parsing.
//!
//! The Quality Scorer's task-alignment probe (§4.4) and the Contradiction
//! Engine's adjudication probe (§4.5) both ask an LLM for a small structured
//! answer — a decimal in `[0,1]`, or a JSON object — embedded in otherwise
//! free-form prose. These parsers extract that answer without a second LLM
//! round-trip, tolerating think blocks, markdown fences, and the minor
//! JSON mistakes models commonly make.

pub mod error;
pub mod extract;
pub mod json;
pub mod number;
pub mod repair;
pub mod streaming;

pub use error::ParseError;
pub use extract::{preprocess, strip_think_tags};
pub use json::{parse_json, parse_json_value};
pub use number::{parse_number, parse_number_in_range};
pub use repair::try_repair_json;
