//! Model Output Validation
//!
//! Extraction of structured JSON from free-form model output, with repair of
//! the malformed escapes and wrappers models commonly emit.

mod json_repair;

pub use json_repair::{
    ExtractionError, StructuredShape, extract_structured, extract_structured_auto,
    repair_escapes, slice_delimited, strip_code_fences, strip_reasoning,
};
