//! Recovery of structured invoice data from free-form model output.

mod parser;

pub use parser::parse_model_response;
