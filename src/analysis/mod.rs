pub mod parser;
pub mod types;

pub use parser::parse_model_text;
pub use types::{AnalysisResult, ErrorType, HomeworkProblem};
