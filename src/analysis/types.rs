use serde::{Deserialize, Serialize};

use crate::calibration::types::BoundingBox;

/// Kind of mistake the model attributed to a wrong answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Calculation,
    Fact,
    Grammar,
    Logic,
    Unknown,
    Unanswered,
}

/// One detected problem. Only `id`, `is_correct` and `bounding_box` matter
/// to overlay calibration; the rest is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkProblem {
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub question_text: String,
    #[serde(default)]
    pub student_answer: String,
    pub is_correct: bool,
    #[serde(default)]
    pub correct_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<String>,
    #[serde(default)]
    pub hint: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub solution_steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
    pub bounding_box: BoundingBox,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub problems: Vec<HomeworkProblem>,
    #[serde(default)]
    pub overall_summary: String,
}

impl AnalysisResult {
    /// The rectangle batch, in problem order.
    pub fn boxes(&self) -> Vec<BoundingBox> {
        self.problems.iter().map(|p| p.bounding_box).collect()
    }

    pub fn problem(&self, id: &str) -> Option<&HomeworkProblem> {
        self.problems.iter().find(|p| p.id == id)
    }
}
