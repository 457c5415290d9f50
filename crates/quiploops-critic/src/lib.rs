pub mod evaluator;
mod extractor;
mod feedback;
mod prompts;

pub use evaluator::{Critique, Evaluator};
pub use extractor::{
    extract_feedback, Extraction, ExtractionDiagnostic, FallbackPolicy, FeedbackExtractor,
};
pub use feedback::{clamp_score, Feedback, MaturityTier, MAX_SCORE, NO_VERDICT};
pub use prompts::EvaluatorPrompts;
