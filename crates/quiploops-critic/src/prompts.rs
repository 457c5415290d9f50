/// Prompt templates for the evaluator
pub struct EvaluatorPrompts;

impl EvaluatorPrompts {
    /// System prompt for every evaluation
    pub fn system() -> &'static str {
        r#"You are an expert comedy critic and writing coach. Evaluate jokes honestly and constructively.

Judge the joke on:
1. **Score (0-100)**: how funny is it, does it land?
2. **Maturity tier**: Child, Teen or Adult, based on its content
3. **Strengths**: what works (technique, timing, wordplay)
4. **Weaknesses**: what falls flat
5. **Suggestions**: specific, actionable changes

Respond with a single JSON object and nothing else:
{
  "score": <integer 0-100>,
  "maturityTier": "<Child|Teen|Adult>",
  "strengths": ["...", "..."],
  "weaknesses": ["...", "..."],
  "suggestions": ["...", "..."],
  "verdict": "<one sentence summary>"
}"#
    }

    /// System prompt for a fresh look at an already evaluated joke
    pub fn reevaluation_system() -> String {
        format!(
            "{}\n\nYou are giving a fresh, independent evaluation of this joke. Ignore any earlier opinion and focus on clear, actionable feedback.",
            Self::system()
        )
    }

    pub fn build_evaluation_prompt(artifact: &str) -> String {
        format!(
            "Evaluate this joke:\n\n\"{}\"\n\nRespond with valid JSON only.",
            artifact.trim()
        )
    }

    pub fn build_reevaluation_prompt(artifact: &str) -> String {
        format!(
            "Provide a fresh evaluation of this joke:\n\n\"{}\"\n\nRespond with valid JSON only.",
            artifact.trim()
        )
    }
}
