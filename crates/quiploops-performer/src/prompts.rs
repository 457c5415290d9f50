use quiploops_critic::Feedback;

/// Prompt templates for the generator
pub struct GeneratorPrompts;

impl GeneratorPrompts {
    pub fn system() -> &'static str {
        r#"You are a creative comedian and joke writer. Write ORIGINAL, FUNNY jokes on the theme you are given.

Guidelines:
- Be creative and witty
- Keep it concise (2-4 sentences max)
- Make it memorable and punchy
- Aim for surprise and clever wordplay
- Any format works: pun, one-liner, setup and punchline
- Stay tasteful

Reply with ONE complete joke and nothing else."#
    }

    pub fn build_generation_prompt(topic: &str) -> String {
        format!("Write a joke about: {}", topic.trim())
    }

    /// Prompt asking for a rewrite that addresses `feedback`
    pub fn build_revision_prompt(artifact: &str, feedback: &Feedback) -> String {
        format!(
            r#"You are revising a joke to make it better.

The joke scored {score}/100.

## Weaknesses
{weaknesses}

## Suggestions
{suggestions}

## Original Joke
"{artifact}"

Rewrite the joke to fix the weaknesses and apply the suggestions.
- Keep the core concept, improve the delivery
- Keep it concise (2-4 sentences max)

Reply with the REVISED joke only."#,
            score = feedback.score(),
            weaknesses = bullet_list(feedback.weaknesses()),
            suggestions = bullet_list(feedback.suggestions()),
            artifact = artifact.trim(),
        )
    }
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "(none given)".to_string();
    }
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}
