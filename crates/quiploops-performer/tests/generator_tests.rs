use std::sync::Arc;

use quiploops_agent::fakes::ScriptedBackend;
use quiploops_agent::{AgentConfig, CompletionError, ProviderKind, Role, RoleAgent, TokenUsage};
use quiploops_critic::{Feedback, MaturityTier};
use quiploops_performer::Generator;

fn generator(backend: Arc<ScriptedBackend>) -> Generator {
    Generator::new(RoleAgent::new(
        Role::Generator,
        backend,
        AgentConfig::for_role(Role::Generator, "gpt-4o-mini"),
    ))
}

#[tokio::test]
async fn generate_returns_raw_completion_text() {
    let raw = "  I told my cat a joke.\nShe was not a-mused.  ";
    let backend = Arc::new(ScriptedBackend::new(ProviderKind::OpenAi).respond(raw));

    let draft = generator(backend.clone()).generate("cats").await.unwrap();
    assert_eq!(draft.text, raw);
    assert_eq!(draft.usage, None);

    let request = &backend.requests()[0];
    assert_eq!(request.role, Role::Generator);
    assert_eq!(request.max_tokens, 500);
    assert!(request.prompt.ends_with("cats"));
}

#[tokio::test]
async fn revise_sends_prior_artifact_and_feedback() {
    let backend = Arc::new(ScriptedBackend::new(ProviderKind::OpenAi).respond("Better joke"));
    let feedback = Feedback::new(
        20,
        MaturityTier::Child,
        vec!["short".into()],
        vec!["no punchline".into()],
        vec!["add a twist".into()],
        "Needs work.",
    );

    let revised = generator(backend.clone())
        .revise("Old joke", &feedback)
        .await
        .unwrap();
    assert_eq!(revised.text, "Better joke");

    let prompt = &backend.requests()[0].prompt;
    assert!(prompt.contains("\"Old joke\""));
    assert!(prompt.contains("- no punchline"));
    assert!(prompt.contains("- add a twist"));
}

#[tokio::test]
async fn generation_failure_is_returned() {
    let backend = Arc::new(ScriptedBackend::new(ProviderKind::OpenAi).fail(
        CompletionError::ModelUnavailable {
            provider: ProviderKind::OpenAi,
            model: "gpt-4o-mini".into(),
            message: "HTTP 404".into(),
        },
    ));
    let err = generator(backend).generate("cats").await.unwrap_err();
    assert!(matches!(err, CompletionError::ModelUnavailable { .. }));
}

#[tokio::test]
async fn blank_completion_is_rejected() {
    let backend = Arc::new(
        ScriptedBackend::new(ProviderKind::Groq)
            .respond("")
            .respond(" \n\t "),
    );
    let generator = generator(backend.clone());

    for _ in 0..2 {
        let err = generator.generate("cats").await.unwrap_err();
        assert!(matches!(
            err,
            CompletionError::InvalidResponse {
                provider: ProviderKind::Groq,
                ..
            }
        ));
        assert!(err.to_string().contains("empty text"));
    }
    assert_eq!(backend.call_count(), 2);
}

#[tokio::test]
async fn reported_usage_is_carried_with_draft() {
    let usage = TokenUsage {
        prompt_tokens: 90,
        completion_tokens: 25,
    };
    let backend = Arc::new(
        ScriptedBackend::new(ProviderKind::OpenAi)
            .with_usage(usage)
            .respond("A joke"),
    );
    let draft = generator(backend).generate("cats").await.unwrap();
    assert_eq!(draft.usage.map(|u| u.total()), Some(115));
}
