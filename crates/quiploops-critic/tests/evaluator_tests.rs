use std::sync::Arc;

use quiploops_agent::fakes::ScriptedBackend;
use quiploops_agent::{AgentConfig, CompletionError, ProviderKind, Role, RoleAgent, TokenUsage};
use quiploops_critic::{Evaluator, FallbackPolicy, FeedbackExtractor, MaturityTier};

const GOOD_JSON: &str = r#"{"score": 78, "maturityTier": "Teen", "strengths": ["wordplay"],
  "weaknesses": ["slow start"], "suggestions": ["lead with the pun"], "verdict": "Lands."}"#;

fn evaluator(backend: Arc<ScriptedBackend>) -> Evaluator {
    let agent = RoleAgent::new(
        Role::Evaluator,
        backend,
        AgentConfig::for_role(Role::Evaluator, "llama-3.3-70b-versatile"),
    );
    Evaluator::new(agent)
}

#[tokio::test]
async fn evaluate_extracts_feedback() {
    let backend = Arc::new(ScriptedBackend::new(ProviderKind::Groq).respond(GOOD_JSON));
    let feedback = evaluator(backend.clone())
        .evaluate("Why did the scarecrow win an award? He was outstanding in his field.")
        .await
        .unwrap()
        .feedback;

    assert_eq!(feedback.score(), 78);
    assert_eq!(feedback.maturity_tier(), MaturityTier::Teen);
    assert!(!feedback.is_degraded());

    let request = &backend.requests()[0];
    assert_eq!(request.role, Role::Evaluator);
    assert!((request.temperature - 0.3).abs() < f32::EPSILON);
    assert_eq!(request.max_tokens, 1000);
    assert!(request.prompt.contains("outstanding in his field"));
}

#[tokio::test]
async fn reevaluate_makes_a_fresh_call() {
    let backend = Arc::new(
        ScriptedBackend::new(ProviderKind::Groq)
            .respond(GOOD_JSON)
            .respond(r#"{"score": 40, "maturityTier": "Child", "verdict": "Meh."}"#),
    );
    let evaluator = evaluator(backend.clone());

    let first = evaluator.evaluate("joke").await.unwrap().feedback;
    let second = evaluator.reevaluate("joke").await.unwrap().feedback;

    assert_eq!(backend.call_count(), 2);
    assert_ne!(first, second);
    assert_eq!(second.score(), 40);
    assert!(backend.requests()[1].system.contains("fresh, independent"));
}

#[tokio::test]
async fn unparseable_output_degrades_instead_of_failing() {
    let backend = Arc::new(
        ScriptedBackend::new(ProviderKind::Together).respond("I loved it, 9/10 would laugh again"),
    );
    let feedback = evaluator(backend).evaluate("joke").await.unwrap().feedback;
    assert!(feedback.is_degraded());
    assert_eq!(feedback.score(), 50);
}

#[tokio::test]
async fn custom_fallback_policy_is_used() {
    let backend = Arc::new(ScriptedBackend::new(ProviderKind::Groq).respond("not json"));
    let evaluator = evaluator(backend).with_extractor(FeedbackExtractor::new(FallbackPolicy {
        score: 10,
        maturity_tier: MaturityTier::Adult,
        ..FallbackPolicy::default()
    }));

    let feedback = evaluator.evaluate("joke").await.unwrap().feedback;
    assert_eq!(feedback.score(), 10);
    assert_eq!(feedback.maturity_tier(), MaturityTier::Adult);
}

#[tokio::test]
async fn completion_errors_propagate() {
    let backend = Arc::new(ScriptedBackend::new(ProviderKind::Groq).fail(
        CompletionError::RateLimited {
            provider: ProviderKind::Groq,
            message: "slow down".into(),
        },
    ));
    let err = evaluator(backend).evaluate("joke").await.unwrap_err();
    assert!(matches!(err, CompletionError::RateLimited { .. }));
}

#[tokio::test]
async fn reported_usage_is_carried_with_feedback() {
    let usage = TokenUsage {
        prompt_tokens: 210,
        completion_tokens: 64,
    };
    let backend = Arc::new(
        ScriptedBackend::new(ProviderKind::Groq)
            .with_usage(usage)
            .respond(GOOD_JSON),
    );
    let critique = evaluator(backend).evaluate("joke").await.unwrap();
    assert_eq!(critique.usage, Some(usage));
    assert_eq!(critique.feedback.score(), 78);
}
