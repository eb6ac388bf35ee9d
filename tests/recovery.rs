//! 结构化输出恢复集成测试

use serde_json::json;

use dcia::translation::client::CircuitState;
use dcia::translation::{
    recover, Correction, OllamaClient, StructuredOutput, TranslationError,
};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{fast_config, MockOllama, MockReply};

#[tokio::test]
async fn test_correction_from_fenced_reply() {
    let reply = "Voici le résultat :\n```json\n{\"corrected_text\": \"X\", \"explanations\": [\"e1\"]}\n```\nBonne journée.";
    let backend = MockOllama::start(vec![], MockReply::text(reply)).await;
    let client = OllamaClient::new(fast_config(&backend.base_url)).unwrap();

    let correction = client.correct("x", None).await.unwrap();

    assert_eq!(
        correction,
        Correction {
            corrected_text: "X".to_string(),
            explanations: vec!["e1".to_string()],
        }
    );
    assert_eq!(backend.request_count(), 1);
    println!("✅ 代码块中的校对结果已恢复");
}

#[tokio::test]
async fn test_reformulation_with_raw_newlines() {
    let reply = "{\"reformulated_text\": \"Ligne un\nLigne deux\", \"highlights\": \"plus clair\"}";
    let backend = MockOllama::start(vec![], MockReply::text(reply)).await;
    let client = OllamaClient::new(fast_config(&backend.base_url)).unwrap();

    let reformulation = client.reformulate("texte", None).await.unwrap();

    assert_eq!(reformulation.reformulated_text, "Ligne un\nLigne deux");
    assert_eq!(reformulation.highlights, vec!["plus clair".to_string()]);
    assert_eq!(reformulation.primary_text(), "Ligne un\nLigne deux");
}

#[tokio::test]
async fn test_summary_wrapped_in_prose() {
    let reply = r#"Compte rendu : {"summary": "Réunion courte", "decisions": ["Valider {budget}"], "action_items": []} Fin."#;
    let backend = MockOllama::start(vec![], MockReply::text(reply)).await;
    let client = OllamaClient::new(fast_config(&backend.base_url)).unwrap();

    let summary = client.summarize("notes", None).await.unwrap();

    assert_eq!(summary.summary, "Réunion courte");
    assert_eq!(summary.decisions, vec!["Valider {budget}".to_string()]);
    assert!(summary.action_items.is_empty());
}

#[tokio::test]
async fn test_unrecoverable_reply_is_not_a_backend_failure() {
    let backend = MockOllama::start(vec![], MockReply::text("Désolé, je ne peux pas.")).await;
    let client = OllamaClient::new(fast_config(&backend.base_url)).unwrap();

    let error = client.correct("x", None).await.unwrap_err();

    match error {
        TranslationError::MalformedStructuredOutput { snippet, .. } => {
            assert!(snippet.contains("Désolé"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    // 生成调用本身成功，不重试
    assert_eq!(backend.request_count(), 1);
    assert_eq!(client.breaker().state(), CircuitState::Closed);
    assert_eq!(client.breaker().consecutive_failures(), 0);
}

#[test]
fn test_recovery_is_idempotent_on_valid_objects() {
    let samples = vec![
        json!({"corrected_text": "Bonjour", "explanations": []}),
        json!({"summary": "a \"quoted\" {brace}", "decisions": ["d"], "action_items": ["a1", "a2"]}),
        json!({"nested": {"list": [1, 2, {"k": null}]}, "flag": true}),
    ];

    for sample in samples {
        let compact = serde_json::to_string(&sample).unwrap();
        let pretty = serde_json::to_string_pretty(&sample).unwrap();
        assert_eq!(recover(&compact).unwrap(), sample);
        assert_eq!(recover(&pretty).unwrap(), sample);
    }
}

#[test]
fn test_non_object_values_are_rejected() {
    assert!(recover("[1, 2, 3]").is_err());
    assert!(recover("\"texte\"").is_err());
    assert!(Correction::from_raw("42").is_err());
}
