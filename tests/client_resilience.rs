//! 生成客户端韧性测试
//!
//! 使用进程内模拟后端验证重试、退避、熔断、请求构造和流式响应

use futures::StreamExt;

use dcia::translation::client::{CircuitState, TaskPrompt};
use dcia::translation::{OllamaClient, TranslationConfig, TranslationError};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{fast_config, MockOllama, MockReply};

fn client_with(config: TranslationConfig) -> OllamaClient {
    OllamaClient::new(config).unwrap()
}

#[tokio::test]
async fn test_retry_then_success_counts_one_net_success() {
    let backend = MockOllama::start(
        vec![MockReply::Status(500)],
        MockReply::text("  Hello world  "),
    )
    .await;
    let client = client_with(fast_config(&backend.base_url));

    let translated = client.translate("Bonjour le monde", "fr", "en", None).await.unwrap();

    assert_eq!(translated, "Hello world");
    assert_eq!(backend.request_count(), 2);
    let snapshot = client.breaker().snapshot();
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.consecutive_failures, 0);
    assert!(snapshot.last_failure.is_none());
    println!("✅ 第一次失败后重试成功，熔断器只记录一次成功");
}

#[tokio::test]
async fn test_exhausted_retries_record_single_failure() {
    let backend = MockOllama::start(vec![], MockReply::Status(503)).await;
    let client = client_with(fast_config(&backend.base_url));

    let error = client.translate("Bonjour", "fr", "en", None).await.unwrap_err();

    match error {
        TranslationError::RetriesExhausted { attempts, last_error } => {
            assert_eq!(attempts, 3);
            assert!(last_error.contains("503"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(backend.request_count(), 3);
    assert_eq!(client.breaker().consecutive_failures(), 1);
}

#[tokio::test]
async fn test_empty_response_is_retried() {
    let backend = MockOllama::start(vec![MockReply::text("   ")], MockReply::text("ok")).await;
    let client = client_with(fast_config(&backend.base_url));

    assert_eq!(client.translate("Bonjour", "fr", "en", None).await.unwrap(), "ok");
    assert_eq!(backend.request_count(), 2);
}

#[tokio::test]
async fn test_open_breaker_fails_fast_without_network() {
    let backend = MockOllama::start(vec![], MockReply::Status(500)).await;
    let config = TranslationConfig {
        max_retries: 1,
        failure_threshold: 2,
        ..fast_config(&backend.base_url)
    };
    let client = client_with(config);

    for _ in 0..2 {
        let error = client.translate("Bonjour", "fr", "en", None).await.unwrap_err();
        assert!(matches!(error, TranslationError::RetriesExhausted { .. }));
    }
    assert_eq!(client.breaker().state(), CircuitState::Open);

    let error = client.translate("Bonjour", "fr", "en", None).await.unwrap_err();
    assert!(matches!(error, TranslationError::BackendUnavailable(_)));
    assert_eq!(backend.request_count(), 2);
    println!("✅ 熔断器打开后不再发起请求");
}

#[tokio::test]
async fn test_unsupported_pair_makes_no_request() {
    let backend = MockOllama::start(vec![], MockReply::text("unused")).await;
    let client = client_with(fast_config(&backend.base_url));

    let error = client.translate("Hallo", "de", "en", None).await.unwrap_err();
    assert!(matches!(error, TranslationError::UnsupportedLanguagePair { .. }));
    let error = client.translate("Hello", "en", "en", None).await.unwrap_err();
    assert!(matches!(error, TranslationError::UnsupportedLanguagePair { .. }));

    assert_eq!(backend.request_count(), 0);
}

#[tokio::test]
async fn test_request_shape_follows_model_tier() {
    let backend = MockOllama::start(vec![], MockReply::text("Hello")).await;
    let client = client_with(fast_config(&backend.base_url));

    client.translate("Bonjour", "fr", "en", None).await.unwrap();
    client
        .translate("Bonjour", "fr", "en", Some("gemma2:2b"))
        .await
        .unwrap();

    let requests = backend.requests();
    let standard = &requests[0];
    assert_eq!(standard["model"], "mistral-small:latest");
    assert_eq!(standard["prompt"], "Bonjour");
    assert_eq!(standard["stream"], false);
    assert!(standard["system"].as_str().unwrap().contains("French text to English"));
    assert!((standard["options"]["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);

    let reduced = &requests[1];
    assert_eq!(reduced["model"], "gemma2:2b");
    assert!(reduced.get("system").is_none());
    assert!(reduced.get("options").is_none());
    let prompt = reduced["prompt"].as_str().unwrap();
    assert!(prompt.starts_with("You are a translator."));
    assert!(prompt.ends_with("\n\nBonjour"));
}

#[tokio::test]
async fn test_streaming_collects_fragments() {
    let backend = MockOllama::start(
        vec![MockReply::stream(&["Hel", "lo ", "world"])],
        MockReply::Status(500),
    )
    .await;
    let client = client_with(fast_config(&backend.base_url));

    let prompt = TaskPrompt::translate("Bonjour le monde", "fr", "en").unwrap();
    let request = client.build_request(&prompt, None);
    let mut stream = client.generate_stream(request).await.unwrap();

    let mut fragments = Vec::new();
    while let Some(fragment) = stream.next().await {
        fragments.push(fragment.unwrap());
    }
    assert_eq!(fragments.concat(), "Hello world");
    assert!(stream.is_finished());
    drop(stream);

    assert_eq!(backend.requests()[0]["stream"], true);
    assert_eq!(client.breaker().state(), CircuitState::Closed);
    assert_eq!(client.breaker().consecutive_failures(), 0);
}

#[tokio::test]
async fn test_streaming_http_error_is_not_retried() {
    let backend = MockOllama::start(vec![], MockReply::Status(500)).await;
    let client = client_with(fast_config(&backend.base_url));

    let prompt = TaskPrompt::translate("Bonjour", "fr", "en").unwrap();
    let result = client.generate_stream(client.build_request(&prompt, None)).await;

    assert!(matches!(result, Err(TranslationError::TransientBackendFailure(_))));
    assert_eq!(backend.request_count(), 1);
    assert_eq!(client.breaker().consecutive_failures(), 1);
}

#[tokio::test]
async fn test_batch_translation_keeps_positions() {
    let backend = MockOllama::start(
        vec![
            MockReply::text("One"),
            MockReply::Status(500),
            MockReply::text("Three"),
        ],
        MockReply::text("unused"),
    )
    .await;
    let config = TranslationConfig {
        max_retries: 1,
        ..fast_config(&backend.base_url)
    };
    let client = client_with(config);

    let texts = vec!["Un".to_string(), "Deux".to_string(), "Trois".to_string()];
    let results = client.translate_batch(&texts, "fr", "en", None, Some(2)).await;

    assert_eq!(
        results,
        vec![Some("One".to_string()), None, Some("Three".to_string())]
    );
}

#[tokio::test]
async fn test_models_and_health() {
    let backend = MockOllama::start_with_models(
        vec![],
        MockReply::text("unused"),
        vec!["llama3:8b", "mistral-small:latest", "llama3:8b", " "],
    )
    .await;
    let client = client_with(fast_config(&backend.base_url));

    assert!(client.check_health().await);
    assert_eq!(
        client.list_models().await,
        vec!["llama3:8b".to_string(), "mistral-small:latest".to_string()]
    );
    assert_eq!(
        client.available_models().await,
        vec!["mistral-small:latest".to_string(), "llama3:8b".to_string()]
    );
}

#[tokio::test]
async fn test_unreachable_backend() {
    let client = client_with(fast_config("http://127.0.0.1:9"));

    assert!(!client.check_health().await);
    assert!(client.list_models().await.is_empty());
    assert_eq!(client.available_models().await, vec!["mistral-small:latest".to_string()]);
}
