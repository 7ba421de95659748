//! End-to-end relay scenarios against the public test doubles

use engine_relay::cache::PromptCache;
use engine_relay::domain::citations::format_citations;
use engine_relay::domain::{ChatRequest, ConnectionId, EngineId, MessageText, UsageSummary};
use engine_relay::providers::{ProviderError, ProviderEvent};
use engine_relay::relay::test_support::{
    CountingConfigStore, RecordingSink, RecordingUsageTracker, ScriptedProvider,
};
use engine_relay::relay::{OutboundMessage, RelayError, RelayService, TurnState};
use std::sync::Arc;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(3600);

fn engine(id: &str) -> EngineId {
    EngineId::try_new(id.to_string()).unwrap()
}

fn request(engine_id: &str) -> ChatRequest {
    ChatRequest::new(
        ConnectionId::try_new("conn-scenario".to_string()).unwrap(),
        MessageText::try_new("Summarize today's news".to_string()).unwrap(),
        engine(engine_id),
    )
}

fn relay(provider: ScriptedProvider, sink: Arc<RecordingSink>) -> RelayService {
    let store = Arc::new(CountingConfigStore::with_engines(["T5"]));
    RelayService::new(
        Arc::new(PromptCache::new(store, TTL)),
        Arc::new(provider),
        sink,
        Arc::new(RecordingUsageTracker::default()),
    )
}

fn script(fragments: &[&str], usage: UsageSummary) -> Vec<Result<ProviderEvent, ProviderError>> {
    fragments
        .iter()
        .map(|f| Ok(ProviderEvent::Delta(f.to_string())))
        .chain(std::iter::once(Ok(ProviderEvent::Completed(usage))))
        .collect()
}

#[tokio::test]
async fn scenario_a_second_lookup_within_ttl_is_served_from_cache() {
    let store = Arc::new(CountingConfigStore::with_engines(["T5"]));
    let cache = PromptCache::new(store.clone(), TTL);

    let first = cache.get(&engine("T5")).await.unwrap();
    assert_eq!(store.fetch_count(), 1);

    let second = cache.get(&engine("T5")).await.unwrap();
    assert_eq!(store.fetch_count(), 1);
    assert_eq!(first, second);
}

#[test]
fn scenario_b_repeated_url_becomes_one_footnote() {
    let formatted = format_citations("see https://ytn.co.kr/x and https://ytn.co.kr/x");

    assert!(formatted.starts_with("see [1] and [1]"));
    assert!(!formatted.contains("[2]"));
    assert_eq!(formatted.matches("https://ytn.co.kr/x").count(), 1);
}

#[tokio::test]
async fn scenario_c_fragments_are_relayed_in_order_then_chat_end() {
    let sink = Arc::new(RecordingSink::new());
    let service = relay(
        ScriptedProvider::new(script(&["Hello", ", ", "world"], UsageSummary::new(10, 5, 0, 0))),
        sink.clone(),
    );

    let outcome = service.handle_turn(request("T5")).await;

    assert!(outcome.is_completed());
    assert_eq!(outcome.final_state(), TurnState::Done);

    let messages = sink.messages();
    assert_eq!(
        sink.kinds(),
        vec!["ai_start", "ai_chunk", "ai_chunk", "ai_chunk", "chat_end"]
    );

    let chunks: Vec<(String, u32)> = messages
        .iter()
        .filter_map(|m| match m {
            OutboundMessage::AiChunk { chunk, chunk_index } => Some((chunk.clone(), *chunk_index)),
            _ => None,
        })
        .collect();
    assert_eq!(
        chunks,
        vec![
            ("Hello".to_string(), 0),
            (", ".to_string(), 1),
            ("world".to_string(), 2)
        ]
    );

    match messages.last() {
        Some(OutboundMessage::ChatEnd { total_chunks, .. }) => assert_eq!(*total_chunks, 3),
        other => panic!("expected chat_end, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_d_provider_error_mid_stream_ends_with_one_error() {
    let sink = Arc::new(RecordingSink::new());
    let service = relay(
        ScriptedProvider::new(vec![
            Ok(ProviderEvent::Delta("partial".to_string())),
            Err(ProviderError::Upstream("model crashed".to_string())),
        ]),
        sink.clone(),
    );

    let outcome = service.handle_turn(request("T5")).await;

    assert!(!outcome.is_completed());
    assert!(matches!(outcome.error(), Some(RelayError::Provider(_))));
    assert_eq!(sink.kinds(), vec!["ai_start", "ai_chunk", "error"]);
    assert!(matches!(
        &sink.messages()[1],
        OutboundMessage::AiChunk { chunk_index: 0, .. }
    ));
}

#[tokio::test]
async fn scenario_e_gone_connection_receives_nothing_further() {
    // attempt 1 is ai_start, attempt 2 the first fragment
    let sink = Arc::new(RecordingSink::new().gone_on_send(2));
    let service = relay(
        ScriptedProvider::new(script(&["one", "two", "three"], UsageSummary::new(1, 3, 0, 0))),
        sink.clone(),
    );

    let outcome = service.handle_turn(request("T5")).await;

    assert!(matches!(outcome.error(), Some(RelayError::ConnectionGone(_))));
    assert_eq!(sink.kinds(), vec!["ai_start"]);
    assert_eq!(sink.attempts(), 2);
}

#[tokio::test]
async fn slow_reader_still_receives_every_message_and_chat_end() {
    use engine_relay::relay::ConnectionRegistry;

    let fragments: Vec<String> = (0..20).map(|i| format!("f{i} ")).collect();
    let fragment_refs: Vec<&str> = fragments.iter().map(String::as_str).collect();

    let registry = Arc::new(ConnectionRegistry::new());
    let connection_id = ConnectionId::try_new("conn-scenario".to_string()).unwrap();
    let mut outbound = registry.register(connection_id, 4);

    let reader = tokio::spawn(async move {
        let mut received = Vec::new();
        while let Some(message) = outbound.recv().await {
            received.push(message.kind());
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        received
    });

    let store = Arc::new(CountingConfigStore::with_engines(["T5"]));
    let service = RelayService::new(
        Arc::new(PromptCache::new(store, TTL)),
        Arc::new(ScriptedProvider::new(script(
            &fragment_refs,
            UsageSummary::new(10, 20, 0, 0),
        ))),
        registry.clone(),
        Arc::new(RecordingUsageTracker::default()),
    );

    let outcome = service.handle_turn(request("T5")).await;
    assert!(outcome.is_completed(), "{:?}", outcome.error());

    registry.unregister(&ConnectionId::try_new("conn-scenario".to_string()).unwrap());
    let received = reader.await.unwrap();

    assert_eq!(received.len(), 22);
    assert_eq!(received.first(), Some(&"ai_start"));
    assert_eq!(received.last(), Some(&"chat_end"));
    assert!(!received.contains(&"error"));
}
