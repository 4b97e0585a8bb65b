use super::*;
use tempfile::{TempDir, tempdir};

fn test_config(dir: &TempDir) -> MindConfig {
    MindConfig {
        memory_path: dir.path().join(".claude").join("mind.mv2"),
        ..MindConfig::default()
    }
}

async fn open_store(config: MindConfig) -> MindStore {
    MindStore::open_with(config, &FrameFileBackend).await.unwrap()
}

fn frame(title: &str, label: &str, metadata: Metadata) -> Frame {
    Frame {
        frame_id: 7,
        created_at: 1_700_000_000,
        title: title.to_string(),
        label: label.to_string(),
        text: "body".to_string(),
        metadata,
        tags: Vec::new(),
    }
}

#[tokio::test]
async fn test_open_creates_directory_and_file() {
    let dir = tempdir().unwrap();
    let config = test_config(&dir);
    let store = open_store(config.clone()).await;

    assert!(store.is_initialized());
    assert!(config.memory_path.exists());
    assert_eq!(store.memory_path(), config.memory_path.as_path());
    assert_eq!(store.session_id().len(), 26);
    assert!(dir.path().join(".claude/mind.mv2.lock").exists());
}

#[tokio::test]
async fn test_each_open_gets_a_fresh_session_id() {
    let dir = tempdir().unwrap();
    let first = open_store(test_config(&dir)).await;
    let second = open_store(test_config(&dir)).await;
    assert_ne!(first.session_id(), second.session_id());
}

#[tokio::test]
async fn test_remember_then_search_finds_observation() {
    let dir = tempdir().unwrap();
    let store = open_store(test_config(&dir)).await;

    let input = ObservationInput::new(
        ObservationType::Problem,
        "Lock timeout in hook",
        "the sidecar lock stayed busy for 30 seconds",
    )
    .with_tool("Bash")
    .with_metadata([("host_session_id".to_string(), MetadataValue::from("abc"))].into());
    let id = store.remember(input).await.unwrap();
    assert_eq!(id, "1");

    let results = store.search("sidecar", None).await.unwrap();
    assert_eq!(results.len(), 1);
    let observation = &results[0].observation;
    assert_eq!(observation.obs_type, ObservationType::Problem);
    assert_eq!(observation.summary, "Lock timeout in hook");
    assert_eq!(observation.tool.as_deref(), Some("Bash"));
    assert_eq!(observation.id.len(), 26);
    assert_eq!(
        observation.metadata[SESSION_ID_KEY].as_str(),
        Some(store.session_id())
    );
    assert_eq!(observation.metadata["host_session_id"].as_str(), Some("abc"));
    assert!(!observation.metadata.contains_key(OBSERVATION_ID_KEY));
    assert!(observation.timestamp > SECONDS_THRESHOLD);
    assert!(results[0].snippet.contains("sidecar"));
}

#[tokio::test]
async fn test_non_finite_metadata_keeps_observation_visible() {
    let dir = tempdir().unwrap();
    let store = open_store(test_config(&dir)).await;

    let input = ObservationInput::new(ObservationType::Discovery, "ratio sample", "nanratio body")
        .with_metadata([("ratio".to_string(), MetadataValue::Float(f64::NAN))].into());
    assert_eq!(store.remember(input).await.unwrap(), "1");
    let next = ObservationInput::new(ObservationType::Discovery, "follow up", "second body");
    assert_eq!(store.remember(next).await.unwrap(), "2");

    let results = store.search("nanratio", None).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].observation.metadata["ratio"].as_str(), Some("NaN"));
    assert_eq!(store.stats().await.unwrap().total_observations, 2);
}

#[tokio::test]
async fn test_search_respects_limit() {
    let dir = tempdir().unwrap();
    let store = open_store(test_config(&dir)).await;
    for idx in 0..15 {
        store
            .remember(ObservationInput::new(
                ObservationType::Discovery,
                format!("cache note {idx}"),
                "cache layout",
            ))
            .await
            .unwrap();
    }

    assert_eq!(store.search("cache", None).await.unwrap().len(), DEFAULT_SEARCH_LIMIT);
    assert_eq!(store.search("cache", Some(3)).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_ask_falls_back_when_nothing_matches() {
    let dir = tempdir().unwrap();
    let store = open_store(test_config(&dir)).await;
    assert_eq!(store.ask("what broke?").await.unwrap(), NO_ANSWER);

    store
        .remember(ObservationInput::new(
            ObservationType::Decision,
            "use flock",
            "flock chosen over lockfiles",
        ))
        .await
        .unwrap();
    let answer = store.ask("flock").await.unwrap();
    assert!(answer.contains("[decision] use flock"));
}

#[tokio::test]
async fn test_get_context_returns_newest_first_within_limit() {
    let dir = tempdir().unwrap();
    let config = MindConfig {
        max_context_observations: 3,
        ..test_config(&dir)
    };
    let store = open_store(config).await;
    for idx in 0..5 {
        store
            .remember(ObservationInput::new(
                ObservationType::Discovery,
                format!("note {idx}"),
                "x",
            ))
            .await
            .unwrap();
    }

    let context = store.get_context(None).await.unwrap();
    let summaries: Vec<&str> = context
        .recent_observations
        .iter()
        .map(|observation| observation.summary.as_str())
        .collect();
    assert_eq!(summaries, ["note 4", "note 3", "note 2"]);
    assert!(context.relevant_memories.is_empty());
    assert!(context.session_summaries.is_empty());
}

#[tokio::test]
async fn test_get_context_token_budget_excludes_overflowing_entry() {
    let dir = tempdir().unwrap();
    // "[discovery] " is 12 chars; a 28-char summary makes 40 chars = 10 tokens.
    let config = MindConfig {
        max_context_tokens: 25,
        ..test_config(&dir)
    };
    let store = open_store(config).await;
    for idx in 0..4 {
        store
            .remember(ObservationInput::new(
                ObservationType::Discovery,
                format!("{idx}{}", "s".repeat(27)),
                "x",
            ))
            .await
            .unwrap();
    }

    let context = store.get_context(None).await.unwrap();
    assert_eq!(context.recent_observations.len(), 2);
    assert_eq!(context.token_count, 20);
    assert!(context.token_count <= 25);
}

#[tokio::test]
async fn test_get_context_with_query_adds_relevant_memories() {
    let dir = tempdir().unwrap();
    let store = open_store(test_config(&dir)).await;
    store
        .remember(ObservationInput::new(ObservationType::Bugfix, "fixed parser", "parser panic"))
        .await
        .unwrap();
    store
        .remember(ObservationInput::new(ObservationType::Feature, "added cli", "new command"))
        .await
        .unwrap();

    let context = store.get_context(Some("parser")).await.unwrap();
    assert_eq!(context.recent_observations.len(), 2);
    assert_eq!(context.relevant_memories.len(), 1);
    assert_eq!(context.relevant_memories[0].summary, "fixed parser");

    let blank = store.get_context(Some("   ")).await.unwrap();
    assert!(blank.relevant_memories.is_empty());
}

#[tokio::test]
async fn test_save_session_summary_stores_json_text() {
    let dir = tempdir().unwrap();
    let store = open_store(test_config(&dir)).await;
    let summary = SessionSummary {
        id: store.session_id().to_string(),
        start_time: 1_700_000_000_000,
        end_time: 1_700_000_600_000,
        observation_count: 4,
        key_decisions: vec!["use flock".to_string()],
        files_modified: vec!["src/lib.rs".to_string()],
        summary: "Worked on locking\nand tests".to_string(),
    };

    let id = store.save_session_summary(&summary).await.unwrap();
    assert_eq!(id, "1");

    let context = store.get_context(None).await.unwrap();
    let stored = &context.recent_observations[0];
    assert_eq!(stored.obs_type, ObservationType::Session);
    assert_eq!(stored.summary, "Worked on locking");
    assert_eq!(stored.timestamp, summary.end_time);
    let decoded: SessionSummary = serde_json::from_str(&stored.content).unwrap();
    assert_eq!(decoded, summary);
}

#[tokio::test]
async fn test_stats_counts_types_sessions_and_range() {
    let dir = tempdir().unwrap();
    let config = test_config(&dir);
    let first = open_store(config.clone()).await;
    first
        .remember(ObservationInput::new(ObservationType::Problem, "a", "x"))
        .await
        .unwrap();
    first
        .remember(ObservationInput::new(ObservationType::Problem, "b", "x"))
        .await
        .unwrap();
    let second = open_store(config).await;
    second
        .remember(ObservationInput::new(ObservationType::Success, "c", "x"))
        .await
        .unwrap();

    let stats = second.stats().await.unwrap();
    assert_eq!(stats.total_observations, 3);
    assert_eq!(stats.total_sessions, 2);
    assert_eq!(stats.observations_by_type[&ObservationType::Problem], 2);
    assert_eq!(stats.observations_by_type[&ObservationType::Success], 1);
    assert!(stats.file_size > 0);
    assert!(stats.oldest_memory.unwrap() <= stats.newest_memory.unwrap());
}

#[tokio::test]
async fn test_stats_on_empty_store() {
    let dir = tempdir().unwrap();
    let store = open_store(test_config(&dir)).await;
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_observations, 0);
    assert_eq!(stats.total_sessions, 0);
    assert!(stats.oldest_memory.is_none());
    assert!(stats.observations_by_type.is_empty());
}

#[test]
fn test_observation_from_frame_uses_stored_fields() {
    let metadata: Metadata = [
        (OBSERVATION_ID_KEY.to_string(), MetadataValue::from("01HZX")),
        (OBSERVATION_TYPE_KEY.to_string(), MetadataValue::from("warning")),
        (TIMESTAMP_KEY.to_string(), MetadataValue::from(1_700_000_000_123_i64)),
        (TOOL_KEY.to_string(), MetadataValue::from("Read")),
        (SESSION_ID_KEY.to_string(), MetadataValue::from("s1")),
    ]
    .into();
    let observation = observation_from_frame(&frame("[warning] deprecated api", "discovery", metadata));

    assert_eq!(observation.id, "01HZX");
    assert_eq!(observation.obs_type, ObservationType::Warning);
    assert_eq!(observation.timestamp, 1_700_000_000_123);
    assert_eq!(observation.tool.as_deref(), Some("Read"));
    assert_eq!(observation.summary, "deprecated api");
    assert_eq!(observation.metadata.len(), 1);
}

#[test]
fn test_observation_from_frame_falls_back_to_frame_fields() {
    let observation = observation_from_frame(&frame("imported note", "refactor", Metadata::new()));

    assert_eq!(observation.id, "7");
    assert_eq!(observation.obs_type, ObservationType::Refactor);
    assert_eq!(observation.timestamp, 1_700_000_000_000);
    assert_eq!(observation.summary, "");
    assert!(observation.tool.is_none());

    let unknown = observation_from_frame(&frame("[x] y", "mystery", Metadata::new()));
    assert_eq!(unknown.obs_type, ObservationType::Discovery);
    assert_eq!(unknown.summary, "y");
}

#[test]
fn test_normalize_timestamp() {
    assert_eq!(normalize_timestamp(1_700_000_000), 1_700_000_000_000);
    assert_eq!(normalize_timestamp(1_700_000_000_000), 1_700_000_000_000);
    assert_eq!(normalize_timestamp(0), 0);
}

#[test]
fn test_fit_token_budget_stops_at_first_overflow() {
    let make = |summary: &str| Observation {
        id: String::new(),
        timestamp: 0,
        obs_type: ObservationType::Success,
        tool: None,
        summary: summary.to_string(),
        content: String::new(),
        metadata: Metadata::new(),
    };
    // "[success] " + 6 chars = 16 chars = 4 tokens; + 30 chars = 40 chars = 10 tokens.
    let observations = vec![make("short1"), make(&"l".repeat(30)), make("short2")];
    assert_eq!(estimate_tokens(&observations[0]), 4);
    assert_eq!(estimate_tokens(&observations[1]), 10);

    let (kept, total) = fit_token_budget(observations, 12);
    assert_eq!(kept.len(), 1);
    assert_eq!(total, 4);
}
