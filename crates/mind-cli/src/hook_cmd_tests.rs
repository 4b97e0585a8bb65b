use super::*;
use serde_json::json;

fn tool_event(tool: &str, tool_input: Value, tool_response: Value) -> HookInput {
    HookInput {
        session_id: Some("host-1".to_string()),
        cwd: None,
        tool_name: Some(tool.to_string()),
        tool_input,
        tool_response,
    }
}

fn observation_at(obs_type: ObservationType, summary: &str, timestamp: i64) -> Observation {
    Observation {
        id: String::new(),
        timestamp,
        obs_type,
        tool: None,
        summary: summary.to_string(),
        content: String::new(),
        metadata: Metadata::new(),
    }
}

#[test]
fn test_parse_hook_input_tolerates_empty_and_malformed() {
    assert!(parse_hook_input("").tool_name.is_none());
    assert!(parse_hook_input("{not json").tool_name.is_none());

    let parsed = parse_hook_input(
        r#"{"session_id":"abc","cwd":"/repo","hook_event_name":"PostToolUse","tool_name":"Bash","tool_input":{"command":"ls"},"tool_response":{"stdout":"a\nb","stderr":""}}"#,
    );
    assert_eq!(parsed.session_id.as_deref(), Some("abc"));
    assert_eq!(parsed.cwd, Some(PathBuf::from("/repo")));
    assert_eq!(parsed.tool_name.as_deref(), Some("Bash"));
    assert_eq!(parsed.tool_input["command"], "ls");
}

#[test]
fn test_hook_output_shapes() {
    let plain = serde_json::to_value(HookOutput::proceed()).unwrap();
    assert_eq!(plain, json!({"continue": true}));

    let with_context = HookOutput::with_context(HookEvent::SessionStart, "ctx".to_string());
    assert_eq!(
        serde_json::to_value(with_context).unwrap(),
        json!({
            "continue": true,
            "hookSpecificOutput": {
                "hookEventName": "SessionStart",
                "additionalContext": "ctx"
            }
        })
    );
}

#[test]
fn test_response_text_shapes() {
    assert_eq!(response_text(&Value::Null), "");
    assert_eq!(response_text(&json!("plain")), "plain");
    assert_eq!(
        response_text(&json!({"stdout": "out", "stderr": "err"})),
        "out\nerr"
    );
    assert_eq!(response_text(&json!({"stdout": "", "stderr": "only err"})), "only err");
    assert_eq!(
        response_text(&json!({"type": "text", "file": {"filePath": "/a.rs", "content": "fn a() {}"}})),
        "fn a() {}"
    );
    let listing = json!({"filenames": ["a.rs"], "numFiles": 1});
    assert_eq!(response_text(&listing), listing.to_string());
}

#[test]
fn test_tool_summary_per_tool() {
    assert_eq!(
        tool_summary("Read", &json!({"file_path": "/repo/src/lib.rs"}), ""),
        "Read lib.rs"
    );
    assert_eq!(
        tool_summary("Edit", &json!({"file_path": "/repo/src/lib.rs"}), ""),
        "Edited lib.rs"
    );
    assert_eq!(
        tool_summary("Bash", &json!({"command": "cargo test\n--all"}), ""),
        "Ran: cargo test"
    );
    assert_eq!(
        tool_summary("Grep", &json!({"pattern": "MindStore"}), ""),
        "Searched for MindStore"
    );
    assert_eq!(
        tool_summary("WebFetch", &json!({}), "\n  Fetched page title\nmore"),
        "WebFetch: Fetched page title"
    );
    let long = tool_summary("Bash", &json!({"command": "x".repeat(200)}), "");
    assert_eq!(long.chars().count(), SUMMARY_MAX_CHARS);
}

#[test]
fn test_observation_for_tool_use_compresses_and_classifies() {
    let mut log: String = (0..200).map(|idx| format!("  compiling crate_{idx}\n")).collect();
    log.push_str("error[E0308]: mismatched types\n");
    let event = tool_event(
        "Bash",
        json!({"command": "cargo build"}),
        json!({"stdout": log, "stderr": ""}),
    );

    let observation = observation_for_tool_use(&event, &MindConfig::default()).unwrap();
    assert_eq!(observation.obs_type, ObservationType::Problem);
    assert_eq!(observation.tool.as_deref(), Some("Bash"));
    assert_eq!(observation.summary, "Ran: cargo build");
    assert!(observation.content.chars().count() <= mind_compress::TARGET_CEILING);

    let metadata = observation.metadata.unwrap();
    assert_eq!(metadata["compressed"].as_bool(), Some(true));
    assert_eq!(metadata[HOST_SESSION_KEY].as_str(), Some("host-1"));
    assert!(metadata["original_size"].as_i64().unwrap() > 3000);
}

#[test]
fn test_observation_for_tool_use_without_auto_compress_keeps_output() {
    let output = "y".repeat(5000);
    let event = tool_event("Read", json!({"file_path": "/r/a.txt"}), json!(output.clone()));
    let config = MindConfig {
        auto_compress: false,
        ..MindConfig::default()
    };

    let observation = observation_for_tool_use(&event, &config).unwrap();
    assert_eq!(observation.content, output);
    let metadata = observation.metadata.unwrap();
    assert!(!metadata.contains_key("compressed"));
    assert_eq!(metadata["file_path"].as_str(), Some("/r/a.txt"));
}

#[test]
fn test_observation_for_tool_use_skips_noise() {
    let config = MindConfig::default();
    let empty = tool_event("Bash", json!({"command": "true"}), json!({"stdout": "", "stderr": ""}));
    assert!(observation_for_tool_use(&empty, &config).is_none());

    let internal = tool_event("TodoWrite", json!({}), json!("updated todos"));
    assert!(observation_for_tool_use(&internal, &config).is_none());

    let nameless = HookInput {
        tool_response: json!("output"),
        ..HookInput::default()
    };
    assert!(observation_for_tool_use(&nameless, &config).is_none());
}

#[test]
fn test_build_session_summary() {
    let observations = vec![
        observation_at(ObservationType::Decision, "use flock", 2_000),
        observation_at(ObservationType::Problem, "lock timeout", 1_000),
        observation_at(ObservationType::Decision, "keep 3 backups", 3_000),
    ];
    let summary = build_session_summary(
        "host-1".to_string(),
        &observations,
        vec!["src/lib.rs".to_string()],
        9_000,
    );

    assert_eq!(summary.id, "host-1");
    assert_eq!(summary.start_time, 1_000);
    assert_eq!(summary.end_time, 9_000);
    assert_eq!(summary.observation_count, 3);
    assert_eq!(summary.key_decisions, ["use flock", "keep 3 backups"]);
    assert_eq!(
        summary.summary,
        "Session with 3 observations (2 decision, 1 problem); 1 files modified"
    );
}

#[test]
fn test_build_session_summary_without_observations() {
    let summary = build_session_summary("s".to_string(), &[], vec!["a".to_string()], 42);
    assert_eq!(summary.start_time, 42);
    assert_eq!(summary.summary, "Session with 0 observations; 1 files modified");
}
