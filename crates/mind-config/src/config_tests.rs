use super::*;
use std::fs;

#[test]
fn test_default_config() {
    let config = MindConfig::default();
    assert_eq!(config.memory_path, PathBuf::from(".claude/mind.mv2"));
    assert_eq!(config.max_context_observations, 20);
    assert_eq!(config.max_context_tokens, 2000);
    assert!(config.auto_compress);
    assert!((config.min_confidence - 0.6).abs() < f64::EPSILON);
    assert!(!config.debug);
}

#[test]
fn test_with_overrides_only_touches_set_fields() {
    let overrides = ConfigOverrides {
        max_context_tokens: Some(100),
        debug: Some(true),
        ..ConfigOverrides::default()
    };
    let config = MindConfig::default().with_overrides(&overrides);
    assert_eq!(config.max_context_tokens, 100);
    assert!(config.debug);
    assert_eq!(config.max_context_observations, 20);
    assert!(config.auto_compress);
}

#[test]
fn test_merge_higher_wins() {
    let lower = ConfigOverrides {
        max_context_tokens: Some(100),
        auto_compress: Some(false),
        ..ConfigOverrides::default()
    };
    let higher = ConfigOverrides {
        max_context_tokens: Some(300),
        ..ConfigOverrides::default()
    };
    let merged = lower.merge(higher);
    assert_eq!(merged.max_context_tokens, Some(300));
    assert_eq!(merged.auto_compress, Some(false));
}

#[test]
fn test_resolve_in_joins_relative_memory_path() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = MindConfig::resolve_in(temp.path(), &ConfigOverrides::default()).unwrap();
    assert_eq!(config.memory_path, temp.path().join(".claude/mind.mv2"));
}

#[test]
fn test_resolve_in_keeps_absolute_memory_path() {
    let temp = tempfile::tempdir().expect("tempdir");
    let absolute = temp.path().join("elsewhere/memory.mv2");
    let overrides = ConfigOverrides {
        memory_path: Some(absolute.clone()),
        ..ConfigOverrides::default()
    };
    let config = MindConfig::resolve_in(Path::new("/unused/root"), &overrides).unwrap();
    assert_eq!(config.memory_path, absolute);
}

#[test]
fn test_resolve_in_programmatic_overrides_beat_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::create_dir_all(temp.path().join(".claude")).unwrap();
    fs::write(
        temp.path().join(".claude/mind.toml"),
        "memory_path = \"data/shared.mv2\"\nmax_context_tokens = 64\n",
    )
    .unwrap();

    let overrides = ConfigOverrides {
        max_context_tokens: Some(128),
        ..ConfigOverrides::default()
    };
    let config = MindConfig::resolve_in(temp.path(), &overrides).unwrap();
    assert_eq!(config.memory_path, temp.path().join("data/shared.mv2"));
    assert_eq!(config.max_context_tokens, 128);
}

#[test]
fn test_validate_rejects_out_of_range_confidence() {
    let config = MindConfig {
        min_confidence: 1.5,
        ..MindConfig::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("min_confidence"));
}

#[test]
fn test_validate_rejects_empty_memory_path() {
    let config = MindConfig {
        memory_path: PathBuf::new(),
        ..MindConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_config_toml_roundtrip_defaults() {
    let parsed: MindConfig = toml::from_str("").unwrap();
    assert_eq!(parsed, MindConfig::default());
}
