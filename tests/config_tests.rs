//! Tiered configuration loading.

use bujo_migrate::config::{ConfigLoader, ConfigPaths, ConfigTier};
use std::fs;
use tempfile::TempDir;

fn env_from(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
    move |name| {
        pairs
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    }
}

#[test]
fn every_tier_contributes_in_order() {
    let user = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let explicit = TempDir::new().unwrap();

    fs::write(
        user.path().join("config.yaml"),
        "journal:\n  user: ana\n  lurker_threshold: 5\nserver:\n  port: 4000\n",
    )
    .unwrap();
    fs::write(
        project.path().join("config.yaml"),
        "journal:\n  lurker_threshold: 4\n",
    )
    .unwrap();
    let explicit_file = explicit.path().join("bujo.yaml");
    fs::write(&explicit_file, "journal:\n  strict_transitions: true\n").unwrap();

    let paths = ConfigPaths::with_dirs(
        Some(user.path().to_path_buf()),
        Some(project.path().to_path_buf()),
    )
    .with_explicit(Some(explicit_file.clone()));
    let loader = ConfigLoader::load_with_env(paths, env_from(&[("BUJO_PORT", "5050")])).unwrap();

    let config = loader.config();
    assert_eq!(config.journal.user.as_deref(), Some("ana"));
    assert_eq!(config.journal.lurker_threshold, 4);
    assert!(config.journal.strict_transitions);
    assert!(config.journal.reject_past_schedule);
    assert_eq!(config.server.port, 5050);

    let tiers: Vec<ConfigTier> = loader.sources().iter().map(|(tier, _)| *tier).collect();
    assert_eq!(
        tiers,
        [ConfigTier::User, ConfigTier::Project, ConfigTier::Explicit]
    );
    assert_eq!(loader.sources()[2].1, explicit_file);
}

#[test]
fn engine_options_follow_the_journal_section() {
    let project = TempDir::new().unwrap();
    fs::write(
        project.path().join("config.yaml"),
        "journal:\n  reject_past_schedule: false\n",
    )
    .unwrap();

    let paths = ConfigPaths::with_dirs(None, Some(project.path().to_path_buf()));
    let loader = ConfigLoader::load_with_env(
        paths,
        env_from(&[("BUJO_STRICT_TRANSITIONS", "yes")]),
    )
    .unwrap();

    let options = loader.config().journal.engine_options();
    assert!(options.strict_transitions);
    assert!(!options.reject_past_schedule);
}

#[test]
fn zero_thresholds_are_rejected() {
    let project = TempDir::new().unwrap();
    fs::write(
        project.path().join("config.yaml"),
        "journal:\n  suggestion_threshold: 0\n",
    )
    .unwrap();

    let paths = ConfigPaths::with_dirs(None, Some(project.path().to_path_buf()));
    let err = ConfigLoader::load_with_env(paths, env_from(&[])).unwrap_err();
    assert!(err.to_string().contains("suggestion_threshold"));
}
