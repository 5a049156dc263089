use pacer_common::{Config, ConfigError, GameData, SuiteKind, GAME_DATA_FIELDS};

const BUNDLED: &str = include_str!("../../../config/pacer.yaml");

#[test]
fn bundled_config_parses() {
    let config = Config::from_yaml_str(BUNDLED).expect("bundled config should be valid");

    assert_eq!(config.target.base_url, "https://localhost:7170");
    assert!(config.target.accept_invalid_certs);
    assert_eq!(config.dispatch.step_interval_ms, 1000);
    assert_eq!(config.dispatch.run_deadline_secs, Some(300));
    assert_eq!(
        config.scenario.suites,
        vec![SuiteKind::Smoke, SuiteKind::Average, SuiteKind::Spike]
    );
    assert_eq!(config.scenario.average_steps, vec![20, 40, 80, 15]);
    assert_eq!(config.scenario.spike.delete, 4000);
    assert_eq!(config.scenario.fixtures.create_payloads.len(), 3);
    assert_eq!(
        config.scenario.fixtures.update_records[0].id.as_deref(),
        Some("000582cf-0b3d-4855-9f5e-54d3be5443cb")
    );
}

#[test]
fn empty_mapping_falls_back_to_defaults() {
    let config = Config::from_yaml_str("{}").unwrap();

    assert_eq!(config.target.probe_path, "/gamedata");
    assert!(!config.target.accept_invalid_certs);
    assert_eq!(config.dispatch.cancel_grace_ms, 5000);
    assert_eq!(config.dispatch.run_deadline_secs, None);
    assert!(!config.metrics.enabled);
    assert_eq!(config.scenario.smoke_requests, 100);
    assert_eq!(config.scenario.spike.list, 750);
    assert_eq!(config.scenario.fixtures.missing_ids.len(), 3);
}

#[test]
fn partial_sections_keep_other_defaults() {
    let yaml = r#"
dispatch:
  step_interval_ms: 250
scenario:
  suites: [spike]
  spike:
    delete: 10
"#;
    let config = Config::from_yaml_str(yaml).unwrap();

    assert_eq!(config.dispatch.step_interval_ms, 250);
    assert_eq!(config.dispatch.cancel_grace_ms, 5000);
    assert_eq!(config.scenario.suites, vec![SuiteKind::Spike]);
    assert_eq!(config.scenario.spike.delete, 10);
    assert_eq!(config.scenario.spike.create, 300);
}

#[test]
fn negative_step_count_is_rejected_at_parse_time() {
    let yaml = "scenario:\n  average_steps: [20, -1]\n";
    let err = Config::from_yaml_str(yaml).unwrap_err();
    assert!(matches!(err, ConfigError::Yaml(_)), "got {:?}", err);
}

#[test]
fn unknown_suite_is_rejected() {
    let yaml = "scenario:\n  suites: [soak]\n";
    assert!(matches!(
        Config::from_yaml_str(yaml),
        Err(ConfigError::Yaml(_))
    ));
}

#[test]
fn zero_step_interval_is_invalid() {
    let yaml = "dispatch:\n  step_interval_ms: 0\n";
    assert!(matches!(
        Config::from_yaml_str(yaml),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn empty_base_url_is_invalid() {
    let yaml = "target:\n  base_url: \"\"\n";
    assert!(matches!(
        Config::from_yaml_str(yaml),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn empty_fixtures_are_invalid_when_suites_run() {
    let yaml = "scenario:\n  fixtures:\n    missing_ids: []\n";
    let err = Config::from_yaml_str(yaml).unwrap_err();
    assert!(err.to_string().contains("missing_ids"), "got {}", err);

    // Without suites nothing needs fixtures.
    let yaml = "scenario:\n  suites: []\n  fixtures:\n    missing_ids: []\n";
    assert!(Config::from_yaml_str(yaml).is_ok());
}

#[test]
fn update_records_need_an_id() {
    let yaml = r#"
scenario:
  fixtures:
    update_records:
      - { gameName: "Volleyball Game", category: "Recreational machines" }
"#;
    assert!(matches!(
        Config::from_yaml_str(yaml),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn missing_file_reports_path() {
    let err = Config::load("does/not/exist.yaml").unwrap_err();
    match err {
        ConfigError::Io { path, .. } => assert_eq!(path, "does/not/exist.yaml"),
        other => panic!("expected Io error, got {:?}", other),
    }
}

#[test]
fn suite_kind_parses_case_insensitively() {
    assert_eq!("Smoke".parse::<SuiteKind>(), Ok(SuiteKind::Smoke));
    assert_eq!("SPIKE".parse::<SuiteKind>(), Ok(SuiteKind::Spike));
    assert!("soak".parse::<SuiteKind>().is_err());
    assert_eq!(SuiteKind::Average.to_string(), "average");
}

#[test]
fn game_data_uses_camel_case_and_null_id() {
    let value = serde_json::to_value(GameData::new("Chinchon", "Card Game", 2000)).unwrap();
    assert_eq!(
        value,
        serde_json::json!({
            "id": null,
            "gameName": "Chinchon",
            "category": "Card Game",
            "totalBets": 2000
        })
    );

    let with_id = GameData::new("Volleyball Game", "Recreational machines", 0).with_id("abc");
    let value = serde_json::to_value(&with_id).unwrap();
    assert_eq!(value["id"], "abc");
}

#[test]
fn record_field_list_covers_response_fields() {
    assert_eq!(GAME_DATA_FIELDS.len(), 7);
    assert!(GAME_DATA_FIELDS.contains(&"popularityScore"));
}
