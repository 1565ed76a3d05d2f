//! Integration tests for TOML configuration loading.
//!
//! Uses figment::Jail for sandboxed file and env var manipulation.

use figment::{
    Figment, Jail,
    providers::{Format, Serialized, Toml},
};
use pretty_assertions::assert_eq;
use thesis_config::{ConfigError, ThesisConfig};

#[test]
fn loads_all_sections_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[database]
path = "/var/lib/thesis/engine.db"

[clock]
utc_offset = "+02:00"

[grading]
pass_mark = 60.0

[applications]
parallel_pending = true

[events]
channel_capacity = 64
jsonl_path = "events.jsonl"
"#,
        )?;

        let config: ThesisConfig = Figment::from(Serialized::defaults(ThesisConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        assert_eq!(config.database.path, "/var/lib/thesis/engine.db");
        assert_eq!(config.clock.offset().unwrap().local_minus_utc(), 7200);
        assert!((config.grading.pass_mark - 60.0).abs() < f64::EPSILON);
        assert!(config.applications.parallel_pending);
        assert_eq!(config.events.channel_capacity, 64);
        assert_eq!(config.events.jsonl_path.as_deref(), Some("events.jsonl"));
        Ok(())
    });
}

#[test]
fn partial_toml_keeps_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[grading]\npass_mark = 55.5\n")?;

        let config = ThesisConfig::load_from("config.toml".as_ref()).expect("config loads");
        assert_eq!(config.database.path, ".thesis/thesis.db");
        assert_eq!(config.clock.utc_offset, "+00:00");
        assert!((config.grading.pass_mark - 55.5).abs() < f64::EPSILON);
        Ok(())
    });
}

#[test]
fn invalid_offset_in_toml_fails_validation() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[clock]\nutc_offset = \"CET\"\n")?;

        let result = ThesisConfig::load_from("config.toml".as_ref());
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
        Ok(())
    });
}

#[test]
fn project_config_is_picked_up() {
    Jail::expect_with(|jail| {
        jail.create_dir(".thesis")?;
        jail.create_file(".thesis/config.toml", "[database]\npath = \":memory:\"\n")?;

        let config = ThesisConfig::load().expect("config loads");
        assert!(config.database.is_in_memory());
        Ok(())
    });
}
