//! Environment variables beat every file layer.

use figment::Jail;
use thesis_config::ThesisConfig;

#[test]
fn env_overrides_project_toml() {
    Jail::expect_with(|jail| {
        jail.create_dir(".thesis")?;
        jail.create_file(".thesis/config.toml", "[grading]\npass_mark = 40.0\n")?;
        jail.set_env("THESIS_GRADING__PASS_MARK", "65");

        let config = ThesisConfig::load().expect("config loads");
        assert!((config.grading.pass_mark - 65.0).abs() < f64::EPSILON);
        Ok(())
    });
}

#[test]
fn nested_keys_use_double_underscore() {
    Jail::expect_with(|jail| {
        jail.set_env("THESIS_APPLICATIONS__PARALLEL_PENDING", "true");
        jail.set_env("THESIS_CLOCK__UTC_OFFSET", "-03:00");

        let config = ThesisConfig::load().expect("config loads");
        assert!(config.applications.parallel_pending);
        assert_eq!(config.clock.offset().unwrap().local_minus_utc(), -3 * 3600);
        Ok(())
    });
}
