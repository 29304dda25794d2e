use super::*;
use serial_test::serial;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.server.name, "mcp-workshop");
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.workshop.long_task_steps, 5);
    assert_eq!(config.workshop.step_delay(), Duration::from_secs(1));
    assert!(config.validate().is_ok());
}

#[test]
fn config_validation() {
    let config = Config::default();

    let mut invalid_config = config.clone();
    invalid_config.server.name = "  ".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidServerName)
    ));

    let mut invalid_config = config.clone();
    invalid_config.server.port = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidPort(0))
    ));

    let mut invalid_config = config.clone();
    invalid_config.server.host = "not a host".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidHost(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.workshop.long_task_steps = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.workshop.long_task_step_delay_ms = 60_001;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidStepDelay(60_001))
    ));
}

#[test]
fn bind_address() {
    let mut server = ServerConfig::default();
    let addr = server.bind_address().expect("default host is valid");
    assert_eq!(addr.to_string(), "127.0.0.1:3000");

    server.host = "localhost".to_string();
    server.set_port(8080).expect("port is valid");
    assert_eq!(
        server.bind_address().expect("localhost is valid").to_string(),
        "127.0.0.1:8080"
    );

    server.host = "::1".to_string();
    assert_eq!(
        server.bind_address().expect("ipv6 is valid").to_string(),
        "[::1]:8080"
    );

    assert!(server.set_port(0).is_err());
}

#[test]
fn port_override() {
    let mut config = Config::default();

    config
        .apply_port_override(None)
        .expect("absent override is ignored");
    assert_eq!(config.server.port, 3000);

    config
        .apply_port_override(Some(""))
        .expect("empty override is ignored");
    assert_eq!(config.server.port, 3000);

    config
        .apply_port_override(Some(" 8123 "))
        .expect("valid override applies");
    assert_eq!(config.server.port, 8123);

    for invalid in ["0", "70000", "http"] {
        assert!(matches!(
            config.apply_port_override(Some(invalid)),
            Err(ConfigError::InvalidPortOverride(_))
        ));
    }
    assert_eq!(config.server.port, 8123);
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_config_uses_defaults() {
    let partial_toml = r#"
        [workshop]
        long_task_steps = 3
    "#;

    let config: Config = toml::from_str(partial_toml).expect("should parse toml correctly");
    assert_eq!(config.workshop.long_task_steps, 3);
    assert_eq!(config.workshop.long_task_step_delay_ms, 1000);
    assert_eq!(config.server, ServerConfig::default());
}

#[test]
#[serial]
fn load_missing_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    // SAFETY: serialised with every other test touching PORT.
    unsafe { env::remove_var(PORT_ENV_VAR) };

    let config = Config::load(temp_dir.path()).expect("defaults load");
    assert_eq!(config.server, ServerConfig::default());
    assert_eq!(config.get_base_dir(), temp_dir.path());
}

#[test]
#[serial]
fn save_then_load() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    // SAFETY: serialised with every other test touching PORT.
    unsafe { env::remove_var(PORT_ENV_VAR) };

    let mut config = Config {
        base_dir: temp_dir.path().join("nested"),
        ..Config::default()
    };
    config.server.name = "test-server".to_string();
    config.workshop.long_task_step_delay_ms = 10;
    config.save().expect("config saves");
    assert!(config.config_file_path().exists());

    let loaded = Config::load(temp_dir.path().join("nested")).expect("config loads");
    assert_eq!(loaded, config);
}

#[test]
#[serial]
fn load_applies_port_environment_variable() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    // SAFETY: serialised with every other test touching PORT.
    unsafe { env::set_var(PORT_ENV_VAR, "4555") };
    let loaded = Config::load(temp_dir.path());
    // SAFETY: as above.
    unsafe { env::set_var(PORT_ENV_VAR, "not-a-port") };
    let rejected = Config::load(temp_dir.path());
    // SAFETY: as above.
    unsafe { env::remove_var(PORT_ENV_VAR) };

    assert_eq!(loaded.expect("config loads").server.port, 4555);
    assert!(rejected.is_err());
}

#[test]
#[serial]
fn stored_config_ignores_port_environment_variable() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[server]\nport = 7000\n",
    )
    .expect("should write config");

    // SAFETY: serialised with every other test touching PORT.
    unsafe { env::set_var(PORT_ENV_VAR, "8080") };
    let effective = Config::load(temp_dir.path());
    let stored = Config::load_stored(temp_dir.path());
    // SAFETY: as above.
    unsafe { env::remove_var(PORT_ENV_VAR) };

    assert_eq!(effective.expect("config loads").server.port, 8080);
    let stored = stored.expect("stored config loads");
    assert_eq!(stored.server.port, 7000);
    assert_eq!(stored.get_base_dir(), temp_dir.path());
}

#[test]
#[serial]
fn load_rejects_invalid_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[server\nport = \"invalid_port\"",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());

    fs::write(
        temp_dir.path().join("config.toml"),
        "[workshop]\nlong_task_steps = 1000\n",
    )
    .expect("should write config");
    let error = Config::load(temp_dir.path()).expect_err("validation fails");
    assert!(format!("{:#}", error).contains("long task steps"));
}
