use std::io::Write;
use std::sync::Mutex;

use resolvd::config::{CliArgs, ResolverConfig};
use tempfile::NamedTempFile;

// Tests that touch RESOLVD_LOG_FILTER must not run concurrently.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn args() -> CliArgs {
    CliArgs {
        config: None,
        listen_addrs: vec![],
        use_transport_signals: false,
        revalidate_ns: false,
        trust_anchor_file: None,
        root_hints_file: None,
        log_filter: None,
    }
}

#[test]
fn defaults_load_without_a_config_file() {
    let config = ResolverConfig::load(&args()).expect("defaults should be valid");
    assert_eq!(config.log_filter, "resolvd=info");
    assert!(!config.listen_addrs.is_empty());
}

#[test]
fn toml_file_overrides_defaults() {
    let mut file = NamedTempFile::new().expect("create temp config file");
    writeln!(
        file,
        r#"
        listen_addrs = ["127.0.0.1:5300"]
        trust_anchor_path = null
        root_hints_path = null
        log_filter = "resolvd=debug"
        "#
    )
    .unwrap();

    let mut cli = args();
    cli.config = Some(file.path().to_path_buf());
    let config = ResolverConfig::load(&cli).expect("file-backed config should load");

    assert_eq!(config.log_filter, "resolvd=debug");
    assert_eq!(config.listen_addrs[0].to_string(), "127.0.0.1:5300");
}

#[test]
fn cli_flags_override_the_config_file() {
    let mut file = NamedTempFile::new().expect("create temp config file");
    writeln!(
        file,
        r#"
        listen_addrs = ["127.0.0.1:5300"]
        trust_anchor_path = null
        root_hints_path = null
        log_filter = "resolvd=debug"
        "#
    )
    .unwrap();

    let mut cli = args();
    cli.config = Some(file.path().to_path_buf());
    cli.log_filter = Some("resolvd=trace".to_string());
    let config = ResolverConfig::load(&cli).expect("layered config should load");

    assert_eq!(config.log_filter, "resolvd=trace");
}

#[test]
fn env_override_beats_the_config_file_but_not_cli() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let mut file = NamedTempFile::new().expect("create temp config file");
    writeln!(
        file,
        r#"
        listen_addrs = ["127.0.0.1:5300"]
        trust_anchor_path = null
        root_hints_path = null
        log_filter = "resolvd=debug"
        "#
    )
    .unwrap();

    unsafe {
        std::env::set_var("RESOLVD_LOG_FILTER", "resolvd=warn");
    }

    let mut cli = args();
    cli.config = Some(file.path().to_path_buf());
    let config = ResolverConfig::load(&cli).expect("layered config should load");
    assert_eq!(config.log_filter, "resolvd=warn");

    unsafe {
        std::env::remove_var("RESOLVD_LOG_FILTER");
    }
}

#[test]
fn missing_config_file_is_an_error() {
    let mut cli = args();
    cli.config = Some("/nonexistent/path/resolvd.toml".into());
    assert!(ResolverConfig::load(&cli).is_err());
}
