use super::*;

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr, "127.0.0.1:5001".parse().expect("addr"));
    assert_eq!(settings.server.graceful_shutdown, Duration::from_secs(30));
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(settings.workspace.root, std::env::temp_dir());
    assert_eq!(settings.uploads.max_request_bytes.get(), 50 * 1024 * 1024);
    assert_eq!(settings.renderer.command, "weasyprint");
    assert!(settings.renderer.args.is_empty());
    assert!(settings.renderer.guarded);
    assert_eq!(settings.renderer.python, "python3");
    assert!(settings.remote.allowed_hosts.is_empty());
    assert_eq!(settings.remote.max_document_bytes, 10 * 1024 * 1024);
    assert_eq!(settings.remote.connect_timeout, Duration::from_secs(10));
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.renderer.command = Some("/usr/bin/weasyprint".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        renderer: RendererOverrides {
            command: Some("/opt/weasyprint/bin/weasyprint".to_string()),
            args: vec!["--presentational-hints".to_string()],
            guarded: Some(false),
            python: None,
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.renderer.command, "/opt/weasyprint/bin/weasyprint");
    assert_eq!(settings.renderer.args, vec!["--presentational-hints"]);
    assert!(!settings.renderer.guarded);
}

#[test]
fn uploads_limit_can_be_overridden_via_cli() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        uploads_max_request_bytes: Some(1_572_864),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.uploads.max_request_bytes.get(), 1_572_864);
    assert_eq!(settings.uploads.body_limit(), 1_572_864);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_values_name_the_offending_key() {
    let cases: [(fn(&mut RawSettings), &str); 5] = [
        (|raw: &mut RawSettings| raw.server.port = Some(0), "server.port"),
        (
            |raw: &mut RawSettings| raw.server.graceful_shutdown_seconds = Some(0),
            "server.graceful_shutdown_seconds",
        ),
        (
            |raw: &mut RawSettings| raw.uploads.max_request_bytes = Some(0),
            "uploads.max_request_bytes",
        ),
        (
            |raw: &mut RawSettings| raw.remote.max_document_bytes = Some(0),
            "remote.max_document_bytes",
        ),
        (
            |raw: &mut RawSettings| raw.remote.connect_timeout_seconds = Some(0),
            "remote.connect_timeout_seconds",
        ),
    ];

    for (mutate, expected_key) in cases {
        let mut raw = RawSettings::default();
        mutate(&mut raw);
        match Settings::from_raw(raw) {
            Err(LoadError::Invalid { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected invalid `{expected_key}`, got {other:?}"),
        }
    }
}

#[test]
fn blank_renderer_command_is_rejected() {
    let mut raw = RawSettings::default();
    raw.renderer.command = Some("   ".to_string());

    let err = Settings::from_raw(raw).expect_err("blank command");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "renderer.command",
            ..
        }
    ));
}

#[test]
fn blank_renderer_python_is_rejected() {
    let mut raw = RawSettings::default();
    raw.renderer.python = Some(String::new());

    let err = Settings::from_raw(raw).expect_err("blank interpreter");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "renderer.python",
            ..
        }
    ));
}

#[test]
fn invalid_log_level_is_rejected() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("loud".to_string());

    let err = Settings::from_raw(raw).expect_err("bad level");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "logging.level",
            ..
        }
    ));
}

#[test]
fn allowed_hosts_are_normalised() {
    let mut raw = RawSettings::default();
    raw.remote.allowed_hosts = Some(vec![
        " Docs.Example ".to_string(),
        String::new(),
        "cdn.example".to_string(),
    ]);

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.remote.allowed_hosts,
        vec!["docs.example".to_string(), "cdn.example".to_string()]
    );
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["pressroom"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "pressroom",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--workspace-root",
        "/var/lib/pressroom",
        "--renderer-arg",
        "--presentational-hints",
        "--renderer-guarded",
        "off",
        "--renderer-python",
        "/usr/bin/python3.12",
        "--remote-allowed-host",
        "docs.example",
        "--remote-allowed-host",
        "cdn.example",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            let overrides = serve.overrides;
            assert_eq!(overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                overrides.workspace_root.as_deref(),
                Some(std::path::Path::new("/var/lib/pressroom"))
            );
            assert_eq!(overrides.renderer.args, vec!["--presentational-hints"]);
            assert_eq!(overrides.renderer.guarded, Some(false));
            assert_eq!(
                overrides.renderer.python.as_deref(),
                Some("/usr/bin/python3.12")
            );
            assert_eq!(
                overrides.remote.allowed_hosts,
                vec!["docs.example", "cdn.example"]
            );
        }
    }
}
