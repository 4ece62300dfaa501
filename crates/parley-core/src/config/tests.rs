use super::*;

#[test]
fn test_router_defaults() {
    let r = RouterConfig::default();
    assert_eq!(r.sweep_interval(), Duration::from_secs(1));
    assert_eq!(r.diffusion_interval(), Duration::from_secs(3));
    assert_eq!(r.stale_after(), Duration::from_secs(300));
    assert_eq!(r.suppression(), Duration::from_secs(30 * 60));
    assert_eq!(r.max_history_tokens, 8192);
    assert_eq!(r.notice_delay(), Duration::from_secs(4));
}

#[test]
fn test_parse_empty_config_uses_defaults() {
    let cfg = parse("").unwrap();
    assert_eq!(cfg.parley.name, "Parley");
    assert_eq!(cfg.owner.id, "owner");
    assert_eq!(cfg.provider.hosted_models, vec!["gpt-4o-mini"]);
    assert!(cfg.channel.telegram.is_none());
    assert_eq!(cfg.enhancers.capabilities(), Capabilities::default());
}

#[test]
fn test_parse_full_config() {
    let toml_str = r#"
        [parley]
        log_level = "debug"

        [owner]
        id = "u-42"
        username = "jane"

        [router]
        sweep_interval_ms = 250
        max_history_tokens = 1024

        [enhancers]
        enable_transcriptions = true
        transcription_url = "http://localhost:5000/transcribe"
        enable_image_generation = true

        [provider]
        hosted_models = ["gpt-4o-mini", "gpt-4o"]

        [provider.ollama]
        base_url = "http://gpu-box:11434"

        [channel.telegram]
        enabled = true
        bot_token = "123:abc"
    "#;
    let cfg = parse(toml_str).unwrap();
    assert_eq!(cfg.parley.log_level, "debug");
    assert_eq!(cfg.owner.id, "u-42");
    assert_eq!(cfg.router.sweep_interval_ms, 250);
    assert_eq!(cfg.router.stale_after_secs, 300);
    assert_eq!(cfg.router.max_history_tokens, 1024);
    assert_eq!(cfg.provider.hosted_models.len(), 2);

    let ollama = cfg.provider.ollama.unwrap();
    assert_eq!(ollama.base_url, "http://gpu-box:11434");
    assert_eq!(ollama.num_ctx, 8192);
    assert!(ollama.auto_pull);

    let tg = cfg.channel.telegram.unwrap();
    assert!(tg.enabled);
    assert_eq!(tg.typing_delay_min_ms, 3000);

    // Image generation is flagged on but has no endpoint.
    let caps = cfg.enhancers.capabilities();
    assert!(caps.transcriptions);
    assert!(!caps.vision);
    assert!(!caps.image_generation);
}

#[test]
fn test_parse_rejects_inverted_jitter() {
    let toml_str = r#"
        [router]
        jitter_min_ms = 5000
        jitter_max_ms = 1000
    "#;
    let err = parse(toml_str).unwrap_err();
    assert!(matches!(err, ParleyError::Config(_)));
}

#[test]
fn test_parse_invalid_toml() {
    assert!(parse("[router\nsweep_interval_ms = ").is_err());
}

#[test]
fn test_load_missing_file_falls_back_to_defaults() {
    let cfg = load("/nonexistent/__parley_test__/config.toml").unwrap();
    assert_eq!(cfg.memory.db_path, "~/.parley/data/parley.db");
}

#[test]
fn test_shellexpand_leaves_plain_paths() {
    assert_eq!(shellexpand("/tmp/x.db"), "/tmp/x.db");
    assert_eq!(shellexpand(":memory:"), ":memory:");
}
