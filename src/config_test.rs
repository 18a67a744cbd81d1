use super::*;

// Every test that touches the bridge variables holds this lock so parallel
// tests never observe each other's environment.
static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

const VARS: &[&str] = &[
    "MATTERMOST_WS_URL",
    "MATTERMOST_API_URL",
    "MATTERMOST_BOT_TOKEN",
    "BOT_USER_ID",
    "N8N_INBOUND_WEBHOOK_URL",
    "N8N_WEBHOOK_SECRET",
    "SERVICE_API_KEY",
    "SERVICE_PORT",
    "HTTP_TIMEOUT_SECS",
    "FORWARD_QUEUE_CAPACITY",
    "STREAM_IDLE_TIMEOUT_SECS",
];

/// # Safety
/// Callers must hold `ENV_LOCK`.
unsafe fn clear_bridge_env() {
    for var in VARS {
        unsafe { std::env::remove_var(var) };
    }
}

/// # Safety
/// Callers must hold `ENV_LOCK`.
unsafe fn set_required_env() {
    unsafe {
        std::env::set_var("MATTERMOST_WS_URL", "wss://chat.test/api/v4/websocket");
        std::env::set_var("MATTERMOST_API_URL", "https://chat.test/api/v4/");
        std::env::set_var("MATTERMOST_BOT_TOKEN", "bot-token");
        std::env::set_var("N8N_INBOUND_WEBHOOK_URL", "https://n8n.test/webhook/mm");
        std::env::set_var("SERVICE_API_KEY", "api-key");
    }
}

#[test]
fn from_env_applies_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_bridge_env();
        set_required_env();
    }

    let cfg = BridgeConfig::from_env().unwrap();
    assert_eq!(cfg.mattermost.api_url, "https://chat.test/api/v4");
    assert_eq!(cfg.mattermost.bot_user_id, None);
    assert_eq!(cfg.webhook.secret, "");
    assert_eq!(cfg.service.port, DEFAULT_SERVICE_PORT);
    assert_eq!(cfg.service.http_timeout_secs, DEFAULT_HTTP_TIMEOUT_SECS);
    assert_eq!(cfg.service.forward_queue_capacity, DEFAULT_FORWARD_QUEUE_CAPACITY);
    assert_eq!(cfg.mattermost.stream_idle_timeout_secs, DEFAULT_STREAM_IDLE_TIMEOUT_SECS);

    unsafe { clear_bridge_env() };
}

#[test]
fn from_env_reads_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_bridge_env();
        set_required_env();
        std::env::set_var("BOT_USER_ID", "bot123");
        std::env::set_var("N8N_WEBHOOK_SECRET", "s3cret");
        std::env::set_var("SERVICE_PORT", "9090");
        std::env::set_var("HTTP_TIMEOUT_SECS", "3");
        std::env::set_var("FORWARD_QUEUE_CAPACITY", "16");
        std::env::set_var("STREAM_IDLE_TIMEOUT_SECS", "45");
    }

    let cfg = BridgeConfig::from_env().unwrap();
    assert_eq!(cfg.mattermost.bot_user_id.as_deref(), Some("bot123"));
    assert_eq!(cfg.webhook.secret, "s3cret");
    assert_eq!(cfg.service.port, 9090);
    assert_eq!(cfg.service.http_timeout_secs, 3);
    assert_eq!(cfg.service.forward_queue_capacity, 16);
    assert_eq!(cfg.mattermost.stream_idle_timeout_secs, 45);

    unsafe { clear_bridge_env() };
}

#[test]
fn from_env_blank_bot_user_id_is_unset() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_bridge_env();
        set_required_env();
        std::env::set_var("BOT_USER_ID", "   ");
    }

    let cfg = BridgeConfig::from_env().unwrap();
    assert_eq!(cfg.mattermost.bot_user_id, None);

    unsafe { clear_bridge_env() };
}

#[test]
fn from_env_missing_token_errors() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_bridge_env();
        set_required_env();
        std::env::remove_var("MATTERMOST_BOT_TOKEN");
    }

    let err = BridgeConfig::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::Missing { var: "MATTERMOST_BOT_TOKEN" }));

    unsafe { clear_bridge_env() };
}

#[test]
fn from_env_bad_port_errors() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_bridge_env();
        set_required_env();
        std::env::set_var("SERVICE_PORT", "eighty");
    }

    let err = BridgeConfig::from_env().unwrap_err().to_string();
    assert!(err.contains("SERVICE_PORT"));

    unsafe { clear_bridge_env() };
}

#[test]
fn env_parse_invalid_returns_default() {
    unsafe { std::env::set_var("__TEST_MMB_EP_INVALID__", "notanumber") };
    let val: u64 = env_parse("__TEST_MMB_EP_INVALID__", 7);
    assert_eq!(val, 7);
    unsafe { std::env::remove_var("__TEST_MMB_EP_INVALID__") };
}
