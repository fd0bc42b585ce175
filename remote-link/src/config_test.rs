use super::*;

#[test]
fn defaults_match_service_contract() {
    let cfg = LinkConfig::default();
    assert_eq!(cfg.connect_timeout, Duration::from_secs(5));
    assert_eq!(cfg.request_timeout, Duration::from_secs(10));
    assert_eq!(cfg.reconnect_base_delay, Duration::from_secs(1));
    assert_eq!(cfg.max_reconnect_attempts, 5);
}

#[test]
fn backoff_is_linear_in_attempt() {
    let cfg = LinkConfig::default();
    let delays: Vec<u128> = (1..=5).map(|n| cfg.backoff_delay(n).as_millis()).collect();
    assert_eq!(delays, vec![1_000, 2_000, 3_000, 4_000, 5_000]);
}

#[test]
fn env_parse_missing_returns_default() {
    let val: u64 = env_parse("__REMOTE_LINK_TEST_MISSING__", 42);
    assert_eq!(val, 42);
}

#[test]
fn env_parse_present_valid() {
    unsafe { std::env::set_var("__REMOTE_LINK_TEST_VALID__", " 99 ") };
    let val: u32 = env_parse("__REMOTE_LINK_TEST_VALID__", 0);
    assert_eq!(val, 99);
    unsafe { std::env::remove_var("__REMOTE_LINK_TEST_VALID__") };
}

#[test]
fn env_parse_present_invalid_returns_default() {
    unsafe { std::env::set_var("__REMOTE_LINK_TEST_INVALID__", "soon") };
    let val: u64 = env_parse("__REMOTE_LINK_TEST_INVALID__", 7);
    assert_eq!(val, 7);
    unsafe { std::env::remove_var("__REMOTE_LINK_TEST_INVALID__") };
}

#[test]
fn from_env_reads_overrides() {
    unsafe {
        std::env::set_var("REMOTE_LINK_CONNECT_TIMEOUT_MS", "250");
        std::env::set_var("REMOTE_LINK_REQUEST_TIMEOUT_MS", "750");
        std::env::set_var("REMOTE_LINK_RECONNECT_BASE_MS", "20");
        std::env::set_var("REMOTE_LINK_RECONNECT_MAX_ATTEMPTS", "2");
    }

    let cfg = LinkConfig::from_env();
    assert_eq!(cfg.connect_timeout, Duration::from_millis(250));
    assert_eq!(cfg.request_timeout, Duration::from_millis(750));
    assert_eq!(cfg.reconnect_base_delay, Duration::from_millis(20));
    assert_eq!(cfg.max_reconnect_attempts, 2);

    unsafe {
        std::env::remove_var("REMOTE_LINK_CONNECT_TIMEOUT_MS");
        std::env::remove_var("REMOTE_LINK_REQUEST_TIMEOUT_MS");
        std::env::remove_var("REMOTE_LINK_RECONNECT_BASE_MS");
        std::env::remove_var("REMOTE_LINK_RECONNECT_MAX_ATTEMPTS");
    }
}
