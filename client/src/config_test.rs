use super::*;

#[test]
fn defaults_match_documented_values() {
    let config = ClientConfig::default();
    assert_eq!(config.server_url, "http://127.0.0.1:3000");
    assert_eq!(config.cursor_throttle, Duration::from_millis(50));
    assert_eq!(config.cursor_ttl, Duration::from_secs(5));
    assert_eq!(config.reconnect.max_attempts, 5);
}

#[test]
fn ws_url_maps_http_schemes() {
    let config = ClientConfig::default().with_server_url("http://localhost:3000/");
    assert_eq!(config.ws_url().expect("ws url"), "ws://localhost:3000/api/ws");

    let config = ClientConfig::default().with_server_url("https://boards.example.com");
    assert_eq!(config.ws_url().expect("ws url"), "wss://boards.example.com/api/ws");
    assert_eq!(config.http_base().expect("http base"), "https://boards.example.com");
}

#[test]
fn ws_scheme_is_accepted_for_rest_base() {
    let config = ClientConfig::default().with_server_url("ws://127.0.0.1:4000");
    assert_eq!(config.http_base().expect("http base"), "http://127.0.0.1:4000");
}

#[test]
fn unknown_scheme_is_rejected() {
    let config = ClientConfig::default().with_server_url("ftp://nope");
    assert_eq!(config.ws_url(), Err(InvalidServerUrl("ftp://nope".into())));
    assert!(ClientConfig::default().with_server_url("localhost:3000").http_base().is_err());
}

#[test]
fn backoff_doubles_and_caps() {
    let policy = ReconnectPolicy::default();
    assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
    assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
    assert_eq!(policy.delay_for(3), Duration::from_millis(4000));
    assert_eq!(policy.delay_for(4), Duration::from_millis(8000));
    assert_eq!(policy.delay_for(5), Duration::from_millis(10_000));
    assert_eq!(policy.delay_for(40), Duration::from_millis(10_000));
}
