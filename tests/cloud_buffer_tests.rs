//! End-to-end tests: proxy → adapter → gateway against a mock storage
//! service, with the editor played by `MemoryHost` or a scripted Vim channel.

use std::cell::Cell;
use std::io::Cursor;
use std::rc::Rc;
use std::time::{Duration, Instant};

use cloud_buffer::adapter::{BufferOperations, HostAdapter};
use cloud_buffer::config::GatewayConfig;
use cloud_buffer::error::CloudBufferError;
use cloud_buffer::gateway::Gateway;
use cloud_buffer::host::{Exchange, MemoryHost};
use cloud_buffer::proxy::{host_proxy_with, ResilientProxy};
use cloud_buffer::session::serve;
use cloud_buffer::vim::VimChannel;
use httpmock::Method::{DELETE, GET, POST, PUT};
use httpmock::MockServer;
use rstest::rstest;
use serde_json::{json, Value};

fn no_env(_: &str) -> Option<String> {
    None
}

fn host_for(server: &MockServer) -> Rc<MemoryHost> {
    Rc::new(
        MemoryHost::new()
            .with_setting("vim_cloud_buffer_url", server.url("/buffers"))
            .with_setting("vim_cloud_buffer_api_key", "test-key"),
    )
}

// ---------------------------------------------------------------------------
// Content survives the round trip
// ---------------------------------------------------------------------------

#[rstest]
#[case("Foo ñ")]
#[case("こんにちは 世界")]
#[case("line one\nline \"two\"\ttabbed 🚀")]
fn added_content_comes_back_from_get(#[case] content: &str) {
    let server = MockServer::start();
    let stored = json!({"_id": {"$oid": "64b0c0ffee"}, "content": content}).to_string();
    let add = server.mock(|when, then| {
        when.method(POST)
            .path("/buffers")
            .query_param("apiKey", "test-key")
            .json_body(json!({"content": content}));
        then.status(201).body(stored.clone());
    });
    let get = server.mock(|when, then| {
        when.method(GET)
            .path("/buffers/64b0c0ffee")
            .query_param("apiKey", "test-key");
        then.status(200).body(stored.clone());
    });

    let host = host_for(&server);
    let mut proxy = host_proxy_with(no_env, Rc::clone(&host), None);

    host.set_request(json!({"content": content}));
    let created: Value = serde_json::from_str(&proxy.add().unwrap()).unwrap();
    let id = created["_id"]["$oid"].as_str().unwrap().to_string();

    let fetched: Value = serde_json::from_str(&proxy.get(&id).unwrap()).unwrap();
    assert_eq!(fetched["content"], content);
    assert_eq!(host.response(), Some(stored));
    add.assert();
    get.assert();
}

// ---------------------------------------------------------------------------
// A full editing session through one proxy
// ---------------------------------------------------------------------------

#[test]
fn crud_session_publishes_each_response() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/buffers");
        then.status(201)
            .body(r#"{"_id":{"$oid":"abc"},"content":"draft"}"#);
    });
    let update = server.mock(|when, then| {
        when.method(PUT)
            .path("/buffers/abc")
            .json_body(json!({"_id": {"$oid": "abc"}, "content": "final", "title": "notes"}));
        then.status(200)
            .body(r#"{"_id":{"$oid":"abc"},"content":"final","title":"notes"}"#);
    });
    let list = server.mock(|when, then| {
        when.method(GET)
            .path("/buffers")
            .query_param("apiKey", "test-key")
            .query_param("s", r#"{"title":1}"#);
        then.status(200)
            .body(r#"[{"_id":{"$oid":"abc"},"content":"final","title":"notes"}]"#);
    });
    let remove = server.mock(|when, then| {
        when.method(DELETE).path("/buffers/abc");
        then.status(200).body(r#"{"_id":{"$oid":"abc"}}"#);
    });

    let host = host_for(&server);
    let mut proxy = host_proxy_with(no_env, Rc::clone(&host), None);
    assert!(!proxy.is_initialized());

    host.set_request(json!({"content": "draft"}));
    proxy.add().unwrap();
    assert!(proxy.is_initialized());

    host.set_request(json!({"_id": {"$oid": "abc"}, "content": "final", "title": "notes"}));
    proxy.update("abc").unwrap();
    let updated: Value = serde_json::from_str(&host.response().unwrap()).unwrap();
    assert_eq!(updated["content"], "final");
    assert_eq!(updated["title"], "notes");

    host.set_request(json!({"s": {"title": 1}}));
    proxy.list().unwrap();
    assert!(host.response().unwrap().starts_with('['));

    proxy.remove("abc").unwrap();
    assert_eq!(host.response().as_deref(), Some(r#"{"_id":{"$oid":"abc"}}"#));

    update.assert();
    list.assert();
    remove.assert();
    assert_eq!(host.last_error(), None);
}

#[test]
fn adapter_is_built_once_for_many_operations() {
    let server = MockServer::start();
    let get = server.mock(|when, then| {
        when.method(GET).path("/buffers/abc");
        then.status(200).body("{}");
    });

    let host = host_for(&server);
    let builds = Cell::new(0);
    let adapter_host = Rc::clone(&host);
    let mut proxy = ResilientProxy::new(Rc::clone(&host), || -> cloud_buffer::Result<_> {
        builds.set(builds.get() + 1);
        let config = GatewayConfig::resolve_with(no_env, &adapter_host)?;
        Ok(HostAdapter::new(Gateway::new(&config)?, Rc::clone(&adapter_host)))
    });

    for _ in 0..5 {
        proxy.get("abc").unwrap();
    }
    assert!(proxy.find().is_err());

    assert_eq!(builds.get(), 1);
    assert_eq!(get.calls(), 5);
}

// ---------------------------------------------------------------------------
// Failures reach the error slot and the caller
// ---------------------------------------------------------------------------

#[test]
fn json_error_message_lands_in_error_slot() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/buffers/nope");
        then.status(404).body(r#"{"message":"X"}"#);
    });

    let host = host_for(&server);
    host.set_request(json!({"content": "untouched"}));
    let mut proxy = host_proxy_with(no_env, Rc::clone(&host), None);

    let err = proxy.get("nope").unwrap_err();
    assert!(matches!(err, CloudBufferError::HttpStatus { status: 404, .. }));
    assert_eq!(host.last_error().as_deref(), Some("X"));
    assert_eq!(
        host.exchange(),
        Exchange::Request(json!({"content": "untouched"}))
    );
}

#[test]
fn plain_error_body_records_generic_failure_text() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/buffers");
        then.status(500).body("Internal failure, see logs");
    });

    let host = host_for(&server);
    host.set_request(json!({"content": "x"}));
    let mut proxy = host_proxy_with(no_env, Rc::clone(&host), None);

    assert!(proxy.add().is_err());
    assert_eq!(
        host.last_error().as_deref(),
        Some("500 Internal Server Error")
    );
}

#[test]
fn missing_configuration_fails_before_any_request() {
    let server = MockServer::start();
    let any = server.mock(|when, then| {
        when.path("/buffers");
        then.status(200).body("[]");
    });

    let host = Rc::new(MemoryHost::new());
    let mut proxy = host_proxy_with(no_env, Rc::clone(&host), None);

    let err = proxy.list().unwrap_err();
    assert!(matches!(err, CloudBufferError::ConfigurationMissing { .. }));
    assert!(!proxy.is_initialized());
    assert!(host.last_error().unwrap().contains("CLOUD_BUFFER_URL"));
    assert_eq!(any.calls(), 0);
}

#[test]
fn connection_failure_keeps_api_key_out_of_error_slot() {
    let host = Rc::new(
        MemoryHost::new()
            .with_setting("vim_cloud_buffer_url", "http://127.0.0.1:9/buffers")
            .with_setting("vim_cloud_buffer_api_key", "TOPSECRETKEY"),
    );
    let mut proxy = host_proxy_with(no_env, Rc::clone(&host), None);

    let err = proxy.get("abc").unwrap_err();
    assert!(matches!(err, CloudBufferError::Transport { .. }), "{err:?}");
    let recorded = host.last_error().unwrap();
    assert!(!recorded.contains("TOPSECRETKEY"), "{recorded}");
    assert!(recorded.contains("apiKey=***"), "{recorded}");
}

#[test]
fn timeout_override_replaces_configured_timeout() {
    let server = MockServer::start();
    let slow = server.mock(|when, then| {
        when.method(GET).path("/buffers/abc");
        then.status(200).body("{}").delay(Duration::from_secs(3));
    });

    let host = Rc::new(
        MemoryHost::new()
            .with_setting("vim_cloud_buffer_url", server.url("/buffers"))
            .with_setting("vim_cloud_buffer_api_key", "test-key")
            .with_setting("vim_cloud_buffer_timeout_ms", "30000"),
    );
    let short = Some(Some(Duration::from_millis(100)));
    let mut proxy = host_proxy_with(no_env, Rc::clone(&host), short);

    let started = Instant::now();
    let err = proxy.get("abc").unwrap_err();
    assert!(matches!(err, CloudBufferError::Transport { .. }), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(proxy.is_initialized());
    assert_eq!(slow.calls(), 1);
}

#[test]
fn environment_overrides_host_configuration() {
    let server = MockServer::start();
    let via_env = server.mock(|when, then| {
        when.method(GET)
            .path("/env-buffers/abc")
            .query_param("apiKey", "env-key");
        then.status(200).body("{}");
    });

    let host = host_for(&server);
    let env_url = server.url("/env-buffers");
    let env = move |name: &str| match name {
        "CLOUD_BUFFER_URL" => Some(env_url.clone()),
        "CLOUD_BUFFER_API_KEY" => Some("env-key".to_string()),
        _ => None,
    };
    let mut proxy = host_proxy_with(env, Rc::clone(&host), None);

    proxy.get("abc").unwrap();
    via_env.assert();
}

#[rstest]
#[case(json!({}))]
#[case(json!({"q": {"a": 1}}))]
fn find_never_issues_a_request(#[case] payload: Value) {
    let server = MockServer::start();
    let any = server.mock(|when, then| {
        when.path("/buffers");
        then.status(200);
    });

    let host = host_for(&server);
    host.set_request(payload);
    let mut proxy = host_proxy_with(no_env, Rc::clone(&host), None);

    assert!(matches!(
        proxy.find(),
        Err(CloudBufferError::UnsupportedOperation { operation: "find" })
    ));
    assert_eq!(host.last_error().as_deref(), Some("find is not implemented"));
    assert_eq!(any.calls(), 0);
}

// ---------------------------------------------------------------------------
// Scripted Vim session
// ---------------------------------------------------------------------------

#[test]
fn vim_session_resolves_settings_and_publishes_response() {
    let server = MockServer::start();
    let get = server.mock(|when, then| {
        when.method(GET)
            .path("/buffers/abc")
            .query_param("apiKey", "vim-key");
        then.status(200).body(r#"{"content":"say \"hi\""}"#);
    });

    // Command 1, then Vim's answers to the three settings lookups
    // (URL, API key, timeout) made while building the adapter.
    let input = format!(
        "[1, {{\"op\": \"get\", \"id\": \"abc\"}}]\n[-1, {}]\n[-2, \"vim-key\"]\n[-3, null]\n",
        Value::String(server.url("/buffers"))
    );
    let channel = Rc::new(VimChannel::new(
        Cursor::new(input.into_bytes()),
        Vec::<u8>::new(),
    ));
    let mut proxy = host_proxy_with(no_env, Rc::clone(&channel), None);

    assert_eq!(serve(&*channel, &mut proxy).unwrap(), 1);
    get.assert();

    drop(proxy);
    let channel = Rc::try_unwrap(channel).ok().expect("proxy dropped");
    let (_, out) = channel.into_inner();
    let sent: Vec<Value> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    assert_eq!(
        sent,
        vec![
            json!(["expr", "get(g:, 'vim_cloud_buffer_url', v:null)", -1]),
            json!(["expr", "get(g:, 'vim_cloud_buffer_api_key', v:null)", -2]),
            json!(["expr", "get(g:, 'vim_cloud_buffer_timeout_ms', v:null)", -3]),
            json!(["ex", "unlet! g:vim_cloud_buffer_data"]),
            json!(["ex", r#"let g:vim_cloud_buffer_data = "{\"content\":\"say \\\"hi\\\"\"}""#]),
            json!([1, {"ok": true}]),
        ]
    );
}
