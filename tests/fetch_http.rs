//! End-to-end tests of the fetch client over real HTTP

use std::{
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
    time::{Duration, Instant},
};

use folio_pulse::{
    cache::ResponseCache,
    client::{ClientConfig, ErrorKind, FetchOptions, FetchSource, PulseClient, Settled},
};
use serde::Deserialize;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, header_exists, method, path, query_param},
};

#[derive(Debug, PartialEq, Deserialize)]
struct V {
    v: i32,
}

fn client_for(server: &MockServer) -> PulseClient {
    PulseClient::new(ClientConfig::new(server.uri()), ResponseCache::in_memory())
        .expect("client should build")
}

fn quick() -> FetchOptions {
    FetchOptions::new()
        .with_max_retries(0)
        .with_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_fetches_json_and_serves_repeat_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"v": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let url = format!("{}/x", server.uri());

    let first: V = client.fetch_with_retry(&url, &quick()).await.unwrap();
    let second = client.fetch_with_retry_outcome::<V>(&url, &quick()).await.unwrap();

    assert_eq!(first, V { v: 1 });
    assert_eq!(second.data, V { v: 1 });
    assert_eq!(second.source, FetchSource::Cache);
}

#[tokio::test]
async fn test_sends_accept_and_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x"))
        .and(header("accept", "application/json"))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"v": 2})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let value: V = client
        .fetch_with_retry(&format!("{}/x", server.uri()), &quick())
        .await
        .unwrap();

    assert_eq!(value, V { v: 2 });
}

#[tokio::test]
async fn test_honours_retry_after_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"v": 3})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let started = Instant::now();
    let value: V = client
        .fetch_with_retry(&format!("{}/limited", server.uri()), &quick().with_max_retries(1))
        .await
        .unwrap();

    assert_eq!(value, V { v: 3 });
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"v": 4}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .fetch_with_retry::<V>(
            &format!("{}/slow", server.uri()),
            &quick().with_timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Timeout);
    assert!(!err.is_rate_limit);
}

#[tokio::test]
async fn test_not_found_is_not_retried_when_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .fetch_with_retry::<V>(
            &format!("{}/missing", server.uri()),
            &quick().with_max_retries(3).with_retry_client_errors(false),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Client);
    assert_eq!(err.status, Some(404));
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = PulseClient::new(ClientConfig::default(), ResponseCache::in_memory()).unwrap();

    let err = client
        .fetch_with_retry::<V>(&format!("http://127.0.0.1:{port}/x"), &quick())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Network);
    assert_eq!(err.status, None);
}

#[tokio::test]
async fn test_forbidden_falls_back_to_expired_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let now = Arc::new(AtomicI64::new(0));
    let clock_now = now.clone();
    let cache = ResponseCache::in_memory().with_clock(Arc::new(move || clock_now.load(Ordering::SeqCst)));
    let url = format!("{}/x", server.uri());
    cache.set(&url, &json!({"v": 5}), Duration::from_secs(1));
    now.store(60_000, Ordering::SeqCst);

    let client = PulseClient::new(ClientConfig::new(server.uri()), cache).unwrap();
    let fetched = client.fetch_with_retry_outcome::<V>(&url, &quick()).await.unwrap();

    assert_eq!(fetched.data, V { v: 5 });
    match fetched.source {
        FetchSource::StaleCache(err) => {
            assert!(err.is_rate_limit);
            assert!(err.is_cached);
            assert_eq!(err.status, Some(403));
        },
        other => panic!("unexpected source {other:?}"),
    }
}

#[tokio::test]
async fn test_github_endpoint_resolves_against_base_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/octo/repos"))
        .and(query_param("per_page", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"v": 1}, {"v": 2}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let repos: Vec<V> = client
        .fetch_github("/users/octo/repos?per_page=100", &quick())
        .await
        .unwrap();

    assert_eq!(repos, vec![V { v: 1 }, V { v: 2 }]);
}

#[tokio::test]
async fn test_batch_fetch_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"v": 1})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let urls = [format!("{}/a", server.uri()), format!("{}/b", server.uri())];
    let results = client.batch_fetch::<V, _>(&urls, &quick()).await;

    assert_eq!(results[0], Settled::Fulfilled(V { v: 1 }));
    assert!(matches!(&results[1], Settled::Rejected(err) if err.kind == ErrorKind::Server));
}
