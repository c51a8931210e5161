use super::*;
use serde_json::json;
use std::time::Instant;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

fn api_for(base_url: &str) -> ApiConfig {
    ApiConfig {
        base_url: base_url.to_string(),
        timeout: Duration::from_secs(5),
        ..ApiConfig::default()
    }
}

fn client_for(server: &MockServer) -> FetchClient {
    FetchClient::new(&api_for(&server.uri()), fast_retry(3))
        .unwrap()
        .with_batch(BatchConfig {
            batch_size: 10,
            inter_batch_delay: Duration::ZERO,
        })
}

fn drivers_page(total: usize, ids: &[&str]) -> Value {
    let drivers: Vec<Value> = ids.iter().map(|id| json!({"driverId": id})).collect();
    json!({
        "MRData": {
            "total": total.to_string(),
            "DriverTable": {"Drivers": drivers}
        }
    })
}

async fn mount_page(server: &MockServer, offset: usize, body: Value) {
    Mock::given(method("GET"))
        .and(path("/drivers.json"))
        .and(query_param("offset", offset.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

// Single fetch

#[tokio::test]
async fn fetch_page_returns_parsed_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2021.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"MRData": {"total": "22"}})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let body = client.fetch_page(&client.url("2021.json")).await.unwrap();

    assert_eq!(body["MRData"]["total"], "22");
}

#[tokio::test]
async fn service_unavailable_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.fetch_page(&client.url("2021.json")).await.unwrap_err();

    assert!(matches!(err, Error::TransientServer { .. }), "got {err:?}");
}

#[tokio::test]
async fn other_statuses_are_client_errors_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server);

    let err = client.fetch_page(&client.url("missing.json")).await.unwrap_err();
    assert_eq!(err.status(), Some(404));

    let err = client.fetch_page(&client.url("broken.json")).await.unwrap_err();
    assert!(matches!(err, Error::Client { status: Some(500), .. }));
}

#[tokio::test]
async fn malformed_json_is_client_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.fetch_page(&client.url("2021.json")).await.unwrap_err();

    match err {
        Error::Client { status, reason, .. } => {
            assert_eq!(status, None);
            assert!(reason.contains("malformed JSON"), "reason: {reason}");
        }
        other => panic!("expected Client, got {other:?}"),
    }
}

#[tokio::test]
async fn timeout_is_client_error_and_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_secs(3)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let api = ApiConfig {
        timeout: Duration::from_millis(200),
        ..api_for(&server.uri())
    };
    let client = FetchClient::new(&api, fast_retry(5)).unwrap();
    let err = client
        .fetch_with_retry(&client.url("2021.json"))
        .await
        .unwrap_err();

    match err {
        Error::Client { status, reason, .. } => {
            assert_eq!(status, None);
            assert!(reason.contains("timed out"), "reason: {reason}");
        }
        other => panic!("expected Client, got {other:?}"),
    }
}

#[tokio::test]
async fn refused_connection_is_transient() {
    // Grab a free port and release it so nothing is listening there
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let client = FetchClient::new(&api_for(&format!("http://127.0.0.1:{port}")), fast_retry(1)).unwrap();
    let err = client.fetch_page(&client.url("2021.json")).await.unwrap_err();

    assert!(matches!(err, Error::TransientServer { .. }), "got {err:?}");
}

// Retry

#[tokio::test]
async fn retry_recovers_after_transient_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2021/1/results.json"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2021/1/results.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"MRData": {"RaceTable": {"season": "2021", "round": "1"}}})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let body = client
        .fetch_with_retry(&client.url("2021/1/results.json"))
        .await
        .unwrap();

    assert_eq!(body["MRData"]["RaceTable"]["season"], "2021");
    assert_eq!(body["MRData"]["RaceTable"]["round"], "1");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn retry_exhaustion_surfaces_last_transient_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .fetch_with_retry(&client.url("2021.json"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TransientServer { .. }));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .fetch_with_retry(&client.url("1900.json"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
}

// Pagination

#[tokio::test]
async fn pagination_collects_advertised_total() {
    let server = MockServer::start().await;
    mount_page(&server, 0, drivers_page(5, &["a", "b"])).await;
    mount_page(&server, 2, drivers_page(5, &["c", "d"])).await;
    mount_page(&server, 4, drivers_page(5, &["e"])).await;

    let client = client_for(&server);
    let result = client.fetch_paginated("drivers", 2).await;

    assert!(result.is_complete());
    assert_eq!(result.total, Some(5));
    assert_eq!(result.items.len(), 5);
    let ids: Vec<&str> = result
        .items
        .iter()
        .map(|d| d["driverId"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn pagination_sends_limit_and_offset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/circuits.json"))
        .and(query_param("limit", "30"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MRData": {"total": "1", "CircuitTable": {"Circuits": [{"circuitId": "monza"}]}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client.fetch_paginated("circuits", 30).await;

    assert!(result.is_complete());
    assert_eq!(result.items[0]["circuitId"], "monza");
}

#[tokio::test]
async fn pagination_failure_keeps_partial_results() {
    let server = MockServer::start().await;
    mount_page(&server, 0, drivers_page(6, &["a", "b"])).await;
    Mock::given(method("GET"))
        .and(path("/drivers.json"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_page(&server, 4, drivers_page(6, &["e", "f"])).await;

    let client = client_for(&server);
    let result = client.fetch_paginated("drivers", 2).await;

    assert!(!result.is_complete());
    assert_eq!(result.items.len(), 2);
    assert_eq!(result.failure.as_ref().and_then(Error::status), Some(404));
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        2,
        "no page after the failed one is requested"
    );
}

#[tokio::test]
async fn pagination_stops_on_empty_page() {
    let server = MockServer::start().await;
    mount_page(&server, 0, drivers_page(10, &["a", "b"])).await;
    mount_page(&server, 2, drivers_page(10, &[])).await;

    let client = client_for(&server);
    let result = client.fetch_paginated("drivers", 2).await;

    assert!(result.is_complete());
    assert_eq!(result.items.len(), 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn pagination_stops_at_first_advertised_total() {
    let server = MockServer::start().await;
    mount_page(&server, 0, drivers_page(3, &["a", "b"])).await;
    mount_page(&server, 2, drivers_page(10, &["c", "d"])).await;
    mount_page(&server, 4, drivers_page(10, &["e", "f"])).await;

    let client = client_for(&server);
    let result = client.fetch_paginated("drivers", 2).await;

    assert!(result.is_complete());
    assert_eq!(result.total, Some(3));
    assert_eq!(result.items.len(), 4);
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        2,
        "a larger total on a later page does not extend the walk"
    );
}

#[tokio::test]
async fn pagination_missing_list_is_schema_mismatch() {
    let server = MockServer::start().await;
    mount_page(&server, 0, json!({"MRData": {"total": "3"}})).await;

    let client = client_for(&server);
    let result = client.fetch_paginated("drivers", 2).await;

    assert!(result.items.is_empty());
    assert!(matches!(
        result.failure,
        Some(Error::SchemaMismatch { ref key, .. }) if key == "DriverTable"
    ));
}

#[tokio::test]
async fn pages_stream_yields_offsets_in_order() {
    let server = MockServer::start().await;
    mount_page(&server, 0, drivers_page(3, &["a", "b"])).await;
    mount_page(&server, 2, drivers_page(3, &["c"])).await;

    let client = client_for(&server);
    let pages: Vec<Page> = client
        .pages("drivers", 2)
        .map(|p| p.unwrap())
        .collect()
        .await;

    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].offset, 0);
    assert_eq!(pages[1].offset, 2);
    assert_eq!(pages[1].total, 3);
}

#[tokio::test]
async fn zero_page_size_reports_invalid_input() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    let result = client.fetch_paginated("drivers", 0).await;

    assert!(matches!(result.failure, Some(Error::InvalidInput(_))));
    assert!(server.received_requests().await.unwrap().is_empty());
}

// Batched concurrency

#[tokio::test]
async fn concurrent_batch_keeps_per_item_errors_in_order() {
    let server = MockServer::start().await;
    for round in ["1", "3"] {
        Mock::given(method("GET"))
            .and(path(format!("/2021/{round}/results.json")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"round": round})))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/2021/2/results.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let requests: Vec<(u32, String)> = (1..=3)
        .map(|round| (round, client.url(&format!("2021/{round}/results.json"))))
        .collect();

    let results = client.fetch_concurrent(requests, 2).await;

    assert_eq!(results.len(), 3, "one result per request");
    assert_eq!(results[0].0, 1);
    assert_eq!(results[0].1.as_ref().unwrap()["round"], "1");
    assert_eq!(results[1].0, 2);
    assert_eq!(results[1].1.as_ref().unwrap_err().status(), Some(404));
    assert_eq!(results[2].1.as_ref().unwrap()["round"], "3");
}

#[tokio::test]
async fn batches_are_separated_by_inter_batch_delay() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let client = client_for(&server).with_batch(BatchConfig {
        batch_size: 2,
        inter_batch_delay: Duration::from_millis(300),
    });
    let requests: Vec<(usize, String)> = (0..5)
        .map(|i| (i, client.url(&format!("{i}.json"))))
        .collect();

    let started = Instant::now();
    let results = client
        .fetch_concurrent(requests, client.batch().batch_size)
        .await;

    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|(_, r)| r.is_ok()));
    // Three batches, two pauses, none after the last batch
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(600), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1500), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn empty_request_list_returns_immediately() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    let results = client.fetch_concurrent(Vec::<(u32, String)>::new(), 10).await;

    assert!(results.is_empty());
}

// Helpers

#[test]
fn table_keys_follow_endpoint_kind() {
    assert_eq!(table_keys("drivers").unwrap(), ("DriverTable", "Drivers"));
    assert_eq!(table_keys("circuits").unwrap(), ("CircuitTable", "Circuits"));
    assert_eq!(table_keys("2021").unwrap(), ("RaceTable", "Races"));
    assert_eq!(table_keys("2021/1/results").unwrap(), ("RaceTable", "Races"));
    assert_eq!(
        table_keys("2021/22/driverStandings.json").unwrap(),
        ("StandingsTable", "StandingsLists")
    );
    assert!(matches!(table_keys("laps/weird"), Err(Error::InvalidInput(_))));
}

#[test]
fn json_at_reports_first_missing_key() {
    let body = json!({"MRData": {"RaceTable": {}}});
    assert!(json_at(&body, &["MRData", "RaceTable"], "ctx").is_ok());

    let err = json_at(&body, &["MRData", "RaceTable", "Races"], "2021.json").unwrap_err();
    match err {
        Error::SchemaMismatch { context, key } => {
            assert_eq!(context, "2021.json");
            assert_eq!(key, "Races");
        }
        other => panic!("expected SchemaMismatch, got {other:?}"),
    }
}

#[test]
fn url_joins_without_double_slash() {
    let client = FetchClient::new(&api_for("http://localhost:1/f1/"), fast_retry(1)).unwrap();
    assert_eq!(client.base_url(), "http://localhost:1/f1");
    assert_eq!(client.url("/drivers.json"), "http://localhost:1/f1/drivers.json");
}

#[test]
fn redact_url_hides_credential_values() {
    let url = "https://api.example.com/v1/history.json?key=abc123&q=26.0325%2C50.5106&dt=2021-03-28";
    let shown = redact_url(url);

    assert!(!shown.contains("abc123"));
    assert!(shown.contains("key=REDACTED"));
    assert!(shown.contains("dt=2021-03-28"));
}

#[test]
fn redact_url_leaves_plain_urls_alone() {
    let url = "http://localhost:1/f1/drivers.json?limit=30&offset=60";
    assert_eq!(redact_url(url), url);
    assert_eq!(redact_url("not a url?token=abc"), "not a url");
}

#[tokio::test]
async fn request_errors_never_carry_credentials() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let base = format!("http://127.0.0.1:{port}");
    let client = FetchClient::new(&api_for(&base), fast_retry(1)).unwrap();

    let err = client
        .fetch_page(&format!("{base}/history.json?key=abc123&dt=2021-03-28"))
        .await
        .unwrap_err();

    assert!(!err.to_string().contains("abc123"), "{err}");
}
