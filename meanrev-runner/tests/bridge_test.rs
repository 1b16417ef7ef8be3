//! Bridge broker against a wiremock gateway.
//!
//! The bridge uses a blocking HTTP client, so every broker call runs on
//! `spawn_blocking` while the mock server lives on the async runtime.

use meanrev_core::broker::{Broker, BrokerError};
use meanrev_core::domain::{OrderIntent, OrderRequest, OrderSide, SubmitOutcome, Timeframe};
use meanrev_runner::{BridgeBroker, BridgeConfig};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn blocking<T, F>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.unwrap()
}

async fn mount_get(server: &MockServer, route: &str, status: u16, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

/// A gateway with a healthy terminal serving one symbol.
async fn gateway() -> MockServer {
    let server = MockServer::start().await;
    mount_get(&server, "/health", 200, json!({"ok": true})).await;
    mount_get(
        &server,
        "/account",
        200,
        json!({"balance": 10000.0, "equity": 9950.5}),
    )
    .await;
    mount_get(
        &server,
        "/tick",
        200,
        json!({"time": 1709632800, "bid": 100.0, "ask": 100.02}),
    )
    .await;
    mount_get(
        &server,
        "/symbol",
        200,
        json!({
            "name": "BTCUSDm", "point": 0.01, "trade_tick_value": 0.01,
            "trade_tick_size": 0.01, "volume_min": 0.01, "volume_max": 100.0,
            "volume_step": 0.01
        }),
    )
    .await;
    mount_get(
        &server,
        "/positions",
        200,
        json!([{"ticket": 5, "symbol": "BTCUSDm", "type": 1, "volume": 0.3, "price_open": 100.1}]),
    )
    .await;
    server
}

fn connected(url: String) -> BridgeBroker {
    let mut broker = BridgeBroker::new(&BridgeConfig {
        url,
        timeout_secs: 5,
    })
    .unwrap();
    broker.connect().unwrap();
    broker
}

#[tokio::test(flavor = "multi_thread")]
async fn bdd_scenario_bridge_reads_market_and_account_data() {
    // GIVEN a gateway serving one symbol, whose bars endpoint expects the full query
    let server = gateway().await;
    Mock::given(method("GET"))
        .and(path("/bars"))
        .and(query_param("symbol", "BTCUSDm"))
        .and(query_param("timeframe", "M1"))
        .and(query_param("count", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"time": 1709632740, "open": 99.0, "high": 101.0, "low": 98.5, "close": 100.0},
            {"time": 1709632800, "open": 100.0, "high": 100.5, "low": 99.5, "close": 100.2}
        ])))
        .expect(1)
        .mount(&server)
        .await;
    let url = server.uri();

    // WHEN the trader's queries are issued
    let (account, tick, info, bars, positions) = blocking(move || {
        let mut broker = connected(url);
        (
            broker.fetch_account().unwrap(),
            broker.fetch_tick("BTCUSDm").unwrap(),
            broker.fetch_symbol_info("BTCUSDm").unwrap(),
            broker.fetch_bars("BTCUSDm", Timeframe::M1, 2).unwrap(),
            broker.fetch_open_positions("BTCUSDm").unwrap(),
        )
    })
    .await;

    // THEN the wire data is translated into domain types
    assert_eq!(account.equity, 9950.5);
    assert_eq!(tick.ask, 100.02);
    assert_eq!(info.symbol, "BTCUSDm");
    assert_eq!(info.tick_value, 0.01);
    assert_eq!(bars.len(), 2);
    assert!(bars[0].time < bars[1].time);
    assert_eq!(bars[1].close, 100.2);
    assert_eq!(positions.len(), 1);
    assert!(positions[0].is_short());
    assert_eq!(positions[0].open_price, 100.1);

    // AND the bars query carried symbol, timeframe and count
    server.verify().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn bdd_scenario_bridge_submits_orders_as_json() {
    // GIVEN a connected bridge whose order endpoint expects the order fields
    let server = gateway().await;
    Mock::given(method("POST"))
        .and(path("/order"))
        .and(body_partial_json(json!({
            "type": "buy",
            "sl": 98.82,
            "magic": 777_001
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "retcode": 10009, "done": true, "ticket": 77, "price": 99.98
        })))
        .expect(1)
        .mount(&server)
        .await;
    let url = server.uri();
    let order = OrderRequest {
        symbol: "BTCUSDm".into(),
        side: OrderSide::Buy,
        intent: OrderIntent::Entry,
        volume: 0.3,
        price: 100.02,
        stop_loss: Some(98.82),
        take_profit: Some(101.82),
        deviation: 20,
        magic: 777_001,
        comment: "meanrev_safe".into(),
    };

    // WHEN an order is submitted
    let outcome = blocking(move || connected(url).submit_order(&order)).await;

    // THEN the fill comes back with the gateway's ticket and price
    assert_eq!(
        outcome,
        Ok(SubmitOutcome::Filled {
            ticket: 77,
            price: 99.98
        })
    );

    // AND the body carried the order fields
    server.verify().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn bdd_scenario_http_errors_are_connectivity_failures() {
    // GIVEN a gateway whose account endpoint is down and whose tick is garbage
    let server = MockServer::start().await;
    mount_get(&server, "/health", 200, json!({})).await;
    mount_get(
        &server,
        "/account",
        503,
        json!({"error": "terminal offline"}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/tick"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;
    let url = server.uri();

    // WHEN the account and a tick are requested
    let (account, tick) = blocking(move || {
        let mut broker = connected(url);
        (broker.fetch_account(), broker.fetch_tick("BTCUSDm"))
    })
    .await;

    // THEN the status error is Connectivity and the bad body is Protocol
    assert!(matches!(account, Err(BrokerError::Connectivity(_))));
    assert!(matches!(tick, Err(BrokerError::Protocol(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn bdd_scenario_unhealthy_gateway_fails_connect() {
    // GIVEN a gateway with no health endpoint
    let server = MockServer::start().await;
    let url = server.uri();

    // WHEN connecting
    let (result, after) = blocking(move || {
        let mut broker = BridgeBroker::new(&BridgeConfig {
            url,
            timeout_secs: 2,
        })
        .unwrap();
        let result = broker.connect();
        (result, broker.fetch_account())
    })
    .await;

    // THEN it is a connectivity failure and later calls report not connected
    assert!(matches!(result, Err(BrokerError::Connectivity(_))));
    assert_eq!(after, Err(BrokerError::NotConnected));
}

#[test]
fn bdd_scenario_unreachable_gateway_fails_connect() {
    // GIVEN an address nothing listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let mut broker = BridgeBroker::new(&BridgeConfig {
        url,
        timeout_secs: 2,
    })
    .unwrap();

    // WHEN connecting
    let result = broker.connect();

    // THEN it is a connectivity failure
    assert!(matches!(result, Err(BrokerError::Connectivity(_))));
}
