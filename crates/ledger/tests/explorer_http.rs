use ledger::explorer::ExplorerClient;
use ledger::TransactionHistory;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ADDRESS: &str = "0x1111111111111111111111111111111111111111";

fn tx(n: u32) -> Value {
    json!({
        "blockNumber": n.to_string(),
        "timeStamp": (1_760_000_000 + n).to_string(),
        "hash": format!("0x{n:064x}"),
        "from": "0x2222222222222222222222222222222222222222",
        "to": ADDRESS,
        "value": "1000",
        "input": "0x",
        "isError": "0"
    })
}

fn ok(txs: Vec<Value>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"status": "1", "message": "OK", "result": txs}))
}

async fn mount_page(server: &MockServer, page: &str, body: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("action", "txlist"))
        .and(query_param("address", ADDRESS))
        .and(query_param("page", page))
        .and(query_param("offset", "2"))
        .and(query_param_is_missing("endblock"))
        .respond_with(body)
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn walks_pages_until_a_short_one() {
    let server = MockServer::start().await;
    mount_page(&server, "1", ok(vec![tx(1), tx(2)])).await;
    mount_page(&server, "2", ok(vec![tx(3)])).await;

    let client = ExplorerClient::with_limits(format!("{}/api", server.uri()), None, 2, 10);
    let txs = client.fetch(ADDRESS).await.unwrap();

    assert_eq!(txs.len(), 3);
    assert_eq!(txs[2].timestamp, 1_760_000_003);
}

#[tokio::test]
async fn exact_multiple_ends_on_empty_page() {
    let server = MockServer::start().await;
    mount_page(&server, "1", ok(vec![tx(1), tx(2)])).await;
    mount_page(
        &server,
        "2",
        ResponseTemplate::new(200).set_body_json(json!({
            "status": "0", "message": "No transactions found", "result": []
        })),
    )
    .await;

    let client = ExplorerClient::with_limits(format!("{}/api", server.uri()), None, 2, 10);
    assert_eq!(client.fetch(ADDRESS).await.unwrap().len(), 2);
}

#[tokio::test]
async fn full_result_window_is_an_error() {
    let server = MockServer::start().await;
    mount_page(&server, "1", ok(vec![tx(1), tx(2)])).await;
    mount_page(&server, "2", ok(vec![tx(3), tx(4)])).await;

    let client = ExplorerClient::with_limits(format!("{}/api", server.uri()), None, 2, 4);
    let err = client.fetch(ADDRESS).await.unwrap_err();

    assert!(err.0.contains("exceeds"), "{err}");
}

#[tokio::test]
async fn failing_page_fails_the_fetch() {
    let server = MockServer::start().await;
    mount_page(&server, "1", ok(vec![tx(1), tx(2)])).await;
    mount_page(&server, "2", ResponseTemplate::new(502)).await;

    let client = ExplorerClient::with_limits(format!("{}/api", server.uri()), None, 2, 10);
    assert!(client.fetch(ADDRESS).await.is_err());
}
