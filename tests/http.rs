use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{json, Value};
use sesam_odata::config::context::build_context;
use sesam_odata::config::schema::load_config_from_string;
use sesam_odata::frontend::http::filters;
use tokio::sync::oneshot;
use tokio::sync::oneshot::Sender;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const TOKEN: &str = "e2e-token";

fn order_lines(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "_id": format!("order-lines:{i}"),
                "_deleted": false,
                "_updated": i,
                "order-lines:sku": format!("SKU-{i}"),
                "order-lines:qty": i,
                "order-lines:shipped": "~t2023-02-01T10:00:00Z",
                "order-lines:note": null
            })
        })
        .collect()
}

// Serves `since`/`limit` windows of the dataset like the Sesam entities endpoint
struct EntitiesResponder(Vec<Value>);

impl Respond for EntitiesResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let param = |name: &str| {
            request
                .url
                .query_pairs()
                .find(|(k, _)| k == name)
                .and_then(|(_, v)| v.parse::<usize>().ok())
        };
        let since = param("since").unwrap_or(0);
        let limit = param("limit").unwrap_or(usize::MAX);

        let page: Vec<Value> = self.0.iter().skip(since).take(limit).cloned().collect();
        ResponseTemplate::new(200).set_body_json(page)
    }
}

async fn mock_sesam(entity_count: usize) -> MockServer {
    let server = MockServer::start().await;
    let auth = format!("Bearer {TOKEN}");

    Mock::given(method("GET"))
        .and(path("/api/datasets"))
        .and(header("Authorization", auth.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"_id": "order-lines", "runtime": {"origin": "user"}},
            {"_id": "broken", "runtime": {"origin": "user"}},
            {"_id": "system:config", "runtime": {"origin": "system"}}
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/pipes/order-lines/generate-schema-definition"))
        .and(query_param("sample_size", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "order-lines:sku", "type": "string"},
            {"name": "order-lines:qty", "type": "integer"},
            {"name": "order-lines:shipped", "type": "datetime"},
            {"name": "order-lines:note", "type": "string"}
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/pipes/broken/generate-schema-definition"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/datasets/order-lines/entities"))
        .and(query_param("deleted", "false"))
        .and(header("Authorization", auth.as_str()))
        .respond_with(EntitiesResponder(order_lines(entity_count)))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/datasets/order-lines/entity"))
        .and(query_param("entity_id", "order-lines:7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&order_lines(8)[7]))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/datasets/order-lines/entity"))
        .and(query_param("entity_id", "order-lines:999"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    server
}

/// Start the gateway on a random free port against the mock Sesam instance.
/// Returns the server's address, the server future and a channel to stop it.
async fn make_gateway(
    sesam: &MockServer,
) -> (
    SocketAddr,
    Pin<Box<dyn std::future::Future<Output = ()> + Send>>,
    Sender<()>,
) {
    let config_text = format!(
        r#"
[remote]
host = "{}"
token = "{TOKEN}"
scheme = "http"

[misc]
page_size = 10
"#,
        sesam.address()
    );

    let config = load_config_from_string(&config_text, false).unwrap();
    let context = build_context(&config).await.unwrap();

    let (tx, rx) = oneshot::channel();
    let (addr, server) = warp::serve(filters(Arc::new(context))).bind_with_graceful_shutdown(
        // Pass port :0 to pick a random free port
        "127.0.0.1:0".parse::<SocketAddr>().unwrap(),
        async {
            rx.await.ok();
        },
    );

    (addr, Box::pin(server), tx)
}

async fn get_json(client: &reqwest::Client, url: &str) -> (reqwest::StatusCode, Value) {
    let resp = client.get(url).send().await.unwrap();
    let status = resp.status();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn test_http_gateway_end_to_end() {
    let sesam = mock_sesam(25).await;
    let (addr, server, terminate) = make_gateway(&sesam).await;
    tokio::task::spawn(server);
    let client = reqwest::Client::new();
    let root = format!("http://{addr}/sesam.svc");

    // Only the user dataset with a working schema is exposed
    let (status, doc) = get_json(&client, &root).await;
    assert_eq!(status, 200);
    assert_eq!(
        doc["value"],
        json!([{"name": "OrderLines_set", "kind": "EntitySet", "url": "OrderLines_set"}])
    );

    let (_, metadata) = get_json(&client, &format!("{root}/$metadata")).await;
    let order_line = &metadata["Sesam.io"]["OrderLines"];
    assert_eq!(order_line["$Key"], json!(["_id"]));
    assert_eq!(order_line["qty"]["$Type"], "Edm.Int64");
    assert_eq!(order_line["shipped"]["$Type"], "Edm.DateTimeOffset");

    // Follow next links until the collection is exhausted
    let mut url = format!("{root}/OrderLines_set");
    let mut pages = vec![];
    loop {
        let (status, page) = get_json(&client, &url).await;
        assert_eq!(status, 200);
        pages.push(page["value"].as_array().unwrap().len());

        match page.get("@odata.nextLink").and_then(Value::as_str) {
            Some(next) => url = next.to_string(),
            None => break,
        }
    }
    assert_eq!(pages, vec![10, 10, 5]);

    let (_, page) = get_json(&client, &format!("{root}/OrderLines_set?$top=3")).await;
    assert_eq!(
        page["value"][2],
        json!({
            "@odata.id": "OrderLines_set('2')",
            "_id": "2",
            "sku": "SKU-2",
            "qty": 2,
            "shipped": "2023-02-01T10:00:00Z",
            "note": null
        })
    );

    let (status, entity) = get_json(&client, &format!("{root}/OrderLines_set('7')")).await;
    assert_eq!(status, 200);
    assert_eq!(entity["sku"], "SKU-7");
    assert_eq!(entity["@odata.id"], "OrderLines_set('7')");

    let (status, _) = get_json(&client, &format!("{root}/OrderLines_set('999')")).await;
    assert_eq!(status, 404);

    let (status, empty) = get_json(&client, &format!("{root}/Broken_set")).await;
    assert_eq!(status, 200);
    assert_eq!(empty["value"], json!([]));

    let resp = client
        .post(format!("{root}/OrderLines_set"))
        .json(&json!({"sku": "new"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 501);

    terminate.send(()).unwrap();
}

#[tokio::test]
async fn test_http_gateway_remote_failure() {
    let sesam = mock_sesam(5).await;
    let (addr, server, terminate) = make_gateway(&sesam).await;
    tokio::task::spawn(server);

    // Sesam goes away after discovery
    sesam.reset().await;

    let client = reqwest::Client::new();
    let (status, body) =
        get_json(&client, &format!("http://{addr}/sesam.svc/OrderLines_set")).await;
    assert_eq!(status, 502);
    assert_eq!(body["error"]["code"], "502");

    terminate.send(()).unwrap();
}
