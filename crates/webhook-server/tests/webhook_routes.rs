//! Router integration tests against an in-memory database.

use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use webhook_server::config::Config;

const BOUNDARY: &str = "pcf-test-boundary";

async fn test_app() -> (Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::for_tests(dir.path().join("uploads"));
    let app = webhook_server::build(&config).await.unwrap();
    (app, dir)
}

async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn send_json(app: &Router, method: Method, uri: &str, body: &Value) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn post_multipart(
    app: &Router,
    uri: &str,
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &[u8])>,
) -> Response<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn order_payload(item_nos: &[&str]) -> Value {
    let assortments: Vec<Value> = item_nos
        .iter()
        .enumerate()
        .map(|(index, item_no)| {
            json!({
                "_id": 11 + index,
                "itemNo": item_no,
                "name": "Gift set",
                "pcfImages": {
                    "itemPackImages": [[{"componentName": "pack", "image": "YQ=="}]],
                    "displayImages": [{"componentName": "front", "image": "Yg=="}]
                }
            })
        })
        .collect();

    json!({
        "salesOrder": {"id": 1, "customer": "ACME", "customer_po": "PO-1"},
        "assortments": assortments,
        "odooVersion": "17.0"
    })
}

async fn seed_individual(app: &Router, item_no: &str) {
    let response = send_json(
        app,
        Method::POST,
        &format!("/webhook/individual-assortment/{}", item_no),
        &json!({"assortment": {"itemNo": item_no, "name": "Gift set"}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _dir) = test_app().await;
    let response = get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn order_then_individual_switches_source() {
    let (app, _dir) = test_app().await;

    let response = send_json(
        &app,
        Method::POST,
        "/webhook/packing-instruction/SOP1",
        &order_payload(&["A01"]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["status"], "processed");
    assert_eq!(json["data"]["assortmentCount"], 1);
    assert_eq!(json["data"]["totalImages"], 2);

    let response = get(&app, "/webhook/assortment/A01").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["source"], "sales_order");
    assert_eq!(json["data"]["orderName"], "SOP1");
    assert_eq!(json["data"]["salesOrder"]["customer"], "ACME");
    assert!(json["data"]["pcfImages"]["displayImages"][0]["imageHash"].is_string());

    let response = get(&app, "/webhook/assortment/11").await;
    assert_eq!(body_json(response).await["data"]["itemNo"], "A01");

    let response = send_json(
        &app,
        Method::POST,
        "/webhook/assortment/A01/save-individual",
        &json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(&app, "/webhook/assortment/A01").await;
    let json = body_json(response).await;
    assert_eq!(json["source"], "individual");
    assert_eq!(json["data"]["_accessCount"], 1);
    assert_eq!(json["data"]["orderName"], "SOP1");

    let response = get(&app, "/webhook/data/SOP1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "processed");
    assert_eq!(json["data"]["metadata"]["odooVersion"], "17.0");
}

#[tokio::test]
async fn individual_prefix_redirects() {
    let (app, _dir) = test_app().await;
    let payload = order_payload(&["A01"]);

    let response = send_json(
        &app,
        Method::POST,
        "/webhook/packing-instruction/INDIVIDUAL-A01",
        &payload,
    )
    .await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    assert_eq!(location, "/webhook/individual-assortment/A01");

    let response = send_json(&app, Method::POST, &location, &payload).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["assortmentId"], "A01");
    assert_eq!(json["data"]["version"], 1);

    let stats = body_json(get(&app, "/webhook/stats").await).await;
    assert_eq!(stats["data"]["totalOrders"], 0);
    assert_eq!(stats["data"]["individualAssortments"], 1);
}

#[tokio::test]
async fn individual_redirect_encodes_item_no() {
    let (app, _dir) = test_app().await;

    for (item_no, encoded) in [("AB/12", "AB%2F12"), ("Ä01", "%C3%8401")] {
        let payload = order_payload(&[item_no]);
        let response = send_json(
            &app,
            Method::POST,
            "/webhook/packing-instruction/INDIVIDUAL-X",
            &payload,
        )
        .await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
        assert_eq!(location, format!("/webhook/individual-assortment/{}", encoded));

        let response = send_json(&app, Method::POST, &location, &payload).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["assortmentId"], item_no);
    }
}

#[tokio::test]
async fn individual_prefix_with_many_assortments_is_stored() {
    let (app, _dir) = test_app().await;
    let response = send_json(
        &app,
        Method::POST,
        "/webhook/packing-instruction/INDIVIDUAL-MULTI",
        &order_payload(&["A01", "B02"]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn mismatched_item_no_rejected() {
    let (app, _dir) = test_app().await;
    let response = send_json(
        &app,
        Method::POST,
        "/webhook/individual-assortment/A01",
        &json!({"assortment": {"itemNo": "B02"}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["success"], false);
}

#[tokio::test]
async fn missing_records_return_structured_404() {
    let (app, _dir) = test_app().await;

    for uri in ["/webhook/data/NOPE", "/webhook/assortment/Z99", "/preview/Z99"] {
        let response = get(&app, uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert!(json["message"].as_str().unwrap().contains("not found"));
    }

    let response = send_json(
        &app,
        Method::POST,
        "/webhook/assortment/Z99/save-individual",
        &json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stats_and_recent() {
    let (app, _dir) = test_app().await;
    for name in ["SOP1", "SOP2", "SOP3"] {
        let response = send_json(
            &app,
            Method::POST,
            &format!("/webhook/packing-instruction/{}", name),
            &order_payload(&["A01"]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let json = body_json(get(&app, "/webhook/stats").await).await;
    assert_eq!(json["data"]["totalOrders"], 3);
    assert_eq!(json["data"]["recentOrders"], 3);
    assert_eq!(json["data"]["errorOrders"], 0);
    assert_eq!(json["data"]["totalImages"], 6);
    assert_eq!(json["data"]["successRate"], "100.0%");

    let json = body_json(get(&app, "/webhook/recent").await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 3);
    assert_eq!(json["data"][0]["customer"], "ACME");

    let json = body_json(get(&app, "/webhook/recent/2").await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);

    let json = body_json(get(&app, "/webhook/recent/0").await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn lowercase_individual_order_is_stored_and_counted() {
    let (app, _dir) = test_app().await;

    let response = send_json(
        &app,
        Method::POST,
        "/webhook/packing-instruction/individual-a01",
        &order_payload(&["A01"]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "processed");

    let json = body_json(get(&app, "/webhook/stats").await).await;
    assert_eq!(json["data"]["totalOrders"], 1);

    let json = body_json(get(&app, "/webhook/recent").await).await;
    assert_eq!(json["data"][0]["orderName"], "individual-a01");
}

#[tokio::test]
async fn modifications_update_merges() {
    let (app, _dir) = test_app().await;
    seed_individual(&app, "A01").await;

    let response = send_json(
        &app,
        Method::PUT,
        "/webhook/assortment/A01/modifications",
        &json!({
            "imageLabels": {"f1.png": "Front"},
            "formData": {"productInCarton": "12", "unit": "cm"}
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["imageLabels"]["f1.png"], "Front");
    assert_eq!(json["data"]["formData"]["productInCarton"], 12.0);

    let response = send_json(
        &app,
        Method::PUT,
        "/webhook/assortment/NOPE/modifications",
        &json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_serve_and_delete_image() {
    let (app, dir) = test_app().await;
    seed_individual(&app, "A01").await;

    let response = post_multipart(
        &app,
        "/webhook/assortment/A01/images",
        &[("bucket", "display"), ("packIndex", "")],
        Some(("front.png", "image/png", &b"\x89PNG"[..])),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let filename = json["data"]["filename"].as_str().unwrap().to_string();
    assert_eq!(json["data"]["originalName"], "front.png");
    assert!(dir.path().join("uploads").join(&filename).exists());

    let response = get(&app, &format!("/uploads/{}", filename)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(get(&app, "/webhook/assortment/A01").await).await;
    assert_eq!(
        json["data"]["userModifications"]["uploadedImages"]["displayImages"][0]["filename"],
        filename.as_str()
    );

    let response = send_json(
        &app,
        Method::POST,
        "/webhook/assortment/A01/images/delete",
        &json!({"filenames": [filename, "ghost.png"]}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["deleted"][0], filename.as_str());
    assert_eq!(json["data"]["missing"][0], "ghost.png");
    assert!(!dir.path().join("uploads").join(&filename).exists());
}

#[tokio::test]
async fn replace_image() {
    let (app, dir) = test_app().await;
    seed_individual(&app, "A01").await;

    let response = post_multipart(
        &app,
        "/webhook/assortment/A01/images",
        &[("bucket", "itemPack"), ("packIndex", "1")],
        Some(("old.png", "image/png", &b"old"[..])),
    )
    .await;
    let old = body_json(response).await["data"]["filename"]
        .as_str()
        .unwrap()
        .to_string();

    let response = post_multipart(
        &app,
        "/webhook/assortment/A01/images/replace",
        &[("oldFilename", old.as_str()), ("bucket", "itemPack"), ("packIndex", "1")],
        Some(("new.png", "image/png", &b"new"[..])),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let new = body_json(response).await["data"]["filename"]
        .as_str()
        .unwrap()
        .to_string();

    assert!(!dir.path().join("uploads").join(&old).exists());
    assert!(dir.path().join("uploads").join(&new).exists());

    let json = body_json(get(&app, "/webhook/assortment/A01").await).await;
    let packs = &json["data"]["userModifications"]["uploadedImages"]["itemPackImages"];
    assert_eq!(packs[1][0]["filename"], new.as_str());
    assert_eq!(packs[1].as_array().unwrap().len(), 1);

    let response = post_multipart(
        &app,
        "/webhook/assortment/A01/images/replace",
        &[("oldFilename", "ghost.png"), ("bucket", "display")],
        Some(("new.png", "image/png", &b"new"[..])),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rejected_replace_keeps_old_image() {
    let (app, dir) = test_app().await;
    seed_individual(&app, "A01").await;
    let uploads = dir.path().join("uploads");

    let response = post_multipart(
        &app,
        "/webhook/assortment/A01/images",
        &[("bucket", "itemPack"), ("packIndex", "1")],
        Some(("old.png", "image/png", &b"old"[..])),
    )
    .await;
    let old = body_json(response).await["data"]["filename"]
        .as_str()
        .unwrap()
        .to_string();

    let response = post_multipart(
        &app,
        "/webhook/assortment/A01/images/replace",
        &[("oldFilename", old.as_str()), ("bucket", "itemPack"), ("packIndex", "1")],
        Some(("notes.txt", "text/plain", &b"not an image"[..])),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_multipart(
        &app,
        "/webhook/assortment/A01/images/replace",
        &[("oldFilename", old.as_str()), ("bucket", "itemPack"), ("packIndex", "500")],
        Some(("new.png", "image/png", &b"new"[..])),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(uploads.join(&old).exists());
    assert_eq!(std::fs::read_dir(&uploads).unwrap().count(), 1);

    let json = body_json(get(&app, "/webhook/assortment/A01").await).await;
    let packs = &json["data"]["userModifications"]["uploadedImages"]["itemPackImages"];
    assert_eq!(packs[1][0]["filename"], old.as_str());
    assert_eq!(packs[1].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn upload_validation() {
    let (app, _dir) = test_app().await;

    let response = post_multipart(
        &app,
        "/webhook/assortment/NOPE/images",
        &[("bucket", "display")],
        Some(("a.png", "image/png", &b"a"[..])),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    seed_individual(&app, "A01").await;
    let response = post_multipart(
        &app,
        "/webhook/assortment/A01/images",
        &[("bucket", "sideways")],
        Some(("a.png", "image/png", &b"a"[..])),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_multipart(
        &app,
        "/webhook/assortment/A01/images",
        &[("bucket", "display")],
        Some(("a.txt", "text/plain", &b"a"[..])),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn load_metrics_recorded() {
    let (app, _dir) = test_app().await;
    seed_individual(&app, "A01").await;

    let response = send_json(
        &app,
        Method::POST,
        "/webhook/assortment/A01/load",
        &json!({"loadTimeMs": 40, "cacheHit": true}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send_json(
        &app,
        Method::POST,
        "/webhook/assortment/NOPE/load",
        &json!({"loadTimeMs": 40}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn preview_renders_html() {
    let (app, _dir) = test_app().await;
    let response = send_json(
        &app,
        Method::POST,
        "/webhook/packing-instruction/SOP1",
        &order_payload(&["A01"]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(&app, "/preview/A01").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Gift set"));
    assert!(html.contains("ACME"));
}
