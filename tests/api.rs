#![cfg(feature = "server")]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use flowcanvas::{GraphStore, NodeTypeCatalog, ServeState, build_router};

fn test_router() -> Router {
    build_router(ServeState::new(
        GraphStore::new(),
        NodeTypeCatalog::builtin(),
        "white",
    ))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is json")
}

async fn create_node(app: &Router, kind: &str, x: f32, y: f32) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/workflow/nodes",
            json!({ "kind": kind, "position": { "x": x, "y": y } }),
        ))
        .await
        .expect("request succeeds");
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"]
        .as_str()
        .expect("created id")
        .to_string()
}

#[tokio::test]
async fn nodes_and_connections_round_trip_through_the_api() {
    let app = test_router();

    let source = create_node(&app, "energy-meter", 120.0, 140.0).await;
    let target = create_node(&app, "transform", 380.0, 160.0).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/workflow/connections",
            json!({ "source": source, "target": target }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let workflow = body_json(
        app.clone()
            .oneshot(get_request("/api/workflow"))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(workflow["nodes"].as_array().unwrap().len(), 2);
    let connections = workflow["connections"].as_array().unwrap();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0]["source"], json!(source));
    let path = connections[0]["path"].as_str().unwrap();
    assert!(path.starts_with("M "), "connection carries a bezier path");
    assert!(path.contains(" C "), "connection carries a bezier path");

    // The catalog resolved node metadata into the payload.
    assert_eq!(workflow["nodes"][0]["name"], json!("Energy Meter"));
}

#[tokio::test]
async fn duplicate_connections_conflict_and_unknown_endpoints_are_rejected() {
    let app = test_router();

    let source = create_node(&app, "database", 0.0, 0.0).await;
    let target = create_node(&app, "output", 240.0, 0.0).await;

    let first = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/workflow/connections",
            json!({ "source": source, "target": target }),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let duplicate = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/workflow/connections",
            json!({ "source": source, "target": target }),
        ))
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let dangling = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/workflow/connections",
            json!({ "source": source, "target": "node-404" }),
        ))
        .await
        .unwrap();
    assert_eq!(dangling.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn deleting_a_node_cascades_to_its_connections() {
    let app = test_router();

    let source = create_node(&app, "database", 0.0, 0.0).await;
    let target = create_node(&app, "transform", 240.0, 0.0).await;
    app.clone()
        .oneshot(json_request(
            "POST",
            "/api/workflow/connections",
            json!({ "source": source, "target": target }),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/workflow/nodes/{source}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let workflow = body_json(
        app.clone()
            .oneshot(get_request("/api/workflow"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(workflow["nodes"].as_array().unwrap().len(), 1);
    assert!(workflow["connections"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn patching_an_unknown_node_is_not_found() {
    let app = test_router();

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            "/api/workflow/nodes/node-404",
            json!({ "position": { "x": 10.0, "y": 10.0 } }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn selection_and_data_patches_apply() {
    let app = test_router();

    let id = create_node(&app, "database", 50.0, 50.0).await;

    let patched = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/api/workflow/nodes/{id}"),
            json!({ "data": { "table": "sensor_data" }, "status": "running" }),
        ))
        .await
        .unwrap();
    assert_eq!(patched.status(), StatusCode::NO_CONTENT);

    let selected = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/workflow/selection",
            json!({ "nodeId": id }),
        ))
        .await
        .unwrap();
    assert_eq!(selected.status(), StatusCode::NO_CONTENT);

    let workflow = body_json(
        app.clone()
            .oneshot(get_request("/api/workflow"))
            .await
            .unwrap(),
    )
    .await;
    let node = &workflow["nodes"][0];
    assert_eq!(node["data"]["table"], json!("sensor_data"));
    assert_eq!(node["status"], json!("running"));
    assert_eq!(node["selected"], json!(true));

    let cleared = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/workflow/selection",
            json!({ "nodeId": null }),
        ))
        .await
        .unwrap();
    assert_eq!(cleared.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn run_and_save_only_answer_with_notifications() {
    let app = test_router();

    let empty_run = body_json(
        app.clone()
            .oneshot(json_request("POST", "/api/workflow/run", json!({})))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(empty_run["kind"], json!("error"));

    create_node(&app, "scheduler", 40.0, 40.0).await;

    let run = body_json(
        app.clone()
            .oneshot(json_request("POST", "/api/workflow/run", json!({})))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(run["kind"], json!("success"));
    assert_eq!(run["message"], json!("Workflow execution started"));

    let save = body_json(
        app.clone()
            .oneshot(json_request("POST", "/api/workflow/save", json!({})))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(save["kind"], json!("success"));

    // Run/save change nothing: still exactly one node, no connections.
    let workflow = body_json(
        app.clone()
            .oneshot(get_request("/api/workflow"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(workflow["nodes"].as_array().unwrap().len(), 1);
    assert!(workflow["connections"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn svg_preview_is_served_with_the_right_content_type() {
    let app = test_router();
    create_node(&app, "energy-meter", 100.0, 100.0).await;

    let response = app
        .clone()
        .oneshot(get_request("/api/workflow/svg"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "image/svg+xml"
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let svg = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(svg.contains("<svg"));
}

#[tokio::test]
async fn catalog_lists_builtin_kinds_with_config_templates() {
    let app = test_router();

    let catalog = body_json(
        app.clone()
            .oneshot(get_request("/api/catalog"))
            .await
            .unwrap(),
    )
    .await;

    let kinds = catalog.as_array().unwrap();
    assert_eq!(kinds.len(), 9);

    let database = kinds
        .iter()
        .find(|kind| kind["id"] == json!("database"))
        .expect("builtin database kind");
    assert_eq!(database["category"], json!("source"));
    assert_eq!(
        database["configFields"][0]["key"],
        json!("connectionString")
    );
}
