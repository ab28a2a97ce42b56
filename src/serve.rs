use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::http::{HeaderValue, header};
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower::ServiceExt;
use tower::service_fn;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

use crate::{
    CanvasSize, DEFAULT_WORKFLOW_NAME, GraphError, GraphStore, NodeCategory, NodeKind, NodePatch,
    NodeStatus, NodeTypeCatalog, Point, Ports, Workflow, WorkflowStatus, canvas_size, ports_of,
    render_svg, route,
};

/// Arguments for running the flowcanvas web server
#[derive(Debug, Clone, Parser)]
#[command(name = "flowcanvas serve", about = "Start the flowcanvas web sync API server.")]
pub struct ServeArgs {
    /// Optional workflow definition to load at startup; omit for an empty
    /// workflow.
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Optional node type catalog to serve instead of the built-in one.
    #[arg(long = "catalog")]
    pub catalog: Option<PathBuf>,

    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 6161)]
    pub port: u16,

    /// Background color for rendered SVG previews.
    #[arg(long = "background-color", default_value = "white")]
    pub background_color: String,
}

pub struct ServeState {
    store: RwLock<GraphStore>,
    catalog: NodeTypeCatalog,
    background: String,
}

impl ServeState {
    pub fn new(store: GraphStore, catalog: NodeTypeCatalog, background: &str) -> Arc<Self> {
        Arc::new(Self {
            store: RwLock::new(store),
            catalog,
            background: background.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkflowPayload {
    id: String,
    name: String,
    status: WorkflowStatus,
    updated_at: DateTime<Utc>,
    canvas_size: CanvasSize,
    nodes: Vec<NodePayload>,
    connections: Vec<ConnectionPayload>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct NodePayload {
    id: String,
    kind: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<NodeCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<String>,
    position: Point,
    width: f32,
    height: f32,
    ports: Ports,
    data: HashMap<String, serde_json::Value>,
    selected: bool,
    status: NodeStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionPayload {
    id: String,
    source: String,
    target: String,
    path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddNodeRequest {
    kind: String,
    position: Point,
    /// When present and naming an existing node, the new node is connected
    /// from it in the same step.
    #[serde(default)]
    source_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddConnectionRequest {
    source: String,
    target: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectionRequest {
    node_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RenameRequest {
    name: String,
}

#[derive(Debug, Serialize)]
struct CreatedPayload {
    id: String,
}

#[derive(Debug, Serialize)]
struct NoticePayload {
    kind: &'static str,
    message: String,
}

pub async fn run_serve(args: ServeArgs, ui_root: Option<PathBuf>) -> Result<()> {
    let workflow = match &args.input {
        Some(path) => Workflow::load(path)?,
        None => Workflow::new(DEFAULT_WORKFLOW_NAME),
    };
    let catalog = match &args.catalog {
        Some(path) => NodeTypeCatalog::load(path)?,
        None => NodeTypeCatalog::builtin(),
    };

    let state = ServeState::new(
        GraphStore::with_workflow(workflow),
        catalog,
        &args.background_color,
    );

    let mut app = build_router(state);

    if let Some(root) = ui_root {
        let static_dir = ServeDir::new(root.clone())
            .append_index_html_on_directories(true)
            .fallback(ServeFile::new(root.join("index.html")));
        let dir_for_service = static_dir.clone();

        let static_service = service_fn(move |req| {
            let svc = dir_for_service.clone();
            async move {
                match svc.oneshot(req).await {
                    Ok(response) => Ok(response.map(axum::body::Body::new)),
                    Err(error) => {
                        let message = format!("Static file error: {error}");
                        Ok((StatusCode::INTERNAL_SERVER_ERROR, message).into_response())
                    }
                }
            }
        });

        app = app.fallback_service(static_service);
    }

    let app = app.layer(CorsLayer::permissive());

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind HTTP server to {addr}"))?;

    println!("flowcanvas server listening on http://{addr}");
    println!("Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}

pub fn build_router(state: Arc<ServeState>) -> Router {
    Router::new()
        .route("/api/workflow", get(get_workflow))
        .route("/api/workflow/svg", get(get_svg))
        .route("/api/catalog", get(get_catalog))
        .route("/api/workflow/nodes", post(post_node))
        .route(
            "/api/workflow/nodes/:id",
            patch(patch_node).delete(delete_node),
        )
        .route("/api/workflow/connections", post(post_connection))
        .route("/api/workflow/connections/:id", delete(delete_connection))
        .route("/api/workflow/selection", put(put_selection))
        .route("/api/workflow/name", put(put_name))
        .route("/api/workflow/run", post(post_run))
        .route("/api/workflow/stop", post(post_stop))
        .route("/api/workflow/save", post(post_save))
        .with_state(state)
}

fn workflow_payload(workflow: &Workflow, catalog: &NodeTypeCatalog) -> WorkflowPayload {
    let nodes = workflow
        .nodes
        .iter()
        .map(|node| {
            let footprint = catalog.footprint_of(&node.kind);
            let kind = catalog.kind(&node.kind);
            NodePayload {
                id: node.id.clone(),
                kind: node.kind.clone(),
                name: kind
                    .map(|kind| kind.name.clone())
                    .unwrap_or_else(|| "Unknown Node".to_string()),
                category: kind.map(|kind| kind.category),
                icon: kind.map(|kind| kind.icon.clone()),
                color: kind.map(|kind| kind.color.clone()),
                position: node.position,
                width: footprint.width,
                height: footprint.height,
                ports: ports_of(node, footprint),
                data: node.data.clone(),
                selected: node.selected,
                status: node.status,
            }
        })
        .collect();

    let connections = route(workflow, catalog)
        .into_iter()
        .map(|routed| ConnectionPayload {
            id: routed.id,
            source: routed.source,
            target: routed.target,
            path: routed.curve.to_path(),
        })
        .collect();

    WorkflowPayload {
        id: workflow.id.clone(),
        name: workflow.name.clone(),
        status: workflow.status,
        updated_at: workflow.updated_at,
        canvas_size: canvas_size(workflow, catalog),
        nodes,
        connections,
    }
}

async fn get_workflow(State(state): State<Arc<ServeState>>) -> Json<WorkflowPayload> {
    let store = state.store.read().await;
    Json(workflow_payload(store.workflow(), &state.catalog))
}

async fn get_svg(State(state): State<Arc<ServeState>>) -> Result<Response, (StatusCode, String)> {
    let store = state.store.read().await;
    let svg = render_svg(store.workflow(), &state.catalog, &state.background)
        .map_err(internal_error)?;

    let mut response = Response::new(svg.into());
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("image/svg+xml"),
    );
    Ok(response)
}

async fn get_catalog(State(state): State<Arc<ServeState>>) -> Json<Vec<NodeKind>> {
    Json(state.catalog.kinds().to_vec())
}

async fn post_node(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<AddNodeRequest>,
) -> (StatusCode, Json<CreatedPayload>) {
    let mut store = state.store.write().await;
    let id = store.add_node_linked(&request.kind, request.position, request.source_id.as_deref());
    (StatusCode::CREATED, Json(CreatedPayload { id }))
}

async fn patch_node(
    State(state): State<Arc<ServeState>>,
    AxumPath(node_id): AxumPath<String>,
    Json(patch): Json<NodePatch>,
) -> Result<StatusCode, (StatusCode, String)> {
    let mut store = state.store.write().await;
    store
        .update_node(&node_id, patch)
        .map_err(graph_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_node(
    State(state): State<Arc<ServeState>>,
    AxumPath(node_id): AxumPath<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let mut store = state.store.write().await;
    store.delete_node(&node_id).map_err(graph_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn post_connection(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<AddConnectionRequest>,
) -> Result<(StatusCode, Json<CreatedPayload>), (StatusCode, String)> {
    let mut store = state.store.write().await;
    let id = store
        .add_connection(&request.source, &request.target)
        .map_err(graph_error_response)?;
    Ok((StatusCode::CREATED, Json(CreatedPayload { id })))
}

async fn delete_connection(
    State(state): State<Arc<ServeState>>,
    AxumPath(connection_id): AxumPath<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let mut store = state.store.write().await;
    store
        .delete_connection(&connection_id)
        .map_err(graph_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn put_selection(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<SelectionRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    let mut store = state.store.write().await;
    store
        .select_node(request.node_id.as_deref())
        .map_err(graph_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn put_name(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<RenameRequest>,
) -> StatusCode {
    let mut store = state.store.write().await;
    store.rename_workflow(&request.name);
    StatusCode::NO_CONTENT
}

/// Execution is out of scope: run/stop/save only answer with the
/// notification the frontend should display.
async fn post_run(State(state): State<Arc<ServeState>>) -> Json<NoticePayload> {
    let store = state.store.read().await;
    let notice = if store.workflow().nodes.is_empty() {
        NoticePayload {
            kind: "error",
            message: "Add nodes to your workflow before executing".to_string(),
        }
    } else {
        NoticePayload {
            kind: "success",
            message: "Workflow execution started".to_string(),
        }
    };
    Json(notice)
}

async fn post_stop() -> Json<NoticePayload> {
    Json(NoticePayload {
        kind: "info",
        message: "Workflow execution stopped".to_string(),
    })
}

async fn post_save() -> Json<NoticePayload> {
    Json(NoticePayload {
        kind: "success",
        message: "Workflow saved successfully".to_string(),
    })
}

fn graph_error_response(err: GraphError) -> (StatusCode, String) {
    let status = match err {
        GraphError::NodeNotFound(_) | GraphError::ConnectionNotFound(_) => StatusCode::NOT_FOUND,
        GraphError::DuplicateConnection { .. } => StatusCode::CONFLICT,
        GraphError::UnknownEndpoint(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };
    (status, err.to_string())
}

fn internal_error(err: anyhow::Error) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}
