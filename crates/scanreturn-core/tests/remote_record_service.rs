use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{
    Form, Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use scanreturn_core::{
    ActivationEngine, ActivationOutcome, ActivationRequest, HttpRecordGateway,
    HttpRecordGatewayConfig, LocalRecordCache, LookupOutcome, MemoryMedium, MessagingService,
    RecordGateway, RemoteEndpoint, ResolutionEngine, ResolutionSource, ResolveError,
    ScanReturnConfig, ScanReturnContext, TagStatus, TagView,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};

#[derive(Debug, Clone, Copy)]
enum StubMode {
    Records,
    /// Accepts writes without storing them.
    Forgetful,
    Markup,
    ServerError,
    Slow(Duration),
}

#[derive(Clone)]
struct StubState {
    mode: StubMode,
    records: Arc<Mutex<HashMap<String, (String, String)>>>,
    calls: Arc<Mutex<Vec<String>>>,
    lookup_headers: Arc<Mutex<Vec<Vec<String>>>>,
}

struct RecordServiceStub {
    endpoint: String,
    calls: Arc<Mutex<Vec<String>>>,
    lookup_headers: Arc<Mutex<Vec<Vec<String>>>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl RecordServiceStub {
    fn endpoint(&self) -> Result<RemoteEndpoint> {
        RemoteEndpoint::parse(&self.endpoint).context("stub endpoint must parse")
    }

    async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    /// Header names of each lookup request, sorted.
    async fn lookup_headers(&self) -> Vec<Vec<String>> {
        self.lookup_headers.lock().await.clone()
    }

    async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn spawn_record_service(
    mode: StubMode,
    records: &[(&str, &str, &str)],
) -> Result<RecordServiceStub> {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let lookup_headers = Arc::new(Mutex::new(Vec::new()));
    let records = records
        .iter()
        .map(|(tag_id, item, phone)| {
            (
                (*tag_id).to_string(),
                ((*item).to_string(), (*phone).to_string()),
            )
        })
        .collect::<HashMap<_, _>>();
    let state = StubState {
        mode,
        records: Arc::new(Mutex::new(records)),
        calls: calls.clone(),
        lookup_headers: lookup_headers.clone(),
    };
    let app = Router::new()
        .route("/exec", get(lookup).post(write))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        let _ = server.await;
    });

    Ok(RecordServiceStub {
        endpoint: format!("http://{addr}/exec"),
        calls,
        lookup_headers,
        shutdown: Some(shutdown_tx),
    })
}

async fn record_call(calls: &Arc<Mutex<Vec<String>>>, call: String) {
    let mut guard = calls.lock().await;
    guard.push(call);
}

async fn lookup(
    State(state): State<StubState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let tag_id = query.get("tag").cloned().unwrap_or_default();
    let mut names = headers
        .keys()
        .map(|name| name.as_str().to_string())
        .collect::<Vec<_>>();
    names.sort();
    state.lookup_headers.lock().await.push(names);
    record_call(&state.calls, format!("lookup:{tag_id}")).await;
    match state.mode {
        StubMode::Markup => {
            return (StatusCode::OK, "<!DOCTYPE html><html>Sign in</html>").into_response();
        }
        StubMode::ServerError => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "script failure" })),
            )
                .into_response();
        }
        StubMode::Slow(delay) => tokio::time::sleep(delay).await,
        StubMode::Records | StubMode::Forgetful => {}
    }
    match state.records.lock().await.get(&tag_id) {
        Some((item, phone)) => Json(json!({
            "status": "found",
            "item": item,
            "phone": phone,
        }))
        .into_response(),
        None => Json(json!({ "status": "not_found" })).into_response(),
    }
}

async fn write(
    State(state): State<StubState>,
    Form(form): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    let field = |name: &str| form.get(name).cloned().unwrap_or_default();
    let (tag_id, item, phone) = (field("tag_id"), field("item_name"), field("phone"));
    record_call(&state.calls, format!("write:{tag_id}:{item}:{phone}")).await;
    if !matches!(state.mode, StubMode::Forgetful) {
        state.records.lock().await.insert(tag_id, (item, phone));
    }
    (StatusCode::OK, "ok")
}

fn gateway(lookup_timeout_ms: u64) -> Result<Arc<HttpRecordGateway>> {
    Ok(Arc::new(HttpRecordGateway::new(HttpRecordGatewayConfig {
        lookup_timeout_ms,
        messaging: MessagingService::default(),
    })?))
}

fn memory_cache() -> Arc<LocalRecordCache> {
    Arc::new(LocalRecordCache::new(
        Arc::new(MemoryMedium::default()),
        MessagingService::default(),
    ))
}

#[tokio::test]
async fn lookup_classifies_found_and_not_found() -> Result<()> {
    let stub = spawn_record_service(
        StubMode::Records,
        &[("ID_0007", "Red Backpack", "+1 555 010 9999")],
    )
    .await?;
    let gateway = gateway(2_000)?;
    let endpoint = stub.endpoint()?;

    let LookupOutcome::Found(record) = gateway.lookup(&endpoint, "ID_0007").await else {
        anyhow::bail!("expected found outcome");
    };
    assert_eq!(record.item_name(), Some("Red Backpack"));
    assert_eq!(record.owner_contact(), Some("+1 555 010 9999"));
    assert_eq!(record.contact_uri(), Some("https://wa.me/15550109999"));

    assert_eq!(
        gateway.lookup(&endpoint, "ID_0404").await,
        LookupOutcome::NotFound
    );
    assert_eq!(
        stub.calls().await,
        vec!["lookup:ID_0007".to_string(), "lookup:ID_0404".to_string()]
    );

    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn lookup_sends_no_custom_headers() -> Result<()> {
    let stub = spawn_record_service(StubMode::Records, &[]).await?;
    let gateway = gateway(2_000)?;
    let endpoint = stub.endpoint()?;

    assert_eq!(
        gateway.lookup(&endpoint, "ID_0001").await,
        LookupOutcome::NotFound
    );

    let headers = stub.lookup_headers().await;
    assert_eq!(headers.len(), 1);
    assert!(
        !headers[0].iter().any(|name| name == "content-type"),
        "{headers:?}"
    );
    assert!(
        headers[0]
            .iter()
            .all(|name| matches!(name.as_str(), "accept" | "host")),
        "only transport defaults are allowed: {headers:?}"
    );

    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn markup_body_degrades_to_cache() -> Result<()> {
    let stub = spawn_record_service(StubMode::Markup, &[]).await?;
    let gateway = gateway(2_000)?;
    let endpoint = stub.endpoint()?;

    let outcome = gateway.lookup(&endpoint, "ID_0001").await;
    assert!(
        matches!(outcome, LookupOutcome::Malformed { .. }),
        "markup must never parse as success: {outcome:?}"
    );

    let engine = ResolutionEngine::new(gateway, memory_cache());
    let resolution = engine.resolve("ID_0001", Some(&endpoint)).await?;
    assert_eq!(resolution.source, ResolutionSource::LocalCache);
    assert_eq!(resolution.record.item_name(), Some("Vintage Leather Wallet"));

    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn server_error_degrades_to_cache() -> Result<()> {
    let stub = spawn_record_service(StubMode::ServerError, &[]).await?;
    let gateway = gateway(2_000)?;
    let endpoint = stub.endpoint()?;

    assert!(matches!(
        gateway.lookup(&endpoint, "ID_0003").await,
        LookupOutcome::Unreachable { .. }
    ));
    let engine = ResolutionEngine::new(gateway, memory_cache());
    let resolution = engine.resolve("ID_0003", Some(&endpoint)).await?;
    assert_eq!(resolution.source, ResolutionSource::LocalCache);
    assert_eq!(resolution.record.status(), TagStatus::New);

    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn slow_lookup_times_out_within_margin() -> Result<()> {
    let stub = spawn_record_service(StubMode::Slow(Duration::from_secs(5)), &[]).await?;
    let gateway = gateway(200)?;
    let endpoint = stub.endpoint()?;

    let started = Instant::now();
    assert_eq!(
        gateway.lookup(&endpoint, "ID_0001").await,
        LookupOutcome::TimedOut
    );
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(1_500), "{elapsed:?}");

    let engine = ResolutionEngine::new(gateway, memory_cache());
    let error = engine
        .resolve("ID_0001", Some(&endpoint))
        .await
        .expect_err("timeout surfaces");
    assert_eq!(
        error,
        ResolveError::TimedOut {
            tag_id: "ID_0001".to_string()
        }
    );

    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn refused_connection_degrades_to_cache() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    let endpoint =
        RemoteEndpoint::parse(&format!("http://{addr}/exec")).context("endpoint parses")?;

    let cache = memory_cache();
    let gateway = gateway(2_000)?;
    let activation = ActivationEngine::new(gateway.clone(), cache.clone())
        .with_local_latency(Duration::ZERO);
    let outcome = activation
        .activate(
            &ActivationRequest::new("ID_0042", "Keys", "15550001111"),
            Some(&endpoint),
        )
        .await?;
    assert!(!outcome.succeeded(), "failed write is reported: {outcome:?}");

    let engine = ResolutionEngine::new(gateway, cache);
    let seeded = engine.resolve("ID_0001", Some(&endpoint)).await?;
    assert_eq!(seeded.source, ResolutionSource::LocalCache);
    assert!(seeded.record.is_active());

    let unknown = engine.resolve("ID_0042", Some(&endpoint)).await?;
    assert_eq!(unknown.record.status(), TagStatus::New);
    Ok(())
}

#[tokio::test]
async fn activation_posts_form_and_remote_becomes_authoritative() -> Result<()> {
    let stub = spawn_record_service(StubMode::Records, &[]).await?;
    let dir = tempfile::tempdir()?;
    let config = ScanReturnConfig {
        data_dir: dir.path().to_path_buf(),
        endpoint_override: Some(stub.endpoint.clone()),
        lookup_timeout_ms: 2_000,
        reentry_delay_ms: 0,
        local_latency_ms: 0,
        ..ScanReturnConfig::default()
    };
    let context = ScanReturnContext::from_config(config)?;

    let mut session = context.session();
    let view = session.open("ID_0050").await?;
    assert_eq!(view.label(), "activating");

    let view = session
        .submit_activation("Blue Umbrella", "+44 7700 900123")
        .await?;
    assert_eq!(view.label(), "success");

    let view = session.confirm_activation().await?;
    let TagView::Found { record } = view else {
        anyhow::bail!("expected found view, got {view:?}");
    };
    assert_eq!(record.item_name(), Some("Blue Umbrella"));
    assert_eq!(record.owner_contact(), Some("447700900123"));

    assert_eq!(
        stub.calls().await,
        vec![
            "lookup:ID_0050".to_string(),
            "write:ID_0050:Blue Umbrella:447700900123".to_string(),
            "lookup:ID_0050".to_string(),
        ]
    );

    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn unrecorded_write_is_corrected_by_next_remote_lookup() -> Result<()> {
    let stub = spawn_record_service(StubMode::Forgetful, &[]).await?;
    let endpoint = stub.endpoint()?;
    let cache = memory_cache();
    let gateway = gateway(2_000)?;
    let activation = ActivationEngine::new(gateway.clone(), cache.clone());

    let outcome = activation
        .activate(
            &ActivationRequest::new("ID_0060", "Scarf", "123456"),
            Some(&endpoint),
        )
        .await?;
    assert!(matches!(outcome, ActivationOutcome::RemoteSubmitted { .. }));
    assert!(cache.get("ID_0060").is_active(), "optimistic local mirror");

    let engine = ResolutionEngine::new(gateway, cache);
    let resolution = engine.resolve("ID_0060", Some(&endpoint)).await?;
    assert_eq!(resolution.source, ResolutionSource::Remote);
    assert_eq!(resolution.record.status(), TagStatus::New);

    stub.stop().await;
    Ok(())
}
