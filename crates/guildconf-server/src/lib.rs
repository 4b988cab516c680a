pub mod reply;
pub mod repository;
pub mod router;
pub mod store;

use std::net::SocketAddr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use guildconf_config::Config;
use guildconf_contracts::{
    ContractsMetadata, ErrorBody, ErrorResponse, Identity, InteractionEvent, InteractionResponse,
    MenuRequest, SetupResponse, SetupStatus, API_VERSION,
};
use guildconf_kernel::route::{EXIT_ACTION, SAVE_ACTION};
use guildconf_kernel::token::{MAX_TOKEN_LEN, SEPARATOR};
use guildconf_kernel::SectionName;
use thiserror::Error;
use tracing::info;

pub use reply::{CollectingResponder, ReplyError, ReplyTracker, Responder};
pub use repository::{InitOutcome, RepositoryError, TenantRepository};
pub use router::{Dispatch, InteractionRouter, RouteError};
pub use store::{
    ConfigStore, ConnectionState, Connector, MemoryConnector, SqliteConnector,
    StoreError, StoreQuery, StoreSettings,
};

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("invalid listen_addr: {0}")]
    ListenAddr(String),
    #[error("config store setup failed: {0}")]
    Store(#[from] StoreError),
    #[error("bind failed: {0}")]
    Bind(std::io::Error),
    #[error("serve failed: {0}")]
    Serve(std::io::Error),
}

pub async fn serve(cfg: Config) -> Result<(), ServeError> {
    let addr: SocketAddr = cfg
        .server
        .listen_addr
        .parse()
        .map_err(|e| ServeError::ListenAddr(format!("{e}")))?;

    let store = ConfigStore::from_config(&cfg.store)?;
    let app = app(InteractionRouter::new(
        TenantRepository::new(store.clone()),
        cfg.ui.footer_text.clone(),
    ));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(ServeError::Bind)?;
    info!(%addr, store = %cfg.store.kind, "guildconf listening");
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServeError::Serve);
    store.shutdown();
    served
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

pub async fn build_app(cfg: Config) -> Result<Router, ServeError> {
    let store = ConfigStore::from_config(&cfg.store)?;
    Ok(app(InteractionRouter::new(
        TenantRepository::new(store),
        cfg.ui.footer_text,
    )))
}

pub fn app(router: InteractionRouter) -> Router {
    Router::new()
        .route("/v1/healthz", get(healthz))
        .route("/v1/contracts", get(contracts))
        .route("/v1/interactions", post(interactions))
        .route("/v1/tenants/{tenant_id}/setup", post(setup))
        .route("/v1/tenants/{tenant_id}/menu", post(menu))
        .with_state(AppState { router })
}

#[derive(Clone)]
struct AppState {
    router: InteractionRouter,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: message.into(),
            },
        }),
    )
}

fn check_tenant_id(tenant_id: &str) -> Result<(), ApiError> {
    if tenant_id.is_empty() || tenant_id.contains(SEPARATOR) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("tenant_id must be non-empty and must not contain `{SEPARATOR}`"),
        ));
    }
    Ok(())
}

async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

async fn contracts() -> Json<ContractsMetadata> {
    Json(ContractsMetadata {
        api_version: API_VERSION.to_string(),
        token_separator: SEPARATOR.to_string(),
        max_token_len: MAX_TOKEN_LEN,
        reserved_actions: vec![SAVE_ACTION.to_string(), EXIT_ACTION.to_string()],
        sections: SectionName::ALL
            .iter()
            .map(|section| section.as_str().to_string())
            .collect(),
    })
}

async fn interactions(
    State(state): State<AppState>,
    Json(event): Json<InteractionEvent>,
) -> Result<(StatusCode, Json<InteractionResponse>), ApiError> {
    let mut responder = CollectingResponder::new();
    match state.router.handle(&event, &mut responder).await {
        Dispatch::Ignored => Ok((StatusCode::ACCEPTED, Json(InteractionResponse::default()))),
        Dispatch::Replied => Ok((
            StatusCode::OK,
            Json(InteractionResponse {
                replies: responder.into_replies(),
            }),
        )),
        Dispatch::ReplyFailed(err) => Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "reply_error",
            err.to_string(),
        )),
    }
}

async fn setup(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<SetupResponse>, ApiError> {
    check_tenant_id(&tenant_id)?;
    let status = match state.router.repository().initialize(&tenant_id).await {
        Ok(InitOutcome::Initialized) => SetupStatus::Initialized,
        Ok(InitOutcome::AlreadyInitialized) => SetupStatus::AlreadyInitialized,
        Err(err) => {
            return Err(api_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "persistence_error",
                err.to_string(),
            ))
        }
    };
    Ok(Json(SetupResponse {
        tenant_id,
        status,
        sections: SectionName::ALL.len(),
    }))
}

async fn menu(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    Json(request): Json<MenuRequest>,
) -> Result<Json<InteractionResponse>, ApiError> {
    check_tenant_id(&tenant_id)?;
    let identity = Identity {
        tenant_id,
        user_id: request.user_id,
    };
    let mut responder = CollectingResponder::new();
    match state.router.open_menu(&identity, &mut responder).await {
        Dispatch::ReplyFailed(err) => Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "reply_error",
            err.to_string(),
        )),
        Dispatch::Ignored | Dispatch::Replied => Ok(Json(InteractionResponse {
            replies: responder.into_replies(),
        })),
    }
}
