//! Config Store: pooled access to `(tenant, section) -> settings_json` rows,
//! with a lifecycle that survives connectivity loss.
//!
//! Lifecycle: `Uninitialized -> Connected -> Disconnected -> Reconnecting ->
//! Connected`. At most one reconnection attempt runs at a time, and a new
//! attempt is not started within `reconnect_throttle` of the previous one.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use guildconf_config::Store;
use parking_lot::Mutex;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, ErrorCode};
use thiserror::Error;
use tokio::sync::{OnceCell, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Connectivity(String),
    #[error("store query failed: {0}")]
    Query(String),
    #[error("section document could not be serialized: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, StoreError::Connectivity(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionRow {
    pub tenant_id: String,
    pub section: String,
    pub settings_json: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreQuery {
    SelectTenant { tenant_id: String },
    UpsertSection(SectionRow),
    Ping,
}

impl StoreQuery {
    pub fn name(&self) -> &'static str {
        match self {
            StoreQuery::SelectTenant { .. } => "select_tenant",
            StoreQuery::UpsertSection(_) => "upsert_section",
            StoreQuery::Ping => "ping",
        }
    }

    pub fn param_count(&self) -> usize {
        match self {
            StoreQuery::SelectTenant { .. } => 1,
            StoreQuery::UpsertSection(_) => 4,
            StoreQuery::Ping => 0,
        }
    }
}

/// A built pool. Calls block; the store runs them off the async workers.
pub trait Pool: Send + Sync {
    fn execute(&self, query: &StoreQuery) -> Result<Vec<SectionRow>, StoreError>;
}

pub trait Connector: Send + Sync + 'static {
    /// One-time preparation of the backing database before the first pool.
    fn bootstrap(&self) -> Result<(), StoreError>;

    fn connect(&self, max_connections: u32, acquire_timeout: Duration) -> Result<Arc<dyn Pool>, StoreError>;
}

/// `updated_at` is write bookkeeping. It is not part of a `SectionRow` and no
/// query reads it back.
const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS tenant_sections (
        tenant_id TEXT NOT NULL,
        section TEXT NOT NULL,
        settings_json TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (tenant_id, section)
    );
";

#[derive(Debug, Clone)]
pub struct SqliteConnector {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// How long a pooled connection waits on another writer's lock.
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }
}

impl Connector for SqliteConnector {
    fn bootstrap(&self) -> Result<(), StoreError> {
        let existed = self.path.exists();
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Connectivity(e.to_string()))?;
        }
        let conn = Connection::open(&self.path).map_err(classify)?;
        conn.execute_batch(SCHEMA).map_err(classify)?;
        if existed {
            info!(path = %self.path.display(), "sqlite database verified");
        } else {
            info!(path = %self.path.display(), "sqlite database created");
        }
        Ok(())
    }

    fn connect(&self, max_connections: u32, acquire_timeout: Duration) -> Result<Arc<dyn Pool>, StoreError> {
        let busy_timeout = self.busy_timeout;
        let manager =
            SqliteConnectionManager::file(&self.path).with_init(move |conn| conn.busy_timeout(busy_timeout));
        let pool = r2d2::Pool::builder()
            .max_size(max_connections)
            .connection_timeout(acquire_timeout)
            .build(manager)
            .map_err(|e| StoreError::Connectivity(e.to_string()))?;
        Ok(Arc::new(SqlitePool { pool }))
    }
}

struct SqlitePool {
    pool: r2d2::Pool<SqliteConnectionManager>,
}

impl Pool for SqlitePool {
    fn execute(&self, query: &StoreQuery) -> Result<Vec<SectionRow>, StoreError> {
        let conn = self
            .pool
            .get()
            .map_err(|e| StoreError::Connectivity(e.to_string()))?;
        match query {
            StoreQuery::SelectTenant { tenant_id } => {
                let mut stmt = conn
                    .prepare(
                        "SELECT section, settings_json FROM tenant_sections
                         WHERE tenant_id = ?1 ORDER BY section",
                    )
                    .map_err(classify)?;
                let rows = stmt
                    .query_map(params![tenant_id], |row| {
                        Ok(SectionRow {
                            tenant_id: tenant_id.clone(),
                            section: row.get(0)?,
                            settings_json: row.get(1)?,
                        })
                    })
                    .map_err(classify)?;
                let sections = rows.collect::<Result<Vec<_>, _>>().map_err(classify)?;
                Ok(sections)
            }
            StoreQuery::UpsertSection(row) => {
                conn.execute(
                    "INSERT INTO tenant_sections(tenant_id, section, settings_json, updated_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(tenant_id, section) DO UPDATE SET
                        settings_json = excluded.settings_json,
                        updated_at = excluded.updated_at",
                    params![
                        row.tenant_id,
                        row.section,
                        row.settings_json,
                        chrono::Utc::now().to_rfc3339()
                    ],
                )
                .map_err(classify)?;
                Ok(Vec::new())
            }
            StoreQuery::Ping => {
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                    .map_err(classify)?;
                Ok(Vec::new())
            }
        }
    }
}

/// Only failures to reach the database file count as lost connectivity. A
/// busy or locked database is still reachable; the operation fails on its own.
fn classify(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(
                failure.code,
                ErrorCode::CannotOpen | ErrorCode::SystemIoFailure | ErrorCode::NotADatabase
            ) =>
        {
            StoreError::Connectivity(err.to_string())
        }
        _ => StoreError::Query(err.to_string()),
    }
}

#[derive(Debug, Default)]
struct MemoryDatabase {
    rows: Mutex<BTreeMap<(String, String), String>>,
}

/// In-process backend for `store.type: memory`. Clones share one database.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    db: Arc<MemoryDatabase>,
}

impl Connector for MemoryConnector {
    fn bootstrap(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn connect(&self, _max_connections: u32, _acquire_timeout: Duration) -> Result<Arc<dyn Pool>, StoreError> {
        Ok(Arc::new(MemoryPool {
            db: self.db.clone(),
        }))
    }
}

struct MemoryPool {
    db: Arc<MemoryDatabase>,
}

impl Pool for MemoryPool {
    fn execute(&self, query: &StoreQuery) -> Result<Vec<SectionRow>, StoreError> {
        let mut rows = self.db.rows.lock();
        match query {
            StoreQuery::SelectTenant { tenant_id } => Ok(rows
                .iter()
                .filter(|((tenant, _), _)| tenant == tenant_id)
                .map(|((tenant, section), json)| SectionRow {
                    tenant_id: tenant.clone(),
                    section: section.clone(),
                    settings_json: json.clone(),
                })
                .collect()),
            StoreQuery::UpsertSection(row) => {
                rows.insert(
                    (row.tenant_id.clone(), row.section.clone()),
                    row.settings_json.clone(),
                );
                Ok(Vec::new())
            }
            StoreQuery::Ping => Ok(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub reconnect_throttle: Duration,
}

impl StoreSettings {
    pub fn from_config(store: &Store) -> Self {
        Self {
            max_connections: store.max_connections.max(1),
            acquire_timeout: Duration::from_millis(store.acquire_timeout_ms),
            reconnect_throttle: Duration::from_millis(store.reconnect_throttle_ms),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self::from_config(&Store::memory())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Connected,
    Disconnected,
    Reconnecting,
}

struct Lifecycle {
    state: ConnectionState,
    pool: Option<Arc<dyn Pool>>,
    /// Bumped whenever a pool is installed or dropped, so a failure seen on an
    /// old pool cannot tear down its replacement.
    epoch: u64,
    last_attempt: Option<Instant>,
    attempts: u64,
}

struct StoreInner {
    connector: Arc<dyn Connector>,
    settings: StoreSettings,
    permits: Semaphore,
    bootstrapped: OnceCell<()>,
    init: tokio::sync::Mutex<()>,
    lifecycle: Mutex<Lifecycle>,
}

/// Process-wide handle to the backing database. Cloning shares the pool.
#[derive(Clone)]
pub struct ConfigStore {
    inner: Arc<StoreInner>,
}

impl ConfigStore {
    pub fn new(connector: Arc<dyn Connector>, settings: StoreSettings) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                connector,
                permits: Semaphore::new(settings.max_connections as usize),
                settings,
                bootstrapped: OnceCell::new(),
                init: tokio::sync::Mutex::new(()),
                lifecycle: Mutex::new(Lifecycle {
                    state: ConnectionState::Uninitialized,
                    pool: None,
                    epoch: 0,
                    last_attempt: None,
                    attempts: 0,
                }),
            }),
        }
    }

    pub fn from_config(store: &Store) -> Result<Self, StoreError> {
        let connector: Arc<dyn Connector> = match store.kind.as_str() {
            "sqlite" => {
                let path = store.sqlite_path.as_deref().ok_or_else(|| {
                    StoreError::Connectivity("store.sqlite_path is required for sqlite store".to_string())
                })?;
                Arc::new(
                    SqliteConnector::new(path)
                        .with_busy_timeout(Duration::from_millis(store.busy_timeout_ms)),
                )
            }
            "memory" => Arc::new(MemoryConnector::default()),
            other => {
                return Err(StoreError::Connectivity(format!(
                    "unsupported store.type `{other}`"
                )))
            }
        };
        Ok(Self::new(connector, StoreSettings::from_config(store)))
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lifecycle.lock().state
    }

    /// Completed reconnection attempts, successful or not.
    pub fn reconnect_attempts(&self) -> u64 {
        self.inner.lifecycle.lock().attempts
    }

    /// Runs one operation on a pooled connection. Callers beyond
    /// `max_connections` wait for a permit.
    pub async fn execute(&self, query: StoreQuery) -> Result<Vec<SectionRow>, StoreError> {
        let _permit = self
            .inner
            .permits
            .acquire()
            .await
            .map_err(|_| StoreError::Connectivity("store is closed".to_string()))?;
        let (pool, epoch) = self.pool().await?;

        debug!(
            operation = query.name(),
            params = query.param_count(),
            "store operation"
        );
        let result = run_blocking(move || pool.execute(&query)).await;
        if let Err(err) = &result {
            if err.is_connectivity() {
                self.connection_lost(epoch, err);
            }
        }
        result
    }

    /// Drops the pool. The next operation builds a fresh one.
    pub fn shutdown(&self) {
        let mut lifecycle = self.inner.lifecycle.lock();
        lifecycle.pool = None;
        lifecycle.epoch += 1;
        lifecycle.state = ConnectionState::Uninitialized;
        lifecycle.last_attempt = None;
        info!("config store shut down");
    }

    async fn pool(&self) -> Result<(Arc<dyn Pool>, u64), StoreError> {
        if let Some(ready) = self.current_pool()? {
            return Ok(ready);
        }

        let _init = self.inner.init.lock().await;
        if let Some(ready) = self.current_pool()? {
            return Ok(ready);
        }

        let connector = self.inner.connector.clone();
        self.inner
            .bootstrapped
            .get_or_try_init(|| run_blocking(move || connector.bootstrap()))
            .await?;

        let connector = self.inner.connector.clone();
        let settings = self.inner.settings;
        let pool =
            run_blocking(move || connector.connect(settings.max_connections, settings.acquire_timeout)).await?;

        let mut lifecycle = self.inner.lifecycle.lock();
        lifecycle.epoch += 1;
        lifecycle.pool = Some(pool.clone());
        lifecycle.state = ConnectionState::Connected;
        info!(max_connections = settings.max_connections, "config store pool built");
        Ok((pool, lifecycle.epoch))
    }

    /// `Ok(None)` means the store still has to be initialized.
    fn current_pool(&self) -> Result<Option<(Arc<dyn Pool>, u64)>, StoreError> {
        let state = {
            let lifecycle = self.inner.lifecycle.lock();
            if let Some(pool) = &lifecycle.pool {
                return Ok(Some((pool.clone(), lifecycle.epoch)));
            }
            lifecycle.state
        };
        match state {
            ConnectionState::Uninitialized => Ok(None),
            ConnectionState::Disconnected => {
                self.schedule_reconnect();
                Err(StoreError::Connectivity("config store is disconnected".to_string()))
            }
            ConnectionState::Connected | ConnectionState::Reconnecting => Err(
                StoreError::Connectivity("config store is reconnecting".to_string()),
            ),
        }
    }

    fn connection_lost(&self, epoch: u64, err: &StoreError) {
        {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.epoch != epoch || lifecycle.state != ConnectionState::Connected {
                return;
            }
            lifecycle.pool = None;
            lifecycle.state = ConnectionState::Disconnected;
        }
        warn!(error = %err, "config store lost connectivity");
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&self) {
        let throttle = self.inner.settings.reconnect_throttle;
        let epoch = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.state != ConnectionState::Disconnected {
                return;
            }
            if let Some(last) = lifecycle.last_attempt {
                let since = last.elapsed();
                if since < throttle {
                    debug!(
                        since_ms = since.as_millis() as u64,
                        throttle_ms = throttle.as_millis() as u64,
                        "reconnect throttled"
                    );
                    return;
                }
            }
            lifecycle.state = ConnectionState::Reconnecting;
            lifecycle.epoch
        };

        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(throttle).await;
            let connector = inner.connector.clone();
            let settings = inner.settings;
            let result =
                run_blocking(move || connector.connect(settings.max_connections, settings.acquire_timeout)).await;

            let mut lifecycle = inner.lifecycle.lock();
            if lifecycle.epoch != epoch {
                // shut down while the attempt was in flight
                return;
            }
            lifecycle.last_attempt = Some(Instant::now());
            lifecycle.attempts += 1;
            match result {
                Ok(pool) => {
                    lifecycle.epoch += 1;
                    lifecycle.pool = Some(pool);
                    lifecycle.state = ConnectionState::Connected;
                    info!(attempt = lifecycle.attempts, "config store reconnected");
                }
                Err(err) => {
                    lifecycle.state = ConnectionState::Disconnected;
                    warn!(attempt = lifecycle.attempts, error = %err, "config store reconnect failed");
                }
            }
        });
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Query(format!("store worker failed: {e}")))?
}
