use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use guildconf_contracts::{Directory, Identity, Interaction, InteractionEvent, Reply};
use guildconf_kernel::{document_digest, TenantDocument};
use guildconf_server::router::{MSG_NOT_CONFIGURED, MSG_PERSISTENCE};
use guildconf_server::store::{Pool, SectionRow};
use guildconf_server::{
    CollectingResponder, ConfigStore, ConnectionState, Connector, Dispatch, InteractionRouter,
    MemoryConnector, StoreError, StoreQuery, StoreSettings, TenantRepository,
};
use parking_lot::Mutex;
use serde_json::{json, Value};

/// Outage switch shared by the connector and every pool it builds.
#[derive(Default)]
struct Faults {
    down: AtomicBool,
    /// Operations left before the database goes away on its own.
    budget: Mutex<Option<usize>>,
}

impl Faults {
    /// Lets `operations` more calls through, then goes down.
    fn fail_after(&self, operations: usize) {
        *self.budget.lock() = Some(operations);
    }

    fn restore(&self) {
        *self.budget.lock() = None;
        self.down.store(false, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        let mut budget = self.budget.lock();
        if let Some(left) = budget.as_mut() {
            if *left == 0 {
                *budget = None;
                self.down.store(true, Ordering::SeqCst);
            } else {
                *left -= 1;
            }
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Connectivity("database is down".to_string()));
        }
        Ok(())
    }
}

/// Records every operation that reaches the backing database.
struct Recording {
    inner: MemoryConnector,
    faults: Arc<Faults>,
    log: Arc<Mutex<Vec<StoreQuery>>>,
}

struct RecordingPool {
    inner: Arc<dyn Pool>,
    faults: Arc<Faults>,
    log: Arc<Mutex<Vec<StoreQuery>>>,
}

impl Connector for Recording {
    fn bootstrap(&self) -> Result<(), StoreError> {
        self.faults.check()?;
        self.inner.bootstrap()
    }

    fn connect(&self, max_connections: u32, acquire_timeout: Duration) -> Result<Arc<dyn Pool>, StoreError> {
        self.faults.check()?;
        Ok(Arc::new(RecordingPool {
            inner: self.inner.connect(max_connections, acquire_timeout)?,
            faults: self.faults.clone(),
            log: self.log.clone(),
        }))
    }
}

impl Pool for RecordingPool {
    fn execute(&self, query: &StoreQuery) -> Result<Vec<SectionRow>, StoreError> {
        self.faults.check()?;
        let result = self.inner.execute(query);
        if result.is_ok() {
            self.log.lock().push(query.clone());
        }
        result
    }
}

struct Harness {
    router: InteractionRouter,
    faults: Arc<Faults>,
    log: Arc<Mutex<Vec<StoreQuery>>>,
}

impl Harness {
    fn new(throttle: Duration) -> Self {
        let faults = Arc::new(Faults::default());
        let log = Arc::new(Mutex::new(Vec::new()));
        let connector = Recording {
            inner: MemoryConnector::default(),
            faults: faults.clone(),
            log: log.clone(),
        };
        let settings = StoreSettings {
            reconnect_throttle: throttle,
            ..StoreSettings::default()
        };
        let store = ConfigStore::new(Arc::new(connector), settings);
        Self {
            router: InteractionRouter::new(TenantRepository::new(store), None),
            faults,
            log,
        }
    }

    fn repository(&self) -> &TenantRepository {
        self.router.repository()
    }

    fn upserts(&self) -> Vec<SectionRow> {
        self.log
            .lock()
            .iter()
            .filter_map(|query| match query {
                StoreQuery::UpsertSection(row) => Some(row.clone()),
                _ => None,
            })
            .collect()
    }

    async fn send(&self, tenant: &str, interaction: Interaction) -> Vec<Reply> {
        let event = InteractionEvent {
            identity: Identity {
                tenant_id: tenant.to_string(),
                user_id: "U1".to_string(),
            },
            interaction,
            from_message: true,
            directory: Directory::default(),
        };
        let mut responder = CollectingResponder::new();
        assert_eq!(self.router.handle(&event, &mut responder).await, Dispatch::Replied);
        responder.into_replies()
    }

    async fn press(&self, tenant: &str, custom_id: &str) -> Vec<Reply> {
        self.send(
            tenant,
            Interaction::ButtonPress {
                custom_id: custom_id.to_string(),
            },
        )
        .await
    }
}

fn document(sections: &[(&str, Value)]) -> TenantDocument {
    sections
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

fn shown(reply: &Reply, name: &str) -> Option<String> {
    let message = match reply {
        Reply::Update { message, .. } => message,
        Reply::Message {
            message: Some(message),
            ..
        } => message,
        _ => return None,
    };
    message
        .embed
        .fields
        .iter()
        .find(|f| f.name == name)
        .map(|f| f.value.clone())
}

async fn wait_for(store: &ConfigStore, state: ConnectionState) {
    for _ in 0..100 {
        if store.state() == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("store never reached {state:?}");
}

#[tokio::test]
async fn scenario_a_unconfigured_tenant_is_told_so() {
    let harness = Harness::new(Duration::from_secs(5));
    let replies = harness
        .send(
            "G1",
            Interaction::MenuSelection {
                custom_id: "G1-__root__-select".to_string(),
                values: vec!["logging".to_string()],
            },
        )
        .await;

    assert_eq!(replies, vec![Reply::notice(MSG_NOT_CONFIGURED)]);
    assert!(MSG_NOT_CONFIGURED.contains("not configured"));
    assert!(harness.upserts().is_empty());
    assert_eq!(harness.repository().load("G1").await.unwrap(), None);
}

#[tokio::test]
async fn scenario_b_enabling_logging_persists_one_row_and_rerenders() {
    let harness = Harness::new(Duration::from_secs(5));
    harness
        .repository()
        .save("G2", &document(&[("logging", json!({"enabled": false, "level": 0}))]))
        .await
        .unwrap();
    harness.log.lock().clear();

    let replies = harness.press("G2", "G2-logging-setEnable").await;

    let upserts = harness.upserts();
    assert_eq!(upserts.len(), 1);
    assert_eq!((upserts[0].tenant_id.as_str(), upserts[0].section.as_str()), ("G2", "logging"));
    let stored: Value = serde_json::from_str(&upserts[0].settings_json).unwrap();
    assert_eq!(stored, json!({"enabled": true, "level": 0}));

    assert_eq!(replies.len(), 1);
    assert!(matches!(replies[0], Reply::Update { .. }));
    assert_eq!(shown(&replies[0], "Enabled:").as_deref(), Some("Yes"));
}

#[tokio::test(start_paused = true)]
async fn scenario_c_connectivity_loss_mid_save_reports_failure_and_recovers() {
    let throttle = Duration::from_secs(5);
    let harness = Harness::new(throttle);
    harness.repository().initialize("G3").await.unwrap();
    let store = harness.repository().store().clone();
    assert_eq!(store.state(), ConnectionState::Connected);

    // the load goes through, the save does not
    harness.faults.fail_after(1);
    let replies = harness.press("G3", "G3-logging-setDisable").await;
    assert_eq!(replies, vec![Reply::notice(MSG_PERSISTENCE)]);
    assert_eq!(store.state(), ConnectionState::Reconnecting);

    // another failure inside the window does not start a second attempt
    let replies = harness.press("G3", "G3-logging-setDisable").await;
    assert_eq!(replies, vec![Reply::notice(MSG_PERSISTENCE)]);
    assert_eq!(store.reconnect_attempts(), 0);

    harness.faults.restore();
    tokio::time::sleep(throttle).await;
    wait_for(&store, ConnectionState::Connected).await;
    assert_eq!(store.reconnect_attempts(), 1);

    let replies = harness.press("G3", "G3-logging-setDisable").await;
    assert_eq!(shown(&replies[0], "Enabled:").as_deref(), Some("No"));
    let doc = harness.repository().load("G3").await.unwrap().unwrap();
    assert_eq!(doc["logging"]["enabled"], false);
}

#[tokio::test]
async fn validation_failures_are_not_saved() {
    let harness = Harness::new(Duration::from_secs(5));
    harness.repository().initialize("G6").await.unwrap();
    harness.log.lock().clear();

    let mut fields = std::collections::BTreeMap::new();
    fields.insert("level".to_string(), "4".to_string());
    let replies = harness
        .send(
            "G6",
            Interaction::FormSubmission {
                custom_id: "G6-logging-setLoggingLevel".to_string(),
                fields,
            },
        )
        .await;

    assert_eq!(
        replies,
        vec![Reply::notice("Logging level must be a whole number between 0 and 3.")]
    );
    assert!(harness.upserts().is_empty());
}

#[tokio::test]
async fn form_requests_and_navigation_do_not_persist() {
    let harness = Harness::new(Duration::from_secs(5));
    harness.repository().initialize("G6").await.unwrap();
    harness.log.lock().clear();

    let replies = harness.press("G6", "G6-logging-setLoggingLevel").await;
    match &replies[0] {
        Reply::Form { form } => assert_eq!(form.custom_id, "G6-logging-setLoggingLevel"),
        other => panic!("expected a form, got {other:?}"),
    }

    let replies = harness.press("G6", "G6-ticketing-manageRoles").await;
    assert!(matches!(replies[0], Reply::Update { .. }));

    let replies = harness.press("G6", "G6-logging-exit_settings").await;
    match &replies[0] {
        Reply::Update { message, .. } => assert_eq!(message.embed.title, "Change Server Settings"),
        other => panic!("expected the section list, got {other:?}"),
    }

    assert!(harness.upserts().is_empty());
}

#[tokio::test]
async fn saving_an_unchanged_document_twice_writes_identical_rows() {
    let harness = Harness::new(Duration::from_secs(5));
    harness.repository().initialize("G7").await.unwrap();
    let tenant = || StoreQuery::SelectTenant {
        tenant_id: "G7".to_string(),
    };
    let store = harness.repository().store();

    let replies = harness.press("G7", "G7-logging-save_settings").await;
    assert!(matches!(&replies[0], Reply::Update { notice: Some(n), .. } if n == "Settings saved."));
    let first = store.execute(tenant()).await.unwrap();

    harness.press("G7", "G7-logging-save_settings").await;
    let second = store.execute(tenant()).await.unwrap();
    assert_eq!(first, second);

    let doc = harness.repository().load("G7").await.unwrap().unwrap();
    let digest = document_digest(&doc).unwrap();
    harness.repository().save("G7", &doc).await.unwrap();
    let reloaded = harness.repository().load("G7").await.unwrap().unwrap();
    assert_eq!(document_digest(&reloaded).unwrap(), digest);
}

#[tokio::test]
async fn interleaved_edits_lose_the_earlier_save() {
    let harness = Harness::new(Duration::from_secs(5));
    let repo = harness.repository();
    repo.initialize("G4").await.unwrap();

    let mut first = repo.load("G4").await.unwrap().unwrap();
    let mut second = repo.load("G4").await.unwrap().unwrap();
    first.insert("logging".to_string(), json!({"enabled": true, "level": 1}));
    second.insert(
        "ticketing".to_string(),
        json!({"enabled": false, "rolesInTicket": [], "usersInTicket": [], "ticketLimit": 5, "type": 1}),
    );

    repo.save("G4", &first).await.unwrap();
    repo.save("G4", &second).await.unwrap();

    // no lock or version check: the second save rewrote logging from its stale copy
    let stored = repo.load("G4").await.unwrap().unwrap();
    assert_eq!(stored["ticketing"]["ticketLimit"], 5);
    assert_eq!(stored["logging"]["level"], 3);
}

#[tokio::test]
async fn open_menu_lists_persisted_sections_only() {
    let harness = Harness::new(Duration::from_secs(5));
    harness
        .repository()
        .save(
            "G9",
            &document(&[
                ("logging", json!({"enabled": true, "level": 1})),
                ("welcome", json!({"enabled": false})),
            ]),
        )
        .await
        .unwrap();

    let identity = Identity {
        tenant_id: "G9".to_string(),
        user_id: "U1".to_string(),
    };
    let mut responder = CollectingResponder::new();
    harness.router.open_menu(&identity, &mut responder).await;
    let replies = responder.into_replies();
    let Reply::Message {
        message: Some(menu),
        ephemeral: false,
        ..
    } = &replies[0]
    else {
        panic!("expected a fresh menu, got {:?}", replies[0]);
    };
    let select = menu.controls().next().unwrap();
    assert_eq!(select.custom_id(), "G9-__root__-select");
    match select {
        guildconf_contracts::Control::Select { options, .. } => {
            let values: Vec<&str> = options.iter().map(|o| o.value.as_str()).collect();
            assert_eq!(values, vec!["logging", "welcome"]);
        }
        other => panic!("expected a select, got {other:?}"),
    }

    // a section that is not persisted is never created by routing
    let replies = harness.press("G9", "G9-ticketing-setEnable").await;
    assert_eq!(replies, vec![Reply::notice("Unknown selection.")]);
    let doc = harness.repository().load("G9").await.unwrap().unwrap();
    assert!(!doc.contains_key("ticketing"));
}
