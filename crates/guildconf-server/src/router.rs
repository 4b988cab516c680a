use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use guildconf_contracts::{Identity, Interaction, InteractionEvent, Reply};
use guildconf_kernel::render::root_menu;
use guildconf_kernel::{
    parse_route, ActionInput, FormInput, HandlerError, HandlerRegistry, Outcome, RenderContext,
    Route, RouteParseError, SectionHandler, SectionName, TokenError,
};
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::reply::{ReplyError, ReplyTracker, Responder};
use crate::repository::{RepositoryError, TenantRepository};

pub const MSG_DECODE: &str = "That control is no longer valid. Please reopen the settings menu.";
pub const MSG_NOT_CONFIGURED: &str =
    "This server is not configured yet. Run the setup command before changing settings.";
pub const MSG_UNKNOWN: &str = "Unknown selection.";
pub const MSG_PERSISTENCE: &str = "Settings storage is unavailable right now. Please try again in a moment.";
pub const MSG_INTERNAL: &str = "Something went wrong while handling that interaction.";
pub const MSG_SAVED: &str = "Settings saved.";

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("undecodable routing token: {0}")]
    Decode(RouteParseError),
    #[error("token for tenant `{token}` used from tenant `{caller}`")]
    TenantMismatch { token: String, caller: String },
    #[error("tenant `{0}` has no configuration")]
    NotFound(String),
    #[error("no route for `{0}`")]
    UnknownRoute(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Persistence(#[from] RepositoryError),
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl From<RouteParseError> for RouteError {
    /// A well-formed token naming no known route is an unknown selection,
    /// not an undecodable one.
    fn from(err: RouteParseError) -> Self {
        match err {
            RouteParseError::Unknown { section, action } => {
                RouteError::UnknownRoute(format!("{section}/{action}"))
            }
            other => RouteError::Decode(other),
        }
    }
}

impl From<TokenError> for RouteError {
    fn from(err: TokenError) -> Self {
        RouteError::Handler(HandlerError::Token(err))
    }
}

impl RouteError {
    /// Text shown to the acting user.
    pub fn user_message(&self) -> &str {
        match self {
            RouteError::Decode(_) | RouteError::TenantMismatch { .. } => MSG_DECODE,
            RouteError::NotFound(_) => MSG_NOT_CONFIGURED,
            RouteError::UnknownRoute(_) => MSG_UNKNOWN,
            RouteError::Validation(message) => message,
            RouteError::Persistence(_) => MSG_PERSISTENCE,
            RouteError::Handler(_) => MSG_INTERNAL,
        }
    }

    fn log(&self) {
        match self {
            RouteError::Decode(_) | RouteError::TenantMismatch { .. } | RouteError::UnknownRoute(_) => {
                warn!(error = %self, "interaction rejected")
            }
            RouteError::NotFound(_) => info!(error = %self, "interaction for unconfigured tenant"),
            RouteError::Validation(_) => debug!(error = %self, "form input rejected"),
            RouteError::Persistence(_) | RouteError::Handler(_) => {
                error!(error = %self, "interaction failed")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Not an interaction this router answers.
    Ignored,
    Replied,
    ReplyFailed(ReplyError),
}

/// Memoryless between events: every interaction is decoded from its token
/// and served from a fresh load of the tenant document.
#[derive(Clone)]
pub struct InteractionRouter {
    repository: TenantRepository,
    registry: HandlerRegistry,
    footer: Option<String>,
}

impl InteractionRouter {
    pub fn new(repository: TenantRepository, footer: Option<String>) -> Self {
        Self {
            repository,
            registry: HandlerRegistry::new(),
            footer,
        }
    }

    pub fn repository(&self) -> &TenantRepository {
        &self.repository
    }

    /// Routes one event and answers it exactly once.
    pub async fn handle<R: Responder>(&self, event: &InteractionEvent, responder: &mut R) -> Dispatch {
        if event.interaction == Interaction::Unsupported {
            debug!(tenant = %event.identity.tenant_id, "ignoring unsupported interaction");
            return Dispatch::Ignored;
        }

        let span = info_span!(
            "interaction",
            id = %Uuid::new_v4(),
            tenant = %event.identity.tenant_id,
            user = %event.identity.user_id,
            kind = event.interaction.kind_name(),
        );
        self.answer(responder, event.from_message, self.route(event))
            .instrument(span)
            .await
    }

    /// Entry command: a fresh message listing the tenant's sections.
    pub async fn open_menu<R: Responder>(&self, identity: &Identity, responder: &mut R) -> Dispatch {
        let span = info_span!(
            "interaction",
            id = %Uuid::new_v4(),
            tenant = %identity.tenant_id,
            user = %identity.user_id,
            kind = "open_menu",
        );
        let work = async {
            let doc = self
                .repository
                .load(&identity.tenant_id)
                .await?
                .ok_or_else(|| RouteError::NotFound(identity.tenant_id.clone()))?;
            let ctx = RenderContext::new(&identity.tenant_id, self.footer.as_deref());
            Ok::<_, RouteError>(Reply::fresh(root_menu(&ctx, &doc)?))
        };
        self.answer(responder, false, work).instrument(span).await
    }

    async fn answer<R, F>(&self, responder: &mut R, from_message: bool, work: F) -> Dispatch
    where
        R: Responder,
        F: Future<Output = Result<Reply, RouteError>>,
    {
        let reply = match AssertUnwindSafe(work).catch_unwind().await {
            Ok(Ok(reply)) => reply,
            Ok(Err(err)) => {
                err.log();
                Reply::notice(err.user_message())
            }
            Err(_) => {
                error!("interaction handler panicked");
                Reply::notice(MSG_INTERNAL)
            }
        };

        let mut tracker = ReplyTracker::new(responder, from_message);
        match tracker.reply(reply).await {
            Ok(()) => Dispatch::Replied,
            Err(err) => {
                warn!(error = %err, "reply was not delivered");
                Dispatch::ReplyFailed(err)
            }
        }
    }

    async fn route(&self, event: &InteractionEvent) -> Result<Reply, RouteError> {
        let custom_id = match &event.interaction {
            Interaction::MenuSelection { custom_id, .. }
            | Interaction::ButtonPress { custom_id }
            | Interaction::FormSubmission { custom_id, .. } => custom_id,
            Interaction::Unsupported => return Err(RouteError::UnknownRoute("unsupported".to_string())),
        };
        let routed = parse_route(custom_id)?;
        if routed.tenant_id != event.identity.tenant_id {
            return Err(RouteError::TenantMismatch {
                token: routed.tenant_id,
                caller: event.identity.tenant_id.clone(),
            });
        }

        let tenant_id = routed.tenant_id.as_str();
        let mut doc = self
            .repository
            .load(tenant_id)
            .await?
            .ok_or_else(|| RouteError::NotFound(tenant_id.to_string()))?;
        let ctx = RenderContext::new(tenant_id, self.footer.as_deref());

        match routed.route {
            Route::RootSelect => {
                let selected = match &event.interaction {
                    Interaction::MenuSelection { values, .. } => values.first(),
                    _ => None,
                }
                .ok_or_else(|| RouteError::UnknownRoute("empty section selection".to_string()))?;
                let section = selected
                    .parse::<SectionName>()
                    .map_err(|err| RouteError::UnknownRoute(err.to_string()))?;
                let section_doc = doc
                    .get(section.as_str())
                    .ok_or_else(|| RouteError::UnknownRoute(format!("{section} is not persisted")))?;
                let view = self.registry.resolve(section).render_menu(&ctx, section_doc)?;
                Ok(Reply::update(view))
            }
            Route::Exit => Ok(Reply::update(root_menu(&ctx, &doc)?)),
            Route::Save { section } => {
                self.repository.save(tenant_id, &doc).await?;
                let current = section.and_then(|s| doc.get(s.as_str()).map(|d| (s, d)));
                match current {
                    Some((section, section_doc)) => {
                        let view = self.registry.resolve(section).render_menu(&ctx, section_doc)?;
                        Ok(Reply::update_with_notice(view, MSG_SAVED))
                    }
                    None => Ok(Reply::notice(MSG_SAVED)),
                }
            }
            Route::Section {
                section,
                action,
                args,
            } => {
                let handler = self.registry.resolve(section);
                let section_doc = doc
                    .get_mut(section.as_str())
                    .ok_or_else(|| RouteError::UnknownRoute(format!("{section} is not persisted")))?;

                let outcome = match &event.interaction {
                    Interaction::MenuSelection { values, .. } => {
                        let input = ActionInput { args: &args, values };
                        handler.handle_action(&ctx, section_doc, &action, &input)?
                    }
                    Interaction::ButtonPress { .. } => {
                        let input = ActionInput { args: &args, values: &[] };
                        handler.handle_action(&ctx, section_doc, &action, &input)?
                    }
                    Interaction::FormSubmission { fields, .. } => {
                        let input = FormInput {
                            args: &args,
                            fields,
                            directory: &event.directory,
                        };
                        handler.handle_form(&ctx, section_doc, &action, &input)?
                    }
                    Interaction::Unsupported => Outcome::UnknownRoute,
                };

                match outcome {
                    Outcome::Mutation { view, notice } => {
                        self.repository.save(tenant_id, &doc).await?;
                        debug!(section = %section, action = %action, "section updated");
                        Ok(match notice {
                            Some(notice) => Reply::update_with_notice(view, notice),
                            None => Reply::update(view),
                        })
                    }
                    Outcome::View(view) => Ok(Reply::update(view)),
                    Outcome::FormRequest(form) => Ok(Reply::Form { form }),
                    Outcome::ValidationError(message) => Err(RouteError::Validation(message)),
                    Outcome::UnknownRoute => Err(RouteError::UnknownRoute(format!("{section}/{action}"))),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::CollectingResponder;
    use crate::store::testing::FlakyConnector;
    use crate::store::{ConfigStore, MemoryConnector, StoreSettings};
    use guildconf_contracts::Directory;
    use std::sync::Arc;

    fn router() -> InteractionRouter {
        let store = ConfigStore::new(Arc::new(MemoryConnector::default()), StoreSettings::default());
        InteractionRouter::new(TenantRepository::new(store), None)
    }

    fn press(tenant: &str, custom_id: &str) -> InteractionEvent {
        InteractionEvent {
            identity: Identity {
                tenant_id: tenant.to_string(),
                user_id: "U1".to_string(),
            },
            interaction: Interaction::ButtonPress {
                custom_id: custom_id.to_string(),
            },
            from_message: true,
            directory: Directory::default(),
        }
    }

    #[tokio::test]
    async fn unsupported_interactions_are_ignored_without_reply() {
        let router = router();
        let mut event = press("G1", "G1-logging-setEnable");
        event.interaction = Interaction::Unsupported;
        let mut responder = CollectingResponder::new();
        assert_eq!(router.handle(&event, &mut responder).await, Dispatch::Ignored);
        assert!(responder.replies().is_empty());
    }

    #[tokio::test]
    async fn malformed_tokens_get_one_generic_reply() {
        let router = router();
        let mut responder = CollectingResponder::new();
        let dispatch = router.handle(&press("G1", "select_guild_setting"), &mut responder).await;
        assert_eq!(dispatch, Dispatch::Replied);
        assert_eq!(responder.into_replies(), vec![Reply::notice(MSG_DECODE)]);
    }

    #[tokio::test]
    async fn tokens_from_another_tenant_are_rejected() {
        let router = router();
        router.repository().initialize("G1").await.unwrap();
        let mut responder = CollectingResponder::new();
        router
            .handle(&press("G9", "G1-logging-setDisable"), &mut responder)
            .await;
        assert_eq!(responder.into_replies(), vec![Reply::notice(MSG_DECODE)]);
        let doc = router.repository().load("G1").await.unwrap().unwrap();
        assert_eq!(doc["logging"]["enabled"], true);
    }

    #[tokio::test]
    async fn unknown_actions_in_known_sections_reply_unknown_selection() {
        let router = router();
        router.repository().initialize("G1").await.unwrap();
        let mut responder = CollectingResponder::new();
        router
            .handle(&press("G1", "G1-logging-launchRockets"), &mut responder)
            .await;
        assert_eq!(responder.into_replies(), vec![Reply::notice(MSG_UNKNOWN)]);
    }

    #[tokio::test]
    async fn unknown_sections_reply_unknown_selection() {
        let router = router();
        router.repository().initialize("G1").await.unwrap();
        let before = router.repository().load("G1").await.unwrap().unwrap();

        for custom_id in ["G1-loggerSystem-setEnable", "G1-__root__-open"] {
            let mut responder = CollectingResponder::new();
            let dispatch = router.handle(&press("G1", custom_id), &mut responder).await;
            assert_eq!(dispatch, Dispatch::Replied);
            assert_eq!(responder.into_replies(), vec![Reply::notice(MSG_UNKNOWN)]);
        }

        let after = router.repository().load("G1").await.unwrap().unwrap();
        assert_eq!(after, before);
        assert!(!after.contains_key("loggerSystem"));
    }

    #[tokio::test]
    async fn failed_loads_get_the_storage_notice() {
        let (connector, outage) = FlakyConnector::new();
        let store = ConfigStore::new(Arc::new(connector), StoreSettings::default());
        let router = InteractionRouter::new(TenantRepository::new(store), None);
        router.repository().initialize("G1").await.unwrap();

        outage.set_down(true);
        let mut responder = CollectingResponder::new();
        router
            .handle(&press("G1", "G1-logging-setDisable"), &mut responder)
            .await;
        assert_eq!(responder.into_replies(), vec![Reply::notice(MSG_PERSISTENCE)]);
        assert!(!MSG_PERSISTENCE.contains("save"));
    }

    #[test]
    fn short_tokens_stay_decode_errors() {
        let err = RouteError::from(parse_route("G1-logging").unwrap_err());
        assert!(matches!(err, RouteError::Decode(_)));
        assert_eq!(err.user_message(), MSG_DECODE);
    }

    #[test]
    fn validation_errors_show_their_own_message() {
        let err = RouteError::Validation("Logging level must be a whole number between 0 and 3.".to_string());
        assert_eq!(
            err.user_message(),
            "Logging level must be a whole number between 0 and 3."
        );
    }
}
