//! Section handlers: one stateless strategy per section, resolved through an
//! exhaustive match on [`SectionName`].

mod logging;
mod ticketing;
mod toggle;

pub use logging::LoggingHandler;
pub use ticketing::TicketingHandler;
pub use toggle::ToggleHandler;

use crate::forms::Fields;
use crate::render::RenderContext;
use crate::sections::SectionName;
use crate::token::TokenError;
use guildconf_contracts::{Directory, FormDescriptor, MessagePayload};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The section document changed and must be persisted before `view` is shown.
    Mutation {
        view: MessagePayload,
        notice: Option<String>,
    },
    /// Navigation to another view; nothing changed.
    View(MessagePayload),
    FormRequest(FormDescriptor),
    ValidationError(String),
    UnknownRoute,
}

impl Outcome {
    pub fn mutated(view: MessagePayload) -> Self {
        Outcome::Mutation { view, notice: None }
    }

    pub fn mutated_with_notice(view: MessagePayload, notice: impl Into<String>) -> Self {
        Outcome::Mutation {
            view,
            notice: Some(notice.into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("section `{section}` document has an unexpected shape: {message}")]
    Document {
        section: SectionName,
        message: String,
    },
}

/// Input of a button press or menu selection.
#[derive(Debug, Clone, Copy)]
pub struct ActionInput<'a> {
    pub args: &'a [String],
    pub values: &'a [String],
}

#[derive(Debug, Clone, Copy)]
pub struct FormInput<'a> {
    pub args: &'a [String],
    pub fields: &'a Fields,
    pub directory: &'a Directory,
}

pub trait SectionHandler: Send + Sync {
    fn section(&self) -> SectionName;

    /// Renders the section menu. Never mutates.
    fn render_menu(&self, ctx: &RenderContext<'_>, doc: &Value) -> Result<MessagePayload, HandlerError>;

    fn handle_action(
        &self,
        ctx: &RenderContext<'_>,
        doc: &mut Value,
        action: &str,
        input: &ActionInput<'_>,
    ) -> Result<Outcome, HandlerError>;

    /// Validates every field before touching `doc`; a `ValidationError`
    /// outcome leaves it unchanged.
    fn handle_form(
        &self,
        ctx: &RenderContext<'_>,
        doc: &mut Value,
        action: &str,
        input: &FormInput<'_>,
    ) -> Result<Outcome, HandlerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Logging(LoggingHandler),
    Ticketing(TicketingHandler),
    Toggle(ToggleHandler),
}

impl Handler {
    fn inner(&self) -> &dyn SectionHandler {
        match self {
            Handler::Logging(h) => h,
            Handler::Ticketing(h) => h,
            Handler::Toggle(h) => h,
        }
    }
}

impl SectionHandler for Handler {
    fn section(&self) -> SectionName {
        self.inner().section()
    }

    fn render_menu(&self, ctx: &RenderContext<'_>, doc: &Value) -> Result<MessagePayload, HandlerError> {
        self.inner().render_menu(ctx, doc)
    }

    fn handle_action(
        &self,
        ctx: &RenderContext<'_>,
        doc: &mut Value,
        action: &str,
        input: &ActionInput<'_>,
    ) -> Result<Outcome, HandlerError> {
        self.inner().handle_action(ctx, doc, action, input)
    }

    fn handle_form(
        &self,
        ctx: &RenderContext<'_>,
        doc: &mut Value,
        action: &str,
        input: &FormInput<'_>,
    ) -> Result<Outcome, HandlerError> {
        self.inner().handle_form(ctx, doc, action, input)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HandlerRegistry;

impl HandlerRegistry {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, section: SectionName) -> Handler {
        match section {
            SectionName::Logging => Handler::Logging(LoggingHandler),
            SectionName::Ticketing => Handler::Ticketing(TicketingHandler),
            SectionName::Verification
            | SectionName::Welcome
            | SectionName::Farewell
            | SectionName::AutoRole
            | SectionName::ReactionRole
            | SectionName::MessageFilter
            | SectionName::AntiSpam
            | SectionName::AntiRaid
            | SectionName::ServerProtection
            | SectionName::NicknameFilter
            | SectionName::GhostPing => Handler::Toggle(ToggleHandler::new(section)),
        }
    }
}

pub(crate) fn read_settings<T: DeserializeOwned>(section: SectionName, doc: &Value) -> Result<T, HandlerError> {
    serde_json::from_value(doc.clone()).map_err(|err| HandlerError::Document {
        section,
        message: err.to_string(),
    })
}

pub(crate) fn write_settings<T: Serialize>(
    section: SectionName,
    doc: &mut Value,
    settings: &T,
) -> Result<(), HandlerError> {
    *doc = serde_json::to_value(settings).map_err(|err| HandlerError::Document {
        section,
        message: err.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_section_resolves_to_a_handler_for_itself() {
        let registry = HandlerRegistry::new();
        for section in SectionName::ALL {
            assert_eq!(registry.resolve(section).section(), section);
        }
        assert_eq!(
            registry.resolve(SectionName::Logging),
            Handler::Logging(LoggingHandler)
        );
        assert_eq!(
            registry.resolve(SectionName::GhostPing),
            Handler::Toggle(ToggleHandler::new(SectionName::GhostPing))
        );
    }
}
