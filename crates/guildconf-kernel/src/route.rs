//! Structured routes decoded from raw control identifiers. Nothing past this
//! module sees the raw string.

use crate::sections::SectionName;
use crate::token::{self, TokenError};
use thiserror::Error;

pub const ROOT_SECTION: &str = "__root__";
pub const ROOT_SELECT: &str = "select";
pub const SAVE_ACTION: &str = "save_settings";
pub const EXIT_ACTION: &str = "exit_settings";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// The top-level section list; the selected value names the section.
    RootSelect,
    /// Persist the current document. `section` is re-rendered afterwards when
    /// it is a known section.
    Save { section: Option<SectionName> },
    /// Back to the top-level section list.
    Exit,
    Section {
        section: SectionName,
        action: String,
        args: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routed {
    pub tenant_id: String,
    pub route: Route,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteParseError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("token has an empty {0} field")]
    MissingField(&'static str),
    #[error("no route for section `{section}` action `{action}`")]
    Unknown { section: String, action: String },
}

pub fn parse_route(custom_id: &str) -> Result<Routed, RouteParseError> {
    let token = token::decode(custom_id)?;
    if token.tenant_id.is_empty() {
        return Err(RouteParseError::MissingField("tenant_id"));
    }
    if token.section.is_empty() {
        return Err(RouteParseError::MissingField("section"));
    }
    if token.action.is_empty() {
        return Err(RouteParseError::MissingField("action"));
    }

    let known_section = token.section.parse::<SectionName>().ok();
    let route = match token.action.as_str() {
        SAVE_ACTION => Route::Save {
            section: known_section,
        },
        EXIT_ACTION => Route::Exit,
        ROOT_SELECT if token.section == ROOT_SECTION => Route::RootSelect,
        _ => match known_section {
            Some(section) => Route::Section {
                section,
                action: token.action,
                args: token.args,
            },
            None => {
                return Err(RouteParseError::Unknown {
                    section: token.section,
                    action: token.action,
                })
            }
        },
    };

    Ok(Routed {
        tenant_id: token.tenant_id,
        route,
    })
}
