use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const API_VERSION: &str = "1.0.0";

/// Who triggered an interaction and on behalf of which tenant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Identity {
    pub tenant_id: String,
    pub user_id: String,
}

/// Identifiers the transport knows to exist for the tenant. Form fields that
/// reference roles, channels or users are resolved against this snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Directory {
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub users: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interaction {
    MenuSelection {
        custom_id: String,
        #[serde(default)]
        values: Vec<String>,
    },
    ButtonPress {
        custom_id: String,
    },
    FormSubmission {
        custom_id: String,
        #[serde(default)]
        fields: BTreeMap<String, String>,
    },
    #[serde(other)]
    Unsupported,
}

impl Interaction {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Interaction::MenuSelection { .. } => "menu_selection",
            Interaction::ButtonPress { .. } => "button_press",
            Interaction::FormSubmission { .. } => "form_submission",
            Interaction::Unsupported => "unsupported",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct InteractionEvent {
    pub identity: Identity,
    pub interaction: Interaction,
    /// Set when the control lives on an already rendered message, which is
    /// the only case where that message may be updated in place.
    #[serde(default)]
    pub from_message: bool,
    #[serde(default)]
    pub directory: Directory,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Success,
    Danger,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Embed {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub fields: Vec<EmbedField>,
    pub color: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Control {
    Button {
        custom_id: String,
        label: String,
        style: ButtonStyle,
    },
    Select {
        custom_id: String,
        placeholder: String,
        options: Vec<SelectOption>,
    },
}

impl Control {
    pub fn custom_id(&self) -> &str {
        match self {
            Control::Button { custom_id, .. } | Control::Select { custom_id, .. } => custom_id,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ActionRow {
    pub controls: Vec<Control>,
}

/// A rendered settings view: one embed plus its rows of controls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MessagePayload {
    pub embed: Embed,
    #[serde(default)]
    pub rows: Vec<ActionRow>,
}

impl MessagePayload {
    pub fn controls(&self) -> impl Iterator<Item = &Control> {
        self.rows.iter().flat_map(|row| row.controls.iter())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TextInput {
    pub id: String,
    pub label: String,
    pub required: bool,
    pub max_length: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FormDescriptor {
    pub custom_id: String,
    pub title: String,
    pub inputs: Vec<TextInput>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReplyMode {
    Fresh,
    Update,
}

/// The single answer an interaction receives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Reply {
    /// Edit the message the control lives on. `notice` is shown privately to
    /// the acting user.
    Update {
        message: MessagePayload,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notice: Option<String>,
    },
    Message {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<MessagePayload>,
        ephemeral: bool,
    },
    Form {
        form: FormDescriptor,
    },
}

impl Reply {
    pub fn update(message: MessagePayload) -> Self {
        Reply::Update {
            message,
            notice: None,
        }
    }

    pub fn update_with_notice(message: MessagePayload, notice: impl Into<String>) -> Self {
        Reply::Update {
            message,
            notice: Some(notice.into()),
        }
    }

    pub fn notice(content: impl Into<String>) -> Self {
        Reply::Message {
            content: Some(content.into()),
            message: None,
            ephemeral: true,
        }
    }

    pub fn fresh(message: MessagePayload) -> Self {
        Reply::Message {
            content: None,
            message: Some(message),
            ephemeral: false,
        }
    }

    pub fn mode(&self) -> ReplyMode {
        match self {
            Reply::Update { .. } => ReplyMode::Update,
            Reply::Message { .. } | Reply::Form { .. } => ReplyMode::Fresh,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct InteractionResponse {
    pub replies: Vec<Reply>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MenuRequest {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SetupStatus {
    Initialized,
    AlreadyInitialized,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetupResponse {
    pub tenant_id: String,
    pub status: SetupStatus,
    pub sections: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractsMetadata {
    pub api_version: String,
    pub token_separator: String,
    pub max_token_len: usize,
    pub reserved_actions: Vec<String>,
    pub sections: Vec<String>,
}
