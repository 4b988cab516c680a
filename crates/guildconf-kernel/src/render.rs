use crate::route::{EXIT_ACTION, ROOT_SECTION, ROOT_SELECT, SAVE_ACTION};
use crate::sections::{camel_case_to_title, SectionName, TenantDocument};
use crate::token::{self, TokenError};
use guildconf_contracts::{
    ActionRow, ButtonStyle, Control, Embed, EmbedField, FormDescriptor, MessagePayload,
    SelectOption, TextInput,
};

pub const MENU_COLOR: u32 = 0x5865F2;
pub const SECTION_COLOR: u32 = 0x47346E;
pub const SUBVIEW_COLOR: u32 = 0x0099FF;

pub const MAX_CONTROLS_PER_ROW: usize = 5;
pub const MAX_SELECT_OPTIONS: usize = 25;

const NOT_SET: &str = "Not Set.";

/// Per-render inputs shared by every view of one tenant.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub tenant_id: &'a str,
    pub footer: Option<&'a str>,
}

impl<'a> RenderContext<'a> {
    pub fn new(tenant_id: &'a str, footer: Option<&'a str>) -> Self {
        Self { tenant_id, footer }
    }

    pub fn token(&self, section: &str, action: &str, args: &[&str]) -> Result<String, TokenError> {
        token::encode(self.tenant_id, section, action, args)
    }

    pub fn embed(&self, title: &str, description: &str, color: u32) -> Embed {
        Embed {
            title: title.to_string(),
            description: description.to_string(),
            fields: Vec::new(),
            color,
            footer: self.footer.map(str::to_string),
        }
    }

    pub fn button(
        &self,
        section: SectionName,
        action: &str,
        label: &str,
        style: ButtonStyle,
    ) -> Result<Control, TokenError> {
        Ok(Control::Button {
            custom_id: self.token(section.as_str(), action, &[])?,
            label: label.to_string(),
            style,
        })
    }

    /// Save and return-to-menu buttons shown under every section view.
    pub fn navigation_row(&self, section: SectionName) -> Result<ActionRow, TokenError> {
        Ok(ActionRow {
            controls: vec![
                self.button(section, SAVE_ACTION, "Save Settings", ButtonStyle::Primary)?,
                self.button(section, EXIT_ACTION, "Return to Main Menu", ButtonStyle::Primary)?,
            ],
        })
    }

    pub fn form(
        &self,
        section: SectionName,
        action: &str,
        title: &str,
        inputs: Vec<TextInput>,
    ) -> Result<FormDescriptor, TokenError> {
        self.form_with_args(section, action, &[], title, inputs)
    }

    /// A form whose submission token carries `args` after the action.
    pub fn form_with_args(
        &self,
        section: SectionName,
        action: &str,
        args: &[&str],
        title: &str,
        inputs: Vec<TextInput>,
    ) -> Result<FormDescriptor, TokenError> {
        Ok(FormDescriptor {
            custom_id: self.token(section.as_str(), action, args)?,
            title: title.to_string(),
            inputs,
        })
    }
}

pub fn field(name: &str, value: impl Into<String>) -> EmbedField {
    EmbedField {
        name: name.to_string(),
        value: value.into(),
    }
}

pub fn text_input(id: &str, label: &str, max_length: u16) -> TextInput {
    TextInput {
        id: id.to_string(),
        label: label.to_string(),
        required: true,
        max_length,
        placeholder: None,
    }
}

/// Lays controls out in rows of at most five.
pub fn rows(controls: Vec<Control>) -> Vec<ActionRow> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    for control in controls {
        if current.len() == MAX_CONTROLS_PER_ROW {
            out.push(ActionRow {
                controls: std::mem::take(&mut current),
            });
        }
        current.push(control);
    }
    if !current.is_empty() {
        out.push(ActionRow { controls: current });
    }
    out
}

pub fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

pub fn role_mention(id: Option<&str>) -> String {
    match id {
        Some(id) => format!("<@&{id}> ({id})"),
        None => NOT_SET.to_string(),
    }
}

pub fn channel_mention(id: Option<&str>) -> String {
    match id {
        Some(id) => format!("<#{id}> ({id})"),
        None => NOT_SET.to_string(),
    }
}

/// The top-level list of sections persisted for a tenant.
pub fn root_menu(ctx: &RenderContext<'_>, doc: &TenantDocument) -> Result<MessagePayload, TokenError> {
    let options: Vec<SelectOption> = doc
        .keys()
        .take(MAX_SELECT_OPTIONS)
        .map(|name| SelectOption {
            label: camel_case_to_title(name),
            value: name.clone(),
            description: Some(format!("Edit the {name} settings.")),
        })
        .collect();

    let select = Control::Select {
        custom_id: ctx.token(ROOT_SECTION, ROOT_SELECT, &[])?,
        placeholder: "Select a setting to edit...".to_string(),
        options,
    };

    Ok(MessagePayload {
        embed: ctx.embed(
            "Change Server Settings",
            "Modify the settings for this server using the dropdown menu below.",
            MENU_COLOR,
        ),
        rows: vec![ActionRow {
            controls: vec![select],
        }],
    })
}
