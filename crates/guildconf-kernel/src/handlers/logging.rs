use super::{read_settings, write_settings, ActionInput, FormInput, HandlerError, Outcome, SectionHandler};
use crate::forms;
use crate::render::{channel_mention, field, role_mention, rows, text_input, yes_no, RenderContext, SECTION_COLOR};
use crate::sections::SectionName;
use guildconf_contracts::{ButtonStyle, MessagePayload};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const MAX_LEVEL: i64 = 3;

const SECTION: SectionName = SectionName::Logging;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoggingSettings {
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    level: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    admin_role_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category_id: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoggingHandler;

impl LoggingHandler {
    fn view(&self, ctx: &RenderContext<'_>, settings: &LoggingSettings) -> Result<MessagePayload, HandlerError> {
        let mut embed = ctx.embed(
            "Logger System Settings",
            "Modify the settings for the Logger System using the buttons below.\n\nCurrent settings:",
            SECTION_COLOR,
        );
        embed.fields = vec![
            field("Enabled:", yes_no(settings.enabled)),
            field("Admin Role:", role_mention(settings.admin_role_id.as_deref())),
            field("Category:", channel_mention(settings.category_id.as_deref())),
            field("Logging Level:", format!("{}/{MAX_LEVEL}", settings.level)),
        ];

        let toggle = if settings.enabled {
            ctx.button(SECTION, "setDisable", "Disable Logging", ButtonStyle::Secondary)?
        } else {
            ctx.button(SECTION, "setEnable", "Enable Logging", ButtonStyle::Secondary)?
        };
        let mut layout = rows(vec![
            toggle,
            ctx.button(SECTION, "setAdminRole", "Set Admin Role", ButtonStyle::Secondary)?,
            ctx.button(SECTION, "setCategory", "Set Category", ButtonStyle::Secondary)?,
            ctx.button(SECTION, "setLoggingLevel", "Set Logging Level", ButtonStyle::Secondary)?,
        ]);
        layout.push(ctx.navigation_row(SECTION)?);

        Ok(MessagePayload { embed, rows: layout })
    }

    fn commit(
        &self,
        ctx: &RenderContext<'_>,
        doc: &mut Value,
        settings: &LoggingSettings,
        notice: Option<String>,
    ) -> Result<Outcome, HandlerError> {
        let view = self.view(ctx, settings)?;
        write_settings(SECTION, doc, settings)?;
        Ok(Outcome::Mutation { view, notice })
    }
}

impl SectionHandler for LoggingHandler {
    fn section(&self) -> SectionName {
        SECTION
    }

    fn render_menu(&self, ctx: &RenderContext<'_>, doc: &Value) -> Result<MessagePayload, HandlerError> {
        let settings: LoggingSettings = read_settings(SECTION, doc)?;
        self.view(ctx, &settings)
    }

    fn handle_action(
        &self,
        ctx: &RenderContext<'_>,
        doc: &mut Value,
        action: &str,
        _input: &ActionInput<'_>,
    ) -> Result<Outcome, HandlerError> {
        let mut settings: LoggingSettings = read_settings(SECTION, doc)?;
        match action {
            "setEnable" | "setDisable" => {
                settings.enabled = action == "setEnable";
                self.commit(ctx, doc, &settings, None)
            }
            "setAdminRole" => Ok(Outcome::FormRequest(ctx.form(
                SECTION,
                action,
                "Set Logging Admin Role",
                vec![text_input("roleId", "Role ID", 32)],
            )?)),
            "setCategory" => Ok(Outcome::FormRequest(ctx.form(
                SECTION,
                action,
                "Set Logging Category",
                vec![text_input("channelId", "Category channel ID", 32)],
            )?)),
            "setLoggingLevel" => Ok(Outcome::FormRequest(ctx.form(
                SECTION,
                action,
                "Set Logging Level",
                vec![text_input("level", "Logging level (0-3)", 1)],
            )?)),
            _ => Ok(Outcome::UnknownRoute),
        }
    }

    fn handle_form(
        &self,
        ctx: &RenderContext<'_>,
        doc: &mut Value,
        action: &str,
        input: &FormInput<'_>,
    ) -> Result<Outcome, HandlerError> {
        let mut settings: LoggingSettings = read_settings(SECTION, doc)?;
        let notice = match action {
            "setAdminRole" => {
                match forms::existing_id(input.fields, "roleId", "Role", &input.directory.roles) {
                    Ok(role) => {
                        let notice = format!("Admin role set to <@&{role}>.");
                        settings.admin_role_id = Some(role);
                        notice
                    }
                    Err(message) => return Ok(Outcome::ValidationError(message)),
                }
            }
            "setCategory" => {
                match forms::existing_id(input.fields, "channelId", "Channel", &input.directory.channels) {
                    Ok(channel) => {
                        let notice = format!("Logging category set to <#{channel}>.");
                        settings.category_id = Some(channel);
                        notice
                    }
                    Err(message) => return Ok(Outcome::ValidationError(message)),
                }
            }
            "setLoggingLevel" => {
                match forms::integer_in_range(input.fields, "level", "Logging level", 0..=MAX_LEVEL) {
                    Ok(level) => {
                        settings.level = u8::try_from(level).unwrap_or_default();
                        format!("Logging level set to {level}.")
                    }
                    Err(message) => return Ok(Outcome::ValidationError(message)),
                }
            }
            _ => return Ok(Outcome::UnknownRoute),
        };
        self.commit(ctx, doc, &settings, Some(notice))
    }
}
