use super::{read_settings, write_settings, ActionInput, FormInput, HandlerError, Outcome, SectionHandler};
use crate::forms;
use crate::render::{
    channel_mention, field, rows, text_input, RenderContext, MAX_SELECT_OPTIONS, SECTION_COLOR,
    SUBVIEW_COLOR,
};
use crate::sections::SectionName;
use guildconf_contracts::{ActionRow, ButtonStyle, Control, Directory, MessagePayload, SelectOption};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const MAX_TICKET_LIMIT: i64 = 25;
pub const MAX_TICKET_TYPE: i64 = 2;

const SECTION: SectionName = SectionName::Ticketing;
const MEMBER_PREFIX: &str = "member:";
/// Member sub-view actions; the member kind travels as the first token arg.
const MEMBERS_ACTION: &str = "members";
const ADD_MEMBER: &str = "addMember";
const REMOVE_MEMBER: &str = "removeMember";
/// add, remove and clear come first in every member select.
const MEMBER_COMMANDS: usize = 3;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TicketingSettings {
    #[serde(default)]
    enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    general_category_id: Option<String>,
    #[serde(default)]
    roles_in_ticket: Vec<String>,
    #[serde(default)]
    users_in_ticket: Vec<String>,
    #[serde(default)]
    ticket_limit: u32,
    #[serde(default = "default_type", rename = "type")]
    ticket_type: u8,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

fn default_type() -> u8 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Members {
    Roles,
    Users,
}

impl Members {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "roles" => Some(Members::Roles),
            "users" => Some(Members::Users),
            _ => None,
        }
    }

    fn arg(self) -> &'static str {
        match self {
            Members::Roles => "roles",
            Members::Users => "users",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            Members::Roles => "Role",
            Members::Users => "User",
        }
    }

    fn mention(self, id: &str) -> String {
        match self {
            Members::Roles => format!("<@&{id}>"),
            Members::Users => format!("<@{id}>"),
        }
    }

    fn list(self, settings: &TicketingSettings) -> &[String] {
        match self {
            Members::Roles => &settings.roles_in_ticket,
            Members::Users => &settings.users_in_ticket,
        }
    }

    fn list_mut(self, settings: &mut TicketingSettings) -> &mut Vec<String> {
        match self {
            Members::Roles => &mut settings.roles_in_ticket,
            Members::Users => &mut settings.users_in_ticket,
        }
    }

    fn known(self, directory: &Directory) -> &[String] {
        match self {
            Members::Roles => &directory.roles,
            Members::Users => &directory.users,
        }
    }

    fn summary(self, ids: &[String]) -> String {
        if ids.is_empty() {
            return format!("No {}s Set.", self.noun());
        }
        ids.iter()
            .map(|id| self.mention(id))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TicketingHandler;

impl TicketingHandler {
    fn view(&self, ctx: &RenderContext<'_>, settings: &TicketingSettings) -> Result<MessagePayload, HandlerError> {
        let mut embed = ctx.embed(
            "Ticket System Settings",
            "Modify the settings for the Ticket System using the buttons below.\n\nCurrent settings:",
            SECTION_COLOR,
        );
        let limit = match settings.ticket_limit {
            0 => "No Limit Set.".to_string(),
            n => n.to_string(),
        };
        embed.fields = vec![
            field(
                "Ticket System Status:",
                if settings.enabled { "Enabled." } else { "Disabled." },
            ),
            field(
                "General Category:",
                channel_mention(settings.general_category_id.as_deref()),
            ),
            field("Roles in Ticket:", Members::Roles.summary(&settings.roles_in_ticket)),
            field("Users in Ticket:", Members::Users.summary(&settings.users_in_ticket)),
            field("Ticket Limit:", limit),
            field("Ticket Type:", settings.ticket_type.to_string()),
        ];

        let toggle = if settings.enabled {
            ctx.button(SECTION, "setDisable", "Disable Ticket System", ButtonStyle::Secondary)?
        } else {
            ctx.button(SECTION, "setEnable", "Enable Ticket System", ButtonStyle::Secondary)?
        };
        let mut layout = rows(vec![
            toggle,
            ctx.button(SECTION, "setGeneralCategory", "Set General Category", ButtonStyle::Secondary)?,
            ctx.button(SECTION, "manageRoles", "Manage Roles in Ticket", ButtonStyle::Secondary)?,
            ctx.button(SECTION, "manageUsers", "Manage Users in Ticket", ButtonStyle::Secondary)?,
            ctx.button(SECTION, "setTicketLimit", "Set Ticket Limit", ButtonStyle::Secondary)?,
            ctx.button(SECTION, "setType", "Manage Ticket Type", ButtonStyle::Secondary)?,
        ]);
        layout.push(ctx.navigation_row(SECTION)?);

        Ok(MessagePayload { embed, rows: layout })
    }

    fn member_view(
        &self,
        ctx: &RenderContext<'_>,
        settings: &TicketingSettings,
        members: Members,
    ) -> Result<MessagePayload, HandlerError> {
        let noun = members.noun();
        let mut embed = ctx.embed(
            &format!("Manage {noun}s in Tickets"),
            &format!("Use the menu below to add or remove {}s that have access to all tickets.", noun.to_lowercase()),
            SUBVIEW_COLOR,
        );
        embed.fields = vec![field(
            &format!("{noun}s in Ticket:"),
            members.summary(members.list(settings)),
        )];

        let mut options = vec![
            select_option(&format!("Add {noun}"), "add"),
            select_option(&format!("Remove {noun}"), "remove"),
            select_option(&format!("Clear All {noun}s"), "clear"),
        ];
        options.extend(
            members
                .list(settings)
                .iter()
                .take(MAX_SELECT_OPTIONS - MEMBER_COMMANDS)
                .map(|id| select_option(&format!("{noun} ID: {id}"), &format!("{MEMBER_PREFIX}{id}"))),
        );

        let select = Control::Select {
            custom_id: ctx.token(SECTION.as_str(), MEMBERS_ACTION, &[members.arg()])?,
            placeholder: format!("Select an option or {}.", noun.to_lowercase()),
            options,
        };
        let back = ctx.button(SECTION, "back", "Back to Ticket Settings", ButtonStyle::Primary)?;

        Ok(MessagePayload {
            embed,
            rows: vec![
                ActionRow {
                    controls: vec![select],
                },
                ActionRow {
                    controls: vec![back],
                },
            ],
        })
    }

    fn member_selection(
        &self,
        ctx: &RenderContext<'_>,
        doc: &mut Value,
        mut settings: TicketingSettings,
        members: Members,
        values: &[String],
    ) -> Result<Outcome, HandlerError> {
        let Some(selected) = values.first() else {
            return Ok(Outcome::View(self.member_view(ctx, &settings, members)?));
        };
        let noun = members.noun();

        match selected.as_str() {
            "add" | "remove" => {
                let add = selected == "add";
                let title = if add {
                    format!("Add {noun} to Tickets")
                } else {
                    format!("Remove {noun} from Tickets")
                };
                Ok(Outcome::FormRequest(ctx.form_with_args(
                    SECTION,
                    if add { ADD_MEMBER } else { REMOVE_MEMBER },
                    &[members.arg()],
                    &title,
                    vec![text_input("id", &format!("{noun} ID"), 32)],
                )?))
            }
            "clear" => {
                members.list_mut(&mut settings).clear();
                let view = self.member_view(ctx, &settings, members)?;
                write_settings(SECTION, doc, &settings)?;
                Ok(Outcome::mutated_with_notice(view, format!("All {}s removed from tickets.", noun.to_lowercase())))
            }
            other => {
                let Some(id) = other.strip_prefix(MEMBER_PREFIX) else {
                    return Ok(Outcome::UnknownRoute);
                };
                let list = members.list_mut(&mut settings);
                let before = list.len();
                list.retain(|member| member != id);
                if list.len() == before {
                    return Ok(Outcome::ValidationError(format!(
                        "{noun} `{id}` is not in the ticket list."
                    )));
                }
                let notice = format!("{} removed from tickets.", members.mention(id));
                let view = self.member_view(ctx, &settings, members)?;
                write_settings(SECTION, doc, &settings)?;
                Ok(Outcome::mutated_with_notice(view, notice))
            }
        }
    }

    fn member_form(
        &self,
        ctx: &RenderContext<'_>,
        doc: &mut Value,
        mut settings: TicketingSettings,
        members: Members,
        add: bool,
        input: &FormInput<'_>,
    ) -> Result<Outcome, HandlerError> {
        let noun = members.noun();
        let pool: &[String] = if add {
            members.known(input.directory)
        } else {
            members.list(&settings)
        };
        let id = match forms::existing_id(input.fields, "id", noun, pool) {
            Ok(id) => id,
            Err(message) if add => return Ok(Outcome::ValidationError(message)),
            Err(_) => {
                return Ok(Outcome::ValidationError(format!(
                    "{noun} is not in the ticket list."
                )))
            }
        };

        let list = members.list_mut(&mut settings);
        let notice = if add {
            if list.contains(&id) {
                return Ok(Outcome::ValidationError(format!(
                    "{} already has access to tickets.",
                    members.mention(&id)
                )));
            }
            list.push(id.clone());
            format!("{} added to tickets.", members.mention(&id))
        } else {
            list.retain(|member| *member != id);
            format!("{} removed from tickets.", members.mention(&id))
        };

        let view = self.member_view(ctx, &settings, members)?;
        write_settings(SECTION, doc, &settings)?;
        Ok(Outcome::mutated_with_notice(view, notice))
    }

    fn commit(
        &self,
        ctx: &RenderContext<'_>,
        doc: &mut Value,
        settings: &TicketingSettings,
        notice: Option<String>,
    ) -> Result<Outcome, HandlerError> {
        let view = self.view(ctx, settings)?;
        write_settings(SECTION, doc, settings)?;
        Ok(Outcome::Mutation { view, notice })
    }
}

fn select_option(label: &str, value: &str) -> SelectOption {
    SelectOption {
        label: label.to_string(),
        value: value.to_string(),
        description: None,
    }
}

impl SectionHandler for TicketingHandler {
    fn section(&self) -> SectionName {
        SECTION
    }

    fn render_menu(&self, ctx: &RenderContext<'_>, doc: &Value) -> Result<MessagePayload, HandlerError> {
        let settings: TicketingSettings = read_settings(SECTION, doc)?;
        self.view(ctx, &settings)
    }

    fn handle_action(
        &self,
        ctx: &RenderContext<'_>,
        doc: &mut Value,
        action: &str,
        input: &ActionInput<'_>,
    ) -> Result<Outcome, HandlerError> {
        let mut settings: TicketingSettings = read_settings(SECTION, doc)?;
        match action {
            "manageRoles" => Ok(Outcome::View(self.member_view(ctx, &settings, Members::Roles)?)),
            "manageUsers" => Ok(Outcome::View(self.member_view(ctx, &settings, Members::Users)?)),
            MEMBERS_ACTION => match input.args.first().and_then(|arg| Members::from_arg(arg)) {
                Some(members) => self.member_selection(ctx, doc, settings, members, input.values),
                None => Ok(Outcome::UnknownRoute),
            },
            "setEnable" | "setDisable" => {
                settings.enabled = action == "setEnable";
                self.commit(ctx, doc, &settings, None)
            }
            "back" => Ok(Outcome::View(self.view(ctx, &settings)?)),
            "setGeneralCategory" => Ok(Outcome::FormRequest(ctx.form(
                SECTION,
                action,
                "Set General Ticket Category",
                vec![text_input("channelId", "Category channel ID", 32)],
            )?)),
            "setTicketLimit" => Ok(Outcome::FormRequest(ctx.form(
                SECTION,
                action,
                "Set Ticket Limit",
                vec![text_input("limit", "Open tickets per user (0 = no limit)", 2)],
            )?)),
            "setType" => Ok(Outcome::FormRequest(ctx.form(
                SECTION,
                action,
                "Set Ticket Type",
                vec![text_input("type", "Ticket type (1 or 2)", 1)],
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
        let mut settings: TicketingSettings = read_settings(SECTION, doc)?;
        if action == ADD_MEMBER || action == REMOVE_MEMBER {
            return match input.args.first().and_then(|arg| Members::from_arg(arg)) {
                Some(members) => self.member_form(ctx, doc, settings, members, action == ADD_MEMBER, input),
                None => Ok(Outcome::UnknownRoute),
            };
        }

        let notice = match action {
            "setGeneralCategory" => {
                match forms::existing_id(input.fields, "channelId", "Channel", &input.directory.channels) {
                    Ok(channel) => {
                        let notice = format!("General category set to <#{channel}>.");
                        settings.general_category_id = Some(channel);
                        notice
                    }
                    Err(message) => return Ok(Outcome::ValidationError(message)),
                }
            }
            "setTicketLimit" => {
                match forms::integer_in_range(input.fields, "limit", "Ticket limit", 0..=MAX_TICKET_LIMIT) {
                    Ok(limit) => {
                        settings.ticket_limit = u32::try_from(limit).unwrap_or_default();
                        if limit == 0 {
                            "Ticket limit removed.".to_string()
                        } else {
                            format!("Ticket limit set to {limit}.")
                        }
                    }
                    Err(message) => return Ok(Outcome::ValidationError(message)),
                }
            }
            "setType" => match forms::integer_in_range(input.fields, "type", "Ticket type", 1..=MAX_TICKET_TYPE) {
                Ok(kind) => {
                    settings.ticket_type = u8::try_from(kind).unwrap_or(1);
                    format!("Ticket type set to {kind}.")
                }
                Err(message) => return Ok(Outcome::ValidationError(message)),
            },
            _ => return Ok(Outcome::UnknownRoute),
        };
        self.commit(ctx, doc, &settings, Some(notice))
    }
}
