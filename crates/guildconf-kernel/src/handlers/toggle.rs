use super::{ActionInput, FormInput, HandlerError, Outcome, SectionHandler};
use crate::render::{field, rows, yes_no, RenderContext, SECTION_COLOR};
use crate::sections::{camel_case_to_title, SectionName};
use guildconf_contracts::{ButtonStyle, EmbedField, MessagePayload};
use serde_json::Value;

/// Sections without a dedicated handler: shows the scalar settings and flips
/// `enabled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleHandler {
    section: SectionName,
}

impl ToggleHandler {
    pub fn new(section: SectionName) -> Self {
        Self { section }
    }

    fn document_error(&self, message: &str) -> HandlerError {
        HandlerError::Document {
            section: self.section,
            message: message.to_string(),
        }
    }

    fn view(&self, ctx: &RenderContext<'_>, doc: &Value) -> Result<MessagePayload, HandlerError> {
        let settings = doc
            .as_object()
            .ok_or_else(|| self.document_error("expected an object"))?;
        let title = self.section.title();

        let mut embed = ctx.embed(
            &format!("{title} Settings"),
            &format!("Modify the settings for {title} using the buttons below.\n\nCurrent settings:"),
            SECTION_COLOR,
        );
        embed.fields = settings
            .iter()
            .filter_map(|(key, value)| scalar_field(key, value))
            .collect();

        let enabled = settings.get("enabled").and_then(Value::as_bool).unwrap_or(false);
        let toggle = if enabled {
            ctx.button(self.section, "setDisable", &format!("Disable {title}"), ButtonStyle::Secondary)?
        } else {
            ctx.button(self.section, "setEnable", &format!("Enable {title}"), ButtonStyle::Secondary)?
        };
        let mut layout = rows(vec![toggle]);
        layout.push(ctx.navigation_row(self.section)?);

        Ok(MessagePayload { embed, rows: layout })
    }
}

fn scalar_field(key: &str, value: &Value) -> Option<EmbedField> {
    let shown = match value {
        Value::Bool(flag) => yes_no(*flag).to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Null => "Not Set.".to_string(),
        Value::Array(_) | Value::Object(_) => return None,
    };
    Some(field(&format!("{}:", camel_case_to_title(key)), shown))
}

impl SectionHandler for ToggleHandler {
    fn section(&self) -> SectionName {
        self.section
    }

    fn render_menu(&self, ctx: &RenderContext<'_>, doc: &Value) -> Result<MessagePayload, HandlerError> {
        self.view(ctx, doc)
    }

    fn handle_action(
        &self,
        ctx: &RenderContext<'_>,
        doc: &mut Value,
        action: &str,
        _input: &ActionInput<'_>,
    ) -> Result<Outcome, HandlerError> {
        let enable = match action {
            "setEnable" => true,
            "setDisable" => false,
            _ => return Ok(Outcome::UnknownRoute),
        };
        let mut next = doc.clone();
        next.as_object_mut()
            .ok_or_else(|| self.document_error("expected an object"))?
            .insert("enabled".to_string(), Value::Bool(enable));
        let view = self.view(ctx, &next)?;
        *doc = next;
        Ok(Outcome::mutated(view))
    }

    fn handle_form(
        &self,
        _ctx: &RenderContext<'_>,
        _doc: &mut Value,
        _action: &str,
        _input: &FormInput<'_>,
    ) -> Result<Outcome, HandlerError> {
        Ok(Outcome::UnknownRoute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guildconf_contracts::Directory;
    use serde_json::json;

    #[test]
    fn toggling_preserves_nested_settings() {
        let handler = ToggleHandler::new(SectionName::AntiSpam);
        let mut doc = SectionName::AntiSpam.default_document();
        let ctx = RenderContext::new("G3", None);
        let input = ActionInput { args: &[], values: &[] };

        let outcome = handler.handle_action(&ctx, &mut doc, "setEnable", &input).unwrap();
        assert_eq!(doc["enabled"], true);
        assert_eq!(doc["punishment"]["durationMinutes"], 5);

        match outcome {
            Outcome::Mutation { view, notice: None } => {
                assert_eq!(view.embed.title, "Anti Spam Settings");
                let mut names: Vec<&str> = view.embed.fields.iter().map(|f| f.name.as_str()).collect();
                names.sort_unstable();
                assert_eq!(names, vec!["Enabled:", "Interval Seconds:", "Max Messages:"]);
                assert!(view.controls().any(|c| c.custom_id() == "G3-antiSpam-setDisable"));
            }
            other => panic!("expected mutation, got {other:?}"),
        }
    }

    #[test]
    fn non_object_documents_are_rejected() {
        let handler = ToggleHandler::new(SectionName::Welcome);
        let mut doc = json!("corrupt");
        let ctx = RenderContext::new("G3", None);
        let input = ActionInput { args: &[], values: &[] };
        assert!(handler.handle_action(&ctx, &mut doc, "setEnable", &input).is_err());
        assert_eq!(doc, json!("corrupt"));
    }

    #[test]
    fn forms_and_other_actions_are_unknown() {
        let handler = ToggleHandler::new(SectionName::GhostPing);
        let mut doc = SectionName::GhostPing.default_document();
        let ctx = RenderContext::new("G3", None);
        let fields = Default::default();
        let directory = Directory::default();
        let form = FormInput {
            args: &[],
            fields: &fields,
            directory: &directory,
        };
        assert_eq!(
            handler.handle_form(&ctx, &mut doc, "setChannel", &form).unwrap(),
            Outcome::UnknownRoute
        );
        let input = ActionInput { args: &[], values: &[] };
        assert_eq!(
            handler.handle_action(&ctx, &mut doc, "purge", &input).unwrap(),
            Outcome::UnknownRoute
        );
    }
}
