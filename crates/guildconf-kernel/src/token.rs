//! Routing tokens: the compact identifiers attached to every rendered control.
//!
//! Wire form is `tenant-section-action[-arg...]`. No field may contain the
//! separator, so decoding is a plain split.

use thiserror::Error;

pub const SEPARATOR: char = '-';
/// Transport limit on control identifiers.
pub const MAX_TOKEN_LEN: usize = 100;
pub const MIN_FIELDS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token field `{field}` contains the reserved separator `{SEPARATOR}`")]
    InvalidField { field: String },
    #[error("token is {len} characters long; the limit is {MAX_TOKEN_LEN}")]
    TooLong { len: usize },
    #[error("malformed token: expected at least {MIN_FIELDS} fields, found {found}")]
    Malformed { found: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingToken {
    pub tenant_id: String,
    pub section: String,
    pub action: String,
    pub args: Vec<String>,
}

pub fn encode(
    tenant_id: &str,
    section: &str,
    action: &str,
    args: &[&str],
) -> Result<String, TokenError> {
    check_field("tenant_id", tenant_id)?;
    check_field("section", section)?;
    check_field("action", action)?;
    for (idx, arg) in args.iter().enumerate() {
        check_field(&format!("args[{idx}]"), arg)?;
    }

    let mut token = String::with_capacity(tenant_id.len() + section.len() + action.len() + 2);
    token.push_str(tenant_id);
    for part in [section, action].into_iter().chain(args.iter().copied()) {
        token.push(SEPARATOR);
        token.push_str(part);
    }

    let len = token.chars().count();
    if len > MAX_TOKEN_LEN {
        return Err(TokenError::TooLong { len });
    }
    Ok(token)
}

pub fn decode(token: &str) -> Result<RoutingToken, TokenError> {
    let mut fields = token.split(SEPARATOR);
    let tenant_id = fields.next().unwrap_or_default().to_string();
    let section = fields.next().unwrap_or_default().to_string();
    let action = fields.next();
    let args: Vec<String> = fields.map(str::to_string).collect();

    match action {
        Some(action) => Ok(RoutingToken {
            tenant_id,
            section,
            action: action.to_string(),
            args,
        }),
        None => Err(TokenError::Malformed {
            found: token.split(SEPARATOR).count(),
        }),
    }
}

fn check_field(name: &str, value: &str) -> Result<(), TokenError> {
    if value.contains(SEPARATOR) {
        return Err(TokenError::InvalidField {
            field: name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encodes_fields_in_order() {
        let token = encode("G2", "logging", "setEnable", &[]).unwrap();
        assert_eq!(token, "G2-logging-setEnable");

        let token = encode("G2", "ticketing", "manageRoles", &["42", "7"]).unwrap();
        assert_eq!(token, "G2-ticketing-manageRoles-42-7");
    }

    #[test]
    fn rejects_separator_inside_fields() {
        let err = encode("G-2", "logging", "setEnable", &[]).unwrap_err();
        assert_eq!(
            err,
            TokenError::InvalidField {
                field: "tenant_id".to_string()
            }
        );
        let err = encode("G2", "logging", "setEnable", &["ok", "bad-arg"]).unwrap_err();
        assert_eq!(
            err,
            TokenError::InvalidField {
                field: "args[1]".to_string()
            }
        );
    }

    #[test]
    fn rejects_tokens_over_the_transport_limit() {
        let long = "x".repeat(MAX_TOKEN_LEN);
        let err = encode("G2", "logging", &long, &[]).unwrap_err();
        assert!(matches!(err, TokenError::TooLong { .. }));
    }

    #[test]
    fn short_tokens_are_malformed() {
        for raw in ["", "G1", "G1-logging", "select_guild_setting"] {
            let err = decode(raw).unwrap_err();
            assert!(matches!(err, TokenError::Malformed { .. }), "{raw}");
        }
    }

    #[test]
    fn missing_values_decode_to_empty_strings() {
        let token = decode("-logging-setEnable").unwrap();
        assert_eq!(token.tenant_id, "");
        let token = decode("G1--setEnable").unwrap();
        assert_eq!(token.section, "");
        assert!(token.args.is_empty());
    }

    proptest! {
        #[test]
        fn round_trips_fields_without_separator(
            tenant in "[A-Za-z0-9_]{0,12}",
            section in "[A-Za-z0-9_]{0,12}",
            action in "[A-Za-z0-9_]{0,12}",
            args in proptest::collection::vec("[A-Za-z0-9_:]{0,8}", 0..4),
        ) {
            let refs: Vec<&str> = args.iter().map(String::as_str).collect();
            let encoded = encode(&tenant, &section, &action, &refs).unwrap();
            let decoded = decode(&encoded).unwrap();
            prop_assert_eq!(decoded, RoutingToken { tenant_id: tenant, section, action, args });
        }
    }
}
