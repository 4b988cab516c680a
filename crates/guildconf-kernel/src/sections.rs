use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Section name -> section document for one tenant.
pub type TenantDocument = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SectionName {
    Logging,
    Ticketing,
    Verification,
    Welcome,
    Farewell,
    AutoRole,
    ReactionRole,
    MessageFilter,
    AntiSpam,
    AntiRaid,
    ServerProtection,
    NicknameFilter,
    GhostPing,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown section `{0}`")]
pub struct UnknownSection(pub String);

impl SectionName {
    pub const ALL: [SectionName; 13] = [
        SectionName::Logging,
        SectionName::Ticketing,
        SectionName::Verification,
        SectionName::Welcome,
        SectionName::Farewell,
        SectionName::AutoRole,
        SectionName::ReactionRole,
        SectionName::MessageFilter,
        SectionName::AntiSpam,
        SectionName::AntiRaid,
        SectionName::ServerProtection,
        SectionName::NicknameFilter,
        SectionName::GhostPing,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SectionName::Logging => "logging",
            SectionName::Ticketing => "ticketing",
            SectionName::Verification => "verification",
            SectionName::Welcome => "welcome",
            SectionName::Farewell => "farewell",
            SectionName::AutoRole => "autoRole",
            SectionName::ReactionRole => "reactionRole",
            SectionName::MessageFilter => "messageFilter",
            SectionName::AntiSpam => "antiSpam",
            SectionName::AntiRaid => "antiRaid",
            SectionName::ServerProtection => "serverProtection",
            SectionName::NicknameFilter => "nicknameFilter",
            SectionName::GhostPing => "ghostPing",
        }
    }

    pub fn title(self) -> String {
        camel_case_to_title(self.as_str())
    }

    /// Document written for this section when a tenant is initialized.
    pub fn default_document(self) -> Value {
        match self {
            SectionName::Logging => json!({
                "enabled": true,
                "level": 3
            }),
            SectionName::Ticketing => json!({
                "enabled": true,
                "rolesInTicket": [],
                "usersInTicket": [],
                "ticketLimit": 1,
                "type": 1
            }),
            SectionName::Verification => json!({
                "enabled": false,
                "type": 1,
                "roleId": null,
                "channelId": null,
                "messageId": null
            }),
            SectionName::Welcome => json!({
                "enabled": false,
                "channelId": null,
                "message": "Welcome to the server, {user}!",
                "privateMessage": {
                    "enabled": false,
                    "message": "Welcome to the server, {user}! We're glad to have you here."
                }
            }),
            SectionName::Farewell => json!({
                "enabled": false,
                "channelId": null,
                "message": "Goodbye, {user}!",
                "privateMessage": {
                    "enabled": false,
                    "message": "Goodbye, {user}! We're sad to see you go."
                }
            }),
            SectionName::AutoRole => json!({
                "enabled": false,
                "roleIds": []
            }),
            SectionName::ReactionRole => json!({
                "enabled": false,
                "roleMappings": []
            }),
            SectionName::MessageFilter => json!({
                "enabled": false,
                "blacklistedWords": [],
                "action": {"type": "delete"}
            }),
            SectionName::AntiSpam => json!({
                "enabled": false,
                "maxMessages": 5,
                "intervalSeconds": 10,
                "punishment": {"action": "mute", "durationMinutes": 5}
            }),
            SectionName::AntiRaid => json!({
                "enabled": false,
                "joinLimit": 5,
                "intervalSeconds": 30,
                "action": {"type": "ban"}
            }),
            SectionName::ServerProtection => json!({
                "enabled": true,
                "protectChannels": true,
                "protectRoles": true,
                "protectPermissions": true,
                "timeFrameMinutes": 5,
                "threshold": 2,
                "action": {"type": "ban"},
                "trustedRoles": [],
                "trustedUsers": [],
                "logChannelId": null,
                "backupRetention": 7
            }),
            SectionName::NicknameFilter => json!({
                "enabled": false,
                "forbiddenPatterns": [],
                "action": {"type": "reset"}
            }),
            SectionName::GhostPing => json!({
                "enabled": false,
                "action": {"type": "warn"}
            }),
        }
    }
}

impl FromStr for SectionName {
    type Err = UnknownSection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SectionName::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| UnknownSection(s.to_string()))
    }
}

impl fmt::Display for SectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn default_tenant_document() -> TenantDocument {
    SectionName::ALL
        .into_iter()
        .map(|section| (section.as_str().to_string(), section.default_document()))
        .collect()
}

/// `autoRole` -> `Auto Role`
pub fn camel_case_to_title(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (idx, ch) in s.chars().enumerate() {
        if idx == 0 {
            out.extend(ch.to_uppercase());
        } else if ch.is_uppercase() {
            out.push(' ');
            out.push(ch);
        } else {
            out.push(ch);
        }
    }
    out
}
