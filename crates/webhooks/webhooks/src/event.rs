//! Catalogue of events emitted by Vault.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Event token that subscribes to every event.
pub const WILDCARD_EVENT: &str = "*";

/// Events that can trigger webhooks.
///
/// Subscriptions and triggers also accept arbitrary event strings; this enum
/// only names the events Vault itself emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookEvent {
    #[serde(rename = "user.created")]
    UserCreated,
    #[serde(rename = "user.updated")]
    UserUpdated,
    #[serde(rename = "user.deleted")]
    UserDeleted,
    #[serde(rename = "user.signed_in")]
    UserSignedIn,
    #[serde(rename = "user.signed_out")]
    UserSignedOut,
    #[serde(rename = "org.created")]
    OrgCreated,
    #[serde(rename = "org.updated")]
    OrgUpdated,
    #[serde(rename = "org.deleted")]
    OrgDeleted,
    #[serde(rename = "member.added")]
    MemberAdded,
    #[serde(rename = "member.updated")]
    MemberUpdated,
    #[serde(rename = "member.removed")]
    MemberRemoved,
    #[serde(rename = "role.created")]
    RoleCreated,
    #[serde(rename = "role.updated")]
    RoleUpdated,
    #[serde(rename = "role.deleted")]
    RoleDeleted,
    #[serde(rename = "role.assigned")]
    RoleAssigned,
    #[serde(rename = "invite.sent")]
    InviteSent,
    #[serde(rename = "invite.accepted")]
    InviteAccepted,
    #[serde(rename = "invite.revoked")]
    InviteRevoked,
    #[serde(rename = "api_key.created")]
    ApiKeyCreated,
    #[serde(rename = "api_key.revoked")]
    ApiKeyRevoked,
    /// Every event.
    #[serde(rename = "*")]
    All,
}

impl WebhookEvent {
    /// Every catalogued event, wildcard last.
    pub const VARIANTS: [WebhookEvent; 21] = [
        WebhookEvent::UserCreated,
        WebhookEvent::UserUpdated,
        WebhookEvent::UserDeleted,
        WebhookEvent::UserSignedIn,
        WebhookEvent::UserSignedOut,
        WebhookEvent::OrgCreated,
        WebhookEvent::OrgUpdated,
        WebhookEvent::OrgDeleted,
        WebhookEvent::MemberAdded,
        WebhookEvent::MemberUpdated,
        WebhookEvent::MemberRemoved,
        WebhookEvent::RoleCreated,
        WebhookEvent::RoleUpdated,
        WebhookEvent::RoleDeleted,
        WebhookEvent::RoleAssigned,
        WebhookEvent::InviteSent,
        WebhookEvent::InviteAccepted,
        WebhookEvent::InviteRevoked,
        WebhookEvent::ApiKeyCreated,
        WebhookEvent::ApiKeyRevoked,
        WebhookEvent::All,
    ];

    /// Returns the wire name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEvent::UserCreated => "user.created",
            WebhookEvent::UserUpdated => "user.updated",
            WebhookEvent::UserDeleted => "user.deleted",
            WebhookEvent::UserSignedIn => "user.signed_in",
            WebhookEvent::UserSignedOut => "user.signed_out",
            WebhookEvent::OrgCreated => "org.created",
            WebhookEvent::OrgUpdated => "org.updated",
            WebhookEvent::OrgDeleted => "org.deleted",
            WebhookEvent::MemberAdded => "member.added",
            WebhookEvent::MemberUpdated => "member.updated",
            WebhookEvent::MemberRemoved => "member.removed",
            WebhookEvent::RoleCreated => "role.created",
            WebhookEvent::RoleUpdated => "role.updated",
            WebhookEvent::RoleDeleted => "role.deleted",
            WebhookEvent::RoleAssigned => "role.assigned",
            WebhookEvent::InviteSent => "invite.sent",
            WebhookEvent::InviteAccepted => "invite.accepted",
            WebhookEvent::InviteRevoked => "invite.revoked",
            WebhookEvent::ApiKeyCreated => "api_key.created",
            WebhookEvent::ApiKeyRevoked => "api_key.revoked",
            WebhookEvent::All => WILDCARD_EVENT,
        }
    }
}

impl fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<WebhookEvent> for String {
    fn from(event: WebhookEvent) -> Self {
        event.as_str().to_string()
    }
}

/// Returned when a string is not a catalogued event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown webhook event: {0}")]
pub struct UnknownEvent(pub String);

impl FromStr for WebhookEvent {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WebhookEvent::VARIANTS
            .iter()
            .copied()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}
