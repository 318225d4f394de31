//! Webhook subscription model.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{WebhookError, WebhookResult};
use crate::event::WILDCARD_EVENT;

/// Maximum length of a subscription description, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Placeholder shown instead of a secret once it has been issued.
pub const REDACTED_SECRET: &str = "********";

/// A registered webhook subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookSubscription {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning organization. `None` marks a global subscription.
    pub organization_id: Option<Uuid>,
    /// Target URL.
    pub url: String,
    /// Secret for signing payloads.
    pub secret: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// Subscribed event names. `"*"` subscribes to everything.
    pub events: BTreeSet<String>,
    /// Whether deliveries are attempted.
    pub is_active: bool,
    /// Failures since the last success or reactivation.
    pub failure_count: u32,
    /// Last delivery attempt of any outcome.
    pub last_triggered_at: Option<DateTime<Utc>>,
    /// Last successful delivery.
    pub last_success_at: Option<DateTime<Utc>>,
    /// Last failed delivery.
    pub last_failure_at: Option<DateTime<Utc>>,
    /// When the subscription was created.
    pub created_at: DateTime<Utc>,
    /// When the subscription was last updated.
    pub updated_at: DateTime<Utc>,
}

impl WebhookSubscription {
    /// Builds an active subscription from a validated request.
    pub(crate) fn from_request(request: NewSubscription, secret: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id: request.organization_id,
            url: request.url,
            secret,
            description: request.description,
            events: request.events.into_iter().collect(),
            is_active: true,
            failure_count: 0,
            last_triggered_at: None,
            last_success_at: None,
            last_failure_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Checks if this subscription is not scoped to an organization.
    pub fn is_global(&self) -> bool {
        self.organization_id.is_none()
    }

    /// Checks if this subscription wants an event.
    ///
    /// Only the exact event name or the literal `"*"` match; `user.*` is
    /// not a prefix pattern here.
    pub fn subscribes_to(&self, event: &str) -> bool {
        self.events.contains(WILDCARD_EVENT) || self.events.contains(event)
    }

    /// Returns a copy with the secret masked, for listing surfaces.
    pub fn redacted(&self) -> Self {
        Self {
            secret: REDACTED_SECRET.to_string(),
            ..self.clone()
        }
    }
}

/// Request to create a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubscription {
    /// Target URL.
    pub url: String,
    /// Event names to subscribe to.
    pub events: Vec<String>,
    /// Owning organization, or `None` for a global subscription.
    pub organization_id: Option<Uuid>,
    /// Human-readable description.
    pub description: Option<String>,
}

impl NewSubscription {
    /// Creates a request for a global subscription.
    pub fn new(url: impl Into<String>, events: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            url: url.into(),
            events: events.into_iter().map(Into::into).collect(),
            organization_id: None,
            description: None,
        }
    }

    /// Scopes the subscription to an organization.
    pub fn organization(mut self, organization_id: Uuid) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    /// Sets the description.
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Validates the request.
    pub fn validate(&self) -> WebhookResult<()> {
        validate_url(&self.url)?;
        if self.events.is_empty() {
            return Err(WebhookError::InvalidSubscription(
                "at least one event is required".to_string(),
            ));
        }
        validate_events(&self.events)?;
        if let Some(desc) = &self.description {
            validate_description(desc)?;
        }
        Ok(())
    }
}

/// Partial update of a subscription. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionUpdate {
    /// New target URL.
    pub url: Option<String>,
    /// New event set.
    pub events: Option<Vec<String>>,
    /// New description.
    pub description: Option<String>,
    /// Enable or disable the subscription.
    pub is_active: Option<bool>,
}

impl SubscriptionUpdate {
    /// Creates an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Replaces the event set.
    pub fn events(mut self, events: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.events = Some(events.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the description.
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Enables or disables the subscription.
    pub fn active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    /// Validates the fields that are set.
    pub fn validate(&self) -> WebhookResult<()> {
        if let Some(url) = &self.url {
            validate_url(url)?;
        }
        if let Some(events) = &self.events {
            validate_events(events)?;
        }
        if let Some(desc) = &self.description {
            validate_description(desc)?;
        }
        Ok(())
    }

    /// Applies the update to a subscription.
    ///
    /// Reactivating resets the failure counter.
    pub fn apply(&self, subscription: &mut WebhookSubscription, now: DateTime<Utc>) {
        if let Some(url) = &self.url {
            subscription.url = url.clone();
        }
        if let Some(events) = &self.events {
            subscription.events = events.iter().cloned().collect();
        }
        if let Some(desc) = &self.description {
            subscription.description = Some(desc.clone());
        }
        if let Some(is_active) = self.is_active {
            subscription.is_active = is_active;
            if is_active {
                subscription.failure_count = 0;
            }
        }
        subscription.updated_at = now;
    }
}

fn validate_url(url: &str) -> WebhookResult<()> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| WebhookError::InvalidSubscription(format!("invalid url {:?}: {}", url, e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(WebhookError::InvalidSubscription(format!(
            "unsupported url scheme: {}",
            scheme
        ))),
    }
}

fn validate_events(events: &[String]) -> WebhookResult<()> {
    if events.iter().any(|e| e.trim().is_empty()) {
        return Err(WebhookError::InvalidSubscription(
            "event names must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_description(desc: &str) -> WebhookResult<()> {
    if desc.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(WebhookError::InvalidSubscription(format!(
            "description exceeds {} characters",
            MAX_DESCRIPTION_LEN
        )));
    }
    Ok(())
}
