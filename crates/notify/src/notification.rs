use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use dealflow_auth::Actor;
use dealflow_core::{CompanyId, NotificationId, UserId};

use crate::event::{EntityAction, EntityEvent};
use crate::fanout::Recipient;

/// Severity shown next to the notification.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::Info => "info",
            NotificationCategory::Success => "success",
            NotificationCategory::Warning => "warning",
            NotificationCategory::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(NotificationCategory::Info),
            "success" => Some(NotificationCategory::Success),
            "warning" => Some(NotificationCategory::Warning),
            "error" => Some(NotificationCategory::Error),
            _ => None,
        }
    }
}

/// Persisted per-recipient notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub recipient_id: UserId,
    pub company_id: CompanyId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// A row about to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub recipient_id: UserId,
    pub company_id: CompanyId,
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
    pub link: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl NewNotification {
    pub fn into_notification(self, id: NotificationId, created_at: DateTime<Utc>) -> Notification {
        Notification {
            id,
            title: self.title,
            message: self.message,
            category: self.category,
            link: self.link,
            read: false,
            read_at: None,
            created_at,
            recipient_id: self.recipient_id,
            company_id: self.company_id,
            metadata: self.metadata,
        }
    }
}

/// Recipient-independent part of a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationContent {
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
    pub link: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl NotificationContent {
    pub fn new(title: impl Into<String>, message: impl Into<String>, category: NotificationCategory) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            category,
            link: None,
            metadata: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Default wording for an entity event.
    pub fn for_event(actor: &Actor, event: &EntityEvent) -> Self {
        let label = event.entity.label();
        let title = match event.action {
            EntityAction::Created => format!("New {label} created"),
            _ => format!("{} {}", capitalize(label), event.action),
        };

        let message = match &event.label {
            Some(name) => format!("{} '{}' was {}", capitalize(label), name, event.action),
            None => format!("{} {} was {}", article(label), label, event.action),
        };

        let category = match event.action {
            EntityAction::Deleted => NotificationCategory::Warning,
            EntityAction::Created | EntityAction::Updated => NotificationCategory::Info,
        };

        let mut content = Self::new(title, message, category).with_metadata(json!({
            "entity_type": event.entity,
            "action": event.action,
            "record_id": event.record_id,
            "actor_id": actor.id,
        }));

        // Deleted records have nothing to link to.
        if let Some(record_id) = event.record_id.filter(|_| event.action != EntityAction::Deleted) {
            content = content.with_link(format!("/{}/{}", event.entity.descriptor().table, record_id));
        }

        content
    }

    pub fn for_recipient(&self, recipient: &Recipient) -> NewNotification {
        NewNotification {
            recipient_id: recipient.user_id,
            company_id: recipient.company_id,
            title: self.title.clone(),
            message: self.message.clone(),
            category: self.category,
            link: self.link.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Envelope pushed to live connections.
///
/// Serializes as `{"type": "new_notification", "notification": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEnvelope {
    NewNotification { notification: Notification },
}

impl PushEnvelope {
    pub fn company_id(&self) -> CompanyId {
        match self {
            PushEnvelope::NewNotification { notification } => notification.company_id,
        }
    }
}

/// Indefinite article for a lowercase label.
fn article(label: &str) -> &'static str {
    match label.chars().next() {
        Some('a' | 'e' | 'i' | 'o' | 'u') => "An",
        _ => "A",
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealflow_auth::{EntityKind, Role};
    use dealflow_core::RecordId;

    fn actor() -> Actor {
        Actor::new(UserId::new(), CompanyId::new(), Some(Role::SalesRep))
    }

    #[test]
    fn created_event_wording_and_link() {
        let record = RecordId::new();
        let event = EntityEvent::created(EntityKind::Deal)
            .with_record(record)
            .with_label("Acme renewal");
        let content = NotificationContent::for_event(&actor(), &event);

        assert_eq!(content.title, "New deal created");
        assert_eq!(content.message, "Deal 'Acme renewal' was created");
        assert_eq!(content.category, NotificationCategory::Info);
        assert_eq!(content.link, Some(format!("/deals/{record}")));
        let meta = content.metadata.unwrap();
        assert_eq!(meta["entity_type"], "deal");
        assert_eq!(meta["action"], "created");
    }

    #[test]
    fn deleted_event_is_a_warning_without_link() {
        let event = EntityEvent::deleted(EntityKind::SupportTicket).with_record(RecordId::new());
        let content = NotificationContent::for_event(&actor(), &event);

        assert_eq!(content.title, "Support ticket deleted");
        assert_eq!(content.message, "A support ticket was deleted");
        assert_eq!(content.category, NotificationCategory::Warning);
        assert_eq!(content.link, None);
    }

    #[test]
    fn article_follows_the_label() {
        let activity = NotificationContent::for_event(&actor(), &EntityEvent::deleted(EntityKind::Activity));
        assert_eq!(activity.message, "An activity was deleted");

        let quote = NotificationContent::for_event(&actor(), &EntityEvent::new(EntityKind::Quote, EntityAction::Updated));
        assert_eq!(quote.message, "A quote was updated");
    }

    #[test]
    fn envelope_shape() {
        let n = NewNotification {
            recipient_id: UserId::new(),
            company_id: CompanyId::new(),
            title: "t".into(),
            message: "m".into(),
            category: NotificationCategory::Info,
            link: None,
            metadata: None,
        }
        .into_notification(NotificationId::new(), Utc::now());

        let json = serde_json::to_value(PushEnvelope::NewNotification { notification: n.clone() }).unwrap();
        assert_eq!(json["type"], "new_notification");
        assert_eq!(json["notification"]["read"], false);
        assert_eq!(json["notification"]["category"], "info");
        assert!(json["notification"].get("link").is_none());
        assert_eq!(json["notification"]["recipient_id"], serde_json::to_value(n.recipient_id).unwrap());
    }

    #[test]
    fn category_tokens_parse_back() {
        for c in [
            NotificationCategory::Info,
            NotificationCategory::Success,
            NotificationCategory::Warning,
            NotificationCategory::Error,
        ] {
            assert_eq!(NotificationCategory::parse(c.as_str()), Some(c));
        }
    }
}
