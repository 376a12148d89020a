//! User-facing notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{BuyerId, NotificationId};

/// Notification category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Order,
    System,
    Promotion,
    Success,
    Error,
}

impl NotificationKind {
    /// Storage/wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::System => "system",
            Self::Promotion => "promotion",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order" => Ok(Self::Order),
            "system" => Ok(Self::System),
            "promotion" => Ok(Self::Promotion),
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            _ => Err(format!("invalid notification kind: {s}")),
        }
    }
}

/// A notification to be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub buyer_id: BuyerId,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub link: Option<String>,
}

impl NewNotification {
    /// Build a notification without a deep link.
    #[must_use]
    pub fn new(
        buyer_id: BuyerId,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            buyer_id,
            title: title.into(),
            message: message.into(),
            kind,
            link: None,
        }
    }

    /// Attach a deep link.
    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

/// A stored notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub buyer_id: BuyerId,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub read: bool,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Materialize a delivered notification as unread.
    #[must_use]
    pub fn from_new(new: NewNotification, created_at: DateTime<Utc>) -> Self {
        Self {
            id: NotificationId::generate(),
            buyer_id: new.buyer_id,
            title: new.title,
            message: new.message,
            kind: new.kind,
            read: false,
            link: new.link,
            created_at,
        }
    }
}
