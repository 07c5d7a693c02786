//! The independently tracked kinds of synchronizable data.

use std::fmt;

/// One of the nine independently advancing streams.
///
/// The declaration order is the order of the components in the
/// [`StreamingToken`](crate::StreamingToken) wire form and must never change;
/// new categories may only be appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    /// Room timeline events.
    Pdu,
    /// Typing notifications.
    Typing,
    /// Read receipts.
    Receipt,
    /// Room invites.
    Invite,
    /// Device-to-device messages.
    SendToDevice,
    /// Global and per-room account data.
    AccountData,
    /// Device list changes of users sharing a room.
    DeviceList,
    /// Unread notification counts.
    NotificationData,
    /// Presence updates.
    Presence,
}

impl Category {
    /// Every category in wire order.
    pub const ALL: [Category; 9] = [
        Category::Pdu,
        Category::Typing,
        Category::Receipt,
        Category::Invite,
        Category::SendToDevice,
        Category::AccountData,
        Category::DeviceList,
        Category::NotificationData,
        Category::Presence,
    ];

    /// Number of categories.
    pub const COUNT: usize = Self::ALL.len();

    /// Position of this category inside a token.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Static label, used for logging and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Category::Pdu => "pdu",
            Category::Typing => "typing",
            Category::Receipt => "receipt",
            Category::Invite => "invite",
            Category::SendToDevice => "send_to_device",
            Category::AccountData => "account_data",
            Category::DeviceList => "device_list",
            Category::NotificationData => "notification_data",
            Category::Presence => "presence",
        }
    }

    /// Whether the category is persisted; typing notices live only in memory.
    #[must_use]
    pub const fn is_durable(self) -> bool {
        !matches!(self, Category::Typing)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
