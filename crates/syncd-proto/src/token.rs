//! The composite, resumable sync token.
//!
//! A [`StreamingToken`] is a vector clock with one [`StreamPosition`] per
//! [`Category`]. Tokens are only ordered per category; there is no scalar
//! ordering between two tokens.
//!
//! ## Wire form
//!
//! `s<pdu>_<typing>_<receipt>_<invite>_<send_to_device>_<account_data>_<device_list>_<notification_data>_<presence>`
//!
//! Decoding is forward and backward compatible: missing trailing components
//! (tokens issued before a category existed) decode as zero, and unknown
//! trailing components (tokens issued by a newer build) are ignored.

use crate::category::Category;
use crate::error::TokenError;
use crate::position::StreamPosition;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Marker prefix of the streaming token wire form.
const PREFIX: char = 's';

/// Separator between position components.
const SEPARATOR: char = '_';

/// One position per category; the client's resumption cursor.
///
/// # Example
///
/// ```rust
/// use syncd_proto::{Category, StreamPosition, StreamingToken};
///
/// let old = StreamingToken::default().with(Category::Pdu, StreamPosition::new(3));
/// let new = old.with(Category::Typing, StreamPosition::new(1));
///
/// assert!(new.is_after(&old));
/// assert!(!old.is_after(&new));
/// assert_eq!(new.categories_after(&old).collect::<Vec<_>>(), vec![Category::Typing]);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StreamingToken {
    /// Timeline position.
    pub pdu: StreamPosition,
    /// Typing position.
    pub typing: StreamPosition,
    /// Receipt position.
    pub receipt: StreamPosition,
    /// Invite position.
    pub invite: StreamPosition,
    /// Send-to-device position.
    pub send_to_device: StreamPosition,
    /// Account data position.
    pub account_data: StreamPosition,
    /// Device list position.
    pub device_list: StreamPosition,
    /// Notification data position.
    pub notification_data: StreamPosition,
    /// Presence position.
    pub presence: StreamPosition,
}

impl StreamingToken {
    /// Builds a token from positions in [`Category::ALL`] order.
    #[must_use]
    pub fn from_positions(positions: [StreamPosition; Category::COUNT]) -> Self {
        let mut token = Self::default();
        for (category, pos) in Category::ALL.into_iter().zip(positions) {
            *token.get_mut(category) = pos;
        }
        token
    }

    /// Returns the positions in [`Category::ALL`] order.
    #[must_use]
    pub fn positions(&self) -> [StreamPosition; Category::COUNT] {
        Category::ALL.map(|category| self.get(category))
    }

    /// Position of a single category.
    #[must_use]
    pub fn get(&self, category: Category) -> StreamPosition {
        match category {
            Category::Pdu => self.pdu,
            Category::Typing => self.typing,
            Category::Receipt => self.receipt,
            Category::Invite => self.invite,
            Category::SendToDevice => self.send_to_device,
            Category::AccountData => self.account_data,
            Category::DeviceList => self.device_list,
            Category::NotificationData => self.notification_data,
            Category::Presence => self.presence,
        }
    }

    fn get_mut(&mut self, category: Category) -> &mut StreamPosition {
        match category {
            Category::Pdu => &mut self.pdu,
            Category::Typing => &mut self.typing,
            Category::Receipt => &mut self.receipt,
            Category::Invite => &mut self.invite,
            Category::SendToDevice => &mut self.send_to_device,
            Category::AccountData => &mut self.account_data,
            Category::DeviceList => &mut self.device_list,
            Category::NotificationData => &mut self.notification_data,
            Category::Presence => &mut self.presence,
        }
    }

    /// Returns a copy with one category replaced.
    #[must_use]
    pub fn with(mut self, category: Category, pos: StreamPosition) -> Self {
        *self.get_mut(category) = pos;
        self
    }

    /// Replaces one category's position.
    pub fn set(&mut self, category: Category, pos: StreamPosition) {
        *self.get_mut(category) = pos;
    }

    /// Raises one category to `pos` if it is behind. Returns whether it moved.
    pub fn advance(&mut self, category: Category, pos: StreamPosition) -> bool {
        let slot = self.get_mut(category);
        if pos > *slot {
            *slot = pos;
            true
        } else {
            false
        }
    }

    /// Raises every category to at least the matching field of `other`.
    pub fn apply(&mut self, other: &StreamingToken) {
        for category in Category::ALL {
            self.advance(category, other.get(category));
        }
    }

    /// Returns `true` if any category is strictly ahead of `other`.
    #[must_use]
    pub fn is_after(&self, other: &StreamingToken) -> bool {
        Category::ALL
            .into_iter()
            .any(|category| self.get(category) > other.get(category))
    }

    /// Categories in which `self` is strictly ahead of `other`.
    pub fn categories_after<'a>(
        &'a self,
        other: &'a StreamingToken,
    ) -> impl Iterator<Item = Category> + 'a {
        Category::ALL
            .into_iter()
            .filter(move |category| self.get(*category) > other.get(*category))
    }

    /// Returns `true` if every category is at the beginning of time.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        Category::ALL
            .into_iter()
            .all(|category| self.get(category).is_zero())
    }
}

impl fmt::Display for StreamingToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", PREFIX)?;
        for (i, pos) in self.positions().iter().enumerate() {
            if i > 0 {
                write!(f, "{}", SEPARATOR)?;
            }
            write!(f, "{}", pos)?;
        }
        Ok(())
    }
}

impl FromStr for StreamingToken {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(TokenError::Empty);
        }
        let body = s
            .strip_prefix(PREFIX)
            .ok_or_else(|| TokenError::UnknownPrefix(s.to_string()))?;
        if body.is_empty() {
            return Err(TokenError::NoPositions);
        }

        let mut token = StreamingToken::default();
        for (index, part) in body.split(SEPARATOR).enumerate() {
            let pos = part
                .parse::<StreamPosition>()
                .map_err(|_| TokenError::InvalidPosition {
                    index,
                    value: part.to_string(),
                })?;
            // Components past the last known category come from newer builds.
            if let Some(category) = Category::ALL.get(index) {
                token.set(*category, pos);
            }
        }
        Ok(token)
    }
}

impl Serialize for StreamingToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StreamingToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(v: u64) -> StreamPosition {
        StreamPosition::new(v)
    }

    #[test]
    fn encodes_all_categories_in_order() {
        let token = StreamingToken::from_positions([
            pos(1),
            pos(2),
            pos(3),
            pos(4),
            pos(5),
            pos(6),
            pos(7),
            pos(8),
            pos(9),
        ]);
        assert_eq!(token.to_string(), "s1_2_3_4_5_6_7_8_9");
        assert_eq!(token.device_list, pos(7));
    }

    #[test]
    fn decodes_short_legacy_token() {
        let token: StreamingToken = "s12_3_4_5_6_7_8".parse().unwrap();
        assert_eq!(token.pdu, pos(12));
        assert_eq!(token.device_list, pos(8));
        assert_eq!(token.notification_data, StreamPosition::ZERO);
        assert_eq!(token.presence, StreamPosition::ZERO);
    }

    #[test]
    fn ignores_components_from_newer_builds() {
        let token: StreamingToken = "s1_1_1_1_1_1_1_1_1_99_100".parse().unwrap();
        assert_eq!(token.presence, pos(1));
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert_eq!("".parse::<StreamingToken>(), Err(TokenError::Empty));
        assert_eq!("s".parse::<StreamingToken>(), Err(TokenError::NoPositions));
        assert!(matches!(
            "t1_2".parse::<StreamingToken>(),
            Err(TokenError::UnknownPrefix(_))
        ));
        assert_eq!(
            "s1__3".parse::<StreamingToken>(),
            Err(TokenError::InvalidPosition {
                index: 1,
                value: String::new()
            })
        );
        assert!("s1_x".parse::<StreamingToken>().is_err());
    }

    #[test]
    fn is_after_is_per_category() {
        let a = StreamingToken::default().with(Category::Pdu, pos(10));
        let b = StreamingToken::default().with(Category::Receipt, pos(1));
        // Neither dominates: each is ahead in a different category.
        assert!(a.is_after(&b));
        assert!(b.is_after(&a));
        assert!(!a.is_after(&a));
    }

    #[test]
    fn apply_takes_per_field_maximum() {
        let mut a = StreamingToken::default()
            .with(Category::Pdu, pos(10))
            .with(Category::Presence, pos(2));
        let b = StreamingToken::default()
            .with(Category::Pdu, pos(4))
            .with(Category::Presence, pos(6));
        a.apply(&b);
        assert_eq!(a.pdu, pos(10));
        assert_eq!(a.presence, pos(6));
    }

    #[test]
    fn advance_never_moves_backward() {
        let mut token = StreamingToken::default().with(Category::Invite, pos(5));
        assert!(!token.advance(Category::Invite, pos(3)));
        assert!(!token.advance(Category::Invite, pos(5)));
        assert!(token.advance(Category::Invite, pos(6)));
        assert_eq!(token.invite, pos(6));
    }

    #[test]
    fn serde_uses_wire_string() {
        let token = StreamingToken::default().with(Category::Typing, pos(4));
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, "\"s0_4_0_0_0_0_0_0_0\"");
        let back: StreamingToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }
}
