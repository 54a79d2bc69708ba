// SPDX-FileCopyrightText: 2026 Notigate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Protocol addresses (`user@server`) used by the WhatsApp session.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Server suffix for individual accounts.
pub const INDIVIDUAL_SERVER: &str = "s.whatsapp.net";
/// Server suffix for groups.
pub const GROUP_SERVER: &str = "g.us";
/// Server suffix for broadcast lists.
pub const BROADCAST_SERVER: &str = "broadcast";
/// User part of the status broadcast address.
pub const STATUS_USER: &str = "status";

/// A fully-qualified protocol address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Jid {
    /// `<digits>@s.whatsapp.net`
    Individual(String),
    /// `<id>@g.us`
    Group(String),
    /// `<id>@broadcast`
    Broadcast(String),
    /// `status@broadcast`
    StatusBroadcast,
    /// Any other server; the full raw address is kept.
    Other(String),
}

/// Coarse classification of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JidKind {
    Individual,
    Group,
    Broadcast,
    Status,
    Unknown,
}

impl Jid {
    /// Parses an address that already carries a server suffix.
    ///
    /// Returns `None` when there is no `@` or either side is empty.
    pub fn parse(address: &str) -> Option<Jid> {
        let (user, server) = address.split_once('@')?;
        if user.is_empty() || server.is_empty() {
            return None;
        }
        Some(match server {
            INDIVIDUAL_SERVER => Jid::Individual(user.to_string()),
            GROUP_SERVER => Jid::Group(user.to_string()),
            BROADCAST_SERVER if user == STATUS_USER => Jid::StatusBroadcast,
            BROADCAST_SERVER => Jid::Broadcast(user.to_string()),
            _ => Jid::Other(address.to_string()),
        })
    }

    pub fn individual(digits: impl Into<String>) -> Jid {
        Jid::Individual(digits.into())
    }

    pub fn kind(&self) -> JidKind {
        match self {
            Jid::Individual(_) => JidKind::Individual,
            Jid::Group(_) => JidKind::Group,
            Jid::Broadcast(_) => JidKind::Broadcast,
            Jid::StatusBroadcast => JidKind::Status,
            Jid::Other(_) => JidKind::Unknown,
        }
    }

    /// The part before `@`.
    pub fn user(&self) -> &str {
        match self {
            Jid::Individual(user) | Jid::Group(user) | Jid::Broadcast(user) => user,
            Jid::StatusBroadcast => STATUS_USER,
            Jid::Other(raw) => raw.split_once('@').map_or(raw.as_str(), |(user, _)| user),
        }
    }

    /// The part after `@`.
    pub fn server(&self) -> &str {
        match self {
            Jid::Individual(_) => INDIVIDUAL_SERVER,
            Jid::Group(_) => GROUP_SERVER,
            Jid::Broadcast(_) | Jid::StatusBroadcast => BROADCAST_SERVER,
            Jid::Other(raw) => raw.split_once('@').map_or("", |(_, server)| server),
        }
    }

    /// True for broadcast lists and the status broadcast.
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Jid::Broadcast(_) | Jid::StatusBroadcast)
    }

    /// True for anything a broadcast-target operation may address.
    pub fn is_multi_recipient(&self) -> bool {
        matches!(self, Jid::Group(_) | Jid::Broadcast(_) | Jid::StatusBroadcast)
    }

    /// Broadcast list ids are numeric; anything else is suspicious but still routable.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Jid::Broadcast(id) => id.chars().all(|c| c.is_ascii_digit()),
            _ => true,
        }
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Jid::Other(raw) => f.write_str(raw),
            other => write!(f, "{}@{}", other.user(), other.server()),
        }
    }
}

impl Serialize for Jid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Jid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Jid::parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid address: {raw}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_servers() {
        assert_eq!(
            Jid::parse("6281234567890@s.whatsapp.net"),
            Some(Jid::Individual("6281234567890".into()))
        );
        assert_eq!(
            Jid::parse("120363025@g.us"),
            Some(Jid::Group("120363025".into()))
        );
        assert_eq!(
            Jid::parse("1234567890@broadcast"),
            Some(Jid::Broadcast("1234567890".into()))
        );
        assert_eq!(Jid::parse("status@broadcast"), Some(Jid::StatusBroadcast));
        assert_eq!(
            Jid::parse("abc@lid"),
            Some(Jid::Other("abc@lid".into()))
        );
    }

    #[test]
    fn rejects_addresses_without_both_parts() {
        assert_eq!(Jid::parse("6281234"), None);
        assert_eq!(Jid::parse("@g.us"), None);
        assert_eq!(Jid::parse("123@"), None);
    }

    #[test]
    fn display_preserves_raw_form() {
        for raw in [
            "628123@s.whatsapp.net",
            "1203@g.us",
            "99@broadcast",
            "status@broadcast",
            "x@lid",
        ] {
            let jid = Jid::parse(raw).unwrap();
            assert_eq!(jid.to_string(), raw);
        }
    }

    #[test]
    fn non_numeric_broadcast_is_not_well_formed() {
        assert!(Jid::Broadcast("12345".into()).is_well_formed());
        assert!(!Jid::Broadcast("team-list".into()).is_well_formed());
        assert!(Jid::StatusBroadcast.is_well_formed());
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&Jid::Group("42".into())).unwrap();
        assert_eq!(json, "\"42@g.us\"");
        let back: Jid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Jid::Group("42".into()));
    }
}
