//! Dedup kinds with their key prefixes and default windows.

use std::fmt;
use std::time::Duration;

/// Closed set of event kinds that are deduplicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DedupKind {
    Killmail,
    NotificationKill,
    NotificationSystem,
    NotificationCharacter,
    NotificationRally,
    StatusReport,
    WebsocketDedup,
}

impl DedupKind {
    pub const ALL: [DedupKind; 7] = [
        DedupKind::Killmail,
        DedupKind::NotificationKill,
        DedupKind::NotificationSystem,
        DedupKind::NotificationCharacter,
        DedupKind::NotificationRally,
        DedupKind::StatusReport,
        DedupKind::WebsocketDedup,
    ];

    /// Key prefix; records live under `<prefix>:<id>`.
    pub fn prefix(&self) -> &'static str {
        match self {
            DedupKind::Killmail => "dedup:killmail",
            DedupKind::NotificationKill => "notification:dedup:kill",
            DedupKind::NotificationSystem => "notification:dedup:system",
            DedupKind::NotificationCharacter => "notification:dedup:character",
            DedupKind::NotificationRally => "notification:dedup:rally",
            DedupKind::StatusReport => "status_report:dedup",
            DedupKind::WebsocketDedup => "websocket_dedup:killmail",
        }
    }

    pub fn default_ttl(&self) -> Duration {
        let minutes = match self {
            DedupKind::Killmail => 5,
            DedupKind::NotificationKill => 30,
            DedupKind::NotificationSystem => 15,
            DedupKind::NotificationCharacter => 15,
            DedupKind::NotificationRally => 5,
            DedupKind::StatusReport => 1,
            DedupKind::WebsocketDedup => 5,
        };
        Duration::from_secs(minutes * 60)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DedupKind::Killmail => "killmail",
            DedupKind::NotificationKill => "notification_kill",
            DedupKind::NotificationSystem => "notification_system",
            DedupKind::NotificationCharacter => "notification_character",
            DedupKind::NotificationRally => "notification_rally",
            DedupKind::StatusReport => "status_report",
            DedupKind::WebsocketDedup => "websocket_dedup",
        }
    }

    pub fn key_for(&self, id: impl fmt::Display) -> String {
        format!("{}:{}", self.prefix(), id)
    }
}

impl fmt::Display for DedupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
