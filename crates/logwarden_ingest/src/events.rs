//! Domain events extracted from log lines.
//!
//! Events are ephemeral: produced and consumed within one processing pass.

use chrono::{DateTime, Utc};
use logwarden_ids::PlayerId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mission lifecycle states reported by the game server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissionState {
    Initial,
    Ready,
    InProgress,
    Completed,
    /// Synthesized from "will respawn in N" lines.
    Respawn,
    Other(String),
}

impl MissionState {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "INITIAL" => Self::Initial,
            "READY" => Self::Ready,
            "IN_PROGRESS" => Self::InProgress,
            "COMPLETED" => Self::Completed,
            "RESPAWN" => Self::Respawn,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Initial => "INITIAL",
            Self::Ready => "READY",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Respawn => "RESPAWN",
            Self::Other(raw) => raw,
        }
    }

    /// States whose switch line produces a notification. Everything else
    /// only updates mission bookkeeping. Respawns are announced from the
    /// respawn line instead, which carries the delay.
    pub fn is_notifiable(&self) -> bool {
        matches!(self, Self::Ready | Self::InProgress | Self::Completed)
    }

    /// Mission can currently be started or is underway.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Ready | Self::InProgress)
    }
}

impl fmt::Display for MissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// World coordinates captured from spawn lines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionDirection {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleAction {
    Spawned,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionEvent {
    pub mission_id: String,
    pub name: String,
    pub level: u8,
    pub state: MissionState,
    pub respawn_secs: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub player_id: PlayerId,
    pub player_name: String,
    pub direction: ConnectionDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleEvent {
    pub action: VehicleAction,
    /// Raw blueprint token, e.g. `BP_SFPSVehicle_Sedan`.
    pub vehicle_type: String,
}

impl VehicleEvent {
    /// Vehicle type without the blueprint prefix.
    pub fn display_type(&self) -> &str {
        self.vehicle_type
            .strip_prefix("BP_SFPSVehicle_")
            .unwrap_or(&self.vehicle_type)
    }
}

/// A classified, structured fact extracted from one log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DomainEvent {
    MissionState(MissionEvent),
    PlayerConnection(ConnectionEvent),
    Airdrop { location: Option<Coordinates> },
    Helicrash { location: Option<Coordinates> },
    Trader { location: Option<Coordinates> },
    Vehicle(VehicleEvent),
}

impl DomainEvent {
    /// Short machine-readable name, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissionState(_) => "mission",
            Self::PlayerConnection(_) => "connection",
            Self::Airdrop { .. } => "airdrop",
            Self::Helicrash { .. } => "helicrash",
            Self::Trader { .. } => "trader",
            Self::Vehicle(_) => "vehicle",
        }
    }
}

/// An event plus where and when it was seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Zero-based index of the source line in the log.
    pub line: usize,
    pub at: DateTime<Utc>,
    pub event: DomainEvent,
}
