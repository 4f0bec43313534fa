//! Line classification.
//!
//! Every pattern runs against every line; patterns are independent, so a
//! single line can yield several matches. The engine holds no state beyond
//! the compiled tables.

use crate::events::{Coordinates, MissionState};
use chrono::{DateTime, NaiveDateTime, Utc};
use logwarden_ids::PlayerId;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| compile(r"\[(\d{4}\.\d{2}\.\d{2}-\d{2}\.\d{2}\.\d{2}:\d{3})\]"));

static QUEUE_JOIN: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)LogNet: Join request: /Game/Maps/world_\d+/World_\d+\?(.*)$"));
static QUERY_EOSID: Lazy<Regex> = Lazy::new(|| compile(r"(?i)eosid=\|([a-f0-9]+)"));
static QUERY_NAME: Lazy<Regex> = Lazy::new(|| compile(r"(?i)(?:^|[?&])Name=([^&?]+)"));

static REGISTERED: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)LogOnline: Warning: Player \|([a-f0-9]+) successfully registered!")
});
static DISCONNECT: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)UChannel::Close: Sending CloseBunch.*UniqueId: EOS:\|([a-f0-9]+)")
});

static MISSION_STATE: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)LogSFPS: Mission (GA_[A-Za-z0-9_]+) switched to ([A-Z_]+)"));
static MISSION_RESPAWN: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)LogSFPS: Mission (GA_[A-Za-z0-9_]+) will respawn in (\d+)"));

static VEHICLE_ADD: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)LogSFPS: \[ASFPSGameMode::NewVehicle_Add\] Add vehicle (BP_SFPSVehicle_[A-Za-z0-9_]+)",
    )
});
static VEHICLE_DEL: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)LogSFPS: \[ASFPSGameMode::NewVehicle_Del\] Del vehicle (BP_SFPSVehicle_[A-Za-z0-9_]+)",
    )
});

/// Three sub-patterns per world event. The first carries coordinates.
struct WorldEventPatterns {
    located: Regex,
    others: [Regex; 2],
}

static AIRDROP: Lazy<WorldEventPatterns> = Lazy::new(|| WorldEventPatterns {
    located: compile(r"(?i)Event_AirDrop.*spawned.*location.*X=([\d.-]+).*Y=([\d.-]+)"),
    others: [
        compile(r"(?i)LogSFPS:.*airdrop.*spawn"),
        compile(r"(?i)LogSFPS:.*airdrop.*flying"),
    ],
});

static HELICRASH: Lazy<WorldEventPatterns> = Lazy::new(|| WorldEventPatterns {
    located: compile(r"(?i)Helicrash.*spawned.*location.*X=([\d.-]+).*Y=([\d.-]+)"),
    others: [
        compile(r"(?i)LogSFPS:.*helicrash.*spawn"),
        compile(r"(?i)LogSFPS:.*helicopter.*crash"),
    ],
});

static TRADER: Lazy<WorldEventPatterns> = Lazy::new(|| WorldEventPatterns {
    located: compile(r"(?i)Trader.*spawned.*location.*X=([\d.-]+).*Y=([\d.-]+)"),
    others: [
        compile(r"(?i)LogSFPS:.*trader.*spawn"),
        compile(r"(?i)LogSFPS:.*trader.*arrived"),
    ],
});

/// The patterns above are literals; a failure here is a programming error
/// caught by the unit tests.
fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => panic!("invalid built-in pattern {pattern}: {e}"),
    }
}

/// A line matched a pattern but a capture could not be converted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{category}: {reason}")]
pub struct LineParseError {
    pub category: &'static str,
    pub reason: String,
}

/// One pattern hit with its captures.
#[derive(Debug, Clone, PartialEq)]
pub enum RawMatch {
    QueueJoin { player_id: PlayerId, name: String },
    Registered { player_id: PlayerId },
    Disconnect { player_id: PlayerId },
    MissionState { mission_id: String, state: MissionState },
    MissionRespawn { mission_id: String, seconds: u32 },
    VehicleSpawn { vehicle_type: String },
    VehicleDelete { vehicle_type: String },
    Airdrop { location: Option<Coordinates> },
    Helicrash { location: Option<Coordinates> },
    Trader { location: Option<Coordinates> },
}

impl RawMatch {
    pub fn category(&self) -> &'static str {
        match self {
            Self::QueueJoin { .. } => "player_queue_join",
            Self::Registered { .. } => "player_registered",
            Self::Disconnect { .. } => "player_disconnect",
            Self::MissionState { .. } => "mission_state_change",
            Self::MissionRespawn { .. } => "mission_respawn",
            Self::VehicleSpawn { .. } => "vehicle_spawn",
            Self::VehicleDelete { .. } => "vehicle_delete",
            Self::Airdrop { .. } => "airdrop",
            Self::Helicrash { .. } => "helicrash",
            Self::Trader { .. } => "trader",
        }
    }
}

/// Stateless line classifier over the built-in pattern tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternEngine;

impl PatternEngine {
    pub fn new() -> Self {
        Self
    }

    /// Run every pattern against `line`.
    ///
    /// Matches come back in a fixed order: connection, mission, world
    /// events, vehicles.
    pub fn classify(&self, line: &str) -> Result<Vec<RawMatch>, LineParseError> {
        let mut matches = Vec::new();

        if let Some(join) = queue_join(line) {
            matches.push(join);
        }
        if let Some(caps) = REGISTERED.captures(line) {
            matches.push(RawMatch::Registered {
                player_id: PlayerId::new(&caps[1]),
            });
        }
        if let Some(caps) = DISCONNECT.captures(line) {
            matches.push(RawMatch::Disconnect {
                player_id: PlayerId::new(&caps[1]),
            });
        }

        if let Some(caps) = MISSION_STATE.captures(line) {
            matches.push(RawMatch::MissionState {
                mission_id: caps[1].to_string(),
                state: MissionState::parse(&caps[2]),
            });
        }
        if let Some(caps) = MISSION_RESPAWN.captures(line) {
            let seconds = caps[2].parse::<u32>().map_err(|e| LineParseError {
                category: "mission_respawn",
                reason: format!("respawn seconds '{}': {}", &caps[2], e),
            })?;
            matches.push(RawMatch::MissionRespawn {
                mission_id: caps[1].to_string(),
                seconds,
            });
        }

        if let Some(location) = world_event(&AIRDROP, line) {
            matches.push(RawMatch::Airdrop { location });
        }
        if let Some(location) = world_event(&HELICRASH, line) {
            matches.push(RawMatch::Helicrash { location });
        }
        if let Some(location) = world_event(&TRADER, line) {
            matches.push(RawMatch::Trader { location });
        }

        if let Some(caps) = VEHICLE_ADD.captures(line) {
            matches.push(RawMatch::VehicleSpawn {
                vehicle_type: caps[1].to_string(),
            });
        }
        if let Some(caps) = VEHICLE_DEL.captures(line) {
            matches.push(RawMatch::VehicleDelete {
                vehicle_type: caps[1].to_string(),
            });
        }

        Ok(matches)
    }

    /// Timestamp prefix of a server log line, e.g. `[2025.05.30-12.20.00:000]`.
    pub fn timestamp(&self, line: &str) -> Option<DateTime<Utc>> {
        let caps = TIMESTAMP.captures(line)?;
        let normalized = caps[1].replacen(':', ".", 1);
        NaiveDateTime::parse_from_str(&normalized, "%Y.%m.%d-%H.%M.%S%.3f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// Join requests carry `Name=` and `eosid=|` in either order.
fn queue_join(line: &str) -> Option<RawMatch> {
    let query = QUEUE_JOIN.captures(line)?.get(1)?.as_str();
    let player_id = QUERY_EOSID.captures(query)?.get(1)?.as_str();
    let name = QUERY_NAME.captures(query)?.get(1)?.as_str().trim();
    if name.is_empty() {
        return None;
    }
    Some(RawMatch::QueueJoin {
        player_id: PlayerId::new(player_id),
        name: name.to_string(),
    })
}

/// `Some(location)` when any of the three sub-patterns hit.
fn world_event(patterns: &WorldEventPatterns, line: &str) -> Option<Option<Coordinates>> {
    if let Some(caps) = patterns.located.captures(line) {
        let x = caps[1].parse::<f64>().ok();
        let y = caps[2].parse::<f64>().ok();
        return Some(x.zip(y).map(|(x, y)| Coordinates { x, y }));
    }
    patterns
        .others
        .iter()
        .any(|re| re.is_match(line))
        .then_some(None)
}
