//! Player session lifecycle and mission bookkeeping.
//!
//! Per player (keyed by guild + raw player id):
//!
//! ```text
//! Unseen --queue join--> Queued --registered--> Online --disconnect--> Offline
//! ```
//!
//! Queued entries exist only to carry the display name forward, because the
//! registration line never includes it.

use crate::events::MissionState;
use crate::missions::{mission_level, normalize_mission_name};
use chrono::{DateTime, Utc};
use logwarden_ids::{GuildId, PlayerId, PlayerKey, TenantKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const UNKNOWN_PLAYER: &str = "Unknown Player";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLifecycleEntry {
    pub display_name: String,
    pub queued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Online,
    Offline,
}

/// Latest known state of one player in one guild. Overwritten in place on
/// every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSession {
    pub player_id: PlayerId,
    pub display_name: String,
    pub guild_id: GuildId,
    pub status: SessionStatus,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
}

/// In-memory player state for every guild.
#[derive(Debug, Default)]
pub struct SessionTracker {
    queued: HashMap<PlayerKey, PlayerLifecycleEntry>,
    sessions: HashMap<PlayerKey, PlayerSession>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a join request; the name is held until registration.
    pub fn queue_join(&mut self, key: PlayerKey, display_name: &str, at: DateTime<Utc>) {
        self.queued.insert(
            key,
            PlayerLifecycleEntry {
                display_name: display_name.to_string(),
                queued_at: at,
            },
        );
    }

    /// Mark a player online, consuming the queued name.
    ///
    /// A re-registration without a fresh join keeps the previous session's
    /// name.
    pub fn register(&mut self, key: PlayerKey, at: DateTime<Utc>) -> &PlayerSession {
        let display_name = match self.queued.remove(&key) {
            Some(entry) => entry.display_name,
            None => self
                .sessions
                .get(&key)
                .map(|s| s.display_name.clone())
                .unwrap_or_else(|| UNKNOWN_PLAYER.to_string()),
        };

        let session = PlayerSession {
            player_id: key.player.clone(),
            display_name,
            guild_id: key.guild.clone(),
            status: SessionStatus::Online,
            joined_at: at,
            left_at: None,
        };
        self.sessions.insert(key.clone(), session);
        &self.sessions[&key]
    }

    /// Mark a player offline. Returns the display name to report.
    ///
    /// Players never seen registering have no session row; the disconnect
    /// is still reported under [`UNKNOWN_PLAYER`].
    pub fn disconnect(&mut self, key: &PlayerKey, at: DateTime<Utc>) -> String {
        self.queued.remove(key);
        match self.sessions.get_mut(key) {
            Some(session) => {
                session.status = SessionStatus::Offline;
                session.left_at = Some(at);
                session.display_name.clone()
            }
            None => UNKNOWN_PLAYER.to_string(),
        }
    }

    pub fn session(&self, key: &PlayerKey) -> Option<&PlayerSession> {
        self.sessions.get(key)
    }

    pub fn queued(&self, key: &PlayerKey) -> Option<&PlayerLifecycleEntry> {
        self.queued.get(key)
    }

    /// Sessions with status Online in one guild.
    pub fn online_count(&self, guild: &GuildId) -> usize {
        self.sessions
            .values()
            .filter(|s| &s.guild_id == guild && s.status == SessionStatus::Online)
            .count()
    }

    /// Online sessions across every guild.
    pub fn total_online(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.status == SessionStatus::Online)
            .count()
    }

    pub fn clear(&mut self) {
        self.queued.clear();
        self.sessions.clear();
    }
}

/// Last observed state of one mission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionStatus {
    pub mission_id: String,
    pub name: String,
    pub level: u8,
    pub state: MissionState,
    pub updated_at: DateTime<Utc>,
}

/// Per-tenant mission table, kept warm during cold starts.
#[derive(Debug, Default)]
pub struct MissionBoard {
    missions: HashMap<TenantKey, HashMap<String, MissionStatus>>,
}

impl MissionBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a state change and return the resolved entry.
    pub fn record(
        &mut self,
        tenant: &TenantKey,
        mission_id: &str,
        state: MissionState,
        at: DateTime<Utc>,
    ) -> &MissionStatus {
        let table = self.missions.entry(tenant.clone()).or_default();
        let entry = table
            .entry(mission_id.to_string())
            .or_insert_with(|| MissionStatus {
                mission_id: mission_id.to_string(),
                name: normalize_mission_name(mission_id),
                level: mission_level(mission_id),
                state: state.clone(),
                updated_at: at,
            });
        entry.state = state;
        entry.updated_at = at;
        entry
    }

    pub fn get(&self, tenant: &TenantKey, mission_id: &str) -> Option<&MissionStatus> {
        self.missions.get(tenant)?.get(mission_id)
    }

    /// Missions currently READY or IN_PROGRESS, sorted by id.
    pub fn active_missions(&self, tenant: &TenantKey) -> Vec<&MissionStatus> {
        let mut active: Vec<_> = self
            .missions
            .get(tenant)
            .map(|table| table.values().filter(|m| m.state.is_active()).collect())
            .unwrap_or_default();
        active.sort_by(|a, b| a.mission_id.cmp(&b.mission_id));
        active
    }

    pub fn remove_tenant(&mut self, tenant: &TenantKey) {
        self.missions.remove(tenant);
    }

    pub fn clear(&mut self) {
        self.missions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(guild: &str, player: &str) -> PlayerKey {
        PlayerKey::new(guild, player)
    }

    #[test]
    fn test_full_lifecycle() {
        let mut tracker = SessionTracker::new();
        let guild = GuildId::new("g1");
        let now = Utc::now();

        tracker.queue_join(key("g1", "abc"), "Test", now);
        assert!(tracker.queued(&key("g1", "abc")).is_some());
        assert_eq!(tracker.online_count(&guild), 0);

        let session = tracker.register(key("g1", "abc"), now);
        assert_eq!(session.display_name, "Test");
        assert_eq!(session.status, SessionStatus::Online);
        assert!(tracker.queued(&key("g1", "abc")).is_none());
        assert_eq!(tracker.online_count(&guild), 1);

        let name = tracker.disconnect(&key("g1", "abc"), now);
        assert_eq!(name, "Test");
        let session = tracker.session(&key("g1", "abc")).unwrap();
        assert_eq!(session.status, SessionStatus::Offline);
        assert_eq!(session.left_at, Some(now));
        assert_eq!(tracker.online_count(&guild), 0);
    }

    #[test]
    fn test_register_without_join_is_unknown() {
        let mut tracker = SessionTracker::new();
        let session = tracker.register(key("g1", "zzz"), Utc::now());
        assert_eq!(session.display_name, UNKNOWN_PLAYER);
    }

    #[test]
    fn test_reregister_keeps_name_and_overwrites() {
        let mut tracker = SessionTracker::new();
        let first = Utc::now();
        tracker.queue_join(key("g1", "abc"), "Test", first);
        tracker.register(key("g1", "abc"), first);
        tracker.disconnect(&key("g1", "abc"), first);

        let later = first + chrono::Duration::seconds(30);
        let session = tracker.register(key("g1", "abc"), later);
        assert_eq!(session.display_name, "Test");
        assert_eq!(session.joined_at, later);
        assert_eq!(session.left_at, None);
        assert_eq!(tracker.online_count(&GuildId::new("g1")), 1);
    }

    #[test]
    fn test_disconnect_unseen_player() {
        let mut tracker = SessionTracker::new();
        assert_eq!(tracker.disconnect(&key("g1", "nobody"), Utc::now()), UNKNOWN_PLAYER);
        assert!(tracker.session(&key("g1", "nobody")).is_none());
    }

    #[test]
    fn test_online_count_is_guild_scoped() {
        let mut tracker = SessionTracker::new();
        let now = Utc::now();
        tracker.register(key("g1", "a"), now);
        tracker.register(key("g1", "b"), now);
        tracker.register(key("g2", "a"), now);

        assert_eq!(tracker.online_count(&GuildId::new("g1")), 2);
        assert_eq!(tracker.online_count(&GuildId::new("g2")), 1);
        assert_eq!(tracker.total_online(), 3);
    }

    #[test]
    fn test_mission_board_tracks_active() {
        let mut board = MissionBoard::new();
        let tenant = TenantKey::new("g1", "s1");
        let now = Utc::now();

        let entry = board.record(
            &tenant,
            "GA_Airport_mis_01_SFPSACMission",
            MissionState::Ready,
            now,
        );
        assert_eq!(entry.name, "Airport Mission #1");
        assert_eq!(entry.level, 4);
        board.record(&tenant, "GA_Bunker_01_Mis1", MissionState::InProgress, now);
        board.record(&tenant, "GA_Ind_01_m1", MissionState::Completed, now);

        let active: Vec<_> = board
            .active_missions(&tenant)
            .iter()
            .map(|m| m.mission_id.as_str())
            .collect();
        assert_eq!(active, vec!["GA_Airport_mis_01_SFPSACMission", "GA_Bunker_01_Mis1"]);

        board.record(&tenant, "GA_Bunker_01_Mis1", MissionState::Completed, now);
        assert_eq!(board.active_missions(&tenant).len(), 1);
        assert!(board.active_missions(&TenantKey::new("g1", "other")).is_empty());
    }
}
