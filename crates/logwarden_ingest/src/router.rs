//! Event routing: category → channel resolution, notification building and
//! hand-off to the delivery transport.
//!
//! Channel lookup for a category walks five levels and stops at the first
//! configured id:
//!
//! 1. server-specific map
//! 2. guild default map
//! 3. legacy guild-wide map
//! 4. the catch-all `killfeed` channel, resolved through levels 1-3
//! 5. none (event is dropped with a debug log)

use crate::config::{ChannelConfig, ChannelMap, TenantConfig};
use crate::error::{IngestError, Result};
use crate::events::{
    ConnectionDirection, Coordinates, DomainEvent, LogEvent, MissionState, VehicleAction,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use logwarden_ids::{ChannelId, GuildId, ServerId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Notification category a channel is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingCategory {
    /// Missions, airdrops, helicrashes, traders, vehicles.
    Events,
    /// Player join and leave.
    Connections,
}

impl RoutingCategory {
    pub fn of(event: &DomainEvent) -> Self {
        match event {
            DomainEvent::PlayerConnection(_) => Self::Connections,
            _ => Self::Events,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Events => "events",
            Self::Connections => "connections",
        }
    }

    fn pick(self, map: &ChannelMap) -> Option<ChannelId> {
        match self {
            Self::Events => map.events,
            Self::Connections => map.connections,
        }
    }
}

impl fmt::Display for RoutingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ChannelConfig {
    /// Server map, guild default, legacy map, in lookup order.
    fn chain<'a>(&'a self, server: &ServerId) -> impl Iterator<Item = &'a ChannelMap> + 'a {
        self.servers
            .get(server.as_str())
            .into_iter()
            .chain([&self.default, &self.legacy])
    }

    /// Channel for one category, or `None` when nothing along the chain is
    /// configured.
    pub fn resolve(&self, server: &ServerId, category: RoutingCategory) -> Option<ChannelId> {
        self.chain(server)
            .find_map(|map| category.pick(map))
            .or_else(|| self.chain(server).find_map(|map| map.killfeed))
    }

    /// Presence display channel: any server map, then default, then legacy.
    pub fn presence_channel(&self) -> Option<ChannelId> {
        self.servers
            .values()
            .chain([&self.default, &self.legacy])
            .find_map(|map| map.presence)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Transport-neutral rendering of one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub fields: Vec<NotificationField>,
    pub color: u32,
    pub footer: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    fn new(title: &str, description: String, color: u32, at: DateTime<Utc>) -> Self {
        Self {
            title: title.to_string(),
            description,
            fields: Vec::new(),
            color,
            footer: None,
            timestamp: at,
        }
    }

    fn field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.push(NotificationField {
            name: name.to_string(),
            value: value.into(),
            inline: true,
        });
        self
    }
}

/// Builds the notification for one event. `None` means nothing to send.
pub trait NotificationFormatter: Send + Sync {
    fn format(&self, event: &LogEvent) -> Option<Notification>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFormatter;

fn location_text(location: Option<Coordinates>) -> String {
    match location {
        Some(c) => format!("X: {:.0}, Y: {:.0}", c.x, c.y),
        None => "Unknown".to_string(),
    }
}

impl NotificationFormatter for DefaultFormatter {
    fn format(&self, event: &LogEvent) -> Option<Notification> {
        let at = event.at;
        let notification = match &event.event {
            DomainEvent::PlayerConnection(conn) => {
                let (title, verb, color) = match conn.direction {
                    ConnectionDirection::Connected => ("Player Connected", "joined", 0x00FF00),
                    ConnectionDirection::Disconnected => ("Player Disconnected", "left", 0xFF0000),
                };
                Notification::new(
                    title,
                    format!("**{}** has {} the server", conn.player_name, verb),
                    color,
                    at,
                )
                .field("Player", conn.player_name.as_str())
                .field("Player ID", conn.player_id.as_str())
            }
            DomainEvent::MissionState(mission) => {
                let (title, description, color) = match (&mission.state, mission.respawn_secs) {
                    (MissionState::Ready, _) => (
                        "Mission Available",
                        format!("**{}** is now available", mission.name),
                        0x00FF00,
                    ),
                    (MissionState::InProgress, _) => (
                        "Mission In Progress",
                        format!("**{}** is being completed", mission.name),
                        0xFFAA00,
                    ),
                    (MissionState::Completed, _) => (
                        "Mission Completed",
                        format!("**{}** has been completed", mission.name),
                        0x0099FF,
                    ),
                    (MissionState::Respawn, Some(secs)) if secs > 0 => (
                        "Mission Respawning",
                        format!("**{}** respawns in {}s", mission.name, secs),
                        0x888888,
                    ),
                    _ => return None,
                };
                Notification::new(title, description, color, at)
                    .field("Mission", mission.mission_id.as_str())
                    .field("Level", mission.level.to_string())
                    .field("State", mission.state.as_str())
            }
            DomainEvent::Airdrop { location } => {
                let place = location_text(*location);
                Notification::new(
                    "Airdrop Incoming",
                    format!("An airdrop is inbound at {}", place),
                    0x00BFFF,
                    at,
                )
                .field("Location", place)
            }
            DomainEvent::Helicrash { location } => {
                let place = location_text(*location);
                Notification::new(
                    "Helicopter Crash",
                    format!("A helicopter has crashed at {}", place),
                    0xFF8C00,
                    at,
                )
                .field("Location", place)
            }
            DomainEvent::Trader { location } => {
                let place = location_text(*location);
                Notification::new(
                    "Trader Arrived",
                    format!("A trader has arrived at {}", place),
                    0xFFD700,
                    at,
                )
                .field("Location", place)
                .field("Status", "Available")
            }
            DomainEvent::Vehicle(vehicle) => {
                let (title, verb, action, color) = match vehicle.action {
                    VehicleAction::Spawned => ("Vehicle Spawned", "deployed", "Spawn", 0x00FF00),
                    VehicleAction::Deleted => ("Vehicle Removed", "removed", "Delete", 0xFF0000),
                };
                Notification::new(
                    title,
                    format!("A {} has been {}", vehicle.display_type(), verb),
                    color,
                    at,
                )
                .field("Vehicle Type", vehicle.display_type())
                .field("Action", action)
            }
        };
        Some(notification)
    }
}

/// Notification transport.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, channel: ChannelId, notification: &Notification) -> Result<()>;
}

/// Sink that only logs. Used when no transport is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn deliver(&self, channel: ChannelId, notification: &Notification) -> Result<()> {
        info!(%channel, title = %notification.title, "{}", notification.description);
        Ok(())
    }
}

/// Label shown by the presence display.
pub fn presence_label(count: usize) -> String {
    format!("Players Online: {}", count)
}

/// External display of a guild's online player count.
#[async_trait]
pub trait PresenceDisplay: Send + Sync {
    async fn update(&self, guild: &GuildId, channel: ChannelId, count: usize) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPresence;

#[async_trait]
impl PresenceDisplay for TracingPresence {
    async fn update(&self, guild: &GuildId, channel: ChannelId, count: usize) -> Result<()> {
        info!(%guild, %channel, "{}", presence_label(count));
        Ok(())
    }
}

/// Outcome of delivering one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    /// No channel configured for the event's category.
    pub unrouted: usize,
    pub failed: usize,
}

/// Routes events to channels and hands them to the sink.
pub struct EventRouter {
    formatter: Arc<dyn NotificationFormatter>,
    sink: Arc<dyn NotificationSink>,
}

impl EventRouter {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_formatter(Arc::new(DefaultFormatter), sink)
    }

    pub fn with_formatter(
        formatter: Arc<dyn NotificationFormatter>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self { formatter, sink }
    }

    /// Deliver events in order. A failed event is logged and the rest of
    /// the batch still goes out.
    pub async fn deliver(
        &self,
        tenant: &TenantConfig,
        channels: &ChannelConfig,
        events: &[LogEvent],
    ) -> DeliveryReport {
        let key = tenant.key();
        let mut report = DeliveryReport::default();

        for event in events {
            let category = RoutingCategory::of(&event.event);
            let Some(channel) = channels.resolve(&key.server, category) else {
                debug!(
                    tenant = %key,
                    %category,
                    kind = event.event.kind(),
                    "No channel configured"
                );
                report.unrouted += 1;
                continue;
            };
            let Some(mut notification) = self.formatter.format(event) else {
                continue;
            };
            notification.footer = Some(tenant.display_name().to_string());

            match self.sink.deliver(channel, &notification).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    let e = match e {
                        IngestError::Delivery(_) => e,
                        other => IngestError::Delivery(other.to_string()),
                    };
                    warn!(
                        tenant = %key,
                        %channel,
                        line = event.line,
                        kind = event.event.kind(),
                        error = %e,
                        "Event delivery failed"
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }
}
