//! Per-tenant ingestion passes.
//!
//! One pass over one tenant:
//!
//! 1. validate config, fetch the full log
//! 2. split into complete lines, load the checkpoint
//! 3. pick the range: everything on cold start, new lines on hot start,
//!    everything again if the same source shrank
//! 4. persist the new checkpoint
//! 5. classify lines, update sessions and missions, build events
//! 6. deliver events (hot start only), push the presence count
//!
//! The checkpoint is written before anything is emitted, so a crash between
//! the two loses events rather than repeating them.

use crate::config::{ChannelConfig, IngestConfig, TenantConfig};
use crate::error::{IngestError, Result};
use crate::events::{
    ConnectionDirection, ConnectionEvent, DomainEvent, LogEvent, MissionEvent, MissionState,
    VehicleAction, VehicleEvent,
};
use crate::fetcher::ContentFetcher;
use crate::patterns::{PatternEngine, RawMatch};
use crate::router::{EventRouter, PresenceDisplay};
use crate::sessions::{MissionBoard, SessionTracker};
use chrono::{DateTime, Utc};
use logwarden_db::{CheckpointRecord, CheckpointStore};
use logwarden_ids::{GuildId, PlayerKey, TenantKey};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Event budget per processed line on hot start.
pub const HOT_EVENTS_PER_LINE: usize = 2;

/// Event budget per processed line on cold start.
pub const COLD_EVENTS_PER_LINE: usize = 5;

/// Mutable engine state, owned by the caller and lent to each pass.
#[derive(Debug, Default)]
pub struct IngestState {
    pub sessions: SessionTracker,
    pub missions: MissionBoard,
    last_presence: HashMap<GuildId, usize>,
    tracked: HashSet<TenantKey>,
}

impl IngestState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every session, mission and cached presence value.
    /// Persisted checkpoints are untouched.
    pub fn reset(&mut self) {
        self.sessions.clear();
        self.missions.clear();
        self.last_presence.clear();
        self.tracked.clear();
    }

    /// Last count pushed to the presence display for a guild.
    pub fn last_presence(&self, guild: &GuildId) -> Option<usize> {
        self.last_presence.get(guild).copied()
    }
}

/// What one tenant pass did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenantOutcome {
    /// Invalid config, no content, or the checkpoint could not be read.
    Skipped { reason: String },

    /// First pass: state seeded, every event suppressed.
    ColdStart {
        lines: usize,
        suppressed: usize,
        breaker_tripped: bool,
    },

    /// Hot start with nothing appended since the last pass.
    NoNewLines,

    Processed {
        lines: usize,
        events: usize,
        delivered: usize,
        breaker_tripped: bool,
    },
}

/// Outcomes of one pass over every tenant, in config order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassSummary {
    pub outcomes: Vec<(TenantKey, TenantOutcome)>,
}

impl PassSummary {
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, TenantOutcome::Skipped { .. }))
            .count()
    }

    /// Events handed to the router across all tenants.
    pub fn events(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, o)| match o {
                TenantOutcome::Processed { events, .. } => *events,
                _ => 0,
            })
            .sum()
    }

    pub fn outcome(&self, key: &TenantKey) -> Option<&TenantOutcome> {
        self.outcomes.iter().find(|(k, _)| k == key).map(|(_, o)| o)
    }
}

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStatus {
    pub active_sessions: usize,
    pub tracked_tenants: usize,
    pub pooled_connections: usize,
}

/// Result of classifying one line range.
#[derive(Debug, Default)]
struct RangeScan {
    events: Vec<LogEvent>,
    produced: usize,
    breaker_tripped: bool,
}

/// Orchestrates fetch, classification, bookkeeping, checkpointing and
/// delivery for every tenant.
pub struct Coordinator {
    fetcher: ContentFetcher,
    engine: PatternEngine,
    store: Arc<dyn CheckpointStore>,
    router: EventRouter,
    presence: Arc<dyn PresenceDisplay>,
}

impl Coordinator {
    pub fn new(
        fetcher: ContentFetcher,
        store: Arc<dyn CheckpointStore>,
        router: EventRouter,
        presence: Arc<dyn PresenceDisplay>,
    ) -> Self {
        Self {
            fetcher,
            engine: PatternEngine::new(),
            store,
            router,
            presence,
        }
    }

    /// Process every enabled tenant once, sequentially. Failures are
    /// isolated to their tenant.
    pub async fn run_pass(
        &mut self,
        state: &mut IngestState,
        config: &IngestConfig,
    ) -> PassSummary {
        let no_channels = ChannelConfig::default();
        let mut summary = PassSummary::default();

        for tenant in config.tenants() {
            let key = tenant.key();
            let channels = config
                .guild(&tenant.guild_id)
                .map(|guild| &guild.channels)
                .unwrap_or(&no_channels);

            let outcome = match self.process_tenant(state, &tenant, channels).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(tenant = %key, host = %tenant.server.host, error = %e, "Tenant skipped");
                    TenantOutcome::Skipped {
                        reason: e.to_string(),
                    }
                }
            };
            summary.outcomes.push((key, outcome));
        }

        info!(
            tenants = summary.outcomes.len(),
            skipped = summary.skipped(),
            events = summary.events(),
            "Ingestion pass complete"
        );
        summary
    }

    /// One pass over one tenant.
    ///
    /// Errors mean the tenant was skipped with no state change.
    pub async fn process_tenant(
        &mut self,
        state: &mut IngestState,
        tenant: &TenantConfig,
        channels: &ChannelConfig,
    ) -> Result<TenantOutcome> {
        let key = tenant.validate()?;
        let fetched = self.fetcher.fetch(tenant).await?;
        let lines = complete_lines(&fetched.content);
        let total = lines.len();

        let checkpoint = self.store.load(&key).await?;
        let cold = !checkpoint
            .as_ref()
            .map(|c| c.cold_start_complete)
            .unwrap_or(false);

        let source = fetched.source.as_str();
        let start = match checkpoint.as_ref().filter(|_| !cold) {
            None => 0,
            Some(previous) => match hot_start(previous, source, total) {
                HotStart::From(start) => start,
                HotStart::Rotated => {
                    warn!(
                        tenant = %key,
                        previous = previous.line_count,
                        current = total,
                        source,
                        "Log shrank, assuming rotation"
                    );
                    0
                }
                HotStart::UpToDate => {
                    debug!(tenant = %key, lines = total, "No new lines");
                    return Ok(TenantOutcome::NoNewLines);
                }
                HotStart::StaleCopy => {
                    warn!(
                        tenant = %key,
                        previous = previous.line_count,
                        current = total,
                        source,
                        checkpoint_source = previous.source.as_deref().unwrap_or("unknown"),
                        "Shorter copy from another source, waiting"
                    );
                    return Ok(TenantOutcome::NoNewLines);
                }
            },
        };

        let now = Utc::now();
        let record = CheckpointRecord::completed(total as u64, now).with_source(source);
        self.persist_checkpoint(state, &key, record).await;

        let range = &lines[start..];
        let scan = self.scan(state, &key, start, range, cold, now);
        if scan.breaker_tripped {
            warn!(
                tenant = %key,
                lines = range.len(),
                produced = scan.produced,
                cold,
                "Event limit exceeded, remaining lines skipped"
            );
        }

        let outcome = if cold {
            info!(
                tenant = %key,
                lines = range.len(),
                suppressed = scan.produced,
                source = ?fetched.source,
                "Cold start complete"
            );
            TenantOutcome::ColdStart {
                lines: range.len(),
                suppressed: scan.produced,
                breaker_tripped: scan.breaker_tripped,
            }
        } else {
            let report = self.router.deliver(tenant, channels, &scan.events).await;
            info!(
                tenant = %key,
                lines = range.len(),
                events = scan.events.len(),
                delivered = report.delivered,
                failed = report.failed,
                "Processed new lines"
            );
            TenantOutcome::Processed {
                lines: range.len(),
                events: scan.events.len(),
                delivered: report.delivered,
                breaker_tripped: scan.breaker_tripped,
            }
        };

        self.push_presence(state, &tenant.guild_id, channels).await;
        Ok(outcome)
    }

    /// A failed write is logged and the pass continues; the next pass may
    /// then reprocess this range.
    async fn persist_checkpoint(
        &self,
        state: &mut IngestState,
        key: &TenantKey,
        record: CheckpointRecord,
    ) {
        match self.store.save(key, &record).await {
            Ok(()) => {
                state.tracked.insert(key.clone());
            }
            Err(e) => {
                let e = IngestError::from(e);
                warn!(tenant = %key, lines = record.line_count, error = %e, "Checkpoint not saved");
            }
        }
    }

    /// Classify `lines` (starting at absolute index `first`), applying every
    /// match to `state`. Events are collected only when `cold` is false.
    fn scan(
        &self,
        state: &mut IngestState,
        key: &TenantKey,
        first: usize,
        lines: &[&str],
        cold: bool,
        now: DateTime<Utc>,
    ) -> RangeScan {
        let per_line = if cold {
            COLD_EVENTS_PER_LINE
        } else {
            HOT_EVENTS_PER_LINE
        };
        let limit = lines.len().saturating_mul(per_line);
        let mut scan = RangeScan::default();

        'lines: for (offset, line) in lines.iter().enumerate() {
            let index = first + offset;
            let matches = match self.engine.classify(line) {
                Ok(matches) => matches,
                Err(e) => {
                    let e = IngestError::ParseLine {
                        line: index,
                        reason: e.to_string(),
                    };
                    warn!(tenant = %key, error = %e, "Line skipped");
                    continue;
                }
            };
            if matches.is_empty() {
                continue;
            }

            let at = self.engine.timestamp(line).unwrap_or(now);
            for raw in matches {
                let Some(event) = apply(state, key, raw, at) else {
                    continue;
                };
                scan.produced += 1;
                if scan.produced > limit {
                    scan.breaker_tripped = true;
                    break 'lines;
                }
                if !cold {
                    scan.events.push(LogEvent {
                        line: index,
                        at,
                        event,
                    });
                }
            }
        }

        scan
    }

    /// Push the guild's online count if it changed since the last push.
    async fn push_presence(
        &self,
        state: &mut IngestState,
        guild: &GuildId,
        channels: &ChannelConfig,
    ) {
        let count = state.sessions.online_count(guild);
        if state.last_presence(guild) == Some(count) {
            return;
        }
        let Some(channel) = channels.presence_channel() else {
            debug!(%guild, count, "No presence channel configured");
            return;
        };

        match self.presence.update(guild, channel, count).await {
            Ok(()) => {
                state.last_presence.insert(guild.clone(), count);
            }
            Err(e) => warn!(%guild, %channel, count, error = %e, "Presence update failed"),
        }
    }

    pub fn status(&self, state: &IngestState) -> IngestStatus {
        IngestStatus {
            active_sessions: state.sessions.total_online(),
            tracked_tenants: state.tracked.len(),
            pooled_connections: self.fetcher.pool().len(),
        }
    }

    /// Delete a tenant's checkpoint and mission board. The next pass over
    /// it is a cold start. Returns whether a checkpoint existed.
    pub async fn remove_tenant(
        &mut self,
        state: &mut IngestState,
        key: &TenantKey,
    ) -> Result<bool> {
        let existed = self.store.remove(key).await?;
        state.missions.remove_tenant(key);
        state.tracked.remove(key);
        info!(tenant = %key, existed, "Tenant removed");
        Ok(existed)
    }

    /// Close every pooled remote session.
    pub async fn shutdown(&mut self) {
        self.fetcher.pool_mut().close_all().await;
    }
}

/// Where a hot pass starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HotStart {
    /// Lines from this index on are new.
    From(usize),
    /// Nothing past the checkpoint.
    UpToDate,
    /// The same source shrank: reprocess from the top.
    Rotated,
    /// A shorter copy from a different source (a stale local fallback).
    /// Leave the checkpoint alone until the counted source is back.
    StaleCopy,
}

fn hot_start(previous: &CheckpointRecord, source: &str, total: usize) -> HotStart {
    let seen = usize::try_from(previous.line_count).unwrap_or(usize::MAX);
    if total > seen {
        HotStart::From(seen)
    } else if total == seen {
        HotStart::UpToDate
    } else if previous.source.as_deref() == Some(source) {
        HotStart::Rotated
    } else {
        HotStart::StaleCopy
    }
}

/// Newline-terminated lines only. A trailing partial line is held back
/// until the writer finishes it.
pub fn complete_lines(content: &str) -> Vec<&str> {
    match content.rfind('\n') {
        Some(end) => content[..=end].lines().collect(),
        None => Vec::new(),
    }
}

/// Apply one match to the tracker and mission board, returning the event
/// it produces, if any.
fn apply(
    state: &mut IngestState,
    tenant: &TenantKey,
    raw: RawMatch,
    at: DateTime<Utc>,
) -> Option<DomainEvent> {
    let player = |player_id| PlayerKey {
        guild: tenant.guild.clone(),
        player: player_id,
    };

    match raw {
        RawMatch::QueueJoin { player_id, name } => {
            state.sessions.queue_join(player(player_id), &name, at);
            None
        }
        RawMatch::Registered { player_id } => {
            let session = state.sessions.register(player(player_id.clone()), at);
            Some(DomainEvent::PlayerConnection(ConnectionEvent {
                player_id,
                player_name: session.display_name.clone(),
                direction: ConnectionDirection::Connected,
            }))
        }
        RawMatch::Disconnect { player_id } => {
            let player_name = state.sessions.disconnect(&player(player_id.clone()), at);
            Some(DomainEvent::PlayerConnection(ConnectionEvent {
                player_id,
                player_name,
                direction: ConnectionDirection::Disconnected,
            }))
        }
        RawMatch::MissionState { mission_id, state: mission_state } => {
            let entry = state
                .missions
                .record(tenant, &mission_id, mission_state.clone(), at);
            mission_state.is_notifiable().then(|| {
                DomainEvent::MissionState(MissionEvent {
                    name: entry.name.clone(),
                    level: entry.level,
                    mission_id,
                    state: mission_state,
                    respawn_secs: None,
                })
            })
        }
        RawMatch::MissionRespawn { mission_id, seconds } => {
            let entry = state
                .missions
                .record(tenant, &mission_id, MissionState::Respawn, at);
            (seconds > 0).then(|| {
                DomainEvent::MissionState(MissionEvent {
                    name: entry.name.clone(),
                    level: entry.level,
                    mission_id,
                    state: MissionState::Respawn,
                    respawn_secs: Some(seconds),
                })
            })
        }
        RawMatch::VehicleSpawn { vehicle_type } => Some(DomainEvent::Vehicle(VehicleEvent {
            action: VehicleAction::Spawned,
            vehicle_type,
        })),
        RawMatch::VehicleDelete { vehicle_type } => Some(DomainEvent::Vehicle(VehicleEvent {
            action: VehicleAction::Deleted,
            vehicle_type,
        })),
        RawMatch::Airdrop { location } => Some(DomainEvent::Airdrop { location }),
        RawMatch::Helicrash { location } => Some(DomainEvent::Helicrash { location }),
        RawMatch::Trader { location } => Some(DomainEvent::Trader { location }),
    }
}
