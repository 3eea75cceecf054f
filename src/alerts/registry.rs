//! Live subscriber connections and filtered fan-out.
//!
//! Each connection owns a bounded [`OutboundQueue`] drained by its own
//! delivery task. Broadcast snapshots the connection set under a brief read
//! lock and then enqueues to each connection without holding any registry
//! lock, so one stalled socket never delays the others and new subscribers
//! are never blocked by an in-flight broadcast.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use parking_lot::{Mutex, RwLock};
use serde::{Serialize, Serializer};
use serde_json::Value;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::message::ServerMessage;
use super::queue::{OutboundQueue, PushOutcome};
use crate::models::{AlertEnvelope, ScoredResult};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Max pending messages per connection before drop-oldest kicks in.
    pub queue_capacity: usize,
    /// Heartbeat period. A connection silent for one period goes idle.
    pub heartbeat_interval: Duration,
    /// Connection closes after this many silent periods.
    pub missed_heartbeats: u32,
    /// Number of recent alerts kept for reconnect replay.
    pub replay_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            heartbeat_interval: Duration::from_secs(30),
            missed_heartbeats: 2,
            replay_capacity: 512,
        }
    }
}

impl RegistryConfig {
    fn close_after(&self) -> Duration {
        self.heartbeat_interval * self.missed_heartbeats.max(1)
    }
}

// ---------------------------------------------------------------------------
// WatchSet
// ---------------------------------------------------------------------------

/// Addresses a subscriber wants alerts for, or every alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSet {
    All,
    Addresses(BTreeSet<String>),
}

impl WatchSet {
    pub fn addresses<I, S>(addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        WatchSet::Addresses(addrs.into_iter().map(Into::into).collect())
    }

    /// `["rA", ...]`; an empty list, `"all"`/`"*"` or a list containing
    /// either of those selects every alert.
    pub fn from_json(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(s) if is_wildcard(s) => Ok(WatchSet::All),
            Value::Array(items) => {
                let mut addrs = BTreeSet::new();
                for item in items {
                    let addr = item
                        .as_str()
                        .ok_or_else(|| "watch entries must be strings".to_string())?
                        .trim();
                    if is_wildcard(addr) {
                        return Ok(WatchSet::All);
                    }
                    if !addr.is_empty() {
                        addrs.insert(addr.to_string());
                    }
                }
                if addrs.is_empty() {
                    Ok(WatchSet::All)
                } else {
                    Ok(WatchSet::Addresses(addrs))
                }
            }
            _ => Err("watch must be a list of addresses".into()),
        }
    }

    pub fn matches(&self, envelope: &AlertEnvelope) -> bool {
        match self {
            WatchSet::All => true,
            WatchSet::Addresses(addrs) => addrs.iter().any(|a| envelope.touches(a)),
        }
    }
}

fn is_wildcard(s: &str) -> bool {
    s == "*" || s.eq_ignore_ascii_case("all")
}

impl Serialize for WatchSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            WatchSet::All => ["all"].serialize(serializer),
            WatchSet::Addresses(addrs) => addrs.serialize(serializer),
        }
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Active,
    Idle,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Active => "active",
            ConnectionState::Idle => "idle",
            ConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

pub struct Connection {
    id: Uuid,
    created_at: DateTime<Utc>,
    state: Mutex<ConnectionState>,
    watch: RwLock<WatchSet>,
    last_heartbeat: Mutex<Instant>,
    last_ack: Mutex<Option<DateTime<Utc>>>,
    /// Most recent alert `seq`s handed to this connection, bounded to the
    /// replay window size.
    delivered: Mutex<BTreeSet<u64>>,
    delivered_cap: usize,
    queue: OutboundQueue<ServerMessage>,
}

impl Connection {
    fn new(id: Uuid, watch: WatchSet, state: ConnectionState, config: &RegistryConfig) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            state: Mutex::new(state),
            watch: RwLock::new(watch),
            last_heartbeat: Mutex::new(Instant::now()),
            last_ack: Mutex::new(None),
            delivered: Mutex::new(BTreeSet::new()),
            delivered_cap: config.replay_capacity.max(config.queue_capacity).max(1),
            queue: OutboundQueue::new(config.queue_capacity),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn watch_set(&self) -> WatchSet {
        self.watch.read().clone()
    }

    pub fn dropped_count(&self) -> u64 {
        self.queue.dropped_count()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Next outbound message; `None` once the connection is closed.
    pub async fn next_message(&self) -> Option<ServerMessage> {
        self.queue.recv().await
    }

    pub fn try_next_message(&self) -> Option<ServerMessage> {
        self.queue.try_recv()
    }

    /// Enqueue a message. Control messages (ack, ping, pong, error) ride a
    /// separate bounded lane and never push out a pending alert.
    pub fn send(&self, msg: ServerMessage) -> PushOutcome {
        if msg.is_control() {
            return self.queue.push_control(msg);
        }
        let outcome = self.queue.push(msg);
        if outcome == PushOutcome::DroppedOldest {
            self.record_drop();
        }
        outcome
    }

    /// Enqueue an alert unless this connection already received `seq`.
    fn send_alert(&self, seq: u64, item: &ScoredResult) -> Option<PushOutcome> {
        {
            let mut delivered = self.delivered.lock();
            if !delivered.insert(seq) {
                return None;
            }
            while delivered.len() > self.delivered_cap {
                delivered.pop_first();
            }
        }
        Some(self.send(ServerMessage::Tx {
            seq,
            item: item.clone(),
        }))
    }

    fn record_drop(&self) {
        counter!("alerts_dropped_total").increment(1);
        tracing::debug!(
            connection_id = %self.id,
            dropped_count = self.dropped_count(),
            "Outbound queue full, dropped oldest alert"
        );
    }

    fn set_state(&self, next: ConnectionState) -> ConnectionState {
        std::mem::replace(&mut *self.state.lock(), next)
    }

    fn touch(&self, now: Instant) {
        *self.last_heartbeat.lock() = now;
    }

    fn silence(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_heartbeat.lock())
    }

    fn close(&self) {
        self.set_state(ConnectionState::Closed);
        self.queue.close();
    }

    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            connection_id: self.id,
            state: self.state(),
            watch: self.watch_set(),
            created_at: self.created_at,
            last_ack: *self.last_ack.lock(),
            pending: self.pending(),
            dropped_count: self.dropped_count(),
        }
    }
}

/// Diagnostics view of one connection.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub connection_id: Uuid,
    pub state: ConnectionState,
    pub watch: WatchSet,
    pub created_at: DateTime<Utc>,
    pub last_ack: Option<DateTime<Utc>>,
    pub pending: usize,
    pub dropped_count: u64,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sequence number assigned to the alert; `None` when it was a duplicate.
    pub seq: Option<u64>,
    pub delivered: usize,
    /// Deliveries that evicted an older pending message.
    pub dropped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub idled: Vec<Uuid>,
    pub closed: Vec<Uuid>,
}

struct ReplayEntry {
    seq: u64,
    envelope: AlertEnvelope,
}

pub struct SubscriptionRegistry {
    config: RegistryConfig,
    connections: RwLock<HashMap<Uuid, Arc<Connection>>>,
    replay: Mutex<VecDeque<ReplayEntry>>,
    next_seq: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            replay: Mutex::new(VecDeque::with_capacity(config.replay_capacity)),
            config,
            connections: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Register a new connection in `Connecting` state, watching everything.
    pub fn connect(&self, connection_id: Uuid) -> Arc<Connection> {
        let conn = Arc::new(Connection::new(
            connection_id,
            WatchSet::All,
            ConnectionState::Connecting,
            &self.config,
        ));
        let previous = self.connections.write().insert(connection_id, conn.clone());
        if let Some(previous) = previous {
            previous.close();
        }
        self.update_gauge();
        tracing::debug!(connection_id = %connection_id, "Connection registered");
        conn
    }

    /// Handshake completed: `Connecting → Active`.
    pub fn activate(&self, connection_id: Uuid) -> bool {
        match self.get(connection_id) {
            Some(conn) => {
                conn.touch(Instant::now());
                conn.set_state(ConnectionState::Active);
                true
            }
            None => false,
        }
    }

    /// Register or update a connection's watch filter. Re-subscribing
    /// replaces the previous watch set.
    pub fn subscribe(&self, connection_id: Uuid, watch: WatchSet) -> Arc<Connection> {
        let existing = self.get(connection_id);
        let conn = match existing {
            Some(conn) => {
                *conn.watch.write() = watch;
                conn
            }
            None => {
                let conn = Arc::new(Connection::new(
                    connection_id,
                    watch,
                    ConnectionState::Active,
                    &self.config,
                ));
                self.connections
                    .write()
                    .entry(connection_id)
                    .or_insert(conn)
                    .clone()
            }
        };
        self.update_gauge();
        tracing::info!(connection_id = %connection_id, watch = ?conn.watch_set(), "Watch set updated");
        conn
    }

    /// Remove a connection and cancel its delivery loop. Unknown ids are a no-op.
    pub fn unsubscribe(&self, connection_id: Uuid) -> bool {
        let removed = self.connections.write().remove(&connection_id);
        match removed {
            Some(conn) => {
                conn.close();
                self.update_gauge();
                tracing::info!(
                    connection_id = %connection_id,
                    dropped_count = conn.dropped_count(),
                    "Connection closed"
                );
                true
            }
            None => false,
        }
    }

    /// Confirm the active filter to the client.
    pub fn ack(&self, connection_id: Uuid, watch: WatchSet) -> bool {
        let Some(conn) = self.get(connection_id) else {
            return false;
        };
        *conn.last_ack.lock() = Some(Utc::now());
        conn.send(ServerMessage::Ack {
            watch,
            dropped_count: conn.dropped_count(),
        });
        true
    }

    /// Client showed signs of life (ping or pong). `Idle → Active`.
    pub fn heartbeat(&self, connection_id: Uuid) -> bool {
        let Some(conn) = self.get(connection_id) else {
            return false;
        };
        conn.touch(Instant::now());
        let mut state = conn.state.lock();
        if *state == ConnectionState::Idle {
            *state = ConnectionState::Active;
            tracing::debug!(connection_id = %connection_id, "Connection active again");
        }
        true
    }

    /// Fan an alert out to every active connection whose watch set matches.
    ///
    /// An identical alert still held in the replay window is not re-sent.
    pub fn broadcast(&self, envelope: AlertEnvelope) -> BroadcastReport {
        let seq = {
            let mut replay = self.replay.lock();
            if replay.iter().any(|e| e.envelope == envelope) {
                tracing::debug!(tx_id = %envelope.tx_id(), "Alert already broadcast, skipping");
                return BroadcastReport::default();
            }
            let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
            if self.config.replay_capacity > 0 {
                if replay.len() >= self.config.replay_capacity {
                    replay.pop_front();
                }
                replay.push_back(ReplayEntry {
                    seq,
                    envelope: envelope.clone(),
                });
            }
            seq
        };

        let mut report = BroadcastReport {
            seq: Some(seq),
            ..BroadcastReport::default()
        };

        for conn in self.snapshot() {
            if conn.state() != ConnectionState::Active || !conn.watch.read().matches(&envelope) {
                continue;
            }
            match conn.send_alert(seq, &envelope.item) {
                Some(PushOutcome::Enqueued) => report.delivered += 1,
                Some(PushOutcome::DroppedOldest) => {
                    report.delivered += 1;
                    report.dropped += 1;
                }
                Some(PushOutcome::Closed) | None => {}
            }
        }

        tracing::debug!(
            tx_id = %envelope.tx_id(),
            seq,
            delivered = report.delivered,
            dropped = report.dropped,
            "Alert broadcast"
        );
        report
    }

    /// Re-send retained alerts newer than `since_seq` that match the
    /// connection's current watch set. Returns how many were enqueued.
    pub fn replay_since(&self, connection_id: Uuid, since_seq: u64) -> usize {
        let Some(conn) = self.get(connection_id) else {
            return 0;
        };
        let watch = conn.watch_set();
        let pending: Vec<(u64, ScoredResult)> = self
            .replay
            .lock()
            .iter()
            .filter(|e| e.seq > since_seq && watch.matches(&e.envelope))
            .map(|e| (e.seq, e.envelope.item.clone()))
            .collect();

        pending
            .iter()
            .filter(|(seq, item)| conn.send_alert(*seq, item).is_some())
            .count()
    }

    /// Move silent connections to `Idle`, and close those silent for
    /// `missed_heartbeats` intervals.
    pub fn sweep(&self, now: Instant) -> SweepReport {
        let mut report = SweepReport::default();
        let close_after = self.config.close_after();

        for conn in self.snapshot() {
            let silence = conn.silence(now);
            if silence >= close_after {
                report.closed.push(conn.id);
            } else if silence >= self.config.heartbeat_interval {
                let mut state = conn.state.lock();
                if *state == ConnectionState::Active {
                    *state = ConnectionState::Idle;
                    report.idled.push(conn.id);
                }
            }
        }

        for id in &report.closed {
            if self.unsubscribe(*id) {
                counter!("connections_timed_out_total").increment(1);
                tracing::warn!(connection_id = %id, "Connection timed out after missed heartbeats");
            }
        }
        report
    }

    /// Send `{type:"ping"}` to every live connection.
    pub fn ping_all(&self) {
        for conn in self.snapshot() {
            conn.send(ServerMessage::Ping);
        }
    }

    /// Spawn the periodic sweep + ping task.
    pub fn spawn_heartbeat_monitor(self: &Arc<Self>) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(registry.config.heartbeat_interval);
            ticker.tick().await; // consume the first immediate tick
            loop {
                ticker.tick().await;
                let report = registry.sweep(Instant::now());
                if !report.idled.is_empty() || !report.closed.is_empty() {
                    tracing::debug!(
                        idled = report.idled.len(),
                        closed = report.closed.len(),
                        "Heartbeat sweep"
                    );
                }
                registry.ping_all();
            }
        })
    }

    pub fn get(&self, connection_id: Uuid) -> Option<Arc<Connection>> {
        self.connections.read().get(&connection_id).cloned()
    }

    pub fn connections(&self) -> Vec<ConnectionInfo> {
        let mut infos: Vec<ConnectionInfo> = self.snapshot().iter().map(|c| c.info()).collect();
        infos.sort_by_key(|i| i.created_at);
        infos
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_seq(&self) -> u64 {
        self.next_seq.load(Ordering::SeqCst)
    }

    /// Copy of the current connection handles; the lock is released before
    /// the caller touches any of them.
    fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.read().values().cloned().collect()
    }

    fn update_gauge(&self) {
        gauge!("ws_connections").set(self.len() as f64);
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
