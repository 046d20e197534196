//! Fleet actor: per-slot connection supervision with async message handling.
//!
//! The actor owns every registry (slots, identities, global leave state,
//! engagements, event log) and processes one message at a time. Scheduled
//! work comes back as inbox messages from spawned timer tasks; each carries
//! the slot's epoch where staleness matters, and reconnect timers are
//! additionally cancellable by slot id.

use super::{
    errors::FleetError,
    leave::{self, GlobalLeaveState, LEAVE_STAGGER_MAX, LEAVE_WINDOW},
    messages::{CommandTarget, FleetMessage, FleetSnapshot, SlotSnapshot},
    registry::FleetRegistry,
    slot::{BotSlot, ControlState, MAX_SLOTS, SlotId, SlotStatus, is_ban_reason, throttle_delay},
};
use crate::{
    combat::{
        self, ATTACK_RANGE, DODGE_HOLD, Engagement, FIRST_MOCK_DELAY, PURSUE_DISTANCE,
        TICK_INTERVAL,
    },
    config::{AuthConfig, FleetConfig, JoinCommandConfig},
    eventlog::{EventLog, LogSource},
    identity::IdentityRegistry,
    persist::{HistoryStore, RuntimeSettings, ServerHistory, SettingsStore},
    session::{AttackerInfo, Connector, GameSession, MOVE_DIRECTIONS, MoveDirection, SessionEvent},
};
use chrono::Utc;
use rand::Rng;
use std::{collections::HashMap, sync::Arc};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{Duration, Instant, interval_at, sleep},
};
use uuid::Uuid;

/// Delay before a started slot attempts its first connection
const START_DELAY: Duration = Duration::from_secs(2);

/// Stagger between first connections when several slots are added at once
const ADD_STAGGER: Duration = Duration::from_secs(1);

/// Fleet actor inbox capacity
const INBOX_CAPACITY: usize = 100;

/// Handle for sending requests to the fleet actor
#[derive(Clone)]
pub struct FleetHandle {
    sender: mpsc::Sender<FleetMessage>,
}

impl FleetHandle {
    async fn request<T>(
        &self,
        message: FleetMessage,
        rx: oneshot::Receiver<T>,
    ) -> Result<T, FleetError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| FleetError::FleetClosed)?;
        rx.await.map_err(|_| FleetError::FleetClosed)
    }

    /// Add up to `count` slots with random identities
    ///
    /// # Returns
    ///
    /// * `Result<Vec<SlotId>, FleetError>` - Ids of the created slots
    pub async fn add_slots(&self, count: usize) -> Result<Vec<SlotId>, FleetError> {
        let (tx, rx) = oneshot::channel();
        self.request(FleetMessage::AddSlots { count, response: tx }, rx)
            .await?
    }

    /// Add one slot with a custom name and optional identifier string
    pub async fn add_custom_slot(
        &self,
        name: impl Into<String>,
        uuid: Option<String>,
    ) -> Result<SlotId, FleetError> {
        let (tx, rx) = oneshot::channel();
        self.request(
            FleetMessage::AddCustomSlot {
                name: name.into(),
                uuid,
                response: tx,
            },
            rx,
        )
        .await?
    }

    /// Stop a slot; returns `false` if the slot is unknown
    pub async fn stop_slot(&self, id: SlotId) -> Result<bool, FleetError> {
        let (tx, rx) = oneshot::channel();
        self.request(FleetMessage::StopSlot { id, response: tx }, rx)
            .await
    }

    /// Resume a stopped slot; returns `false` if the slot is unknown
    pub async fn start_slot(&self, id: SlotId) -> Result<bool, FleetError> {
        let (tx, rx) = oneshot::channel();
        self.request(FleetMessage::StartSlot { id, response: tx }, rx)
            .await
    }

    /// Remove a slot; permanent removal retires the id and purges all state
    pub async fn remove_slot(&self, id: SlotId, permanent: bool) -> Result<bool, FleetError> {
        let (tx, rx) = oneshot::channel();
        self.request(
            FleetMessage::RemoveSlot {
                id,
                permanent,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Permanently remove every slot; returns how many were removed
    pub async fn remove_all(&self) -> Result<usize, FleetError> {
        let (tx, rx) = oneshot::channel();
        self.request(FleetMessage::RemoveAll { response: tx }, rx)
            .await
    }

    /// Dispatch a chat command to one or all eligible slots
    ///
    /// # Returns
    ///
    /// * `Result<Vec<SlotId>, FleetError>` - Ids the command was delivered to
    pub async fn send_command(
        &self,
        text: impl Into<String>,
        target: CommandTarget,
    ) -> Result<Vec<SlotId>, FleetError> {
        let (tx, rx) = oneshot::channel();
        self.request(
            FleetMessage::Command {
                text: text.into(),
                target,
                response: tx,
            },
            rx,
        )
        .await?
    }

    /// Switch every session to a new server address
    pub async fn change_server(
        &self,
        host: impl Into<String>,
        port: u16,
    ) -> Result<(), FleetError> {
        let (tx, rx) = oneshot::channel();
        self.request(
            FleetMessage::ChangeServer {
                host: host.into(),
                port,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Replace the runtime settings
    pub async fn update_settings(&self, settings: RuntimeSettings) -> Result<(), FleetError> {
        let (tx, rx) = oneshot::channel();
        self.request(FleetMessage::UpdateSettings { settings, response: tx }, rx)
            .await
    }

    /// Enumerate slots and fleet totals
    pub async fn snapshot(&self) -> Result<FleetSnapshot, FleetError> {
        let (tx, rx) = oneshot::channel();
        self.request(FleetMessage::Snapshot { response: tx }, rx)
            .await
    }

    /// Read the rolling event log, newest first
    pub async fn logs(&self, limit: usize) -> Result<Vec<String>, FleetError> {
        let (tx, rx) = oneshot::channel();
        self.request(FleetMessage::Logs { limit, response: tx }, rx)
            .await
    }

    /// Clear the rolling event log
    pub async fn clear_logs(&self) -> Result<(), FleetError> {
        let (tx, rx) = oneshot::channel();
        self.request(FleetMessage::ClearLogs { response: tx }, rx)
            .await
    }

    /// End all sessions and stop the actor
    pub async fn shutdown(&self) -> Result<(), FleetError> {
        let (tx, rx) = oneshot::channel();
        self.request(FleetMessage::Shutdown { response: tx }, rx)
            .await
    }
}

/// The fleet actor owning all orchestration state
pub struct FleetActor {
    /// Fleet configuration (server address mutates on change-server)
    config: FleetConfig,

    /// Operator-togglable runtime settings
    settings: RuntimeSettings,

    /// Slot records
    registry: FleetRegistry,

    /// Slot identities
    identities: IdentityRegistry,

    /// Global leave state
    leave: GlobalLeaveState,

    /// Locked combat engagements, at most one per slot
    engagements: HashMap<SlotId, Engagement>,

    /// Rolling event log
    log: EventLog,

    /// Recently used server addresses
    history: ServerHistory,

    /// Session factory collaborator
    connector: Arc<dyn Connector>,

    /// Message inbox
    inbox: mpsc::Receiver<FleetMessage>,

    /// Sender handed to timer tasks and event pumps
    sender: mpsc::Sender<FleetMessage>,

    /// Pending reconnect timers, cancellable by slot id
    retry_timers: HashMap<SlotId, JoinHandle<()>>,

    /// Per-slot session side tasks (event pump, greeting, anti-idle)
    session_tasks: HashMap<SlotId, Vec<JoinHandle<()>>>,

    /// Optional file store for the server history
    history_store: Option<HistoryStore>,

    /// Optional file store for runtime settings
    settings_store: Option<SettingsStore>,

    /// Set by shutdown to break the run loop
    closed: bool,
}

impl FleetActor {
    /// Create a fleet actor and its operator handle
    ///
    /// # Arguments
    ///
    /// * `config` - Fleet configuration; `config.settings` seeds the
    ///   runtime settings
    /// * `connector` - Session factory collaborator
    ///
    /// # Returns
    ///
    /// * `(FleetActor, FleetHandle)` - Actor and handle for sending requests
    pub fn new(config: FleetConfig, connector: Arc<dyn Connector>) -> (Self, FleetHandle) {
        let (sender, inbox) = mpsc::channel(INBOX_CAPACITY);
        let settings = config.settings;

        let actor = Self {
            config,
            settings,
            registry: FleetRegistry::new(),
            identities: IdentityRegistry::new(),
            leave: GlobalLeaveState::new(),
            engagements: HashMap::new(),
            log: EventLog::new(),
            history: ServerHistory::new(),
            connector,
            inbox,
            sender: sender.clone(),
            retry_timers: HashMap::new(),
            session_tasks: HashMap::new(),
            history_store: None,
            settings_store: None,
            closed: false,
        };

        (actor, FleetHandle { sender })
    }

    /// Attach file stores; loads both files, preferring stored settings
    /// over the configured defaults
    pub fn with_stores(mut self, history: HistoryStore, settings: SettingsStore) -> Self {
        self.history = history.load();
        self.settings = settings.load();
        self.history_store = Some(history);
        self.settings_store = Some(settings);
        self
    }

    /// Run the fleet actor event loop
    pub async fn run(mut self) {
        log::info!(
            "Fleet starting against {}:{}",
            self.config.server.host,
            self.config.server.port
        );
        self.bootstrap();

        while let Some(message) = self.inbox.recv().await {
            self.handle_message(message).await;
            if self.closed {
                break;
            }
        }

        log::info!("Fleet stopped");
    }

    /// Create the configured initial slots, staggering their first connects
    fn bootstrap(&mut self) {
        let count = self.config.initial_slots.min(MAX_SLOTS);
        if count == 0 {
            return;
        }
        self.log
            .push(LogSource::System, format!("Starting {count} initial bots..."));
        for (index, id) in self.registry.free_ids(count).into_iter().enumerate() {
            self.registry.insert(BotSlot::new(id));
            self.schedule_retry(id, ADD_STAGGER * (index as u32 + 1));
        }
    }

    async fn handle_message(&mut self, message: FleetMessage) {
        match message {
            FleetMessage::AddSlots { count, response } => {
                let result = self.handle_add_slots(count);
                let _ = response.send(result);
            }

            FleetMessage::AddCustomSlot { name, uuid, response } => {
                let result = self.handle_add_custom(name, uuid);
                let _ = response.send(result);
            }

            FleetMessage::StopSlot { id, response } => {
                let result = self.handle_stop(id).await;
                let _ = response.send(result);
            }

            FleetMessage::StartSlot { id, response } => {
                let result = self.handle_start(id);
                let _ = response.send(result);
            }

            FleetMessage::RemoveSlot { id, permanent, response } => {
                let result = self.handle_remove(id, permanent).await;
                let _ = response.send(result);
            }

            FleetMessage::RemoveAll { response } => {
                let result = self.handle_remove_all().await;
                let _ = response.send(result);
            }

            FleetMessage::Command { text, target, response } => {
                let result = self.handle_command(&text, target).await;
                let _ = response.send(result);
            }

            FleetMessage::ChangeServer { host, port, response } => {
                self.handle_change_server(host, port).await;
                let _ = response.send(());
            }

            FleetMessage::UpdateSettings { settings, response } => {
                self.settings = settings;
                if let Some(store) = &self.settings_store {
                    store.save(&self.settings);
                }
                self.log.push(LogSource::System, "Settings updated");
                let _ = response.send(());
            }

            FleetMessage::Snapshot { response } => {
                let _ = response.send(self.snapshot());
            }

            FleetMessage::Logs { limit, response } => {
                let _ = response.send(self.log.recent(limit));
            }

            FleetMessage::ClearLogs { response } => {
                self.log.clear();
                self.log.push(LogSource::System, "Console cleared");
                let _ = response.send(());
            }

            FleetMessage::Shutdown { response } => {
                self.handle_shutdown().await;
                let _ = response.send(());
            }

            FleetMessage::Session { id, epoch, event } => {
                self.handle_session_event(id, epoch, event).await;
            }

            FleetMessage::RetryConnect { id } => {
                self.retry_timers.remove(&id);
                self.request_connect(id).await;
            }

            FleetMessage::CombatTick { id, epoch } => {
                self.handle_combat_tick(id, epoch).await;
            }

            FleetMessage::CombatGreeting { id, epoch } => {
                self.handle_combat_greeting(id, epoch).await;
            }

            FleetMessage::LeaveExpired => {
                self.leave.deactivate();
                self.log.push(
                    LogSource::System,
                    "GLOBAL LEAVE MODE ENDED - Bots can reconnect now",
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // Operator requests
    // ------------------------------------------------------------------

    fn handle_add_slots(&mut self, count: usize) -> Result<Vec<SlotId>, FleetError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        if self.registry.at_capacity() {
            return Err(FleetError::CapacityReached { max: MAX_SLOTS });
        }

        let ids = self.registry.free_ids(count);
        if ids.is_empty() {
            return Err(FleetError::CapacityReached { max: MAX_SLOTS });
        }

        for (index, id) in ids.iter().copied().enumerate() {
            self.registry.insert(BotSlot::new(id));
            self.schedule_retry(id, ADD_STAGGER * index as u32);
        }

        self.log
            .push(LogSource::System, format!("Adding {} random bot(s)", ids.len()));
        Ok(ids)
    }

    fn handle_add_custom(
        &mut self,
        name: String,
        uuid: Option<String>,
    ) -> Result<SlotId, FleetError> {
        let name = name.trim().to_string();
        if name.chars().count() < crate::identity::MIN_NAME_LEN {
            return Err(FleetError::NameTooShort { name });
        }

        let uuid = match uuid {
            Some(raw) => {
                let raw = raw.trim().to_string();
                Some(
                    Uuid::parse_str(&raw)
                        .map_err(|_| FleetError::InvalidIdentifier(raw))?,
                )
            }
            None => None,
        };

        let id = self
            .registry
            .free_ids(1)
            .first()
            .copied()
            .ok_or(FleetError::CapacityReached { max: MAX_SLOTS })?;

        self.identities.rotate(id, Some(name.clone()), uuid)?;
        self.registry.insert(BotSlot::new(id));

        self.log
            .push(LogSource::System, format!("Adding custom bot: {name}"));
        self.schedule_retry(id, Duration::ZERO);
        Ok(id)
    }

    async fn handle_stop(&mut self, id: SlotId) -> bool {
        let session = {
            let Some(slot) = self.registry.get_mut(id) else {
                return false;
            };
            slot.control = ControlState::Stopped;
            slot.status = SlotStatus::Stopped;
            slot.online = false;
            slot.session.take()
        };

        self.cancel_retry(id);
        self.teardown_session_tasks(id);
        self.disengage(id, false).await;

        if let Some(session) = session {
            session.quit("Stopped by user").await;
        }

        self.log
            .push(LogSource::Slot(id), "Bot stopped (manual control)");
        true
    }

    fn handle_start(&mut self, id: SlotId) -> bool {
        {
            let Some(slot) = self.registry.get_mut(id) else {
                return false;
            };
            slot.control = ControlState::Running;
            slot.status = SlotStatus::Starting;
            slot.manually_removed = false;
        }

        self.log
            .push(LogSource::Slot(id), "Bot started (manual control)");
        self.schedule_retry(id, START_DELAY);
        true
    }

    async fn handle_remove(&mut self, id: SlotId, permanent: bool) -> bool {
        if !self.registry.contains(id) {
            return false;
        }

        self.cancel_retry(id);
        self.teardown_session_tasks(id);
        self.disengage(id, false).await;

        let session = {
            let Some(slot) = self.registry.get_mut(id) else {
                return false;
            };
            slot.manually_removed = true;
            slot.online = false;
            slot.status = SlotStatus::Removed;
            slot.last_seen = Utc::now();
            slot.session.take()
        };

        if let Some(session) = session {
            session.quit("Removed by operator").await;
        }

        let name = self
            .identities
            .get(id)
            .map(|identity| identity.name.clone())
            .unwrap_or_else(|| format!("Bot_{id}"));

        if permanent {
            self.registry.remove_permanently(id);
            self.identities.remove(id);
        }

        self.log
            .push(LogSource::System, format!("Removing bot {id} ({name})"));
        true
    }

    async fn handle_remove_all(&mut self) -> usize {
        let ids = self.registry.ids();
        let total = ids.len();
        self.log.push(
            LogSource::System,
            format!("Removing all {total} bots permanently"),
        );

        let mut removed = 0;
        for id in ids {
            if self.handle_remove(id, true).await {
                removed += 1;
            }
        }
        removed
    }

    async fn handle_command(
        &mut self,
        text: &str,
        target: CommandTarget,
    ) -> Result<Vec<SlotId>, FleetError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FleetError::EmptyCommand);
        }

        let mut recipients: Vec<(SlotId, Arc<dyn GameSession>)> = Vec::new();
        match target {
            CommandTarget::All => {
                for slot in self.registry.iter() {
                    if slot.commandable()
                        && let Some(session) = &slot.session
                    {
                        recipients.push((slot.id, session.clone()));
                    }
                }
                recipients.sort_by_key(|(id, _)| *id);
            }
            CommandTarget::Slot(id) => {
                let slot = self.registry.get(id).ok_or(FleetError::SlotNotFound(id))?;
                if slot.commandable()
                    && let Some(session) = &slot.session
                {
                    recipients.push((id, session.clone()));
                }
            }
        }

        let mut delivered = Vec::with_capacity(recipients.len());
        for (id, session) in recipients {
            session.chat(text).await;
            delivered.push(id);
        }

        match target {
            CommandTarget::All => self
                .log
                .push(LogSource::System, format!("Command to all bots: {text}")),
            CommandTarget::Slot(id) => self
                .log
                .push(LogSource::System, format!("Command to bot {id}: {text}")),
        }

        Ok(delivered)
    }

    async fn handle_change_server(&mut self, host: String, port: u16) {
        self.history.record(&host, port);
        if let Some(store) = &self.history_store {
            store.save(&self.history);
        }

        self.config.server.host = host.clone();
        self.config.server.port = port;
        self.log
            .push(LogSource::System, format!("Changing server to {host}:{port}"));

        // End every session; identities and control states survive.
        let ids = self.registry.ids();
        for id in ids.iter().copied() {
            self.cancel_retry(id);
            self.teardown_session_tasks(id);
            self.disengage(id, false).await;

            let session = match self.registry.get_mut(id) {
                Some(slot) => {
                    slot.online = false;
                    if !matches!(slot.status, SlotStatus::Stopped | SlotStatus::Removed) {
                        slot.status = SlotStatus::Disconnected;
                        slot.last_seen = Utc::now();
                    }
                    slot.session.take()
                }
                None => None,
            };
            if let Some(session) = session {
                session.quit("Switching servers").await;
            }
        }

        // Reconnect everything still under operator control, staggered.
        let mut index = 0u32;
        for id in ids {
            let eligible = self
                .registry
                .get(id)
                .is_some_and(|slot| slot.control == ControlState::Running && !slot.manually_removed);
            if eligible {
                self.schedule_retry(id, START_DELAY + ADD_STAGGER * index);
                index += 1;
            }
        }
    }

    async fn handle_shutdown(&mut self) {
        self.log.push(LogSource::System, "Fleet shutting down");
        for id in self.registry.ids() {
            self.cancel_retry(id);
            self.teardown_session_tasks(id);
            self.disengage(id, false).await;

            let session = self.registry.get_mut(id).and_then(|slot| {
                slot.online = false;
                slot.session.take()
            });
            if let Some(session) = session {
                session.quit("Fleet shutting down").await;
            }
        }
        self.closed = true;
    }

    fn snapshot(&self) -> FleetSnapshot {
        let mut slots: Vec<SlotSnapshot> = self
            .registry
            .iter()
            .map(|slot| SlotSnapshot {
                id: slot.id,
                name: self
                    .identities
                    .get(slot.id)
                    .map(|identity| identity.name.clone())
                    .unwrap_or_else(|| format!("Bot_{}", slot.id)),
                online: slot.online,
                status: slot.status,
                control: slot.control,
                health: slot.health,
                food: slot.food,
                last_seen: slot.last_seen,
                reconnect_attempts: slot.reconnect_attempts,
                banned: slot.banned,
            })
            .collect();
        slots.sort_by_key(|slot| slot.id);

        FleetSnapshot {
            slots,
            online: self.registry.online_count(),
            stopped: self.registry.stopped_count(),
            leave_active: self.leave.is_active(),
        }
    }

    // ------------------------------------------------------------------
    // Connection supervision
    // ------------------------------------------------------------------

    /// Attempt to open a session for the slot, applying the precondition
    /// ladder: permanent removal, manual stop, global leave deferral,
    /// reconnect throttling, then the actual connect.
    async fn request_connect(&mut self, id: SlotId) {
        if self.registry.is_removed(id) {
            log::debug!("Slot {id} was permanently removed, not reconnecting");
            return;
        }

        let (control, attempts, last_attempt) = {
            let Some(slot) = self.registry.get(id) else {
                return;
            };
            (slot.control, slot.reconnect_attempts, slot.last_reconnect_attempt)
        };

        if control == ControlState::Stopped {
            self.log
                .push(LogSource::Slot(id), "Bot is manually stopped. Not connecting.");
            return;
        }

        let now = Instant::now();
        if self.leave.is_active() {
            let delay = self.leave.retry_delay(now);
            self.log.push(
                LogSource::Slot(id),
                "Skipping connection due to global leave mode",
            );
            self.schedule_retry(id, delay);
            return;
        }

        if let Some(at) = last_attempt
            && let Some(wait) = throttle_delay(attempts, now.duration_since(at))
        {
            let wait_secs = wait.as_millis().div_ceil(1000);
            self.log.push(
                LogSource::Slot(id),
                format!("Connection throttled. Please wait {wait_secs}s before reconnect."),
            );
            self.schedule_retry(id, wait);
            return;
        }

        // A slot never holds two live sessions; end any leftover one first.
        let previous = self.registry.get_mut(id).and_then(|slot| {
            slot.online = false;
            slot.session.take()
        });
        if let Some(previous) = previous {
            self.teardown_session_tasks(id);
            self.disengage(id, false).await;
            previous.quit("Reconnecting").await;
        }

        let identity = self.identities.identity_for(id).clone();
        self.log
            .push(LogSource::Slot(id), format!("Connecting as {}", identity.name));

        let connector = self.connector.clone();
        let host = self.config.server.host.clone();
        let port = self.config.server.port;
        let version = self.config.server.version.clone();

        match connector.connect(&host, port, &identity, &version).await {
            Ok((session, events)) => {
                let epoch = {
                    let Some(slot) = self.registry.get_mut(id) else {
                        return;
                    };
                    slot.epoch += 1;
                    slot.session = Some(session);
                    slot.online = false;
                    slot.status = SlotStatus::Connecting;
                    slot.reconnect_attempts += 1;
                    slot.last_reconnect_attempt = Some(now);
                    slot.epoch
                };
                self.spawn_event_pump(id, epoch, events);
            }
            Err(e) => {
                let auto_reconnect = self.settings.auto_reconnect;
                let delay = self.config.reconnect_delay();
                {
                    let Some(slot) = self.registry.get_mut(id) else {
                        return;
                    };
                    slot.reconnect_attempts += 1;
                    slot.last_reconnect_attempt = Some(now);
                    slot.mark_offline(SlotStatus::Error);
                }
                self.log.push(LogSource::Slot(id), format!("Error: {e}"));
                if auto_reconnect {
                    self.schedule_retry(id, delay);
                }
            }
        }
    }

    /// Forward session events into the inbox, tagged with the session epoch
    fn spawn_event_pump(
        &mut self,
        id: SlotId,
        epoch: u64,
        mut events: mpsc::Receiver<SessionEvent>,
    ) {
        let sender = self.sender.clone();
        let pump = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if sender
                    .send(FleetMessage::Session { id, epoch, event })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });
        self.session_tasks.entry(id).or_default().push(pump);
    }

    fn schedule_retry(&mut self, id: SlotId, delay: Duration) {
        if let Some(previous) = self.retry_timers.remove(&id) {
            previous.abort();
        }
        let sender = self.sender.clone();
        let timer = tokio::spawn(async move {
            sleep(delay).await;
            let _ = sender.send(FleetMessage::RetryConnect { id }).await;
        });
        self.retry_timers.insert(id, timer);
    }

    fn cancel_retry(&mut self, id: SlotId) {
        if let Some(timer) = self.retry_timers.remove(&id) {
            timer.abort();
        }
    }

    fn teardown_session_tasks(&mut self, id: SlotId) {
        if let Some(tasks) = self.session_tasks.remove(&id) {
            for task in tasks {
                task.abort();
            }
        }
    }

    // ------------------------------------------------------------------
    // Session signals
    // ------------------------------------------------------------------

    async fn handle_session_event(&mut self, id: SlotId, epoch: u64, event: SessionEvent) {
        let current = match self.registry.get(id) {
            Some(slot) => slot.epoch,
            None => return,
        };
        if epoch != current {
            log::debug!("Dropping stale session event for slot {id} (epoch {epoch})");
            return;
        }

        match event {
            SessionEvent::Spawned => self.on_spawned(id),
            SessionEvent::HealthChanged(health) => {
                if let Some(slot) = self.registry.get_mut(id) {
                    slot.health = health;
                }
            }
            SessionEvent::FoodChanged(food) => {
                if let Some(slot) = self.registry.get_mut(id) {
                    slot.food = food;
                }
            }
            SessionEvent::Chat { sender, text } => self.on_chat(id, sender, text).await,
            SessionEvent::PlayerJoined(name) => {
                self.log
                    .push(LogSource::Slot(id), format!("{name} joined the game"));
            }
            SessionEvent::PlayerLeft(name) => {
                self.log
                    .push(LogSource::Slot(id), format!("{name} left the game"));
            }
            SessionEvent::SelfDamaged { attacker } => self.on_self_damaged(id, attacker).await,
            SessionEvent::Died => self.on_died(id).await,
            SessionEvent::Kicked { reason } => self.on_kicked(id, reason),
            SessionEvent::Errored { message } => self.on_errored(id, message),
            SessionEvent::Ended => self.on_ended(id).await,
        }
    }

    fn on_spawned(&mut self, id: SlotId) {
        let session = {
            let Some(slot) = self.registry.get_mut(id) else {
                return;
            };
            // A queued spawn can race a removal or server change; without a
            // live session there is nothing to bring online.
            let Some(session) = slot.session.clone() else {
                return;
            };
            slot.online = true;
            slot.status = SlotStatus::Online;
            slot.reconnect_attempts = 0;
            slot.last_seen = Utc::now();
            session
        };

        self.log.push(LogSource::Slot(id), "Spawned in world.");

        let auth = self.config.auth.clone();
        let join = self.config.join_command.clone();
        let anti_idle = self.settings.anti_idle;

        let tasks = self.session_tasks.entry(id).or_default();
        tasks.push(spawn_greeting(session.clone(), auth, join));
        if anti_idle {
            tasks.push(spawn_anti_idle(session));
        }
    }

    async fn on_chat(&mut self, id: SlotId, sender: String, text: String) {
        let own = self
            .identities
            .get(id)
            .is_some_and(|identity| identity.name == sender);

        if !own {
            if self.settings.chat_log {
                self.log
                    .push(LogSource::Slot(id), format!("<{sender}> {text}"));
            }
            if leave::is_leave_trigger(&text) {
                self.activate_global_leave().await;
            }
        }

        let lowered = text.to_lowercase();
        if ["was killed", "slain", "died"]
            .iter()
            .any(|kw| lowered.contains(kw))
        {
            self.log.push(LogSource::Slot(id), text.clone());
        }
        if ["joined", "left", "achievement", "advancement"]
            .iter()
            .any(|kw| lowered.contains(kw))
        {
            self.log.push(LogSource::Slot(id), text);
        }
    }

    fn on_kicked(&mut self, id: SlotId, reason: String) {
        let banned = is_ban_reason(&reason);
        {
            let Some(slot) = self.registry.get_mut(id) else {
                return;
            };
            slot.mark_offline(SlotStatus::Kicked);
            slot.last_reconnect_attempt = Some(Instant::now());
            if banned {
                slot.banned = true;
            }
        }

        let shown: String = reason.chars().take(100).collect();
        self.log.push(LogSource::Slot(id), format!("Kicked: {shown}"));

        if banned {
            self.log
                .push(LogSource::Slot(id), "Ban detected! Generating new identity...");
            let _ = self.identities.rotate(id, None, None);
        } else {
            self.log.push(
                LogSource::Slot(id),
                "Regular kick. Will reconnect with same identity.",
            );
        }
    }

    fn on_errored(&mut self, id: SlotId, message: String) {
        {
            let Some(slot) = self.registry.get_mut(id) else {
                return;
            };
            slot.mark_offline(SlotStatus::Error);
            slot.last_reconnect_attempt = Some(Instant::now());
        }
        self.log.push(LogSource::Slot(id), format!("Error: {message}"));
    }

    async fn on_ended(&mut self, id: SlotId) {
        self.teardown_session_tasks(id);
        self.disengage(id, false).await;

        let (control, manually_removed) = {
            let Some(slot) = self.registry.get_mut(id) else {
                return;
            };
            slot.session = None;
            slot.online = false;
            slot.last_seen = Utc::now();
            if !matches!(slot.status, SlotStatus::Stopped | SlotStatus::Removed) {
                slot.status = SlotStatus::Disconnected;
            }
            (slot.control, slot.manually_removed)
        };

        if control == ControlState::Stopped {
            self.log
                .push(LogSource::Slot(id), "Bot is manually stopped. No auto-reconnect.");
            return;
        }
        if manually_removed {
            self.log
                .push(LogSource::Slot(id), "Bot was manually removed. No auto-reconnect.");
            return;
        }
        if !self.settings.auto_reconnect {
            self.log.push(LogSource::Slot(id), "Auto-reconnect disabled");
            return;
        }
        if self.registry.is_removed(id) {
            return;
        }

        let delay = self.config.reconnect_delay();
        self.log.push(
            LogSource::Slot(id),
            format!("Reconnecting in {}s...", delay.as_secs()),
        );
        self.schedule_retry(id, delay);
    }

    // ------------------------------------------------------------------
    // Global leave
    // ------------------------------------------------------------------

    async fn activate_global_leave(&mut self) {
        if !self.leave.activate(Instant::now()) {
            return;
        }
        self.log.push(
            LogSource::System,
            "GLOBAL LEAVE MODE ACTIVATED - All bots leaving for 1 minute",
        );

        let sessions: Vec<Arc<dyn GameSession>> = self
            .registry
            .iter()
            .filter(|slot| slot.online && slot.control != ControlState::Stopped)
            .filter_map(|slot| slot.session.clone())
            .collect();

        for session in sessions {
            session.chat("Leaving due to global command...").await;
            let stagger =
                Duration::from_millis(rand::rng().random_range(0..LEAVE_STAGGER_MAX.as_millis() as u64));
            tokio::spawn(async move {
                sleep(stagger).await;
                session.quit("Global leave command").await;
            });
        }

        let sender = self.sender.clone();
        tokio::spawn(async move {
            sleep(LEAVE_WINDOW).await;
            let _ = sender.send(FleetMessage::LeaveExpired).await;
        });
    }

    // ------------------------------------------------------------------
    // Combat
    // ------------------------------------------------------------------

    /// Lock onto an attacker: only when a player attacked first and no
    /// engagement is already running for the slot
    async fn on_self_damaged(&mut self, id: SlotId, attacker: Option<AttackerInfo>) {
        let Some(attacker) = attacker else { return };
        if !attacker.is_player || self.engagements.contains_key(&id) {
            return;
        }

        let (session, epoch) = {
            let Some(slot) = self.registry.get(id) else {
                return;
            };
            if !slot.online {
                return;
            }
            match &slot.session {
                Some(session) => (session.clone(), slot.epoch),
                None => return,
            }
        };

        let target = attacker.name;
        self.log.push(
            LogSource::Slot(id),
            format!("Locked on {target}! Combat mode activated."),
        );

        // First mocking message fires after a short delay
        let sender = self.sender.clone();
        tokio::spawn(async move {
            sleep(FIRST_MOCK_DELAY).await;
            let _ = sender.send(FleetMessage::CombatGreeting { id, epoch }).await;
        });

        // Equip the best melee weapon on hand
        let items = session.inventory_items().await;
        if let Some(weapon) = combat::best_weapon(&items) {
            session.equip(weapon).await;
        }

        // Decision tick loop, torn down when the engagement clears
        let sender = self.sender.clone();
        let ticker = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
            loop {
                ticks.tick().await;
                if sender
                    .send(FleetMessage::CombatTick { id, epoch })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        self.engagements.insert(
            id,
            Engagement {
                target,
                last_mock: Instant::now(),
                mock_gap: combat::random_mock_gap(),
                ticker,
            },
        );
    }

    async fn handle_combat_greeting(&mut self, id: SlotId, epoch: u64) {
        let session = match self.registry.get(id) {
            Some(slot) if slot.epoch == epoch => slot.session.clone(),
            _ => return,
        };
        let Some(session) = session else { return };
        let Some(target) = self.engagements.get(&id).map(|e| e.target.clone()) else {
            return;
        };

        if !session.self_alive().await {
            return;
        }

        let message = combat::mocking_message(&target);
        session.chat(&message).await;
        self.log.push(LogSource::Slot(id), format!("\"{message}\""));
    }

    async fn handle_combat_tick(&mut self, id: SlotId, epoch: u64) {
        let Some(target) = self.engagements.get(&id).map(|e| e.target.clone()) else {
            return;
        };

        // A tick from a torn-down loop can still be queued; it must not
        // touch an engagement that belongs to a newer session.
        let (online, session) = match self.registry.get(id) {
            Some(slot) if slot.epoch == epoch => (slot.online, slot.session.clone()),
            _ => return,
        };

        let Some(session) = session else {
            self.disengage(id, false).await;
            return;
        };
        if !online || !session.self_alive().await {
            self.disengage(id, false).await;
            return;
        }

        match session.target_state(&target).await {
            Some(state) if state.health > 0.0 => {
                let now = Instant::now();
                let mut mock = None;
                if let Some(engagement) = self.engagements.get_mut(&id)
                    && engagement.due_for_mock(now)
                {
                    engagement.mocked(now);
                    mock = Some(combat::mocking_message(&target));
                }
                if let Some(message) = mock {
                    session.chat(&message).await;
                    self.log.push(LogSource::Slot(id), format!("\"{message}\""));
                }

                if state.distance < ATTACK_RANGE {
                    session.attack(&target).await;
                    dodge(session);
                } else {
                    session.pursue(&target, PURSUE_DISTANCE).await;
                }
            }
            _ => {
                // Target dead or gone
                session.chat(&combat::elimination_message(&target)).await;
                self.log
                    .push(LogSource::Slot(id), format!("Target eliminated: {target}"));
                self.disengage(id, true).await;
            }
        }
    }

    async fn on_died(&mut self, id: SlotId) {
        self.log.push(LogSource::Slot(id), "Bot died.");
        self.disengage(id, true).await;
    }

    /// Clear the engagement for a slot and tear its tick loop down
    async fn disengage(&mut self, id: SlotId, stop_attack: bool) {
        let Some(engagement) = self.engagements.remove(&id) else {
            return;
        };
        engagement.ticker.abort();

        if stop_attack
            && let Some(session) = self.registry.get(id).and_then(|slot| slot.session.clone())
        {
            session.stop_attack().await;
        }
    }
}

/// Briefly hold a random sidestep to dodge incoming swings
fn dodge(session: Arc<dyn GameSession>) {
    let direction = if rand::rng().random_bool(0.5) {
        MoveDirection::Left
    } else {
        MoveDirection::Right
    };
    tokio::spawn(async move {
        session.set_movement_intent(direction, true).await;
        sleep(DODGE_HOLD).await;
        session.set_movement_intent(direction, false).await;
    });
}

/// Chat the auth sequence and/or join command after spawning
fn spawn_greeting(
    session: Arc<dyn GameSession>,
    auth: AuthConfig,
    join: JoinCommandConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if auth.enabled {
            sleep(Duration::from_secs(2)).await;
            session
                .chat(&format!("/register {} {}", auth.password, auth.password))
                .await;
            sleep(Duration::from_secs(2)).await;
            session.chat(&format!("/login {}", auth.password)).await;
            if join.enabled {
                sleep(Duration::from_secs(2)).await;
                session.chat(&join.command).await;
            }
        } else if join.enabled {
            sleep(Duration::from_secs(4)).await;
            session.chat(&join.command).await;
        }
    })
}

/// Jiggle a random movement intent periodically so the server does not
/// flag the bot as idle
fn spawn_anti_idle(session: Arc<dyn GameSession>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if !session.self_alive().await {
                sleep(Duration::from_secs(5)).await;
                continue;
            }

            let direction = MOVE_DIRECTIONS[rand::rng().random_range(0..MOVE_DIRECTIONS.len())];
            session.set_movement_intent(direction, true).await;
            sleep(Duration::from_secs(1)).await;
            session.set_movement_intent(direction, false).await;

            let pause = Duration::from_millis(5_000 + rand::rng().random_range(0..5_000));
            sleep(pause).await;
        }
    })
}
