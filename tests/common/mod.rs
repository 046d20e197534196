//! Shared test doubles: a scripted connector and recording sessions.

#![allow(dead_code)]

use async_trait::async_trait;
use craft_fleet::config::FleetConfig;
use craft_fleet::fleet::actor::{FleetActor, FleetHandle};
use craft_fleet::identity::Identity;
use craft_fleet::session::{
    Connector, GameSession, MoveDirection, SessionError, SessionEvent, TargetState,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Duration;

/// An action the fleet performed against a fake session
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Chat(String),
    Quit(String),
    Equip(String),
    Attack(String),
    StopAttack,
    Move(MoveDirection, bool),
    Pursue(String, f64),
}

/// Recording stand-in for a live game session
pub struct FakeSession {
    pub identity: Identity,
    actions: Mutex<Vec<Action>>,
    alive: Mutex<bool>,
    inventory: Mutex<Vec<String>>,
    targets: Mutex<HashMap<String, TargetState>>,
}

impl FakeSession {
    fn new(identity: Identity) -> Self {
        Self {
            identity,
            actions: Mutex::new(Vec::new()),
            alive: Mutex::new(true),
            inventory: Mutex::new(Vec::new()),
            targets: Mutex::new(HashMap::new()),
        }
    }

    /// Everything the fleet did to this session, in order
    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    /// Chat lines only, in order
    pub fn chats(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|action| match action {
                Action::Chat(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn quit_reasons(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|action| match action {
                Action::Quit(reason) => Some(reason),
                _ => None,
            })
            .collect()
    }

    pub fn set_inventory(&self, items: &[&str]) {
        *self.inventory.lock().unwrap() = items.iter().map(|item| item.to_string()).collect();
    }

    pub fn set_target(&self, name: &str, health: f64, distance: f64) {
        self.targets
            .lock()
            .unwrap()
            .insert(name.to_string(), TargetState { health, distance });
    }

    pub fn clear_target(&self, name: &str) {
        self.targets.lock().unwrap().remove(name);
    }

    pub fn set_alive(&self, alive: bool) {
        *self.alive.lock().unwrap() = alive;
    }
}

#[async_trait]
impl GameSession for FakeSession {
    async fn chat(&self, text: &str) {
        self.actions
            .lock()
            .unwrap()
            .push(Action::Chat(text.to_string()));
    }

    async fn quit(&self, reason: &str) {
        *self.alive.lock().unwrap() = false;
        self.actions
            .lock()
            .unwrap()
            .push(Action::Quit(reason.to_string()));
    }

    async fn equip(&self, item: &str) {
        self.actions
            .lock()
            .unwrap()
            .push(Action::Equip(item.to_string()));
    }

    async fn attack(&self, target: &str) {
        self.actions
            .lock()
            .unwrap()
            .push(Action::Attack(target.to_string()));
    }

    async fn stop_attack(&self) {
        self.actions.lock().unwrap().push(Action::StopAttack);
    }

    async fn set_movement_intent(&self, direction: MoveDirection, active: bool) {
        self.actions
            .lock()
            .unwrap()
            .push(Action::Move(direction, active));
    }

    async fn pursue(&self, target: &str, distance: f64) {
        self.actions
            .lock()
            .unwrap()
            .push(Action::Pursue(target.to_string(), distance));
    }

    async fn inventory_items(&self) -> Vec<String> {
        self.inventory.lock().unwrap().clone()
    }

    async fn self_alive(&self) -> bool {
        *self.alive.lock().unwrap()
    }

    async fn target_state(&self, name: &str) -> Option<TargetState> {
        self.targets.lock().unwrap().get(name).copied()
    }
}

/// One recorded connect: the session handed out plus the event channel the
/// test drives
#[derive(Clone)]
pub struct Link {
    pub session: Arc<FakeSession>,
    pub events: mpsc::Sender<SessionEvent>,
    pub host: String,
    pub port: u16,
}

/// Connector that records every connect and hands out fake sessions
#[derive(Default)]
pub struct FakeConnector {
    links: Mutex<Vec<Link>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of connects seen so far
    pub fn count(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    /// The nth connect, in connect order
    pub fn link(&self, index: usize) -> Link {
        self.links.lock().unwrap()[index].clone()
    }

    /// Deliver a session event on the nth connection. Silently dropped if
    /// the fleet already tore the session down.
    pub async fn emit(&self, index: usize, event: SessionEvent) {
        let sender = self.links.lock().unwrap()[index].events.clone();
        let _ = sender.send(event).await;
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        identity: &Identity,
        _protocol_version: &str,
    ) -> Result<(Arc<dyn GameSession>, mpsc::Receiver<SessionEvent>), SessionError> {
        let (events, inbox) = mpsc::channel(64);
        let session = Arc::new(FakeSession::new(identity.clone()));
        self.links.lock().unwrap().push(Link {
            session: session.clone(),
            events,
            host: host.to_string(),
            port,
        });
        Ok((session, inbox))
    }
}

/// Fleet configuration suitable for deterministic tests
pub fn test_config() -> FleetConfig {
    let mut config = FleetConfig::default();
    config.initial_slots = 0;
    config.settings.anti_idle = false;
    config
}

/// Spawn a fleet actor wired to a fake connector
pub fn spawn_fleet(config: FleetConfig) -> (FleetHandle, Arc<FakeConnector>) {
    let connector = Arc::new(FakeConnector::new());
    let (actor, handle) = FleetActor::new(config, connector.clone());
    tokio::spawn(actor.run());
    (handle, connector)
}

/// Let queued messages drain through the actor (auto-advances paused time)
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}
