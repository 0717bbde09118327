//! Session layer: snapshot conversion and action dispatch.
//!
//! Every request loads one snapshot, applies at most one game transition and
//! writes the snapshot back. The flight protocol is two-phase: a risk check
//! records a [`PendingFlight`] on the snapshot, and a later confirm or cancel
//! resolves it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    config::GameRules,
    game::{GameContext, GameError, GameState, Outcome},
    message::Message,
    rng::RngManager,
    store::{SessionRecord, SessionStore, StoreError},
    world::{Connection, DepartureRisk, WorldData},
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    /// The world cannot host a game at all.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SessionError::Game(GameError::NoValidStart | GameError::InsufficientAirports)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingFlight {
    pub destination: String,
    pub travel_time_minutes: u32,
    pub health_cost_per_minute: f64,
}

impl PendingFlight {
    fn from_connection(connection: &Connection) -> Self {
        Self {
            destination: connection.destination.clone(),
            travel_time_minutes: connection.travel_time_minutes,
            health_cost_per_minute: connection.health_cost_per_minute,
        }
    }

    fn departing_from(&self, origin: &str) -> Connection {
        Connection {
            origin: origin.to_string(),
            destination: self.destination.clone(),
            travel_time_minutes: self.travel_time_minutes,
            health_cost_per_minute: self.health_cost_per_minute,
        }
    }
}

/// Transport-neutral form of a session's game state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub health: f64,
    pub elapsed_minutes: u32,
    pub current_airport: String,
    pub target_airport: String,
    #[serde(default)]
    pub messages: Vec<String>,
    #[serde(default)]
    pub is_over: bool,
    #[serde(default)]
    pub outcome: Option<Outcome>,
    #[serde(default)]
    pub pending_flight: Option<PendingFlight>,
}

impl SessionSnapshot {
    pub fn capture(
        state: &GameState,
        messages: Vec<String>,
        pending_flight: Option<PendingFlight>,
    ) -> Self {
        Self {
            health: state.health(),
            elapsed_minutes: state.elapsed_minutes(),
            current_airport: state.current_airport().to_string(),
            target_airport: state.target_airport().to_string(),
            messages,
            is_over: state.is_over(),
            outcome: state.outcome(),
            pending_flight,
        }
    }

    /// The outcome is authoritative; a stale `is_over` flag is ignored.
    pub fn restore(&self, rules: &GameRules) -> GameState {
        if self.is_over != self.outcome.is_some() {
            warn!(
                is_over = self.is_over,
                outcome = ?self.outcome,
                "snapshot over-flag disagrees with outcome"
            );
        }
        GameState::restore(
            rules,
            self.health,
            self.elapsed_minutes,
            self.current_airport.clone(),
            self.target_airport.clone(),
            self.outcome,
        )
    }

    pub fn take_messages(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages)
    }
}

/// A player action on an existing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Action {
    RiskCheck { destination: String },
    ConfirmFlight,
    CancelFlight,
    Heal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskDetails {
    pub name: String,
    pub time_penalty_minutes: u32,
    pub health_penalty: f64,
}

impl From<&DepartureRisk> for RiskDetails {
    fn from(risk: &DepartureRisk) -> Self {
        Self {
            name: risk.name.clone(),
            time_penalty_minutes: risk.time_penalty_minutes,
            health_penalty: round2(risk.health_penalty),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSummary {
    pub health: f64,
    pub time_total: u32,
    pub time_remaining: u32,
    pub current_code: String,
    pub current_name: String,
    pub target_code: String,
    pub target_name: String,
    pub is_clinic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightOption {
    pub id: usize,
    pub destination: String,
    pub destination_name: String,
    pub time: u32,
    pub health_loss: f64,
}

/// What the player sees after every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusView {
    pub status: StatusSummary,
    pub options: Vec<FlightOption>,
    pub messages: Vec<String>,
    pub game_over: bool,
    pub outcome: Option<Outcome>,
    pub pending_flight: Option<PendingFlight>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResponse {
    pub session_id: String,
    pub risk: Option<RiskDetails>,
    pub status: StatusView,
}

pub struct SessionFacade<S> {
    world: Arc<WorldData>,
    rules: GameRules,
    store: S,
    rng: RngManager,
    ttl: Duration,
}

impl<S: SessionStore> SessionFacade<S> {
    pub fn new(
        world: Arc<WorldData>,
        rules: GameRules,
        store: S,
        rng: RngManager,
        ttl: Duration,
    ) -> Self {
        Self {
            world,
            rules,
            store,
            rng,
            ttl,
        }
    }

    pub fn world(&self) -> &WorldData {
        &self.world
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Opens a new session with a freshly initialized game.
    pub fn start(&mut self) -> Result<ActionResponse, SessionError> {
        let now = Utc::now();
        for key in self.store.purge_expired(now - self.ttl)? {
            info!(session = %key, "expired session purged");
            self.rng.forget(&key);
        }

        // a seeded master replays ids after a restart; never reuse a stored one
        let mut key = self.rng.next_session_key();
        while self.store.load(&key)?.is_some() {
            key = self.rng.next_session_key();
        }
        let ctx = GameContext::new(&self.world, &self.rules);
        let (state, turn) = GameState::initialize(&ctx, &mut self.rng.stream(&key))?;
        info!(
            session = %key,
            start = state.current_airport(),
            target = state.target_airport(),
            "session started"
        );

        let messages = turn.rendered();
        let status = self.status_view(&state, messages, None)?;
        self.persist(&key, SessionSnapshot::capture(&state, Vec::new(), None), now)?;
        Ok(ActionResponse {
            session_id: key,
            risk: None,
            status,
        })
    }

    /// Reads the current status, draining any unread messages.
    pub fn status(&mut self, key: &str) -> Result<StatusView, SessionError> {
        let now = Utc::now();
        let mut snapshot = self.load(key, now)?;
        let messages = snapshot.take_messages();
        let state = snapshot.restore(&self.rules);
        let status = self.status_view(&state, messages, snapshot.pending_flight.clone())?;
        self.persist(key, snapshot, now)?;
        Ok(status)
    }

    /// Applies one player action. Finished games are returned unchanged.
    pub fn dispatch(&mut self, key: &str, action: Action) -> Result<ActionResponse, SessionError> {
        let now = Utc::now();
        let mut snapshot = self.load(key, now)?;
        let mut messages = snapshot.take_messages();
        let mut pending = snapshot.pending_flight.take();
        let mut state = snapshot.restore(&self.rules);
        let mut risk = None;

        if !state.is_over() {
            let ctx = GameContext::new(&self.world, &self.rules);
            match action {
                Action::RiskCheck { destination } => {
                    match self
                        .world
                        .connection_between(state.current_airport(), &destination)
                    {
                        None => {
                            messages.push(Message::InvalidFlight { destination }.to_string());
                        }
                        Some(connection) => {
                            let roll =
                                state.roll_departure_risk(&ctx, &mut self.rng.stream(key))?;
                            messages.extend(roll.turn.rendered());
                            pending = if roll.turn.is_over {
                                None
                            } else {
                                Some(PendingFlight::from_connection(connection))
                            };
                            match roll.risk {
                                Some(triggered) => {
                                    info!(session = %key, risk = %triggered.name, "departure risk triggered");
                                    risk = Some(RiskDetails::from(&triggered));
                                }
                                None => messages.push(
                                    Message::ClearForDeparture {
                                        destination: connection.destination.clone(),
                                    }
                                    .to_string(),
                                ),
                            }
                        }
                    }
                }
                Action::ConfirmFlight => match pending.take() {
                    Some(flight) => {
                        let connection = flight.departing_from(state.current_airport());
                        let turn = state.execute_flight(&ctx, &connection)?;
                        messages.extend(turn.rendered());
                    }
                    None => messages.push(Message::NoPendingFlight.to_string()),
                },
                Action::CancelFlight => match pending.take() {
                    Some(_) => messages.push(Message::FlightCancelled.to_string()),
                    None => messages.push(Message::NoPendingFlight.to_string()),
                },
                Action::Heal => match state.execute_healing(&ctx) {
                    Ok(turn) => {
                        pending = None;
                        messages.extend(turn.rendered());
                    }
                    Err(GameError::NoClinicHere(_)) => {
                        messages.push(Message::NoClinicHere.to_string());
                    }
                    Err(err) => return Err(err.into()),
                },
            }

            if let Some(outcome) = state.outcome() {
                info!(session = %key, ?outcome, minutes = state.elapsed_minutes(), "game finished");
                self.rng.forget(key);
            }
        }

        let status = self.status_view(&state, messages, pending.clone())?;
        self.persist(key, SessionSnapshot::capture(&state, Vec::new(), pending), now)?;
        Ok(ActionResponse {
            session_id: key.to_string(),
            risk,
            status,
        })
    }

    fn load(&mut self, key: &str, now: DateTime<Utc>) -> Result<SessionSnapshot, SessionError> {
        let record = self
            .store
            .load(key)?
            .ok_or_else(|| SessionError::NotFound(key.to_string()))?;
        if record.touched_at < now - self.ttl {
            warn!(session = %key, "session expired");
            self.store.remove(key)?;
            self.rng.forget(key);
            return Err(SessionError::NotFound(key.to_string()));
        }
        Ok(record.snapshot)
    }

    fn persist(
        &mut self,
        key: &str,
        snapshot: SessionSnapshot,
        now: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        let record = SessionRecord {
            snapshot,
            touched_at: now,
        };
        self.store.save(key, &record)?;
        Ok(())
    }

    fn status_view(
        &self,
        state: &GameState,
        messages: Vec<String>,
        pending_flight: Option<PendingFlight>,
    ) -> Result<StatusView, SessionError> {
        let current = self
            .world
            .airport(state.current_airport())
            .ok_or_else(|| GameError::UnknownAirport(state.current_airport().to_string()))?;
        let target = self
            .world
            .airport(state.target_airport())
            .ok_or_else(|| GameError::UnknownAirport(state.target_airport().to_string()))?;

        let options = self
            .world
            .connections_from(state.current_airport())
            .enumerate()
            .map(|(position, connection)| FlightOption {
                id: position + 1,
                destination: connection.destination.clone(),
                destination_name: self
                    .world
                    .airport(&connection.destination)
                    .map(|airport| airport.name.clone())
                    .unwrap_or_default(),
                time: connection.travel_time_minutes,
                health_loss: round2(connection.health_cost()),
            })
            .collect();

        Ok(StatusView {
            status: StatusSummary {
                health: round2(state.health()),
                time_total: state.elapsed_minutes(),
                time_remaining: self
                    .rules
                    .max_allowed_minutes
                    .saturating_sub(state.elapsed_minutes()),
                current_code: current.code.clone(),
                current_name: current.name.clone(),
                target_code: target.code.clone(),
                target_name: target.name.clone(),
                is_clinic: current.has_clinic(),
            },
            options,
            messages,
            game_over: state.is_over(),
            outcome: state.outcome(),
            pending_flight,
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemorySessionStore;

    fn snapshot_json() -> &'static str {
        r#"{
            "health": 42.5,
            "elapsed_minutes": 300,
            "current_airport": "EGLL",
            "target_airport": "KJFK"
        }"#
    }

    #[test]
    fn partial_snapshot_gets_defaults() {
        let snapshot: SessionSnapshot = serde_json::from_str(snapshot_json()).unwrap();
        assert!(snapshot.messages.is_empty());
        assert!(!snapshot.is_over);
        assert!(snapshot.outcome.is_none());
        assert!(snapshot.pending_flight.is_none());

        let state = snapshot.restore(&GameRules::default());
        assert_eq!(state.health(), 42.5);
        assert_eq!(state.current_airport(), "EGLL");
        assert!(!state.is_over());
    }

    #[test]
    fn outcome_serializes_in_upper_snake_case() {
        let rules = GameRules::default();
        let state = GameState::restore(&rules, 0.0, 10, "OTHH", "EGLL", Some(Outcome::LostHealth));
        let json = serde_json::to_value(SessionSnapshot::capture(&state, Vec::new(), None)).unwrap();
        assert_eq!(json["outcome"], "LOST_HEALTH");
        assert_eq!(json["is_over"], true);
    }

    #[test]
    fn outcome_decides_over_flag_on_restore() {
        let mut snapshot: SessionSnapshot = serde_json::from_str(snapshot_json()).unwrap();
        snapshot.is_over = true;
        assert!(!snapshot.restore(&GameRules::default()).is_over());
    }

    #[test]
    fn actions_parse_from_tagged_json() {
        let action: Action =
            serde_json::from_str(r#"{"action": "risk-check", "destination": "EGLL"}"#).unwrap();
        assert_eq!(
            action,
            Action::RiskCheck {
                destination: "EGLL".into()
            }
        );
        let action: Action = serde_json::from_str(r#"{"action": "heal"}"#).unwrap();
        assert_eq!(action, Action::Heal);
    }

    #[test]
    fn unknown_session_is_reported() {
        let mut facade = SessionFacade::new(
            Arc::new(crate::scenario::emergency_world()),
            GameRules::default(),
            InMemorySessionStore::new(),
            RngManager::new(1),
            Duration::minutes(60),
        );
        assert!(matches!(
            facade.status("nope"),
            Err(SessionError::NotFound(_))
        ));
        assert!(matches!(
            facade.dispatch("nope", Action::Heal),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn rounding_keeps_two_decimals() {
        assert_eq!(round2(18.900000000000002), 18.9);
        assert_eq!(round2(56.099999999), 56.1);
    }
}
