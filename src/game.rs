use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{
    config::GameRules,
    message::Message,
    world::{Connection, DepartureRisk, WorldData},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Success,
    LostHealth,
    LostTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("no airport has an outgoing connection to start from")]
    NoValidStart,
    #[error("at least two airports are needed to pick a target hospital")]
    InsufficientAirports,
    #[error("flight departs from {origin} but the patient is at {current}")]
    InvalidConnection { origin: String, current: String },
    #[error("no clinic at {0}")]
    NoClinicHere(String),
    #[error("unknown airport {0}")]
    UnknownAirport(String),
    #[error("the game is already over")]
    GameOver,
}

/// Read-only inputs every transition needs.
#[derive(Clone, Copy)]
pub struct GameContext<'a> {
    pub world: &'a WorldData,
    pub rules: &'a GameRules,
}

impl<'a> GameContext<'a> {
    pub fn new(world: &'a WorldData, rules: &'a GameRules) -> Self {
        Self { world, rules }
    }
}

/// Messages produced by a single transition, plus whether the game ended.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Turn {
    pub messages: Vec<Message>,
    pub is_over: bool,
}

impl Turn {
    pub fn rendered(&self) -> Vec<String> {
        self.messages.iter().map(ToString::to_string).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskRoll {
    pub risk: Option<DepartureRisk>,
    pub turn: Turn,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    health: f64,
    elapsed_minutes: u32,
    current_airport: String,
    target_airport: String,
    outcome: Option<Outcome>,
}

impl GameState {
    /// Picks a start among airports with an outgoing connection and a
    /// different airport as the target hospital.
    pub fn initialize<R: Rng>(
        ctx: &GameContext<'_>,
        rng: &mut R,
    ) -> Result<(Self, Turn), GameError> {
        let start = ctx
            .world
            .departure_airports()
            .choose(rng)
            .map(|airport| airport.code.clone())
            .ok_or(GameError::NoValidStart)?;

        let candidates: Vec<_> = ctx
            .world
            .airports()
            .iter()
            .filter(|airport| airport.code != start)
            .collect();
        let target = candidates
            .choose(rng)
            .copied()
            .ok_or(GameError::InsufficientAirports)?;

        let state = Self {
            health: ctx.rules.starting_health,
            elapsed_minutes: 0,
            current_airport: start,
            target_airport: target.code.clone(),
            outcome: None,
        };
        let turn = Turn {
            messages: vec![Message::Goal {
                name: target.name.clone(),
                code: target.code.clone(),
            }],
            is_over: false,
        };
        debug!(
            start = %state.current_airport,
            target = %state.target_airport,
            "initialized game"
        );
        Ok((state, turn))
    }

    /// Rebuilds a state from persisted values. Health is capped at the
    /// starting value.
    pub fn restore(
        rules: &GameRules,
        health: f64,
        elapsed_minutes: u32,
        current_airport: impl Into<String>,
        target_airport: impl Into<String>,
        outcome: Option<Outcome>,
    ) -> Self {
        Self {
            health: health.min(rules.starting_health),
            elapsed_minutes,
            current_airport: current_airport.into(),
            target_airport: target_airport.into(),
            outcome,
        }
    }

    pub fn health(&self) -> f64 {
        self.health
    }

    pub fn elapsed_minutes(&self) -> u32 {
        self.elapsed_minutes
    }

    pub fn current_airport(&self) -> &str {
        &self.current_airport
    }

    pub fn target_airport(&self) -> &str {
        &self.target_airport
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    /// First match wins: health, then time, then arrival at the target.
    /// Appends the terminal message to `turn` when the game ends here.
    pub fn evaluate_game_over(&mut self, ctx: &GameContext<'_>, turn: &mut Turn) -> bool {
        if self.outcome.is_none() {
            let outcome = if self.health <= 0.0 {
                Some((Outcome::LostHealth, Message::LostHealth))
            } else if self.elapsed_minutes >= ctx.rules.max_allowed_minutes {
                Some((Outcome::LostTime, Message::LostTime))
            } else if self.current_airport == self.target_airport && self.health > 0.0 {
                Some((Outcome::Success, Message::Success))
            } else {
                None
            };
            if let Some((outcome, message)) = outcome {
                debug!(?outcome, "game over");
                self.outcome = Some(outcome);
                turn.messages.push(message);
            }
        }
        turn.is_over = self.is_over();
        turn.is_over
    }

    /// Rolls the world's departure risks and applies the first one that
    /// triggers, if any.
    pub fn roll_departure_risk<R: Rng>(
        &mut self,
        ctx: &GameContext<'_>,
        rng: &mut R,
    ) -> Result<RiskRoll, GameError> {
        self.ensure_active()?;
        match ctx.world.roll_departure_risk(rng).cloned() {
            Some(risk) => {
                let turn = self.apply_departure_risk(ctx, &risk);
                Ok(RiskRoll {
                    risk: Some(risk),
                    turn,
                })
            }
            None => Ok(RiskRoll {
                risk: None,
                turn: Turn::default(),
            }),
        }
    }

    pub fn apply_departure_risk(&mut self, ctx: &GameContext<'_>, risk: &DepartureRisk) -> Turn {
        self.elapsed_minutes = self
            .elapsed_minutes
            .saturating_add(risk.time_penalty_minutes);
        self.health -= risk.health_penalty;

        let mut turn = Turn {
            messages: vec![Message::RiskTriggered {
                name: risk.name.clone(),
                time_penalty_minutes: risk.time_penalty_minutes,
                health_penalty: risk.health_penalty,
            }],
            is_over: false,
        };
        self.evaluate_game_over(ctx, &mut turn);
        turn
    }

    /// Charges the leg's health and time, then moves the patient unless the
    /// charge alone ended the game.
    pub fn execute_flight(
        &mut self,
        ctx: &GameContext<'_>,
        connection: &Connection,
    ) -> Result<Turn, GameError> {
        self.ensure_active()?;
        if connection.origin != self.current_airport {
            return Err(GameError::InvalidConnection {
                origin: connection.origin.clone(),
                current: self.current_airport.clone(),
            });
        }

        let health_cost = connection.health_cost();
        self.health -= health_cost;
        self.elapsed_minutes = self
            .elapsed_minutes
            .saturating_add(connection.travel_time_minutes);

        let mut turn = Turn::default();
        if self.evaluate_game_over(ctx, &mut turn) {
            return Ok(turn);
        }

        self.current_airport = connection.destination.clone();
        let name = ctx
            .world
            .airport(&connection.destination)
            .map(|airport| airport.name.clone())
            .unwrap_or_else(|| connection.destination.clone());
        turn.messages.push(Message::Arrival {
            name,
            code: connection.destination.clone(),
            health_cost,
        });
        self.evaluate_game_over(ctx, &mut turn);
        Ok(turn)
    }

    pub fn execute_healing(&mut self, ctx: &GameContext<'_>) -> Result<Turn, GameError> {
        self.ensure_active()?;
        let airport = ctx
            .world
            .airport(&self.current_airport)
            .ok_or_else(|| GameError::UnknownAirport(self.current_airport.clone()))?;
        let clinic = airport
            .clinic
            .ok_or_else(|| GameError::NoClinicHere(self.current_airport.clone()))?;

        let minutes = (ctx.rules.base_healing_minutes as f64 * clinic.time_factor).round() as u32;
        let before = self.health;
        self.elapsed_minutes = self.elapsed_minutes.saturating_add(minutes);
        self.health = (self.health + clinic.healing_amount).min(ctx.rules.starting_health);

        let mut turn = Turn {
            messages: vec![Message::Healed {
                health_gain: self.health - before,
                minutes,
            }],
            is_over: false,
        };
        self.evaluate_game_over(ctx, &mut turn);
        Ok(turn)
    }

    fn ensure_active(&self) -> Result<(), GameError> {
        if self.is_over() {
            Err(GameError::GameOver)
        } else {
            Ok(())
        }
    }
}
