pub mod config;
pub mod game;
pub mod message;
pub mod rng;
pub mod scenario;
pub mod session;
pub mod store;
pub mod web;
pub mod world;

pub use config::{AppConfig, GameRules};
pub use game::{GameContext, GameError, GameState, Outcome, Turn};
pub use session::{Action, SessionFacade, SessionSnapshot};
pub use world::WorldData;
