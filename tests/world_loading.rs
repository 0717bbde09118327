use flight_to_heal::{
    config::{AppConfig, GameRules},
    game::{GameContext, GameState},
    scenario::WorldLoader,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn loader() -> WorldLoader {
    WorldLoader::new(env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn bundled_world_loads_and_is_consistent() {
    let world = loader().load("worlds/default.yaml").unwrap();
    assert_eq!(world.airport_count(), 9);
    assert_eq!(world.all_departure_risks().len(), 3);

    for connection in world.connections() {
        assert!(world.airport(&connection.origin).is_some());
        assert!(world.airport(&connection.destination).is_some());
        assert_ne!(connection.origin, connection.destination);
    }

    let doha = world.airport("OTHH").unwrap();
    assert!(doha.has_clinic());
    let leg = world.connection_between("OTHH", "EGLL").unwrap();
    assert!((leg.health_cost() - 18.9).abs() < 1e-9);
}

#[test]
fn games_start_on_a_departure_airport() {
    let world = loader().load("worlds/default.yaml").unwrap();
    let rules = GameRules::default();
    let ctx = GameContext::new(&world, &rules);

    for seed in 0..32 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let (state, turn) = GameState::initialize(&ctx, &mut rng).unwrap();
        assert_ne!(state.current_airport(), state.target_airport());
        assert!(world.connections_from(state.current_airport()).next().is_some());
        assert_eq!(state.health(), 75.0);
        assert_eq!(turn.messages.len(), 1);
    }
}

#[test]
fn bundled_config_points_at_bundled_world() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/flight_to_heal.yaml");
    let config = AppConfig::load(&path).unwrap();
    assert_eq!(config.rules, GameRules::default());
    assert!(config.seed.is_none());
    assert!(loader().load(&config.world.path).is_ok());
}
