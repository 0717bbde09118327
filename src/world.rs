use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Clinic {
    pub healing_amount: f64,
    pub time_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub code: String,
    pub name: String,
    pub continent: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub clinic: Option<Clinic>,
}

impl Airport {
    pub fn has_clinic(&self) -> bool {
        self.clinic.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub origin: String,
    pub destination: String,
    pub travel_time_minutes: u32,
    pub health_cost_per_minute: f64,
}

impl Connection {
    /// Total health drained by flying this leg.
    pub fn health_cost(&self) -> f64 {
        self.travel_time_minutes as f64 * self.health_cost_per_minute
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartureRisk {
    pub name: String,
    pub probability: f64,
    pub time_penalty_minutes: u32,
    pub health_penalty: f64,
}

/// Read-only catalog shared by every session.
///
/// Connections keep insertion order; callers looking up a route use the
/// first match. The loader guarantees that every connection references a
/// known airport, this type does not re-check it.
#[derive(Debug, Clone, Default)]
pub struct WorldData {
    airports: Vec<Airport>,
    index: HashMap<String, usize>,
    connections: Vec<Connection>,
    departure_risks: Vec<DepartureRisk>,
}

impl WorldData {
    pub fn new(
        airports: Vec<Airport>,
        connections: Vec<Connection>,
        departure_risks: Vec<DepartureRisk>,
    ) -> Self {
        let index = airports
            .iter()
            .enumerate()
            .map(|(position, airport)| (airport.code.clone(), position))
            .collect();
        Self {
            airports,
            index,
            connections,
            departure_risks,
        }
    }

    pub fn airport(&self, code: &str) -> Option<&Airport> {
        self.index.get(code).map(|&position| &self.airports[position])
    }

    pub fn airports(&self) -> &[Airport] {
        &self.airports
    }

    pub fn airport_count(&self) -> usize {
        self.airports.len()
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn connections_from<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Connection> {
        self.connections
            .iter()
            .filter(move |connection| connection.origin == code)
    }

    pub fn connection_between(&self, origin: &str, destination: &str) -> Option<&Connection> {
        self.connections.iter().find(|connection| {
            connection.origin == origin && connection.destination == destination
        })
    }

    pub fn all_departure_risks(&self) -> &[DepartureRisk] {
        &self.departure_risks
    }

    /// Airports with at least one outgoing connection, in catalog order.
    pub fn departure_airports(&self) -> Vec<&Airport> {
        self.airports
            .iter()
            .filter(|airport| self.connections_from(&airport.code).next().is_some())
            .collect()
    }

    /// Draws one uniform value per risk, in list order, and returns the first
    /// risk whose draw falls strictly below its probability.
    pub fn roll_departure_risk<R: Rng>(&self, rng: &mut R) -> Option<&DepartureRisk> {
        self.departure_risks
            .iter()
            .find(|risk| rng.gen::<f64>() < risk.probability)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn airport(code: &str) -> Airport {
        Airport {
            code: code.into(),
            name: format!("{code} International"),
            continent: "Asia".into(),
            country: "Nowhere".into(),
            latitude: 0.0,
            longitude: 0.0,
            clinic: None,
        }
    }

    fn connection(origin: &str, destination: &str, minutes: u32) -> Connection {
        Connection {
            origin: origin.into(),
            destination: destination.into(),
            travel_time_minutes: minutes,
            health_cost_per_minute: 0.01,
        }
    }

    fn risk(name: &str, probability: f64) -> DepartureRisk {
        DepartureRisk {
            name: name.into(),
            probability,
            time_penalty_minutes: 10,
            health_penalty: 1.0,
        }
    }

    #[test]
    fn lookups_follow_insertion_order() {
        let world = WorldData::new(
            vec![airport("AAAA"), airport("BBBB"), airport("CCCC")],
            vec![
                connection("AAAA", "BBBB", 100),
                connection("BBBB", "CCCC", 50),
                connection("AAAA", "CCCC", 200),
                connection("AAAA", "BBBB", 999),
            ],
            Vec::new(),
        );

        assert_eq!(world.airport("BBBB").map(|a| a.code.as_str()), Some("BBBB"));
        assert!(world.airport("ZZZZ").is_none());

        let destinations: Vec<_> = world
            .connections_from("AAAA")
            .map(|c| c.destination.as_str())
            .collect();
        assert_eq!(destinations, vec!["BBBB", "CCCC", "BBBB"]);

        let first = world.connection_between("AAAA", "BBBB").unwrap();
        assert_eq!(first.travel_time_minutes, 100);
        assert!(world.connection_between("CCCC", "AAAA").is_none());
    }

    #[test]
    fn departure_airports_require_an_outgoing_leg() {
        let world = WorldData::new(
            vec![airport("AAAA"), airport("BBBB"), airport("CCCC")],
            vec![connection("BBBB", "CCCC", 50)],
            Vec::new(),
        );
        let codes: Vec<_> = world
            .departure_airports()
            .into_iter()
            .map(|a| a.code.as_str())
            .collect();
        assert_eq!(codes, vec!["BBBB"]);
    }

    #[test]
    fn certain_risk_wins_over_later_certain_risks() {
        let world = WorldData::new(
            vec![airport("AAAA"), airport("BBBB")],
            Vec::new(),
            vec![risk("Fog", 1.0), risk("Strike", 1.0)],
        );
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..64 {
            let triggered = world.roll_departure_risk(&mut rng).unwrap();
            assert_eq!(triggered.name, "Fog");
        }
    }

    #[test]
    fn impossible_risks_never_trigger() {
        let world = WorldData::new(
            vec![airport("AAAA"), airport("BBBB")],
            Vec::new(),
            vec![risk("Fog", 0.0), risk("Strike", 0.0)],
        );
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        assert!((0..64).all(|_| world.roll_departure_risk(&mut rng).is_none()));
    }

    #[test]
    fn health_cost_scales_with_duration() {
        let leg = Connection {
            origin: "OTHH".into(),
            destination: "EGLL".into(),
            travel_time_minutes: 420,
            health_cost_per_minute: 0.045,
        };
        assert!((leg.health_cost() - 18.9).abs() < 1e-9);
    }
}
