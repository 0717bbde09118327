use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::world::{Airport, Clinic, Connection, DepartureRisk, WorldData};

fn default_unknown() -> String {
    "Unknown".to_string()
}

fn default_time_factor() -> f64 {
    1.0
}

/// False for NaN and infinities as well as negatives.
fn non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

/// A world that cannot be used to start a game. Fatal for session creation.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("failed to read world file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse world file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("world validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorldFile {
    pub airports: Vec<AirportEntry>,
    #[serde(default)]
    pub connections: Vec<ConnectionEntry>,
    #[serde(default)]
    pub departure_risks: Vec<RiskEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AirportEntry {
    pub code: String,
    pub name: String,
    #[serde(default = "default_unknown")]
    pub continent: String,
    #[serde(default = "default_unknown")]
    pub country: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub clinic: Option<ClinicEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClinicEntry {
    #[serde(default)]
    pub healing: f64,
    #[serde(default = "default_time_factor")]
    pub time_factor: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionEntry {
    pub from: String,
    pub to: String,
    pub minutes: u32,
    pub health_cost_per_minute: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskEntry {
    pub name: String,
    pub probability: f64,
    #[serde(default)]
    pub time_penalty_minutes: u32,
    #[serde(default)]
    pub health_penalty: f64,
}

impl WorldFile {
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Checks every precondition the game engine relies on.
    pub fn validate(&self) -> Result<(), WorldError> {
        if self.airports.len() < 2 {
            return Err(WorldError::Validation(
                "world must define at least two airports".into(),
            ));
        }

        let mut known = HashSet::new();
        for airport in &self.airports {
            if !known.insert(airport.code.as_str()) {
                return Err(WorldError::Validation(format!(
                    "airport code {} defined more than once",
                    airport.code
                )));
            }
            if let Some(clinic) = &airport.clinic {
                if !non_negative(clinic.healing) || !non_negative(clinic.time_factor) {
                    return Err(WorldError::Validation(format!(
                        "clinic at {} has a negative or non-finite healing or time factor",
                        airport.code
                    )));
                }
            }
        }

        if self.connections.is_empty() {
            return Err(WorldError::Validation(
                "world must define at least one connection".into(),
            ));
        }

        for connection in &self.connections {
            for code in [&connection.from, &connection.to] {
                if !known.contains(code.as_str()) {
                    return Err(WorldError::Validation(format!(
                        "connection {} -> {} references unknown airport {}",
                        connection.from, connection.to, code
                    )));
                }
            }
            if connection.minutes == 0 {
                return Err(WorldError::Validation(format!(
                    "connection {} -> {} must take at least one minute",
                    connection.from, connection.to
                )));
            }
            if !non_negative(connection.health_cost_per_minute) {
                return Err(WorldError::Validation(format!(
                    "connection {} -> {} has a negative or non-finite health cost",
                    connection.from, connection.to
                )));
            }
        }

        for risk in &self.departure_risks {
            if !(0.0..=1.0).contains(&risk.probability) {
                return Err(WorldError::Validation(format!(
                    "departure risk '{}' probability {} is outside [0, 1]",
                    risk.name, risk.probability
                )));
            }
            if !non_negative(risk.health_penalty) {
                return Err(WorldError::Validation(format!(
                    "departure risk '{}' has a negative or non-finite health penalty",
                    risk.name
                )));
            }
        }

        Ok(())
    }

    pub fn build_world(&self) -> WorldData {
        let airports = self
            .airports
            .iter()
            .map(|entry| Airport {
                code: entry.code.clone(),
                name: entry.name.clone(),
                continent: entry.continent.clone(),
                country: entry.country.clone(),
                latitude: entry.latitude,
                longitude: entry.longitude,
                clinic: entry.clinic.as_ref().map(|clinic| Clinic {
                    healing_amount: clinic.healing,
                    time_factor: clinic.time_factor,
                }),
            })
            .collect();
        let connections = self
            .connections
            .iter()
            .map(|entry| Connection {
                origin: entry.from.clone(),
                destination: entry.to.clone(),
                travel_time_minutes: entry.minutes,
                health_cost_per_minute: entry.health_cost_per_minute,
            })
            .collect();
        let risks = self
            .departure_risks
            .iter()
            .map(|entry| DepartureRisk {
                name: entry.name.clone(),
                probability: entry.probability,
                time_penalty_minutes: entry.time_penalty_minutes,
                health_penalty: entry.health_penalty,
            })
            .collect();
        WorldData::new(airports, connections, risks)
    }
}

pub struct WorldLoader {
    base_dir: PathBuf,
}

impl WorldLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<WorldData, WorldError> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path).map_err(|source| WorldError::Io {
            path: path.clone(),
            source,
        })?;
        let world_file =
            WorldFile::from_yaml_str(&data).map_err(|source| WorldError::Parse {
                path: path.clone(),
                source,
            })?;
        world_file.validate()?;
        let world = world_file.build_world();
        info!(
            path = %path.display(),
            airports = world.airport_count(),
            connections = world.connections().len(),
            "loaded world"
        );
        Ok(world)
    }

    /// Like [`WorldLoader::load`], but substitutes the built-in emergency
    /// world when the file is unusable.
    pub fn load_or_fallback(&self, file: impl AsRef<Path>) -> WorldData {
        match self.load(file) {
            Ok(world) => world,
            Err(err) => {
                warn!(error = %err, "falling back to the built-in emergency world");
                emergency_world()
            }
        }
    }
}

/// Minimal five-airport world used when no world file can be loaded.
pub fn emergency_world() -> WorldData {
    let clinic = |healing_amount, time_factor| {
        Some(Clinic {
            healing_amount,
            time_factor,
        })
    };
    let airport = |code: &str, name: &str, continent: &str, country: &str, lat, lon, clinic| {
        Airport {
            code: code.into(),
            name: name.into(),
            continent: continent.into(),
            country: country.into(),
            latitude: lat,
            longitude: lon,
            clinic,
        }
    };
    let leg = |origin: &str, destination: &str, minutes, cost| Connection {
        origin: origin.into(),
        destination: destination.into(),
        travel_time_minutes: minutes,
        health_cost_per_minute: cost,
    };

    WorldData::new(
        vec![
            airport(
                "OTHH",
                "Hamad International Airport",
                "Asia",
                "Qatar",
                25.2735,
                51.6083,
                clinic(25.0, 0.75),
            ),
            airport(
                "EGLL",
                "London Heathrow Airport",
                "Europe",
                "United Kingdom",
                51.47,
                -0.4543,
                clinic(20.0, 0.50),
            ),
            airport(
                "KJFK",
                "John F. Kennedy Airport",
                "North America",
                "United States",
                40.6413,
                -73.7781,
                None,
            ),
            airport(
                "WSSS",
                "Singapore Changi Airport",
                "Asia",
                "Singapore",
                1.3644,
                103.9915,
                clinic(15.0, 0.80),
            ),
            airport(
                "PADD",
                "Addu International Airport",
                "Asia",
                "Maldives",
                0.6974,
                73.1581,
                None,
            ),
        ],
        vec![
            leg("OTHH", "EGLL", 420, 0.045),
            leg("OTHH", "WSSS", 460, 0.040),
            leg("EGLL", "KJFK", 450, 0.055),
            leg("WSSS", "EGLL", 700, 0.050),
            leg("OTHH", "PADD", 240, 0.035),
            leg("PADD", "OTHH", 240, 0.035),
        ],
        vec![DepartureRisk {
            name: "Weather Delay".into(),
            probability: 0.50,
            time_penalty_minutes: 60,
            health_penalty: 4.80,
        }],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_AIRPORTS: &str = r#"
airports:
  - code: AAAA
    name: Alpha
    clinic:
      healing: 10.0
  - code: BBBB
    name: Bravo
connections:
  - from: AAAA
    to: BBBB
    minutes: 90
    health_cost_per_minute: 0.02
departure_risks:
  - name: Fog
    probability: 0.25
    time_penalty_minutes: 30
    health_penalty: 2.0
"#;

    #[test]
    fn parses_and_builds_world() {
        let file = WorldFile::from_yaml_str(TWO_AIRPORTS).unwrap();
        file.validate().unwrap();
        let world = file.build_world();

        let alpha = world.airport("AAAA").unwrap();
        assert_eq!(alpha.continent, "Unknown");
        let clinic = alpha.clinic.unwrap();
        assert_eq!(clinic.healing_amount, 10.0);
        assert_eq!(clinic.time_factor, 1.0);
        assert!(!world.airport("BBBB").unwrap().has_clinic());
        assert_eq!(world.connections_from("AAAA").count(), 1);
        assert_eq!(world.all_departure_risks()[0].name, "Fog");
    }

    #[test]
    fn rejects_unknown_connection_endpoint() {
        let yaml = TWO_AIRPORTS.replace("to: BBBB", "to: CCCC");
        let file = WorldFile::from_yaml_str(&yaml).unwrap();
        let err = file.validate().unwrap_err();
        assert!(err.to_string().contains("unknown airport CCCC"));
    }

    #[test]
    fn rejects_single_airport_world() {
        let yaml = r#"
airports:
  - code: AAAA
    name: Alpha
connections:
  - from: AAAA
    to: AAAA
    minutes: 10
    health_cost_per_minute: 0.0
"#;
        let file = WorldFile::from_yaml_str(yaml).unwrap();
        assert!(matches!(file.validate(), Err(WorldError::Validation(_))));
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let yaml = TWO_AIRPORTS.replace("probability: 0.25", "probability: 1.5");
        let file = WorldFile::from_yaml_str(&yaml).unwrap();
        assert!(file.validate().is_err());
    }

    #[test]
    fn rejects_nan_costs() {
        let cases = [
            ("health_cost_per_minute: 0.02", "health_cost_per_minute: .nan"),
            ("health_penalty: 2.0", "health_penalty: .nan"),
            ("healing: 10.0", "healing: .nan"),
            ("healing: 10.0", "healing: 10.0\n      time_factor: .nan"),
            ("probability: 0.25", "probability: .nan"),
            ("health_cost_per_minute: 0.02", "health_cost_per_minute: .inf"),
        ];
        for (from, to) in cases {
            let yaml = TWO_AIRPORTS.replace(from, to);
            let file = WorldFile::from_yaml_str(&yaml).unwrap();
            assert!(
                matches!(file.validate(), Err(WorldError::Validation(_))),
                "accepted {to}"
            );
        }
    }

    #[test]
    fn rejects_world_without_connections() {
        let yaml = r#"
airports:
  - code: AAAA
    name: Alpha
  - code: BBBB
    name: Bravo
"#;
        let file = WorldFile::from_yaml_str(yaml).unwrap();
        let err = file.validate().unwrap_err();
        assert!(err.to_string().contains("at least one connection"));
    }

    #[test]
    fn missing_file_falls_back_to_emergency_world() {
        let loader = WorldLoader::new(env!("CARGO_MANIFEST_DIR"));
        assert!(matches!(
            loader.load("worlds/missing.yaml"),
            Err(WorldError::Io { .. })
        ));
        let world = loader.load_or_fallback("worlds/missing.yaml");
        assert_eq!(world.airport_count(), 5);
        assert_eq!(world.connections().len(), 6);
    }

    #[test]
    fn emergency_world_satisfies_its_own_preconditions() {
        let world = emergency_world();
        for connection in world.connections() {
            assert!(world.airport(&connection.origin).is_some());
            assert!(world.airport(&connection.destination).is_some());
        }
        assert!(!world.departure_airports().is_empty());
        let risk = &world.all_departure_risks()[0];
        assert_eq!(risk.name, "Weather Delay");
        assert_eq!(risk.time_penalty_minutes, 60);
    }
}
