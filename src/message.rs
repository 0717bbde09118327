use std::fmt;

/// One line of the per-turn log shown to the player.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Goal {
        name: String,
        code: String,
    },
    Arrival {
        name: String,
        code: String,
        health_cost: f64,
    },
    Healed {
        health_gain: f64,
        minutes: u32,
    },
    RiskTriggered {
        name: String,
        time_penalty_minutes: u32,
        health_penalty: f64,
    },
    ClearForDeparture {
        destination: String,
    },
    FlightCancelled,
    NoClinicHere,
    NoPendingFlight,
    InvalidFlight {
        destination: String,
    },
    LostHealth,
    LostTime,
    Success,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Goal { name, code } => {
                write!(f, "GOAL: Deliver patient to {name} ({code}).")
            }
            Message::Arrival {
                name,
                code,
                health_cost,
            } => write!(
                f,
                "--- FLIGHT ARRIVAL: Arrived at {name} ({code}). Health: -{health_cost:.2} HP. ---"
            ),
            Message::Healed {
                health_gain,
                minutes,
            } => write!(
                f,
                "--- HEALING COMPLETE: Health +{health_gain:.2} HP. Time taken: {minutes} min. ---"
            ),
            Message::RiskTriggered {
                name,
                time_penalty_minutes,
                health_penalty,
            } => write!(
                f,
                "DEPARTURE RISK: {name}. Delay +{time_penalty_minutes} min, health -{health_penalty:.2} HP."
            ),
            Message::ClearForDeparture { destination } => {
                write!(f, "No departure risk. Flight to {destination} is ready to board.")
            }
            Message::FlightCancelled => write!(
                f,
                "Flight cancelled due to departure risk. Patient stabilized locally."
            ),
            Message::NoClinicHere => write!(f, "No clinic here. Cannot heal."),
            Message::NoPendingFlight => write!(f, "No flight is waiting for confirmation."),
            Message::InvalidFlight { destination } => {
                write!(f, "Invalid flight option: no route to {destination}.")
            }
            Message::LostHealth => write!(
                f,
                "MISSION OVER: Despite your efforts we lost the patient (health dropped to 0)."
            ),
            Message::LostTime => write!(f, "MISSION OVER: Time limit exceeded. Ending session."),
            Message::Success => write!(
                f,
                "MISSION SUCCESS: Life saved, the patient is now in expert hands!"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrival_rounds_health_cost() {
        let message = Message::Arrival {
            name: "London Heathrow Airport".into(),
            code: "EGLL".into(),
            health_cost: 18.900000000000002,
        };
        assert_eq!(
            message.to_string(),
            "--- FLIGHT ARRIVAL: Arrived at London Heathrow Airport (EGLL). Health: -18.90 HP. ---"
        );
    }

    #[test]
    fn goal_names_target() {
        let message = Message::Goal {
            name: "Singapore Changi Airport".into(),
            code: "WSSS".into(),
        };
        assert!(message.to_string().contains("(WSSS)"));
    }
}
