//! # Telecommand module
//!
//! This module provides the mission telecommand grammar. Commands arrive as text lines on the
//! `<exec>/command` topic:
//!
//! - `start <mission> [args...]` - start the named mission
//! - `stop` - stop the current mission
//!
//! Parsing is explicit and returns a typed error on malformed input, operator typos must never
//! unwind the executive.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction sent to the mission executive by the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Tc {
    /// Start the named mission with the given arguments.
    Start {
        /// Name of the mission to start, for example `wall_follow`.
        mission: String,

        /// Mission-specific arguments, passed through unparsed.
        args: Vec<String>,
    },

    /// Stop the current mission. Always accepted, idempotent.
    Stop,
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("Empty telecommand")]
    Empty,

    #[error("{0:?} is not a recognised telecommand verb")]
    InvalidVerb(String),

    #[error("The start telecommand requires a mission name")]
    MissingMissionName,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {
    /// Parse a TC from a command line.
    pub fn from_line(line: &str) -> Result<Self, TcParseError> {
        let mut words = line.split_whitespace();

        let verb = match words.next() {
            Some(w) => w,
            None => return Err(TcParseError::Empty),
        };

        match verb {
            "start" => {
                let mission = match words.next() {
                    Some(m) => m.to_string(),
                    None => return Err(TcParseError::MissingMissionName),
                };

                Ok(Tc::Start {
                    mission,
                    args: words.map(String::from).collect(),
                })
            }
            "stop" => Ok(Tc::Stop),
            _ => Err(TcParseError::InvalidVerb(verb.to_string())),
        }
    }

    /// Encode the TC into its command line form.
    pub fn to_line(&self) -> String {
        match self {
            Tc::Start { mission, args } => {
                let mut line = format!("start {}", mission);
                for arg in args {
                    line.push(' ');
                    line.push_str(arg);
                }
                line
            }
            Tc::Stop => "stop".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Topic on which the executive receives telecommands.
pub fn command_topic(exec_name: &str) -> String {
    format!("{}/command", exec_name)
}

/// Topic on which the executive reports the current action name.
pub fn feedback_action_topic(exec_name: &str) -> String {
    format!("{}/feedback/action", exec_name)
}

/// Topic on which the executive reports the mission running flag.
pub fn feedback_running_topic(exec_name: &str) -> String {
    format!("{}/feedback/running", exec_name)
}

/// Topic on which the executive publishes binary telemetry records.
pub fn telemetry_topic(exec_name: &str) -> String {
    format!("{}/tm", exec_name)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_start() {
        let tc = Tc::from_line("start wall_follow left 250 40").unwrap();
        assert_eq!(
            tc,
            Tc::Start {
                mission: "wall_follow".into(),
                args: vec!["left".into(), "250".into(), "40".into()],
            }
        );
    }

    #[test]
    fn parse_stop() {
        assert_eq!(Tc::from_line("stop").unwrap(), Tc::Stop);
        assert_eq!(Tc::from_line("  stop  ").unwrap(), Tc::Stop);
    }

    #[test]
    fn parse_errors_are_typed() {
        assert!(matches!(Tc::from_line(""), Err(TcParseError::Empty)));
        assert!(matches!(
            Tc::from_line("launch"),
            Err(TcParseError::InvalidVerb(_))
        ));
        assert!(matches!(
            Tc::from_line("start"),
            Err(TcParseError::MissingMissionName)
        ));
    }

    #[test]
    fn line_round_trip() {
        let tc = Tc::Start {
            mission: "drive".into(),
            args: vec!["40".into(), "0".into(), "5".into()],
        };
        assert_eq!(Tc::from_line(&tc.to_line()).unwrap(), tc);
    }
}
