//! Line commands read from stdin

use std::str::FromStr;

use ha_helpers::light::TurnOnParams;
use thiserror::Error;

pub const USAGE: &str = "commands: on | off | effect <name> | brightness <0-255> | effects";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    TurnOn(TurnOnParams),
    TurnOff,
    ListEffects,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("effect needs a name")]
    MissingEffect,

    #[error("brightness must be 0-255, got {0:?}")]
    InvalidBrightness(String),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        match word.to_ascii_lowercase().as_str() {
            "on" => Ok(Command::TurnOn(TurnOnParams::default())),
            "off" => Ok(Command::TurnOff),
            "effects" => Ok(Command::ListEffects),
            "effect" if rest.is_empty() => Err(CommandError::MissingEffect),
            "effect" => Ok(Command::TurnOn(TurnOnParams::effect(rest))),
            "brightness" => rest
                .parse::<u8>()
                .map(|brightness| Command::TurnOn(TurnOnParams::brightness(brightness)))
                .map_err(|_| CommandError::InvalidBrightness(rest.to_string())),
            _ => Err(CommandError::Unknown(line.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!("on".parse::<Command>(), Ok(Command::TurnOn(TurnOnParams::default())));
        assert_eq!(" OFF ".parse::<Command>(), Ok(Command::TurnOff));
        assert_eq!("effects".parse::<Command>(), Ok(Command::ListEffects));
        assert_eq!(
            "effect Rainbow Wave".parse::<Command>(),
            Ok(Command::TurnOn(TurnOnParams::effect("Rainbow Wave")))
        );
        assert_eq!(
            "brightness 128".parse::<Command>(),
            Ok(Command::TurnOn(TurnOnParams::brightness(128)))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("effect".parse::<Command>(), Err(CommandError::MissingEffect));
        assert_eq!(
            "brightness 300".parse::<Command>(),
            Err(CommandError::InvalidBrightness("300".to_string()))
        );
        assert_eq!(
            "dim".parse::<Command>(),
            Err(CommandError::Unknown("dim".to_string()))
        );
    }
}
