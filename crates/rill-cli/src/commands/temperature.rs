//! /temperature command - show and set sampling temperature

use super::CommandResult;
use rill_ai::types::{MAX_TEMPERATURE, MIN_TEMPERATURE, validate_temperature};

pub struct TemperatureCommand;

impl TemperatureCommand {
    pub fn execute(args: &str, current: f32) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message(format!(
                "Temperature: {:.1} (range {:.1} - {:.1})\nSet with: /temperature <value>",
                current, MIN_TEMPERATURE, MAX_TEMPERATURE
            ));
        }

        match args.parse::<f32>() {
            Ok(value) => match validate_temperature(value) {
                Ok(()) => CommandResult::ChangeTemperature(value),
                Err(e) => CommandResult::Message(e.to_string()),
            },
            Err(_) => CommandResult::Message(format!("Not a number: '{}'", args)),
        }
    }
}
