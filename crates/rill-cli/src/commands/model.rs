//! /model command - list and switch models

use super::CommandResult;
use rill_ai::models::{ModelInfo, find_model, get_all_models};

pub struct ModelCommand;

impl ModelCommand {
    /// List models with no args, otherwise switch to the best match.
    ///
    /// A query containing a `/` that matches nothing in the catalogue is
    /// taken as a literal model id.
    pub fn execute(args: &str, current_model: &str) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message(Self::list_models_text(current_model));
        }

        match find_model(args) {
            Some(model) => CommandResult::ChangeModel(model.id),
            None if args.contains('/') && !args.contains(char::is_whitespace) => {
                CommandResult::ChangeModel(args.to_string())
            }
            None => CommandResult::Message(format!(
                "No model found matching '{}'\nUse /model to list available models",
                args
            )),
        }
    }

    /// List models as text
    pub fn list_models_text(current_model: &str) -> String {
        list_models(current_model, &get_all_models())
    }
}

fn list_models(current: &str, models: &[ModelInfo]) -> String {
    if models.is_empty() {
        return "No models available".to_string();
    }

    let mut output = String::from("Available models:\n");

    // Catalogue order keeps vendors together
    let mut vendor = "";
    for model in models {
        if model.vendor() != vendor {
            vendor = model.vendor();
            output.push_str(&format!("\n{}:\n", vendor));
        }
        let marker = if model.id == current { " *" } else { "" };
        output.push_str(&format!("  {:<36} {}{}\n", model.id, model.name, marker));
    }

    if !models.iter().any(|m| m.id == current) {
        output.push_str(&format!("\ncustom:\n  {} *\n", current));
    }

    output.push_str("\nSwitch with: /model <name>");
    output
}
