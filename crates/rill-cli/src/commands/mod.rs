//! Slash commands for interactive mode

mod model;
mod temperature;

pub use model::ModelCommand;
pub use temperature::TemperatureCommand;

/// Result of executing a slash command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Clear the conversation
    Clear,
    /// Change the model
    ChangeModel(String),
    /// Change the sampling temperature
    ChangeTemperature(f32),
    /// Show a message to the user (not sent upstream)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command. Returns `None` for ordinary input.
pub fn execute_command(
    input: &str,
    current_model: &str,
    current_temperature: f32,
) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next().unwrap_or("").to_lowercase();
    let args = parts.next().map(str::trim).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "clear" | "c" => CommandResult::Clear,

        "quit" | "exit" | "q" => CommandResult::Exit,

        "model" | "m" => ModelCommand::execute(args, current_model),

        "temperature" | "temp" | "t" => TemperatureCommand::execute(args, current_temperature),

        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?            Show this help message
  /model, /m [name]        List models or switch to a model
  /temperature, /t [value] Show or set sampling temperature (0.0 - 2.0)
  /clear, /c               Clear conversation history
  /quit, /exit, /q         Exit rill

Press Ctrl-C while a reply is streaming to stop it.

Examples:
  /model                   List available models
  /model sonnet            Switch to first model matching "sonnet"
  /model mistralai/mixtral-8x7b-instruct
                           Use any model id the endpoint accepts
  /temperature 1.2         Sample more freely"#
        .to_string()
}
