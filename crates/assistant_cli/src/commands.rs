#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Cancel,
    Previous,
    Next,
    Regenerate,
    Attach(String),
    Detach,
    History,
    Quit,
    MissingArgument(&'static str),
    Unknown(String),
}

pub const HELP_TEXT: &str = "Commands: /help, /cancel, /prev, /next, /regen, /attach <path>, /detach, /history, /quit";

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (command, argument) = match trimmed.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (trimmed, ""),
    };

    let parsed = match command {
        "/help" => SlashCommand::Help,
        "/cancel" => SlashCommand::Cancel,
        "/prev" => SlashCommand::Previous,
        "/next" => SlashCommand::Next,
        "/regen" => SlashCommand::Regenerate,
        "/attach" if argument.is_empty() => SlashCommand::MissingArgument("/attach <path>"),
        "/attach" => SlashCommand::Attach(argument.to_string()),
        "/detach" => SlashCommand::Detach,
        "/history" => SlashCommand::History,
        "/quit" | "/exit" => SlashCommand::Quit,
        _ => SlashCommand::Unknown(command.to_string()),
    };

    Some(parsed)
}
