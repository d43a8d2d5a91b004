mod support;

use assistant_cli::app::{App, Output};
use assistant_cli::commands::{parse_slash_command, SlashCommand, HELP_TEXT};
use pretty_assertions::assert_eq;

use support::{exchange, HostSpy};

fn notices(app: &mut App) -> Vec<String> {
    app.take_outputs()
        .into_iter()
        .filter_map(|output| match output {
            Output::Notice(text) => Some(text),
            Output::Exchange(_) => None,
        })
        .collect()
}

#[test]
fn parser_recognizes_known_and_unknown_slash_commands() {
    assert_eq!(parse_slash_command("plain question"), None);
    assert_eq!(parse_slash_command("/help"), Some(SlashCommand::Help));
    assert_eq!(parse_slash_command("/prev"), Some(SlashCommand::Previous));
    assert_eq!(parse_slash_command("/next"), Some(SlashCommand::Next));
    assert_eq!(parse_slash_command("/regen"), Some(SlashCommand::Regenerate));
    assert_eq!(
        parse_slash_command("/attach  src/lib.rs "),
        Some(SlashCommand::Attach("src/lib.rs".to_string()))
    );
    assert_eq!(
        parse_slash_command("/attach"),
        Some(SlashCommand::MissingArgument("/attach <path>"))
    );
    assert_eq!(parse_slash_command("/quit"), Some(SlashCommand::Quit));
    assert_eq!(
        parse_slash_command("/nope extra args"),
        Some(SlashCommand::Unknown("/nope".to_string()))
    );
}

#[test]
fn plain_lines_are_submitted_with_attachments() {
    let mut app = App::new();
    let mut host = HostSpy::with_exchanges(Vec::new());

    assert_eq!(app.on_line("/attach src/main.rs", &mut host), None);
    assert_eq!(app.on_line("  what does main do?  ", &mut host), Some(1));

    assert_eq!(
        host.submitted,
        vec![(
            "what does main do?".to_string(),
            vec!["src/main.rs".to_string()]
        )]
    );
    assert_eq!(notices(&mut app), vec!["Attached src/main.rs"]);
}

#[test]
fn submit_while_answering_suggests_cancel() {
    let mut app = App::new();
    let mut host = HostSpy::with_exchanges(Vec::new());

    app.on_line("first", &mut host);
    assert_eq!(app.on_line("second", &mut host), None);
    assert_eq!(
        notices(&mut app),
        vec!["Request 1 is still answering. Wait for it or type /cancel."]
    );

    app.on_line("/cancel", &mut host);
    app.on_line("/cancel", &mut host);
    assert_eq!(host.cancelled_runs, vec![1]);
    assert_eq!(
        notices(&mut app),
        vec!["Cancelled request 1", "Nothing to cancel"]
    );
}

#[test]
fn navigation_shows_exchanges_and_reports_boundaries() {
    let mut app = App::new();
    let mut host = HostSpy::with_exchanges(vec![exchange("q0", "a0"), exchange("q1", "a1")]);

    app.on_line("/next", &mut host);
    app.on_line("/prev", &mut host);
    app.on_line("/prev", &mut host);

    assert_eq!(
        app.take_outputs(),
        vec![
            Output::Notice("Already at the latest answer".to_string()),
            Output::Exchange(exchange("q0", "a0")),
            Output::Notice("Already at the first answer".to_string()),
        ]
    );
}

#[test]
fn history_lists_questions_and_marks_the_cursor() {
    let mut app = App::new();
    let mut host = HostSpy::with_exchanges(vec![exchange("q0", "a0"), exchange("q1", "a1")]);
    host.cursor = Some(0);

    app.on_line("/history", &mut host);

    assert_eq!(notices(&mut app), vec!["* 1. q0\n  2. q1"]);
}

#[test]
fn regenerate_needs_an_answer() {
    let mut app = App::new();
    let mut empty = HostSpy::with_exchanges(Vec::new());

    assert_eq!(app.on_line("/regen", &mut empty), None);
    assert_eq!(notices(&mut app), vec!["No answer to regenerate yet"]);

    let mut host = HostSpy::with_exchanges(vec![exchange("q0", "a0")]);
    assert_eq!(app.on_line("/regen", &mut host), Some(1));
    assert_eq!(host.regenerations, 1);
}

#[test]
fn help_detach_unknown_and_quit() {
    let mut app = App::new();
    let mut host = HostSpy::with_exchanges(Vec::new());
    app.attach("a.rs");
    app.attach("b.rs");

    app.on_line("/help", &mut host);
    app.on_line("/detach", &mut host);
    app.on_line("/bogus", &mut host);
    app.on_line("/attach", &mut host);
    assert!(app.attachments().is_empty());
    assert_eq!(
        notices(&mut app),
        vec![
            HELP_TEXT.to_string(),
            "Detached 2 file(s)".to_string(),
            "Unknown command: /bogus. Type /help for commands.".to_string(),
            "Usage: /attach <path>".to_string(),
        ]
    );

    app.on_line("question", &mut host);
    app.on_line("/quit", &mut host);
    assert!(app.should_exit);
    assert_eq!(host.cancelled_runs, vec![1]);
}
