use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::Context;
use answer_stream::{
    logging, DeliveryQueue, EnvConfig, FileContextProvider, Session, SessionConfig,
    SessionController,
};
use assistant_cli::args::Args;
use assistant_cli::providers;
use assistant_cli::render::TerminalRenderer;
use assistant_cli::repl::{self, ReplOptions};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = EnvConfig::from_env();
    logging::init(&config, args.verbose).context("failed to initialize logging")?;

    let workspace = args.resolve_workspace()?;
    let provider_id = args.provider.as_deref().or(config.provider.as_deref());
    let provider = providers::provider_for_id(provider_id)?;
    let profile = provider.profile();

    let session_config = SessionConfig {
        history_window: args.window.unwrap_or(config.history_window),
    };
    let delivery = DeliveryQueue::spawn(TerminalRenderer::new(io::stdout(), args.output_format()))
        .context("failed to start block delivery")?;
    let context = FileContextProvider::new(&workspace).with_max_bytes(config.context_max_bytes);
    let controller = SessionController::new(
        Session::new(delivery, session_config),
        provider,
        Arc::new(context),
    );

    tracing::info!(
        provider = %profile.provider_id,
        model = %profile.model_id,
        workspace = %workspace.display(),
        window = %session_config.history_window,
        "assistant started"
    );

    let result = match args.execute.as_deref() {
        Some(question) => repl::execute_once(&controller, question, &args.attachments),
        None => {
            let stdin = io::stdin();
            let options = ReplOptions {
                format: args.output_format(),
                attachments: args.attachments.clone(),
                wait_for_answers: !stdin.is_terminal(),
            };
            repl::run_interactive(&controller, stdin.lock(), &mut io::stdout(), options)
        }
    };

    controller.shutdown();
    result
}
