//! deepnote-signin: runs one interactive sign-in from the terminal.

use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use deepnote_signin_lib::{
    logging, settings, AppResult, AppState, PresentationHost, SignInOutcome, SignInProvider,
    StaticPresentationHost, SystemBrowserHost, PRESENTATION_UNAVAILABLE_MESSAGE,
};

#[derive(Parser, Debug)]
#[command(name = "deepnote-signin")]
#[command(about = "Sign in to DeepNote with Google, Apple or LINE")]
#[command(version)]
struct Args {
    /// Settings file (TOML); defaults to ./deepnote-signin.toml
    #[arg(short, long, env = "DEEPNOTE_SIGNIN_CONFIG")]
    config: Option<PathBuf>,

    /// Print the sign-in URL instead of opening the system browser
    #[arg(long)]
    print_url: bool,

    /// Identity provider: google, apple or line
    provider: SignInProvider,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> AppResult<bool> {
    let path = args.config.unwrap_or_else(settings::default_path);
    let settings = settings::read(&path)?;
    let _log_guard = logging::init(&settings.logging)?;
    tracing::info!(
        path = %path.display(),
        provider = %args.provider,
        "deepnote-signin starting"
    );

    let host: Arc<dyn PresentationHost> = if args.print_url {
        Arc::new(StaticPresentationHost::console())
    } else {
        Arc::new(SystemBrowserHost)
    };
    let state = AppState::from_settings(settings, host)?;
    let coordinator = Arc::clone(&state.coordinator);

    let outcome = tokio::select! {
        outcome = coordinator.sign_in(args.provider) => outcome,
        () = interrupted(tokio::signal::ctrl_c()) => {
            tracing::info!("interrupted; abandoning sign-in");
            return Ok(false);
        }
    };

    match outcome {
        SignInOutcome::SignedIn(session) => {
            let summary = serde_json::to_string_pretty(&session)
                .map_err(|e| format!("SYSTEM_ERROR: failed to serialize session: {e}"))?;
            println!("{summary}");
            Ok(true)
        }
        SignInOutcome::Failed => {
            let message = coordinator.last_error().unwrap_or_default();
            eprintln!("{message}");
            if message == PRESENTATION_UNAVAILABLE_MESSAGE && !args.print_url {
                eprintln!("(--print-url を指定するとURLを表示します)");
            }
            Ok(false)
        }
        SignInOutcome::Ignored => Ok(false),
    }
}

/// Resolves on ctrl-c. If the handler cannot be installed it never resolves, so
/// the sign-in keeps running.
async fn interrupted(signal: impl Future<Output = std::io::Result<()>>) {
    if let Err(err) = signal.await {
        tracing::warn!("ctrl-c handler unavailable: {err}");
        std::future::pending::<()>().await;
    }
}
