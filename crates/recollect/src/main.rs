//! Terminal chat client with persistent conversation memory.

mod commands;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{HELP, SlashCommand, parse_slash_command, run_slash_command};
use log::{debug, info, warn};
use recollect_config::RecollectConfig;
use recollect_memory::{
    ChatSession, LocalSimilarityIndex, MemorySession, PersistenceGateway, SimilaritySearch,
    SqliteGateway, TieredMemoryStore, UserDirectory,
};
use recollect_protocol::{GenerationGateway, SessionContext};
use settings::{
    chat_settings_from_config, consolidation_policy_from_config, user_seed_from_config,
};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "recollect", version)]
struct Cli {
    /// Optional path to a recollect.json5 config file (skips layering)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Session id for history and summaries; a fresh id is generated when omitted
    #[arg(long)]
    session: Option<String>,
    /// Directory used for layered config lookup and relative store paths
    #[arg(long)]
    cwd: Option<PathBuf>,
}

fn main() -> Result<()> {
    let _ = env_logger::builder()
        .format_timestamp_millis()
        .parse_default_env()
        .try_init();
    let cli = Cli::parse();
    info!(
        "starting recollect (config_set={}, session_set={})",
        cli.config.is_some(),
        cli.session.is_some()
    );

    let cwd = match cli.cwd.clone() {
        Some(cwd) => cwd,
        None => std::env::current_dir().context("cwd")?,
    };
    let config = load_config(&cli, &cwd)?;

    let persistence: Arc<dyn PersistenceGateway> = Arc::new(
        SqliteGateway::open(resolve(&cwd, &config.database.path))
            .context("failed to open database")?,
    );
    let user_id = UserDirectory::new(persistence.clone())
        .ensure_user(&user_seed_from_config(&config.user))
        .context("failed to seed user")?;
    let generation =
        recollect_llm::gateway_from_config(&config.llm).context("failed to build llm backend")?;
    let memory = if config.memory.enabled {
        Some(memory_session(&config, &cwd, generation.clone())?)
    } else {
        None
    };

    let session_id = cli
        .session
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    info!("chat session ready (session_id={session_id}, user_id={user_id})");
    let mut session = ChatSession::new(
        SessionContext::new(Some(user_id), session_id),
        chat_settings_from_config(&config),
        persistence,
        generation,
        memory,
    );
    run_repl(&mut session)
}

fn load_config(cli: &Cli, cwd: &Path) -> Result<RecollectConfig> {
    match &cli.config {
        Some(path) => RecollectConfig::load_from_path(path).context("failed to load config"),
        None => {
            let layered =
                RecollectConfig::load_layered(cwd).context("failed to load layered config")?;
            debug!("layered config loaded (layers={})", layered.layers.len());
            Ok(layered.config)
        }
    }
}

fn memory_session(
    config: &RecollectConfig,
    cwd: &Path,
    generation: Arc<dyn GenerationGateway>,
) -> Result<MemorySession> {
    let index: Arc<dyn SimilaritySearch> = match &config.memory.path {
        Some(path) => Arc::new(
            LocalSimilarityIndex::open(resolve(cwd, path))
                .context("failed to open memory index")?,
        ),
        None => Arc::new(LocalSimilarityIndex::in_memory()),
    };
    let store = TieredMemoryStore::new(
        index,
        Some(generation),
        consolidation_policy_from_config(config),
    );
    let session = MemorySession::new(store);
    info!(
        "long-term memory enabled (memory_session={})",
        session.session_id()
    );
    Ok(session)
}

fn resolve(cwd: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn run_repl(session: &mut ChatSession) -> Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    writeln!(stdout, "recollect ready; /help lists commands")?;
    let mut lines = stdin.lock().lines();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("failed to read input")?;
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        match parse_slash_command(input) {
            Ok(Some(SlashCommand::Quit)) => break,
            Ok(Some(command)) => writeln!(stdout, "{}", run_slash_command(session, &command))?,
            Ok(None) => match session.turn(input) {
                Ok((reply, recorded)) => {
                    for call in &reply.function_calls {
                        debug!("function result (name={}, result={})", call.function, call.result);
                    }
                    debug!(
                        "turn recorded (persisted={}, tokens={}->{}, summary={:?}, remembered={})",
                        recorded.turn.persisted,
                        recorded.turn.tokens_before,
                        recorded.turn.tokens_after,
                        recorded.summary,
                        recorded.remembered
                    );
                    writeln!(stdout, "{}", reply.text)?;
                }
                Err(err) => {
                    warn!("chat turn failed (error={err})");
                    writeln!(stdout, "error: {err}")?;
                }
            },
            Err(message) => writeln!(stdout, "{message}\n{HELP}")?,
        }
    }
    if let Some(report) = session.end_session() {
        info!(
            "session ended (consolidated={}, created={})",
            report.consolidated,
            report.created.len()
        );
    }
    Ok(())
}
