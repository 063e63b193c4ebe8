use std::path::PathBuf;

use clap::Parser as ClapParser;
use reedline::{DefaultPrompt, DefaultPromptSegment, Reedline, Signal};
use tracing::error;
use tracing_subscriber::EnvFilter;

use fedsql::config::Config;
use fedsql::engine::{classify_line, Command, Engine};
use fedsql::format;

/// Federated SQL query engine: one SELECT across PostgreSQL, MySQL and
/// SQLite sources.
#[derive(Debug, ClapParser)]
#[command(name = "fedsql", version, about)]
struct Args {
    /// YAML file mapping endpoint names to connection parameters
    #[arg(short, long, env = "FEDSQL_CONFIG")]
    config: PathBuf,

    /// Run a single query and exit instead of starting the REPL
    #[arg(short, long)]
    query: Option<String>,

    /// Maximum rows printed per result
    #[arg(long, default_value_t = 50)]
    limit: usize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("cannot start runtime: {err}");
            std::process::exit(1);
        }
    };

    let mut engine = Engine::from_config(config);

    if let Some(query) = args.query {
        match runtime.block_on(engine.run_query(&query)) {
            Ok(outcome) => print!("{}", format::render_outcome(&outcome, args.limit)),
            Err(err) => {
                error!("{err}");
                std::process::exit(1);
            }
        }
        return;
    }

    repl(&runtime, &mut engine, args.limit);
}

/// Line protocol: `USE a.b AS x;` registers an alias, `EXIT;` leaves,
/// anything else accumulates until a line ends with `;` and then runs.
fn repl(runtime: &tokio::runtime::Runtime, engine: &mut Engine, limit: usize) {
    let mut editor = Reedline::create();
    let prompt = DefaultPrompt::new(
        DefaultPromptSegment::Basic("fedsql".to_string()),
        DefaultPromptSegment::Empty,
    );
    let mut buffer: Vec<String> = Vec::new();

    loop {
        match editor.read_line(&prompt) {
            Ok(Signal::Success(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                if buffer.is_empty() {
                    match classify_line(&line) {
                        Command::Use { parts, short } => {
                            if let Err(err) = engine.register_alias(&parts, &short) {
                                eprintln!("{err}");
                            }
                            continue;
                        }
                        Command::Exit => return,
                        Command::Statement => {}
                    }
                }
                buffer.push(line.clone());
                if line.trim_end().ends_with(';') {
                    let query = buffer.join("\n");
                    buffer.clear();
                    match runtime.block_on(engine.run_query(&query)) {
                        Ok(outcome) => {
                            print!("{}", format::render_outcome(&outcome, limit));
                        }
                        Err(err) => eprintln!("{err}"),
                    }
                }
            }
            Ok(Signal::CtrlC) => {
                buffer.clear();
            }
            Ok(Signal::CtrlD) => return,
            Err(err) => {
                eprintln!("input error: {err}");
                return;
            }
        }
    }
}
