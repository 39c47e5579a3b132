use clap::{ArgGroup, Args, Parser, Subcommand};
use threadline::app::editor;
use threadline::app::{self, AppConfig};
use threadline::config;
#[cfg(feature = "harness")]
use threadline::harness;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_ENV: &str = "THREADLINE_LOG";

/// Read and post comments on a thread with optimistic updates.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Thread whose comments to open.
    #[arg(long)]
    thread: Option<String>,

    /// Comment page to open first.
    #[arg(long, default_value_t = 1)]
    page: u32,

    #[cfg(feature = "harness")]
    /// Use a seeded in-memory API instead of the network.
    #[arg(long, default_value_t = false)]
    demo: bool,

    #[cfg(feature = "harness")]
    /// Print deterministic demo stages to stdout without entering interactive mode.
    #[arg(long, default_value_t = false)]
    harness_dump: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Inspect or edit threadline configuration.
    Config(ConfigCommand),
    /// Print one page of a thread and exit.
    Show(ShowCommand),
}

#[derive(Debug, Args)]
#[command(group(
    ArgGroup::new("config_action")
        .required(true)
        .multiple(false)
        .args(["edit", "path"])
))]
struct ConfigCommand {
    /// Open the config file in $VISUAL/$EDITOR/nvim/vim/vi.
    #[arg(long)]
    edit: bool,

    /// Print the config file path.
    #[arg(long)]
    path: bool,
}

#[derive(Debug, Args)]
struct ShowCommand {
    #[arg(long)]
    thread: Option<String>,

    #[arg(long, default_value_t = 1)]
    page: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let command = match cli.command {
        Some(Command::Config(command)) => return handle_config_command(command),
        other => other,
    };

    #[cfg(feature = "harness")]
    if cli.harness_dump {
        let dump = harness::render_demo_dump().await?;
        print!("{dump}");
        return Ok(());
    }

    let config = config::load_or_create()?;
    let mut app_config = AppConfig {
        thread_id: cli.thread,
        page: cli.page.max(1),
        settings: config.thread,
        api: config.api,
        #[cfg(feature = "harness")]
        demo: cli.demo,
    };

    if let Some(Command::Show(show)) = command {
        if show.thread.is_some() {
            app_config.thread_id = show.thread;
        }
        app_config.page = show.page.max(1);
        return app::show(app_config).await;
    }

    app::run(app_config).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn handle_config_command(command: ConfigCommand) -> anyhow::Result<()> {
    let path = config::ensure_config_file()?;

    if command.path {
        println!("{}", path.display());
        return Ok(());
    }

    if command.edit {
        editor::edit_file_with_system_editor(path.as_path())?;
        return Ok(());
    }

    Ok(())
}
