//! `filecore-cli` — test harness for the library, per spec.md §6's "CLI
//! harness (test-only)": construct a node for a filename, then run one of
//! self-test / rename / thumbnail. Exit code 0 on success, non-zero
//! otherwise.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use filecore::task::runner::{Context, PoolRunner};
use filecore::{ChangeBus, Config, DirectoryNode, FileNode, FileRegistry, Location};

#[derive(Parser)]
#[command(name = "filecore-cli", about = "Exercise the filecore library end to end")]
struct Cli {
    /// The file or directory to operate on.
    path: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Construct a node, confirm registry identity, query its info, and
    /// (if it's a directory) enumerate its children.
    SelfTest,
    /// Rename the node to `new_name`.
    Rename { new_name: String },
    /// Resolve and print the thumbnail state.
    Thumbnail,
    /// Watch `path` for changes and print each one as it's reported,
    /// until stdin closes. The daemon-style long-running counterpart to
    /// the one-shot subcommands above.
    Serve,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "filecore_cli=info,filecore=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load_default();

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(target: "filecore_cli", error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, config: &Config) -> filecore::Result<()> {
    let registry = FileRegistry::new();
    let pool = PoolRunner::named("cli", config.task_limit);
    let context = Context::named("cli");

    let is_dir = cli.path.is_dir();
    let location = Location::from_path(&cli.path);
    let node = registry.get_or_create(location.clone(), is_dir);

    match &cli.command {
        Command::SelfTest => {
            let same = registry.get_or_create(location.clone(), is_dir);
            if !node.is_same_node(&same) {
                return Err(filecore::Error::Other("registry identity check failed".into()));
            }

            let (tx, rx) = std::sync::mpsc::channel();
            node.query_info(&pool, &context, move |result| tx.send(result).unwrap());
            let info = rx.recv_timeout(std::time::Duration::from_secs(10)).map_err(|_| filecore::Error::Timeout)??;
            println!("display_name: {}", info.display_name);
            println!("content_type: {}", info.content_type);
            println!("size: {}", info.size);

            if info.is_dir {
                let dir_node = DirectoryNode::new(node.clone());
                let (tx, rx) = std::sync::mpsc::channel();
                dir_node.enumerate_children(&pool, &context, move |result| tx.send(result).unwrap());
                let children = rx.recv_timeout(std::time::Duration::from_secs(10)).map_err(|_| filecore::Error::Timeout)??;
                println!("children: {}", children.len());
            }
            Ok(())
        }
        Command::Rename { new_name } => {
            let bus = ChangeBus::new(registry.clone());
            let (tx, rx) = std::sync::mpsc::channel();
            node.rename(&pool, &context, bus, new_name.clone(), move |result| tx.send(result).unwrap());
            let new_location = rx.recv_timeout(std::time::Duration::from_secs(10)).map_err(|_| filecore::Error::Timeout)??;
            println!("renamed to: {}", new_location.path().display());
            Ok(())
        }
        Command::Thumbnail => {
            let (tx, rx) = std::sync::mpsc::channel();
            node.get_thumbnail(&pool, &context, config.thumbnailer_command.as_deref(), move |result| {
                tx.send(result).unwrap()
            });
            let state = rx.recv_timeout(std::time::Duration::from_secs(10)).map_err(|_| filecore::Error::Timeout)??;
            match state {
                filecore::thumbnail::ThumbnailState::Ready(path) => println!("thumbnail: {}", path.display()),
                filecore::thumbnail::ThumbnailState::Failed => println!("thumbnail: failed"),
            }
            Ok(())
        }
        Command::Serve => serve(&node, &location, &registry),
    }
}

/// Watches `location` for OS-level changes and prints each one it's told
/// about, until stdin is closed (`Ctrl-D` on a terminal). Plays both
/// "driver" and "operator" role against the local filesystem directly,
/// since this library owns no network protocol of its own.
fn serve(node: &FileNode, location: &Location, registry: &std::sync::Arc<FileRegistry>) -> filecore::Result<()> {
    let bus = ChangeBus::new(registry.clone());
    bus.watch(location)?;

    node.on_renamed({
        let location = location.clone();
        move |new_location| println!("renamed: {} -> {}", location.path().display(), new_location.path().display())
    });
    node.on_children_changed({
        let location = location.clone();
        move || println!("children-changed: {}", location.path().display())
    });

    tracing::info!(target: "filecore_cli", path = %location.path().display(), "watching for changes, press Ctrl-D to stop");
    let mut line = String::new();
    while std::io::stdin().read_line(&mut line).map(|n| n > 0).unwrap_or(false) {
        line.clear();
    }
    Ok(())
}
