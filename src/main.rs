use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use localfile::{Config, HandleStore, ImageList, ImportReport, LocalFileService, Notice, Notifier};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Import local images and videos into the gallery and keep them across restarts.
#[derive(Parser, Debug)]
#[command(name = "localfile", version, about)]
struct Cli {
    /// Path to config.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import files or directories as if they were dropped onto the gallery
    Import {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Choose files with the native file picker
    #[cfg(feature = "native-picker")]
    Pick,
    /// Re-check persisted handles and print what was refreshed
    Reconcile,
    /// List image records
    List,
    /// Remove an image record and forget its file handle
    Remove { id: String },
    /// Print the JSON Schema of config.toml
    ConfigSchema,
}

struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: &Notice) {
        eprintln!("{} {notice}", style("!").yellow().bold());
    }
}

fn print_import(report: &ImportReport) {
    for file in &report.imported {
        let marker = if file.persisted {
            style("+").green()
        } else {
            style("+ (not persisted)").yellow()
        };
        println!("{marker} {} {}", file.id, file.name);
    }
    for failure in &report.failures {
        println!("{} {}: {}", style("x").red(), failure.name, failure.error);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if matches!(cli.command, Commands::ConfigSchema) {
        println!("{}", Config::json_schema()?);
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;
    let images_path = config.images_path();
    let store = HandleStore::open(&config.handle_db_path())?;
    let images = ImageList::load(&images_path)?;
    let service =
        LocalFileService::new(store, images, config).with_notifier(Arc::new(ConsoleNotifier));

    // Every run is a fresh process, so URLs saved by the last one are stale.
    let startup = service.reconcile().await;

    match cli.command {
        Commands::Import { paths } => {
            let report = service.import_paths(paths).await;
            service.settle().await;
            print_import(&report);
        }
        #[cfg(feature = "native-picker")]
        Commands::Pick => {
            let report = service
                .import_from_picker(&localfile::RfdPicker)
                .await;
            service.settle().await;
            match report {
                Ok(report) => print_import(&report),
                Err(e) => anyhow::bail!(e),
            }
        }
        Commands::Reconcile => {
            for id in &startup.refreshed {
                println!("{} {id}", style("refreshed").green());
            }
            for id in &startup.skipped {
                println!("{} {id}", style("no handle").dim());
            }
            for id in &startup.denied {
                println!("{} {id}", style("denied").red());
            }
            for id in &startup.failed {
                println!("{} {id}", style("unresolved").yellow());
            }
            if startup.halted {
                println!("{}", style("stopped at the first denied file").yellow());
            }
        }
        Commands::List => {
            for record in service.images().read() {
                let thumb = if record.thumbnail.is_empty() {
                    style("pending").yellow()
                } else {
                    style("ready").green()
                };
                println!(
                    "{}  {:<14} {:<8} {}  {}",
                    record.id,
                    record.kind.as_str(),
                    thumb,
                    record.source,
                    style(&record.full).dim()
                );
            }
        }
        Commands::Remove { id } => {
            if !service.remove(&id).await? {
                anyhow::bail!("no image with id {id}");
            }
            println!("{} {id}", style("removed").green());
        }
        Commands::ConfigSchema => unreachable!("handled before the service is built"),
    }

    service.images().save(&images_path)?;
    Ok(())
}
