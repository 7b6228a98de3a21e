//! Composition host (trellis-compose) - Main entry point
//!
//! Loads a scene file into the in-memory collaborators, composes one
//! instruction into a fresh container and prints the result as JSON: the
//! container's content, the ordered collaborator journal and the lifecycle
//! events the composer published.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trellis_common::{config::resolve_config, EventBus};
use trellis_compose::binding::{ComposeBinding, VirtualElements};
use trellis_compose::memory::{Journal, MemoryContainer, MemoryModuleLoader, MemoryViewLocator, RecordingBinder};
use trellis_compose::orchestrator::Collaborators;
use trellis_compose::scene::{parse_instruction, Scene};
use trellis_compose::view::Container;
use trellis_compose::{Composer, CompositionOutcome};

/// Command-line arguments for trellis-compose
#[derive(Parser, Debug)]
#[command(name = "trellis-compose")]
#[command(about = "Compose a view instruction into an in-memory container")]
#[command(version)]
struct Args {
    /// Configuration file (defaults to TRELLIS_CONFIG, then the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Scene file describing views, models and transitions
    #[arg(short, long)]
    scene: PathBuf,

    /// Instruction: a model id, a view specifier or a JSON options object
    #[arg(short, long)]
    instruction: String,

    /// Activate models during composition unless the instruction says otherwise
    #[arg(long)]
    activate_during_composition: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let mut config = resolve_config(args.config.as_deref())
        .context("Failed to resolve composition configuration")?;
    if args.activate_during_composition {
        config.activate_during_composition = true;
    }

    // Initialize tracing
    let level = config.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("trellis_compose={},trellis_common={}", level, level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Loading scene {}", args.scene.display());
    let scene = Scene::load(&args.scene).context("Failed to load scene")?;

    let journal = Journal::new();
    let loader = MemoryModuleLoader::new().with_journal(journal.clone());
    let locator = MemoryViewLocator::new(config.view_extension.clone()).with_journal(journal.clone());
    scene.install(&journal, &loader, &locator, &config.transition_namespace);

    let events = EventBus::new(1000);
    let mut rx = events.subscribe();

    let composer = Arc::new(
        Composer::new(
            config,
            Collaborators {
                loader: Arc::new(loader),
                locator: Arc::new(locator),
                binder: Arc::new(RecordingBinder::new().with_journal(journal.clone())),
            },
        )
        .with_events(events),
    );
    let binding = ComposeBinding::register(composer, &VirtualElements::new());

    let container: Arc<dyn Container> = Arc::new(MemoryContainer::new().with_journal(journal.clone()));
    let instruction = parse_instruction(&args.instruction);

    let outcome = binding
        .update(&container, &instruction, None)
        .await
        .context("Composition failed")?;

    let mut published = Vec::new();
    while let Ok(event) = rx.try_recv() {
        published.push(event);
    }

    let (status, activated) = match outcome {
        CompositionOutcome::Skipped => ("skipped", false),
        CompositionOutcome::Composed { activated, .. } => ("composed", activated),
    };

    let report = serde_json::json!({
        "outcome": status,
        "activated": activated,
        "children": container.children(),
        "journal": journal.entries(),
        "events": published,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize report")?
    );

    Ok(())
}
