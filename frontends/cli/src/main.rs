mod args;

use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use args::{CliArgs, Mount, USAGE};
use docbind::logging::init_tracing;
use docbind::{Binding, BindingTarget, DocbindConfig, MemoryStore, ResultEnvelope, StoreContext};

#[tokio::main]
async fn main() -> Result<()> {
    let args = match CliArgs::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    let config = DocbindConfig::load(args.config.as_deref())?;
    if let Err(e) = init_tracing(&config.logging) {
        eprintln!("Warning: {}", e);
    }

    let store = Arc::new(MemoryStore::new());
    let written = seed_store(&store, &args.fixture)?;
    tracing::info!(
        "[cli] Seeded {} documents from {}",
        written,
        args.fixture.display()
    );

    let ctx = StoreContext::with_config(store.clone(), &config.bindings);
    let output = match args.mount {
        Mount::Collection(options) => {
            let binding = ctx.use_collection(args.path, options);
            render(binding, args.timeout).await?
        }
        Mount::Doc(id) => {
            let binding = ctx.use_doc(args.path, id);
            render(binding, args.timeout).await?
        }
    };

    println!("{}", output);
    tracing::debug!(
        "[cli] Listeners opened={} released={}",
        store.listen_count(),
        store.unsubscribe_count()
    );
    Ok(())
}

fn seed_store(store: &MemoryStore, fixture: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(fixture).map_err(|e| {
        anyhow::anyhow!("Failed to read fixture {}: {}", fixture.display(), e)
    })?;
    let json: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
        anyhow::anyhow!("Failed to parse fixture JSON {}: {}", fixture.display(), e)
    })?;
    store
        .seed_json(json)
        .map_err(|e| anyhow::anyhow!("Invalid fixture {}: {}", fixture.display(), e))
}

/// Wait for the first settled envelope, unmount, and render it as JSON.
async fn render<T>(mut binding: Binding<T>, timeout: Duration) -> Result<String>
where
    T: BindingTarget,
    T::Data: Serialize,
{
    let settled = tokio::time::timeout(timeout, binding.watch().settled()).await;
    let phase = binding.phase();
    binding.stop();

    let envelope: ResultEnvelope<T::Data> = settled
        .map_err(|_| anyhow::anyhow!("No snapshot within {:?}", timeout))??;
    if phase.is_terminal() {
        tracing::warn!("[cli] Binding ended in phase {:?}", phase);
    }
    Ok(serde_json::to_string_pretty(&envelope)?)
}
