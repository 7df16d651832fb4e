use clap::Parser;
use service_template::generator::{Generator, GeneratorInput};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Generate service, handler, route and DI boilerplate for a new entity
#[derive(Debug, Parser)]
#[command(name = "sergen", version)]
struct Cli {
    /// Crate path the generated code imports from
    #[arg(long, default_value = "crate")]
    module_name: String,

    /// Entity to generate, in PascalCase
    #[arg(long, default_value = "User")]
    entity_name: String,

    /// Plural form of the entity; defaults to the entity name plus "s"
    #[arg(long)]
    entity_name_plural: Option<String>,

    /// Project root containing src/
    #[arg(long, default_value = ".")]
    root: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let cli = Cli::parse();
    let input = GeneratorInput::new(
        &cli.module_name,
        &cli.entity_name,
        cli.entity_name_plural.as_deref(),
    );

    let files = Generator::new(input)?.generate(&cli.root)?;

    tracing::info!(
        "generated {} and {}; wire the appended snippets in {} and {}",
        files.service.display(),
        files.handler.display(),
        files.routes.display(),
        files.di.display()
    );
    Ok(())
}
