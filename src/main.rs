use std::io::Write;
use tenant_storage::cli::Cli;
use tenant_storage::error::Result;
use tenant_storage::{telemetry, Config, StorageRegistry};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    telemetry::init_logging(cli.verbose, cli.debug)?;
    let config = Config::from_sources(&cli)?;
    let telemetry = telemetry::init_telemetry()?;

    let registry = StorageRegistry::install(config.storage);

    for (user_id, tag) in cli.effective_bindings() {
        registry.bind(&user_id, &tag).await?;
        println!("{} storage: {}", user_id, registry.backend_type(&user_id)?);
    }

    for put in &cli.put {
        let data = tokio::fs::read(&put.path).await?;
        registry.upload(&put.user_id, &put.file_name, &data).await?;
        info!("Uploaded {:?} as {}/{}", put.path, put.user_id, put.file_name);
    }

    for (user_id, file_name) in &cli.get {
        let data = registry.download(user_id, file_name).await?;
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&data)?;
        stdout.flush()?;
    }

    if cli.metrics {
        eprint!("{}", telemetry.render()?);
    }

    Ok(())
}
