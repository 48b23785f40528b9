use anyhow::Result;
use clap::{Parser, Subcommand};
use nexus_sites::{
    config::Config,
    routes::{pages, RegistrarCatalog, RouteTable},
    server, telemetry,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "nexus-sites", version, about = "Multi-site routing layer")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Load the site registry and print every site with its domains
    Sites,
}

fn catalog() -> RegistrarCatalog {
    RegistrarCatalog::new().register(pages::ID, pages::register)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let metrics = telemetry::init(&config.telemetry)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!("Starting Nexus Sites");
            info!("HTTP server listening on {}", config.http_addr());
            server::run(config, catalog(), RouteTable::new(), metrics).await
        }
        Command::Sites => {
            let (sites, registry) = server::load_registry(&config, &catalog()).await?;
            println!("main domain:     {}", sites.main_domain);
            println!("route namespace: {}", sites.route_namespace);
            println!("routes dir:      {}", sites.directories.routes);
            for site in registry.all() {
                println!(
                    "{:<20} {:<8} {}",
                    site.name(),
                    if site.is_enabled() { "enabled" } else { "disabled" },
                    site.domains().collect::<Vec<_>>().join(", ")
                );
            }
            Ok(())
        }
    }
}
