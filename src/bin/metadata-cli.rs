use clap::{Parser, Subcommand};
use metadata_proxy::client::{AdminClient, ClientResponse};
use metadata_proxy::config::schema::DEFAULT_ADMIN_ADDRESS;

#[derive(Parser)]
#[command(name = "metadata-cli")]
#[command(about = "Management CLI for the metadata daemon", long_about = None)]
struct Cli {
    /// Admin endpoint (unix:///path or tcp://host:port).
    #[arg(short, long, default_value = DEFAULT_ADMIN_ADDRESS)]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show build information
    Info,
    /// Look up a key
    Get { path: String },
    /// Store a value (a JSON object sets each of its keys)
    Put { path: String, value: String },
    /// Change the upstream for lookup misses
    Forward { host_port: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = AdminClient::from_url(&cli.url)?;

    let res = match cli.command {
        Commands::Info => client.info().await?,
        Commands::Get { path } => client.get(&path).await?,
        Commands::Put { path, value } => client.put(&path, value).await?,
        Commands::Forward { host_port } => client.set_forward(&host_port).await?,
    };
    print_response(res)
}

fn print_response(res: ClientResponse) -> Result<(), Box<dyn std::error::Error>> {
    if !res.status.is_success() {
        eprintln!("Error: admin endpoint returned status {}", res.status);
        if !res.body.is_empty() {
            eprintln!("Response: {}", res.text());
        }
        std::process::exit(1);
    }

    match serde_json::from_slice::<serde_json::Value>(&res.body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", res.text()),
    }
    Ok(())
}
