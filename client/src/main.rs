use clap::{Parser, Subcommand};
use log::info;
use rcon_client::{
    Client, ClientOptions, Command, Event, Generation, ResponseFormat, ServerConfig, DEFAULT_PORT,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host name or address
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// RCON port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// RCON password
    #[arg(short = 'P', long, env = "RCON_PASSWORD", hide_env_values = true)]
    password: String,

    /// Protocol generation: v1 or v2
    #[arg(short, long, default_value = "v1")]
    generation: Generation,

    /// Number of pooled connections
    #[arg(short, long, default_value = "2")]
    workers: usize,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Send a raw command and print the reply
    Exec {
        /// Command name, e.g. `get players` or `GetServerInformation`
        name: String,
        /// Argument text (generation 1) or JSON body (generation 2)
        #[arg(default_value = "")]
        body: String,
        /// Reply shape for generation 1: direct, indexed or unindexed
        #[arg(short, long, default_value = "direct")]
        format: String,
    },
    /// List connected players with their details
    Players,
    /// Print the current match state
    State,
    /// Stream events as JSON lines until interrupted
    Watch,
}

fn parse_format(format: &str) -> Result<ResponseFormat, String> {
    match format {
        "direct" => Ok(ResponseFormat::Direct),
        "indexed" => Ok(ResponseFormat::IndexedList),
        "unindexed" => Ok(ResponseFormat::UnindexedList),
        other => Err(format!("unknown reply format: {}", other)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = ServerConfig::new(args.host, args.port, args.password);

    let mut options = ClientOptions::default()
        .with_generation(args.generation)
        .with_workers(args.workers);
    if !matches!(args.action, Action::Watch) {
        options = options.without_events();
    }

    info!("Connecting to {} ({})", config.addr(), args.generation);
    let client = Client::connect(config, options).await?;

    let outcome = run(&client, args.action).await;
    client.close().await;
    outcome
}

async fn run(client: &Client, action: Action) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        Action::Exec { name, body, format } => {
            let command = Command::new(name, body, parse_format(&format)?);
            println!("{}", client.queue_job(command).await?);
        }
        Action::Players => {
            for player in client.detailed_players().await? {
                println!(
                    "{:<24} {:<20} {:<7} {:<10} kills {:>3} deaths {:>3}",
                    player.name,
                    player.player_id,
                    player.team.to_string(),
                    player.unit.as_deref().unwrap_or("-"),
                    player.kills,
                    player.deaths
                );
            }
        }
        Action::State => {
            let state = client.game_state().await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Action::Watch => {
            client.subscribe(|event: &Event| match serde_json::to_string(event) {
                Ok(line) => println!("{}", line),
                Err(e) => eprintln!("Could not encode event: {}", e),
            });
            info!("Watching events, press Ctrl+C to stop");
            tokio::signal::ctrl_c().await?;
        }
    }
    Ok(())
}
