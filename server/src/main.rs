use clap::Parser;
use log::info;
use rcon_server::{MockServer, MockSettings, Script};
use rcon_shared::{Generation, DEFAULT_PORT};

/// Serves scripted RCON replies for manual testing.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[clap(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Password clients must log in with
        #[clap(short = 'P', long, env = "RCON_PASSWORD", default_value = "secret")]
        password: String,
        /// Protocol generation to speak: v1 or v2
        #[clap(short, long, default_value = "v1")]
        generation: Generation,
        /// Send a generation 1 key before the first generation 2 frame
        #[clap(long)]
        legacy_preamble: bool,
    }

    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let mut settings = MockSettings::new(args.generation, args.password);
    settings.legacy_preamble = args.legacy_preamble;

    let address = format!("{}:{}", args.host, args.port);
    let server = MockServer::bind(&address, settings, Script::demo()).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
