use std::process::ExitCode;

use clap::Parser;
use homeguard::client::{WakeClient, DEFAULT_SERVER_URL};
use homeguard::request::WakePayload;

const AFTER_HELP: &str = "\
Examples:
  wolctl --device desktop
  wolctl --mac 00:11:22:33:44:55 --broadcast 192.168.1.255
  wolctl --server http://192.168.1.100:7092 --device laptop";

#[derive(Parser)]
#[command(name = "wolctl", version)]
#[command(about = "wolctl - HomeGuard Wake-on-LAN Client Tool", long_about = None)]
#[command(after_help = AFTER_HELP)]
struct Cli {
    /// HomeGuard server URL
    #[arg(long, default_value = DEFAULT_SERVER_URL)]
    server: String,

    /// Device name to wake up
    #[arg(long, default_value = "")]
    device: String,

    /// MAC address to wake up
    #[arg(long, default_value = "")]
    mac: String,

    /// Broadcast address
    #[arg(long, default_value = "")]
    broadcast: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let payload = WakePayload {
        device: cli.device,
        mac: cli.mac,
        broadcast: cli.broadcast,
    };

    if payload.validate().is_err() {
        eprintln!("Error: Must specify either --device or both --mac and --broadcast\n");
        eprintln!("{AFTER_HELP}");
        return ExitCode::FAILURE;
    }

    let client = WakeClient::new(&cli.server);
    if let Err(e) = client.wake(&payload).await {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    if payload.device.is_empty() {
        println!("✓ Successfully sent wake-up request for MAC: {}", payload.mac);
    } else {
        println!("✓ Successfully sent wake-up request for device: {}", payload.device);
    }
    ExitCode::SUCCESS
}
