mod identity;

use aloha::AddressFamily;
use aloha::DiscoveryEvent;
use clap::Parser;
use clap::Subcommand;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_DISCOVERY_PORT: u16 = 5354;
const DEFAULT_SERVICE_NAME: &str = "_easy-photo-backup._tcp";

fn main() -> anyhow::Result<()> {
    env_logger::init();
    match Cli::parse().command {
        Command::Serve {
            service_name,
            listen_port,
            advertised_port,
            interface,
            server_id,
        } => serve(
            &service_name,
            listen_port,
            advertised_port,
            interface.as_deref(),
            server_id,
        ),
        Command::Discover {
            service_name,
            port,
            period,
            run_for,
        } => discover(&service_name, port, period, run_for),
    }
}

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer discovery queries for a service hosted on this machine
    Serve {
        #[arg(long, default_value = DEFAULT_SERVICE_NAME)]
        service_name: String,

        /// UDP port the responder listens on
        #[arg(long, default_value_t = DEFAULT_DISCOVERY_PORT)]
        listen_port: u16,

        /// Port advertised to discovered clients
        #[arg(long, default_value_t = 2134)]
        advertised_port: u16,

        /// Interface address to bind instead of the wildcard, e.g. 192.168.1.17
        #[arg(long)]
        interface: Option<String>,

        /// Server identity announced in every response; generated when omitted
        #[arg(long)]
        server_id: Option<Uuid>,
    },
    /// Watch the local network for services coming and going
    Discover {
        #[arg(long, default_value = DEFAULT_SERVICE_NAME)]
        service_name: String,

        /// UDP port the queries are broadcast to
        #[arg(long, default_value_t = DEFAULT_DISCOVERY_PORT)]
        port: u16,

        /// Seconds between discovery broadcasts
        #[arg(long, default_value_t = 1.0)]
        period: f32,

        /// Stop after this many seconds; runs until killed when omitted
        #[arg(long)]
        run_for: Option<f32>,
    },
}

fn serve(
    service_name: &str,
    listen_port: u16,
    advertised_port: u16,
    interface: Option<&str>,
    server_id: Option<Uuid>,
) -> anyhow::Result<()> {
    let server_id = server_id.unwrap_or_else(Uuid::new_v4);
    log::info!("Serving '{}' as server {}", service_name, server_id);
    let extra = identity::announcement_payload(server_id);
    let stop = AtomicBool::new(false);
    aloha::respond(
        interface,
        AddressFamily::Ipv4,
        listen_port,
        service_name,
        advertised_port,
        &extra,
        &stop,
    )?;
    Ok(())
}

fn discover(
    service_name: &str,
    port: u16,
    period: f32,
    run_for: Option<f32>,
) -> anyhow::Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    if let Some(seconds) = run_for {
        let stop = stop.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs_f32(seconds));
            stop.store(true, Ordering::Relaxed);
        });
    }
    aloha::discover(
        service_name,
        port,
        AddressFamily::Ipv4,
        Duration::from_secs_f32(period),
        |event| match event {
            DiscoveryEvent::Added { address, extra } => {
                println!("Added: {}:{} ({} extra bytes)", address.ip, address.port, extra.len());
            }
            DiscoveryEvent::Removed { address } => {
                println!("Removed: {}:{}", address.ip, address.port);
            }
        },
        &stop,
    )?;
    Ok(())
}
