use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gpsd_events::{
    client::GpsdClient,
    config::{ClientConfig, ReconnectPolicy},
    event::{self, Event},
    protocol::v3::ResponseMessage,
};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "localhost")]
    addr: String,
    #[arg(short, long, default_value = "2947")]
    port: u16,
    /// Retry every N seconds after the connection is lost
    #[arg(long)]
    auto_reconnect: Option<u64>,
    /// Print lines as received instead of parsing them
    #[arg(long)]
    raw: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = ClientConfig::new(&args.addr, args.port).with_parse(!args.raw);
    if let Some(secs) = args.auto_reconnect {
        config = config.with_reconnect(ReconnectPolicy::fixed(Duration::from_secs(secs)));
    }

    let client = GpsdClient::new(config).unwrap();

    client.on("TPV", |event: &Event| {
        if let Some(Ok(ResponseMessage::Tpv(tpv))) =
            event.message().map(|m| m.decode::<ResponseMessage>())
        {
            if let Some((lat, lon)) = tpv.position() {
                println!("Current position: lat {lat:6.3}, lon {lon:6.3}");
            }
        }
    });
    client.on("SKY", |event: &Event| {
        if let Some(Ok(ResponseMessage::Sky(sky))) =
            event.message().map(|m| m.decode::<ResponseMessage>())
        {
            let used = sky.satellites.iter().filter(|sat| sat.used).count();
            println!("Satellites in view: {}, used: {used}", sky.satellites.len());
        }
    });
    client.on(event::RAW, |event: &Event| {
        if let Event::Raw(line) = event {
            println!("{line}");
        }
    });
    client.on(event::ERROR, |event: &Event| eprintln!("{event:?}"));

    // Subscribe again after every (re)connect
    let watcher = client.clone();
    client.on(event::CONNECTED, move |_: &Event| {
        if let Err(e) = watcher.watch(None) {
            eprintln!("Failed to watch: {e}");
        }
    });

    if let Err(e) = client.connect().await {
        eprintln!("Failed to connect: {e}");
        if args.auto_reconnect.is_none() {
            return;
        }
    }

    let _ = tokio::signal::ctrl_c().await;
    let _ = client.disconnect().await;
}
