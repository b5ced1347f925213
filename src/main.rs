use clap::Parser;
use rumqttc::{Event, Packet};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn, Level};

use operator_console::config::Config;
use operator_console::dispatcher::Dispatcher;
use operator_console::mqtt::{parse_result, MqttTransport};
use operator_console::transcript::StdoutTranscript;

/// Operator console - interactive command line for one agent session
#[derive(Parser, Debug)]
#[command(name = "operator-console", version, about)]
struct Args {
    /// Path to the TOML configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Agent ID (required without a config file)
    #[arg(short, long)]
    agent_id: Option<String>,

    /// MQTT broker address
    #[arg(short, long)]
    broker: Option<String>,

    /// MQTT broker port
    #[arg(short, long)]
    port: Option<u16>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match (&args.config, &args.agent_id) {
        (Some(path), _) => Config::from_file(path)?,
        (None, Some(agent_id)) => Config::default_for_agent(agent_id.clone()),
        (None, None) => return Err("either --config or --agent-id is required".into()),
    };

    if let Some(agent_id) = &args.agent_id {
        config.agent_id = agent_id.clone();
    }
    if let Some(broker) = &args.broker {
        config.mqtt.broker = broker.clone();
    }
    if let Some(port) = args.port {
        config.mqtt.port = port;
    }
    if args.verbose {
        config.log_level = "debug".to_string();
    }

    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args)?;

    // stdout belongs to the console transcript
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(config.log_level.parse::<Level>().unwrap_or(Level::INFO))
        .with_writer(std::io::stderr)
        .init();

    info!(
        agent_id = %config.agent_id,
        broker = %config.mqtt.broker,
        "operator console starting"
    );

    let (transport, mut eventloop) = MqttTransport::new(&config.mqtt, &config.agent_id);
    transport.subscribe().await?;

    let mut console = Dispatcher::new(
        config.agent_id.clone(),
        config.context(),
        StdoutTranscript,
        transport,
    )
    .with_session(config.session.clone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    info!("console ready, entering main loop");

    loop {
        tokio::select! {
            // Operator input, dispatched to completion before the next line
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        console.dispatch(line.trim_end(), true, "");
                    }
                    Ok(None) => {
                        info!("input closed, exiting");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "failed to read operator input");
                        break;
                    }
                }
            }
            // Process MQTT events
            event = eventloop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        match parse_result(&publish.payload) {
                            Ok(result) => console.render_result(&result.task_id, &result.output),
                            Err(e) => warn!(topic = %publish.topic, error = %e, "failed to parse result"),
                        }
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("connected to MQTT broker");
                    }
                    Err(e) => {
                        error!(error = %e, "MQTT error, reconnecting...");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(())
}
