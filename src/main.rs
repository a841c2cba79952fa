use clap::{Parser, Subcommand, ValueEnum};
use serial_hub::config::ConfigLoader;
use serial_hub::{
    logging, ConnectionId, DeliveryError, NotificationSink, PortData, PortRegistry, SerialOptions,
    SerialTransportFactory,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "serial-hub",
    version,
    about = "Share serial ports between clients and split their output into framed messages.",
    long_about = "Opens serial ports through a shared port registry, prints every framed message the devices send and forwards lines typed on stdin to the ports."
)]
struct Cli {
    /// Configuration file (defaults to the standard search path)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the serial ports present on this system.
    List,

    /// Listen to one or more ports and print the messages they produce.
    Listen {
        /// Port name or alias; repeat to listen to several ports.
        #[arg(short, long = "port", required = true)]
        ports: Vec<String>,

        /// Serial options as JSON, e.g. '{"baudRate": 115200, "rx": {"untilNewline": true}}'.
        #[arg(short, long)]
        options: Option<String>,

        /// Terminator appended to each line read from stdin.
        #[arg(long, value_enum, default_value_t = LineEnding::Lf)]
        line_ending: LineEnding,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LineEnding {
    Lf,
    Crlf,
    Cr,
    None,
}

impl LineEnding {
    fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::Crlf => "\r\n",
            Self::Cr => "\r",
            Self::None => "",
        }
    }
}

/// Prints messages as `[port] message` lines.
struct StdoutSink;

impl NotificationSink for StdoutSink {
    fn deliver(&self, port_name: &str, message: &str) -> Result<(), DeliveryError> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "[{}] {}", port_name, message)
            .and_then(|()| out.flush())
            .map_err(|e| DeliveryError::new(e.to_string()))
    }
}

// --- Main Application Entry Point ---
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let loader = match &cli.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    let config = loader.into_config();
    logging::init(&config.logging);

    match cli.command {
        Command::List => list_ports()?,
        Command::Listen {
            ports,
            options,
            line_ending,
        } => {
            let registry = PortRegistry::builder(SerialTransportFactory {
                read_timeout: config.serial.read_timeout(),
                chunk_size: config.serial.read_chunk_size,
            })
            .policy(config.serial.extraction_policy())
            .aliases(config.serial.port_aliases.clone())
            .build();

            let result = listen(&registry, &ports, options.as_deref(), line_ending).await;
            registry.shutdown();
            result?;
        }
    }

    Ok(())
}

fn list_ports() -> Result<(), Box<dyn std::error::Error>> {
    let ports = serialport::available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        let kind = match port.port_type {
            serialport::SerialPortType::UsbPort(usb) => format!(
                "USB {:04x}:{:04x} {}",
                usb.vid,
                usb.pid,
                usb.manufacturer.unwrap_or_default()
            ),
            serialport::SerialPortType::PciPort => "PCI".to_string(),
            serialport::SerialPortType::BluetoothPort => "Bluetooth".to_string(),
            serialport::SerialPortType::Unknown => "Unknown".to_string(),
        };
        println!("{:<24} {}", port.port_name, kind.trim_end());
    }
    Ok(())
}

async fn listen(
    registry: &PortRegistry,
    ports: &[String],
    options: Option<&str>,
    line_ending: LineEnding,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw = match options {
        Some(json) => serde_json::from_str(json)?,
        None => serde_json::Value::Null,
    };
    let (options, warnings) = SerialOptions::parse(&raw, true);
    for warning in &warnings {
        eprintln!("warning: {}", warning);
    }

    let client = ConnectionId::new();
    let sink: Arc<dyn NotificationSink> = Arc::new(StdoutSink);
    for port in ports {
        registry.start_listening(&client, Arc::clone(&sink), port, Some(&options))?;
        if let Some(status) = registry.status(port) {
            eprintln!("{}", serde_json::to_string(&status)?);
        }
    }
    info!("Listening to {} port(s) as connection {}", ports.len(), client);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let data = PortData::Plain(format!("{}{}", line, line_ending.as_str()));
                    let registry = registry.clone();
                    let targets = ports.to_vec();
                    tokio::task::spawn_blocking(move || {
                        for port in &targets {
                            if let Err(e) = registry.send_data(&client, port, &data, None) {
                                warn!("Failed to send to [{}]: {}", port, e);
                            }
                        }
                    })
                    .await?;
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            },
            _ = &mut shutdown => break,
        }
    }

    registry.stop_listening_all(&client);
    Ok(())
}

// --- Graceful Shutdown Handler ---
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Signal received, starting graceful shutdown...");
}
