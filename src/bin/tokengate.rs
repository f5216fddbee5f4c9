use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};

use tokengate::adapters::{CryptokiProvider, RusbBus};
use tokengate::{AuthConfig, AuthEvent, DeviceMonitor, EventSink, Pkcs11SessionManager};

#[derive(Parser, Debug)]
#[command(name = "tokengate")]
#[command(about = "PKCS#11 hardware token verification", version)]
pub struct Cli {
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the challenge-response verification against the connected token
    Verify {
        /// Token PIN. Falls back to TOKEN_PIN or the built-in default
        #[arg(long)]
        pin: Option<String>,

        /// Ignore a cached verification result
        #[arg(long)]
        force_refresh: bool,
    },

    /// Resolve and load the vendor driver, then report the slots it sees
    TestDriver,

    /// Print the manager status
    Status,

    /// Export the token's public key as PEM
    ExportKey,

    /// Encrypt stdin with the token's public key, write ciphertext to stdout
    Encrypt,

    /// Decrypt stdin with the token's private key, write plaintext to stdout
    Decrypt {
        /// Token PIN. Falls back to TOKEN_PIN or the built-in default
        #[arg(long)]
        pin: Option<String>,
    },

    /// Watch the USB bus and print token events as JSON lines
    Watch {
        /// Stop after this many seconds instead of running until killed
        #[arg(long)]
        seconds: Option<u64>,
    },
}

/// Prints every event as one JSON line.
struct StdoutSink;

impl EventSink for StdoutSink {
    fn on_event(&self, event: &AuthEvent) {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::error!("failed to encode event: {e}"),
        }
    }
}

fn manager(config: AuthConfig) -> Pkcs11SessionManager {
    Pkcs11SessionManager::new(CryptokiProvider::new(), config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config = AuthConfig::default();

    match cli.command {
        Commands::Verify { pin, force_refresh } => {
            let result = manager(config).perform_verification(pin.as_deref(), force_refresh);
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                std::process::exit(1);
            }
        }

        Commands::TestDriver => {
            let report = manager(config)
                .test_driver()
                .context("driver self-test failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Status => {
            let status = manager(config).get_status();
            println!("{}", serde_json::to_string_pretty(&status)?);
        }

        Commands::ExportKey => {
            let pem = manager(config)
                .export_public_key_pem()
                .context("failed to export the token public key")?;
            print!("{pem}");
        }

        Commands::Encrypt => {
            let mut data = Vec::new();
            io::stdin().read_to_end(&mut data)?;
            let ciphertext = manager(config)
                .encrypt_with_public_key(&data)
                .context("encryption on the token failed")?;
            io::stdout().write_all(&ciphertext)?;
        }

        Commands::Decrypt { pin } => {
            let mut data = Vec::new();
            io::stdin().read_to_end(&mut data)?;
            let plaintext = manager(config)
                .decrypt_with_private_key(pin.as_deref(), &data)
                .context("decryption on the token failed")?;
            io::stdout().write_all(&plaintext)?;
        }

        Commands::Watch { seconds } => {
            let bus = RusbBus::new().context("failed to open the USB context")?;
            let monitor = DeviceMonitor::new(Arc::new(bus), &config);
            monitor.subscribe(Arc::new(StdoutSink));
            monitor
                .start()
                .context("failed to start the device monitor")?;

            match seconds {
                Some(seconds) => std::thread::sleep(Duration::from_secs(seconds)),
                None => loop {
                    std::thread::sleep(Duration::from_secs(60));
                },
            }
            monitor.shutdown();
        }
    }

    Ok(())
}
