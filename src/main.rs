//! telpane - demo console server
//!
//! Listens for telnet clients and gives each one a windowed console: output
//! scrolls in the upper pane, commands are typed on the bottom line.
//!
//! # Quick Start
//!
//! ```text
//! telpane                       # listen on 0.0.0.0:2323
//! telpane -l 127.0.0.1:4000     # other address
//! telnet localhost 2323
//! ```
//!
//! # Commands
//!
//! | Command | Action |
//! |---------|--------|
//! | size | Re-query the terminal size and redo the layout |
//! | clear | Clear the output pane |
//! | secret | Read one line with echo off |
//! | quit | Disconnect |
//!
//! PageUp/PageDown scroll the output pane.

use std::env;
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use telpane::{Config, Console};

/// How long a client thread sleeps waiting for keys before re-checking EOF
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Command line options
#[derive(Default)]
struct Options {
    config: Option<PathBuf>,
    listen: Option<String>,
    print_config: bool,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    eprintln!("telpane {} - multi-pane consoles for telnet clients", VERSION);
    eprintln!();
    eprintln!("Usage: telpane [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <PATH>   Configuration file");
    eprintln!("  -l, --listen <ADDR>   Listen address (default 0.0.0.0:2323)");
    eprintln!("  --print-config        Print the effective configuration and exit");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Configuration: --config, $TELPANE_CONFIG, or ~/.telpane/config.toml");
    eprintln!("Logging: log_level in the config file, overridden by RUST_LOG");
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();
    let mut options = Options::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                eprintln!("telpane {}", VERSION);
                std::process::exit(0);
            }
            "-c" | "--config" => {
                i += 1;
                let path = args.get(i).ok_or("Missing config path")?;
                options.config = Some(PathBuf::from(path));
            }
            "-l" | "--listen" => {
                i += 1;
                let addr = args.get(i).ok_or("Missing listen address")?;
                options.listen = Some(addr.clone());
            }
            "--print-config" => {
                options.print_config = true;
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(options)
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> anyhow::Result<()> {
    let options = match parse_args() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let mut config = Config::load(options.config.as_deref()).context("loading configuration")?;
    if let Some(listen) = options.listen {
        config.listen = listen;
    }

    if options.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    init_logging(&config.log_level);
    info!("telpane {} starting", VERSION);

    let listener = TcpListener::bind(&config.listen)
        .with_context(|| format!("binding {}", config.listen))?;
    info!(addr = %config.listen, "listening");

    let config = Arc::new(config);
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };
        let config = Arc::clone(&config);
        let name = match stream.peer_addr() {
            Ok(addr) => format!("client-{}", addr),
            Err(_) => "client".to_string(),
        };
        let spawned = thread::Builder::new().name(name).spawn(move || {
            if let Err(e) = serve(stream, &config) {
                warn!(error = %e, "client session ended with error");
            }
        });
        if let Err(e) = spawned {
            error!(error = %e, "failed to spawn client thread");
        }
    }

    Ok(())
}

/// One client session
fn serve(stream: TcpStream, config: &Config) -> anyhow::Result<()> {
    let peer = stream.peer_addr().ok();
    let mut console = Console::start(stream, config).context("starting console")?;
    info!(
        ?peer,
        windowed = console.is_windowed(),
        size = ?console.terminal_size(),
        "client connected"
    );

    console.print(&format!("telpane {}", VERSION));
    console.print("Commands: size, clear, secret, quit. PageUp/PageDown scroll.");

    let prompt = config.editor.prompt.clone();
    let mut reading_secret = false;

    while !console.is_closed() {
        if let Err(e) = console.wait_input(POLL_INTERVAL) {
            if !e.is_timeout() {
                return Err(e.into());
            }
        }

        while let Some(line) = console.read_line() {
            if reading_secret {
                reading_secret = false;
                console.set_echo(true);
                console.set_prompt(&prompt);
                console.print(&format!("(secret of {} characters)", line.chars().count()));
                continue;
            }

            match line.trim() {
                "" => {}
                "quit" | "exit" => {
                    console.print("bye");
                    console.close();
                    info!(?peer, "client quit");
                    return Ok(());
                }
                "size" => {
                    let windowed = console.relayout();
                    let (rows, cols) = console.terminal_size();
                    console.print(&format!(
                        "{} rows x {} cols{}",
                        rows,
                        cols,
                        if windowed { "" } else { " (unwindowed)" }
                    ));
                }
                "clear" => console.clear_output(),
                "secret" => {
                    reading_secret = true;
                    console.set_prompt("secret: ");
                    console.set_echo(false);
                }
                other => {
                    let echoed = format!("{}{}", prompt, other);
                    console.print(&echoed);
                }
            }
        }
    }

    info!(?peer, "client disconnected");
    Ok(())
}
