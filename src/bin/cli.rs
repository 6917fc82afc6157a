//! kvdb CLI Client
//!
//! Runs one command, or an interactive shell when no subcommand is given.

use std::io::{self, BufRead, Write};

use clap::{Parser, Subcommand};
use kvdb::protocol::{Command, Response};
use kvdb::{Client, KvdbError};
use tracing_subscriber::{fmt, EnvFilter};

const HELP_MESSAGE: &str = "Commands
    GET <KEY>:          Fetch value of <KEY> from server
    SET <KEY> <VALUE>:  Set <KEY> to <VALUE>
    DELETE <KEY>:       Delete <KEY> from server
    HELP:               Print this message
    QUIT:               Leave the shell

    Note: Commands are case insensitive
";

/// kvdb CLI
#[derive(Parser, Debug)]
#[command(name = "kvdb-cli")]
#[command(about = "CLI for the kvdb key-value store")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:1337")]
    server: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    #[command(alias = "del")]
    Delete {
        /// The key to delete
        key: String,
    },
}

impl From<Commands> for Command {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Get { key } => Command::Get { key: key.into_bytes() },
            Commands::Set { key, value } => Command::Set {
                key: key.into_bytes(),
                value: value.into_bytes(),
            },
            Commands::Delete { key } => Command::Delete { key: key.into_bytes() },
        }
    }
}

/// One parsed shell line
enum ShellInput {
    Command(Command),
    Help,
    Quit,
    Empty,
    Invalid(String),
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(false).init();

    let args = Args::parse();

    let mut client = match Client::connect(&args.server) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Failed to connect to {}: {}", args.server, e);
            std::process::exit(1);
        }
    };

    match args.command {
        Some(command) => {
            let command = Command::from(command);
            let result = client.send(&command);
            if !print_outcome(&command, result) {
                std::process::exit(1);
            }
        }
        None => {
            println!("Connected to {}", args.server);
            if let Err(e) = shell(&mut client) {
                tracing::error!("Shell stopped: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn shell(client: &mut Client) -> io::Result<()> {
    let stdin = io::stdin();
    prompt()?;

    for line in stdin.lock().lines() {
        match parse_line(&line?) {
            ShellInput::Command(command) => {
                let result = client.send(&command);
                let lost = connection_lost(&result);
                print_outcome(&command, result);
                if lost {
                    println!("Connection lost");
                    return Ok(());
                }
            }
            ShellInput::Help => print!("{}", HELP_MESSAGE),
            ShellInput::Quit => return Ok(()),
            ShellInput::Empty => {}
            ShellInput::Invalid(reason) => println!("{}", reason),
        }
        prompt()?;
    }

    Ok(())
}

fn prompt() -> io::Result<()> {
    print!("> ");
    io::stdout().flush()
}

fn parse_line(line: &str) -> ShellInput {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(first) = parts.first() else {
        return ShellInput::Empty;
    };

    let verb = first.to_uppercase();
    match (verb.as_str(), parts.len() - 1) {
        ("GET", 1) => ShellInput::Command(Command::Get {
            key: parts[1].as_bytes().to_vec(),
        }),
        ("GET", n) => ShellInput::Invalid(format!(
            "GET command takes exactly one argument. Got {}.",
            n
        )),
        ("SET", 2) => ShellInput::Command(Command::Set {
            key: parts[1].as_bytes().to_vec(),
            value: parts[2].as_bytes().to_vec(),
        }),
        ("SET", n) => ShellInput::Invalid(format!("SET command takes two arguments. Got {}.", n)),
        ("DELETE" | "DEL", 1) => ShellInput::Command(Command::Delete {
            key: parts[1].as_bytes().to_vec(),
        }),
        ("DELETE" | "DEL", n) => {
            ShellInput::Invalid(format!("DELETE command takes one argument. Got {}.", n))
        }
        ("HELP", _) => ShellInput::Help,
        ("QUIT" | "EXIT", _) => ShellInput::Quit,
        (other, _) => ShellInput::Invalid(format!("Unknown Command '{}'\n{}", other, HELP_MESSAGE)),
    }
}

/// Whether a failed exchange leaves the connection unusable
///
/// I/O errors and malformed or truncated responses both mean the stream can
/// no longer be trusted. Oversized keys and values are rejected before
/// anything is sent.
fn connection_lost(result: &kvdb::Result<Response>) -> bool {
    matches!(result, Err(KvdbError::Io(_) | KvdbError::Protocol(_)))
}

/// Print the result of one command; true on success
fn print_outcome(command: &Command, result: kvdb::Result<Response>) -> bool {
    match result {
        Ok(response) if response.is_ok() => {
            match command {
                Command::Get { .. } => {
                    let value = response.message.unwrap_or_default();
                    println!("{}", String::from_utf8_lossy(&value));
                }
                _ => println!("Success!"),
            }
            true
        }
        Ok(response) => {
            println!("ERROR: Server responded with error code {}", response.error_code);
            false
        }
        Err(e) => {
            println!("ERROR: {}", e);
            false
        }
    }
}
