//! walkv CLI Client
//!
//! Command-line interface for interacting with a walkv server.

use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::net::TcpStream;

use clap::{Parser, Subcommand};

/// walkv CLI
#[derive(Parser, Debug)]
#[command(name = "walkv-cli")]
#[command(about = "CLI for the walkv key-value store")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:4000")]
    server: String,

    /// Run one command and exit; without one, start an interactive prompt
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

        /// The value to set (words are joined with single spaces)
        #[arg(required = true, num_args = 1..)]
        value: Vec<String>,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },
}

impl Commands {
    fn to_line(&self) -> String {
        match self {
            Commands::Get { key } => format!("GET {}", key),
            Commands::Set { key, value } => format!("SET {} {}", key, value.join(" ")),
            Commands::Del { key } => format!("DEL {}", key),
        }
    }
}

/// A connected client
struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    fn connect(addr: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    /// Send one request line and read one response line
    fn request(&mut self, line: &str) -> io::Result<String> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;

        let mut response = String::new();
        if self.reader.read_line(&mut response)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            ));
        }
        Ok(response.trim_end_matches(['\r', '\n']).to_string())
    }
}

fn main() {
    let args = Args::parse();

    let mut client = match Client::connect(&args.server) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to connect to {}: {}", args.server, e);
            std::process::exit(1);
        }
    };

    match args.command {
        Some(command) => match client.request(&command.to_line()) {
            Ok(response) => {
                println!("{}", response);
                // A stored value that starts with the error prefix is
                // indistinguishable from an error reply and exits 1 too
                if response.starts_with(walkv::protocol::ERROR_PREFIX) {
                    std::process::exit(1);
                }
            }
            Err(e) => {
                eprintln!("Request failed: {}", e);
                std::process::exit(1);
            }
        },
        None => {
            if let Err(e) = interactive(&mut client, &args.server) {
                eprintln!("Session ended: {}", e);
                std::process::exit(1);
            }
        }
    }
}

/// Prompt loop: forwards each line to the server until `exit` or EOF
fn interactive(client: &mut Client, server: &str) -> io::Result<()> {
    println!("Connected to {}. Enter commands (SET/GET/DEL). Type 'exit' to quit.", server);

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut line = String::new();

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(());
        }

        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        if command.eq_ignore_ascii_case("exit") {
            return Ok(());
        }

        let response = client.request(command)?;
        println!("{}", response);
    }
}
