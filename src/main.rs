use std::error::Error;
use std::io::stdin;
use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::info;

use osc_link::osc::parse_message;
use osc_link::transport::UdpTransport;
use osc_link::{Dispatcher, DispatcherConfig, Message, PacketIO};

#[derive(Parser)]
#[command(name = "osc-link", about = "Send and receive OSC messages over UDP")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one or more messages, e.g. `send --to 127.0.0.1:9000 "/servo/1/position 512"`
    Send {
        /// Destination address
        #[arg(long)]
        to: SocketAddr,
        /// Local address to send from
        #[arg(long, default_value = "0.0.0.0:0")]
        bind: SocketAddr,
        /// Pad every packet with zeros up to the send buffer size
        #[arg(long)]
        pad: bool,
        /// Messages in text form. More than one goes out as a single bundle.
        #[arg(required = true)]
        messages: Vec<String>,
    },
    /// Print incoming messages until Enter is pressed
    Listen {
        /// Local address to listen on
        #[arg(long, default_value = "0.0.0.0:9000")]
        bind: SocketAddr,
        /// Where replies would go; unused by listen itself
        #[arg(long, default_value = "127.0.0.1:9001")]
        remote: SocketAddr,
        /// Only print messages sent to exactly this address
        #[arg(long)]
        filter: Option<String>,
        /// Milliseconds to wait between polls when nothing arrives
        #[arg(long, default_value_t = 50)]
        poll_ms: u64,
    },
}

fn send(
    to: SocketAddr,
    bind: SocketAddr,
    pad: bool,
    texts: &[String],
) -> Result<(), Box<dyn Error>> {
    let messages = texts
        .iter()
        .map(|text| parse_message(text))
        .collect::<Result<Vec<Message>, _>>()?;

    let transport = UdpTransport::new(bind, to);
    transport.open()?;
    let config = DispatcherConfig::default().with_pad_to_buffer(pad);
    let dispatcher = Dispatcher::new(transport, config);
    dispatcher.send_batch(&messages)?;

    for msg in &messages {
        println!("sent {}", msg);
    }
    Ok(())
}

fn listen(
    bind: SocketAddr,
    remote: SocketAddr,
    filter: Option<String>,
    poll_ms: u64,
) -> Result<(), Box<dyn Error>> {
    let config = DispatcherConfig::default().with_poll_interval(Duration::from_millis(poll_ms));
    let dispatcher = Dispatcher::new(UdpTransport::new(bind, remote), config);

    match filter {
        Some(address) => {
            dispatcher.register_handler(&address, |msg| println!("{}", msg));
        }
        None => dispatcher.register_catch_all(|msg| println!("{}", msg)),
    }

    dispatcher.start()?;
    println!("Listening on {} (press enter to exit) ...", bind);

    let mut input = String::new();
    stdin().read_line(&mut input)?;

    dispatcher.stop();
    let stats = dispatcher.stats();
    info!(
        "{} packets, {} messages, {} malformed",
        stats.packets_received, stats.messages_dispatched, stats.malformed_packets
    );
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Send {
            to,
            bind,
            pad,
            messages,
        } => send(to, bind, pad, &messages),
        Command::Listen {
            bind,
            remote,
            filter,
            poll_ms,
        } => listen(bind, remote, filter, poll_ms),
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}
