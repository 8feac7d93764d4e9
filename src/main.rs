use anyhow::Context;
use chrono::{Duration, Local};
use clap::{Args, Parser, Subcommand};
use iec61107_rs::constants::ADVERTISED_BAUDRATE;
use iec61107_rs::{
    connect_serial, init_logger_with_verbosity, tariff, Identity, ObisEntry, ObisTable, Profile,
    SerialTransport, Session, SimulatorConfig, TariffProfile, TcpTransport,
};

#[derive(Parser)]
#[command(name = "iec61107-cli")]
#[command(about = "Client and simulator for NEVA MT3xx electricity meters (IEC 61107)")]
struct Cli {
    /// Verbosity: -v info, -vv debug (frames), -vvv trace (raw bytes)
    #[arg(short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LinkArgs {
    /// Serial port for talking to the meter
    #[arg(short, long, default_value = "/dev/ttyUSB0")]
    port: String,

    /// Meter password
    #[arg(long, default_value = "00000000")]
    password: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer requests the way a real meter would
    Simulate {
        /// Serial port to listen on
        #[arg(short, long, default_value = "/dev/ttyUSB0")]
        port: String,

        /// Relay server to connect to instead of a serial port
        #[arg(long)]
        server_ip: Option<String>,

        #[arg(long, default_value_t = 25535)]
        server_port: u16,

        /// Three-character company code
        #[arg(long, default_value = "TPC")]
        company: String,

        /// Device id, up to 16 characters
        #[arg(long, default_value = "NEVAMT324.2303")]
        device: String,

        #[arg(long, default_value = "00000000")]
        password: String,

        /// Own meter address
        #[arg(long, default_value = "")]
        address: String,

        /// Reject requests addressed to a different meter
        #[arg(long)]
        check_address: bool,

        /// Register entries, CODE or CODE:VALUE; valueless date/time
        /// registers resolve to the current clock
        #[arg(short, long)]
        obis: Vec<String>,

        /// Data pushed to the link right after connecting, e.g. a modem
        /// banner ("\n" escapes are expanded)
        #[arg(long)]
        init_data: Option<String>,
    },
    /// Read OBIS registers from a meter
    Read {
        #[command(flatten)]
        link: LinkArgs,

        /// Print the meter identity
        #[arg(short, long)]
        id: bool,

        /// OBIS codes to read, e.g. 00.09.02*FF
        obis: Vec<String>,
    },
    /// Dump raw half-hour load profiles this many days deep
    HalfHours {
        #[command(flatten)]
        link: LinkArgs,

        /// Days back from today, 0..=127
        days_ago: u8,
    },
    /// Read half-hour profiles and aggregate them by tariff
    CalcHalfHours {
        #[command(flatten)]
        link: LinkArgs,

        /// Days back from today, 0..=127
        days_ago: u8,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger_with_verbosity(cli.verbose);

    match cli.command {
        Commands::Simulate {
            port,
            server_ip,
            server_port,
            company,
            device,
            password,
            address,
            check_address,
            obis,
            init_data,
        } => {
            let mut registers = if obis.is_empty() {
                ObisTable::with_clock()
            } else {
                ObisTable::new()
            };
            for arg in &obis {
                let entry = ObisEntry::parse_arg(arg)
                    .with_context(|| format!("invalid --obis argument {arg:?}"))?;
                registers.push(entry);
            }
            let config = SimulatorConfig {
                company,
                device,
                password,
                address,
                check_address,
                advertised_baud: ADVERTISED_BAUDRATE,
                init_data: init_data.map(|s| s.replace("\\n", "\n").into_bytes()),
            };
            if let Some(ip) = server_ip {
                let transport = TcpTransport::connect((ip.as_str(), server_port))
                    .with_context(|| format!("connecting to relay server {ip}:{server_port}"))?;
                Session::new(transport, Profile::NEVA_MT3XX).serve(&config, &registers)?;
            } else {
                let transport = SerialTransport::open(&port)
                    .with_context(|| format!("opening serial port {port}"))?;
                Session::new(transport, Profile::NEVA_MT3XX).serve(&config, &registers)?;
            }
            Ok(())
        }

        Commands::Read { link, id, obis } => {
            let (mut session, identity) = open_session(&link)?;
            if id {
                println!("{}\n{}", identity.company, identity.device);
            }
            for code in &obis {
                let value = session
                    .read_register(code)
                    .with_context(|| format!("reading OBIS {code}"))?;
                println!("{value}");
            }
            session.logout()?;
            Ok(())
        }

        Commands::HalfHours { link, days_ago } => {
            let (mut session, _) = open_session(&link)?;
            let today = Local::now().date_naive();
            for offset in 0..=days_ago {
                let deltas = tariff::read_half_hours(&mut session, offset)?;
                println!("{}", (today - Duration::days(i64::from(offset))).format("%Y.%m.%d"));
                for (index, watts) in deltas.iter().enumerate() {
                    println!("{:02}:{:02} {watts}", index / 2, (index % 2) * 30);
                }
            }
            session.logout()?;
            Ok(())
        }

        Commands::CalcHalfHours { link, days_ago } => {
            let (mut session, _) = open_session(&link)?;
            let profile = TariffProfile::load(&mut session)?;
            let days = profile.collect_days_ago(&mut session, days_ago)?;
            for day in &days {
                if let Some(first) = day.first() {
                    println!("{}", first.timestamp.format("%Y.%m.%d"));
                }
                for record in day {
                    let totals: Vec<String> = record
                        .totals
                        .iter()
                        .map(|wh| format!("{:.2}", *wh as f64 / 1000.0))
                        .collect();
                    println!("{} {}", record.timestamp.format("%H:%M"), totals.join(", "));
                }
            }
            session.logout()?;
            Ok(())
        }
    }
}

/// Opens the serial port, runs the handshake and logs in.
fn open_session(link: &LinkArgs) -> anyhow::Result<(Session<SerialTransport>, Identity)> {
    let mut session =
        connect_serial(&link.port).with_context(|| format!("opening serial port {}", link.port))?;
    let identity = session.connect("").context("mode-C handshake failed")?;
    session.login(&link.password).context("login failed")?;
    Ok((session, identity))
}
