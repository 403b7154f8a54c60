use chrono::{DateTime, FixedOffset, Local, Utc};
use clap::{Parser, Subcommand};
use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use flood_monitor::alert::{gateway_from_config, DispatchOutcome};
use flood_monitor::config::{self, MonitorConfig, Secrets};
use flood_monitor::db::open_store;
use flood_monitor::ingest::HttpReadingSource;
use flood_monitor::logging::{self, Component};
use flood_monitor::model::ReadingKind;
use flood_monitor::predict::PredictionService;
use flood_monitor::render::render_dashboard;
use flood_monitor::session::Session;
use flood_monitor::verify;

#[derive(Parser)]
#[command(name = "flood_monitor", about = "River level and flood risk monitor")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive dashboard (default)
    Run,
    /// Re-fetch and redraw on every refresh interval
    Watch {
        /// Override refresh.interval_secs
        #[arg(long)]
        interval_secs: Option<u64>,
        /// Stop after this many refreshes
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// Evaluate once and exit
    Once,
    /// Check reading endpoints, model files and SMS configuration
    Verify {
        /// Emit the report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

/// One line typed into the interactive dashboard.
#[derive(Debug, PartialEq)]
enum ConsoleInput {
    Refresh,
    Override(ReadingKind, f64),
    Moderate(f64),
    Severe(f64),
    Send,
    Reset,
    Help,
    Quit,
}

fn parse_input(line: &str) -> Result<ConsoleInput, String> {
    let mut parts = line.split_whitespace();
    let word = parts.next().unwrap_or("refresh").to_ascii_lowercase();
    let mut number = || -> Result<f64, String> {
        let raw = parts.next().ok_or_else(|| format!("`{}` needs a value", word))?;
        raw.replace(',', ".")
            .parse::<f64>()
            .map_err(|e| format!("`{}`: {}", raw, e))
    };
    match word.as_str() {
        "refresh" | "r" => Ok(ConsoleInput::Refresh),
        "level" => Ok(ConsoleInput::Override(ReadingKind::River, number()?)),
        "rain" => Ok(ConsoleInput::Override(ReadingKind::Rain, number()?)),
        "moderate" => Ok(ConsoleInput::Moderate(number()?)),
        "severe" => Ok(ConsoleInput::Severe(number()?)),
        "send" => Ok(ConsoleInput::Send),
        "reset" => Ok(ConsoleInput::Reset),
        "help" | "?" => Ok(ConsoleInput::Help),
        "quit" | "exit" | "q" => Ok(ConsoleInput::Quit),
        other => Err(format!("unknown command `{}` (type `help`)", other)),
    }
}

const HELP: &str = "\
Commands:
  refresh            re-fetch river level and rainfall
  level <m>          set the current river level by hand
  rain <mm>          set today's rainfall by hand
  moderate <m>       set the moderate risk threshold
  severe <m>         set the severe risk threshold
  send               dispatch the SMS alert (severe risk only)
  reset              allow another SMS for the same conditions
  quit";

fn site_now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

fn build_session(config: &MonitorConfig, secrets: &Secrets) -> Result<Session, Box<dyn Error>> {
    let timeout = Duration::from_secs(config.sources.timeout_secs);
    let source = HttpReadingSource::new(
        &config.sources.river_level_url,
        &config.sources.rain_volume_url,
        timeout,
    )?;
    let predictions = PredictionService::load(&config.models);
    let gateway = gateway_from_config(&config.sms, secrets.sms_token.clone(), timeout)?;
    let store = open_store(secrets.database_url.as_deref());

    Ok(Session::start(
        &config.site.city,
        config.thresholds(),
        Box::new(source),
        predictions,
        gateway,
        store,
        Utc::now(),
    ))
}

fn draw(session: &mut Session) {
    let evaluation = session.evaluate(site_now());
    println!("{}", render_dashboard(session.city(), &evaluation));
}

fn run_interactive(mut session: Session) -> Result<(), Box<dyn Error>> {
    draw(&mut session);
    println!("{}", HELP);

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let input = match parse_input(&line) {
            Ok(input) => input,
            Err(msg) => {
                println!("{}", msg);
                continue;
            }
        };

        match input {
            ConsoleInput::Quit => break,
            ConsoleInput::Help => {
                println!("{}", HELP);
                continue;
            }
            ConsoleInput::Refresh => session.refresh(Utc::now()),
            ConsoleInput::Override(kind, value) => {
                if let Err(e) = session.override_reading(kind, value, Utc::now()) {
                    println!("{}", e);
                }
            }
            ConsoleInput::Moderate(value) => {
                if let Err(e) = session.set_moderate_threshold(value) {
                    println!("{}", e);
                }
            }
            ConsoleInput::Severe(value) => {
                if let Err(e) = session.set_severe_threshold(value) {
                    println!("{}", e);
                }
            }
            ConsoleInput::Send => match session.send_alert(site_now()) {
                DispatchOutcome::Sent => println!("SMS alert sent."),
                DispatchOutcome::NotOffered => println!("No SMS alert is on offer for the current conditions."),
                DispatchOutcome::Failed(e) => println!("Failed to send SMS: {}. Check the gateway logs.", e),
            },
            ConsoleInput::Reset => session.reset_alert(),
        }

        draw(&mut session);
    }
    Ok(())
}

fn run_watch(mut session: Session, interval: Duration, cycles: Option<u64>) {
    let mut count: u64 = 0;
    loop {
        draw(&mut session);
        count += 1;
        if cycles.is_some_and(|limit| count >= limit) {
            break;
        }
        std::thread::sleep(interval);
        session.refresh(Utc::now());
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let secrets = Secrets::from_env();
    let config = config::load_config(&cli.config)?;

    logging::init_logger(
        config.log_level()?,
        config.logging.file.as_deref(),
        config.logging.timestamps,
    );
    logging::info(
        Component::System,
        &format!("Flood monitor starting for {} ({})", config.site.city, cli.config.display()),
    );

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_interactive(build_session(&config, &secrets)?)?,
        Command::Watch { interval_secs, cycles } => {
            let interval = Duration::from_secs(interval_secs.unwrap_or(config.refresh.interval_secs).max(1));
            run_watch(build_session(&config, &secrets)?, interval, cycles);
        }
        Command::Once => draw(&mut build_session(&config, &secrets)?),
        Command::Verify { json } => {
            let report = verify::run_full_verification(&config, &secrets)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                verify::print_summary(&report);
            }
        }
    }
    Ok(())
}
