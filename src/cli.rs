//! Command-line interface for the station catalog.
//!
//! Each subcommand maps to one catalog operation and prints its result as
//! pretty JSON on stdout. Mutating subcommands need an access token from
//! `login`, passed with `--token` or `STATION_TOKEN`.

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;

use crate::auth::{Authenticator, CredentialAuthenticator, Principal};
use crate::catalog::StationCatalog;
use crate::config::Settings;
use crate::import::TextEncoding;
use crate::inventory::HttpInventoryClient;
use crate::logging::{self, LogLevel, Source};
use crate::model::StationFilter;
use crate::stations::Station;
use crate::store::PgStationStore;

pub type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Debug, Parser)]
#[command(
    name = "station-manager",
    version,
    about = "Manage the hydrological monitoring-station catalog"
)]
pub struct Args {
    /// TOML settings file. Without it settings come from the environment.
    #[arg(short, long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Exchange the operator credentials for an access token
    Login {
        #[arg(short, long, env = "STATION_USER")]
        username: String,
        #[arg(short, long, env = "STATION_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// List stations, optionally filtered by flags
    List {
        #[arg(long, value_name = "BOOL")]
        manual: Option<bool>,
        #[arg(long, value_name = "BOOL")]
        forecast: Option<bool>,
    },
    /// Show one station
    Get { code: String },
    /// Create or update a station from a JSON file
    Save {
        file: PathBuf,
        #[command(flatten)]
        auth: TokenArg,
    },
    /// Create or update every station in a JSON array file
    SaveBatch {
        file: PathBuf,
        #[command(flatten)]
        auth: TokenArg,
    },
    /// Remove a station by code
    Delete {
        code: String,
        #[command(flatten)]
        auth: TokenArg,
    },
    /// Import stations from a comma-separated file
    Import {
        file: PathBuf,
        /// utf-8 or latin1
        #[arg(long, default_value_t = TextEncoding::Latin1)]
        encoding: TextEncoding,
        /// Overwrite stations whose code is already stored
        #[arg(long)]
        upsert_existing: bool,
        #[command(flatten)]
        auth: TokenArg,
    },
}

#[derive(Debug, Clone, ClapArgs)]
pub struct TokenArg {
    /// Access token returned by `login`
    #[arg(long, env = "STATION_TOKEN", hide_env_values = true)]
    pub token: String,
}

#[derive(Serialize)]
struct Deleted<'a> {
    code: &'a str,
    deleted: usize,
}

#[derive(Serialize)]
struct Saved {
    saved: usize,
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> CliResult<T> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&text)
        .map_err(|e| format!("invalid station JSON in {}: {}", path.display(), e))?)
}

/// Load settings, install logging and run the selected subcommand.
pub fn run(args: Args) -> CliResult<()> {
    let settings = Settings::load(args.config.as_deref())?;

    let level = settings.log_level.parse().unwrap_or(LogLevel::Info);
    logging::init_logger(level, settings.log_file.as_deref(), false)
        .map_err(|e| format!("cannot initialise logging: {}", e))?;

    let authenticator = CredentialAuthenticator::from_settings(&settings);

    if let Command::Login { username, password } = &args.command {
        let response = authenticator.authenticate(username, password)?;
        return print_json(&response);
    }

    let store = PgStationStore::connect(&settings.database_url, settings.request_timeout())?;
    let inventory = HttpInventoryClient::from_settings(&settings)?;
    let mut catalog = StationCatalog::new(store, inventory);

    let authorize = |auth: &TokenArg| -> CliResult<Principal> {
        authenticator.authorize(&auth.token).map_err(|e| {
            logging::warn(Source::Auth, None, &format!("rejected token: {}", e));
            format!("{} (status {})", e, e.status_code()).into()
        })
    };

    match args.command {
        Command::Login { .. } => Ok(()),
        Command::List { manual, forecast } => {
            let filter = StationFilter {
                manual_data: manual,
                forecast_enabled: forecast,
            };
            let filter = (!filter.is_empty()).then_some(filter);
            print_json(&catalog.list(filter.as_ref())?)
        }
        Command::Get { code } => match catalog.find(&code)? {
            Some(station) => print_json(&station),
            None => Err(format!("station {} not found", code).into()),
        },
        Command::Save { file, auth } => {
            let principal = authorize(&auth)?;
            let station: Station = read_json(&file)?;
            print_json(&catalog.save(&principal, station)?)
        }
        Command::SaveBatch { file, auth } => {
            let principal = authorize(&auth)?;
            let stations: Vec<Station> = read_json(&file)?;
            let saved = catalog.save_many(&principal, stations)?;
            print_json(&Saved { saved })
        }
        Command::Delete { code, auth } => {
            let principal = authorize(&auth)?;
            let deleted = catalog.remove(&principal, &code)?;
            print_json(&Deleted {
                code: &code,
                deleted,
            })
        }
        Command::Import {
            file,
            encoding,
            upsert_existing,
            auth,
        } => {
            let principal = authorize(&auth)?;
            let payload =
                fs::read(&file).map_err(|e| format!("cannot read {}: {}", file.display(), e))?;
            let report = catalog.import(&principal, &payload, encoding, upsert_existing)?;
            print_json(&report)
        }
    }
}
