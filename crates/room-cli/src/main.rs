//! roomup binary

use anyhow::Result;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use room_cli::commands::{self, UpgradeArgs};
use room_cli::telemetry::{self, LogFormat};
use std::path::PathBuf;

fn cli() -> Command {
    Command::new("roomup")
        .version(room_cli::VERSION)
        .about("Replace a room with an upgraded successor")
        .subcommand_required(true)
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON on stderr"),
        )
        .subcommand(
            Command::new("upgrade")
                .about("Upgrade a room held in a snapshot file")
                .disable_version_flag(true)
                .arg(
                    Arg::new("snapshot")
                        .long("snapshot")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Homeserver snapshot (JSON)"),
                )
                .arg(
                    Arg::new("room")
                        .long("room")
                        .required(true)
                        .help("Room id to upgrade"),
                )
                .arg(
                    Arg::new("user")
                        .long("user")
                        .required(true)
                        .help("Requesting user id"),
                )
                .arg(
                    Arg::new("version")
                        .long("version")
                        .required(true)
                        .help("Target room version"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("Upgrade configuration (TOML)"),
                )
                .arg(
                    Arg::new("dump")
                        .long("dump")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the resulting homeserver snapshot here"),
                ),
        )
        .subcommand(
            Command::new("versions")
                .about("List room versions an upgrade may target")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("Upgrade configuration (TOML)"),
                ),
        )
}

fn string_arg(matches: &ArgMatches, id: &str) -> String {
    matches.get_one::<String>(id).cloned().unwrap_or_default()
}

async fn run(matches: ArgMatches) -> Result<i32> {
    match matches.subcommand() {
        Some(("upgrade", sub)) => {
            let args = UpgradeArgs {
                snapshot: sub.get_one::<PathBuf>("snapshot").cloned().unwrap_or_default(),
                room: string_arg(sub, "room"),
                user: string_arg(sub, "user"),
                version: string_arg(sub, "version"),
                config: sub.get_one::<PathBuf>("config").cloned(),
                dump: sub.get_one::<PathBuf>("dump").cloned(),
            };
            let response = commands::upgrade(&args).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(if response.is_success() { 0 } else { 1 })
        }
        Some(("versions", sub)) => {
            let config = commands::load_config(sub.get_one::<PathBuf>("config").map(PathBuf::as_path), None)?;
            println!("{}", serde_json::to_string_pretty(&commands::versions(&config))?);
            Ok(0)
        }
        _ => Ok(2),
    }
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    telemetry::init(LogFormat::from_json_flag(matches.get_flag("json-logs")));

    let code = match run(matches).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "roomup failed");
            eprintln!("error: {e:#}");
            1
        }
    };
    std::process::exit(code);
}
