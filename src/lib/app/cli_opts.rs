use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use crate::app::{ApplicationCommand, ApplicationConfig, ApplicationOutput};
use crate::error::Error;
use clap::{arg, command, value_parser, ArgMatches, Command};

fn parse_output_format(value: &str) -> Result<ApplicationOutput, String> {
    match value {
        "json" => Ok(ApplicationOutput::Json),
        "binary" => Ok(ApplicationOutput::Binary),
        "line" => Ok(ApplicationOutput::Line),
        _ => Err(format!(
            "Unknown format {value}, only json, binary and line are allowed"
        )),
    }
}

fn parse_config_file_location(value: &str) -> Result<ApplicationConfig, String> {
    let path: PathBuf = match value.parse() {
        Ok(path) => path,
        _ => return Err(format!("Cannot parse {value} as file path")),
    };

    if !path.is_file() {
        return Err(format!("Configuration file {value} does not exist"));
    }

    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .ok_or_else(|| format!("Configuration file {value} does not have extension"))?;

    let config: ApplicationConfig = match extension {
        "toml" => {
            let mut content = String::new();

            File::open(&path)
                .map_err(|e| e.to_string())?
                .read_to_string(&mut content)
                .map_err(|e| e.to_string())?;

            toml::from_str(&content).map_err(|e| e.to_string())?
        }
        "json" => serde_json::from_reader(File::open(&path).map_err(|e| e.to_string())?)
            .map_err(|e| e.to_string())?,
        _ => return Err(format!("Configuration file {value} is not supported")),
    };

    config.validate().map_err(|e| e.to_string())?;

    Ok(config)
}

fn cli_command() -> Command {
    command!()
        .propagate_version(true)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            arg!(--"config" <CONFIG>)
                .required(true)
                .value_parser(parse_config_file_location),
        )
        .subcommand(
            Command::new("position")
                .about("Current binary log position and stored checkpoint of every source"),
        )
        .subcommand(
            Command::new("run")
                .about("Streams row changes of every source until interrupted")
                .arg(
                    arg!(--"output" <FORMAT>)
                        .required(false)
                        .value_parser(parse_output_format),
                )
                .arg(arg!(--"non-blocking" "Stop each source at the end of its binary log")),
        )
        .subcommand(
            Command::new("reset")
                .about("Removes stored checkpoint of a source")
                .arg(arg!(<SOURCE> "Source address as host:port or socket path").value_parser(value_parser!(String))),
        )
}

fn command_from_matches(matches: &ArgMatches) -> Result<ApplicationCommand, Error> {
    let configuration = matches
        .get_one::<ApplicationConfig>("config")
        .cloned()
        .ok_or_else(|| Error::Config("--config is required".into()))?;

    match matches.subcommand() {
        Some(("position", _)) => Ok(ApplicationCommand::Position(configuration)),
        Some(("run", args)) => Ok(ApplicationCommand::Run(
            configuration,
            args.get_one::<ApplicationOutput>("output")
                .copied()
                .unwrap_or_default(),
            args.get_flag("non-blocking"),
        )),
        Some(("reset", args)) => Ok(ApplicationCommand::Reset(
            configuration,
            args.get_one::<String>("SOURCE")
                .cloned()
                .ok_or_else(|| Error::Config("source address is required".into()))?,
        )),
        _ => Err(Error::Config("unknown command".into())),
    }
}

pub fn command_from_cli() -> Result<ApplicationCommand, Error> {
    command_from_matches(&cli_command().get_matches())
}
