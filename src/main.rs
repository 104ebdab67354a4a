use anyhow::Result;
use clap::{Arg, ArgAction, Command};

use perfmon::commands;

fn cli() -> Command {
    Command::new("perfmon")
        .version(env!("CARGO_PKG_VERSION"))
        .about("In-process performance monitor: tick rate, memory, disk and uptime")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Config file (defaults to <config dir>/perfmon/config.json)")
                .global(true),
        )
        .subcommand(
            Command::new("run")
                .about("Run the monitor and broadcast summaries to the console")
                .arg(
                    Arg::new("duration")
                        .short('d')
                        .long("duration")
                        .value_name("SECS")
                        .help("Stop after this many seconds instead of waiting for Ctrl-C")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    Arg::new("login")
                        .long("login")
                        .value_name("OBSERVER")
                        .help("Simulate an observer login and print what it would receive"),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("Show the current server state")
                .visible_aliases(["ss", "serverstate"])
                .arg(
                    Arg::new("quick")
                        .short('q')
                        .long("quick")
                        .help("Skip measuring the tick rate over a full window")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Manage the monitor configuration (use 'perfmon config --help' for subcommands)")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(Command::new("show").about("Print the effective configuration"))
                .subcommand(
                    Command::new("init")
                        .about("Write the default configuration file")
                        .arg(
                            Arg::new("force")
                                .short('f')
                                .long("force")
                                .help("Overwrite an existing file")
                                .action(ArgAction::SetTrue),
                        ),
                )
                .subcommand(Command::new("path").about("Print the config file location"))
                .subcommand(Command::new("validate").about("Load and validate the configuration")),
        )
        .subcommand(
            Command::new("version")
                .about("Shows version information")
                .arg(
                    Arg::new("check")
                        .long("check")
                        .help("Ask the update endpoint whether a newer version exists")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("url")
                        .long("url")
                        .value_name("URL")
                        .help("Update endpoint (defaults to update_url from the config)")
                        .requires("check"),
                ),
        )
}

fn main() -> Result<()> {
    perfmon::init_logging();

    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("run", sub_matches)) => commands::run::execute(sub_matches),
        Some(("status", sub_matches)) => commands::status::execute(sub_matches),
        Some(("config", sub_matches)) => commands::config::execute(sub_matches),
        Some(("version", sub_matches)) => commands::version::execute(sub_matches),
        _ => {
            println!("Use 'perfmon --help' for more information.");
            Ok(())
        }
    }
}
