use std::process::ExitCode;

use clap::Parser;

use zenctl::cli::{C6Action, Cli, Command};
use zenctl::commands;
use zenctl::config::ZenctlConfig;
use zenctl::cpu;
use zenctl::logger;
use zenctl::msr::MsrTransport;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    let config = match ZenctlConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            log::error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    if !cpu::is_amd() {
        log::warn!(
            "processor does not identify as {}; the register layout may not apply",
            cpu::AMD_VENDOR
        );
    }
    log::debug!("{} logical CPUs reported by the OS", cpu::logical_count());

    let transport = MsrTransport::with_root(config.device_root.clone());

    let result = match cli.command {
        Command::List => commands::list(&transport),
        Command::Pstate {
            slot,
            enable,
            disable,
            fid,
            did,
            vid,
        } => {
            let update = commands::PStateUpdate {
                enable,
                disable,
                fid,
                did,
                vid,
            };
            commands::modify_pstate(&transport, &config, usize::from(slot), update)
        }
        Command::C6 { action } => {
            commands::set_c6(&transport, &config, matches!(action, C6Action::Enable))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
