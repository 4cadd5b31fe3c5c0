mod armor;
mod builder;
mod cli;
mod commands;
mod config;
mod crypto;
mod cryptex;
mod dag;
mod driver;
mod exit_codes;
#[cfg(test)]
mod fixtures;
mod graph;
mod material;
mod node;
mod payload;
mod plan;
mod render;
mod seal;
mod secret;
mod sskg;
mod vault;
mod wire;

use clap::{CommandFactory, Parser};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    let Some(command) = cli.command else {
        let mut cmd = cli::Cli::command();
        cmd.print_help().expect("help to be printed");
        println!();
        return ExitCode::from(exit_codes::EXIT_USAGE);
    };

    commands::dispatch(command)
}
