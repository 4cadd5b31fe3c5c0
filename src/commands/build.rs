use super::{input_reader, output_writer};
use crate::armor::{Message, armor};
use crate::cli;
use crate::exit_codes;
use crate::plan::Plan;
use std::io::{Read, Write as _};
use std::process::ExitCode;

pub fn run(args: cli::BuildArgs) -> ExitCode {
    let mut config = String::new();
    let read = input_reader(args.input.as_deref())
        .and_then(|mut r| r.read_to_string(&mut config));
    if let Err(error) = read {
        eprintln!("Error: {error}");
        return exit_codes::exit_code_for_io_error(&error);
    }

    let plan = match Plan::from_config(&config) {
        Ok(plan) => plan,
        Err(error) => {
            eprintln!("Error: {error}");
            return exit_codes::exit_code_for_config_error(&error);
        }
    };

    let armored = match armor(&Message::Plan(plan)) {
        Ok(armored) => armored,
        Err(error) => {
            eprintln!("Error: {error}");
            return exit_codes::exit_code_for_armor_error(&error);
        }
    };

    let write = output_writer(args.output.as_deref())
        .and_then(|mut w| w.write_all(armored.as_bytes()));
    match write {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {error}");
            exit_codes::exit_code_for_io_error(&error)
        }
    }
}
