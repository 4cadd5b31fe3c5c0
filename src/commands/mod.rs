mod build;
mod driver;
mod export;
mod import;
mod inspect;
mod lock;
mod prompt;
pub mod store;
mod unlock;

use crate::armor::{ArmorError, Message};
use crate::cli;
use crate::exit_codes;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::ExitCode;

pub fn dispatch(command: cli::Commands) -> ExitCode {
    match command {
        cli::Commands::Build(args) => build::run(args),
        cli::Commands::Lock(args) => lock::run(args),
        cli::Commands::Unlock(args) => unlock::run(args),
        cli::Commands::Inspect(args) => inspect::run(args),
        cli::Commands::Export(args) => export::run(args),
        cli::Commands::Import(args) => import::run(args),
    }
}

pub(crate) fn input_reader(path: Option<&Path>) -> io::Result<Box<dyn Read>> {
    match path {
        Some(path) => Ok(Box::new(File::open(path)?)),
        None => Ok(Box::new(io::stdin())),
    }
}

pub(crate) fn output_writer(path: Option<&Path>) -> io::Result<Box<dyn Write>> {
    match path {
        Some(path) => Ok(Box::new(File::create(path)?)),
        None => Ok(Box::new(io::stdout())),
    }
}

/// Read and unarmor one message from a file or stdin.
pub(crate) fn read_message(path: Option<&Path>) -> Result<Message, MessageError> {
    let mut data = String::new();
    input_reader(path)?.read_to_string(&mut data)?;
    Ok(crate::armor::unarmor(&data)?)
}

pub(crate) enum MessageError {
    Io(io::Error),
    Armor(ArmorError),
}

impl From<io::Error> for MessageError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ArmorError> for MessageError {
    fn from(err: ArmorError) -> Self {
        Self::Armor(err)
    }
}

impl MessageError {
    pub(crate) fn report(&self) -> ExitCode {
        match self {
            Self::Io(error) => {
                eprintln!("Error: {error}");
                exit_codes::exit_code_for_io_error(error)
            }
            Self::Armor(error) => {
                eprintln!("Error: {error}");
                exit_codes::exit_code_for_armor_error(error)
            }
        }
    }
}
