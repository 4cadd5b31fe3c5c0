use super::driver::TerminalDriver;
use super::store::{Db, default_db_dir};
use super::{output_writer, read_message};
use crate::armor::Message;
use crate::cli;
use crate::exit_codes::{self, EXIT_PARTIAL, EXIT_USAGE};
use std::process::ExitCode;

pub fn run(args: cli::UnlockArgs) -> ExitCode {
    let vault = match read_message(args.input.as_deref()) {
        Ok(Message::Vault(vault)) => vault,
        Ok(_) => {
            eprintln!("Error: could not load vault file");
            return ExitCode::from(EXIT_USAGE);
        }
        Err(error) => return error.report(),
    };

    let db_dir = match args.db_dir.map_or_else(default_db_dir, Ok) {
        Ok(dir) => dir,
        Err(error) => {
            eprintln!("Error: {error}");
            return exit_codes::exit_code_for_store_error(&error);
        }
    };

    let db = match Db::for_vault(&db_dir, &vault) {
        Ok(db) => db,
        Err(error) => {
            eprintln!("Error: {error}");
            return exit_codes::exit_code_for_store_error(&error);
        }
    };

    let openpgp_dir = args
        .openpgp_dir
        .or_else(|| dirs::home_dir().map(|home| home.join(".gnupg")));
    let mut drv = TerminalDriver::new(db, None, openpgp_dir);

    let mut writer = match output_writer(args.output.as_deref()) {
        Ok(writer) => writer,
        Err(error) => {
            eprintln!("Error: {error}");
            return exit_codes::exit_code_for_io_error(&error);
        }
    };

    let unlocked = match vault.unlock(&mut writer, &mut drv) {
        Ok(unlocked) => unlocked,
        Err(error) => {
            eprintln!("Error: {error}");
            return exit_codes::exit_code_for_vault_error(&error);
        }
    };

    // intermediate progress is kept even when the unlock is partial
    if let Err(error) = drv.db_mut().commit() {
        if let Err(rollback_error) = drv.db_mut().rollback() {
            eprintln!("Error: {rollback_error}");
        }
        eprintln!("Error: {error}");
        return exit_codes::exit_code_for_store_error(&error);
    }

    if unlocked {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_PARTIAL)
    }
}
