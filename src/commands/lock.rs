use super::driver::TerminalDriver;
use super::store::{Db, default_db_dir};
use super::{input_reader, output_writer, read_message};
use crate::armor::{Message, armor};
use crate::cli;
use crate::exit_codes::{self, EXIT_USAGE};
use crate::vault::Vault;
use std::io::Write as _;
use std::process::ExitCode;

pub fn run(args: cli::LockArgs) -> ExitCode {
    let plan = match read_message(Some(&args.plan)) {
        Ok(Message::Plan(plan)) => plan,
        Ok(_) => {
            eprintln!("Error: could not load plan file");
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

    let mut reader = match input_reader(args.input.as_deref()) {
        Ok(reader) => reader,
        Err(error) => {
            eprintln!("Error: {error}");
            return exit_codes::exit_code_for_io_error(&error);
        }
    };

    let mut vault = Vault::new(plan, args.comment.unwrap_or_default());
    let mut drv = TerminalDriver::new(Db::new(&db_dir), args.detach, None);

    if let Err(error) = vault.lock(&mut reader, &mut drv) {
        eprintln!("Error: {error}");
        return exit_codes::exit_code_for_vault_error(&error);
    }

    let armored = match armor(&Message::Vault(vault.clone())) {
        Ok(armored) => armored,
        Err(error) => {
            eprintln!("Error: {error}");
            return exit_codes::exit_code_for_armor_error(&error);
        }
    };

    // the store directory is keyed by the digest that locking just defined
    let db = drv.db_mut();
    let committed = db.bind(&vault).and_then(|()| db.commit());
    if let Err(error) = committed {
        eprintln!("Error: {error}");
        return exit_codes::exit_code_for_store_error(&error);
    }

    let write = output_writer(args.output.as_deref())
        .and_then(|mut w| w.write_all(armored.as_bytes()));
    match write {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {error}");
            if let Err(rollback_error) = drv.db_mut().rollback() {
                eprintln!("Error: {rollback_error}");
            }
            exit_codes::exit_code_for_io_error(&error)
        }
    }
}
