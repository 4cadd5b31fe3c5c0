use super::read_message;
use super::store::{Db, default_db_dir};
use crate::armor::Message;
use crate::cli;
use crate::exit_codes::{self, EXIT_USAGE};
use std::process::ExitCode;

pub fn run(args: cli::ImportArgs) -> ExitCode {
    let mtrl = match read_message(args.input.as_deref()) {
        Ok(Message::Material(mtrl)) => mtrl,
        Ok(_) => {
            eprintln!("Error: could not load material file");
            return ExitCode::from(EXIT_USAGE);
        }
        Err(error) => return error.report(),
    };

    let vault = match read_message(Some(&args.vault)) {
        Ok(Message::Vault(vault)) => vault,
        Ok(_) => {
            eprintln!("Error: could not load vault file");
            return ExitCode::from(EXIT_USAGE);
        }
        Err(error) => return error.report(),
    };

    // the material must belong to a node of this vault's plan
    let mut found = false;
    let walked = vault.plan.bfs(|node| -> Result<(), crate::dag::GraphError> {
        if !found && node.digest() == mtrl.id {
            found = true;
        }
        Ok(())
    });
    if let Err(error) = walked {
        eprintln!("Error: {error}");
        return exit_codes::exit_code_for_vault_error(&error.into());
    }
    if !found {
        eprintln!(
            "Error: missing node '{}' for vault",
            hex::encode(&mtrl.id[..mtrl.id.len().min(8)])
        );
        return ExitCode::from(EXIT_USAGE);
    }

    let db = args
        .db_dir
        .map_or_else(default_db_dir, Ok)
        .and_then(|dir| Db::for_vault(&dir, &vault));
    let mut db = match db {
        Ok(db) => db,
        Err(error) => {
            eprintln!("Error: {error}");
            return exit_codes::exit_code_for_store_error(&error);
        }
    };

    db.store(&mtrl);
    match db.commit() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            if let Err(rollback_error) = db.rollback() {
                eprintln!("Error: {rollback_error}");
            }
            eprintln!("Error: {error}");
            exit_codes::exit_code_for_store_error(&error)
        }
    }
}
