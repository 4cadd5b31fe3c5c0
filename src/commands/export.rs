use super::store::{Db, default_db_dir};
use super::{output_writer, read_message};
use crate::armor::{Message, armor};
use crate::cli;
use crate::exit_codes::{self, EXIT_USAGE};
use std::io::Write as _;
use std::process::ExitCode;

pub fn run(args: cli::ExportArgs) -> ExitCode {
    let vault = match read_message(args.input.as_deref()) {
        Ok(Message::Vault(vault)) => vault,
        Ok(_) => {
            eprintln!("Error: could not load vault file");
            return ExitCode::from(EXIT_USAGE);
        }
        Err(error) => return error.report(),
    };

    let prefix = match hex::decode(&args.id) {
        Ok(prefix) => prefix,
        Err(error) => {
            eprintln!("Error: invalid node id: {error}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    // resolve the short id against the plan's nodes
    let mut full_id: Option<Vec<u8>> = None;
    let walked = vault.plan.bfs(|node| -> Result<(), crate::dag::GraphError> {
        if full_id.is_none() {
            let id = node.digest();
            if id.starts_with(&prefix) {
                full_id = Some(id);
            }
        }
        Ok(())
    });
    if let Err(error) = walked {
        eprintln!("Error: {error}");
        return exit_codes::exit_code_for_vault_error(&error.into());
    }
    let Some(full_id) = full_id else {
        eprintln!("Error: no node matches id '{}'", args.id);
        return ExitCode::from(EXIT_USAGE);
    };

    let db = args
        .db_dir
        .map_or_else(default_db_dir, Ok)
        .and_then(|dir| Db::for_vault(&dir, &vault));
    let db = match db {
        Ok(db) => db,
        Err(error) => {
            eprintln!("Error: {error}");
            return exit_codes::exit_code_for_store_error(&error);
        }
    };

    let mtrl = match db.load(&full_id) {
        Ok(Some(mtrl)) => Some(mtrl),
        Ok(None) => vault.materials.iter().find(|m| m.id == full_id).cloned(),
        Err(error) => {
            eprintln!("Error: {error}");
            return exit_codes::exit_code_for_store_error(&error);
        }
    };
    let Some(mtrl) = mtrl else {
        eprintln!("Error: no material stored for node '{}'", args.id);
        return ExitCode::from(EXIT_USAGE);
    };

    let armored = match armor(&Message::Material(mtrl)) {
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
