use super::read_message;
use super::store::{Db, default_db_dir};
use crate::armor::Message;
use crate::cli;
use crate::exit_codes::{self, EXIT_SOFTWARE};
use crate::material::Material;
use crate::plan::Plan;
use crate::render::{self, RenderNode};
use crate::vault::Vault;
use std::process::ExitCode;

pub fn run(args: cli::InspectArgs) -> ExitCode {
    match read_message(args.input.as_deref()) {
        Ok(Message::Material(mtrl)) => inspect_material(&mtrl),
        Ok(Message::Plan(plan)) => inspect_plan(&plan),
        Ok(Message::Vault(vault)) => inspect_vault(&vault, args.db_dir),
        Err(error) => error.report(),
    }
}

fn inspect_material(mtrl: &Material) -> ExitCode {
    println!("material {}", hex::encode(&mtrl.id));
    if !mtrl.comment().is_empty() {
        println!();
        println!("\t{}", mtrl.comment());
    }
    ExitCode::SUCCESS
}

fn inspect_plan(plan: &Plan) -> ExitCode {
    println!("plan {}", hex::encode(plan.digest()));
    if !plan.comment().is_empty() {
        println!();
        println!("\t{}", plan.comment());
    }
    println!();

    match render::plan_graph(plan) {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("Error: {error}");
            ExitCode::from(EXIT_SOFTWARE)
        }
    }
}

fn inspect_vault(vault: &Vault, db_dir: Option<std::path::PathBuf>) -> ExitCode {
    let digest = match vault.digest() {
        Ok(digest) => digest,
        Err(error) => {
            eprintln!("Error: {error}");
            return exit_codes::exit_code_for_vault_error(&error);
        }
    };

    println!("vault {}", hex::encode(digest));
    if !vault.comment().is_empty() {
        println!();
        println!("\t{}", vault.comment());
    }
    println!();
    println!("plan {}", hex::encode(vault.plan.digest()));
    if !vault.plan.comment().is_empty() {
        println!();
        println!("\t{}", vault.plan.comment());
    }
    println!();

    let db = db_dir
        .map_or_else(default_db_dir, Ok)
        .and_then(|dir| Db::for_vault(&dir, vault));
    let db = match db {
        Ok(db) => db,
        Err(error) => {
            eprintln!("Error: {error}");
            return exit_codes::exit_code_for_store_error(&error);
        }
    };

    // solved nodes have material on hand and render as 'S'
    let mut nodes = Vec::with_capacity(vault.plan.nodes.len());
    let walked = vault.plan.bfs(|node| -> Result<(), crate::dag::GraphError> {
        let id = node.digest();
        let solved = db.load(&id).ok().flatten().is_some()
            || vault.materials.iter().any(|m| m.id == id);
        nodes.push(RenderNode {
            id,
            edges: node.inputs.clone(),
            marker: if solved { 'S' } else { '*' },
            detail: render::node_detail(node),
        });
        Ok(())
    });

    let lines = walked.and_then(|()| render::lines(&nodes));
    match lines {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("Error: {error}");
            ExitCode::from(EXIT_SOFTWARE)
        }
    }
}
