use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "vcrypt",
    author,
    version,
    about = "Protect a secret payload under a recoverable policy graph."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Build a plan file from plan config.")]
    Build(BuildArgs),

    #[command(about = "Encrypt a payload into a vault governed by a plan.")]
    Lock(LockArgs),

    #[command(about = "Decrypt a vault payload; partial unlocks can be retried later.")]
    Unlock(UnlockArgs),

    #[command(about = "Render a plan, vault, or material file.")]
    Inspect(InspectArgs),

    #[command(about = "Export a single material from the store by node id.")]
    Export(ExportArgs),

    #[command(about = "Import a material file into the store for a vault.")]
    Import(ImportArgs),
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    #[arg(long = "in", value_name = "PATH", help = "Input file - default stdin.")]
    pub input: Option<PathBuf>,

    #[arg(long = "out", value_name = "PATH", help = "Output file - default stdout.")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct LockArgs {
    #[arg(long = "in", value_name = "PATH", help = "Input file - default stdin.")]
    pub input: Option<PathBuf>,

    #[arg(long = "out", value_name = "PATH", help = "Output file - default stdout.")]
    pub output: Option<PathBuf>,

    #[arg(long, value_name = "PATH", help = "Plan file.")]
    pub plan: PathBuf,

    #[arg(long, value_name = "TEXT", help = "Vault comment.")]
    pub comment: Option<String>,

    #[arg(long, value_name = "PATH", help = "Write a detached payload material file.")]
    pub detach: Option<PathBuf>,

    #[arg(
        long = "db-dir",
        value_name = "DIR",
        help = "Material database directory - default ~/.vcrypt/db."
    )]
    pub db_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct UnlockArgs {
    #[arg(long = "in", value_name = "PATH", help = "Vault file - default stdin.")]
    pub input: Option<PathBuf>,

    #[arg(long = "out", value_name = "PATH", help = "Output file - default stdout.")]
    pub output: Option<PathBuf>,

    #[arg(
        long = "db-dir",
        value_name = "DIR",
        help = "Material database directory - default ~/.vcrypt/db."
    )]
    pub db_dir: Option<PathBuf>,

    #[arg(
        long = "openpgp-dir",
        value_name = "DIR",
        help = "OpenPGP keyring directory - default ~/.gnupg."
    )]
    pub openpgp_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    #[arg(long = "in", value_name = "PATH", help = "Data file - default stdin.")]
    pub input: Option<PathBuf>,

    #[arg(
        long = "db-dir",
        value_name = "DIR",
        help = "Material database directory - default ~/.vcrypt/db."
    )]
    pub db_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[arg(long = "in", value_name = "PATH", help = "Vault file - default stdin.")]
    pub input: Option<PathBuf>,

    #[arg(long = "out", value_name = "PATH", help = "Output material file - default stdout.")]
    pub output: Option<PathBuf>,

    #[arg(long, value_name = "HEX", help = "Node id prefix.")]
    pub id: String,

    #[arg(
        long = "db-dir",
        value_name = "DIR",
        help = "Material database directory - default ~/.vcrypt/db."
    )]
    pub db_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[arg(long = "in", value_name = "PATH", help = "Material file - default stdin.")]
    pub input: Option<PathBuf>,

    #[arg(long, value_name = "PATH", help = "Vault file.")]
    pub vault: PathBuf,

    #[arg(
        long = "db-dir",
        value_name = "DIR",
        help = "Material database directory - default ~/.vcrypt/db."
    )]
    pub db_dir: Option<PathBuf>,
}
