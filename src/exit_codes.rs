use crate::armor::ArmorError;
use crate::commands::store::StoreError;
use crate::config::ConfigError;
use crate::vault::VaultError;
use std::process::ExitCode;

pub const EXIT_SOFTWARE: u8 = 1;
pub const EXIT_IO: u8 = 2;
pub const EXIT_USAGE: u8 = 64;

/// Partial unlock: the vault did not open, try again with more inputs.
pub const EXIT_PARTIAL: u8 = 1;

pub fn exit_code_for_config_error(error: &ConfigError) -> ExitCode {
    use ConfigError::*;

    match error {
        Parse { .. } | UnknownKey { .. } | MissingKey { .. } | DuplicateKey { .. }
        | InvalidValue { .. } | UnknownSection(_) | MissingRootCryptex(_)
        | MissingEdgeTarget(_) => ExitCode::from(EXIT_USAGE),
        Graph(_) | Cryptex(_) | Secret(_) => ExitCode::from(EXIT_SOFTWARE),
    }
}

pub fn exit_code_for_armor_error(error: &ArmorError) -> ExitCode {
    use ArmorError::*;

    match error {
        InvalidPem | UnknownBlockType(_) | Base64 => ExitCode::from(EXIT_USAGE),
        DigestMismatch | Wire(_) | Vault(_) => ExitCode::from(EXIT_SOFTWARE),
    }
}

pub fn exit_code_for_vault_error(error: &VaultError) -> ExitCode {
    use VaultError::*;

    match error {
        AlreadyLocked | NotLocked | LockSecretUnavailable(_) => ExitCode::from(EXIT_USAGE),
        Io(_) | Driver(_) => ExitCode::from(EXIT_IO),
        MissingOutput | MissingRootKey | Graph(_) | Cryptex(_) | Material(_) | Payload(_)
        | Seal(_) | Wire(_) => ExitCode::from(EXIT_SOFTWARE),
    }
}

pub fn exit_code_for_store_error(error: &StoreError) -> ExitCode {
    use StoreError::*;

    match error {
        Io(_) => ExitCode::from(EXIT_IO),
        Wire(_) | Vault(_) | Unbound => ExitCode::from(EXIT_SOFTWARE),
        HomeDirUnavailable => ExitCode::from(EXIT_USAGE),
    }
}

pub fn exit_code_for_io_error(_: &std::io::Error) -> ExitCode {
    ExitCode::from(EXIT_IO)
}
