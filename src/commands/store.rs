//! File-backed material store.
//!
//! Materials live at `{base_dir}/{hex(vault.digest)}/{hex(node.digest)}`.
//! Writes accumulate in an in-memory shadow map; `commit()` flushes them to
//! disk with the write-temp, persist pattern and `rollback()` removes
//! whatever a failed commit left behind. The vault subdirectory is bound
//! lazily, because a vault has no digest until locking completes, and is
//! created on first commit.

use crate::material::Material;
use crate::vault::{Vault, VaultError};
use crate::wire::WireError;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error("store is not bound to a vault")]
    Unbound,

    #[error("unable to determine home directory")]
    HomeDirUnavailable,
}

/// `~/.vcrypt/db` unless overridden.
pub fn default_db_dir() -> Result<PathBuf, StoreError> {
    let mut dir = dirs::home_dir().ok_or(StoreError::HomeDirUnavailable)?;
    dir.push(".vcrypt");
    dir.push("db");
    Ok(dir)
}

pub struct Db {
    base_dir: PathBuf,
    dir: Option<PathBuf>,
    shadow: HashMap<String, Vec<u8>>,
}

impl Db {
    /// A store with no vault directory yet; reads see only the shadow until
    /// `bind` is called.
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            dir: None,
            shadow: HashMap::new(),
        }
    }

    pub fn for_vault(base_dir: &Path, vault: &Vault) -> Result<Self, StoreError> {
        let mut db = Self::new(base_dir);
        db.bind(vault)?;
        Ok(db)
    }

    /// Point the store at the vault's subdirectory. Requires a locked vault.
    pub fn bind(&mut self, vault: &Vault) -> Result<(), StoreError> {
        self.dir = Some(self.base_dir.join(hex::encode(vault.digest()?)));
        Ok(())
    }

    pub fn load(&self, id: &[u8]) -> Result<Option<Material>, StoreError> {
        let name = hex::encode(id);
        if let Some(data) = self.shadow.get(&name) {
            return Ok(Some(Material::unmarshal(data)?));
        }
        let Some(dir) = &self.dir else {
            return Ok(None);
        };

        match fs::read(dir.join(&name)) {
            Ok(data) => Ok(Some(Material::unmarshal(&data)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn store(&mut self, mtrl: &Material) {
        self.shadow.insert(hex::encode(&mtrl.id), mtrl.marshal());
    }

    /// Flush the shadow map to disk. The shadow is kept so a later
    /// `rollback` can still undo a commit whose caller failed afterwards.
    pub fn commit(&mut self) -> Result<(), StoreError> {
        let dir = self.dir.clone().ok_or(StoreError::Unbound)?;
        fs::create_dir_all(&dir)?;

        for (name, data) in &self.shadow {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.as_file_mut().write_all(data)?;
            tmp.as_file_mut().sync_all()?;
            tmp.persist(dir.join(name)).map_err(std::io::Error::from)?;
        }
        Ok(())
    }

    /// Remove anything a partially-applied commit wrote.
    pub fn rollback(&mut self) -> Result<(), StoreError> {
        let dir = self.dir.clone().ok_or(StoreError::Unbound)?;
        for name in self.shadow.keys() {
            match fs::remove_file(dir.join(name)) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        self.shadow.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestDriver;
    use crate::plan::Plan;

    fn locked_vault() -> Vault {
        let plan = Plan::from_config(crate::fixtures::TWO_MAN_PLAN_CONFIG).unwrap();
        let mut vault = Vault::new(plan, "store test");
        let mut drv = TestDriver::new(&[("op 1 secret", "a"), ("op 2 secret", "b")]);
        vault.lock(&mut &b"payload"[..], &mut drv).unwrap();
        vault
    }

    #[test]
    fn stores_are_invisible_on_disk_until_commit() {
        let base = tempfile::tempdir().unwrap();
        let vault = locked_vault();
        let mtrl = Material::new(vec![0xcd; 32], vec![b"data".to_vec()]);

        let mut db = Db::for_vault(base.path(), &vault).unwrap();
        db.store(&mtrl);

        // visible through the shadow, not on disk
        assert_eq!(db.load(&mtrl.id).unwrap().unwrap(), mtrl);
        let fresh = Db::for_vault(base.path(), &vault).unwrap();
        assert!(fresh.load(&mtrl.id).unwrap().is_none());

        db.commit().unwrap();
        let fresh = Db::for_vault(base.path(), &vault).unwrap();
        assert_eq!(fresh.load(&mtrl.id).unwrap().unwrap(), mtrl);

        let path = base
            .path()
            .join(hex::encode(vault.digest().unwrap()))
            .join(hex::encode(&mtrl.id));
        assert!(path.exists());
    }

    #[test]
    fn unbound_store_reads_only_the_shadow() {
        let base = tempfile::tempdir().unwrap();
        let mut db = Db::new(base.path());
        let mtrl = Material::new(vec![0xab; 32], vec![b"data".to_vec()]);

        assert!(db.load(&mtrl.id).unwrap().is_none());
        db.store(&mtrl);
        assert_eq!(db.load(&mtrl.id).unwrap().unwrap(), mtrl);
        assert!(matches!(db.commit(), Err(StoreError::Unbound)));
    }

    #[test]
    fn rollback_discards_pending_writes() {
        let base = tempfile::tempdir().unwrap();
        let vault = locked_vault();
        let mtrl = Material::new(vec![0xee; 32], vec![b"data".to_vec()]);

        let mut db = Db::for_vault(base.path(), &vault).unwrap();
        db.store(&mtrl);
        db.rollback().unwrap();

        assert!(db.load(&mtrl.id).unwrap().is_none());
    }
}
