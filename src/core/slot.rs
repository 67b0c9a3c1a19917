use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// The environment of one execution slot, carried explicitly instead of
/// mutating the process-wide environment.
///
/// Every child process the bootstrap spawns gets this overlay applied on
/// top of its inherited environment: `HOME` pinned inside the slot, the
/// search path with the slot's tools first, and the activation variables
/// once an environment is active.
#[derive(Debug, Clone)]
pub struct SlotEnv {
    pub workdir: PathBuf,
    pub home: PathBuf,
    path: Vec<PathBuf>,
    vars: BTreeMap<String, String>,
}

impl SlotEnv {
    /// Slot environment with `HOME` pinned to the working directory,
    /// isolating the installation from any pre-existing user environment.
    /// The search path is seeded from the parent process.
    pub fn isolated(workdir: impl Into<PathBuf>) -> Self {
        let workdir = workdir.into();
        let path = std::env::var_os("PATH")
            .map(|p| std::env::split_paths(&p).collect())
            .unwrap_or_default();
        Self {
            home: workdir.clone(),
            workdir,
            path,
            vars: BTreeMap::new(),
        }
    }

    /// Put `dir` at the front of the search path so its tools resolve
    /// before any system-wide equivalents. An existing occurrence is
    /// moved, not duplicated.
    pub fn prepend_path(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        self.path.retain(|p| p != &dir);
        self.path.insert(0, dir);
    }

    /// Switch interpreter and library resolution to the named environment.
    /// Idempotent per environment name.
    pub fn activate(&mut self, name: &str, env_dir: impl Into<PathBuf>) {
        if self.active_env() == Some(name) {
            return;
        }
        let env_dir = env_dir.into();
        self.prepend_path(env_dir.join("bin"));
        self.vars.insert(
            "CONDA_PREFIX".to_string(),
            env_dir.to_string_lossy().into_owned(),
        );
        self.vars
            .insert("CONDA_DEFAULT_ENV".to_string(), name.to_string());
    }

    pub fn active_env(&self) -> Option<&str> {
        self.vars.get("CONDA_DEFAULT_ENV").map(String::as_str)
    }

    /// Resolve a program through the slot's search path, the same way a
    /// child process would.
    pub fn which(&self, program: &str) -> Option<PathBuf> {
        self.path
            .iter()
            .map(|dir| dir.join(program))
            .find(|candidate| is_executable(candidate))
    }

    pub fn search_path(&self) -> Result<OsString> {
        std::env::join_paths(&self.path).context("Failed to join slot search path")
    }

    /// The variable overlay applied to every child process.
    pub fn to_env(&self) -> Result<Vec<(OsString, OsString)>> {
        let mut env = vec![
            (OsString::from("HOME"), self.home.clone().into_os_string()),
            (OsString::from("PATH"), self.search_path()?),
        ];
        for (key, value) in &self.vars {
            env.push((OsString::from(key), OsString::from(value)));
        }
        Ok(env)
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepend_moves_existing_entry_to_front() {
        let mut slot = SlotEnv::isolated("/slot");
        slot.prepend_path("/a");
        slot.prepend_path("/b");
        slot.prepend_path("/a");

        let path = slot.search_path().unwrap();
        let entries: Vec<_> = std::env::split_paths(&path).collect();
        assert_eq!(entries[0], PathBuf::from("/a"));
        assert_eq!(entries[1], PathBuf::from("/b"));
        assert_eq!(entries.iter().filter(|p| **p == PathBuf::from("/a")).count(), 1);
    }

    #[test]
    fn activate_sets_vars_and_front_of_path() {
        let mut slot = SlotEnv::isolated("/slot");
        slot.activate("distill", "/slot/miniconda3/envs/distill");

        assert_eq!(slot.active_env(), Some("distill"));
        let entries: Vec<_> = std::env::split_paths(&slot.search_path().unwrap()).collect();
        assert_eq!(entries[0], PathBuf::from("/slot/miniconda3/envs/distill/bin"));

        let env = slot.to_env().unwrap();
        assert!(env.contains(&(
            OsString::from("CONDA_DEFAULT_ENV"),
            OsString::from("distill")
        )));
    }

    #[test]
    fn activate_is_idempotent() {
        let mut slot = SlotEnv::isolated("/slot");
        slot.activate("distill", "/slot/miniconda3/envs/distill");
        let before = slot.search_path().unwrap();
        slot.activate("distill", "/slot/miniconda3/envs/distill");
        assert_eq!(before, slot.search_path().unwrap());
    }

    #[test]
    fn home_is_pinned_inside_the_slot() {
        let slot = SlotEnv::isolated("/scratch/slot_1");
        let env = slot.to_env().unwrap();
        assert!(env.contains(&(OsString::from("HOME"), OsString::from("/scratch/slot_1"))));
    }

    #[test]
    fn which_finds_executables_on_the_slot_path() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("mytool");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let mut slot = SlotEnv::isolated("/slot");
        slot.prepend_path(dir.path());
        assert_eq!(slot.which("mytool"), Some(tool));
        assert_eq!(slot.which("definitely-missing"), None);
    }
}
