use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::Error;

const ACTIVE_MARKER_FILENAME: &str = "active.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub fn other(self) -> Slot {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }

    fn letter(self) -> &'static str {
        match self {
            Slot::A => "A",
            Slot::B => "B",
        }
    }

    fn from_letter(letter: &str) -> Option<Slot> {
        match letter.trim() {
            "A" => Some(Slot::A),
            "B" => Some(Slot::B),
            _ => None,
        }
    }
}

/// Owns the `active.txt` marker and the two slot directories under
/// `base_dir`. Verification and process startup only ever read from a
/// slot directory; this is the only component that creates, deletes, or
/// replaces one.
pub struct SlotStore {
    base_dir: PathBuf,
}

impl SlotStore {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn marker_path(&self) -> PathBuf {
        self.base_dir.join(ACTIVE_MARKER_FILENAME)
    }

    pub fn path_of(&self, slot: Slot) -> PathBuf {
        self.base_dir.join(slot.letter())
    }

    /// Reads the active slot, bootstrapping on first run: if the marker is
    /// absent, it is created with value "A" and the A slot directory is
    /// created empty. This side effect only happens once, on a fresh
    /// `base_dir`.
    pub fn read_active(&self) -> Result<Slot, Error> {
        fs::create_dir_all(&self.base_dir).map_err(|err| Error::CreateDirectory(self.base_dir.clone(), err))?;

        let marker_path = self.marker_path();
        match fs::read_to_string(&marker_path) {
            Ok(contents) => Ok(Slot::from_letter(&contents).unwrap_or(Slot::A)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("no active marker at {}, bootstrapping slot A", marker_path.display());
                self.write_active(Slot::A)?;
                fs::create_dir_all(self.path_of(Slot::A)).map_err(|err| Error::CreateDirectory(self.path_of(Slot::A), err))?;
                Ok(Slot::A)
            }
            Err(err) => Err(Error::ReadFile(marker_path, err)),
        }
    }

    /// Overwrites the active marker. This is the atomic commit point of any
    /// update: a crash before this write leaves the previous active slot
    /// untouched.
    pub fn write_active(&self, slot: Slot) -> Result<(), Error> {
        let marker_path = self.marker_path();
        fs::write(&marker_path, slot.letter()).map_err(|err| Error::WriteFile(marker_path, err))
    }

    /// Removes both slot directories and recreates an empty base
    /// directory. The catastrophic escape hatch: the next run re-bootstraps
    /// from scratch.
    pub fn wipe_all(&self) -> Result<(), Error> {
        for slot in [Slot::A, Slot::B] {
            let path = self.path_of(slot);
            if path.exists() {
                fs::remove_dir_all(&path).map_err(Error::CatastrophicWipeFailed)?;
            }
        }

        let marker_path = self.marker_path();
        if marker_path.exists() {
            fs::remove_file(&marker_path).map_err(Error::CatastrophicWipeFailed)?;
        }

        fs::create_dir_all(&self.base_dir).map_err(Error::CatastrophicWipeFailed)
    }
}

pub fn manifest_path(slot_dir: &Path) -> PathBuf {
    slot_dir.join("manifest.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn read_active_bootstraps_slot_a_on_first_run() {
        let dir = tempdir().unwrap();
        let store = SlotStore::new(dir.path().join("MeineApp"));

        let active = store.read_active().unwrap();
        assert_eq!(active, Slot::A);
        assert!(store.path_of(Slot::A).is_dir());
        assert!(dir.path().join("MeineApp").join(ACTIVE_MARKER_FILENAME).is_file());
    }

    #[test]
    fn write_then_read_round_trips_across_calls() {
        let dir = tempdir().unwrap();
        let store = SlotStore::new(dir.path().to_path_buf());

        store.read_active().unwrap();
        store.write_active(Slot::B).unwrap();
        assert_eq!(store.read_active().unwrap(), Slot::B);
    }

    #[test]
    fn missing_marker_file_defaults_to_a() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path()).unwrap();
        let store = SlotStore::new(dir.path().to_path_buf());

        assert_eq!(store.read_active().unwrap(), Slot::A);
    }

    #[test]
    fn wipe_all_removes_both_slots_and_marker() {
        let dir = tempdir().unwrap();
        let store = SlotStore::new(dir.path().to_path_buf());

        store.read_active().unwrap();
        fs::create_dir_all(store.path_of(Slot::B)).unwrap();
        fs::write(store.path_of(Slot::B).join("payload.bin"), b"x").unwrap();

        store.wipe_all().unwrap();

        assert!(!store.path_of(Slot::A).exists());
        assert!(!store.path_of(Slot::B).exists());
        assert!(!store.marker_path().exists());

        // next run re-bootstraps cleanly
        assert_eq!(store.read_active().unwrap(), Slot::A);
    }

    #[test]
    fn other_slot_flips_between_a_and_b() {
        assert_eq!(Slot::A.other(), Slot::B);
        assert_eq!(Slot::B.other(), Slot::A);
    }
}
