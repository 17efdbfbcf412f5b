use std::env;

use log::{error, info, warn};
use manifest::RsaPublicKey;

use crate::config::{LauncherConfig, DEFAULT_PUBLIC_KEY_PEM};
use crate::error::Error;
use crate::fetch::UpdateFetcher;
use crate::slot::{manifest_path, Slot, SlotStore};
use crate::supervisor::Supervisor;
use crate::version::{is_up_to_date, local_version};

const SCRATCH_ZIP_FILENAME: &str = "MeineApp_Update.zip";

/// The top-level state machine: update the inactive slot, then start the
/// active slot with fallback to the inactive one, retrying the whole
/// sequence once before giving up and wiping state. A single long-lived
/// `String` narrates progress for an (out-of-scope) UI shell to display.
pub struct Orchestrator {
    config: LauncherConfig,
    slots: SlotStore,
    fetcher: UpdateFetcher,
    public_key: RsaPublicKey,
    status: String,
    supervisor: Option<Supervisor>,
}

impl Orchestrator {
    pub fn new(config: LauncherConfig) -> Result<Self, Error> {
        let slots = SlotStore::new(config.base_path.clone());
        let fetcher = UpdateFetcher::new(config.update_info_url.clone(), env::temp_dir().join(SCRATCH_ZIP_FILENAME))?;
        let public_key = match &config.public_key_path {
            Some(path) => manifest::load_public_key_pem(path)?,
            None => manifest::parse_public_key_pem(DEFAULT_PUBLIC_KEY_PEM)?,
        };

        Ok(Self {
            config,
            slots,
            fetcher,
            public_key,
            status: "initialized".to_string(),
            supervisor: None,
        })
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn supervisor(&self) -> Option<&Supervisor> {
        self.supervisor.as_ref()
    }

    pub fn supervisor_mut(&mut self) -> Option<&mut Supervisor> {
        self.supervisor.as_mut()
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
        info!("{}", self.status);
    }

    /// Runs one full launcher cycle: bootstrap, refresh, start with
    /// fallback, and (if that fails) one full retry before wiping state.
    /// On success the running child is reachable via `supervisor()`.
    pub fn run(&mut self) -> Result<(), Error> {
        self.bootstrap()?;
        self.refresh_inactive();

        if self.start_with_fallback().is_ok() {
            return Ok(());
        }

        warn!("no slot started on first attempt, retrying with a fresh fetch");
        self.set_status("retrying after failed start, re-fetching update");
        self.refresh_inactive();

        match self.start_with_fallback() {
            Ok(()) => Ok(()),
            Err(err) => {
                error!("both slots unverifiable after retry, wiping state: {err}");
                self.set_status("both slots unverifiable, wiping launcher state");
                self.slots.wipe_all()?;
                Err(Error::NoStartableSlot)
            }
        }
    }

    fn bootstrap(&mut self) -> Result<(), Error> {
        self.slots.read_active()?;
        Ok(())
    }

    /// Fetches update metadata and installs into the inactive slot if the
    /// remote version is newer than both slots already on disk. Every
    /// failure here is recorded as status and swallowed: this phase never
    /// propagates an error to `run()`.
    fn refresh_inactive(&mut self) {
        let info = match self.fetcher.fetch_info() {
            Ok(info) => info,
            Err(err) => {
                self.set_status(format!("update check failed: {err}"));
                return;
            }
        };

        let active = match self.slots.read_active() {
            Ok(slot) => slot,
            Err(err) => {
                self.set_status(format!("failed to read active slot: {err}"));
                return;
            }
        };
        let inactive = active.other();

        let active_version = local_version(&self.slots.path_of(active));
        if is_up_to_date(&active_version, &info.version) {
            self.set_status("active slot already current");
            return;
        }

        let inactive_version = local_version(&self.slots.path_of(inactive));
        if is_up_to_date(&inactive_version, &info.version) {
            self.set_status("inactive slot already current");
            return;
        }

        let inactive_dir = self.slots.path_of(inactive);
        match self.fetcher.download_and_install(&inactive_dir, &info) {
            Ok(()) => match self.slots.write_active(inactive) {
                Ok(()) => self.set_status(format!("updated to {}", info.version)),
                Err(err) => self.set_status(format!("installed but failed to commit active marker: {err}")),
            },
            Err(err) => self.set_status(format!("install into inactive slot failed: {err}")),
        }
    }

    /// Re-reads active/inactive (refresh may have flipped them), tries the
    /// active slot first, then falls back to the inactive one. Returns
    /// `Err(NoStartableSlot)` only if neither verifies and starts.
    fn start_with_fallback(&mut self) -> Result<(), Error> {
        let primary = self.slots.read_active()?;
        let secondary = primary.other();

        match self.try_start(primary) {
            Ok(supervisor) => {
                self.set_status(format!("slot {primary:?} started"));
                self.supervisor = Some(supervisor);
                return Ok(());
            }
            Err(err) => warn!("slot {primary:?} failed to verify or start: {err}"),
        }

        match self.try_start(secondary) {
            Ok(supervisor) => {
                self.slots.write_active(secondary)?;
                self.set_status(format!("fell back to slot {secondary:?}"));
                self.supervisor = Some(supervisor);
                Ok(())
            }
            Err(err) => {
                warn!("slot {secondary:?} failed to verify or start: {err}");
                Err(Error::NoStartableSlot)
            }
        }
    }

    fn try_start(&self, slot: Slot) -> Result<Supervisor, Error> {
        let slot_dir = self.slots.path_of(slot);
        manifest::verify(&manifest_path(&slot_dir), &slot_dir, &self.public_key)?;

        let binary_path = self.config.binary_path(&slot_dir);
        Supervisor::spawn_with_timing(&binary_path, &slot_dir, self.config.heartbeat_interval, self.config.heartbeat_timeout)
    }
}
