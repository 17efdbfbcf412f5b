use std::fs;
use std::fs::File;
use std::io;
use std::path::Path;
use std::time::Duration;

use log::{debug, info};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::error::Error;
use crate::util::retry_loop;

const HTTP_TIMEOUT_SECS: u64 = 30;
const MAX_FETCH_RETRY: u32 = 3;

/// Remote update metadata. No integrity metadata lives here: trust is
/// anchored entirely in the manifest inside the downloaded payload.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateInfo {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Url")]
    pub url: String,
}

pub struct UpdateFetcher {
    client: Client,
    update_info_url: String,
    scratch_zip_path: std::path::PathBuf,
}

impl UpdateFetcher {
    pub fn new(update_info_url: String, scratch_zip_path: std::path::PathBuf) -> Result<Self, Error> {
        let client = Client::builder().timeout(Duration::from_secs(HTTP_TIMEOUT_SECS)).build().map_err(Error::BuildClient)?;

        Ok(Self { client, update_info_url, scratch_zip_path })
    }

    /// GETs and parses `update.json`.
    pub fn fetch_info(&self) -> Result<UpdateInfo, Error> {
        retry_loop(
            || {
                let response = self.client.get(&self.update_info_url).send()?;
                if !response.status().is_success() {
                    return Err(Error::GetRequestFailed(response.status()));
                }
                let info: UpdateInfo = response.json()?;
                Ok(info)
            },
            MAX_FETCH_RETRY,
        )
    }

    /// Downloads the payload archive and installs it into `slot_dir`: full
    /// wipe then flat extract. If this is interrupted partway, `slot_dir`
    /// is left partially populated and will simply fail verification on the
    /// next cycle, which re-attempts the whole install.
    pub fn download_and_install(&self, slot_dir: &Path, info: &UpdateInfo) -> Result<(), Error> {
        info!("downloading update payload from {}", info.url);

        let mut response = self.client.get(&info.url).send().map_err(|err| Error::InstallFailure { stage: "download", source: io::Error::new(io::ErrorKind::Other, err) })?;

        if !response.status().is_success() {
            return Err(Error::GetRequestFailed(response.status()));
        }

        let mut zip_file = File::create(&self.scratch_zip_path).map_err(|err| Error::InstallFailure { stage: "create_scratch_file", source: err })?;
        response.copy_to(&mut zip_file).map_err(|err| Error::InstallFailure { stage: "write_scratch_file", source: io::Error::new(io::ErrorKind::Other, err) })?;

        if slot_dir.exists() {
            fs::remove_dir_all(slot_dir).map_err(|err| Error::InstallFailure { stage: "wipe_slot", source: err })?;
        }
        fs::create_dir_all(slot_dir).map_err(|err| Error::InstallFailure { stage: "recreate_slot", source: err })?;

        extract_flat(&self.scratch_zip_path, slot_dir)?;

        debug!("installed payload into {}", slot_dir.display());
        Ok(())
    }
}

fn extract_flat(zip_path: &Path, dest_dir: &Path) -> Result<(), Error> {
    let zip_file = File::open(zip_path).map_err(|err| Error::InstallFailure { stage: "open_archive", source: err })?;
    let mut archive = zip::ZipArchive::new(zip_file).map_err(|err| Error::InstallFailure { stage: "read_archive", source: io::Error::new(io::ErrorKind::InvalidData, err) })?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|err| Error::InstallFailure { stage: "read_archive_entry", source: io::Error::new(io::ErrorKind::InvalidData, err) })?;

        if entry.is_dir() {
            continue;
        }

        let Some(name) = entry.enclosed_name().and_then(|p| p.file_name().map(|n| n.to_owned())) else {
            continue;
        };

        let out_path = dest_dir.join(name);
        let mut out_file = File::create(&out_path).map_err(|err| Error::InstallFailure { stage: "write_extracted_file", source: err })?;
        io::copy(&mut entry, &mut out_file).map_err(|err| Error::InstallFailure { stage: "write_extracted_file", source: err })?;
    }

    Ok(())
}
