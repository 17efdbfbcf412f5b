use std::path::{Path, PathBuf};
use std::time::Duration;

use argh::FromArgs;
use directories::ProjectDirs;

const DEFAULT_UPDATE_INFO_URL: &str = "http://localhost:8000/update.json";
const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 5;
const DEFAULT_HEARTBEAT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_BINARY_NAME: &str = "MeineApp";

/// Fallback verification key, embedded at build time. Used whenever
/// `--public-key-path` is not given on the command line.
pub const DEFAULT_PUBLIC_KEY_PEM: &str = include_str!("default_public_key.pem");

#[derive(FromArgs, Debug)]
/// Run the self-updating launcher: verify the active slot, refresh the
/// inactive one in the background, then start the active binary with
/// fallback to the previous slot on verification or launch failure.
pub struct Args {
    /// directory holding the A/B slots and the active-slot marker
    #[argh(option)]
    base_path: Option<String>,

    /// URL to fetch update metadata from
    #[argh(option)]
    update_info_url: Option<String>,

    /// path to a PEM-encoded RSA public key used to verify manifests,
    /// overriding the embedded default key
    #[argh(option)]
    public_key_path: Option<String>,

    /// name of the binary inside a slot directory to launch
    #[argh(option)]
    binary_name: Option<String>,

    /// seconds between heartbeat liveness checks
    #[argh(option)]
    heartbeat_interval_secs: Option<u64>,

    /// seconds of silence before a running process is considered unresponsive
    #[argh(option)]
    heartbeat_timeout_secs: Option<u64>,
}

/// Resolved launcher configuration. Built from CLI arguments with
/// platform-appropriate defaults filled in for anything left unspecified.
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    pub base_path: PathBuf,
    pub update_info_url: String,
    /// explicit override path for the verification key; `None` means use
    /// the embedded [`DEFAULT_PUBLIC_KEY_PEM`]
    pub public_key_path: Option<PathBuf>,
    pub binary_name: String,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
}

impl LauncherConfig {
    pub fn from_args(args: Args) -> Self {
        Self {
            base_path: args.base_path.map(PathBuf::from).unwrap_or_else(default_base_path),
            update_info_url: args.update_info_url.unwrap_or_else(|| DEFAULT_UPDATE_INFO_URL.to_string()),
            public_key_path: args.public_key_path.map(PathBuf::from),
            binary_name: args.binary_name.unwrap_or_else(|| DEFAULT_BINARY_NAME.to_string()),
            heartbeat_interval: Duration::from_secs(args.heartbeat_interval_secs.unwrap_or(DEFAULT_HEARTBEAT_INTERVAL_SECS)),
            heartbeat_timeout: Duration::from_secs(args.heartbeat_timeout_secs.unwrap_or(DEFAULT_HEARTBEAT_TIMEOUT_SECS)),
        }
    }

    pub fn binary_path(&self, slot_dir: &Path) -> PathBuf {
        if cfg!(target_os = "windows") {
            slot_dir.join(format!("{}.exe", self.binary_name))
        } else {
            slot_dir.join(&self.binary_name)
        }
    }
}

fn default_base_path() -> PathBuf {
    ProjectDirs::from("com", "MeineFirma", "MeineApp")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./MeineApp-data"))
}
