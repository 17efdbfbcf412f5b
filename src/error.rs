use std::fmt::Debug;
use std::path::PathBuf;

#[derive(Debug)]
pub enum Error {
    ReadFile(PathBuf, std::io::Error),
    WriteFile(PathBuf, std::io::Error),
    CreateDirectory(PathBuf, std::io::Error),
    GetRequestFailed(reqwest::StatusCode),
    BuildClient(reqwest::Error),
    Http(reqwest::Error),
    Manifest(manifest::Error),
    LaunchFailed(std::io::Error),
    CatastrophicWipeFailed(std::io::Error),
    InstallFailure { stage: &'static str, source: std::io::Error },
    NoStartableSlot,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::ReadFile(path, err) => write!(f, "failed to read {}: {err}", path.display()),
            Error::WriteFile(path, err) => write!(f, "failed to write {}: {err}", path.display()),
            Error::CreateDirectory(path, err) => write!(f, "failed to create directory {}: {err}", path.display()),
            Error::GetRequestFailed(status) => write!(f, "GET request returned status code {status}"),
            Error::BuildClient(err) => write!(f, "failed to build HTTP client: {err}"),
            Error::Http(err) => write!(f, "HTTP request failed: {err}"),
            Error::Manifest(err) => write!(f, "{err}"),
            Error::LaunchFailed(err) => write!(f, "failed to launch child process: {err}"),
            Error::CatastrophicWipeFailed(err) => write!(f, "failed to wipe slot state: {err}"),
            Error::InstallFailure { stage, source } => write!(f, "install failed at stage '{stage}': {source}"),
            Error::NoStartableSlot => write!(f, "neither slot verified and started successfully"),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err)
    }
}

impl From<manifest::Error> for Error {
    fn from(err: manifest::Error) -> Self {
        Error::Manifest(err)
    }
}
