use std::path::PathBuf;

#[derive(Debug)]
pub enum Error {
    MalformedManifest(String),
    BadSignature,
    SignatureInvalid,
    MissingFile(PathBuf),
    HashMismatch(PathBuf),
    UnsafePath(String),
    EmptyManifest,
    ReadFile(PathBuf, std::io::Error),
    BadPublicKey(PathBuf),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::MalformedManifest(reason) => write!(f, "malformed manifest: {reason}"),
            Error::BadSignature => write!(f, "manifest signature field is missing or not valid base64"),
            Error::SignatureInvalid => write!(f, "manifest signature does not verify against the embedded public key"),
            Error::MissingFile(path) => write!(f, "file listed in manifest is missing from slot: {}", path.display()),
            Error::HashMismatch(path) => write!(f, "file hash does not match manifest: {}", path.display()),
            Error::UnsafePath(path) => write!(f, "manifest references an unsafe path: {path}"),
            Error::EmptyManifest => write!(f, "manifest lists no files"),
            Error::ReadFile(path, err) => write!(f, "failed to read {}: {err}", path.display()),
            Error::BadPublicKey(path) => write!(f, "failed to parse RSA public key from {}", path.display()),
        }
    }
}
