use std::fs;
use std::path::{Path, PathBuf};

use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;

use crate::error::Error;

/// Loads an RSA public key from a PEM file, accepting either PKCS#8
/// (`-----BEGIN PUBLIC KEY-----`) or PKCS#1 (`-----BEGIN RSA PUBLIC
/// KEY-----`) framing.
pub fn load_public_key_pem(path: &Path) -> Result<RsaPublicKey, Error> {
    let pem = fs::read_to_string(path).map_err(|err| Error::ReadFile(path.to_path_buf(), err))?;

    parse_public_key_pem(&pem).map_err(|_| Error::BadPublicKey(path.to_path_buf()))
}

/// Parses an RSA public key from PEM text already held in memory (e.g. a
/// compile-time embedded default), accepting the same PKCS#8/PKCS#1 framing
/// as [`load_public_key_pem`].
pub fn parse_public_key_pem(pem: &str) -> Result<RsaPublicKey, Error> {
    RsaPublicKey::from_public_key_pem(pem).or_else(|_| RsaPublicKey::from_pkcs1_pem(pem)).map_err(|_| Error::BadPublicKey(PathBuf::from("<embedded>")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use rsa::pkcs8::EncodePublicKey;
    use rsa::RsaPrivateKey;
    use tempfile::tempdir;

    #[test]
    fn loads_pkcs8_pem_key() {
        let private_key = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let public_key = RsaPublicKey::from(&private_key);
        let pem = public_key.to_public_key_pem(Default::default()).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("key.pem");
        fs::write(&path, pem).unwrap();

        let loaded = load_public_key_pem(&path).unwrap();
        assert_eq!(loaded, public_key);
    }

    #[test]
    fn rejects_garbage_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("key.pem");
        fs::write(&path, "not a key").unwrap();

        assert!(matches!(load_public_key_pem(&path), Err(Error::BadPublicKey(_))));
    }

    #[test]
    fn parses_pkcs8_pem_string() {
        let private_key = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let public_key = RsaPublicKey::from(&private_key);
        let pem = public_key.to_public_key_pem(Default::default()).unwrap();

        let parsed = parse_public_key_pem(&pem).unwrap();
        assert_eq!(parsed, public_key);
    }

    #[test]
    fn rejects_garbage_string() {
        assert!(matches!(parse_public_key_pem("not a key"), Err(Error::BadPublicKey(_))));
    }
}
