use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use base64::Engine;
use rsa::pkcs1v15;
use rsa::sha2::Sha256;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use serde_json::{Map, Value};
use sha2::Digest;

use crate::canonical::canonical_encode;
use crate::error::Error;
use crate::path_norm::normalize_rel_path;

/// The recognized fields of a slot's manifest, with `signature` already
/// stripped out. Callers that only need the version (e.g. the version
/// oracle's fallback path) can read this without going through a full
/// `verify()` call.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub version: String,
    pub files: BTreeMap<String, String>,
}

fn parse_manifest_json(text: &str) -> Result<Value, Error> {
    serde_json::from_str(text).map_err(|err| Error::MalformedManifest(err.to_string()))
}

fn extract_signature(value: &Value) -> Result<Vec<u8>, Error> {
    let encoded = value.get("signature").and_then(Value::as_str).ok_or(Error::BadSignature)?;

    base64::engine::general_purpose::STANDARD.decode(encoded).map_err(|_| Error::BadSignature)
}

fn extract_files(value: &Value) -> Result<BTreeMap<String, String>, Error> {
    let raw = value
        .get("files")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::MalformedManifest("missing or ill-typed `files`".to_string()))?;

    let mut files = BTreeMap::new();
    for (path, hash) in raw {
        let hash = hash.as_str().ok_or_else(|| Error::MalformedManifest(format!("hash for `{path}` is not a string")))?;
        let normalized = normalize_rel_path(path)?;
        files.insert(normalized, hash.to_lowercase());
    }

    Ok(files)
}

fn extract_version(value: &Value) -> Result<String, Error> {
    let version = value.get("version").and_then(Value::as_str).ok_or_else(|| Error::MalformedManifest("missing or ill-typed `version`".to_string()))?;

    if version.is_empty() {
        return Err(Error::MalformedManifest("`version` is empty".to_string()));
    }

    Ok(version.to_string())
}

/// Builds the canonical "unsigned view" of the manifest: `{version, files}`
/// with every file key already path-normalized, the exact document the
/// signer signed.
fn unsigned_view(version: &str, files: &BTreeMap<String, String>) -> Value {
    let mut file_map = Map::new();
    for (path, hash) in files {
        file_map.insert(path.clone(), Value::String(hash.clone()));
    }

    let mut root = Map::new();
    root.insert("version".to_string(), Value::String(version.to_string()));
    root.insert("files".to_string(), Value::Object(file_map));

    Value::Object(root)
}

/// Parses a manifest file without verifying its signature or hashes.
/// Used by callers (e.g. the version oracle) that only need the declared
/// version and trust the caller to verify separately before acting on it.
pub fn parse(manifest_path: &Path) -> Result<Manifest, Error> {
    let text = fs::read_to_string(manifest_path).map_err(|err| Error::ReadFile(manifest_path.to_path_buf(), err))?;
    let value = parse_manifest_json(&text)?;
    let version = extract_version(&value)?;
    let files = extract_files(&value)?;
    Ok(Manifest { version, files })
}

fn hash_file(path: &Path) -> Result<String, Error> {
    let bytes = fs::read(path).map_err(|err| Error::ReadFile(path.to_path_buf(), err))?;
    let digest = sha2::Sha256::digest(&bytes);
    Ok(hex_lower(&digest))
}

fn hex_lower(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(&mut out, "{:02x}", b).expect("writing to a String cannot fail");
    }
    out
}

/// Verifies a slot's manifest: signature over the canonical `{version,
/// files}` view, then every listed file's SHA-256 on disk. See
/// manifest.json's format in the workspace-level design notes.
pub fn verify(manifest_path: &Path, slot_dir: &Path, public_key: &RsaPublicKey) -> Result<(), Error> {
    let text = fs::read_to_string(manifest_path).map_err(|err| Error::ReadFile(manifest_path.to_path_buf(), err))?;
    let value = parse_manifest_json(&text)?;

    let signature_bytes = extract_signature(&value)?;
    let version = extract_version(&value)?;
    let files = extract_files(&value)?;

    let canonical = canonical_encode(&unsigned_view(&version, &files));

    let verifying_key = pkcs1v15::VerifyingKey::<Sha256>::new(public_key.clone());
    let signature = pkcs1v15::Signature::try_from(signature_bytes.as_slice()).map_err(|_| Error::SignatureInvalid)?;
    verifying_key.verify(&canonical, &signature).map_err(|_| Error::SignatureInvalid)?;

    if files.is_empty() {
        return Err(Error::EmptyManifest);
    }

    for (rel_path, expected_hash) in &files {
        let host_path = slot_dir.join(to_host_separators(rel_path));
        if !host_path.exists() {
            return Err(Error::MissingFile(host_path));
        }

        let actual_hash = hash_file(&host_path)?;
        if &actual_hash != expected_hash {
            return Err(Error::HashMismatch(host_path));
        }
    }

    Ok(())
}

#[cfg(target_os = "windows")]
fn to_host_separators(rel_path: &str) -> String {
    rel_path.replace('/', "\\")
}

#[cfg(not(target_os = "windows"))]
fn to_host_separators(rel_path: &str) -> String {
    rel_path.to_string()
}
