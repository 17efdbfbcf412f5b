mod canonical;
pub use canonical::canonical_encode;

mod path_norm;
pub use path_norm::normalize_rel_path;

mod error;
pub use error::Error;

mod verify;
pub use verify::{verify, Manifest};

mod keys;
pub use keys::{load_public_key_pem, parse_public_key_pem};
pub use rsa::RsaPublicKey;
