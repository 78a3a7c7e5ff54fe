//! Ed25519 key files.
//!
//! `<prefix>.secret` holds the base64 32-byte seed, `<prefix>.pub` the
//! base64 32-byte verifying key.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{SigningKey, VerifyingKey};

/// Write a fresh keypair, returning the secret and public file paths and
/// the verifying key.
pub fn write_keypair(prefix: &str) -> Result<(String, String, VerifyingKey), String> {
    let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
    let verifying_key = signing_key.verifying_key();

    let secret_path = format!("{}.secret", prefix);
    std::fs::write(&secret_path, BASE64.encode(signing_key.to_bytes()))
        .map_err(|e| format!("error writing secret key to '{}': {}", secret_path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(&secret_path, std::fs::Permissions::from_mode(0o600))
        {
            tracing::warn!(path = %secret_path, error = %e, "could not restrict secret key permissions");
        }
    }

    let pub_path = format!("{}.pub", prefix);
    std::fs::write(&pub_path, BASE64.encode(verifying_key.to_bytes()))
        .map_err(|e| format!("error writing public key to '{}': {}", pub_path, e))?;

    Ok((secret_path, pub_path, verifying_key))
}

fn read_key_bytes(path: &Path, what: &str) -> Result<[u8; 32], String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("error reading {} '{}': {}", what, path.display(), e))?;
    let bytes = BASE64
        .decode(contents.trim())
        .map_err(|e| format!("error decoding {} '{}': {}", what, path.display(), e))?;
    bytes.try_into().map_err(|_| {
        format!(
            "invalid {} length in '{}': expected 32 bytes",
            what,
            path.display()
        )
    })
}

pub fn read_secret_key(path: &Path) -> Result<SigningKey, String> {
    read_key_bytes(path, "secret key").map(|b| SigningKey::from_bytes(&b))
}

pub fn read_public_key(path: &Path) -> Result<VerifyingKey, String> {
    let bytes = read_key_bytes(path, "public key")?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| format!("invalid public key material in '{}': {}", path.display(), e))
}
