use anyhow::{Context, Result};
use openssl::pkey::PKey;
use openssl::rsa::Rsa;

const KEY_BITS: u32 = 2048;

/// Generates an RSA key pair for token signing. Returns `(public, private)`
/// in PEM encoding.
pub fn generate_rsa_keys() -> Result<(Vec<u8>, Vec<u8>)> {
    let rsa = Rsa::generate(KEY_BITS).context("generate rsa key")?;
    let pkey = PKey::from_rsa(rsa).context("wrap rsa key")?;

    let public_key = pkey.public_key_to_pem().context("encode rsa public key")?;
    let private_key = pkey
        .private_key_to_pem_pkcs8()
        .context("encode rsa private key")?;

    Ok((public_key, private_key))
}
