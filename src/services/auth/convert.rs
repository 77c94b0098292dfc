//! Key Converter: raw JWK record -> `VerificationKey`.
//!
//! Pure; no I/O. Supported key types:
//! - `RSA` (`n`, `e`)
//! - `EC` (`crv` P-256 / P-384, `x`, `y`)
//! - `OKP` (`crv` Ed25519, `x`)
//! - `oct` (`k`)
//!
//! Key material is checked here, not at signature time: a record the crypto backend
//! could never verify with is a `MalformedKey`, never a rejected token.
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::DecodingKey;

use crate::services::auth::error::AuthError;
use crate::services::auth::jwks::PublicKeyRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Rsa,
    Ec,
    Okp,
    Oct,
}

/// Key usable by the signature primitive. Lives for one verification call.
#[derive(Clone)]
pub struct VerificationKey {
    family: KeyFamily,
    kid: Option<String>,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("VerificationKey")
            .field("family", &self.family)
            .field("kid", &self.kid)
            .finish()
    }
}

impl VerificationKey {
    pub fn family(&self) -> KeyFamily {
        self.family
    }

    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

pub fn convert(record: &PublicKeyRecord) -> Result<VerificationKey, AuthError> {
    let kty = record
        .kty()
        .ok_or_else(|| AuthError::malformed_key("missing 'kty'"))?;

    let (family, decoding_key) = match kty {
        "RSA" => (KeyFamily::Rsa, rsa_key(record)?),
        "EC" => (KeyFamily::Ec, ec_key(record)?),
        "OKP" => (KeyFamily::Okp, okp_key(record)?),
        "oct" => (KeyFamily::Oct, oct_key(record)?),
        other => {
            return Err(AuthError::malformed_key(format!(
                "unsupported key type '{other}'"
            )));
        }
    };

    Ok(VerificationKey {
        family,
        kid: record.kid().map(str::to_owned),
        decoding_key,
    })
}

// Accepted by the signature backend (RS*/PS* with 2048..=8192 bit moduli).
const RSA_MIN_MODULUS_BITS: usize = 2048;
const RSA_MAX_MODULUS_BITS: usize = 8192;

fn rsa_key(record: &PublicKeyRecord) -> Result<DecodingKey, AuthError> {
    let n = required_b64(record, "n")?;
    let e = required_b64(record, "e")?;

    check_rsa_modulus(&decode_b64(n, "n")?)?;
    check_rsa_exponent(&decode_b64(e, "e")?)?;

    DecodingKey::from_rsa_components(n, e)
        .map_err(|err| AuthError::malformed_key(format!("invalid rsa components: {err}")))
}

fn check_rsa_modulus(n: &[u8]) -> Result<(), AuthError> {
    let (Some(&first), Some(&last)) = (n.first(), n.last()) else {
        return Err(AuthError::malformed_key("'n' is empty"));
    };
    if first == 0 {
        return Err(AuthError::malformed_key("'n' has a leading zero byte"));
    }

    let bits = n.len() * 8 - first.leading_zeros() as usize;
    if !(RSA_MIN_MODULUS_BITS..=RSA_MAX_MODULUS_BITS).contains(&bits) {
        return Err(AuthError::malformed_key(format!(
            "rsa modulus of {bits} bits is outside {RSA_MIN_MODULUS_BITS}..={RSA_MAX_MODULUS_BITS}"
        )));
    }
    if last & 1 == 0 {
        return Err(AuthError::malformed_key("rsa modulus is even"));
    }
    Ok(())
}

// Odd, 3 <= e <= 2^32 - 1.
fn check_rsa_exponent(e: &[u8]) -> Result<(), AuthError> {
    if e.first().is_none_or(|byte| *byte == 0) || e.len() > 4 {
        return Err(AuthError::malformed_key("'e' is not a valid rsa exponent"));
    }

    let value = e.iter().fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));
    if value < 3 || value % 2 == 0 {
        return Err(AuthError::malformed_key(format!(
            "rsa exponent {value} is not an odd value >= 3"
        )));
    }
    Ok(())
}

fn ec_key(record: &PublicKeyRecord) -> Result<DecodingKey, AuthError> {
    let crv = required_str(record, "crv")?;
    let coordinate_len = match crv {
        "P-256" => 32,
        "P-384" => 48,
        other => {
            return Err(AuthError::malformed_key(format!(
                "unsupported ec curve '{other}'"
            )));
        }
    };

    let x = required_b64(record, "x")?;
    let y = required_b64(record, "y")?;

    // Uncompressed SEC1 point; parsing rejects points that are not on the curve.
    let mut point = vec![0x04];
    for (name, value) in [("x", x), ("y", y)] {
        let coordinate = decode_b64(value, name)?;
        if coordinate.len() != coordinate_len {
            return Err(AuthError::malformed_key(format!(
                "'{name}' has wrong length for {crv}"
            )));
        }
        point.extend(coordinate);
    }
    let on_curve = match crv {
        "P-256" => p256::PublicKey::from_sec1_bytes(&point).is_ok(),
        _ => p384::PublicKey::from_sec1_bytes(&point).is_ok(),
    };
    if !on_curve {
        return Err(AuthError::malformed_key(format!("point is not on {crv}")));
    }

    DecodingKey::from_ec_components(x, y)
        .map_err(|err| AuthError::malformed_key(format!("invalid ec components: {err}")))
}

fn okp_key(record: &PublicKeyRecord) -> Result<DecodingKey, AuthError> {
    let crv = required_str(record, "crv")?;
    if crv != "Ed25519" {
        return Err(AuthError::malformed_key(format!(
            "unsupported okp curve '{crv}'"
        )));
    }

    let x = required_b64(record, "x")?;
    let bytes: [u8; 32] = decode_b64(x, "x")?
        .try_into()
        .map_err(|_| AuthError::malformed_key("'x' has wrong length for Ed25519"))?;
    ed25519_dalek::VerifyingKey::from_bytes(&bytes)
        .map_err(|_| AuthError::malformed_key("'x' is not an Ed25519 point"))?;

    DecodingKey::from_ed_components(x)
        .map_err(|err| AuthError::malformed_key(format!("invalid okp components: {err}")))
}

fn oct_key(record: &PublicKeyRecord) -> Result<DecodingKey, AuthError> {
    let k = required_b64(record, "k")?;
    let secret = decode_b64(k, "k")?;

    Ok(DecodingKey::from_secret(&secret))
}

fn required_str<'a>(record: &'a PublicKeyRecord, name: &str) -> Result<&'a str, AuthError> {
    match record.field(name) {
        None => Err(AuthError::malformed_key(format!("missing '{name}'"))),
        Some(value) => value
            .as_str()
            .ok_or_else(|| AuthError::malformed_key(format!("'{name}' is not a string"))),
    }
}

/// A non-empty base64url field.
fn required_b64<'a>(record: &'a PublicKeyRecord, name: &str) -> Result<&'a str, AuthError> {
    let value = required_str(record, name)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|_| AuthError::malformed_key(format!("'{name}' is not base64url")))?;
    if bytes.is_empty() {
        return Err(AuthError::malformed_key(format!("'{name}' is empty")));
    }
    Ok(value)
}

fn decode_b64(value: &str, name: &str) -> Result<Vec<u8>, AuthError> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|_| AuthError::malformed_key(format!("'{name}' is not base64url")))
}
