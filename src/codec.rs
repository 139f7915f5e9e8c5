//! Field-level encryption for sensitive string attributes.
//!
//! Ciphertext text form: `v1:` followed by base64(nonce || ciphertext+tag),
//! using AES-256-GCM with a fresh 96-bit nonce per call.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Serialize, Serializer};
use thiserror::Error as ThisError;

const VERSION_PREFIX: &str = "v1:";
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Literal persisted for a name that was never set.
pub const UNSET_MARKER: &str = "N/A";

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum CodecError {
    #[error("field key must be base64 encoded 32 bytes")]
    InvalidKey,
    #[error("unsupported ciphertext version")]
    UnsupportedVersion,
    #[error("ciphertext is not valid base64")]
    Malformed,
    #[error("ciphertext is truncated")]
    Truncated,
    #[error("ciphertext failed authentication")]
    Authentication,
    #[error("decrypted field is not valid utf-8")]
    Utf8,
}

#[derive(Clone)]
pub struct FieldCodec {
    cipher: Aes256Gcm,
}

impl FieldCodec {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.into()),
        }
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CodecError> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|_| CodecError::InvalidKey)?;
        let key: [u8; 32] = bytes.try_into().map_err(|_| CodecError::InvalidKey)?;
        Ok(Self::new(&key))
    }

    /// Generate a fresh random key, returned base64 encoded.
    pub fn generate_key() -> String {
        BASE64.encode(Aes256Gcm::generate_key(&mut OsRng))
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CodecError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CodecError::Authentication)?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(&nonce);
        payload.extend(ciphertext);
        Ok(format!("{VERSION_PREFIX}{}", BASE64.encode(payload)))
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CodecError> {
        let encoded = ciphertext
            .strip_prefix(VERSION_PREFIX)
            .ok_or(CodecError::UnsupportedVersion)?;
        let payload = BASE64.decode(encoded).map_err(|_| CodecError::Malformed)?;
        if payload.len() < NONCE_LEN + TAG_LEN {
            return Err(CodecError::Truncated);
        }

        let (nonce, body) = payload.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), body)
            .map_err(|_| CodecError::Authentication)?;
        String::from_utf8(plaintext).map_err(|_| CodecError::Utf8)
    }
}

/// A sensitive field as held at rest: either unset, or sealed ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SealedField {
    #[default]
    Unset,
    Sealed(String),
}

impl SealedField {
    pub fn seal(codec: &FieldCodec, value: Option<&str>) -> Result<Self, CodecError> {
        match value {
            Some(plain) => Ok(SealedField::Sealed(codec.encrypt(plain)?)),
            None => Ok(SealedField::Unset),
        }
    }

    pub fn reveal(&self, codec: &FieldCodec) -> Result<RevealedField, CodecError> {
        match self {
            SealedField::Unset => Ok(RevealedField::Unset),
            SealedField::Sealed(ciphertext) => Ok(RevealedField::Value(codec.decrypt(ciphertext)?)),
        }
    }

    pub fn from_column(raw: String) -> Self {
        if raw == UNSET_MARKER {
            SealedField::Unset
        } else {
            SealedField::Sealed(raw)
        }
    }

    pub fn as_column(&self) -> &str {
        match self {
            SealedField::Unset => UNSET_MARKER,
            SealedField::Sealed(ciphertext) => ciphertext,
        }
    }
}

/// A decrypted field; serializes the unset variant as the `"N/A"` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealedField {
    Unset,
    Value(String),
}

impl RevealedField {
    pub fn as_str(&self) -> &str {
        match self {
            RevealedField::Unset => UNSET_MARKER,
            RevealedField::Value(v) => v,
        }
    }
}

impl Serialize for RevealedField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
