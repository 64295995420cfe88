//! Decoding of PEM-encoded certificates and RSA private keys.
//!
//! Only the first PEM block of the input is considered. Private keys may be
//! PKCS#1 (`RSA PRIVATE KEY`, optionally with OpenSSL `Proc-Type`/`DEK-Info`
//! encryption) or PKCS#8 (`PRIVATE KEY` / `ENCRYPTED PRIVATE KEY`).

use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::{BlockCipher, BlockDecryptMut, KeyInit, KeyIvInit, block_padding::Pkcs7};
use des::{Des, TdesEde3};
use md5::{Digest, Md5};
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use x509_cert::Certificate;
use x509_cert::der::Decode;

use crate::error::IamError;

const CERTIFICATE_LABEL: &str = "CERTIFICATE";
const PKCS1_LABEL: &str = "RSA PRIVATE KEY";
const PKCS8_LABEL: &str = "PRIVATE KEY";
const PKCS8_ENCRYPTED_LABEL: &str = "ENCRYPTED PRIVATE KEY";

fn decode_block(input: &[u8], what: &str) -> Result<pem::Pem, IamError> {
    if input.iter().all(u8::is_ascii_whitespace) {
        return Err(IamError::Parse(format!("{what} PEM is empty")));
    }
    pem::parse(input).map_err(|e| IamError::Parse(format!("invalid {what} PEM: {e}")))
}

/// Parse a `CERTIFICATE` PEM block into an X.509 certificate.
pub fn parse_certificate(input: &[u8]) -> Result<Certificate, IamError> {
    let block = decode_block(input, "certificate")?;
    if block.tag() != CERTIFICATE_LABEL {
        return Err(IamError::Parse(format!(
            "expected {CERTIFICATE_LABEL} block, found {}",
            block.tag()
        )));
    }
    Certificate::from_der(block.contents())
        .map_err(|e| IamError::Parse(format!("invalid X.509 certificate: {e}")))
}

/// Parse an RSA private key, decrypting it with `passphrase` when the PEM
/// block is encrypted.
pub fn parse_private_key(
    input: &[u8],
    passphrase: Option<&[u8]>,
) -> Result<RsaPrivateKey, IamError> {
    let block = decode_block(input, "private key")?;
    match block.tag() {
        PKCS1_LABEL => {
            let der = match block.headers().get("Proc-Type") {
                Some(proc_type) if proc_type.contains("ENCRYPTED") => {
                    let passphrase = require_passphrase(passphrase)?;
                    decrypt_legacy_block(&block, passphrase)?
                }
                _ => block.contents().to_vec(),
            };
            RsaPrivateKey::from_pkcs1_der(&der)
                .map_err(|e| IamError::Parse(format!("invalid PKCS#1 private key: {e}")))
        }
        PKCS8_LABEL => RsaPrivateKey::from_pkcs8_der(block.contents())
            .map_err(|e| IamError::Parse(format!("invalid PKCS#8 private key: {e}"))),
        PKCS8_ENCRYPTED_LABEL => {
            let passphrase = require_passphrase(passphrase)?;
            RsaPrivateKey::from_pkcs8_encrypted_der(block.contents(), passphrase).map_err(|e| {
                IamError::Parse(format!("can not decrypt PKCS#8 private key: {e}"))
            })
        }
        other => Err(IamError::Parse(format!(
            "unsupported private key block {other}"
        ))),
    }
}

fn require_passphrase(passphrase: Option<&[u8]>) -> Result<&[u8], IamError> {
    match passphrase {
        Some(p) if !p.is_empty() => Ok(p),
        _ => Err(IamError::Parse(
            "private key is encrypted but no passphrase was configured".into(),
        )),
    }
}

/// Ciphers OpenSSL writes into the `DEK-Info` header of a traditional
/// encrypted PEM block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LegacyCipher {
    DesCbc,
    DesEde3Cbc,
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
}

impl LegacyCipher {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "DES-CBC" => Some(Self::DesCbc),
            "DES-EDE3-CBC" => Some(Self::DesEde3Cbc),
            "AES-128-CBC" => Some(Self::Aes128Cbc),
            "AES-192-CBC" => Some(Self::Aes192Cbc),
            "AES-256-CBC" => Some(Self::Aes256Cbc),
            _ => None,
        }
    }

    fn key_len(self) -> usize {
        match self {
            Self::DesCbc => 8,
            Self::DesEde3Cbc | Self::Aes192Cbc => 24,
            Self::Aes128Cbc => 16,
            Self::Aes256Cbc => 32,
        }
    }

    fn block_size(self) -> usize {
        match self {
            Self::DesCbc | Self::DesEde3Cbc => 8,
            Self::Aes128Cbc | Self::Aes192Cbc | Self::Aes256Cbc => 16,
        }
    }

    fn decrypt(self, key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, IamError> {
        fn run<C>(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, IamError>
        where
            C: BlockDecryptMut + BlockCipher + KeyInit,
        {
            cbc::Decryptor::<C>::new_from_slices(key, iv)
                .map_err(|e| IamError::Parse(e.to_string()))?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(|_| {
                    IamError::Parse("can not decrypt private key, wrong passphrase?".into())
                })
        }

        match self {
            Self::DesCbc => run::<Des>(key, iv, ciphertext),
            Self::DesEde3Cbc => run::<TdesEde3>(key, iv, ciphertext),
            Self::Aes128Cbc => run::<Aes128>(key, iv, ciphertext),
            Self::Aes192Cbc => run::<Aes192>(key, iv, ciphertext),
            Self::Aes256Cbc => run::<Aes256>(key, iv, ciphertext),
        }
    }
}

/// Decrypt a PKCS#1 block protected with OpenSSL's traditional PEM
/// encryption (`DEK-Info: <cipher>,<hex iv>`).
fn decrypt_legacy_block(block: &pem::Pem, passphrase: &[u8]) -> Result<Vec<u8>, IamError> {
    let dek_info = block
        .headers()
        .get("DEK-Info")
        .ok_or_else(|| IamError::Parse("encrypted private key is missing DEK-Info".into()))?;
    let (cipher_name, iv_hex) = dek_info
        .split_once(',')
        .ok_or_else(|| IamError::Parse(format!("malformed DEK-Info: {dek_info}")))?;
    let cipher = LegacyCipher::from_name(cipher_name.trim()).ok_or_else(|| {
        IamError::Parse(format!(
            "unsupported private key cipher {}",
            cipher_name.trim()
        ))
    })?;

    let iv = hex::decode(iv_hex.trim())
        .map_err(|e| IamError::Parse(format!("malformed DEK-Info IV: {e}")))?;
    if iv.len() != cipher.block_size() {
        return Err(IamError::Parse(format!(
            "DEK-Info IV for {} must be {} bytes, got {}",
            cipher_name.trim(),
            cipher.block_size(),
            iv.len()
        )));
    }

    let key = evp_bytes_to_key(passphrase, &iv[..8], cipher.key_len());
    cipher.decrypt(&key, &iv, block.contents())
}

// OpenSSL EVP_BytesToKey with MD5 and a single iteration.
fn evp_bytes_to_key(passphrase: &[u8], salt: &[u8], key_len: usize) -> Vec<u8> {
    let mut key = Vec::with_capacity(key_len + 16);
    let mut previous: Vec<u8> = Vec::new();
    while key.len() < key_len {
        let mut hasher = Md5::new();
        hasher.update(&previous);
        hasher.update(passphrase);
        hasher.update(salt);
        previous = hasher.finalize().to_vec();
        key.extend_from_slice(&previous);
    }
    key.truncate(key_len);
    key
}
