//! PEM material shared by the unit tests, read from `tests/fixtures`.

macro_rules! fixture {
    ($name:literal) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/", $name))
    };
}

pub(crate) const CERT_A: &str = fixture!("cert_a.pem");
pub(crate) const KEY_A: &str = fixture!("key_a.pem");
pub(crate) const CERT_B: &str = fixture!("cert_b.pem");
pub(crate) const KEY_A_PKCS8: &str = fixture!("key_a_pkcs8.pem");
pub(crate) const KEY_A_ENCRYPTED: &str = fixture!("key_a_encrypted.pem");
pub(crate) const KEY_A_DES3: &str = fixture!("key_a_des3.pem");
pub(crate) const KEY_A_PKCS8_ENCRYPTED: &str = fixture!("key_a_pkcs8_encrypted.pem");

/// Passphrase protecting every encrypted fixture key.
pub(crate) const PASSPHRASE: &[u8] = b"correct-horse";
