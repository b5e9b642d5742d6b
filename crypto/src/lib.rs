/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    RustCrypto-based provider implementing the verification engine's crypto
    interface and the generator's signing interface, plus packed-key
    conversion helpers.

--*/

use anyhow::{bail, Context};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use vaultboot_image_gen::ImageGeneratorCrypto;
use vaultboot_image_types::{
    Algorithm, DigestAlgorithm, PubKeyHeader, MAX_DIGEST_BYTE_SIZE, PUB_KEY_HEADER_BYTE_SIZE,
    RSA_PUB_EXPONENT,
};
use vaultboot_image_verify::ImageVerificationEnv;
use zerocopy::byteorder::{LittleEndian, U64};
use zerocopy::AsBytes;

#[derive(Default)]
pub struct RustCrypto {}

fn raw_digest(alg: DigestAlgorithm, data: &[u8]) -> Vec<u8> {
    match alg {
        DigestAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
        DigestAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        DigestAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
    }
}

fn pkcs1v15_scheme(alg: DigestAlgorithm) -> Pkcs1v15Sign {
    match alg {
        DigestAlgorithm::Sha1 => Pkcs1v15Sign::new::<Sha1>(),
        DigestAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        DigestAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
    }
}

/// Multiplicative inverse of the lowest modulus word, negated, as packed
/// keys carry it for Montgomery-form providers. Newton iteration over
/// 2-adic precision; `n0` is odd.
fn mont_n0inv(n0: u32) -> u32 {
    let mut inv = n0;
    for _ in 0..5 {
        inv = inv.wrapping_mul(2u32.wrapping_sub(n0.wrapping_mul(inv)));
    }
    inv.wrapping_neg()
}

fn to_le_padded(value: &BigUint, len: usize) -> Vec<u8> {
    let mut bytes = value.to_bytes_le();
    bytes.resize(len, 0);
    bytes
}

fn unpack_pub_key(alg: Algorithm, material: &[u8]) -> Option<RsaPublicKey> {
    if material.len() != alg.processed_key_byte_size() {
        return None;
    }
    let word_count = u32::from_le_bytes(material.get(..4)?.try_into().ok()?) as usize;
    let modulus_bytes = alg.signature_byte_size();
    if word_count.checked_mul(4)? != modulus_bytes {
        return None;
    }
    // word_count:u32 | n0inv:u32 | n LE | rr LE. The n0inv and rr fields
    // serve Montgomery-form providers; this backend derives everything
    // from the modulus.
    let n = BigUint::from_bytes_le(material.get(8..8 + modulus_bytes)?);
    let e = BigUint::from(RSA_PUB_EXPONENT);
    RsaPublicKey::new_with_max_size(n, e, alg.rsa_modulus_bits()).ok()
}

/// Pack an RSA public key into a complete packed-key region (header
/// followed by the processed key material).
pub fn pack_pub_key(
    alg: Algorithm,
    key: &RsaPublicKey,
    key_version: u64,
) -> anyhow::Result<Vec<u8>> {
    let modulus_bytes = alg.signature_byte_size();
    if key.size() != modulus_bytes {
        bail!(
            "key modulus is {} bytes, algorithm {} requires {}",
            key.size(),
            alg.as_wire(),
            modulus_bytes
        );
    }

    let n_le = to_le_padded(key.n(), modulus_bytes);
    let n0 = u32::from_le_bytes([n_le[0], n_le[1], n_le[2], n_le[3]]);
    let rr = (BigUint::from(1u8) << (2 * alg.rsa_modulus_bits())) % key.n();

    let mut region = Vec::with_capacity(PUB_KEY_HEADER_BYTE_SIZE + alg.processed_key_byte_size());
    let header = PubKeyHeader {
        key_offset: U64::<LittleEndian>::new(PUB_KEY_HEADER_BYTE_SIZE as u64),
        key_size: U64::<LittleEndian>::new(alg.processed_key_byte_size() as u64),
        algorithm: U64::<LittleEndian>::new(alg.as_wire()),
        key_version: U64::<LittleEndian>::new(key_version),
    };
    region.extend_from_slice(header.as_bytes());
    region.extend_from_slice(&((modulus_bytes / 4) as u32).to_le_bytes());
    region.extend_from_slice(&mont_n0inv(n0).to_le_bytes());
    region.extend_from_slice(&n_le);
    region.extend_from_slice(&to_le_padded(&rr, modulus_bytes));
    Ok(region)
}

/// Read an RSA private key from PEM (PKCS#1 or PKCS#8).
pub fn rsa_priv_key_from_pem(pem: &str) -> anyhow::Result<RsaPrivateKey> {
    use rsa::pkcs1::DecodeRsaPrivateKey;
    use rsa::pkcs8::DecodePrivateKey;
    RsaPrivateKey::from_pkcs1_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
        .context("failed to parse RSA private key PEM")
}

/// Read an RSA public key from PEM (PKCS#1 or SPKI).
pub fn rsa_pub_key_from_pem(pem: &str) -> anyhow::Result<RsaPublicKey> {
    use rsa::pkcs1::DecodeRsaPublicKey;
    use rsa::pkcs8::DecodePublicKey;
    RsaPublicKey::from_pkcs1_pem(pem)
        .or_else(|_| RsaPublicKey::from_public_key_pem(pem))
        .context("failed to parse RSA public key PEM")
}

impl ImageVerificationEnv for RustCrypto {
    type RsaKey = RsaPublicKey;

    fn digest(&self, alg: DigestAlgorithm, data: &[u8]) -> [u8; MAX_DIGEST_BYTE_SIZE] {
        let mut out = [0u8; MAX_DIGEST_BYTE_SIZE];
        let digest = raw_digest(alg, data);
        out[..digest.len()].copy_from_slice(&digest);
        out
    }

    fn rsa_key_from_bytes(&self, alg: Algorithm, key_material: &[u8]) -> Option<RsaPublicKey> {
        unpack_pub_key(alg, key_material)
    }

    fn rsa_verify(
        &self,
        key: &RsaPublicKey,
        data: &[u8],
        signature: &[u8],
        alg: Algorithm,
    ) -> bool {
        let digest = raw_digest(alg.digest_algorithm(), data);
        key.verify(pkcs1v15_scheme(alg.digest_algorithm()), &digest, signature)
            .is_ok()
    }

    fn rsa_verify_digest(
        &self,
        key: &RsaPublicKey,
        digest: &[u8],
        signature: &[u8],
        alg: Algorithm,
    ) -> bool {
        let digest = match digest.get(..alg.digest_byte_size()) {
            Some(digest) => digest,
            None => return false,
        };
        key.verify(pkcs1v15_scheme(alg.digest_algorithm()), digest, signature)
            .is_ok()
    }
}

impl ImageGeneratorCrypto for RustCrypto {
    type PrivKey = RsaPrivateKey;

    fn digest(&self, alg: DigestAlgorithm, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(raw_digest(alg, data))
    }

    fn rsa_sign(
        &self,
        alg: Algorithm,
        key: &RsaPrivateKey,
        data: &[u8],
    ) -> anyhow::Result<Vec<u8>> {
        if key.size() != alg.signature_byte_size() {
            bail!(
                "signing key modulus is {} bytes, algorithm {} requires {}",
                key.size(),
                alg.as_wire(),
                alg.signature_byte_size()
            );
        }
        let digest = raw_digest(alg.digest_algorithm(), data);
        key.sign(pkcs1v15_scheme(alg.digest_algorithm()), &digest)
            .context("PKCS#1 v1.5 signing failed")
    }
}
