/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    Verified-boot container validation engine. Walks a chain of signed
    containers (key block, then firmware or kernel preamble) and reports
    either the identity of a trusted subkey or a terminal failure code.

--*/

#![cfg_attr(not(feature = "std"), no_std)]

mod bounds;
mod verifier;

use core::fmt;

use vaultboot_image_types::{
    Algorithm, DigestAlgorithm, PubKeyHeader, SignatureHeader, MAX_DIGEST_BYTE_SIZE,
    PUB_KEY_HEADER_BYTE_SIZE, SIGNATURE_HEADER_BYTE_SIZE,
};
use zerocopy::FromBytes;

pub use verifier::ImageVerifier;

/// Terminal verification outcomes.
///
/// Exactly one value is emitted per call; there is no chaining and no cause
/// tracking. The phrase table is the only debug-output surface of the
/// engine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ImageVerifyError {
    /// Structural failure inside the key block: bad magic, incompatible
    /// major version, size underrun, a failed bounds check, a checksum
    /// length mismatch, or insufficient signed-region coverage.
    KeyBlockInvalid,

    /// The root-key signature over the key block did not validate.
    KeyBlockSignatureFailed,

    /// Hash-only mode: the embedded checksum did not match the recomputed
    /// digest.
    KeyBlockHashFailed,

    /// A packed public key could not be materialized: algorithm out of
    /// range, key size disagreeing with the algorithm table, or key bytes
    /// rejected by the crypto provider.
    PublicKeyInvalid,

    /// Structural failure inside a preamble.
    PreambleInvalid,

    /// The preamble signature (by the data key) did not validate.
    PreambleSignatureFailed,
}

impl ImageVerifyError {
    /// Stable English phrase for debug logging.
    pub const fn describe(self) -> &'static str {
        match self {
            ImageVerifyError::KeyBlockInvalid => "Key block invalid.",
            ImageVerifyError::KeyBlockSignatureFailed => "Key block signature failed.",
            ImageVerifyError::KeyBlockHashFailed => "Key block hash failed.",
            ImageVerifyError::PublicKeyInvalid => "Public key invalid.",
            ImageVerifyError::PreambleInvalid => "Preamble invalid.",
            ImageVerifyError::PreambleSignatureFailed => "Preamble signature check failed.",
        }
    }
}

impl fmt::Display for ImageVerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ImageVerifyError {}

pub type ImageVerifyResult<T> = Result<T, ImageVerifyError>;

/// Crypto primitives the engine delegates to.
///
/// The engine performs no cryptography of its own; it resolves algorithm
/// indices through the immutable tables in `vaultboot-image-types` and
/// hands the actual work to this environment. A materialized key is
/// released by dropping it.
pub trait ImageVerificationEnv {
    /// Materialized RSA verification key.
    type RsaKey;

    /// Digest `data`. Only the first `alg.digest_byte_size()` bytes of the
    /// returned buffer are meaningful.
    fn digest(&self, alg: DigestAlgorithm, data: &[u8]) -> [u8; MAX_DIGEST_BYTE_SIZE];

    /// Materialize packed key material. `key_material` is exactly the
    /// processed key region; its length has already been checked against
    /// the algorithm table.
    fn rsa_key_from_bytes(&self, alg: Algorithm, key_material: &[u8]) -> Option<Self::RsaKey>;

    /// Verify `signature` over `data` with PKCS#1 v1.5 padding and the
    /// digest half of `alg`.
    fn rsa_verify(&self, key: &Self::RsaKey, data: &[u8], signature: &[u8], alg: Algorithm)
        -> bool;

    /// Same as [`Self::rsa_verify`] with a precomputed digest.
    fn rsa_verify_digest(
        &self,
        key: &Self::RsaKey,
        digest: &[u8],
        signature: &[u8],
        alg: Algorithm,
    ) -> bool;
}

/// An RSA key materialized through [`ImageVerificationEnv`], tagged with
/// the algorithm it was packed for. Dropping it releases the provider-side
/// handle.
pub struct ImageRsaKey<K> {
    pub(crate) alg: Algorithm,
    pub(crate) key: K,
}

impl<K> ImageRsaKey<K> {
    pub fn algorithm(&self) -> Algorithm {
        self.alg
    }
}

/// Non-owning window onto a packed public key.
///
/// The window starts at the key header and is only constructed once the
/// declared key-material range has been bounds-checked against the window
/// itself; callers validating an *embedded* key additionally check it
/// against the parent container and the signed prefix before building the
/// view.
#[derive(Clone, Copy, Debug)]
pub struct PubKeyView<'a> {
    header: PubKeyHeader,
    key_data: &'a [u8],
}

impl<'a> PubKeyView<'a> {
    /// Interpret `buf` as a packed public key. `buf` must begin at the key
    /// header; trailing bytes beyond the key material are ignored.
    pub fn new(buf: &'a [u8]) -> ImageVerifyResult<PubKeyView<'a>> {
        let header = PubKeyHeader::read_from_prefix(buf)
            .ok_or(ImageVerifyError::PublicKeyInvalid)?;
        if !bounds::member_inside(
            buf.len() as u64,
            0,
            PUB_KEY_HEADER_BYTE_SIZE as u64,
            header.key_offset.get(),
            header.key_size.get(),
        ) {
            return Err(ImageVerifyError::PublicKeyInvalid);
        }
        // Contained in `buf`, so the casts below cannot truncate.
        let start = header.key_offset.get() as usize;
        let end = start + header.key_size.get() as usize;
        let key_data = buf
            .get(start..end)
            .ok_or(ImageVerifyError::PublicKeyInvalid)?;
        Ok(PubKeyView { header, key_data })
    }

    /// Raw wire algorithm index; not yet validated against the table.
    pub fn algorithm_raw(&self) -> u64 {
        self.header.algorithm.get()
    }

    pub fn key_version(&self) -> u64 {
        self.header.key_version.get()
    }

    /// The processed key material.
    pub fn key_data(&self) -> &'a [u8] {
        self.key_data
    }
}

/// Non-owning window onto a packed signature.
#[derive(Clone, Copy, Debug)]
pub struct SignatureView<'a> {
    header: SignatureHeader,
    sig_data: &'a [u8],
}

impl<'a> SignatureView<'a> {
    /// Interpret `buf` as a packed signature. `buf` must begin at the
    /// signature header.
    pub fn new(buf: &'a [u8]) -> ImageVerifyResult<SignatureView<'a>> {
        let header = SignatureHeader::read_from_prefix(buf)
            .ok_or(ImageVerifyError::PreambleInvalid)?;
        if !bounds::member_inside(
            buf.len() as u64,
            0,
            SIGNATURE_HEADER_BYTE_SIZE as u64,
            header.sig_offset.get(),
            header.sig_size.get(),
        ) {
            return Err(ImageVerifyError::PreambleInvalid);
        }
        let start = header.sig_offset.get() as usize;
        let end = start + header.sig_size.get() as usize;
        let sig_data = buf
            .get(start..end)
            .ok_or(ImageVerifyError::PreambleInvalid)?;
        Ok(SignatureView { header, sig_data })
    }

    /// The signature blob.
    pub fn signature(&self) -> &'a [u8] {
        self.sig_data
    }

    /// Length of the signed data prefix this signature authenticates.
    pub fn data_size(&self) -> u64 {
        self.header.data_size.get()
    }
}

/// Outcome of a successful key-block verification.
///
/// In hash-only mode (no root key supplied) this proves self-consistency
/// only, not origin; callers must not treat it as a trust decision.
#[derive(Debug)]
pub struct KeyBlockInfo<'a> {
    /// The verified data key, handed off to preamble verification.
    pub data_key: PubKeyView<'a>,

    /// Self-declared total key block size.
    pub key_block_size: u64,

    pub header_version_major: u32,
    pub header_version_minor: u32,

    /// Version tag of the data key, forwarded for the caller's rollback
    /// policy; never compared here.
    pub data_key_version: u64,
}

/// Outcome of a successful firmware-preamble verification.
#[derive(Debug)]
pub struct FwPreambleInfo<'a> {
    /// Subkey for the kernel verification stage.
    pub kernel_subkey: PubKeyView<'a>,

    /// Descriptor for the separately-stored firmware body; verified later
    /// by the caller through [`ImageVerifier::verify_digest`].
    pub body_signature: SignatureView<'a>,

    pub firmware_version: u64,
    pub preamble_size: u64,
}

/// Outcome of a successful kernel-preamble verification.
#[derive(Debug)]
pub struct KernelPreambleInfo<'a> {
    pub body_signature: SignatureView<'a>,
    pub body_load_address: u64,
    pub body_size: u64,
    pub kernel_version: u64,
    pub preamble_size: u64,
}
