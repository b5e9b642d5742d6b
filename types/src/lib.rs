/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains the wire-format data structures for vaultboot signed
    containers (key blocks and preambles) and the crypto algorithm tables.

--*/

#![cfg_attr(not(feature = "std"), no_std)]

use core::mem::size_of;
use memoffset::offset_of;
use zerocopy::byteorder::{LittleEndian, U32, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

pub const KEY_BLOCK_MAGIC_SIZE: usize = 8;
pub const KEY_BLOCK_MAGIC: [u8; KEY_BLOCK_MAGIC_SIZE] = *b"CHROMEOS";

pub const KEY_BLOCK_HEADER_VERSION_MAJOR: u32 = 2;
pub const KEY_BLOCK_HEADER_VERSION_MINOR: u32 = 1;
pub const FW_PREAMBLE_HEADER_VERSION_MAJOR: u32 = 2;
pub const FW_PREAMBLE_HEADER_VERSION_MINOR: u32 = 0;
pub const KERNEL_PREAMBLE_HEADER_VERSION_MAJOR: u32 = 2;
pub const KERNEL_PREAMBLE_HEADER_VERSION_MINOR: u32 = 0;

pub const SHA1_DIGEST_BYTE_SIZE: usize = 20;
pub const SHA256_DIGEST_BYTE_SIZE: usize = 32;
pub const SHA512_DIGEST_BYTE_SIZE: usize = 64;
pub const MAX_DIGEST_BYTE_SIZE: usize = SHA512_DIGEST_BYTE_SIZE;

/// The key-block checksum is always a SHA-512 digest, independent of the
/// signing algorithm.
pub const KEY_BLOCK_CHECKSUM_DIGEST: DigestAlgorithm = DigestAlgorithm::Sha512;

/// Fixed RSA public exponent (F4) used by all packed keys.
pub const RSA_PUB_EXPONENT: u32 = 65537;

pub const ALGORITHM_COUNT: usize = 12;

/// Signature byte size per algorithm index (RSA modulus size in bytes).
pub const SIGNATURE_BYTE_SIZES: [usize; ALGORITHM_COUNT] = [
    128, 128, 128, // RSA-1024
    256, 256, 256, // RSA-2048
    512, 512, 512, // RSA-4096
    1024, 1024, 1024, // RSA-8192
];

/// Packed ("processed") key material byte size per algorithm index.
///
/// Key material layout: `word_count:u32 | n0inv:u32 | n[word_count]:u32 LE |
/// rr[word_count]:u32 LE`, so the size is `8 + 2 * modulus_bytes`.
pub const PROCESSED_KEY_BYTE_SIZES: [usize; ALGORITHM_COUNT] = [
    264, 264, 264, // RSA-1024
    520, 520, 520, // RSA-2048
    1032, 1032, 1032, // RSA-4096
    2056, 2056, 2056, // RSA-8192
];

/// Digest algorithm per algorithm index.
pub const DIGEST_ALGORITHMS: [DigestAlgorithm; ALGORITHM_COUNT] = [
    DigestAlgorithm::Sha1,
    DigestAlgorithm::Sha256,
    DigestAlgorithm::Sha512,
    DigestAlgorithm::Sha1,
    DigestAlgorithm::Sha256,
    DigestAlgorithm::Sha512,
    DigestAlgorithm::Sha1,
    DigestAlgorithm::Sha256,
    DigestAlgorithm::Sha512,
    DigestAlgorithm::Sha1,
    DigestAlgorithm::Sha256,
    DigestAlgorithm::Sha512,
];

// PKCS#1 v1.5 DigestInfo DER prefixes.
const DIGEST_INFO_SHA1: [u8; 15] = [
    0x30, 0x21, 0x30, 0x09, 0x06, 0x05, 0x2b, 0x0e, 0x03, 0x02, 0x1a, 0x05, 0x00, 0x04, 0x14,
];
const DIGEST_INFO_SHA256: [u8; 19] = [
    0x30, 0x31, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01,
    0x05, 0x00, 0x04, 0x20,
];
const DIGEST_INFO_SHA512: [u8; 19] = [
    0x30, 0x51, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x03,
    0x05, 0x00, 0x04, 0x40,
];

/// Digest half of a signature algorithm.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DigestAlgorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    pub const fn digest_byte_size(self) -> usize {
        match self {
            DigestAlgorithm::Sha1 => SHA1_DIGEST_BYTE_SIZE,
            DigestAlgorithm::Sha256 => SHA256_DIGEST_BYTE_SIZE,
            DigestAlgorithm::Sha512 => SHA512_DIGEST_BYTE_SIZE,
        }
    }

    /// DER DigestInfo prefix prepended to the raw digest before PKCS#1 v1.5
    /// padding.
    pub const fn digest_info(self) -> &'static [u8] {
        match self {
            DigestAlgorithm::Sha1 => &DIGEST_INFO_SHA1,
            DigestAlgorithm::Sha256 => &DIGEST_INFO_SHA256,
            DigestAlgorithm::Sha512 => &DIGEST_INFO_SHA512,
        }
    }
}

/// A validated signature algorithm index.
///
/// The wire format carries the algorithm as a `u64`; every table lookup goes
/// through this handle, so an out-of-range index is rejected exactly once at
/// the trust boundary.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Algorithm(u8);

impl Algorithm {
    pub const RSA1024_SHA1: Algorithm = Algorithm(0);
    pub const RSA1024_SHA256: Algorithm = Algorithm(1);
    pub const RSA1024_SHA512: Algorithm = Algorithm(2);
    pub const RSA2048_SHA1: Algorithm = Algorithm(3);
    pub const RSA2048_SHA256: Algorithm = Algorithm(4);
    pub const RSA2048_SHA512: Algorithm = Algorithm(5);
    pub const RSA4096_SHA1: Algorithm = Algorithm(6);
    pub const RSA4096_SHA256: Algorithm = Algorithm(7);
    pub const RSA4096_SHA512: Algorithm = Algorithm(8);
    pub const RSA8192_SHA1: Algorithm = Algorithm(9);
    pub const RSA8192_SHA256: Algorithm = Algorithm(10);
    pub const RSA8192_SHA512: Algorithm = Algorithm(11);

    /// Validate a wire algorithm index.
    pub fn from_wire(raw: u64) -> Option<Algorithm> {
        if raw < ALGORITHM_COUNT as u64 {
            Some(Algorithm(raw as u8))
        } else {
            None
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn as_wire(self) -> u64 {
        self.0 as u64
    }

    pub const fn rsa_modulus_bits(self) -> usize {
        SIGNATURE_BYTE_SIZES[self.index()] * 8
    }

    pub const fn signature_byte_size(self) -> usize {
        SIGNATURE_BYTE_SIZES[self.index()]
    }

    pub const fn processed_key_byte_size(self) -> usize {
        PROCESSED_KEY_BYTE_SIZES[self.index()]
    }

    pub const fn digest_algorithm(self) -> DigestAlgorithm {
        DIGEST_ALGORITHMS[self.index()]
    }

    pub const fn digest_byte_size(self) -> usize {
        self.digest_algorithm().digest_byte_size()
    }
}

/// Packed public key header.
///
/// The key material lives at `key_offset` bytes from the start of this
/// header, in the processed format described by
/// [`PROCESSED_KEY_BYTE_SIZES`].
#[repr(C)]
#[derive(AsBytes, FromBytes, FromZeroes, Unaligned, Clone, Copy, Debug, Default)]
pub struct PubKeyHeader {
    /// Offset of the key material, relative to the start of this header.
    pub key_offset: U64<LittleEndian>,

    /// Byte size of the key material.
    pub key_size: U64<LittleEndian>,

    /// Signature algorithm index.
    pub algorithm: U64<LittleEndian>,

    /// Key version, forwarded to the caller and never interpreted here.
    pub key_version: U64<LittleEndian>,
}

/// Packed signature header.
///
/// The signature blob lives at `sig_offset` bytes from the start of this
/// header. `data_size` names the length of the signed prefix of whatever
/// buffer this signature authenticates; the base of that prefix is supplied
/// by the caller, not by this header.
#[repr(C)]
#[derive(AsBytes, FromBytes, FromZeroes, Unaligned, Clone, Copy, Debug, Default)]
pub struct SignatureHeader {
    /// Offset of the signature blob, relative to the start of this header.
    pub sig_offset: U64<LittleEndian>,

    /// Byte size of the signature blob.
    pub sig_size: U64<LittleEndian>,

    /// Byte size of the signed data prefix.
    pub data_size: U64<LittleEndian>,
}

/// Key block header.
///
/// The outer container of the verification chain. It hands off `data_key`
/// once either `key_block_signature` (root-key mode) or
/// `key_block_checksum` (hash-only inspection mode) has been validated.
#[repr(C)]
#[derive(AsBytes, FromBytes, FromZeroes, Unaligned, Clone, Copy, Debug)]
pub struct KeyBlockHeader {
    pub magic: [u8; KEY_BLOCK_MAGIC_SIZE],
    pub header_version_major: U32<LittleEndian>,
    pub header_version_minor: U32<LittleEndian>,

    /// Self-declared total size of the key block, including all embedded
    /// key material and signature blobs.
    pub key_block_size: U64<LittleEndian>,

    /// Signature by the root key, covering the first `data_size` bytes of
    /// the block.
    pub key_block_signature: SignatureHeader,

    /// SHA-512 checksum over the same prefix, for unauthenticated
    /// inspection when no root key is available.
    pub key_block_checksum: SignatureHeader,

    /// The data key handed off to preamble verification.
    pub data_key: PubKeyHeader,
}

impl KeyBlockHeader {
    pub fn signature_member_offset() -> u64 {
        offset_of!(KeyBlockHeader, key_block_signature) as u64
    }

    pub fn checksum_member_offset() -> u64 {
        offset_of!(KeyBlockHeader, key_block_checksum) as u64
    }

    pub fn data_key_member_offset() -> u64 {
        offset_of!(KeyBlockHeader, data_key) as u64
    }
}

/// Firmware preamble header.
#[repr(C)]
#[derive(AsBytes, FromBytes, FromZeroes, Unaligned, Clone, Copy, Debug, Default)]
pub struct FwPreambleHeader {
    pub header_version_major: U32<LittleEndian>,
    pub header_version_minor: U32<LittleEndian>,

    /// Self-declared total size of the preamble.
    pub preamble_size: U64<LittleEndian>,

    /// Signature by the key block's data key, covering the first
    /// `data_size` bytes of the preamble.
    pub preamble_signature: SignatureHeader,

    /// Firmware version, forwarded to the caller and never interpreted
    /// here.
    pub firmware_version: U64<LittleEndian>,

    /// Subkey used to verify the kernel's key block.
    pub kernel_subkey: PubKeyHeader,

    /// Signature over the firmware body, verified later by the caller once
    /// the body has been loaded and hashed.
    pub body_signature: SignatureHeader,
}

impl FwPreambleHeader {
    pub fn signature_member_offset() -> u64 {
        offset_of!(FwPreambleHeader, preamble_signature) as u64
    }

    pub fn kernel_subkey_member_offset() -> u64 {
        offset_of!(FwPreambleHeader, kernel_subkey) as u64
    }

    pub fn body_signature_member_offset() -> u64 {
        offset_of!(FwPreambleHeader, body_signature) as u64
    }
}

/// Kernel preamble header.
///
/// Same shape as [`FwPreambleHeader`] with the body load metadata in place
/// of the embedded subkey.
#[repr(C)]
#[derive(AsBytes, FromBytes, FromZeroes, Unaligned, Clone, Copy, Debug, Default)]
pub struct KernelPreambleHeader {
    pub header_version_major: U32<LittleEndian>,
    pub header_version_minor: U32<LittleEndian>,
    pub preamble_size: U64<LittleEndian>,
    pub preamble_signature: SignatureHeader,

    /// Kernel version, forwarded opaquely.
    pub kernel_version: U64<LittleEndian>,

    /// Physical address the body expects to be loaded at, forwarded
    /// opaquely.
    pub body_load_address: U64<LittleEndian>,

    /// Byte size of the kernel body, forwarded opaquely.
    pub body_size: U64<LittleEndian>,

    pub body_signature: SignatureHeader,
}

impl KernelPreambleHeader {
    pub fn signature_member_offset() -> u64 {
        offset_of!(KernelPreambleHeader, preamble_signature) as u64
    }

    pub fn body_signature_member_offset() -> u64 {
        offset_of!(KernelPreambleHeader, body_signature) as u64
    }
}

pub const PUB_KEY_HEADER_BYTE_SIZE: usize = size_of::<PubKeyHeader>();
pub const SIGNATURE_HEADER_BYTE_SIZE: usize = size_of::<SignatureHeader>();
pub const KEY_BLOCK_HEADER_BYTE_SIZE: usize = size_of::<KeyBlockHeader>();
pub const FW_PREAMBLE_HEADER_BYTE_SIZE: usize = size_of::<FwPreambleHeader>();
pub const KERNEL_PREAMBLE_HEADER_BYTE_SIZE: usize = size_of::<KernelPreambleHeader>();
