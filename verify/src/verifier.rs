/*++

Licensed under the Apache-2.0 license.

File Name:

    verifier.rs

Abstract:

    This file is the main implementation of the vaultboot container
    verifier: the data/digest verifier, the key-block verifier and the
    firmware/kernel preamble verifiers.

--*/

use core::mem::size_of;

use subtle::ConstantTimeEq;
use vaultboot_image_types::{
    Algorithm, FwPreambleHeader, KernelPreambleHeader, KeyBlockHeader, FW_PREAMBLE_HEADER_VERSION_MAJOR,
    KERNEL_PREAMBLE_HEADER_VERSION_MAJOR, KEY_BLOCK_CHECKSUM_DIGEST, KEY_BLOCK_HEADER_VERSION_MAJOR,
    KEY_BLOCK_MAGIC, SHA512_DIGEST_BYTE_SIZE,
};
use zerocopy::FromBytes;

use crate::bounds;
use crate::{
    FwPreambleInfo, ImageRsaKey, ImageVerificationEnv, ImageVerifyError, ImageVerifyResult,
    KernelPreambleInfo, KeyBlockInfo, PubKeyView, SignatureView,
};

/// Container verifier.
///
/// Pure and synchronous: every method is a function of its arguments and
/// the immutable algorithm tables. The input buffer is never mutated and
/// must not be concurrently mutated for the duration of a call.
pub struct ImageVerifier<Env: ImageVerificationEnv> {
    env: Env,
}

impl<Env: ImageVerificationEnv> ImageVerifier<Env> {
    pub fn new(env: Env) -> Self {
        Self { env }
    }

    /// Materialize a packed public key into a tagged RSA handle.
    ///
    /// The handle is released by dropping it.
    pub fn rsa_key(&self, key: &PubKeyView) -> ImageVerifyResult<ImageRsaKey<Env::RsaKey>> {
        let alg = Algorithm::from_wire(key.algorithm_raw())
            .ok_or(ImageVerifyError::PublicKeyInvalid)?;
        if key.key_data().len() != alg.processed_key_byte_size() {
            return Err(ImageVerifyError::PublicKeyInvalid);
        }
        let rsa = self
            .env
            .rsa_key_from_bytes(alg, key.key_data())
            .ok_or(ImageVerifyError::PublicKeyInvalid)?;
        Ok(ImageRsaKey { alg, key: rsa })
    }

    fn verify_data_raw(
        &self,
        data: &[u8],
        sig: &SignatureView,
        key: &ImageRsaKey<Env::RsaKey>,
    ) -> bool {
        if sig.signature().len() != key.alg.signature_byte_size() {
            return false;
        }
        if sig.data_size() > data.len() as u64 {
            return false;
        }
        let signed = &data[..sig.data_size() as usize];
        self.env.rsa_verify(&key.key, signed, sig.signature(), key.alg)
    }

    fn verify_digest_raw(
        &self,
        digest: &[u8],
        sig: &SignatureView,
        key: &ImageRsaKey<Env::RsaKey>,
    ) -> bool {
        if sig.signature().len() != key.alg.signature_byte_size() {
            return false;
        }
        self.env
            .rsa_verify_digest(&key.key, digest, sig.signature(), key.alg)
    }

    /// Verify that `sig` authenticates the first `sig.data_size()` bytes of
    /// `data`.
    pub fn verify_data(
        &self,
        data: &[u8],
        sig: &SignatureView,
        key: &ImageRsaKey<Env::RsaKey>,
    ) -> ImageVerifyResult<()> {
        if self.verify_data_raw(data, sig, key) {
            Ok(())
        } else {
            Err(ImageVerifyError::PreambleSignatureFailed)
        }
    }

    /// Verify `sig` against a digest the caller computed separately, e.g.
    /// while streaming a payload body from storage.
    pub fn verify_digest(
        &self,
        digest: &[u8],
        sig: &SignatureView,
        key: &ImageRsaKey<Env::RsaKey>,
    ) -> ImageVerifyResult<()> {
        if self.verify_digest_raw(digest, sig, key) {
            Ok(())
        } else {
            Err(ImageVerifyError::PreambleSignatureFailed)
        }
    }

    /// Verify a key block.
    ///
    /// With a root key, the block's signature is checked and acceptance is
    /// a trust decision. Without one, only the embedded SHA-512 checksum is
    /// checked; acceptance then proves self-consistency for inspection and
    /// tooling, nothing more.
    pub fn verify_key_block<'a>(
        &self,
        block: &'a [u8],
        root_key: Option<&PubKeyView>,
    ) -> ImageVerifyResult<KeyBlockInfo<'a>> {
        let hdr = KeyBlockHeader::read_from_prefix(block)
            .ok_or(ImageVerifyError::KeyBlockInvalid)?;

        if hdr.magic != KEY_BLOCK_MAGIC {
            return Err(ImageVerifyError::KeyBlockInvalid);
        }
        // Only the major version matters; minor revisions stay compatible.
        if hdr.header_version_major.get() != KEY_BLOCK_HEADER_VERSION_MAJOR {
            return Err(ImageVerifyError::KeyBlockInvalid);
        }
        let block_size = hdr.key_block_size.get();
        if (block.len() as u64) < block_size {
            return Err(ImageVerifyError::KeyBlockInvalid);
        }

        // Authenticate with the signature or the checksum, depending on
        // whether we have a root key.
        let sig_hdr = if let Some(root) = root_key {
            let sig_hdr = &hdr.key_block_signature;
            let member_offset = KeyBlockHeader::signature_member_offset();
            if !bounds::signature_inside(block_size, member_offset, sig_hdr) {
                return Err(ImageVerifyError::KeyBlockInvalid);
            }

            let rsa = self.rsa_key(root)?;

            // The signed prefix cannot extend past the block.
            if block_size < sig_hdr.data_size.get() {
                return Err(ImageVerifyError::KeyBlockInvalid);
            }

            let sig = SignatureView::new(&block[member_offset as usize..])
                .map_err(|_| ImageVerifyError::KeyBlockInvalid)?;
            if !self.verify_data_raw(block, &sig, &rsa) {
                return Err(ImageVerifyError::KeyBlockSignatureFailed);
            }
            sig_hdr
        } else {
            let sig_hdr = &hdr.key_block_checksum;
            let member_offset = KeyBlockHeader::checksum_member_offset();
            if !bounds::signature_inside(block_size, member_offset, sig_hdr) {
                return Err(ImageVerifyError::KeyBlockInvalid);
            }
            if sig_hdr.sig_size.get() != SHA512_DIGEST_BYTE_SIZE as u64 {
                return Err(ImageVerifyError::KeyBlockInvalid);
            }
            if block_size < sig_hdr.data_size.get() {
                return Err(ImageVerifyError::KeyBlockInvalid);
            }

            let sig = SignatureView::new(&block[member_offset as usize..])
                .map_err(|_| ImageVerifyError::KeyBlockInvalid)?;
            let checksum = self
                .env
                .digest(KEY_BLOCK_CHECKSUM_DIGEST, &block[..sig_hdr.data_size.get() as usize]);
            let checksum = &checksum[..SHA512_DIGEST_BYTE_SIZE];
            if !bool::from(checksum.ct_eq(sig.signature())) {
                return Err(ImageVerifyError::KeyBlockHashFailed);
            }
            sig_hdr
        };

        // The header itself must be covered by whatever we just checked;
        // fields below the signed range could otherwise be substituted.
        if sig_hdr.data_size.get() < size_of::<KeyBlockHeader>() as u64 {
            return Err(ImageVerifyError::KeyBlockInvalid);
        }

        // The data key must be inside the block and inside the signed
        // prefix. The second check is what keeps an unsigned key appended
        // past the signed region from being handed off.
        let data_key_offset = KeyBlockHeader::data_key_member_offset();
        if !bounds::pub_key_inside(block_size, data_key_offset, &hdr.data_key) {
            return Err(ImageVerifyError::KeyBlockInvalid);
        }
        if !bounds::pub_key_inside(sig_hdr.data_size.get(), data_key_offset, &hdr.data_key) {
            return Err(ImageVerifyError::KeyBlockInvalid);
        }

        let data_key = PubKeyView::new(&block[data_key_offset as usize..])
            .map_err(|_| ImageVerifyError::KeyBlockInvalid)?;

        Ok(KeyBlockInfo {
            data_key,
            key_block_size: block_size,
            header_version_major: hdr.header_version_major.get(),
            header_version_minor: hdr.header_version_minor.get(),
            data_key_version: hdr.data_key.key_version.get(),
        })
    }

    /// Verify a firmware preamble with the key block's data key.
    pub fn verify_fw_preamble<'a>(
        &self,
        preamble: &'a [u8],
        key: &ImageRsaKey<Env::RsaKey>,
    ) -> ImageVerifyResult<FwPreambleInfo<'a>> {
        let hdr = FwPreambleHeader::read_from_prefix(preamble)
            .ok_or(ImageVerifyError::PreambleInvalid)?;

        if hdr.header_version_major.get() != FW_PREAMBLE_HEADER_VERSION_MAJOR {
            return Err(ImageVerifyError::PreambleInvalid);
        }
        let preamble_size = hdr.preamble_size.get();
        if (preamble.len() as u64) < preamble_size {
            return Err(ImageVerifyError::PreambleInvalid);
        }

        let sig_member_offset = FwPreambleHeader::signature_member_offset();
        if !bounds::signature_inside(preamble_size, sig_member_offset, &hdr.preamble_signature) {
            return Err(ImageVerifyError::PreambleInvalid);
        }
        if preamble_size < hdr.preamble_signature.data_size.get() {
            return Err(ImageVerifyError::PreambleInvalid);
        }

        let sig = SignatureView::new(&preamble[sig_member_offset as usize..])
            .map_err(|_| ImageVerifyError::PreambleInvalid)?;
        if !self.verify_data_raw(preamble, &sig, key) {
            return Err(ImageVerifyError::PreambleSignatureFailed);
        }

        if hdr.preamble_signature.data_size.get() < size_of::<FwPreambleHeader>() as u64 {
            return Err(ImageVerifyError::PreambleInvalid);
        }

        let body_sig_offset = FwPreambleHeader::body_signature_member_offset();
        if !bounds::signature_inside(preamble_size, body_sig_offset, &hdr.body_signature) {
            return Err(ImageVerifyError::PreambleInvalid);
        }

        let subkey_offset = FwPreambleHeader::kernel_subkey_member_offset();
        if !bounds::pub_key_inside(preamble_size, subkey_offset, &hdr.kernel_subkey) {
            return Err(ImageVerifyError::PreambleInvalid);
        }

        let kernel_subkey = PubKeyView::new(&preamble[subkey_offset as usize..])
            .map_err(|_| ImageVerifyError::PreambleInvalid)?;
        let body_signature = SignatureView::new(&preamble[body_sig_offset as usize..])
            .map_err(|_| ImageVerifyError::PreambleInvalid)?;

        Ok(FwPreambleInfo {
            kernel_subkey,
            body_signature,
            firmware_version: hdr.firmware_version.get(),
            preamble_size,
        })
    }

    /// Verify a kernel preamble with the firmware's kernel subkey.
    pub fn verify_kernel_preamble<'a>(
        &self,
        preamble: &'a [u8],
        key: &ImageRsaKey<Env::RsaKey>,
    ) -> ImageVerifyResult<KernelPreambleInfo<'a>> {
        let hdr = KernelPreambleHeader::read_from_prefix(preamble)
            .ok_or(ImageVerifyError::PreambleInvalid)?;

        if hdr.header_version_major.get() != KERNEL_PREAMBLE_HEADER_VERSION_MAJOR {
            return Err(ImageVerifyError::PreambleInvalid);
        }
        let preamble_size = hdr.preamble_size.get();
        if (preamble.len() as u64) < preamble_size {
            return Err(ImageVerifyError::PreambleInvalid);
        }

        let sig_member_offset = KernelPreambleHeader::signature_member_offset();
        if !bounds::signature_inside(preamble_size, sig_member_offset, &hdr.preamble_signature) {
            return Err(ImageVerifyError::PreambleInvalid);
        }
        if preamble_size < hdr.preamble_signature.data_size.get() {
            return Err(ImageVerifyError::PreambleInvalid);
        }

        let sig = SignatureView::new(&preamble[sig_member_offset as usize..])
            .map_err(|_| ImageVerifyError::PreambleInvalid)?;
        if !self.verify_data_raw(preamble, &sig, key) {
            return Err(ImageVerifyError::PreambleSignatureFailed);
        }

        if hdr.preamble_signature.data_size.get() < size_of::<KernelPreambleHeader>() as u64 {
            return Err(ImageVerifyError::PreambleInvalid);
        }

        let body_sig_offset = KernelPreambleHeader::body_signature_member_offset();
        if !bounds::signature_inside(preamble_size, body_sig_offset, &hdr.body_signature) {
            return Err(ImageVerifyError::PreambleInvalid);
        }

        let body_signature = SignatureView::new(&preamble[body_sig_offset as usize..])
            .map_err(|_| ImageVerifyError::PreambleInvalid)?;

        Ok(KernelPreambleInfo {
            body_signature,
            body_load_address: hdr.body_load_address.get(),
            body_size: hdr.body_size.get(),
            kernel_version: hdr.kernel_version.get(),
            preamble_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultboot_image_types::{
        DigestAlgorithm, PubKeyHeader, SignatureHeader, FW_PREAMBLE_HEADER_BYTE_SIZE,
        KERNEL_PREAMBLE_HEADER_BYTE_SIZE, KEY_BLOCK_HEADER_BYTE_SIZE, MAX_DIGEST_BYTE_SIZE,
    };
    use zerocopy::byteorder::{LittleEndian, U32, U64};
    use zerocopy::AsBytes;

    const TEST_DIGEST_BYTE: u8 = 0xa5;

    // RSA-1024/SHA-1 keeps the synthetic containers small.
    const TEST_KEY_SIZE: u64 = 264;
    const TEST_SIG_SIZE: u64 = 128;

    /// Fake crypto environment: digests are a constant pattern and RSA
    /// outcomes are scripted, so these tests exercise only the parsing and
    /// bounds state machine.
    struct TestEnv {
        key_ok: bool,
        rsa_verify_result: bool,
    }

    impl Default for TestEnv {
        fn default() -> Self {
            Self {
                key_ok: true,
                rsa_verify_result: true,
            }
        }
    }

    impl ImageVerificationEnv for TestEnv {
        type RsaKey = ();

        fn digest(&self, _alg: DigestAlgorithm, _data: &[u8]) -> [u8; MAX_DIGEST_BYTE_SIZE] {
            [TEST_DIGEST_BYTE; MAX_DIGEST_BYTE_SIZE]
        }

        fn rsa_key_from_bytes(&self, _alg: Algorithm, _key_material: &[u8]) -> Option<()> {
            self.key_ok.then_some(())
        }

        fn rsa_verify(&self, _key: &(), _data: &[u8], _sig: &[u8], _alg: Algorithm) -> bool {
            self.rsa_verify_result
        }

        fn rsa_verify_digest(&self, _key: &(), _digest: &[u8], _sig: &[u8], _alg: Algorithm) -> bool {
            self.rsa_verify_result
        }
    }

    fn u64le(v: u64) -> U64<LittleEndian> {
        U64::new(v)
    }

    fn u32le(v: u32) -> U32<LittleEndian> {
        U32::new(v)
    }

    /// A packed RSA-1024/SHA-1 public key region (header + zeroed
    /// material), good enough for the scripted environment.
    fn test_root_key_region() -> Vec<u8> {
        let hdr = PubKeyHeader {
            key_offset: u64le(32),
            key_size: u64le(TEST_KEY_SIZE),
            algorithm: u64le(Algorithm::RSA1024_SHA1.as_wire()),
            key_version: u64le(1),
        };
        let mut buf = vec![0u8; 32 + TEST_KEY_SIZE as usize];
        buf[..32].copy_from_slice(hdr.as_bytes());
        buf
    }

    /// A structurally valid key block whose checksum blob matches the
    /// scripted digest.
    fn build_key_block() -> Vec<u8> {
        let hdr_size = KEY_BLOCK_HEADER_BYTE_SIZE as u64;
        let data_size = hdr_size + TEST_KEY_SIZE;
        let block_size = data_size + 64 + TEST_SIG_SIZE;

        let hdr = KeyBlockHeader {
            magic: KEY_BLOCK_MAGIC,
            header_version_major: u32le(KEY_BLOCK_HEADER_VERSION_MAJOR),
            header_version_minor: u32le(1),
            key_block_size: u64le(block_size),
            key_block_signature: SignatureHeader {
                sig_offset: u64le(data_size + 64 - KeyBlockHeader::signature_member_offset()),
                sig_size: u64le(TEST_SIG_SIZE),
                data_size: u64le(data_size),
            },
            key_block_checksum: SignatureHeader {
                sig_offset: u64le(data_size - KeyBlockHeader::checksum_member_offset()),
                sig_size: u64le(64),
                data_size: u64le(data_size),
            },
            data_key: PubKeyHeader {
                key_offset: u64le(32),
                key_size: u64le(TEST_KEY_SIZE),
                algorithm: u64le(Algorithm::RSA1024_SHA1.as_wire()),
                key_version: u64le(7),
            },
        };

        let mut buf = vec![0u8; block_size as usize];
        buf[..KEY_BLOCK_HEADER_BYTE_SIZE].copy_from_slice(hdr.as_bytes());
        let chk_off = data_size as usize;
        buf[chk_off..chk_off + 64].copy_from_slice(&[TEST_DIGEST_BYTE; 64]);
        buf
    }

    fn patch_header(block: &mut [u8], f: impl FnOnce(&mut KeyBlockHeader)) {
        let mut hdr = KeyBlockHeader::read_from_prefix(block).unwrap();
        f(&mut hdr);
        block[..KEY_BLOCK_HEADER_BYTE_SIZE].copy_from_slice(hdr.as_bytes());
    }

    #[test]
    fn test_key_block_hash_mode_ok() {
        let block = build_key_block();
        let verifier = ImageVerifier::new(TestEnv::default());
        let info = verifier.verify_key_block(&block, None).unwrap();
        assert_eq!(info.key_block_size, block.len() as u64);
        assert_eq!(info.data_key_version, 7);
        assert_eq!(info.data_key.key_data().len(), TEST_KEY_SIZE as usize);
        assert_eq!(info.header_version_major, KEY_BLOCK_HEADER_VERSION_MAJOR);
    }

    #[test]
    fn test_key_block_key_mode_ok() {
        let block = build_key_block();
        let root_region = test_root_key_region();
        let root = PubKeyView::new(&root_region).unwrap();
        let verifier = ImageVerifier::new(TestEnv::default());
        assert!(verifier.verify_key_block(&block, Some(&root)).is_ok());
    }

    #[test]
    fn test_key_block_bad_magic() {
        let mut block = build_key_block();
        block[0] &= 0x12;
        let verifier = ImageVerifier::new(TestEnv::default());
        assert_eq!(
            verifier.verify_key_block(&block, None).unwrap_err(),
            ImageVerifyError::KeyBlockInvalid
        );
    }

    #[test]
    fn test_key_block_major_version_mismatch() {
        let mut block = build_key_block();
        patch_header(&mut block, |hdr| {
            hdr.header_version_major = u32le(KEY_BLOCK_HEADER_VERSION_MAJOR + 1)
        });
        let verifier = ImageVerifier::new(TestEnv::default());
        assert_eq!(
            verifier.verify_key_block(&block, None).unwrap_err(),
            ImageVerifyError::KeyBlockInvalid
        );
    }

    #[test]
    fn test_key_block_minor_version_ignored() {
        let mut block = build_key_block();
        patch_header(&mut block, |hdr| hdr.header_version_minor = u32le(99));
        let verifier = ImageVerifier::new(TestEnv::default());
        assert!(verifier.verify_key_block(&block, None).is_ok());
    }

    #[test]
    fn test_key_block_size_underrun() {
        let block = build_key_block();
        let verifier = ImageVerifier::new(TestEnv::default());
        assert_eq!(
            verifier
                .verify_key_block(&block[..block.len() - 1], None)
                .unwrap_err(),
            ImageVerifyError::KeyBlockInvalid
        );
    }

    #[test]
    fn test_key_block_size_slack_tolerated() {
        let mut block = build_key_block();
        block.extend_from_slice(&[0xff; 1024]);
        let verifier = ImageVerifier::new(TestEnv::default());
        assert!(verifier.verify_key_block(&block, None).is_ok());
    }

    #[test]
    fn test_key_block_signature_off_end() {
        let mut block = build_key_block();
        let block_size = block.len() as u64;
        patch_header(&mut block, |hdr| {
            hdr.key_block_signature.sig_offset = u64le(block_size)
        });
        let root_region = test_root_key_region();
        let root = PubKeyView::new(&root_region).unwrap();
        let verifier = ImageVerifier::new(TestEnv::default());
        assert_eq!(
            verifier.verify_key_block(&block, Some(&root)).unwrap_err(),
            ImageVerifyError::KeyBlockInvalid
        );
    }

    #[test]
    fn test_key_block_checksum_off_end() {
        let mut block = build_key_block();
        let block_size = block.len() as u64;
        patch_header(&mut block, |hdr| {
            hdr.key_block_checksum.sig_offset = u64le(block_size)
        });
        let verifier = ImageVerifier::new(TestEnv::default());
        assert_eq!(
            verifier.verify_key_block(&block, None).unwrap_err(),
            ImageVerifyError::KeyBlockInvalid
        );
    }

    #[test]
    fn test_key_block_checksum_wrong_size() {
        let mut block = build_key_block();
        patch_header(&mut block, |hdr| {
            hdr.key_block_checksum.sig_size = u64le(32)
        });
        let verifier = ImageVerifier::new(TestEnv::default());
        assert_eq!(
            verifier.verify_key_block(&block, None).unwrap_err(),
            ImageVerifyError::KeyBlockInvalid
        );
    }

    #[test]
    fn test_key_block_checksum_mismatch() {
        let mut block = build_key_block();
        let chk_off = (KEY_BLOCK_HEADER_BYTE_SIZE as u64 + TEST_KEY_SIZE) as usize;
        block[chk_off] ^= 0x34;
        let verifier = ImageVerifier::new(TestEnv::default());
        assert_eq!(
            verifier.verify_key_block(&block, None).unwrap_err(),
            ImageVerifyError::KeyBlockHashFailed
        );
    }

    #[test]
    fn test_key_block_signature_rejected() {
        let block = build_key_block();
        let root_region = test_root_key_region();
        let root = PubKeyView::new(&root_region).unwrap();
        let env = TestEnv {
            rsa_verify_result: false,
            ..Default::default()
        };
        let verifier = ImageVerifier::new(env);
        assert_eq!(
            verifier.verify_key_block(&block, Some(&root)).unwrap_err(),
            ImageVerifyError::KeyBlockSignatureFailed
        );
    }

    #[test]
    fn test_key_block_root_key_rejected_by_provider() {
        let block = build_key_block();
        let root_region = test_root_key_region();
        let root = PubKeyView::new(&root_region).unwrap();
        let env = TestEnv {
            key_ok: false,
            ..Default::default()
        };
        let verifier = ImageVerifier::new(env);
        assert_eq!(
            verifier.verify_key_block(&block, Some(&root)).unwrap_err(),
            ImageVerifyError::PublicKeyInvalid
        );
    }

    #[test]
    fn test_key_block_insufficient_signed_coverage() {
        let mut block = build_key_block();
        patch_header(&mut block, |hdr| {
            hdr.key_block_checksum.data_size = u64le(4);
            hdr.data_key.key_offset = u64le(0);
            hdr.data_key.key_size = u64le(0);
        });
        let verifier = ImageVerifier::new(TestEnv::default());
        assert_eq!(
            verifier.verify_key_block(&block, None).unwrap_err(),
            ImageVerifyError::KeyBlockInvalid
        );
    }

    #[test]
    fn test_key_block_oversized_key_header_accepted() {
        // A data key whose material starts past the nominal header end is
        // fine as long as every envelope still contains it.
        let mut block = build_key_block();
        patch_header(&mut block, |hdr| {
            hdr.data_key.key_offset = u64le(40);
            hdr.data_key.key_size = u64le(TEST_KEY_SIZE - 8);
        });
        let verifier = ImageVerifier::new(TestEnv::default());
        let info = verifier.verify_key_block(&block, None).unwrap();
        assert_eq!(info.data_key.key_data().len(), TEST_KEY_SIZE as usize - 8);
    }

    #[test]
    fn test_key_block_data_key_off_end() {
        let mut block = build_key_block();
        let block_size = block.len() as u64;
        patch_header(&mut block, |hdr| hdr.data_key.key_offset = u64le(block_size));
        let verifier = ImageVerifier::new(TestEnv::default());
        assert_eq!(
            verifier.verify_key_block(&block, None).unwrap_err(),
            ImageVerifyError::KeyBlockInvalid
        );
    }

    #[test]
    fn test_key_block_data_key_outside_signed_prefix() {
        let mut block = build_key_block();
        // Sign only the fixed header; the key material then sits past the
        // signed prefix even though it is inside the block.
        patch_header(&mut block, |hdr| {
            hdr.key_block_checksum.data_size = u64le(KEY_BLOCK_HEADER_BYTE_SIZE as u64)
        });
        let verifier = ImageVerifier::new(TestEnv::default());
        assert_eq!(
            verifier.verify_key_block(&block, None).unwrap_err(),
            ImageVerifyError::KeyBlockInvalid
        );
    }

    const TEST_BODY_SIG_SIZE: u64 = 78;

    fn build_fw_preamble() -> Vec<u8> {
        let hdr_size = FW_PREAMBLE_HEADER_BYTE_SIZE as u64;
        let body_blob_offset = hdr_size + TEST_KEY_SIZE;
        let data_size = body_blob_offset + TEST_BODY_SIG_SIZE;
        let preamble_size = data_size + TEST_SIG_SIZE;

        let hdr = FwPreambleHeader {
            header_version_major: u32le(FW_PREAMBLE_HEADER_VERSION_MAJOR),
            header_version_minor: u32le(0),
            preamble_size: u64le(preamble_size),
            preamble_signature: SignatureHeader {
                sig_offset: u64le(data_size - FwPreambleHeader::signature_member_offset()),
                sig_size: u64le(TEST_SIG_SIZE),
                data_size: u64le(data_size),
            },
            firmware_version: u64le(0x1234),
            kernel_subkey: PubKeyHeader {
                key_offset: u64le(hdr_size - FwPreambleHeader::kernel_subkey_member_offset()),
                key_size: u64le(TEST_KEY_SIZE),
                algorithm: u64le(Algorithm::RSA1024_SHA1.as_wire()),
                key_version: u64le(3),
            },
            body_signature: SignatureHeader {
                sig_offset: u64le(
                    body_blob_offset - FwPreambleHeader::body_signature_member_offset(),
                ),
                sig_size: u64le(TEST_BODY_SIG_SIZE),
                data_size: u64le(56),
            },
        };

        let mut buf = vec![0u8; preamble_size as usize];
        buf[..FW_PREAMBLE_HEADER_BYTE_SIZE].copy_from_slice(hdr.as_bytes());
        buf
    }

    fn patch_fw_header(preamble: &mut [u8], f: impl FnOnce(&mut FwPreambleHeader)) {
        let mut hdr = FwPreambleHeader::read_from_prefix(preamble).unwrap();
        f(&mut hdr);
        preamble[..FW_PREAMBLE_HEADER_BYTE_SIZE].copy_from_slice(hdr.as_bytes());
    }

    fn test_rsa_key(verifier: &ImageVerifier<TestEnv>) -> ImageRsaKey<()> {
        let region = test_root_key_region();
        let view = PubKeyView::new(&region).unwrap();
        verifier.rsa_key(&view).unwrap()
    }

    #[test]
    fn test_fw_preamble_ok() {
        let preamble = build_fw_preamble();
        let verifier = ImageVerifier::new(TestEnv::default());
        let key = test_rsa_key(&verifier);
        let info = verifier.verify_fw_preamble(&preamble, &key).unwrap();
        assert_eq!(info.firmware_version, 0x1234);
        assert_eq!(info.preamble_size, preamble.len() as u64);
        assert_eq!(info.body_signature.data_size(), 56);
        assert_eq!(info.body_signature.signature().len(), 78);
        assert_eq!(info.kernel_subkey.key_version(), 3);
    }

    #[test]
    fn test_fw_preamble_major_version_mismatch() {
        let mut preamble = build_fw_preamble();
        patch_fw_header(&mut preamble, |hdr| {
            hdr.header_version_major = u32le(FW_PREAMBLE_HEADER_VERSION_MAJOR + 1)
        });
        let verifier = ImageVerifier::new(TestEnv::default());
        let key = test_rsa_key(&verifier);
        assert_eq!(
            verifier.verify_fw_preamble(&preamble, &key).unwrap_err(),
            ImageVerifyError::PreambleInvalid
        );
    }

    #[test]
    fn test_fw_preamble_minor_version_ignored() {
        let mut preamble = build_fw_preamble();
        patch_fw_header(&mut preamble, |hdr| hdr.header_version_minor = u32le(42));
        let verifier = ImageVerifier::new(TestEnv::default());
        let key = test_rsa_key(&verifier);
        assert!(verifier.verify_fw_preamble(&preamble, &key).is_ok());
    }

    #[test]
    fn test_fw_preamble_size_underrun() {
        let preamble = build_fw_preamble();
        let verifier = ImageVerifier::new(TestEnv::default());
        let key = test_rsa_key(&verifier);
        assert_eq!(
            verifier
                .verify_fw_preamble(&preamble[..preamble.len() - 1], &key)
                .unwrap_err(),
            ImageVerifyError::PreambleInvalid
        );
    }

    #[test]
    fn test_fw_preamble_signature_off_end() {
        let mut preamble = build_fw_preamble();
        let preamble_size = preamble.len() as u64;
        patch_fw_header(&mut preamble, |hdr| {
            hdr.preamble_signature.sig_offset = u64le(preamble_size)
        });
        let verifier = ImageVerifier::new(TestEnv::default());
        let key = test_rsa_key(&verifier);
        assert_eq!(
            verifier.verify_fw_preamble(&preamble, &key).unwrap_err(),
            ImageVerifyError::PreambleInvalid
        );
    }

    #[test]
    fn test_fw_preamble_signature_rejected() {
        let preamble = build_fw_preamble();
        let env = TestEnv {
            rsa_verify_result: false,
            ..Default::default()
        };
        let verifier = ImageVerifier::new(env);
        let region = test_root_key_region();
        let view = PubKeyView::new(&region).unwrap();
        let key = verifier.rsa_key(&view).unwrap();
        assert_eq!(
            verifier.verify_fw_preamble(&preamble, &key).unwrap_err(),
            ImageVerifyError::PreambleSignatureFailed
        );
    }

    #[test]
    fn test_fw_preamble_body_signature_off_end() {
        let mut preamble = build_fw_preamble();
        let preamble_size = preamble.len() as u64;
        patch_fw_header(&mut preamble, |hdr| {
            hdr.body_signature.sig_offset = u64le(preamble_size)
        });
        let verifier = ImageVerifier::new(TestEnv::default());
        let key = test_rsa_key(&verifier);
        assert_eq!(
            verifier.verify_fw_preamble(&preamble, &key).unwrap_err(),
            ImageVerifyError::PreambleInvalid
        );
    }

    #[test]
    fn test_fw_preamble_subkey_off_end() {
        let mut preamble = build_fw_preamble();
        let preamble_size = preamble.len() as u64;
        patch_fw_header(&mut preamble, |hdr| {
            hdr.kernel_subkey.key_offset = u64le(preamble_size)
        });
        let verifier = ImageVerifier::new(TestEnv::default());
        let key = test_rsa_key(&verifier);
        assert_eq!(
            verifier.verify_fw_preamble(&preamble, &key).unwrap_err(),
            ImageVerifyError::PreambleInvalid
        );
    }

    #[test]
    fn test_fw_preamble_insufficient_signed_coverage() {
        let mut preamble = build_fw_preamble();
        patch_fw_header(&mut preamble, |hdr| {
            hdr.preamble_signature.data_size = u64le(4);
            hdr.kernel_subkey.key_offset = u64le(0);
            hdr.kernel_subkey.key_size = u64le(0);
            hdr.body_signature.sig_offset = u64le(0);
            hdr.body_signature.sig_size = u64le(0);
        });
        let verifier = ImageVerifier::new(TestEnv::default());
        let key = test_rsa_key(&verifier);
        assert_eq!(
            verifier.verify_fw_preamble(&preamble, &key).unwrap_err(),
            ImageVerifyError::PreambleInvalid
        );
    }

    fn build_kernel_preamble() -> Vec<u8> {
        let hdr_size = KERNEL_PREAMBLE_HEADER_BYTE_SIZE as u64;
        let data_size = hdr_size + TEST_BODY_SIG_SIZE;
        let preamble_size = data_size + TEST_SIG_SIZE;

        let hdr = KernelPreambleHeader {
            header_version_major: u32le(KERNEL_PREAMBLE_HEADER_VERSION_MAJOR),
            header_version_minor: u32le(0),
            preamble_size: u64le(preamble_size),
            preamble_signature: SignatureHeader {
                sig_offset: u64le(data_size - KernelPreambleHeader::signature_member_offset()),
                sig_size: u64le(TEST_SIG_SIZE),
                data_size: u64le(data_size),
            },
            kernel_version: u64le(5),
            body_load_address: u64le(0x10_0000),
            body_size: u64le(0x8000),
            body_signature: SignatureHeader {
                sig_offset: u64le(hdr_size - KernelPreambleHeader::body_signature_member_offset()),
                sig_size: u64le(TEST_BODY_SIG_SIZE),
                data_size: u64le(0x8000),
            },
        };

        let mut buf = vec![0u8; preamble_size as usize];
        buf[..KERNEL_PREAMBLE_HEADER_BYTE_SIZE].copy_from_slice(hdr.as_bytes());
        buf
    }

    #[test]
    fn test_kernel_preamble_ok() {
        let preamble = build_kernel_preamble();
        let verifier = ImageVerifier::new(TestEnv::default());
        let key = test_rsa_key(&verifier);
        let info = verifier.verify_kernel_preamble(&preamble, &key).unwrap();
        assert_eq!(info.kernel_version, 5);
        assert_eq!(info.body_load_address, 0x10_0000);
        assert_eq!(info.body_size, 0x8000);
        assert_eq!(info.body_signature.data_size(), 0x8000);
    }

    #[test]
    fn test_kernel_preamble_size_underrun() {
        let preamble = build_kernel_preamble();
        let verifier = ImageVerifier::new(TestEnv::default());
        let key = test_rsa_key(&verifier);
        assert_eq!(
            verifier
                .verify_kernel_preamble(&preamble[..preamble.len() - 1], &key)
                .unwrap_err(),
            ImageVerifyError::PreambleInvalid
        );
    }

    #[test]
    fn test_verify_digest_wrong_signature_size() {
        let verifier = ImageVerifier::new(TestEnv::default());
        let key = test_rsa_key(&verifier);
        // Blob length 64 disagrees with RSA-1024.
        let mut sig_region = vec![0u8; 24 + 64];
        let sig_hdr = SignatureHeader {
            sig_offset: u64le(24),
            sig_size: u64le(64),
            data_size: u64le(64),
        };
        sig_region[..24].copy_from_slice(sig_hdr.as_bytes());
        let sig = SignatureView::new(&sig_region).unwrap();
        assert_eq!(
            verifier.verify_digest(&[0u8; 20], &sig, &key).unwrap_err(),
            ImageVerifyError::PreambleSignatureFailed
        );
    }
}
