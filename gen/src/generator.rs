/*++

Licensed under the Apache-2.0 license.

File Name:

   generator.rs

Abstract:

    vaultboot container generator. Lays out key blocks and preambles,
    computes their checksums and signs them.

--*/

use anyhow::{bail, Context};
use vaultboot_image_types::{
    Algorithm, FwPreambleHeader, KernelPreambleHeader, KeyBlockHeader, PubKeyHeader,
    SignatureHeader, FW_PREAMBLE_HEADER_BYTE_SIZE, FW_PREAMBLE_HEADER_VERSION_MAJOR,
    FW_PREAMBLE_HEADER_VERSION_MINOR, KERNEL_PREAMBLE_HEADER_BYTE_SIZE,
    KERNEL_PREAMBLE_HEADER_VERSION_MAJOR, KERNEL_PREAMBLE_HEADER_VERSION_MINOR,
    KEY_BLOCK_CHECKSUM_DIGEST, KEY_BLOCK_HEADER_BYTE_SIZE, KEY_BLOCK_HEADER_VERSION_MAJOR,
    KEY_BLOCK_HEADER_VERSION_MINOR, KEY_BLOCK_MAGIC, PUB_KEY_HEADER_BYTE_SIZE,
    SHA512_DIGEST_BYTE_SIZE,
};
use zerocopy::byteorder::{LittleEndian, U32, U64};
use zerocopy::{AsBytes, FromBytes};

use crate::{BodySignature, ImageGeneratorCrypto};

fn u64le(v: u64) -> U64<LittleEndian> {
    U64::new(v)
}

fn u32le(v: u32) -> U32<LittleEndian> {
    U32::new(v)
}

/// A parsed packed public key, ready to be embedded in a container.
struct PackedKey<'a> {
    header: PubKeyHeader,
    material: &'a [u8],
}

impl<'a> PackedKey<'a> {
    /// `region` must begin at a public key header whose material the
    /// header's own offset/size fields locate inside the region.
    fn parse(region: &'a [u8]) -> anyhow::Result<PackedKey<'a>> {
        let header = PubKeyHeader::read_from_prefix(region)
            .context("public key region shorter than its header")?;
        let start = usize::try_from(header.key_offset.get())
            .ok()
            .filter(|start| *start >= PUB_KEY_HEADER_BYTE_SIZE)
            .context("key material overlaps the public key header")?;
        let size = usize::try_from(header.key_size.get())
            .context("key size out of range")?;
        let material = start
            .checked_add(size)
            .and_then(|end| region.get(start..end))
            .context("key material outside the public key region")?;
        Ok(PackedKey { header, material })
    }
}

/// Container generator.
pub struct ImageGenerator<Crypto: ImageGeneratorCrypto> {
    crypto: Crypto,
}

impl<Crypto: ImageGeneratorCrypto> ImageGenerator<Crypto> {
    pub fn new(crypto: Crypto) -> Self {
        Self { crypto }
    }

    /// Sign `data` and return it in embeddable form.
    pub fn sign_data(
        &self,
        data: &[u8],
        alg: Algorithm,
        key: &Crypto::PrivKey,
    ) -> anyhow::Result<BodySignature> {
        let signature = self.crypto.rsa_sign(alg, key, data)?;
        if signature.len() != alg.signature_byte_size() {
            bail!(
                "signer produced {} bytes, algorithm {} requires {}",
                signature.len(),
                alg.as_wire(),
                alg.signature_byte_size()
            );
        }
        Ok(BodySignature {
            data_size: data.len() as u64,
            signature,
        })
    }

    /// Generate a key block handing off `data_key` (a packed public key
    /// region), signed with `key` under `alg`.
    ///
    /// Layout: `[header | data-key material | checksum blob | signature
    /// blob]`; the signed prefix covers the header and the key material.
    pub fn gen_key_block(
        &self,
        data_key: &[u8],
        alg: Algorithm,
        key: &Crypto::PrivKey,
    ) -> anyhow::Result<Vec<u8>> {
        let data_key = PackedKey::parse(data_key)?;

        let hdr_size = KEY_BLOCK_HEADER_BYTE_SIZE as u64;
        let key_size = data_key.material.len() as u64;
        let sig_size = alg.signature_byte_size() as u64;
        let chk_size = SHA512_DIGEST_BYTE_SIZE as u64;

        let material_offset = hdr_size;
        let chk_offset = material_offset + key_size;
        let sig_offset = chk_offset + chk_size;
        let data_size = hdr_size + key_size;
        let block_size = sig_offset + sig_size;

        let hdr = KeyBlockHeader {
            magic: KEY_BLOCK_MAGIC,
            header_version_major: u32le(KEY_BLOCK_HEADER_VERSION_MAJOR),
            header_version_minor: u32le(KEY_BLOCK_HEADER_VERSION_MINOR),
            key_block_size: u64le(block_size),
            key_block_signature: SignatureHeader {
                sig_offset: u64le(sig_offset - KeyBlockHeader::signature_member_offset()),
                sig_size: u64le(sig_size),
                data_size: u64le(data_size),
            },
            key_block_checksum: SignatureHeader {
                sig_offset: u64le(chk_offset - KeyBlockHeader::checksum_member_offset()),
                sig_size: u64le(chk_size),
                data_size: u64le(data_size),
            },
            data_key: PubKeyHeader {
                key_offset: u64le(material_offset - KeyBlockHeader::data_key_member_offset()),
                key_size: u64le(key_size),
                algorithm: data_key.header.algorithm,
                key_version: data_key.header.key_version,
            },
        };

        let mut block = vec![0u8; block_size as usize];
        block[..KEY_BLOCK_HEADER_BYTE_SIZE].copy_from_slice(hdr.as_bytes());
        block[material_offset as usize..chk_offset as usize].copy_from_slice(data_key.material);

        let checksum = self
            .crypto
            .digest(KEY_BLOCK_CHECKSUM_DIGEST, &block[..data_size as usize])?;
        if checksum.len() != chk_size as usize {
            bail!("key block checksum has the wrong size");
        }
        block[chk_offset as usize..sig_offset as usize].copy_from_slice(&checksum);

        let signature = self.crypto.rsa_sign(alg, key, &block[..data_size as usize])?;
        if signature.len() != sig_size as usize {
            bail!("key block signature has the wrong size");
        }
        block[sig_offset as usize..].copy_from_slice(&signature);

        Ok(block)
    }

    /// Generate a firmware preamble embedding `kernel_subkey` and
    /// `body_sig`, signed with `key` under `alg`.
    ///
    /// Layout: `[header | subkey material | body-signature blob |
    /// preamble-signature blob]`; everything before the preamble signature
    /// blob is signed.
    pub fn gen_fw_preamble(
        &self,
        firmware_version: u64,
        kernel_subkey: &[u8],
        body_sig: &BodySignature,
        alg: Algorithm,
        key: &Crypto::PrivKey,
    ) -> anyhow::Result<Vec<u8>> {
        let subkey = PackedKey::parse(kernel_subkey)?;

        let hdr_size = FW_PREAMBLE_HEADER_BYTE_SIZE as u64;
        let subkey_size = subkey.material.len() as u64;
        let body_sig_size = body_sig.signature.len() as u64;
        let sig_size = alg.signature_byte_size() as u64;

        let material_offset = hdr_size;
        let body_blob_offset = material_offset + subkey_size;
        let data_size = body_blob_offset + body_sig_size;
        let preamble_size = data_size + sig_size;

        let hdr = FwPreambleHeader {
            header_version_major: u32le(FW_PREAMBLE_HEADER_VERSION_MAJOR),
            header_version_minor: u32le(FW_PREAMBLE_HEADER_VERSION_MINOR),
            preamble_size: u64le(preamble_size),
            preamble_signature: SignatureHeader {
                sig_offset: u64le(data_size - FwPreambleHeader::signature_member_offset()),
                sig_size: u64le(sig_size),
                data_size: u64le(data_size),
            },
            firmware_version: u64le(firmware_version),
            kernel_subkey: PubKeyHeader {
                key_offset: u64le(
                    material_offset - FwPreambleHeader::kernel_subkey_member_offset(),
                ),
                key_size: u64le(subkey_size),
                algorithm: subkey.header.algorithm,
                key_version: subkey.header.key_version,
            },
            body_signature: SignatureHeader {
                sig_offset: u64le(
                    body_blob_offset - FwPreambleHeader::body_signature_member_offset(),
                ),
                sig_size: u64le(body_sig_size),
                data_size: u64le(body_sig.data_size),
            },
        };

        let mut preamble = vec![0u8; preamble_size as usize];
        preamble[..FW_PREAMBLE_HEADER_BYTE_SIZE].copy_from_slice(hdr.as_bytes());
        preamble[material_offset as usize..body_blob_offset as usize]
            .copy_from_slice(subkey.material);
        preamble[body_blob_offset as usize..data_size as usize]
            .copy_from_slice(&body_sig.signature);

        let signature = self
            .crypto
            .rsa_sign(alg, key, &preamble[..data_size as usize])?;
        if signature.len() != sig_size as usize {
            bail!("preamble signature has the wrong size");
        }
        preamble[data_size as usize..].copy_from_slice(&signature);

        Ok(preamble)
    }

    /// Generate a kernel preamble, signed with `key` under `alg`.
    ///
    /// Same shape as the firmware preamble with the body load metadata in
    /// place of the embedded subkey.
    pub fn gen_kernel_preamble(
        &self,
        kernel_version: u64,
        body_load_address: u64,
        body_size: u64,
        body_sig: &BodySignature,
        alg: Algorithm,
        key: &Crypto::PrivKey,
    ) -> anyhow::Result<Vec<u8>> {
        let hdr_size = KERNEL_PREAMBLE_HEADER_BYTE_SIZE as u64;
        let body_sig_size = body_sig.signature.len() as u64;
        let sig_size = alg.signature_byte_size() as u64;

        let body_blob_offset = hdr_size;
        let data_size = body_blob_offset + body_sig_size;
        let preamble_size = data_size + sig_size;

        let hdr = KernelPreambleHeader {
            header_version_major: u32le(KERNEL_PREAMBLE_HEADER_VERSION_MAJOR),
            header_version_minor: u32le(KERNEL_PREAMBLE_HEADER_VERSION_MINOR),
            preamble_size: u64le(preamble_size),
            preamble_signature: SignatureHeader {
                sig_offset: u64le(data_size - KernelPreambleHeader::signature_member_offset()),
                sig_size: u64le(sig_size),
                data_size: u64le(data_size),
            },
            kernel_version: u64le(kernel_version),
            body_load_address: u64le(body_load_address),
            body_size: u64le(body_size),
            body_signature: SignatureHeader {
                sig_offset: u64le(
                    body_blob_offset - KernelPreambleHeader::body_signature_member_offset(),
                ),
                sig_size: u64le(body_sig_size),
                data_size: u64le(body_sig.data_size),
            },
        };

        let mut preamble = vec![0u8; preamble_size as usize];
        preamble[..KERNEL_PREAMBLE_HEADER_BYTE_SIZE].copy_from_slice(hdr.as_bytes());
        preamble[body_blob_offset as usize..data_size as usize]
            .copy_from_slice(&body_sig.signature);

        let signature = self
            .crypto
            .rsa_sign(alg, key, &preamble[..data_size as usize])?;
        if signature.len() != sig_size as usize {
            bail!("preamble signature has the wrong size");
        }
        preamble[data_size as usize..].copy_from_slice(&signature);

        Ok(preamble)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultboot_image_types::DigestAlgorithm;

    /// Deterministic stand-in crypto: "digests" are a repeating marker and
    /// "signatures" are a counted fill, so layout can be asserted without
    /// key material.
    struct StubCrypto;

    impl ImageGeneratorCrypto for StubCrypto {
        type PrivKey = u8;

        fn digest(&self, alg: DigestAlgorithm, _data: &[u8]) -> anyhow::Result<Vec<u8>> {
            Ok(vec![0xd1; alg.digest_byte_size()])
        }

        fn rsa_sign(
            &self,
            alg: Algorithm,
            key: &Self::PrivKey,
            _data: &[u8],
        ) -> anyhow::Result<Vec<u8>> {
            Ok(vec![*key; alg.signature_byte_size()])
        }
    }

    fn stub_pub_key_region(alg: Algorithm) -> Vec<u8> {
        let key_size = alg.processed_key_byte_size();
        let hdr = PubKeyHeader {
            key_offset: u64le(PUB_KEY_HEADER_BYTE_SIZE as u64),
            key_size: u64le(key_size as u64),
            algorithm: u64le(alg.as_wire()),
            key_version: u64le(2),
        };
        let mut region = vec![0x5a; PUB_KEY_HEADER_BYTE_SIZE + key_size];
        region[..PUB_KEY_HEADER_BYTE_SIZE].copy_from_slice(hdr.as_bytes());
        region
    }

    #[test]
    fn test_key_block_layout() {
        let alg = Algorithm::RSA2048_SHA256;
        let data_key = stub_pub_key_region(Algorithm::RSA1024_SHA1);
        let gen = ImageGenerator::new(StubCrypto);
        let block = gen.gen_key_block(&data_key, alg, &0x7b).unwrap();

        let hdr = KeyBlockHeader::read_from_prefix(block.as_slice()).unwrap();
        let key_size = Algorithm::RSA1024_SHA1.processed_key_byte_size() as u64;
        let data_size = KEY_BLOCK_HEADER_BYTE_SIZE as u64 + key_size;
        assert_eq!(hdr.key_block_size.get(), block.len() as u64);
        assert_eq!(
            hdr.key_block_size.get(),
            data_size + 64 + alg.signature_byte_size() as u64
        );
        assert_eq!(hdr.key_block_signature.data_size.get(), data_size);
        assert_eq!(hdr.key_block_checksum.data_size.get(), data_size);
        assert_eq!(hdr.data_key.key_version.get(), 2);

        // The key material lands right after the header.
        let material_offset = KeyBlockHeader::data_key_member_offset()
            + hdr.data_key.key_offset.get();
        assert_eq!(material_offset, KEY_BLOCK_HEADER_BYTE_SIZE as u64);
        assert_eq!(block[material_offset as usize], 0x5a);

        // Checksum blob then signature blob.
        let chk_offset =
            KeyBlockHeader::checksum_member_offset() + hdr.key_block_checksum.sig_offset.get();
        assert_eq!(chk_offset, data_size);
        assert_eq!(block[chk_offset as usize], 0xd1);
        let sig_offset =
            KeyBlockHeader::signature_member_offset() + hdr.key_block_signature.sig_offset.get();
        assert_eq!(sig_offset, data_size + 64);
        assert_eq!(block[sig_offset as usize], 0x7b);
        assert_eq!(block.last(), Some(&0x7b));
    }

    #[test]
    fn test_fw_preamble_layout() {
        let alg = Algorithm::RSA1024_SHA512;
        let subkey = stub_pub_key_region(Algorithm::RSA1024_SHA256);
        let body_sig = BodySignature::stub(56, 78);
        let gen = ImageGenerator::new(StubCrypto);
        let preamble = gen
            .gen_fw_preamble(0x1234, &subkey, &body_sig, alg, &0x11)
            .unwrap();

        let hdr = FwPreambleHeader::read_from_prefix(preamble.as_slice()).unwrap();
        let subkey_size = Algorithm::RSA1024_SHA256.processed_key_byte_size() as u64;
        let data_size = FW_PREAMBLE_HEADER_BYTE_SIZE as u64 + subkey_size + 78;
        assert_eq!(hdr.preamble_size.get(), preamble.len() as u64);
        assert_eq!(hdr.preamble_size.get(), data_size + 128);
        assert_eq!(hdr.preamble_signature.data_size.get(), data_size);
        assert_eq!(hdr.firmware_version.get(), 0x1234);
        assert_eq!(hdr.body_signature.data_size.get(), 56);
        assert_eq!(hdr.body_signature.sig_size.get(), 78);

        let body_blob_offset = FwPreambleHeader::body_signature_member_offset()
            + hdr.body_signature.sig_offset.get();
        assert_eq!(
            body_blob_offset,
            FW_PREAMBLE_HEADER_BYTE_SIZE as u64 + subkey_size
        );
    }

    #[test]
    fn test_kernel_preamble_layout() {
        let alg = Algorithm::RSA1024_SHA1;
        let body_sig = BodySignature::stub(0x8000, 128);
        let gen = ImageGenerator::new(StubCrypto);
        let preamble = gen
            .gen_kernel_preamble(9, 0x10_0000, 0x8000, &body_sig, alg, &0x22)
            .unwrap();

        let hdr = KernelPreambleHeader::read_from_prefix(preamble.as_slice()).unwrap();
        let data_size = KERNEL_PREAMBLE_HEADER_BYTE_SIZE as u64 + 128;
        assert_eq!(hdr.preamble_size.get(), preamble.len() as u64);
        assert_eq!(hdr.preamble_signature.data_size.get(), data_size);
        assert_eq!(hdr.kernel_version.get(), 9);
        assert_eq!(hdr.body_load_address.get(), 0x10_0000);
        assert_eq!(hdr.body_size.get(), 0x8000);
    }

    #[test]
    fn test_rejects_malformed_data_key_region() {
        let gen = ImageGenerator::new(StubCrypto);
        // Material range runs past the end of the region.
        let mut region = stub_pub_key_region(Algorithm::RSA1024_SHA1);
        region.truncate(region.len() - 1);
        assert!(gen
            .gen_key_block(&region, Algorithm::RSA1024_SHA1, &0)
            .is_err());
    }
}
