/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains the interfaces of the vaultboot container generator.
    The generator is host-side tooling; the boot-time engine never signs.

--*/

mod generator;

pub use generator::ImageGenerator;

use vaultboot_image_types::{Algorithm, DigestAlgorithm};

/// Crypto operations the generator delegates to.
pub trait ImageGeneratorCrypto {
    /// Signing key handle.
    type PrivKey;

    /// Raw digest of `data`.
    fn digest(&self, alg: DigestAlgorithm, data: &[u8]) -> anyhow::Result<Vec<u8>>;

    /// PKCS#1 v1.5 signature over `data`: digest with the algorithm's hash,
    /// prepend the DigestInfo prefix, sign with `key`.
    fn rsa_sign(&self, alg: Algorithm, key: &Self::PrivKey, data: &[u8])
        -> anyhow::Result<Vec<u8>>;
}

/// A body signature to embed in a preamble.
///
/// The blob is opaque to the generator; real signatures come from
/// [`ImageGenerator::sign_data`], placeholders from [`BodySignature::stub`].
#[derive(Clone, Debug)]
pub struct BodySignature {
    /// Length of the body prefix the signature covers.
    pub data_size: u64,

    /// Signature blob.
    pub signature: Vec<u8>,
}

impl BodySignature {
    /// An all-zero placeholder of the given blob size.
    pub fn stub(data_size: u64, sig_size: usize) -> Self {
        Self {
            data_size,
            signature: vec![0u8; sig_size],
        }
    }
}
