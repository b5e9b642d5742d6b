// Licensed under the Apache-2.0 license

//! Well-known RSA key pairs for tests.
//!
//! The keys are derived from fixed seeds, so every test run and every
//! crate in the workspace sees the same key material without binary
//! fixtures in the tree. Never use these keys to sign anything real.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rsa::RsaPrivateKey;
use std::sync::OnceLock;

fn generate(bits: usize, seed: u64) -> RsaPrivateKey {
    let mut rng = StdRng::seed_from_u64(seed);
    RsaPrivateKey::new(&mut rng, bits).expect("RSA test key generation failed")
}

/// Root signing key, RSA-1024 tier.
pub fn root_key_rsa1024() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| generate(1024, 0x526f_6f74_3130))
}

/// Root signing key, RSA-2048 tier.
pub fn root_key_rsa2048() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| generate(2048, 0x526f_6f74_3230))
}

/// Data key, RSA-1024 tier.
pub fn data_key_rsa1024() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| generate(1024, 0x4461_7461_3130))
}

/// Data key, RSA-2048 tier.
pub fn data_key_rsa2048() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| generate(2048, 0x4461_7461_3230))
}
