/*++

Licensed under the Apache-2.0 license.

File Name:

   create.rs

Abstract:

    File contains the container creation commands.

--*/

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::ArgMatches;

use vaultboot_image_crypto::{
    pack_pub_key, rsa_priv_key_from_pem, rsa_pub_key_from_pem, RustCrypto,
};
use vaultboot_image_gen::ImageGenerator;
use vaultboot_image_types::Algorithm;

pub(crate) fn path_arg<'a>(args: &'a ArgMatches, name: &str) -> anyhow::Result<&'a PathBuf> {
    args.get_one::<PathBuf>(name)
        .with_context(|| format!("{name} arg not specified"))
}

pub(crate) fn u64_arg(args: &ArgMatches, name: &str) -> anyhow::Result<u64> {
    args.get_one::<u64>(name)
        .copied()
        .with_context(|| format!("{name} arg not specified"))
}

pub(crate) fn algorithm_arg(args: &ArgMatches) -> anyhow::Result<Algorithm> {
    let raw = u64_arg(args, "algorithm")?;
    Algorithm::from_wire(raw).with_context(|| format!("unsupported algorithm index {raw}"))
}

pub(crate) fn read_file(path: &PathBuf) -> anyhow::Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn signing_key(args: &ArgMatches) -> anyhow::Result<rsa::RsaPrivateKey> {
    let path = path_arg(args, "signing-key")?;
    let pem = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    rsa_priv_key_from_pem(&pem)
}

fn write_out(args: &ArgMatches, bytes: &[u8]) -> anyhow::Result<()> {
    let path = path_arg(args, "out")?;
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

/// Run the pack-key command
pub(crate) fn pack_key(args: &ArgMatches) -> anyhow::Result<()> {
    let key_path = path_arg(args, "key")?;
    let alg = algorithm_arg(args)?;
    let key_version = u64_arg(args, "key-version")?;

    let pem = fs::read_to_string(key_path)
        .with_context(|| format!("failed to read {}", key_path.display()))?;
    let key = rsa_pub_key_from_pem(&pem)?;
    let region = pack_pub_key(alg, &key, key_version)?;
    write_out(args, &region)
}

/// Run the create-key-block command
pub(crate) fn key_block(args: &ArgMatches) -> anyhow::Result<()> {
    let data_key = read_file(path_arg(args, "data-key")?)?;
    let alg = algorithm_arg(args)?;
    let key = signing_key(args)?;

    let generator = ImageGenerator::new(RustCrypto::default());
    let block = generator.gen_key_block(&data_key, alg, &key)?;
    write_out(args, &block)
}

/// Run the create-fw-preamble command
pub(crate) fn fw_preamble(args: &ArgMatches) -> anyhow::Result<()> {
    let fw_version = u64_arg(args, "fw-version")?;
    let kernel_subkey = read_file(path_arg(args, "kernel-subkey")?)?;
    let body = read_file(path_arg(args, "body")?)?;
    let alg = algorithm_arg(args)?;
    let key = signing_key(args)?;

    let generator = ImageGenerator::new(RustCrypto::default());
    let body_sig = generator.sign_data(&body, alg, &key)?;
    let preamble = generator.gen_fw_preamble(fw_version, &kernel_subkey, &body_sig, alg, &key)?;
    write_out(args, &preamble)
}

/// Run the create-kernel-preamble command
pub(crate) fn kernel_preamble(args: &ArgMatches) -> anyhow::Result<()> {
    let kernel_version = u64_arg(args, "kernel-version")?;
    let load_address = u64_arg(args, "load-address")?;
    let body = read_file(path_arg(args, "body")?)?;
    let alg = algorithm_arg(args)?;
    let key = signing_key(args)?;

    let generator = ImageGenerator::new(RustCrypto::default());
    let body_sig = generator.sign_data(&body, alg, &key)?;
    let preamble = generator.gen_kernel_preamble(
        kernel_version,
        load_address,
        body.len() as u64,
        &body_sig,
        alg,
        &key,
    )?;
    write_out(args, &preamble)
}
