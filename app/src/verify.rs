/*++

Licensed under the Apache-2.0 license.

File Name:

   verify.rs

Abstract:

    File contains the container verification commands.

--*/

use clap::ArgMatches;

use vaultboot_image_crypto::RustCrypto;
use vaultboot_image_verify::{ImageVerifier, PubKeyView};

use crate::create::{path_arg, read_file};

/// Run the verify-key-block command
pub(crate) fn key_block(args: &ArgMatches) -> anyhow::Result<()> {
    let image = read_file(path_arg(args, "image")?)?;
    let root_region = match args.get_one::<std::path::PathBuf>("root-key") {
        Some(path) => Some(read_file(path)?),
        None => None,
    };

    let verifier = ImageVerifier::new(RustCrypto::default());
    let root_view = match &root_region {
        Some(region) => Some(PubKeyView::new(region)?),
        None => None,
    };
    let info = verifier.verify_key_block(&image, root_view.as_ref())?;

    println!("Success.");
    if root_view.is_none() {
        println!("(checksum inspection only; origin not proven)");
    }
    println!("Key block size:     {}", info.key_block_size);
    println!(
        "Header version:     {}.{}",
        info.header_version_major, info.header_version_minor
    );
    println!("Data key algorithm: {}", info.data_key.algorithm_raw());
    println!("Data key version:   {}", info.data_key_version);
    Ok(())
}

/// Run the verify-fw-preamble command
pub(crate) fn fw_preamble(args: &ArgMatches) -> anyhow::Result<()> {
    let image = read_file(path_arg(args, "image")?)?;
    let data_key_region = read_file(path_arg(args, "data-key")?)?;

    let verifier = ImageVerifier::new(RustCrypto::default());
    let data_key_view = PubKeyView::new(&data_key_region)?;
    let key = verifier.rsa_key(&data_key_view)?;
    let info = verifier.verify_fw_preamble(&image, &key)?;

    println!("Success.");
    println!("Preamble size:           {}", info.preamble_size);
    println!("Firmware version:        {}", info.firmware_version);
    println!(
        "Kernel subkey algorithm: {}",
        info.kernel_subkey.algorithm_raw()
    );
    println!(
        "Kernel subkey version:   {}",
        info.kernel_subkey.key_version()
    );
    println!("Body signed size:        {}", info.body_signature.data_size());

    if let Some(body_path) = args.get_one::<std::path::PathBuf>("body") {
        let body = read_file(body_path)?;
        verifier.verify_data(&body, &info.body_signature, &key)?;
        println!("Body signature:          valid");
    }
    Ok(())
}

/// Run the verify-kernel-preamble command
pub(crate) fn kernel_preamble(args: &ArgMatches) -> anyhow::Result<()> {
    let image = read_file(path_arg(args, "image")?)?;
    let data_key_region = read_file(path_arg(args, "data-key")?)?;

    let verifier = ImageVerifier::new(RustCrypto::default());
    let data_key_view = PubKeyView::new(&data_key_region)?;
    let key = verifier.rsa_key(&data_key_view)?;
    let info = verifier.verify_kernel_preamble(&image, &key)?;

    println!("Success.");
    println!("Preamble size:    {}", info.preamble_size);
    println!("Kernel version:   {}", info.kernel_version);
    println!("Body load addr:   {:#x}", info.body_load_address);
    println!("Body size:        {}", info.body_size);
    println!("Body signed size: {}", info.body_signature.data_size());

    if let Some(body_path) = args.get_one::<std::path::PathBuf>("body") {
        let body = read_file(body_path)?;
        verifier.verify_data(&body, &info.body_signature, &key)?;
        println!("Body signature:   valid");
    }
    Ok(())
}
