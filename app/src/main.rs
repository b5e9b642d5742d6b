/*++

Licensed under the Apache-2.0 license.

File Name:

   main.rs

Abstract:

    Main entry point of the vaultboot imaging application.

--*/

use std::path::PathBuf;

use clap::{arg, value_parser, Command};

mod create;
mod verify;

/// Entry point
fn main() -> anyhow::Result<()> {
    let sub_cmds = vec![
        Command::new("pack-key")
            .about("Pack an RSA public key PEM into the processed wire format")
            .arg(
                arg!(--"key" <FILE> "RSA public key PEM")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"algorithm" <U64> "Signature algorithm index")
                    .required(true)
                    .value_parser(value_parser!(u64)),
            )
            .arg(
                arg!(--"key-version" <U64> "Key version tag")
                    .required(true)
                    .value_parser(value_parser!(u64)),
            )
            .arg(
                arg!(--"out" <FILE> "Output file")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            ),
        Command::new("create-key-block")
            .about("Create a signed key block handing off a packed data key")
            .arg(
                arg!(--"data-key" <FILE> "Packed data key")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"signing-key" <FILE> "RSA private key PEM")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"algorithm" <U64> "Signing algorithm index")
                    .required(true)
                    .value_parser(value_parser!(u64)),
            )
            .arg(
                arg!(--"out" <FILE> "Output file")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            ),
        Command::new("create-fw-preamble")
            .about("Create a signed firmware preamble")
            .arg(
                arg!(--"fw-version" <U64> "Firmware version")
                    .required(true)
                    .value_parser(value_parser!(u64)),
            )
            .arg(
                arg!(--"kernel-subkey" <FILE> "Packed kernel subkey")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"body" <FILE> "Firmware body to sign")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"signing-key" <FILE> "RSA private key PEM")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"algorithm" <U64> "Signing algorithm index")
                    .required(true)
                    .value_parser(value_parser!(u64)),
            )
            .arg(
                arg!(--"out" <FILE> "Output file")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            ),
        Command::new("create-kernel-preamble")
            .about("Create a signed kernel preamble")
            .arg(
                arg!(--"kernel-version" <U64> "Kernel version")
                    .required(true)
                    .value_parser(value_parser!(u64)),
            )
            .arg(
                arg!(--"load-address" <U64> "Body load address")
                    .required(true)
                    .value_parser(value_parser!(u64)),
            )
            .arg(
                arg!(--"body" <FILE> "Kernel body to sign")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"signing-key" <FILE> "RSA private key PEM")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"algorithm" <U64> "Signing algorithm index")
                    .required(true)
                    .value_parser(value_parser!(u64)),
            )
            .arg(
                arg!(--"out" <FILE> "Output file")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            ),
        Command::new("verify-key-block")
            .about("Verify a key block by root key, or inspect it by checksum")
            .arg(
                arg!(--"image" <FILE> "Key block image")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"root-key" <FILE> "Packed root public key")
                    .required(false)
                    .value_parser(value_parser!(PathBuf)),
            ),
        Command::new("verify-fw-preamble")
            .about("Verify a firmware preamble with a packed data key")
            .arg(
                arg!(--"image" <FILE> "Preamble image")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"data-key" <FILE> "Packed data key")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"body" <FILE> "Firmware body to check against the body signature")
                    .required(false)
                    .value_parser(value_parser!(PathBuf)),
            ),
        Command::new("verify-kernel-preamble")
            .about("Verify a kernel preamble with a packed data key")
            .arg(
                arg!(--"image" <FILE> "Preamble image")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"data-key" <FILE> "Packed data key")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(--"body" <FILE> "Kernel body to check against the body signature")
                    .required(false)
                    .value_parser(value_parser!(PathBuf)),
            ),
    ];

    let cmd = Command::new("vaultboot-image-app")
        .arg_required_else_help(true)
        .subcommands(sub_cmds)
        .about("vaultboot container tools")
        .get_matches();

    match cmd.subcommand().unwrap() {
        ("pack-key", args) => create::pack_key(args),
        ("create-key-block", args) => create::key_block(args),
        ("create-fw-preamble", args) => create::fw_preamble(args),
        ("create-kernel-preamble", args) => create::kernel_preamble(args),
        ("verify-key-block", args) => verify::key_block(args),
        ("verify-fw-preamble", args) => verify::fw_preamble(args),
        ("verify-kernel-preamble", args) => verify::kernel_preamble(args),
        (_, _) => unreachable!(),
    }
}
