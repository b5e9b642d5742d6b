/*++

Licensed under the Apache-2.0 license.

File Name:

   bounds.rs

Abstract:

    The single trust boundary between declared offsets and memory reads.
    Every sub-region a container names is validated here before any other
    component may look at it.

--*/

use vaultboot_image_types::{
    PubKeyHeader, SignatureHeader, PUB_KEY_HEADER_BYTE_SIZE, SIGNATURE_HEADER_BYTE_SIZE,
};

/// Decide whether a member header of `member_size` bytes at `member_offset`
/// inside a parent of `parent_size` bytes, together with the member's
/// declared data region `(member_data_offset, member_data_size)` relative
/// to the member header, is fully contained in the parent.
///
/// All arithmetic is unsigned 64-bit; any overflow rejects. Member offsets
/// are compile-time field offsets, never derived from pointer pairs.
pub(crate) fn member_inside(
    parent_size: u64,
    member_offset: u64,
    member_size: u64,
    member_data_offset: u64,
    member_data_size: u64,
) -> bool {
    if member_offset > parent_size {
        return false;
    }
    let member_end = match member_offset.checked_add(member_size) {
        Some(end) => end,
        None => return false,
    };
    if member_end > parent_size {
        return false;
    }

    let data_start = match member_offset.checked_add(member_data_offset) {
        Some(start) => start,
        None => return false,
    };
    if data_start > parent_size {
        return false;
    }
    let data_end = match data_start.checked_add(member_data_size) {
        Some(end) => end,
        None => return false,
    };
    data_end <= parent_size
}

/// Is the public key at `member_offset`, including its key material, fully
/// inside a parent of `parent_size` bytes?
pub(crate) fn pub_key_inside(parent_size: u64, member_offset: u64, key: &PubKeyHeader) -> bool {
    member_inside(
        parent_size,
        member_offset,
        PUB_KEY_HEADER_BYTE_SIZE as u64,
        key.key_offset.get(),
        key.key_size.get(),
    )
}

/// Is the signature at `member_offset`, including its signature blob, fully
/// inside a parent of `parent_size` bytes?
pub(crate) fn signature_inside(
    parent_size: u64,
    member_offset: u64,
    sig: &SignatureHeader,
) -> bool {
    member_inside(
        parent_size,
        member_offset,
        SIGNATURE_HEADER_BYTE_SIZE as u64,
        sig.sig_offset.get(),
        sig.sig_size.get(),
    )
}
