// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decodes and validates a byte buffer into a [`ProgramImage`].

use byteorder::{ByteOrder, LittleEndian};
use crc::{Crc, CRC_32_ISO_HDLC};
use rtmc_abi::{ImageError, Instruction, Limits, Table, Value, IMAGE_MAGIC, IMAGE_VERSION};

use crate::program::{NamedAddress, ProgramImage};
use crate::wire::{Header, HEADER_LEN, INSTRUCTION_LEN, NAMED_ADDRESS_LEN, NAME_FIELD_LEN, STRING_LEN, VALUE_LEN};

/// CRC-32 in the standard IEEE 802.3 polynomial form named by `spec.md` §6.
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Decodes and validates `bytes` into a [`ProgramImage`], in the order laid
/// out by `spec.md` §4.1: length, magic, version, section counts, body
/// length, then CRC. Any failure leaves no partial state — the caller gets
/// a `ProgramImage` only on full success.
pub fn decode(bytes: &[u8]) -> Result<ProgramImage, ImageError> {
    if bytes.len() < HEADER_LEN {
        return Err(ImageError::SizeOverflow);
    }
    let header = read_header(bytes);

    if header.magic != IMAGE_MAGIC {
        return Err(ImageError::BadMagic);
    }
    if header.version != IMAGE_VERSION {
        return Err(ImageError::BadVersion);
    }

    check_capacity(header.instruction_count, Limits::MAX_INSTRUCTIONS, Table::Instructions)?;
    check_capacity(header.constant_count, Limits::MAX_CONSTANTS, Table::Constants)?;
    check_capacity(header.string_count, Limits::MAX_STRINGS, Table::Strings)?;
    check_capacity(header.function_count, Limits::MAX_FUNCTIONS, Table::Functions)?;
    check_capacity(header.symbol_count, Limits::MAX_SYMBOLS, Table::Symbols)?;

    let body_len = header.instruction_count as usize * INSTRUCTION_LEN
    + header.constant_count as usize * VALUE_LEN
    + header.string_count as usize * STRING_LEN
    + header.function_count as usize * NAMED_ADDRESS_LEN
    + header.symbol_count as usize * NAMED_ADDRESS_LEN;

    let body = bytes
    .get(HEADER_LEN..)
    .ok_or(ImageError::SizeOverflow)?;
    if body.len() < body_len {
        return Err(ImageError::SizeOverflow);
    }
    let body = &body[..body_len];

    let computed = CRC32.checksum(body);
    if computed != header.crc32 {
        return Err(ImageError::CrcMismatch {
                expected: header.crc32,
                computed,
        });
    }

    let mut cursor = body;
    let mut image = ProgramImage::default();

    for _ in 0..header.instruction_count {
        let (inst, rest) = read_instruction(cursor);
        cursor = rest;
        // Capacity already checked against Limits::MAX_INSTRUCTIONS above.
        let _ = image.instructions.push(inst);
    }
    for _ in 0..header.constant_count {
        let v = Value::from_u32(LittleEndian::read_u32(&cursor[..VALUE_LEN]));
        cursor = &cursor[VALUE_LEN..];
        let _ = image.constants.push(v);
    }
    for _ in 0..header.string_count {
        let s = read_fixed_string(&cursor[..STRING_LEN]);
        cursor = &cursor[STRING_LEN..];
        let _ = image.strings.push(s);
    }
    for _ in 0..header.function_count {
        let (entry, rest) = read_named_address(cursor);
        cursor = rest;
        let _ = image.functions.push(entry);
    }
    for _ in 0..header.symbol_count {
        let (entry, rest) = read_named_address(cursor);
        cursor = rest;
        let _ = image.symbols.push(entry);
    }

    Ok(image)
}

fn check_capacity(declared: u32, cap: usize, table: Table) -> Result<(), ImageError> {
    if declared as usize > cap {
        Err(ImageError::TableOverflow(table))
    } else {
        Ok(())
    }
}

fn read_header(bytes: &[u8]) -> Header {
    Header {
        magic: LittleEndian::read_u32(&bytes[0..4]),
        version: LittleEndian::read_u32(&bytes[4..8]),
        instruction_count: LittleEndian::read_u32(&bytes[8..12]),
        constant_count: LittleEndian::read_u32(&bytes[12..16]),
        string_count: LittleEndian::read_u32(&bytes[16..20]),
        function_count: LittleEndian::read_u32(&bytes[20..24]),
        symbol_count: LittleEndian::read_u32(&bytes[24..28]),
        crc32: LittleEndian::read_u32(&bytes[28..32]),
    }
}

fn read_instruction(bytes: &[u8]) -> (Instruction, &[u8]) {
    let opcode_raw = bytes[0];
    let operand_count = bytes[1];
    // bytes[2..4] is padding.
    let mut operands = [Value::ZERO; 4];
    for (i, slot) in operands.iter_mut().enumerate() {
        let off = 4 + i * 4;
        *slot = Value::from_u32(LittleEndian::read_u32(&bytes[off..off + 4]));
    }
    let line = LittleEndian::read_u32(&bytes[20..24]);
    (
        Instruction {
            opcode_raw,
            operand_count,
            operands,
            line,
        },
        &bytes[INSTRUCTION_LEN..],
    )
}

fn read_named_address(bytes: &[u8]) -> (NamedAddress, &[u8]) {
    let name = read_fixed_name(&bytes[..NAME_FIELD_LEN]);
    let address = LittleEndian::read_u32(&bytes[NAME_FIELD_LEN..NAME_FIELD_LEN + 4]);
    (NamedAddress { name, address }, &bytes[NAMED_ADDRESS_LEN..])
}

fn read_fixed_name(bytes: &[u8]) -> heapless::String<{ rtmc_abi::Limits::MAX_NAME_LEN + 1 }> {
    read_nul_terminated(bytes)
}

fn read_fixed_string(bytes: &[u8]) -> heapless::String<{ rtmc_abi::Limits::MAX_STRING_LEN + 1 }> {
    read_nul_terminated(bytes)
}

fn read_nul_terminated<const N: usize>(bytes: &[u8]) -> heapless::String<N> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let end = end.min(N.saturating_sub(1));
    let text = core::str::from_utf8(&bytes[..end]).unwrap_or("");
    let mut s = heapless::String::new();
    let _ = s.push_str(text);
    s
}
