// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Byte-level layout of the binary image format. All
//! multi-byte fields are little-endian.

/// `magic(4) | version(4) | n_instr(4) | n_const(4) | n_str(4) | n_func(4)
/// | n_sym(4) | crc32(4)`
pub const HEADER_LEN: usize = 8 * 4;

/// `opcode(1) | op_count(1) | pad(2) | operands(4×4) | line(4)`
pub const INSTRUCTION_LEN: usize = 1 + 1 + 2 + 4 * 4 + 4;

/// A raw `Value` cell on the wire: 4 bytes.
pub const VALUE_LEN: usize = 4;

/// Null-padded fixed-width string record.
pub const STRING_LEN: usize = 64;

/// `name(32) | address(4)`, used for both the function table and the
/// symbol table.
pub const NAMED_ADDRESS_LEN: usize = 32 + 4;
pub const NAME_FIELD_LEN: usize = 32;

pub struct Header {
    pub magic: u32,
    pub version: u32,
    pub instruction_count: u32,
    pub constant_count: u32,
    pub string_count: u32,
    pub function_count: u32,
    pub symbol_count: u32,
    pub crc32: u32,
}
