// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Program Image and Binary Loader: decodes the
//! little-endian binary format produced by the off-target compiler into a
//! validated, bounded in-memory [`ProgramImage`].

#![cfg_attr(not(test), no_std)]

mod loader;
mod program;
mod wire;

pub use loader::decode;
pub use program::{NamedAddress, ProgramImage};
pub use wire::Header;

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{ByteOrder, LittleEndian};
    use crc::{Crc, CRC_32_ISO_HDLC};
    use rtmc_abi::{ImageError, IMAGE_MAGIC, IMAGE_VERSION};

    const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

    fn empty_image_bytes() -> heapless::Vec<u8, 64> {
        let mut header = [0u8; wire::HEADER_LEN];
        LittleEndian::write_u32(&mut header[0..4], IMAGE_MAGIC);
        LittleEndian::write_u32(&mut header[4..8], IMAGE_VERSION);
        // all section counts left at zero
        let crc = CRC32.checksum(&[]);
        LittleEndian::write_u32(&mut header[28..32], crc);
        let mut buf = heapless::Vec::new();
        buf.extend_from_slice(&header).unwrap();
        buf
    }

    #[test]
    fn decodes_empty_image() {
        let bytes = empty_image_bytes();
        let image = decode(&bytes).expect("valid empty image decodes");
        assert_eq!(image.instruction_count(), 0);
        assert_eq!(image.constants.len(), 0);
    }

    #[test]
    fn rejects_short_buffer() {
        let err = decode(&[0u8; 4]).unwrap_err();
        assert_eq!(err, ImageError::SizeOverflow);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = empty_image_bytes();
        bytes[0] = 0;
        let err = decode(&bytes).unwrap_err();
        assert_eq!(err, ImageError::BadMagic);
    }

    #[test]
    fn rejects_bad_version() {
        let mut bytes = empty_image_bytes();
        LittleEndian::write_u32(&mut bytes[4..8], 2);
        let err = decode(&bytes).unwrap_err();
        assert_eq!(err, ImageError::BadVersion);
    }

    #[test]
    fn rejects_crc_mismatch() {
        let mut bytes = empty_image_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, ImageError::CrcMismatch {.. }));
    }

    #[test]
    fn rejects_section_overflow() {
        let mut bytes = empty_image_bytes();
        LittleEndian::write_u32(&mut bytes[8..12], u32::MAX);
        let err = decode(&bytes).unwrap_err();
        assert_eq!(err, ImageError::TableOverflow(rtmc_abi::Table::Instructions));
    }

    /// Encodes one instruction in the `spec.md` §4.1 wire layout:
    /// `opcode(1) | op_count(1) | pad(2) | operands(4×4) | line(4)`.
    fn encode_instruction(buf: &mut heapless::Vec<u8, 4096>, opcode: u8, operands: [u32; 4], line: u32) {
        buf.push(opcode).unwrap();
        buf.push(4).unwrap();
        buf.extend_from_slice(&[0, 0]).unwrap();
        for v in operands {
            let mut word = [0u8; 4];
            LittleEndian::write_u32(&mut word, v);
            buf.extend_from_slice(&word).unwrap();
        }
        let mut word = [0u8; 4];
        LittleEndian::write_u32(&mut word, line);
        buf.extend_from_slice(&word).unwrap();
    }

    /// Builds a complete image byte buffer from arbitrary instructions and
    /// constants, with no strings/functions/symbols, and a correct header
    /// (section counts + CRC-32 over the body).
    fn encode_image(instructions: &[(u8, [u32; 4], u32)], constants: &[u32]) -> heapless::Vec<u8, 4096> {
        let mut body: heapless::Vec<u8, 4096> = heapless::Vec::new();
        for &(opcode, operands, line) in instructions {
            encode_instruction(&mut body, opcode, operands, line);
        }
        for &c in constants {
            let mut word = [0u8; 4];
            LittleEndian::write_u32(&mut word, c);
            body.extend_from_slice(&word).unwrap();
        }

        let mut header = [0u8; wire::HEADER_LEN];
        LittleEndian::write_u32(&mut header[0..4], IMAGE_MAGIC);
        LittleEndian::write_u32(&mut header[4..8], IMAGE_VERSION);
        LittleEndian::write_u32(&mut header[8..12], instructions.len() as u32);
        LittleEndian::write_u32(&mut header[12..16], constants.len() as u32);
        // string_count, function_count, symbol_count all zero.
        let crc = CRC32.checksum(&body);
        LittleEndian::write_u32(&mut header[28..32], crc);

        let mut bytes: heapless::Vec<u8, 4096> = heapless::Vec::new();
        bytes.extend_from_slice(&header).unwrap();
        bytes.extend_from_slice(&body).unwrap();
        bytes
    }

    proptest::proptest! {
        /// `spec.md` §8, property 1: for any valid image, decoding what was
        /// just encoded reproduces every instruction and constant exactly.
        #[test]
        fn round_trip_preserves_instructions_and_constants(
            instructions in proptest::collection::vec(
                (proptest::prelude::any::<u8>(), proptest::prelude::any::<[u32; 4]>(), proptest::prelude::any::<u32>()),
                0..20,
            ),
            constants in proptest::collection::vec(proptest::prelude::any::<u32>(), 0..20),
        ) {
            let bytes = encode_image(&instructions, &constants);
            let image = decode(&bytes).expect("a well-formed image always decodes");

            proptest::prop_assert_eq!(image.instruction_count(), instructions.len());
            for (decoded, &(opcode, operands, line)) in image.instructions.iter().zip(instructions.iter()) {
                proptest::prop_assert_eq!(decoded.opcode_raw, opcode);
                proptest::prop_assert_eq!(decoded.line, line);
                for i in 0..4 {
                    proptest::prop_assert_eq!(decoded.operand(i).as_u32(), operands[i]);
                }
            }
            proptest::prop_assert_eq!(image.constants.len(), constants.len());
            for (decoded, &c) in image.constants.iter().zip(constants.iter()) {
                proptest::prop_assert_eq!(decoded.as_u32(), c);
            }
        }

        /// `spec.md` §8, property 2: flipping any single bit in the body of
        /// a valid image is caught by the CRC-32 check.
        #[test]
        fn bit_flip_in_body_is_caught_by_crc(
            instructions in proptest::collection::vec(
                (proptest::prelude::any::<u8>(), proptest::prelude::any::<[u32; 4]>(), proptest::prelude::any::<u32>()),
                1..10,
            ),
            byte_index in 0usize..240,
            bit in 0u8..8,
        ) {
            let mut bytes = encode_image(&instructions, &[]);
            let flip_at = wire::HEADER_LEN + (byte_index % (bytes.len() - wire::HEADER_LEN));
            bytes[flip_at] ^= 1 << bit;
            let err = decode(&bytes).unwrap_err();
            proptest::prop_assert!(matches!(err, ImageError::CrcMismatch { .. }));
        }
    }
}
