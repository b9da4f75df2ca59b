// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! VM Controller: the library a host embeds to load and run
//! an RT-Micro-C program image. Ties together the Binary Loader
//! (`rtmc-image`), the Execution Engine (`rtmc-engine`), the RTOS Bridge
//! (`rtmc-rtos`), and the Hardware Abstraction layer (`rtmc-hal`) behind one
//! lifecycle API: `create → load → run → stop → destroy`.
//!
//! Generic over the `Kernel`/`Peripherals` backend so the same
//! `VmController` runs against `StdKernel`/`MockPeripherals` on a
//! development host and `Rp2040Kernel`/`Rp2040Peripherals` (`rp2040`
//! feature) on target.

mod config;
mod controller;
mod environment;
mod error;
mod shared;
mod status;
mod tables;

pub use config::Config;
pub use controller::VmController;
pub use error::VmError;
pub use status::{VmState, VmStatus};

pub use rtmc_engine::NativeCallback;

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{ByteOrder, LittleEndian};
    use crc::{Crc, CRC_32_ISO_HDLC};
    use rtmc_abi::{IMAGE_MAGIC, IMAGE_VERSION};
    use rtmc_hal::MockPeripherals;
    use rtmc_rtos::StdKernel;
    use std::time::Duration;

    const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);
    const HEADER_LEN: usize = 32;

    fn controller() -> VmController<StdKernel, MockPeripherals> {
        VmController::create(Config::default(), StdKernel::new(), MockPeripherals::new())
    }

    fn encode_instruction(buf: &mut Vec<u8>, opcode: u8, operand_count: u8, operands: [u32; 4]) {
        buf.push(opcode);
        buf.push(operand_count);
        buf.extend_from_slice(&[0, 0]); // padding
        for v in operands {
            let mut word = [0u8; 4];
            LittleEndian::write_u32(&mut word, v);
            buf.extend_from_slice(&word);
        }
        buf.extend_from_slice(&[0u8; 4]); // line number, unused by these tests
    }

    /// Builds a minimal image: one `HALT` instruction, no constants/strings,
    /// one function named `main` pointing at instruction 0.
    fn halt_only_image() -> Vec<u8> {
        let mut body = Vec::new();
        encode_instruction(&mut body, rtmc_abi::Opcode::Halt as u8, 0, [0, 0, 0, 0]);

        let mut function = [0u8; 32];
        function[0..4].copy_from_slice(b"main");
        // address (u32) at offset 32..36 is zero, matching instruction 0.
        body.extend_from_slice(&function);
        body.extend_from_slice(&[0u8; 4]);

        build_image(body, 1, 0, 0, 1, 0)
    }

    fn build_image(
        body: Vec<u8>,
        instruction_count: u32,
        constant_count: u32,
        string_count: u32,
        function_count: u32,
        symbol_count: u32,
    ) -> Vec<u8> {
        let mut header = [0u8; HEADER_LEN];
        LittleEndian::write_u32(&mut header[0..4], IMAGE_MAGIC);
        LittleEndian::write_u32(&mut header[4..8], IMAGE_VERSION);
        LittleEndian::write_u32(&mut header[8..12], instruction_count);
        LittleEndian::write_u32(&mut header[12..16], constant_count);
        LittleEndian::write_u32(&mut header[16..20], string_count);
        LittleEndian::write_u32(&mut header[20..24], function_count);
        LittleEndian::write_u32(&mut header[24..28], symbol_count);
        let crc = CRC32.checksum(&body);
        LittleEndian::write_u32(&mut header[28..32], crc);

        let mut image = header.to_vec();
        image.extend_from_slice(&body);
        image
    }

    #[test]
    fn lifecycle_rejects_out_of_order_calls() {
        let vm = controller();
        assert!(vm.run().is_err(), "run() before load() must fail");
        assert!(vm.stop().is_err(), "stop() before run() must fail");
    }

    #[test]
    fn load_then_run_executes_to_completion() {
        let vm = controller();
        let image = halt_only_image();
        vm.load(&image).expect("well-formed image loads");
        vm.run().expect("run starts the bootstrap main task");

        // The bootstrap task HALTs immediately; give its kernel thread a
        // moment to run before checking status.
        std::thread::sleep(Duration::from_millis(50));
        let status = vm.status();
        assert_eq!(status.state, VmState::Running);
        assert_eq!(status.task_count, 1);

        vm.stop().expect("a running VM can be stopped");
        assert_eq!(vm.status().state, VmState::Stopped);
        vm.destroy().expect("a stopped VM can be destroyed");
    }

    #[test]
    fn stopped_vm_can_be_reloaded_and_rerun() {
        let vm = controller();
        let image = halt_only_image();
        vm.load(&image).expect("first load succeeds");
        vm.run().expect("first run succeeds");
        std::thread::sleep(Duration::from_millis(50));
        vm.stop().expect("stop succeeds");

        vm.load(&image).expect("spec.md §6: load is valid from Stopped, not just Created");
        assert_eq!(vm.status().state, VmState::Loaded);
        assert_eq!(vm.status().task_count, 0, "reloading clears the previous run's task table");

        vm.run().expect("second run succeeds");
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(vm.status().task_count, 1);
        vm.stop().expect("second stop succeeds");
        vm.destroy().expect("destroy succeeds");
    }

    #[test]
    fn destroy_releases_declared_queues() {
        let vm = controller();
        let mut body = Vec::new();
        encode_instruction(&mut body, rtmc_abi::Opcode::MsgDeclare as u8, 2, [0, 0, 0, 0]);
        encode_instruction(&mut body, rtmc_abi::Opcode::Halt as u8, 0, [0, 0, 0, 0]);
        let image = build_image(body, 2, 0, 0, 0, 0);

        vm.load(&image).expect("image with one MSG_DECLARE loads");
        assert_eq!(vm.status().queue_count, 1);
        vm.run().expect("run succeeds");
        std::thread::sleep(Duration::from_millis(50));
        vm.stop().expect("stop succeeds");
        vm.destroy().expect("destroy succeeds");
        assert_eq!(vm.status().queue_count, 0, "destroy tears down every kernel-owned queue");
    }

    #[test]
    fn rejects_malformed_image_without_changing_state() {
        let vm = controller();
        let mut image = halt_only_image();
        let last = image.len() - 1;
        image[last] ^= 0xff;
        assert!(vm.load(&image).is_err());
        assert_eq!(vm.status().state, VmState::Created);
    }

    /// Builds an image whose body is `count` `MSG_DECLARE` instructions
    /// (each with a distinct message ID, so none alias) followed by a
    /// `HALT`, with no constants/strings/functions.
    fn msg_declare_image(count: u32) -> Vec<u8> {
        let mut body = Vec::new();
        for id in 0..count {
            encode_instruction(&mut body, rtmc_abi::Opcode::MsgDeclare as u8, 2, [id, 0, 0, 0]);
        }
        encode_instruction(&mut body, rtmc_abi::Opcode::Halt as u8, 0, [0, 0, 0, 0]);
        build_image(body, count + 1, 0, 0, 0, 0)
    }

    proptest::proptest! {
        /// `spec.md` §3's `MAX_MESSAGE_QUEUES` caps how many queues an image
        /// can declare. For any declared count within that cap, `load()`
        /// creates exactly that many queues, each from a distinct
        /// `MSG_DECLARE` instruction.
        #[test]
        fn load_creates_one_queue_per_msg_declare(count in 0u32..rtmc_abi::Limits::MAX_MESSAGE_QUEUES as u32) {
            let vm = controller();
            let image = msg_declare_image(count);
            vm.load(&image).expect("well-formed image within capacity loads");
            proptest::prop_assert_eq!(vm.status().queue_count, count as usize);
        }
    }
}
