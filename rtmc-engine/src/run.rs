// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-task execution loop: runs inside the kernel task
//! that owns a [`Context`], stepping instructions until the task halts,
//! the VM stops, or a fault terminates it.

use rtmc_abi::{Instruction, VmFault};
use rtmc_image::ProgramImage;

use crate::context::Context;
use crate::env::Environment;
use crate::step::step;

/// Runs `ctx` to completion against `program`, checking `vm_running` before
/// every instruction so a VM-wide `stop()` ends the loop at the next
/// instruction boundary.
///
/// Returns the fault that ended the task, if any. `Ok(())` covers both a
/// clean `HALT`/`RET`-to-empty-stack exit and an externally requested stop.
pub fn run_context(
    program: &ProgramImage,
    ctx: &mut Context,
    env: &mut dyn Environment,
    trace: bool,
    mut vm_running: impl FnMut() -> bool,
) -> Result<(), VmFault> {
    while ctx.running && vm_running() && (ctx.pc as usize) < program.instruction_count() {
        let inst: Instruction = program.instructions[ctx.pc as usize];

        if trace {
            env.diag_debug(ctx.task_id, ctx.pc, "dispatch");
        }

        let opcode = inst.opcode();

        match step(program, ctx, inst, env) {
            Ok(()) => {}
            Err(fault) => {
                env.diag_error(ctx.task_id, &fault_text(fault));
                ctx.running = false;
                return Err(fault);
            }
        }

        if let Some(opcode) = opcode {
            if !opcode.sets_pc() {
                ctx.pc += 1;
            }
            if opcode.yields_after() {
                env.yield_now();
            }
        } else {
            ctx.pc += 1;
        }
    }

    Ok(())
}

fn fault_text(fault: VmFault) -> heapless::String<64> {
    let mut s = heapless::String::new();
    let _ = core::fmt::write(&mut s, format_args!("{fault}"));
    s
}
