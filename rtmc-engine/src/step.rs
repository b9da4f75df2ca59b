// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Single-step interpreter: given a context and an
//! instruction, effects state changes and, for branch/call/ret opcodes,
//! advances the program counter itself.

use rtmc_abi::{Instruction, Limits, Opcode, Value, VmFault};
use rtmc_image::ProgramImage;

use crate::context::Context;
use crate::env::Environment;

/// Operands are popped in this order for every two-operand hardware/RTOS
/// opcode documented only as "pops (a, b)" without an explicit pop-order
/// note: the second-named operand is pushed last and so pops first. This
/// mirrors the explicit rule `spec.md` gives for arithmetic ("pops
/// right-then-left") and is applied uniformly so the convention is
/// predictable across the whole opcode set.
fn pop_pair(ctx: &mut Context) -> Result<(Value, Value), VmFault> {
    let second = ctx.pop()?;
    let first = ctx.pop()?;
    Ok((first, second))
}

fn sentinel_on_kernel_fault(ctx: &mut Context, env: &mut dyn Environment, err: rtmc_abi::KernelFault) -> Result<(), VmFault> {
    env.diag_error(ctx.task_id, &fault_message(err));
    ctx.push(Value::from_i32(0))
}

fn fault_message(err: rtmc_abi::KernelFault) -> heapless::String<64> {
    let mut s = heapless::String::new();
    let _ = core::fmt::write(&mut s, format_args!("{err}"));
    s
}

/// Executes one instruction against `ctx`, dispatching RTOS/hardware/debug
/// effects through `env`. Returns the typed fault on failure; the caller
/// (the execution loop in `run`) terminates only the faulting task.
pub fn step(
    program: &ProgramImage,
    ctx: &mut Context,
    inst: Instruction,
    env: &mut dyn Environment,
) -> Result<(), VmFault> {
    let opcode = inst.opcode().ok_or(VmFault::InvalidOpcode(inst.opcode_raw))?;

    if opcode.is_unsupported_frame_op() || opcode.is_unsupported_bus_op() {
        return Err(VmFault::Unsupported(opcode));
    }

    match opcode {
        Opcode::Jump => {
            ctx.pc = inst.operand(0).as_u32();
        }
        Opcode::JumpIfTrue => {
            let v = ctx.pop()?;
            ctx.pc = if v.is_truthy() { inst.operand(0).as_u32() } else { ctx.pc + 1 };
        }
        Opcode::JumpIfFalse => {
            let v = ctx.pop()?;
            ctx.pc = if !v.is_truthy() { inst.operand(0).as_u32() } else { ctx.pc + 1 };
        }
        Opcode::Call => {
            ctx.call_push(ctx.pc + 1)?;
            ctx.pc = inst.operand(0).as_u32();
        }
        Opcode::Ret => match ctx.call_pop() {
            Some(return_pc) => ctx.pc = return_pc,
            None => ctx.running = false,
        },

        Opcode::LoadConst => {
            let k = inst.operand(0).as_u32() as usize;
            let v = program.constants.get(k).copied().unwrap_or(Value::ZERO);
            ctx.push(v)?;
        }
        Opcode::LoadVar => {
            let addr = inst.operand(0).as_u32();
            let v = if (addr as usize) < Limits::GLOBAL_MEMORY_SIZE {
                env.read_global(addr)
            } else {
                Value::ZERO
            };
            ctx.push(v)?;
        }
        Opcode::StoreVar => {
            let addr = inst.operand(0).as_u32();
            let v = ctx.pop()?;
            if (addr as usize) < Limits::GLOBAL_MEMORY_SIZE {
                env.write_global(addr, v);
            }
        }

        Opcode::LoadAddr => {
            let addr = inst.operand(0).as_u32();
            ctx.push(Value::from_handle(addr))?;
        }
        Opcode::LoadDeref => {
            let addr = ctx.pop()?.as_handle();
            let v = if (addr as usize) < Limits::GLOBAL_MEMORY_SIZE {
                env.read_global(addr)
            } else {
                Value::ZERO
            };
            ctx.push(v)?;
        }
        Opcode::StoreDeref => {
            let addr = ctx.pop()?.as_handle();
            let v = ctx.pop()?;
            if (addr as usize) < Limits::GLOBAL_MEMORY_SIZE {
                env.write_global(addr, v);
            }
        }

        Opcode::Add => {
            let (a, b) = pop_pair(ctx)?;
            ctx.push(Value::from_i32(a.as_i32().wrapping_add(b.as_i32())))?;
        }
        Opcode::Sub => {
            let (a, b) = pop_pair(ctx)?;
            ctx.push(Value::from_i32(a.as_i32().wrapping_sub(b.as_i32())))?;
        }
        Opcode::Mul => {
            let (a, b) = pop_pair(ctx)?;
            ctx.push(Value::from_i32(a.as_i32().wrapping_mul(b.as_i32())))?;
        }
        Opcode::Div => {
            let (a, b) = pop_pair(ctx)?;
            if b.as_i32() == 0 {
                return Err(VmFault::DivisionByZero);
            }
            ctx.push(Value::from_i32(a.as_i32().wrapping_div(b.as_i32())))?;
        }
        Opcode::Mod => {
            let (a, b) = pop_pair(ctx)?;
            if b.as_i32() == 0 {
                return Err(VmFault::DivisionByZero);
            }
            ctx.push(Value::from_i32(a.as_i32().wrapping_rem(b.as_i32())))?;
        }
        Opcode::And => {
            let (a, b) = pop_pair(ctx)?;
            ctx.push(Value::from_bool(a.is_truthy() && b.is_truthy()))?;
        }
        Opcode::Or => {
            let (a, b) = pop_pair(ctx)?;
            ctx.push(Value::from_bool(a.is_truthy() || b.is_truthy()))?;
        }
        Opcode::Not => {
            let a = ctx.pop()?;
            ctx.push(Value::from_bool(!a.is_truthy()))?;
        }
        Opcode::Xor => {
            let (a, b) = pop_pair(ctx)?;
            ctx.push(Value::from_u32(a.as_u32() ^ b.as_u32()))?;
        }

        Opcode::Eq => {
            let (a, b) = pop_pair(ctx)?;
            ctx.push(Value::from_bool(a.as_i32() == b.as_i32()))?;
        }
        Opcode::Neq => {
            let (a, b) = pop_pair(ctx)?;
            ctx.push(Value::from_bool(a.as_i32() != b.as_i32()))?;
        }
        Opcode::Lt => {
            let (a, b) = pop_pair(ctx)?;
            ctx.push(Value::from_bool(a.as_i32() < b.as_i32()))?;
        }
        Opcode::Lte => {
            let (a, b) = pop_pair(ctx)?;
            ctx.push(Value::from_bool(a.as_i32() <= b.as_i32()))?;
        }
        Opcode::Gt => {
            let (a, b) = pop_pair(ctx)?;
            ctx.push(Value::from_bool(a.as_i32() > b.as_i32()))?;
        }
        Opcode::Gte => {
            let (a, b) = pop_pair(ctx)?;
            ctx.push(Value::from_bool(a.as_i32() >= b.as_i32()))?;
        }

        // GLOBAL_VAR_DECLARE and MSG_DECLARE are only meaningful during
        // `load`, which initialises
        // global memory and creates queues by walking the image once.
        // Encountering either at run time (the instruction is still part
        // of the ordinary stream) is a no-op.
        Opcode::GlobalVarDeclare | Opcode::MsgDeclare => {}

        Opcode::MsgSend => {
            let id = inst.operand(0).as_u32();
            let payload = ctx.pop()?;
            env.queue_send(id, payload);
        }
        Opcode::MsgRecv => {
            let id = inst.operand(0).as_u32();
            let timeout = ctx.pop()?.as_i32();
            match env.queue_recv(id, timeout) {
                Some(v) => ctx.push(v)?,
                None => ctx.push(Value::from_i32(-1))?,
            }
        }

        Opcode::RtosCreateTask => {
            // Popped top-first: entry-address, id, priority, core,
            // stack-size. `id` names the task for
            // diagnostics only; the VM assigns the real handle.
            let entry = ctx.pop()?.as_u32();
            let _requested_id = ctx.pop()?.as_u32();
            let priority = ctx.pop()?.as_u32() as u8;
            let core = ctx.pop()?.as_u32() as u8;
            let stack_size = ctx.pop()?.as_u32();
            match env.create_task(entry, priority, core, stack_size) {
                Ok(handle) => ctx.push(Value::from_handle(handle))?,
                Err(e) => sentinel_on_kernel_fault(ctx, env, e)?,
            }
        }
        Opcode::RtosDeleteTask => {
            let task = ctx.pop()?.as_handle();
            env.delete_task(task);
        }
        Opcode::RtosSuspendTask => {
            let task = ctx.pop()?.as_handle();
            env.suspend_task(task);
        }
        Opcode::RtosResumeTask => {
            let task = ctx.pop()?.as_handle();
            env.resume_task(task);
        }
        Opcode::RtosDelayMs => {
            let ms = ctx.pop()?.as_u32();
            env.delay_ms(ms);
        }
        Opcode::RtosYield => {
            env.yield_now();
        }
        Opcode::RtosSemaphoreCreate => match env.semaphore_create() {
            Ok(handle) => ctx.push(Value::from_handle(handle))?,
            Err(e) => sentinel_on_kernel_fault(ctx, env, e)?,
        },
        Opcode::RtosSemaphoreTake => {
            let timeout = ctx.pop()?.as_i32();
            let handle = ctx.pop()?.as_handle();
            let acquired = env.semaphore_take(handle, timeout);
            ctx.push(Value::from_bool(acquired))?;
        }
        Opcode::RtosSemaphoreGive => {
            let handle = ctx.pop()?.as_handle();
            env.semaphore_give(handle);
        }

        Opcode::HwGpioInit => {
            let mode = ctx.pop()?.as_u32();
            let pin = ctx.pop()?.as_u32();
            if !env.gpio_init(pin, mode) {
                env.diag_error(ctx.task_id, "HW_GPIO_INIT: invalid pin or mode");
            }
        }
        Opcode::HwGpioSet => {
            let value = ctx.pop()?.as_u32();
            let pin = ctx.pop()?.as_u32();
            if !env.gpio_set(pin, value) {
                env.diag_error(ctx.task_id, "HW_GPIO_SET: pin not initialised or wrong mode");
            }
        }
        Opcode::HwGpioGet => {
            let pin = ctx.pop()?.as_u32();
            match env.gpio_get(pin) {
                Some(v) => ctx.push(Value::from_bool(v))?,
                None => {
                    env.diag_error(ctx.task_id, "HW_GPIO_GET: pin not initialised");
                    ctx.push(Value::from_i32(0))?;
                }
            }
        }

        Opcode::HwTimerInit => {
            let frequency = ctx.pop()?.as_u32();
            let timer = ctx.pop()?.as_u32();
            if !env.timer_init(timer, frequency) {
                env.diag_error(ctx.task_id, "HW_TIMER_INIT: invalid timer id");
            }
        }
        Opcode::HwTimerStart => {
            let timer = ctx.pop()?.as_u32();
            if !env.timer_start(timer) {
                env.diag_error(ctx.task_id, "HW_TIMER_START: timer not initialised");
            }
        }
        Opcode::HwTimerStop => {
            let timer = ctx.pop()?.as_u32();
            if !env.timer_stop(timer) {
                env.diag_error(ctx.task_id, "HW_TIMER_STOP: timer not initialised");
            }
        }
        Opcode::HwTimerSetPwmDuty => {
            let duty = ctx.pop()?.as_u32();
            let timer = ctx.pop()?.as_u32();
            if !env.timer_set_pwm_duty(timer, duty) {
                env.diag_error(ctx.task_id, "HW_TIMER_SET_PWM_DUTY: timer not initialised");
            }
        }

        Opcode::HwAdcInit => {
            let pin = ctx.pop()?.as_u32();
            match env.adc_init(pin) {
                Some(channel) => ctx.push(Value::from_handle(channel))?,
                None => {
                    env.diag_error(ctx.task_id, "HW_ADC_INIT: no free ADC channel");
                    ctx.push(Value::from_i32(0))?;
                }
            }
        }
        Opcode::HwAdcRead => {
            let channel = ctx.pop()?.as_u32();
            match env.adc_read(channel) {
                Some(sample) => ctx.push(Value::from_u32(sample))?,
                None => {
                    env.diag_error(ctx.task_id, "HW_ADC_READ: channel not initialised");
                    ctx.push(Value::from_i32(0))?;
                }
            }
        }

        Opcode::Print => {
            let idx = inst.operand(0).as_u32() as usize;
            if let Some(s) = program.strings.get(idx) {
                env.diag_print(ctx.task_id, s.as_str());
            }
        }
        Opcode::Printf => {
            let fmt_idx = inst.operand(0).as_u32() as usize;
            let argc = inst.operand(1).as_u32() as usize;
            let mut args: heapless::Vec<Value, 8> = heapless::Vec::new();
            for _ in 0..argc.min(8) {
                let _ = args.push(ctx.pop()?);
            }
            args.reverse();
            if let Some(fmt) = program.strings.get(fmt_idx) {
                let mut out: heapless::String<{ Limits::MAX_STRING_LEN * 2 }> = heapless::String::new();
                let mut arg_iter = args.iter();
                let mut chars = fmt.as_str().chars().peekable();
                while let Some(c) = chars.next() {
                    if c == '{' && chars.peek() == Some(&'}') {
                        chars.next();
                        if let Some(v) = arg_iter.next() {
                            let _ = core::fmt::write(&mut out, format_args!("{}", v.as_i32()));
                        }
                    } else {
                        let _ = out.push(c);
                    }
                }
                env.diag_print(ctx.task_id, out.as_str());
            }
        }
        Opcode::DbgBreakpoint => {
            env.diag_debug(ctx.task_id, ctx.pc, "breakpoint");
        }
        Opcode::Syscall => {
            let idx = inst.operand(0).as_u32();
            let arg = ctx.pop()?;
            match env.native_callback(idx) {
                Some(callback) => {
                    let result = callback(&[arg]);
                    ctx.push(result)?;
                }
                None => return Err(VmFault::InvalidOpcode(inst.opcode_raw)),
            }
        }

        Opcode::Halt => ctx.running = false,
        Opcode::Nop | Opcode::Comment => {}

        // Struct/array/frame and UART/SPI/I2C opcodes are filtered above.
        Opcode::LoadStructMember
        | Opcode::StoreStructMember
        | Opcode::LoadStructMemberBit
        | Opcode::StoreStructMemberBit
        | Opcode::AllocVar
        | Opcode::FreeVar
        | Opcode::AllocStruct
        | Opcode::AllocFrame
        | Opcode::FreeFrame
        | Opcode::AllocArray
        | Opcode::LoadArrayElem
        | Opcode::StoreArrayElem
        | Opcode::HwUartWrite
        | Opcode::HwSpiTransfer
        | Opcode::HwI2cWrite
        | Opcode::HwI2cRead => unreachable!("filtered by is_unsupported_* above"),
    }

    Ok(())
}
