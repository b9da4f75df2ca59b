// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Engine-level tests driving [`step`]/[`run_context`] directly against a
//! minimal in-memory [`Environment`], without the RTOS/HAL backends or the
//! VM Controller — these exercise `spec.md` §8's end-to-end scenarios and
//! the stack-discipline property at the level they're actually specified:
//! one instruction stream, one [`Context`].

use std::collections::VecDeque;

use proptest::prelude::*;
use rtmc_abi::{KernelFault, Opcode, Value, VmFault};
use rtmc_image::ProgramImage;

use crate::context::Context;
use crate::env::{Environment, NativeCallback};
use crate::run::run_context;

/// A bare-bones [`Environment`]: flat global memory, one FIFO per message
/// queue, and a log of everything the diagnostic channel emitted. No
/// concurrency — semaphore take/give and queue send/recv all resolve
/// synchronously, which is sufficient for single-task engine tests; RTOS
/// scheduling itself is `rtmc-vm`/`rtmc-rtos`'s concern, not the engine's.
#[derive(Default)]
struct TestEnv {
    memory: [u32; 4096],
    semaphores: Vec<bool>,
    queues: Vec<VecDeque<u32>>,
    prints: Vec<String>,
    errors: Vec<String>,
}

impl TestEnv {
    fn new() -> Self {
        Self { memory: [0; 4096], ..Default::default() }
    }
}

impl Environment for TestEnv {
    fn read_global(&mut self, addr: u32) -> Value {
        Value::from_u32(self.memory[addr as usize])
    }

    fn write_global(&mut self, addr: u32, value: Value) {
        self.memory[addr as usize] = value.as_u32();
    }

    fn create_task(&mut self, _entry_pc: u32, _priority: u8, _core: u8, _stack_size: u32) -> Result<u32, KernelFault> {
        Err(KernelFault::TaskCreateFailed)
    }
    fn delete_task(&mut self, _task: u32) {}
    fn suspend_task(&mut self, _task: u32) {}
    fn resume_task(&mut self, _task: u32) {}
    fn delay_ms(&mut self, _ms: u32) {}
    fn yield_now(&mut self) {}

    fn semaphore_create(&mut self) -> Result<u32, KernelFault> {
        let id = self.semaphores.len() as u32;
        self.semaphores.push(false);
        Ok(id)
    }
    fn semaphore_take(&mut self, handle: u32, _timeout_ms: i32) -> bool {
        match self.semaphores.get_mut(handle as usize) {
            Some(slot) if *slot => {
                *slot = false;
                true
            }
            _ => false,
        }
    }
    fn semaphore_give(&mut self, handle: u32) {
        if let Some(slot) = self.semaphores.get_mut(handle as usize) {
            *slot = true;
        }
    }

    fn queue_create(&mut self) -> Result<u32, KernelFault> {
        let id = self.queues.len() as u32;
        self.queues.push(VecDeque::new());
        Ok(id)
    }
    fn queue_send(&mut self, handle: u32, value: Value) {
        if let Some(q) = self.queues.get_mut(handle as usize) {
            if q.len() < 10 {
                q.push_back(value.as_u32());
            }
        }
    }
    fn queue_recv(&mut self, handle: u32, _timeout_ms: i32) -> Option<Value> {
        self.queues.get_mut(handle as usize)?.pop_front().map(Value::from_u32)
    }

    fn gpio_init(&mut self, _pin: u32, _mode: u32) -> bool {
        false
    }
    fn gpio_set(&mut self, _pin: u32, _value: u32) -> bool {
        false
    }
    fn gpio_get(&mut self, _pin: u32) -> Option<bool> {
        None
    }
    fn timer_init(&mut self, _timer: u32, _frequency_hz: u32) -> bool {
        false
    }
    fn timer_start(&mut self, _timer: u32) -> bool {
        false
    }
    fn timer_stop(&mut self, _timer: u32) -> bool {
        false
    }
    fn timer_set_pwm_duty(&mut self, _timer: u32, _duty_percent: u32) -> bool {
        false
    }
    fn adc_init(&mut self, _pin: u32) -> Option<u32> {
        None
    }
    fn adc_read(&mut self, _channel: u32) -> Option<u32> {
        None
    }

    fn native_callback(&self, _idx: u32) -> Option<NativeCallback> {
        None
    }

    fn diag_debug(&mut self, _task_id: u32, _pc: u32, _message: &str) {}
    fn diag_error(&mut self, _task_id: u32, message: &str) {
        self.errors.push(message.to_string());
    }
    fn diag_print(&mut self, _task_id: u32, message: &str) {
        self.prints.push(message.to_string());
    }
}

/// Builds a test instruction. `operand_count` is diagnostic-only (`step`
/// dispatches by opcode, each opcode already knows its own arity) so every
/// helper-built instruction just claims all four slots.
fn inst(opcode: Opcode, operands: [u32; 4]) -> rtmc_abi::Instruction {
    rtmc_abi::Instruction {
        opcode_raw: opcode as u8,
        operand_count: 4,
        operands: operands.map(Value::from_u32),
        line: 0,
    }
}

fn program(instructions: &[rtmc_abi::Instruction], constants: &[i32]) -> ProgramImage {
    let mut image = ProgramImage::default();
    for i in instructions {
        image.instructions.push(*i).unwrap();
    }
    for &c in constants {
        image.constants.push(Value::from_i32(c)).unwrap();
    }
    image
}

fn run_to_completion(image: &ProgramImage, env: &mut TestEnv) -> Result<(), VmFault> {
    let mut ctx = Context::new(0, 0);
    run_context(image, &mut ctx, env, false, || true)
}

/// S1: `LOAD_CONST 0; LOAD_CONST 1; ADD; STORE_VAR 0; HALT` with
/// `constants = [3, 4]` => `memory[0] = 7`.
#[test]
fn s1_arithmetic() {
    let image = program(
        &[
            inst(Opcode::LoadConst, [0, 0, 0, 0]),
            inst(Opcode::LoadConst, [1, 0, 0, 0]),
            inst(Opcode::Add, [0, 0, 0, 0]),
            inst(Opcode::StoreVar, [0, 0, 0, 0]),
            inst(Opcode::Halt, [0, 0, 0, 0]),
        ],
        &[3, 4],
    );
    let mut env = TestEnv::new();
    run_to_completion(&image, &mut env).expect("halts cleanly");
    assert_eq!(env.memory[0], 7);
}

/// S2: `LOAD_CONST 0; JUMPIF_FALSE 4; LOAD_CONST 1; JUMP 5; LOAD_CONST 2;
/// STORE_VAR 0; HALT` with `constants = [0, 10, 20]` => `memory[0] = 20`.
#[test]
fn s2_branch_not_taken_falls_through_to_the_false_arm() {
    let image = program(
        &[
            inst(Opcode::LoadConst, [0, 0, 0, 0]), // 0
            inst(Opcode::JumpIfFalse, [4, 0, 0, 0]), // 1
            inst(Opcode::LoadConst, [1, 0, 0, 0]), // 2 (true arm)
            inst(Opcode::Jump, [5, 0, 0, 0]), // 3
            inst(Opcode::LoadConst, [2, 0, 0, 0]), // 4 (false arm)
            inst(Opcode::StoreVar, [0, 0, 0, 0]), // 5
            inst(Opcode::Halt, [0, 0, 0, 0]), // 6
        ],
        &[0, 10, 20],
    );
    let mut env = TestEnv::new();
    run_to_completion(&image, &mut env).expect("halts cleanly");
    assert_eq!(env.memory[0], 20);
}

/// S3: a 0..10 counting loop terminated by `GTE 10`, ending with
/// `memory[0] = 10` and an empty operand stack.
#[test]
fn s3_loop_counts_to_ten_and_leaves_stack_empty() {
    // memory[0] = 0
    // loop: memory[0] = memory[0] + 1; if memory[0] >= 10 goto end
    //       else goto loop
    let image = program(
        &[
            inst(Opcode::LoadConst, [0, 0, 0, 0]),   // 0: push 0
            inst(Opcode::StoreVar, [0, 0, 0, 0]),    // 1: memory[0] = 0
            inst(Opcode::LoadVar, [0, 0, 0, 0]),     // 2: loop: push memory[0]
            inst(Opcode::LoadConst, [1, 0, 0, 0]),   // 3: push 1
            inst(Opcode::Add, [0, 0, 0, 0]),         // 4: push memory[0]+1
            inst(Opcode::StoreVar, [0, 0, 0, 0]),    // 5: memory[0] += 1
            inst(Opcode::LoadVar, [0, 0, 0, 0]),     // 6: push memory[0]
            inst(Opcode::LoadConst, [2, 0, 0, 0]),   // 7: push 10
            inst(Opcode::Gte, [0, 0, 0, 0]),         // 8: push memory[0] >= 10
            inst(Opcode::JumpIfFalse, [2, 0, 0, 0]), // 9: not yet -> loop
            inst(Opcode::Halt, [0, 0, 0, 0]),        // 10
        ],
        &[0, 1, 10],
    );
    let mut env = TestEnv::new();
    let mut ctx = Context::new(0, 0);
    run_context(&image, &mut ctx, &mut env, false, || true).expect("halts cleanly");
    assert_eq!(env.memory[0], 10);
    assert_eq!(ctx.operand_stack_depth(), 0);
}

/// S4 (single-task slice): a semaphore starts taken, is given, then taken
/// again successfully — the handoff primitive the two-task scenario in
/// `spec.md` §8 relies on.
#[test]
fn semaphore_starts_taken_then_handoff_succeeds() {
    let mut env = TestEnv::new();
    let handle = env.semaphore_create().unwrap();
    assert!(!env.semaphore_take(handle, 0));
    env.semaphore_give(handle);
    assert!(env.semaphore_take(handle, 0));
    assert!(!env.semaphore_take(handle, 0));
}

/// S5: three sends followed by three receives return values in FIFO
/// order; a fourth receive on an empty queue pushes -1.
#[test]
fn s5_message_queue_is_fifo_and_times_out_to_minus_one() {
    let image = program(
        &[
            inst(Opcode::LoadConst, [0, 0, 0, 0]), // push 1
            inst(Opcode::MsgSend, [0, 0, 0, 0]),   // send to queue 0
            inst(Opcode::LoadConst, [1, 0, 0, 0]), // push 2
            inst(Opcode::MsgSend, [0, 0, 0, 0]),
            inst(Opcode::LoadConst, [2, 0, 0, 0]), // push 3
            inst(Opcode::MsgSend, [0, 0, 0, 0]),
            inst(Opcode::Halt, [0, 0, 0, 0]),
        ],
        &[1, 2, 3],
    );
    let mut env = TestEnv::new();
    env.queue_create().unwrap();
    run_to_completion(&image, &mut env).expect("halts cleanly");

    assert_eq!(env.queue_recv(0, 0), Some(Value::from_i32(1)));
    assert_eq!(env.queue_recv(0, 0), Some(Value::from_i32(2)));
    assert_eq!(env.queue_recv(0, 0), Some(Value::from_i32(3)));
    assert_eq!(env.queue_recv(0, 50), None);
}

/// S6: `LOAD_CONST 0; LOAD_CONST 0; DIV` with `constants = [0]` faults the
/// task with `DivisionByZero` and does not touch global memory.
#[test]
fn s6_division_by_zero_faults_the_task() {
    let image = program(
        &[
            inst(Opcode::LoadConst, [0, 0, 0, 0]),
            inst(Opcode::LoadConst, [0, 0, 0, 0]),
            inst(Opcode::Div, [0, 0, 0, 0]),
            inst(Opcode::Halt, [0, 0, 0, 0]),
        ],
        &[0],
    );
    let mut env = TestEnv::new();
    let err = run_to_completion(&image, &mut env).unwrap_err();
    assert_eq!(err, VmFault::DivisionByZero);
}

#[test]
fn call_then_ret_returns_to_the_instruction_after_call() {
    let image = program(
        &[
            inst(Opcode::Call, [2, 0, 0, 0]),      // 0: call address 2
            inst(Opcode::Halt, [0, 0, 0, 0]),      // 1: reached after return
            inst(Opcode::LoadConst, [0, 0, 0, 0]), // 2: callee
            inst(Opcode::StoreVar, [0, 0, 0, 0]),  // 3
            inst(Opcode::Ret, [0, 0, 0, 0]),       // 4
        ],
        &[42],
    );
    let mut env = TestEnv::new();
    run_to_completion(&image, &mut env).expect("halts cleanly");
    assert_eq!(env.memory[0], 42);
}

/// `spec.md` §4.2: `RET` with an empty call stack ends the task instead of
/// faulting.
#[test]
fn ret_with_empty_call_stack_ends_the_task_cleanly() {
    let image = program(&[inst(Opcode::Ret, [0, 0, 0, 0])], &[]);
    let mut env = TestEnv::new();
    run_to_completion(&image, &mut env).expect("an empty-call-stack RET is not a fault");
}

#[test]
fn operand_stack_overflow_faults_the_task() {
    let mut instructions: Vec<rtmc_abi::Instruction> = (0..300)
        .map(|_| inst(Opcode::LoadConst, [0, 0, 0, 0]))
        .collect();
    instructions.push(inst(Opcode::Halt, [0, 0, 0, 0]));
    let image = program(&instructions, &[1]);
    let mut env = TestEnv::new();
    let err = run_to_completion(&image, &mut env).unwrap_err();
    assert_eq!(err, VmFault::StackOverflow);
}

#[test]
fn operand_stack_underflow_faults_the_task() {
    let image = program(&[inst(Opcode::Add, [0, 0, 0, 0])], &[]);
    let mut env = TestEnv::new();
    let err = run_to_completion(&image, &mut env).unwrap_err();
    assert_eq!(err, VmFault::StackUnderflow);
}

#[test]
fn unrecognised_opcode_byte_faults_as_invalid_opcode() {
    let image = program(
        &[rtmc_abi::Instruction { opcode_raw: 0xfe, operand_count: 0, operands: [Value::ZERO; 4], line: 0 }],
        &[],
    );
    let mut env = TestEnv::new();
    let err = run_to_completion(&image, &mut env).unwrap_err();
    assert_eq!(err, VmFault::InvalidOpcode(0xfe));
}

/// `spec.md` §9's frame/struct/array family is parsed but never executed;
/// `SPEC_FULL.md` distinguishes this from an ordinary `InvalidOpcode`.
#[test]
fn unsupported_frame_opcode_faults_distinctly_from_invalid_opcode() {
    let image = program(&[inst(Opcode::AllocFrame, [0, 0, 0, 0])], &[]);
    let mut env = TestEnv::new();
    let err = run_to_completion(&image, &mut env).unwrap_err();
    assert_eq!(err, VmFault::Unsupported(Opcode::AllocFrame));
}

/// Out-of-range `LOAD_VAR`/`STORE_VAR` never fault: `spec.md` §4.2
/// preserves the source's laxness (read returns zero, write is a no-op)
/// rather than upgrading it to a fault.
#[test]
fn out_of_range_global_access_is_clamped_not_faulted() {
    let image = program(
        &[
            inst(Opcode::LoadVar, [9_000, 0, 0, 0]),
            inst(Opcode::StoreVar, [0, 0, 0, 0]),
            inst(Opcode::LoadConst, [0, 0, 0, 0]),
            inst(Opcode::StoreVar, [9_000, 0, 0, 0]),
            inst(Opcode::Halt, [0, 0, 0, 0]),
        ],
        &[7],
    );
    let mut env = TestEnv::new();
    run_to_completion(&image, &mut env).expect("out-of-range accesses are clamped, not faults");
    assert_eq!(env.memory[0], 0, "load from an out-of-range address pushes zero");
}

/// `spec.md` §4.2: hardware opcodes on an uninitialised pin log an error
/// and push a sentinel rather than faulting the task. `TestEnv`'s GPIO
/// stubs always report failure, so every `HW_GPIO_*` call here takes that
/// path — real pin state is `rtmc-hal`'s concern.
#[test]
fn hw_gpio_failure_logs_an_error_and_does_not_fault() {
    let image = program(
        &[
            inst(Opcode::HwGpioGet, [0, 0, 0, 0]),
            inst(Opcode::StoreVar, [0, 0, 0, 0]),
            inst(Opcode::Halt, [0, 0, 0, 0]),
        ],
        &[],
    );
    let mut env = TestEnv::new();
    run_to_completion(&image, &mut env).expect("hardware misuse does not fault the task");
    assert_eq!(env.memory[0], 0, "HW_GPIO_GET on an uninitialised pin pushes zero");
    assert_eq!(env.errors.len(), 1);
}

/// `PRINT idx` emits `strings[idx]` verbatim on the diagnostic channel.
#[test]
fn print_emits_the_referenced_string() {
    let mut image = ProgramImage::default();
    let mut s: heapless::String<64> = heapless::String::new();
    s.push_str("hello").unwrap();
    image.strings.push(s).unwrap();
    image.instructions.push(inst(Opcode::Print, [0, 0, 0, 0])).unwrap();
    image.instructions.push(inst(Opcode::Halt, [0, 0, 0, 0])).unwrap();

    let mut env = TestEnv::new();
    run_to_completion(&image, &mut env).expect("halts cleanly");
    assert_eq!(env.prints, vec!["hello".to_string()]);
}

/// `spec.md` §8, property 3: for any balanced push/pop sequence (every
/// `ADD` consumes the two values immediately pushed ahead of it), the
/// operand stack returns to its starting depth.
fn balanced_program(depth_before_halt: usize) -> ProgramImage {
    let mut instructions = Vec::new();
    for _ in 0..depth_before_halt {
        instructions.push(inst(Opcode::LoadConst, [0, 0, 0, 0]));
        instructions.push(inst(Opcode::LoadConst, [0, 0, 0, 0]));
        instructions.push(inst(Opcode::Add, [0, 0, 0, 0]));
        instructions.push(inst(Opcode::StoreVar, [0, 0, 0, 0]));
    }
    instructions.push(inst(Opcode::Halt, [0, 0, 0, 0]));
    program(&instructions, &[1])
}

proptest! {
    #[test]
    fn stack_discipline_holds_for_balanced_sequences(reps in 0usize..60) {
        let image = balanced_program(reps);
        let mut env = TestEnv::new();
        let mut ctx = Context::new(0, 0);
        run_context(&image, &mut ctx, &mut env, false, || true).expect("halts cleanly");
        prop_assert_eq!(ctx.operand_stack_depth(), 0);
    }

    /// Arithmetic pops right-then-left (`spec.md` §4.2): `a - b` must
    /// compute `a - b`, not `b - a`, for every operand pair.
    #[test]
    fn subtraction_pops_in_the_documented_order(a in i32::MIN..i32::MAX, b in i32::MIN..i32::MAX) {
        let image = program(
            &[
                inst(Opcode::LoadConst, [0, 0, 0, 0]),
                inst(Opcode::LoadConst, [1, 0, 0, 0]),
                inst(Opcode::Sub, [0, 0, 0, 0]),
                inst(Opcode::StoreVar, [0, 0, 0, 0]),
                inst(Opcode::Halt, [0, 0, 0, 0]),
            ],
            &[a, b],
        );
        let mut env = TestEnv::new();
        run_to_completion(&image, &mut env).expect("halts cleanly");
        prop_assert_eq!(env.memory[0] as i32, a.wrapping_sub(b));
    }
}
