// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Task Execution Context: per-task program counter,
//! operand stack, call-return stack, and running flag. Private to the
//! kernel task that owns it.

use rtmc_abi::{Limits, Value, VmFault};

/// The private mutable state of one executing task.
pub struct Context {
    pub task_id: u32,
    pub pc: u32,
    operand_stack: heapless::Vec<Value, { Limits::OPERAND_STACK_DEPTH }>,
    call_stack: heapless::Vec<u32, { Limits::CALL_STACK_DEPTH }>,
    pub running: bool,
}

impl Context {
    pub fn new(task_id: u32, entry_pc: u32) -> Self {
        Self {
            task_id,
            pc: entry_pc,
            operand_stack: heapless::Vec::new(),
            call_stack: heapless::Vec::new(),
            running: true,
        }
    }

    pub fn push(&mut self, value: Value) -> Result<(), VmFault> {
        self.operand_stack.push(value).map_err(|_| VmFault::StackOverflow)
    }

    pub fn pop(&mut self) -> Result<Value, VmFault> {
        self.operand_stack.pop().ok_or(VmFault::StackUnderflow)
    }

    pub fn operand_stack_depth(&self) -> usize {
        self.operand_stack.len()
    }

    pub fn call_push(&mut self, return_pc: u32) -> Result<(), VmFault> {
        self.call_stack
        .push(return_pc)
        .map_err(|_| VmFault::CallStackOverflow)
    }

    /// Pops a return address, or `None` if the call stack is empty — per
    /// `spec.md` §4.2, an empty call stack at `RET` ends the task rather
    /// than faulting.
    pub fn call_pop(&mut self) -> Option<u32> {
        self.call_stack.pop()
    }

    pub fn call_stack_depth(&self) -> usize {
        self.call_stack.len()
    }
}
