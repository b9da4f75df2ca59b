// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use rtmc_abi::{Instruction, Limits, Value};

/// A function-table or symbol-table entry: a bounded name plus an
/// instruction address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedAddress {
    pub name: heapless::String<{ Limits::MAX_NAME_LEN + 1 }>,
    pub address: u32,
}

/// The loaded, validated content of a binary file:
/// instruction vector, constant pool, string pool, function table, symbol
/// table. Immutable once produced by [`crate::loader::decode`]; a
/// `VmController` holds exactly one per loaded program.
#[derive(Clone, Debug, Default)]
pub struct ProgramImage {
    pub instructions: heapless::Vec<Instruction, { Limits::MAX_INSTRUCTIONS }>,
    pub constants: heapless::Vec<Value, { Limits::MAX_CONSTANTS }>,
    pub strings: heapless::Vec<heapless::String<{ Limits::MAX_STRING_LEN + 1 }>, { Limits::MAX_STRINGS }>,
    pub functions: heapless::Vec<NamedAddress, { Limits::MAX_FUNCTIONS }>,
    pub symbols: heapless::Vec<NamedAddress, { Limits::MAX_SYMBOLS }>,
}

impl ProgramImage {
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Looks up a function by exact name match.
    pub fn function_address(&self, name: &str) -> Option<u32> {
        self.functions
        .iter()
        .find(|f| f.name.as_str() == name)
        .map(|f| f.address)
    }
}
