//! The function-local symbol table and temporary-local allocation.

use crate::instr::LocalId;
use crate::types::{MachineType, StorageType};
use std::collections::HashMap;

/// A single entry in a function's local symbol table.
#[derive(Clone, Debug)]
pub struct LocalEntry {
    pub machine_name: LocalId,
    pub source_type: StorageType,
    pub machine_type: MachineType,
}

/// Name-keyed mapping from source-visible local/parameter name to its [`LocalEntry`].
///
/// Parameters and locals share this namespace; a plain `HashMap` is used rather
/// than a dedicated symbol-table type.
#[derive(Debug, Default)]
pub struct LocalTable {
    entries: HashMap<Box<str>, LocalEntry>,
    next_id: u32,
}

impl LocalTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a new local or parameter. Returns `Err(())` if `name` is already declared --
    /// a duplicate local is a defined error (`Code::W140`).
    pub fn declare(
        &mut self,
        name: &str,
        source_type: StorageType,
        machine_type: MachineType,
    ) -> Result<LocalId, ()> {
        if self.entries.contains_key(name) {
            return Err(());
        }

        let id = LocalId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            name.into(),
            LocalEntry {
                machine_name: id,
                source_type,
                machine_type,
            },
        );
        Ok(id)
    }

    pub fn get(&self, name: &str) -> Option<&LocalEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterates over every declared name and its [`LocalEntry`], for the local-usage sweep.
    pub fn entries(&self) -> impl Iterator<Item = (&Box<str>, &LocalEntry)> {
        self.entries.iter()
    }

    /// Drops a declared local from the symbol table.
    pub fn remove(&mut self, name: &str) {
        self.entries.remove(name);
    }

    /// The next id that would be assigned to a real (non-temporary) local; temporaries are
    /// allocated starting here so their ids never collide with a user local.
    pub fn next_real_id(&self) -> u32 {
        self.next_id
    }

    pub fn reserve_ids(&mut self, count: u32) {
        self.next_id += count;
    }
}

/// Allocates at most one temporary local per [`MachineType`] per function.
#[derive(Debug, Default)]
pub struct Temporaries {
    slots: [Option<LocalId>; 4],
}

fn slot_index(ty: MachineType) -> usize {
    match ty {
        MachineType::I32 => 0,
        MachineType::I64 => 1,
        MachineType::F32 => 2,
        MachineType::F64 => 3,
    }
}

impl Temporaries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the temporary local id for `ty`, allocating one via `alloc` (a fresh local id
    /// past the end of the user-declared locals) if this is the first request for `ty`.
    pub fn get_or_alloc(&mut self, ty: MachineType, alloc: impl FnOnce() -> LocalId) -> LocalId {
        let slot = &mut self.slots[slot_index(ty)];
        *slot.get_or_insert_with(alloc)
    }

    /// Iterates over the temporaries that were actually allocated, for local-declaration
    /// purposes.
    pub fn allocated(&self) -> impl Iterator<Item = (MachineType, LocalId)> + '_ {
        [
            (MachineType::I32, self.slots[0]),
            (MachineType::I64, self.slots[1]),
            (MachineType::F32, self.slots[2]),
            (MachineType::F64, self.slots[3]),
        ]
        .into_iter()
        .filter_map(|(ty, id)| id.map(|id| (ty, id)))
    }
}
