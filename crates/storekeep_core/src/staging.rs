//! Pending schema instructions.

use crate::collection::CollectionConfig;
use storekeep_host::{HostResult, SchemaEditor};

/// A schema change carried into a migration callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationInstruction {
    /// Create a collection and its indexes.
    CreateCollection {
        /// Collection name.
        name: String,
        /// Key policy and indexes, resolved inside the callback.
        collection: CollectionConfig,
        /// Prefix of every index name.
        index_prefix: String,
    },
    /// Delete a collection and its records.
    DeleteCollection {
        /// Collection name.
        name: String,
    },
}

impl MigrationInstruction {
    /// Collection the instruction targets.
    #[must_use]
    pub fn collection(&self) -> &str {
        match self {
            MigrationInstruction::CreateCollection { name, .. }
            | MigrationInstruction::DeleteCollection { name } => name,
        }
    }

    /// Short name of the change, for logs.
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            MigrationInstruction::CreateCollection { .. } => "create_collection",
            MigrationInstruction::DeleteCollection { .. } => "delete_collection",
        }
    }

    /// Applies the instruction to the schema being upgraded.
    ///
    /// # Errors
    ///
    /// Returns a data error for a malformed key path, otherwise the editor's
    /// error; the host then aborts the version change.
    pub fn apply(&self, editor: &mut dyn SchemaEditor) -> HostResult<()> {
        match self {
            MigrationInstruction::CreateCollection {
                name,
                collection,
                index_prefix,
            } => {
                let (params, indexes) = collection.resolve(index_prefix)?;
                editor.create_object_store(name, &params)?;
                for index in &indexes {
                    editor.create_index(name, &index.name, &index.key_path, index.unique)?;
                }
                Ok(())
            }
            MigrationInstruction::DeleteCollection { name } => editor.delete_object_store(name),
        }
    }
}

/// Single slot holding the instruction of one in-flight migration.
///
/// The slot is moved into the migration callback, so each schema change
/// owns its own and nothing is shared between concurrent migrations.
#[derive(Debug, Default)]
pub struct MigrationStaging {
    slot: Option<MigrationInstruction>,
}

impl MigrationStaging {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `instruction`, replacing anything staged before.
    pub fn stage(&mut self, instruction: MigrationInstruction) {
        self.slot = Some(instruction);
    }

    /// Takes the staged instruction, leaving the slot empty.
    pub fn consume_for_migration(&mut self) -> Option<MigrationInstruction> {
        self.slot.take()
    }

    /// Whether an instruction is waiting.
    #[must_use]
    pub fn is_staged(&self) -> bool {
        self.slot.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delete(name: &str) -> MigrationInstruction {
        MigrationInstruction::DeleteCollection {
            name: name.to_string(),
        }
    }

    #[test]
    fn stage_overwrites() {
        let mut staging = MigrationStaging::new();
        staging.stage(delete("a"));
        staging.stage(delete("b"));

        assert_eq!(staging.consume_for_migration(), Some(delete("b")));
        assert!(!staging.is_staged());
        assert_eq!(staging.consume_for_migration(), None);
    }

    #[test]
    fn instruction_accessors() {
        let create = MigrationInstruction::CreateCollection {
            name: "users".into(),
            collection: CollectionConfig::new(),
            index_prefix: "by_".into(),
        };
        assert_eq!(create.collection(), "users");
        assert_eq!(create.action(), "create_collection");
        assert_eq!(delete("users").action(), "delete_collection");
    }
}
