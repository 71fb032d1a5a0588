use super::Collection;
use crate::error::{ClassifierError, Result};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug)]
pub(crate) enum Op {
    Put {
        collection: Collection,
        key: String,
        value: Value,
    },
    PutImage {
        key: String,
        bytes: Vec<u8>,
    },
    Delete {
        collection: Collection,
        key: String,
    },
    Clear(Collection),
}

/// A batch of writes across collections, applied by `Store::commit`.
///
/// Writes are applied in the order they were added. Dropping a transaction
/// without committing it discards every write.
#[derive(Debug, Default)]
pub struct Transaction {
    ops: Vec<Op>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a document write. Images go through [`Transaction::put_image`].
    pub fn put<T: Serialize + ?Sized>(
        &mut self,
        collection: Collection,
        key: impl Into<String>,
        value: &T,
    ) -> Result<()> {
        if collection == Collection::Images {
            return Err(ClassifierError::Store(
                "image documents are written with put_image".into(),
            ));
        }
        self.ops.push(Op::Put {
            collection,
            key: key.into(),
            value: serde_json::to_value(value)?,
        });
        Ok(())
    }

    pub fn put_image(&mut self, key: impl Into<String>, bytes: Vec<u8>) {
        self.ops.push(Op::PutImage {
            key: key.into(),
            bytes,
        });
    }

    pub fn delete(&mut self, collection: Collection, key: impl Into<String>) {
        self.ops.push(Op::Delete {
            collection,
            key: key.into(),
        });
    }

    pub fn clear(&mut self, collection: Collection) {
        self.ops.push(Op::Clear(collection));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub(crate) fn into_ops(self) -> Vec<Op> {
        self.ops
    }
}
