// used for persistence
use rusqlite::{params, Connection, OptionalExtension};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{LayersError, Result};

/// Where a [`Persistor`] keeps its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceMode {
    InMemory,
    File(String),
}

/// One committed layer as the store keeps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredLayer {
    pub slot: usize,
    pub script: String,
    pub description: String,
    pub notes: Option<String>,
    pub diff: String,
    pub committed_at: DateTime<Utc>,
    pub hash: String,
}

/// Durable home of committed layer scripts, keyed by slot.
///
/// Storing a slot replaces any row at that slot or above, so the store always
/// mirrors the committed part of one stack.
pub trait LayerStore {
    fn store(
        &mut self,
        slot: usize,
        script: &str,
        description: &str,
        notes: Option<&str>,
        diff: &str,
    ) -> Result<StoredLayer>;
    /// Forget `slot` and everything above it.
    fn discard(&mut self, slot: usize) -> Result<()>;
    /// Every stored layer in ascending slot order.
    fn load_all(&mut self) -> Result<Vec<StoredLayer>>;
    /// Hash of the newest stored layer.
    fn head(&mut self) -> Result<Option<String>>;
}

// Each row's hash covers the previous row's hash, so editing or removing a
// row in the middle breaks the chain.
fn chain_hash(
    previous: Option<&str>,
    slot: usize,
    script: &str,
    description: &str,
    notes: Option<&str>,
    diff: &str,
) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(previous.unwrap_or("").as_bytes());
    hasher.update(&[0]);
    hasher.update(&(slot as u64).to_le_bytes());
    for part in [script, description, notes.unwrap_or(""), diff] {
        hasher.update(part.as_bytes());
        hasher.update(&[0]);
    }
    hasher.update(&[u8::from(notes.is_some())]);
    hasher.finalize().to_hex().to_string()
}

fn to_slot(value: i64) -> Result<usize> {
    usize::try_from(value).map_err(|_| LayersError::DataCorruption {
        message: format!("invalid slot {}", value),
    })
}

fn from_slot(slot: usize) -> Result<i64> {
    i64::try_from(slot).map_err(|_| LayersError::Persistence(format!("slot {} out of range", slot)))
}

// ------------- Persistence -------------
pub struct Persistor {
    connection: Connection,
}

impl Persistor {
    pub fn new(mode: PersistenceMode) -> Result<Self> {
        let connection = match &mode {
            PersistenceMode::InMemory => Connection::open_in_memory()?,
            PersistenceMode::File(path) => Connection::open(path)?,
        };
        // The "STRICT" keyword introduced in 3.37.0 breaks JDBC connections, which makes
        // debugging using an external tool like DBeaver impossible
        connection.execute_batch(
            "
            create table if not exists Layer (
                Layer_Slot integer not null,
                Script text not null,
                Description text not null,
                Notes text null,
                Diff text not null,
                CommittedAt text not null,
                Hash text not null,
                constraint referenceable_Layer_Slot primary key (
                    Layer_Slot
                )
            );-- STRICT;
            ",
        )?;
        info!(?mode, "opened layer store");
        Ok(Self { connection })
    }
    pub fn connection(&self) -> &Connection {
        &self.connection
    }
    fn previous_hash(&self, slot: i64) -> Result<Option<String>> {
        Ok(self
            .connection
            .query_row(
                "
                select Hash
                    from Layer
                    where Layer_Slot < ?
                    order by Layer_Slot desc
                    limit 1
                ",
                params![slot],
                |row| row.get(0),
            )
            .optional()?)
    }
}

impl LayerStore for Persistor {
    fn store(
        &mut self,
        slot: usize,
        script: &str,
        description: &str,
        notes: Option<&str>,
        diff: &str,
    ) -> Result<StoredLayer> {
        let db_slot = from_slot(slot)?;
        let previous = self.previous_hash(db_slot)?;
        let hash = chain_hash(previous.as_deref(), slot, script, description, notes, diff);
        let committed_at = Utc::now();
        let transaction = self.connection.transaction()?;
        transaction.execute("delete from Layer where Layer_Slot >= ?", params![db_slot])?;
        transaction.execute(
            "
            insert into Layer (
                Layer_Slot,
                Script,
                Description,
                Notes,
                Diff,
                CommittedAt,
                Hash
            ) values (?, ?, ?, ?, ?, ?, ?)
            ",
            params![db_slot, script, description, notes, diff, committed_at, hash],
        )?;
        transaction.commit()?;
        info!(slot, %hash, "stored layer");
        Ok(StoredLayer {
            slot,
            script: script.to_owned(),
            description: description.to_owned(),
            notes: notes.map(str::to_owned),
            diff: diff.to_owned(),
            committed_at,
            hash,
        })
    }
    fn discard(&mut self, slot: usize) -> Result<()> {
        let removed = self
            .connection
            .execute("delete from Layer where Layer_Slot >= ?", params![from_slot(slot)?])?;
        if removed > 0 {
            info!(slot, removed, "discarded stored layers");
        }
        Ok(())
    }
    fn load_all(&mut self) -> Result<Vec<StoredLayer>> {
        let mut statement = self.connection.prepare(
            "
            select Layer_Slot,
                    Script,
                    Description,
                    Notes,
                    Diff,
                    CommittedAt,
                    Hash
                from Layer
                order by Layer_Slot
            ",
        )?;
        let rows = statement.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, DateTime<Utc>>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;
        let mut layers: Vec<StoredLayer> = Vec::new();
        for row in rows {
            let (slot, script, description, notes, diff, committed_at, hash) = row?;
            let slot = to_slot(slot)?;
            let previous = layers.last().map(|layer| layer.hash.as_str());
            let expected = chain_hash(previous, slot, &script, &description, notes.as_deref(), &diff);
            if expected != hash {
                return Err(LayersError::DataCorruption {
                    message: format!("hash mismatch for stored layer {}", slot),
                });
            }
            layers.push(StoredLayer {
                slot,
                script,
                description,
                notes,
                diff,
                committed_at,
                hash,
            });
        }
        Ok(layers)
    }
    fn head(&mut self) -> Result<Option<String>> {
        Ok(self
            .connection
            .query_row(
                "select Hash from Layer order by Layer_Slot desc limit 1",
                [],
                |row| row.get(0),
            )
            .optional()?)
    }
}
