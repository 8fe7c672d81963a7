//! Document persistence on sled
//!
//! A document is stored under `document:<id>` with its transporter chain
//! replaced by the ordered list of entry ids. Each entry lives under
//! `transporter:<id>` so it can be attached, detached and reattached
//! independently of any document.
use super::document::{Document, Transporter};
use super::error::StoreError;
use super::transporters::TransporterLookup;
use super::utils::encode_with_revision;
use sled::Batch;
use std::sync::Arc;
use tracing::debug;

const DOCUMENT_PREFIX: &str = "document:";
const TRANSPORTER_PREFIX: &str = "transporter:";

fn document_key(id: &str) -> String {
    format!("{DOCUMENT_PREFIX}{id}")
}

fn transporter_key(id: &str) -> String {
    format!("{TRANSPORTER_PREFIX}{id}")
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq)]
struct DocumentRecord {
    #[n(0)]
    document: Document,
    #[n(1)]
    chain: Vec<String>,
}

impl DocumentRecord {
    fn split(document: &Document) -> Self {
        let chain = document.transporter_ids();
        let mut document = document.clone();
        document.transporters.clear();
        Self { document, chain }
    }
}

pub trait DocumentStore {
    /// Load a document with its transporter chain, ordered by number.
    fn load_document(&self, id: &str) -> Result<Document, StoreError>;
    fn load_transporter(&self, id: &str) -> Result<Option<Transporter>, StoreError>;
    /// Persist the document, its chain and the detached entries in one
    /// atomic write. Returns the new revision of the document record.
    fn save_document(&self, document: &Document, detached: &[Transporter]) -> Result<String, StoreError>;
}

#[derive(Clone)]
pub struct SledStore {
    instance: Arc<sled::Db>,
}

impl SledStore {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self { instance }
    }

    /// Seed a document, e.g. when importing one created elsewhere.
    pub fn insert_document(&self, document: &Document) -> Result<String, StoreError> {
        self.save_document(document, &[])
    }

    /// Seed a standalone transporter entry, not yet attached to a document.
    pub fn insert_transporter(&self, transporter: &Transporter) -> Result<(), StoreError> {
        let cbor = minicbor::to_vec(transporter).map_err(anyhow::Error::from)?;
        self.instance
            .insert(transporter_key(&transporter.id).as_bytes(), cbor)?;
        Ok(())
    }

    fn read_transporter(&self, id: &str) -> Result<Option<Transporter>, StoreError> {
        match self.instance.get(transporter_key(id).as_bytes())? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl DocumentStore for SledStore {
    fn load_document(&self, id: &str) -> Result<Document, StoreError> {
        let bytes = self
            .instance
            .get(document_key(id).as_bytes())?
            .ok_or_else(|| StoreError::DocumentNotFound(id.to_string()))?;
        let record: DocumentRecord = minicbor::decode(&bytes)?;

        let mut document = record.document;
        for transporter_id in &record.chain {
            let transporter =
                self.read_transporter(transporter_id)?
                    .ok_or_else(|| StoreError::DanglingTransporter {
                        document: id.to_string(),
                        transporter: transporter_id.clone(),
                    })?;
            document.transporters.push(transporter);
        }
        document.transporters.sort_by_key(|t| t.number);

        Ok(document)
    }

    fn load_transporter(&self, id: &str) -> Result<Option<Transporter>, StoreError> {
        self.read_transporter(id)
    }

    fn save_document(&self, document: &Document, detached: &[Transporter]) -> Result<String, StoreError> {
        let record = DocumentRecord::split(document);
        let (revision, cbor) = encode_with_revision(&record)?;

        let mut batch = Batch::default();
        batch.insert(document_key(&document.id).as_bytes(), cbor);
        for transporter in document.transporters.iter().chain(detached) {
            let cbor = minicbor::to_vec(transporter).map_err(anyhow::Error::from)?;
            batch.insert(transporter_key(&transporter.id).as_bytes(), cbor);
        }
        self.instance.apply_batch(batch)?;

        debug!(
            document = %document.id,
            revision = %revision,
            chain = document.transporters.len(),
            detached = detached.len(),
            "document saved"
        );
        Ok(revision)
    }
}

impl TransporterLookup for SledStore {
    fn find(&self, id: &str) -> Result<Option<Transporter>, StoreError> {
        self.read_transporter(id)
    }
}
