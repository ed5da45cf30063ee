//! Seed data: documents in MongoDB Extended JSON inserted into the `Model` collection.

use std::path::Path;

use mongodb::bson::{Bson, Document};
use mongodb::Client;
use serde_json::Value;

use crate::database::mongodb::models::{AuditUser, Model};
use crate::database::mongodb::Outcome;
use crate::prelude::*;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub n_inserted: usize,
    pub n_present: usize,
}

#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn load(path: &Path) -> Result<Vec<Model>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read `{}`", path.display()))?;
    parse(&contents).with_context(|| format!("failed to parse `{}`", path.display()))
}

/// Parses a JSON array of Extended JSON documents.
pub fn parse(contents: &str) -> Result<Vec<Model>> {
    let documents = match serde_json::from_str(contents)? {
        Value::Array(documents) => documents,
        _ => bail!("expected an array of documents"),
    };
    documents
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            into_document(value)
                .and_then(Model::try_from)
                .with_context(|| format!("invalid document #{}", i))
        })
        .collect()
}

fn into_document(value: Value) -> Result<Document> {
    match Bson::try_from(value)? {
        Bson::Document(document) => Ok(document),
        other => Err(anyhow!("expected an object, got {:?}", other.element_type())),
    }
}

/// Inserts the documents which are not there yet, stamping their audit trail.
#[instrument(skip_all, fields(n_documents = models.len()))]
pub async fn seed(into: &Client, models: Vec<Model>) -> Result<Summary> {
    let start_instant = Instant::now();
    let now = Utc::now();
    let operator = AuditUser::operator();
    let mut summary = Summary::default();

    for mut model in models {
        model.stamp(now, &operator)?;
        match model.insert_if_absent(into).await? {
            Outcome::Created => summary.n_inserted += 1,
            Outcome::AlreadyPresent => summary.n_present += 1,
        }
    }

    debug!(elapsed = format_elapsed(start_instant).as_str(), ?summary, "seeded");
    Ok(summary)
}
