use mongodb::bson::{doc, Bson, Document};
use mongodb::options::UpdateOptions;
use mongodb::{bson, Client};

use crate::database::mongodb::errors::ServerError;
use crate::database::mongodb::models::{Audit, AuditUser};
use crate::database::mongodb::traits::{Indexes, TypedDocument};
use crate::database::mongodb::Outcome;
use crate::plan::IndexSpec;
use crate::prelude::*;

/// Service document: an identifier and free-form fields, audit trail included.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub id: Bson,

    /// Typed view of the audit fields.
    pub audit: Audit,

    /// Everything but `_id`, stored as is.
    pub fields: Document,
}

impl TypedDocument for Model {
    const DATABASE: &'static str = "Example";
    const NAME: &'static str = "Model";
}

impl Indexes for Model {
    fn indexes() -> Vec<IndexSpec> {
        vec![
            IndexSpec::background(Audit::CREATED_AT_KEY),
            IndexSpec::background(Audit::UPDATED_AT_KEY),
        ]
    }
}

impl TryFrom<Document> for Model {
    type Error = anyhow::Error;

    fn try_from(mut fields: Document) -> Result<Self> {
        let id = fields
            .remove("_id")
            .ok_or_else(|| anyhow!("the document has no `_id`"))?;

        let mut audit_fields = Document::new();
        for key in Audit::KEYS {
            if let Some(value) = fields.get(key) {
                audit_fields.insert(key, value.clone());
            }
        }
        let audit = bson::from_document(audit_fields)
            .with_context(|| format!("invalid audit fields in the document `{}`", id))?;

        Ok(Self { id, audit, fields })
    }
}

impl Model {
    /// Inserts the document unless one with the same `_id` exists.
    /// The existing document is left intact.
    #[instrument(level = "debug", skip_all, fields(id = %self.id))]
    pub async fn insert_if_absent(&self, into: &Client) -> Result<Outcome> {
        let result = Self::collection(into)
            .clone_with_type::<Document>()
            .update_one(
                doc! { "_id": self.id.clone() },
                doc! { "$setOnInsert": self.fields.clone() },
                UpdateOptions::builder().upsert(true).build(),
            )
            .await;
        match result {
            Ok(result) if result.upserted_id.is_some() => Ok(Outcome::Created),
            Ok(_) => Ok(Outcome::AlreadyPresent),
            // Upserted concurrently with the same `_id`.
            Err(error) if ServerError::of(&error) == Some(ServerError::DuplicateKey) => {
                Ok(Outcome::AlreadyPresent)
            }
            Err(error) => {
                Err(error).with_context(|| format!("failed to insert the document `{}`", self.id))
            }
        }
    }

    /// Adds the missing audit fields. Present fields are kept byte for byte.
    pub fn stamp(&mut self, now: DateTime, operator: &AuditUser) -> Result {
        let mut stamped = Audit::default();
        stamped.stamp(now, operator);
        for (key, value) in bson::to_document(&stamped)? {
            if !self.fields.contains_key(&key) {
                self.fields.insert(key, value);
            }
        }
        self.audit.stamp(now, operator);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn try_from_ok() -> Result {
        let created_at = Utc.with_ymd_and_hms(2021, 3, 1, 12, 0, 0).unwrap();
        let model = Model::try_from(doc! {
            "_id": "first",
            "name": "First",
            "createdTs": bson::DateTime::from_chrono(created_at),
            "updatedBy": { "username": "john.doe" },
        })?;
        assert_eq!(model.id, Bson::String("first".to_string()));
        assert_eq!(model.fields.get_str("name")?, "First");
        assert!(!model.fields.contains_key("_id"));
        assert_eq!(model.audit.created_at, Some(created_at));
        assert_eq!(
            model.audit.updated_by.and_then(|user| user.username).as_deref(),
            Some("john.doe"),
        );
        Ok(())
    }

    #[test]
    fn try_from_without_id_fails() {
        assert!(Model::try_from(doc! { "name": "First" }).is_err());
    }

    #[test]
    fn try_from_invalid_audit_fails() {
        assert!(Model::try_from(doc! { "_id": 1, "version": "one" }).is_err());
    }

    #[test]
    fn indexes_ok() {
        let fields: Vec<_> = Model::indexes().iter().map(|spec| spec.field).collect();
        assert_eq!(fields, ["createdTs", "updatedTs"]);
        assert!(Model::indexes().iter().all(|spec| spec.background && !spec.sparse && !spec.unique));
    }

    #[test]
    fn stamp_keeps_unknown_audit_fields_ok() -> Result {
        let now = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
        let mut model = Model::try_from(doc! {
            "_id": 1,
            "createdBy": { "username": "john.doe", "email": "j@d.com" },
        })?;

        model.stamp(now, &AuditUser::operator())?;

        let created_by = model.fields.get_document("createdBy")?;
        assert_eq!(created_by, &doc! { "username": "john.doe", "email": "j@d.com" });
        assert_eq!(model.fields.get_datetime("createdTs")?, &bson::DateTime::from_chrono(now));
        assert_eq!(
            model.fields.get_document("updatedBy")?,
            &doc! { "username": "mongo-bootstrap" },
        );
        assert_eq!(model.fields.get_i32("version")?, 1);
        Ok(())
    }
}
