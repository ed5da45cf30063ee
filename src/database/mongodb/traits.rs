use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::{Client, Collection, Database, IndexModel};

use crate::database::mongodb::errors::ServerError;
use crate::database::mongodb::Outcome;
use crate::plan::IndexSpec;
use crate::prelude::*;

pub trait TypedDocument: 'static + Sized + Send + Sync {
    const DATABASE: &'static str;
    const NAME: &'static str;

    #[inline]
    fn database(in_: &Client) -> Database {
        in_.database(Self::DATABASE)
    }

    #[inline]
    fn collection(in_: &Client) -> Collection<Self> {
        Self::database(in_).collection(Self::NAME)
    }

    fn namespace() -> String {
        format!("{}.{}", Self::DATABASE, Self::NAME)
    }
}

#[async_trait]
pub trait EnsureCollection: TypedDocument {
    #[instrument(skip_all, fields(namespace = %Self::namespace()))]
    async fn exists(in_: &Client) -> Result<bool> {
        let names = Self::database(in_)
            .list_collection_names(doc! { "name": Self::NAME })
            .await
            .with_context(|| format!("failed to list the collections in `{}`", Self::DATABASE))?;
        Ok(names.iter().any(|name| name == Self::NAME))
    }

    /// Creates the collection unless it exists.
    #[instrument(skip_all, fields(namespace = %Self::namespace()))]
    async fn ensure_collection(in_: &Client) -> Result<Outcome> {
        if Self::exists(in_).await? {
            return Ok(Outcome::AlreadyPresent);
        }
        debug!("creating…");
        match Self::database(in_).create_collection(Self::NAME, None).await {
            Ok(()) => Ok(Outcome::Created),
            // Created concurrently since listed.
            Err(error) if ServerError::of(&error) == Some(ServerError::NamespaceExists) => {
                Ok(Outcome::AlreadyPresent)
            }
            Err(error) => {
                Err(error).with_context(|| format!("failed to create `{}`", Self::namespace()))
            }
        }
    }
}

impl<T: TypedDocument> EnsureCollection for T {}

#[async_trait]
pub trait Indexes: TypedDocument {
    fn indexes() -> Vec<IndexSpec>;

    #[instrument(skip_all, fields(namespace = %Self::namespace()))]
    async fn list_indexes(in_: &Client) -> Result<Vec<IndexModel>> {
        Self::collection(in_)
            .list_indexes(None)
            .await
            .with_context(|| format!("failed to list the indexes of `{}`", Self::namespace()))?
            .try_collect()
            .await
            .with_context(|| format!("failed to read the indexes of `{}`", Self::namespace()))
    }

    /// Creates the missing indexes. An existing index on the same key with
    /// different options is a fatal conflict, it is never rebuilt.
    #[instrument(skip_all, fields(namespace = %Self::namespace()))]
    async fn ensure_indexes(in_: &Client) -> Result<Vec<(IndexSpec, Outcome)>> {
        let existing = Self::list_indexes(in_).await?;
        let mut outcomes = Vec::new();

        for spec in Self::indexes() {
            let outcome = match spec.find_in(&existing) {
                Some(model) if spec.has_same_options(model) => Outcome::AlreadyPresent,
                Some(model) => {
                    bail!(
                        "index conflict in `{}`: expected {}, found {:?}",
                        Self::namespace(),
                        spec,
                        model.options,
                    );
                }
                None => {
                    Self::create_index(in_, &spec).await?;
                    Outcome::Created
                }
            };
            debug!(index = %spec, %outcome);
            outcomes.push((spec, outcome));
        }

        Ok(outcomes)
    }

    async fn create_index(in_: &Client, spec: &IndexSpec) -> Result {
        let start_instant = Instant::now();
        match Self::collection(in_).create_index(spec.to_model(), None).await {
            Ok(_) => {
                debug!(index = %spec, elapsed = format_elapsed(start_instant).as_str(), "created");
                Ok(())
            }
            Err(error) if ServerError::of(&error).map_or(false, ServerError::is_index_conflict) => {
                Err(error).with_context(|| {
                    format!("index conflict in `{}`: {}", Self::namespace(), spec.name())
                })
            }
            Err(error) => Err(error).with_context(|| {
                format!("failed to create `{}` in `{}`", spec.name(), Self::namespace())
            }),
        }
    }
}
