//! Provisioning plan: the literal objects to create and the order to create them in.

use std::fmt::{Debug, Display, Formatter};
use std::iter::once;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use mongodb::bson::{Bson, Document};
use mongodb::options::IndexOptions;
use mongodb::IndexModel;
use serde::{Deserialize, Serialize};

use crate::database::mongodb::traits::Indexes;

/// Single-field ascending index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub field: &'static str,

    /// Non-blocking build. Only affects how the index is built,
    /// so it is not compared against existing indexes.
    pub background: bool,

    pub sparse: bool,
    pub unique: bool,
}

impl IndexSpec {
    /// Non-sparse, non-unique index built in background.
    pub const fn background(field: &'static str) -> Self {
        Self {
            field,
            background: true,
            sparse: false,
            unique: false,
        }
    }

    /// Engine's default name for a single-field ascending index.
    pub fn name(&self) -> String {
        format!("{}_1", self.field)
    }

    pub fn keys(&self) -> Document {
        let mut keys = Document::new();
        keys.insert(self.field, 1_i32);
        keys
    }

    pub fn to_model(&self) -> IndexModel {
        IndexModel::builder()
            .keys(self.keys())
            .options(
                IndexOptions::builder()
                    .background(self.background)
                    .sparse(self.sparse)
                    .unique(self.unique)
                    .build(),
            )
            .build()
    }

    /// Tells whether the existing index is keyed on the same single field, ascending.
    pub fn has_same_keys(&self, existing: &IndexModel) -> bool {
        existing.keys.len() == 1
            && existing
                .keys
                .get(self.field)
                .map_or(false, is_ascending_direction)
    }

    /// Tells whether the existing index has the same options.
    pub fn has_same_options(&self, existing: &IndexModel) -> bool {
        let options = existing.options.as_ref();
        let sparse = options.and_then(|options| options.sparse).unwrap_or(false);
        let unique = options.and_then(|options| options.unique).unwrap_or(false);
        sparse == self.sparse && unique == self.unique
    }

    pub fn find_in<'a>(&self, existing: &'a [IndexModel]) -> Option<&'a IndexModel> {
        existing.iter().find(|model| self.has_same_keys(model))
    }
}

impl Display for IndexSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ {}: 1 }} (background: {}, sparse: {}, unique: {})",
            self.field, self.background, self.sparse, self.unique,
        )
    }
}

/// Tells whether the index is the default one on `_id`.
pub fn is_primary_key(model: &IndexModel) -> bool {
    let is_named_primary = model
        .options
        .as_ref()
        .and_then(|options| options.name.as_deref())
        .map_or(false, |name| name == "_id_");
    let is_keyed_primary = model.keys.len() == 1
        && model.keys.get("_id").map_or(false, is_ascending_direction);
    is_named_primary || is_keyed_primary
}

/// Index key directions come back as doubles when created from the shell.
fn is_ascending_direction(direction: &Bson) -> bool {
    match direction {
        Bson::Int32(direction) => *direction == 1,
        Bson::Int64(direction) => *direction == 1,
        Bson::Double(direction) => (*direction - 1.0).abs() < f64::EPSILON,
        _ => false,
    }
}

/// Collection with its indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub database: &'static str,
    pub name: &'static str,
    pub indexes: Vec<IndexSpec>,
}

impl CollectionSpec {
    pub fn of<T: Indexes>() -> Self {
        Self {
            database: T::DATABASE,
            name: T::NAME,
            indexes: T::indexes(),
        }
    }
}

impl Display for CollectionSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.database, self.name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoleGrant {
    pub role: String,

    #[serde(rename = "db")]
    pub database: String,
}

impl RoleGrant {
    pub fn new(role: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            database: database.into(),
        }
    }
}

impl Display for RoleGrant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.role, self.database)
    }
}

pub struct UserSpec {
    pub name: String,
    pub password: String,

    /// Database the user is defined in and authenticates against.
    pub auth_database: String,

    pub roles: Vec<RoleGrant>,
}

impl UserSpec {
    pub const NAME: &'static str = "mock";

    /// The service user: read-write access to the `Unit` database.
    pub fn mock(auth_database: String, password: String) -> Self {
        Self {
            name: Self::NAME.to_string(),
            password,
            auth_database,
            roles: vec![RoleGrant::new("readWrite", "Unit")],
        }
    }

    /// Compares role grants as sets.
    pub fn has_same_roles(&self, roles: &[RoleGrant]) -> bool {
        self.roles.iter().sorted().dedup().eq(roles.iter().sorted().dedup())
    }

    pub fn format_roles(roles: &[RoleGrant]) -> String {
        roles.iter().join(", ")
    }
}

impl Display for UserSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.auth_database)
    }
}

impl Debug for UserSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserSpec")
            .field("name", &self.name)
            .field("auth_database", &self.auth_database)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Step<'a> {
    CreateUser(&'a UserSpec),
    EnsureCollection(&'a CollectionSpec),
    EnsureIndexes(&'a CollectionSpec),
    Seed(&'a Path),
}

impl Display for Step<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::CreateUser(user) => write!(f, "create user `{}`", user),
            Step::EnsureCollection(collection) => write!(f, "ensure the collection `{}`", collection),
            Step::EnsureIndexes(collection) => write!(f, "ensure the indexes of `{}`", collection),
            Step::Seed(path) => write!(f, "seed from `{}`", path.display()),
        }
    }
}

pub struct Plan {
    pub user: UserSpec,
    pub collection: CollectionSpec,
    pub seeds: Vec<PathBuf>,
}

impl Plan {
    pub fn new(user: UserSpec, collection: CollectionSpec, seeds: Vec<PathBuf>) -> Self {
        Self {
            user,
            collection,
            seeds,
        }
    }

    /// The user goes first, then the collection with its indexes, then the seed data.
    pub fn steps(&self) -> impl Iterator<Item = Step<'_>> {
        once(Step::CreateUser(&self.user))
            .chain([
                Step::EnsureCollection(&self.collection),
                Step::EnsureIndexes(&self.collection),
            ])
            .chain(self.seeds.iter().map(|path| Step::Seed(path)))
    }
}
