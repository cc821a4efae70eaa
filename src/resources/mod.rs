//! Resource lifecycle handlers.
//!
//! Each resource module declares a typed model, its [`Schema`] and the
//! create/read/update/delete handlers that translate between the model and
//! [`FlashArrayApi`] calls. [`DynamicResource`] erases the model type so the
//! provider can hold every resource in one registry and exchange JSON state.

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::backend::{ApiError, FlashArrayApi};
use crate::schema::Schema;

pub mod alert;
pub mod dns;
pub mod flasharray;
pub mod host;
pub mod hostgroup;
pub mod pgroup;
pub mod vgroup;
pub mod volume;

/// Future returned by lifecycle handlers.
pub type ResourceFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ResourceError>> + Send + 'a>>;

/// Errors raised by lifecycle handlers.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ResourceError {
    /// An array call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// Import named an object that does not exist.
    #[error("{kind} {id} does not exist")]
    NotFound {
        /// Resource type name.
        kind: &'static str,
        /// Requested identifier.
        id: String,
    },
    /// A volume update tried to reduce the size.
    #[error(
        "New size must be larger than current size. Truncating volumes not supported \
         (current {current}, requested {requested})"
    )]
    Shrink {
        /// Size on record, in bytes.
        current: u64,
        /// Requested size, in bytes.
        requested: u64,
    },
    /// Create was asked for an empty volume without a size.
    #[error("{kind}: {message}")]
    Invalid {
        /// Resource type name.
        kind: &'static str,
        /// What is missing or inconsistent.
        message: String,
    },
    /// State or configuration could not be converted to the resource model.
    #[error("failed to decode {kind} attributes: {message}")]
    Decode {
        /// Resource type name.
        kind: &'static str,
        /// Decoder message.
        message: String,
    },
    /// A handler failed after the array accepted at least one change.
    /// `record` is the state the array is known to hold.
    #[error("{source} ({kind} `{}` was left partially applied)", .record.id)]
    Partial {
        /// Resource type name.
        kind: &'static str,
        /// Last confirmed state record.
        record: Box<StateRecord>,
        /// Failure that stopped the handler.
        source: Box<ResourceError>,
    },
}

impl ResourceError {
    /// Attaches the last confirmed state to a failure. Errors that already
    /// carry a confirmed state are returned unchanged.
    #[must_use]
    pub fn after_change<M: Serialize>(self, kind: &'static str, confirmed: &Tracked<M>) -> Self {
        if matches!(self, Self::Partial { .. }) {
            return self;
        }
        let record = StateRecord {
            id: confirmed.id.clone(),
            attributes: serde_json::to_value(&confirmed.state).unwrap_or_default(),
        };
        Self::Partial {
            kind,
            record: Box::new(record),
            source: Box::new(self),
        }
    }

    /// State record the caller should keep after a partial failure.
    #[must_use]
    pub fn confirmed(&self) -> Option<&StateRecord> {
        match self {
            Self::Partial { record, .. } => Some(record),
            _ => None,
        }
    }
}

/// What the array has accepted while a multi-step handler runs.
#[derive(Debug)]
pub(crate) struct Progress<M> {
    kind: &'static str,
    confirmed: Tracked<M>,
    changed: bool,
}

impl<M: Serialize> Progress<M> {
    /// Starts from state the array already holds and nothing changed yet.
    pub(crate) const fn unchanged(kind: &'static str, start: Tracked<M>) -> Self {
        Self {
            kind,
            confirmed: start,
            changed: false,
        }
    }

    /// Starts right after the object was created.
    pub(crate) const fn created(kind: &'static str, start: Tracked<M>) -> Self {
        Self {
            kind,
            confirmed: start,
            changed: true,
        }
    }

    /// Last confirmed state.
    pub(crate) const fn current(&self) -> &Tracked<M> {
        &self.confirmed
    }

    /// Records a change the array accepted.
    pub(crate) fn accept(&mut self, apply: impl FnOnce(&mut Tracked<M>)) {
        apply(&mut self.confirmed);
        self.changed = true;
    }

    /// Passes success through; failures after an accepted change carry the
    /// confirmed state.
    pub(crate) fn settle(
        self,
        result: Result<Tracked<M>, ResourceError>,
    ) -> Result<Tracked<M>, ResourceError> {
        result.map_err(|err| {
            if self.changed {
                err.after_change(self.kind, &self.confirmed)
            } else {
                err
            }
        })
    }
}

/// Identifier and model of an object under management.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub struct Tracked<M> {
    /// Identifier recorded in state; usually the object name.
    pub id: String,
    /// Last known attributes.
    pub state: M,
}

impl<M> Tracked<M> {
    /// Pairs an identifier with a model.
    pub fn new(id: impl Into<String>, state: M) -> Self {
        Self {
            id: id.into(),
            state,
        }
    }
}

/// Typed lifecycle of one resource kind.
pub trait Resource: Send + Sync {
    /// Attribute model stored in state.
    type Model: Clone + Debug + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync;

    /// Terraform type name, e.g. `purefa_volume`.
    fn type_name(&self) -> &'static str;

    /// Attribute declarations.
    fn schema(&self) -> Schema;

    /// Creates the object described by `planned`.
    fn create<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        planned: &'a Self::Model,
    ) -> ResourceFuture<'a, Tracked<Self::Model>>;

    /// Refreshes `prior`; `None` means the object is gone.
    fn read<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a Tracked<Self::Model>,
    ) -> ResourceFuture<'a, Option<Tracked<Self::Model>>>;

    /// Moves the object from `prior` to `planned`.
    fn update<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a Tracked<Self::Model>,
        planned: &'a Self::Model,
    ) -> ResourceFuture<'a, Tracked<Self::Model>>;

    /// Removes the object.
    fn delete<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a Tracked<Self::Model>,
    ) -> ResourceFuture<'a, ()>;

    /// Adopts an existing object by identifier.
    fn import<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        id: &'a str,
    ) -> ResourceFuture<'a, Tracked<Self::Model>> {
        Box::pin(async move {
            let seed = Tracked::new(id, Self::Model::default());
            Resource::read(self, api, &seed)
                .await?
                .ok_or_else(|| ResourceError::NotFound {
                    kind: Resource::type_name(self),
                    id: id.to_owned(),
                })
        })
    }
}

/// Persisted state of one resource instance.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub struct StateRecord {
    /// Tracked identifier.
    pub id: String,
    /// Every schema attribute's last known value.
    pub attributes: Value,
}

/// Model-erased view of a [`Resource`] working on JSON attributes.
pub trait DynamicResource: Send + Sync {
    /// Terraform type name.
    fn type_name(&self) -> &'static str;

    /// Attribute declarations.
    fn schema(&self) -> Schema;

    /// Creates an object from planned attributes.
    fn create<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        planned: &'a Value,
    ) -> ResourceFuture<'a, StateRecord>;

    /// Refreshes a state record.
    fn read<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a StateRecord,
    ) -> ResourceFuture<'a, Option<StateRecord>>;

    /// Updates an object to planned attributes.
    fn update<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a StateRecord,
        planned: &'a Value,
    ) -> ResourceFuture<'a, StateRecord>;

    /// Removes an object.
    fn delete<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a StateRecord,
    ) -> ResourceFuture<'a, ()>;

    /// Adopts an existing object.
    fn import<'a>(&'a self, api: &'a dyn FlashArrayApi, id: &'a str)
    -> ResourceFuture<'a, StateRecord>;
}

fn decode<R: Resource + ?Sized>(resource: &R, value: &Value) -> Result<R::Model, ResourceError> {
    serde_json::from_value(value.clone()).map_err(|err| ResourceError::Decode {
        kind: Resource::type_name(resource),
        message: err.to_string(),
    })
}

fn decode_record<R: Resource + ?Sized>(
    resource: &R,
    record: &StateRecord,
) -> Result<Tracked<R::Model>, ResourceError> {
    Ok(Tracked::new(
        record.id.clone(),
        decode(resource, &record.attributes)?,
    ))
}

fn encode<R: Resource + ?Sized>(
    resource: &R,
    tracked: Tracked<R::Model>,
) -> Result<StateRecord, ResourceError> {
    let attributes = serde_json::to_value(&tracked.state).map_err(|err| ResourceError::Decode {
        kind: Resource::type_name(resource),
        message: err.to_string(),
    })?;
    Ok(StateRecord {
        id: tracked.id,
        attributes,
    })
}

impl<R: Resource> DynamicResource for R {
    fn type_name(&self) -> &'static str {
        Resource::type_name(self)
    }

    fn schema(&self) -> Schema {
        Resource::schema(self)
    }

    fn create<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        planned: &'a Value,
    ) -> ResourceFuture<'a, StateRecord> {
        Box::pin(async move {
            let model = decode(self, planned)?;
            let created = Resource::create(self, api, &model).await?;
            encode(self, created)
        })
    }

    fn read<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a StateRecord,
    ) -> ResourceFuture<'a, Option<StateRecord>> {
        Box::pin(async move {
            let tracked = decode_record(self, prior)?;
            match Resource::read(self, api, &tracked).await? {
                Some(current) => encode(self, current).map(Some),
                None => Ok(None),
            }
        })
    }

    fn update<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a StateRecord,
        planned: &'a Value,
    ) -> ResourceFuture<'a, StateRecord> {
        Box::pin(async move {
            let tracked = decode_record(self, prior)?;
            let model = decode(self, planned)?;
            let updated = Resource::update(self, api, &tracked, &model).await?;
            encode(self, updated)
        })
    }

    fn delete<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        prior: &'a StateRecord,
    ) -> ResourceFuture<'a, ()> {
        Box::pin(async move {
            let tracked = decode_record(self, prior)?;
            Resource::delete(self, api, &tracked).await
        })
    }

    fn import<'a>(
        &'a self,
        api: &'a dyn FlashArrayApi,
        id: &'a str,
    ) -> ResourceFuture<'a, StateRecord> {
        Box::pin(async move {
            let imported = Resource::import(self, api, id).await?;
            encode(self, imported)
        })
    }
}
