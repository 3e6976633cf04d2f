//! Record sources a synchronizer can poll.

use std::future::Future;
use std::marker::PhantomData;

use rota_client::{ApiError, RotaClient};
use rota_core::{DateRange, EntityKind};
use serde::de::DeserializeOwned;

/// One entity type's read endpoint.
pub trait Feed: Send + Sync + 'static {
    type Record: Send + Sync + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    fn kind(&self) -> EntityKind;

    /// Fetches the full record set for `range`.
    ///
    /// The returned future may be dropped at any await point when the fetch
    /// is superseded.
    fn fetch(
        &self,
        range: DateRange,
    ) -> impl Future<Output = Result<Vec<Self::Record>, Self::Error>> + Send;
}

/// A feed backed by the rota HTTP API.
pub struct HttpFeed<T> {
    client: RotaClient,
    kind: EntityKind,
    _record: PhantomData<fn() -> T>,
}

impl<T> HttpFeed<T> {
    pub const fn new(client: RotaClient, kind: EntityKind) -> Self {
        Self {
            client,
            kind,
            _record: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for HttpFeed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFeed")
            .field("kind", &self.kind)
            .field("client", &self.client)
            .finish()
    }
}

impl<T> Feed for HttpFeed<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    type Record = T;
    type Error = ApiError;

    fn kind(&self) -> EntityKind {
        self.kind
    }

    fn fetch(&self, range: DateRange) -> impl Future<Output = Result<Vec<T>, ApiError>> + Send {
        async move { self.client.fetch(self.kind, &range).await }
    }
}
