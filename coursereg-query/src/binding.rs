use std::cell::RefCell;
use std::fmt::Display;
use std::marker::PhantomData;
use std::rc::Rc;

use http::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use coursereg_client::{ApiPathBuilder, Error, HttpApiClient};

use crate::cache::QueryCache;
use crate::key::{ListParams, ResourceKey};
use crate::state::{MutationState, QueryState};

/// Settings shared by all bindings of a [`QueryClient`].
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct QueryOptions {
    /// Prepended to every resource path, e.g. `/api`.
    pub api_prefix: String,

    /// Page size used for list queries which do not set `per_page` themselves.
    pub per_page: Option<u32>,
}

/// Describes a remote collection.
pub struct ResourceDescriptor<T> {
    path: String,
    name: String,
    related: Vec<String>,
    id: Rc<dyn Fn(&T) -> String>,
}

impl<T> Clone for ResourceDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            name: self.name.clone(),
            related: self.related.clone(),
            id: Rc::clone(&self.id),
        }
    }
}

impl<T> ResourceDescriptor<T> {
    /// A collection at `path` whose entities are identified by `id`.
    ///
    /// The cache name defaults to the last component of the path, so `/courses` is cached as
    /// `courses`.
    pub fn new<I, F>(path: impl Into<String>, id: F) -> Self
    where
        I: Display,
        F: Fn(&T) -> I + 'static,
    {
        let path = path.into();
        let name = path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();

        Self {
            path,
            name,
            related: Vec::new(),
            id: Rc::new(move |row| id(row).to_string()),
        }
    }

    /// Use a different cache name, e.g. `my-courses` for `/enrollments/my-courses`.
    pub fn cache_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Also invalidate `name` after a successful mutation of this resource.
    pub fn invalidates(mut self, name: impl Into<String>) -> Self {
        self.related.push(name.into());
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn related(&self) -> &[String] {
        &self.related
    }

    pub fn id_of(&self, row: &T) -> String {
        (self.id)(row)
    }
}

struct Inner<C> {
    http: C,
    cache: RefCell<QueryCache>,
    options: QueryOptions,
}

/// Owns the query cache and the backend client all bindings share.
pub struct QueryClient<C> {
    inner: Rc<Inner<C>>,
}

impl<C> Clone for QueryClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<C: HttpApiClient> QueryClient<C> {
    pub fn new(http: C) -> Self {
        Self::with_options(http, QueryOptions::default())
    }

    pub fn with_options(http: C, options: QueryOptions) -> Self {
        Self {
            inner: Rc::new(Inner {
                http,
                cache: RefCell::new(QueryCache::new()),
                options,
            }),
        }
    }

    pub fn options(&self) -> &QueryOptions {
        &self.inner.options
    }

    /// Bind a remote collection.
    pub fn bind<T>(&self, descriptor: ResourceDescriptor<T>) -> ResourceBinding<C, T> {
        ResourceBinding {
            client: self.clone(),
            descriptor,
            _row: PhantomData,
        }
    }

    /// Mark every cached query under `name` as stale.
    pub fn invalidate(&self, name: &str) -> usize {
        self.inner.cache.borrow_mut().invalidate(name)
    }

    /// The current state of `key` without any I/O.
    pub fn read<T: DeserializeOwned>(&self, key: &ResourceKey) -> QueryState<T> {
        self.inner.cache.borrow().get(key).decode()
    }

    pub fn is_fresh(&self, key: &ResourceKey) -> bool {
        self.inner.cache.borrow().is_fresh(key)
    }

    pub fn is_fetching(&self, key: &ResourceKey) -> bool {
        self.inner.cache.borrow().is_fetching(key)
    }
}

/// Uniform list/create/update/delete access to one remote collection.
///
/// Mutations never fail: they resolve to a [`MutationState`] carrying either the response or
/// the error. A successful mutation invalidates the resource's cached lists (and those of its
/// related cache names) instead of patching them.
pub struct ResourceBinding<C, T> {
    client: QueryClient<C>,
    descriptor: ResourceDescriptor<T>,
    _row: PhantomData<fn() -> T>,
}

impl<C, T> Clone for ResourceBinding<C, T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            descriptor: self.descriptor.clone(),
            _row: PhantomData,
        }
    }
}

impl<C, T> ResourceBinding<C, T>
where
    C: HttpApiClient,
    T: Serialize + DeserializeOwned,
{
    pub fn descriptor(&self) -> &ResourceDescriptor<T> {
        &self.descriptor
    }

    pub fn client(&self) -> &QueryClient<C> {
        &self.client
    }

    /// The cache key for `params`, including the configured default page size.
    pub fn key(&self, params: &ListParams) -> ResourceKey {
        let mut params = params.clone();
        if let Some(per_page) = self.client.inner.options.per_page {
            if !params.contains("per_page") {
                params = params.per_page(per_page);
            }
        }
        ResourceKey::new(self.descriptor.name(), params)
    }

    /// Fetch the list, served from the cache if the cached entry is still fresh.
    pub async fn fetch_list(&self, params: &ListParams) -> QueryState<T> {
        let key = self.key(params);
        let fresh = self.client.inner.cache.borrow().get_fresh(&key);
        match fresh {
            Some(state) => state.decode(),
            None => self.load(key).await,
        }
    }

    /// Fetch the list from the backend, even if the cached entry is fresh.
    pub async fn refetch(&self, params: &ListParams) -> QueryState<T> {
        self.load(self.key(params)).await
    }

    /// The cached state for `params` without any I/O.
    pub fn read(&self, params: &ListParams) -> QueryState<T> {
        self.client.read(&self.key(params))
    }

    async fn load(&self, key: ResourceKey) -> QueryState<T> {
        let ticket = self.client.inner.cache.borrow_mut().begin_fetch(&key);
        let path = ApiPathBuilder::new(self.base_path())
            .args(key.params().iter())
            .build();
        log::debug!("GET {path} for {key} (#{})", ticket.seq());

        let result = match self.client.inner.http.get(&path).await {
            Ok(response) => response.expect_list::<T>().and_then(|rows| {
                rows.iter()
                    .map(serde_json::to_value)
                    .collect::<Result<Vec<Value>, _>>()
                    .map_err(|err| Error::bad_api("failed to store api response", err))
            }),
            Err(err) => Err(err),
        };

        self.client
            .inner
            .cache
            .borrow_mut()
            .complete_fetch(ticket, result);
        self.client.read(&key)
    }

    /// `POST` a new entity.
    pub async fn create<P>(&self, payload: &P) -> MutationState
    where
        P: Serialize + ?Sized,
    {
        let path = self.base_path();
        self.mutate(Method::POST, path, Some(payload)).await
    }

    /// `PUT` a (partial) update of entity `id`.
    pub async fn update<P>(&self, id: impl Display, payload: &P) -> MutationState
    where
        P: Serialize + ?Sized,
    {
        let path = ApiPathBuilder::new(self.base_path()).segment(id).build();
        self.mutate(Method::PUT, path, Some(payload)).await
    }

    /// [`update`](Self::update) the entity shown in `row`.
    pub async fn update_row<P>(&self, row: &T, payload: &P) -> MutationState
    where
        P: Serialize + ?Sized,
    {
        self.update(self.descriptor.id_of(row), payload).await
    }

    /// `DELETE` entity `id`.
    pub async fn remove(&self, id: impl Display) -> MutationState {
        let path = ApiPathBuilder::new(self.base_path()).segment(id).build();
        self.mutate::<()>(Method::DELETE, path, None).await
    }

    /// [`remove`](Self::remove) the entity shown in `row`.
    pub async fn remove_row(&self, row: &T) -> MutationState {
        self.remove(self.descriptor.id_of(row)).await
    }

    /// A custom action below the resource path, such as `POST /courses/{id}/enroll`.
    ///
    /// Invalidates like any other mutation.
    pub async fn invoke<P>(
        &self,
        method: Method,
        sub_path: &str,
        payload: Option<&P>,
    ) -> MutationState
    where
        P: Serialize + ?Sized,
    {
        let path = ApiPathBuilder::new(self.base_path())
            .sub_path(sub_path)
            .build();
        self.mutate(method, path, payload).await
    }

    fn base_path(&self) -> String {
        format!(
            "{}{}",
            self.client.inner.options.api_prefix,
            self.descriptor.path()
        )
    }

    async fn mutate<P>(&self, method: Method, path: String, payload: Option<&P>) -> MutationState
    where
        P: Serialize + ?Sized,
    {
        log::debug!("{method} {path}");
        let result = match self
            .client
            .inner
            .http
            .request(method.clone(), &path, payload)
            .await
        {
            Ok(response) => response.expect_success(),
            Err(err) => Err(err),
        };

        match result {
            Ok(value) => {
                self.invalidate_all();
                MutationState::Success(value)
            }
            Err(err) => {
                log::error!("{method} {path} failed: {err}");
                MutationState::Error(err)
            }
        }
    }

    fn invalidate_all(&self) {
        let mut cache = self.client.inner.cache.borrow_mut();
        cache.invalidate(self.descriptor.name());
        for name in self.descriptor.related() {
            cache.invalidate(name);
        }
    }
}
