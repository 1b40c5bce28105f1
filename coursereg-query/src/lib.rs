//! Remote collection bindings with a shared, invalidation based query cache.
//!
//! A [`QueryClient`] owns the cache and the backend client. Screens [`bind`](QueryClient::bind)
//! a [`ResourceDescriptor`] to get a [`ResourceBinding`], fetch lists through it and run their
//! create/update/delete actions through it. Everything runs on a single thread: the types here
//! are neither `Send` nor `Sync`, and network calls are the only suspension points.
//!
//! ```no_run
//! # use coursereg_client::HttpApiClient;
//! # use coursereg_query::{ListParams, QueryClient, ResourceDescriptor};
//! # #[derive(serde::Serialize, serde::Deserialize)]
//! # struct Course { course_id: u32, title: String }
//! # async fn demo<C: HttpApiClient>(http: C) {
//! let client = QueryClient::new(http);
//! let courses = client.bind(ResourceDescriptor::new("/courses", |c: &Course| c.course_id));
//!
//! let params = ListParams::new().per_page(100);
//! let state = courses.fetch_list(&params).await;
//! if let Some(message) = state.error_message() {
//!     eprintln!("{message}");
//! }
//!
//! // the next fetch_list of any `courses` query goes to the backend again
//! let outcome = courses.update(1, &serde_json::json!({ "title": "Compilers II" })).await;
//! assert!(outcome.is_success() || outcome.is_error());
//! # }
//! ```

mod binding;
mod cache;
mod key;
mod state;

pub use binding::{QueryClient, QueryOptions, ResourceBinding, ResourceDescriptor};
pub use cache::{FetchTicket, QueryCache};
pub use key::{ListParams, ResourceKey};
pub use state::{Mutation, MutationState, QueryState, QueryStatus};
