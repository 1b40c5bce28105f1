use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::executor::{block_on, LocalPool};
use futures::task::LocalSpawnExt;
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use coursereg_client::{Error, ErrorKind, HttpApiClient, HttpApiResponse};
use coursereg_query::{
    ListParams, Mutation, MutationState, QueryClient, QueryOptions, QueryStatus, ResourceBinding,
    ResourceDescriptor,
};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
struct Course {
    course_id: u32,
    title: String,
}

type Reply = Result<HttpApiResponse, Error>;

enum Scripted {
    Ready(Reply),
    Deferred(oneshot::Receiver<Reply>),
}

struct Recorded {
    method: Method,
    path: String,
    body: Option<Value>,
}

/// Answers requests from a script and records them.
#[derive(Default)]
struct MockClient {
    script: RefCell<VecDeque<Scripted>>,
    requests: RefCell<Vec<Recorded>>,
}

impl MockClient {
    fn reply(&self, reply: Reply) {
        self.script.borrow_mut().push_back(Scripted::Ready(reply));
    }

    fn defer(&self) -> oneshot::Sender<Reply> {
        let (send, recv) = oneshot::channel();
        self.script.borrow_mut().push_back(Scripted::Deferred(recv));
        send
    }

    fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    fn last_request(&self) -> (Method, String, Option<Value>) {
        let requests = self.requests.borrow();
        let last = requests.last().expect("no request was made");
        (last.method.clone(), last.path.clone(), last.body.clone())
    }
}

impl HttpApiClient for MockClient {
    type ResponseFuture<'a>
        = Pin<Box<dyn Future<Output = Reply> + 'a>>
    where
        Self: 'a;

    fn request<'a, T>(
        &'a self,
        method: Method,
        path_and_query: &'a str,
        params: Option<T>,
    ) -> Self::ResponseFuture<'a>
    where
        T: Serialize + 'a,
    {
        self.requests.borrow_mut().push(Recorded {
            method,
            path: path_and_query.to_string(),
            body: params.map(|p| serde_json::to_value(p).unwrap()),
        });
        let scripted = self
            .script
            .borrow_mut()
            .pop_front()
            .expect("unexpected request");
        Box::pin(async move {
            match scripted {
                Scripted::Ready(reply) => reply,
                Scripted::Deferred(recv) => recv
                    .await
                    .unwrap_or_else(|_| Err(Error::network("request aborted"))),
            }
        })
    }
}

fn list(rows: Value) -> Reply {
    Ok(HttpApiResponse::json(200, &json!({ "data": rows })))
}

fn course(id: u32, title: &str) -> Value {
    json!({ "course_id": id, "title": title })
}

fn setup() -> (Rc<MockClient>, ResourceBinding<Rc<MockClient>, Course>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let http = Rc::new(MockClient::default());
    let client = QueryClient::new(Rc::clone(&http));
    let descriptor = ResourceDescriptor::new("/courses", |c: &Course| c.course_id);
    let courses = client.bind(descriptor);
    (http, courses)
}

#[test]
fn fresh_lists_are_served_from_cache() {
    let (http, courses) = setup();
    let params = ListParams::new().per_page(100);

    http.reply(list(json!([course(1, "Compilers")])));
    let state = block_on(courses.fetch_list(&params));
    assert_eq!(state.status, QueryStatus::Success);
    assert_eq!(state.rows()[0].title, "Compilers");
    assert_eq!(http.last_request().1, "/courses?per_page=100");

    let state = block_on(courses.fetch_list(&params));
    assert!(state.is_success());
    assert_eq!(http.request_count(), 1);

    // a different logical query is a different cache entry
    http.reply(list(json!([])));
    let state = block_on(courses.fetch_list(&params.clone().search("algebra")));
    assert!(state.rows().is_empty());
    assert_eq!(http.request_count(), 2);
    assert_eq!(
        http.last_request().1,
        "/courses?per_page=100&search=algebra"
    );
}

#[test]
fn successful_mutations_force_a_real_read() {
    let (http, courses) = setup();
    let params = ListParams::new();

    http.reply(list(json!([course(1, "Compilers")])));
    block_on(courses.fetch_list(&params));

    http.reply(Ok(HttpApiResponse::json(201, &course(2, "Databases"))));
    let payload = json!({ "title": "Databases", "code": "CS302" });
    let outcome = block_on(courses.create(&payload));
    assert!(outcome.is_success());
    assert_eq!(
        http.last_request(),
        (Method::POST, "/courses".to_string(), Some(payload))
    );

    // the list is not patched in place, the old read is still shown until re-fetched
    assert_eq!(courses.read(&params).rows().len(), 1);

    http.reply(list(json!([course(1, "Compilers"), course(2, "Databases")])));
    let state = block_on(courses.fetch_list(&params));
    assert_eq!(state.rows().len(), 2);
    assert_eq!(http.request_count(), 3);

    http.reply(Ok(HttpApiResponse::json(200, &course(2, "Databases II"))));
    let row = state.rows()[1].clone();
    let outcome = block_on(courses.update_row(&row, &json!({ "title": "Databases II" })));
    assert!(outcome.is_success());
    assert_eq!(http.last_request().1, "/courses/2");

    http.reply(list(json!([course(1, "Compilers"), course(2, "Databases II")])));
    block_on(courses.fetch_list(&params));
    assert_eq!(http.request_count(), 5);

    http.reply(Ok(HttpApiResponse::empty(204)));
    assert!(block_on(courses.remove(1)).is_success());
    assert_eq!(http.last_request().0, Method::DELETE);

    http.reply(list(json!([course(2, "Databases II")])));
    let state = block_on(courses.fetch_list(&params));
    assert_eq!(state.rows().len(), 1);
    assert_eq!(http.request_count(), 7);
}

#[test]
fn plain_text_success_bodies_still_invalidate() {
    let (http, courses) = setup();
    let params = ListParams::new();

    http.reply(list(json!([course(1, "Compilers"), course(2, "Databases")])));
    block_on(courses.fetch_list(&params));

    http.reply(Ok(HttpApiResponse {
        status: 200,
        content_type: Some("text/plain".to_string()),
        body: b"Deleted".to_vec(),
    }));
    let outcome = block_on(courses.remove(1));
    assert!(matches!(
        &outcome,
        MutationState::Success(Value::String(text)) if text == "Deleted"
    ));
    assert!(!courses.client().is_fresh(&courses.key(&params)));

    http.reply(list(json!([course(2, "Databases")])));
    let state = block_on(courses.fetch_list(&params));
    assert_eq!(state.rows().len(), 1);
    assert_eq!(http.request_count(), 3);
}

#[test]
fn failed_mutations_leave_the_cache_alone() {
    let (http, courses) = setup();
    let params = ListParams::new();

    http.reply(list(json!([course(1, "Compilers")])));
    block_on(courses.fetch_list(&params));

    http.reply(Ok(HttpApiResponse::json(
        422,
        &json!({
            "message": "The given data was invalid.",
            "errors": { "code": ["The code has already been taken."] },
        }),
    )));
    let outcome = block_on(courses.create(&json!({ "code": "CS101" })));
    assert_eq!(
        outcome.error().map(Error::kind),
        Some(ErrorKind::ValidationError)
    );
    assert_eq!(
        outcome.error_message().as_deref(),
        Some("The code has already been taken.")
    );

    http.reply(Ok(HttpApiResponse::empty(404)));
    let outcome = block_on(courses.update(99, &json!({ "title": "Ghost" })));
    assert_eq!(
        outcome.error_message().as_deref(),
        Some("The requested resource was not found.")
    );

    http.reply(Err(Error::network("connection reset")));
    let outcome = block_on(courses.remove(1));
    assert_eq!(
        outcome.error().map(Error::kind),
        Some(ErrorKind::NetworkFailure)
    );

    // still fresh, no re-fetch
    let state = block_on(courses.fetch_list(&params));
    assert_eq!(state.rows()[0].title, "Compilers");
    assert_eq!(http.request_count(), 4);
}

#[test]
fn stale_responses_never_overwrite_newer_ones() {
    let (http, courses) = setup();
    let params = ListParams::new().per_page(100);

    let first = http.defer();
    let second = http.defer();

    let mut pool = LocalPool::new();
    let spawner = pool.spawner();
    for _ in 0..2 {
        let courses = courses.clone();
        let params = params.clone();
        spawner
            .spawn_local(async move {
                courses.refetch(&params).await;
            })
            .unwrap();
    }
    pool.run_until_stalled();
    assert_eq!(http.request_count(), 2);
    assert!(courses.read(&params).is_loading());

    second.send(list(json!([course(2, "newer")]))).unwrap();
    pool.run_until_stalled();
    first.send(list(json!([course(1, "older")]))).unwrap();
    pool.run_until_stalled();

    let state = courses.read(&params);
    assert!(state.is_success());
    assert_eq!(state.rows()[0].title, "newer");
}

#[test]
fn failed_refetch_keeps_previous_rows() {
    let (http, courses) = setup();
    let params = ListParams::new();

    http.reply(list(json!([course(1, "Compilers")])));
    block_on(courses.fetch_list(&params));

    http.reply(Ok(HttpApiResponse::empty(500)));
    let state = block_on(courses.refetch(&params));
    assert_eq!(state.status, QueryStatus::Error);
    assert_eq!(
        state.error_message().as_deref(),
        Some("Server error. Please try again later.")
    );
    assert_eq!(state.rows()[0].course_id, 1);

    // errors are not cached as fresh data
    http.reply(list(json!([course(1, "Compilers")])));
    let state = block_on(courses.fetch_list(&params));
    assert!(state.is_success());
    assert!(state.error.is_none());
    assert_eq!(http.request_count(), 3);
}

#[test]
fn undecodable_rows_are_reported() {
    let (http, courses) = setup();
    http.reply(list(json!([{ "course_id": "one" }])));
    let state = block_on(courses.fetch_list(&ListParams::new()));
    assert!(state.is_error());
    assert_eq!(
        state.error.as_ref().map(Error::kind),
        Some(ErrorKind::Unknown)
    );
}

#[test]
fn related_caches_are_invalidated() {
    let _ = env_logger::builder().is_test(true).try_init();
    let http = Rc::new(MockClient::default());
    let client = QueryClient::with_options(
        Rc::clone(&http),
        QueryOptions {
            api_prefix: "/api".to_string(),
            per_page: Some(100),
        },
    );

    let descriptor = ResourceDescriptor::new("/courses", |c: &Course| c.course_id)
        .invalidates("my-courses");
    let catalog = client.bind(descriptor);
    let descriptor = ResourceDescriptor::new("/enrollments/my-courses", |c: &Course| c.course_id);
    let my_courses = client.bind(descriptor);
    let params = ListParams::new();

    http.reply(list(json!([course(1, "Compilers")])));
    block_on(my_courses.fetch_list(&params));
    assert_eq!(
        http.last_request().1,
        "/api/enrollments/my-courses?per_page=100"
    );
    assert!(client.is_fresh(&my_courses.key(&params)));

    let enrolled = json!({ "enrollment_id": 5 });
    http.reply(Ok(HttpApiResponse::json(201, &enrolled)));
    let outcome = block_on(catalog.invoke::<()>(Method::POST, "1/enroll", None));
    assert!(outcome.is_success());
    assert_eq!(
        http.last_request(),
        (Method::POST, "/api/courses/1/enroll".to_string(), None)
    );
    assert!(!client.is_fresh(&my_courses.key(&params)));

    // manual invalidation for caches the descriptor does not know about
    http.reply(list(json!([])));
    block_on(my_courses.fetch_list(&params));
    assert_eq!(client.invalidate("my-courses"), 1);
    assert_eq!(client.invalidate("account-profile"), 0);
}

#[test]
fn mutation_flags_follow_the_request() {
    let (http, courses) = setup();
    let reply = http.defer();

    let submit = Mutation::new();
    let mut pool = LocalPool::new();
    {
        let submit = submit.clone();
        let courses = courses.clone();
        pool.spawner()
            .spawn_local(async move {
                submit
                    .run(courses.create(&json!({ "title": "Networks" })))
                    .await;
            })
            .unwrap();
    }

    pool.run_until_stalled();
    assert!(submit.is_pending());

    reply
        .send(Ok(HttpApiResponse::json(201, &course(3, "Networks"))))
        .unwrap();
    pool.run_until_stalled();
    assert!(!submit.is_pending());
    assert!(submit.state().is_success());
}
