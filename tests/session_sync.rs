//! End-to-end client-side scenario: two contexts (tabs) of one origin stay
//! in sync through the shared storage and the session hub, with no network
//! traffic from the observing context.

use aula::session::{
    AccessGate, ApiError, AuthApi, AuthorizationDecision, Credentials, LocalStorage, Navigator,
    Registration, Role, Route, SessionChanged, SessionController, SessionHub, SessionStore,
    client::{AuthPayload, UserPayload},
};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use uuid::Uuid;

struct FakeApi {
    payload: AuthPayload,
    calls: AtomicUsize,
}

impl FakeApi {
    fn new(role: &str) -> Self {
        Self {
            payload: AuthPayload {
                token: Some("signed.session.credential".to_string()),
                user: Some(UserPayload {
                    id: Uuid::new_v4(),
                    username: "stella".to_string(),
                    role: role.to_string(),
                    display_name: "Stella Maris".to_string(),
                    email: "stella@example.com".to_string(),
                }),
            },
            calls: AtomicUsize::new(0),
        }
    }
}

impl AuthApi for &FakeApi {
    async fn authenticate(&self, _: &Credentials) -> Result<AuthPayload, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.payload.clone())
    }

    async fn register(&self, _: &Registration) -> Result<AuthPayload, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.payload.clone())
    }
}

#[derive(Default)]
struct RecordingNavigator {
    routes: Mutex<Vec<Route>>,
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        self.routes.lock().unwrap().push(route);
    }
}

#[tokio::test]
async fn login_in_one_context_authorizes_gates_in_another() {
    let storage = LocalStorage::new();
    let hub = SessionHub::new();

    // Context B mounts a student gate first; nothing is stored yet.
    let bus_b = hub.context();
    let navigator = Arc::new(RecordingNavigator::default());
    let gate = AccessGate::mount(
        SessionStore::new(storage.clone()),
        &bus_b,
        Some(Role::Student),
        navigator.clone(),
    );
    assert_eq!(gate.decision(), AuthorizationDecision::Unauthorized);
    assert_eq!(*navigator.routes.lock().unwrap(), vec![Route::Login]);

    // Context A logs in.
    let api = FakeApi::new("student");
    let bus_a = hub.context();
    let controller = SessionController::new(&api, SessionStore::new(storage.clone()), bus_a);
    let login = controller
        .login(Credentials {
            username: "stella".to_string(),
            password: "correct horse".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(login.destination, Route::StudentDashboard);

    // The gate in context B re-resolved off the relayed signal, from the
    // shared storage, with zero network calls of its own.
    assert_eq!(gate.decision(), AuthorizationDecision::Authorized);
    assert!(gate.renders_protected());
    assert_eq!(api.calls.load(Ordering::SeqCst), 1);

    // Logout in context A locks context B out again.
    controller.logout();
    assert_eq!(gate.decision(), AuthorizationDecision::Unauthorized);
}

#[tokio::test]
async fn duplicate_delivery_is_idempotent_for_gates() {
    let storage = LocalStorage::new();
    let hub = SessionHub::new();

    let api = FakeApi::new("instructor");
    let bus = hub.context();
    let store = SessionStore::new(storage.clone());
    let controller = SessionController::new(&api, store.clone(), bus.clone());

    let gate = AccessGate::mount(
        store,
        &bus,
        Some(Role::Instructor),
        Arc::new(RecordingNavigator::default()),
    );

    controller
        .login(Credentials {
            username: "stella".to_string(),
            password: "correct horse".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(gate.decision(), AuthorizationDecision::Authorized);

    // At-least-once delivery: the same logical login may be signalled again.
    bus.publish(SessionChanged::LoggedIn);
    bus.publish(SessionChanged::Storage);
    assert_eq!(gate.decision(), AuthorizationDecision::Authorized);
}

#[tokio::test]
async fn role_mismatch_across_contexts_redirects_to_login() {
    let storage = LocalStorage::new();
    let hub = SessionHub::new();

    // An instructor-only gate in context B.
    let navigator = Arc::new(RecordingNavigator::default());
    let gate = AccessGate::mount(
        SessionStore::new(storage.clone()),
        &hub.context(),
        Some(Role::Instructor),
        navigator.clone(),
    );

    // A student logs in from context A.
    let api = FakeApi::new("student");
    let controller =
        SessionController::new(&api, SessionStore::new(storage.clone()), hub.context());
    controller
        .login(Credentials {
            username: "stella".to_string(),
            password: "correct horse".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(gate.decision(), AuthorizationDecision::Unauthorized);
    // Mount-time redirect plus the post-login one.
    assert_eq!(
        *navigator.routes.lock().unwrap(),
        vec![Route::Login, Route::Login]
    );
}
