//! Render gating for protected views.
//!
//! One [`AccessGate`] guards one mounted protected view. It resolves its
//! authorization from a fresh store read, re-resolves on every bus signal,
//! and sends the context to the login surface when the answer is no. The
//! gate is advisory (UX-only): the API re-checks every protected call.

use crate::session::{Navigator, Role, Route, SessionBus, SessionStore, Subscription};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Outcome of one gate evaluation. Ephemeral: recomputed from the store on
/// every resolution, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationDecision {
    Pending,
    Authorized,
    Unauthorized,
}

/// Gate instance for one mounted protected view.
pub struct AccessGate {
    store: SessionStore,
    required_role: Option<Role>,
    navigator: Arc<dyn Navigator>,
    decision: Mutex<AuthorizationDecision>,
    subscription: Mutex<Option<Subscription>>,
}

impl AccessGate {
    /// Mount a gate: subscribes to the bus and resolves immediately.
    ///
    /// The subscription lives as long as the gate; once the last `Arc` is
    /// dropped the listener degrades to a no-op.
    pub fn mount(
        store: SessionStore,
        bus: &SessionBus,
        required_role: Option<Role>,
        navigator: Arc<dyn Navigator>,
    ) -> Arc<Self> {
        let gate = Arc::new(Self {
            store,
            required_role,
            navigator,
            decision: Mutex::new(AuthorizationDecision::Pending),
            subscription: Mutex::new(None),
        });

        let weak = Arc::downgrade(&gate);
        // The event payload is ignored on purpose: the freshest store read
        // is the ground truth, not what the signal claims happened.
        let subscription = bus.subscribe(move |_event| {
            if let Some(gate) = weak.upgrade() {
                gate.resolve();
            }
        });

        *gate
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(subscription);

        gate.resolve();
        gate
    }

    /// Re-enter `Pending` and resolve from a fresh store read.
    fn resolve(&self) {
        self.set_decision(AuthorizationDecision::Pending);

        let decision = match self.store.read() {
            None => AuthorizationDecision::Unauthorized,
            Some(session) => match self.required_role {
                Some(required) if session.profile.role != required => {
                    debug!(
                        required = %required,
                        actual = %session.profile.role,
                        "session role does not match the required role"
                    );
                    AuthorizationDecision::Unauthorized
                }
                _ => AuthorizationDecision::Authorized,
            },
        };

        self.set_decision(decision);

        if decision == AuthorizationDecision::Unauthorized {
            self.navigator.navigate(Route::Login);
        }
    }

    fn set_decision(&self, decision: AuthorizationDecision) {
        *self
            .decision
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = decision;
    }

    #[must_use]
    pub fn decision(&self) -> AuthorizationDecision {
        *self
            .decision
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Protected content renders only while this is `true`.
    #[must_use]
    pub fn renders_protected(&self) -> bool {
        self.decision() == AuthorizationDecision::Authorized
    }
}
