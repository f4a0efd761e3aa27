//! Client-side auth-state context
//!
//! Mirrors the provider's auth-event stream into UI-visible state.
//! The context is an explicitly-owned object handed to the components
//! that need it; there is no hidden global. Its one invariant: the
//! exposed user always equals the last event's payload.
//!
//! State transitions are driven exclusively by events. `sign_out` asks
//! the provider to revoke the session and then waits for the resulting
//! `SignedOut` event to flow back through the subscription, rather than
//! flipping state on the call's return.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use super::events::{EventHub, EventSubscription};
use crate::error::AppError;
use crate::provider::{AuthEvent, Provider, Session, User};

/// Auth state as seen by the UI.
#[derive(Debug, Clone)]
pub enum AuthState {
    /// The current session is still being resolved.
    Loading,
    Authenticated { user: User, session: Session },
    Unauthenticated,
}

/// Point-in-time view handed to UI consumers.
#[derive(Debug, Clone)]
pub struct AuthSnapshot {
    pub user: Option<User>,
    pub session: Option<Session>,
    pub loading: bool,
}

impl From<&AuthState> for AuthSnapshot {
    fn from(state: &AuthState) -> Self {
        match state {
            AuthState::Loading => Self {
                user: None,
                session: None,
                loading: true,
            },
            AuthState::Authenticated { user, session } => Self {
                user: Some(user.clone()),
                session: Some(session.clone()),
                loading: false,
            },
            AuthState::Unauthenticated => Self {
                user: None,
                session: None,
                loading: false,
            },
        }
    }
}

/// Event-driven mirror of the provider's auth state.
pub struct AuthContext {
    provider: Arc<dyn Provider>,
    hub: EventHub,
    state: watch::Receiver<AuthState>,
    task: JoinHandle<()>,
}

impl AuthContext {
    /// Attach a context to the event stream.
    ///
    /// Starts in `Loading`; the listener task validates any stored
    /// session against the provider, emits `InitialSession`, and then
    /// mirrors events for the context's lifetime. The subscription ends
    /// when the context is dropped.
    pub fn attach(
        provider: Arc<dyn Provider>,
        hub: &EventHub,
        stored_session: Option<Session>,
    ) -> Self {
        let (tx, rx) = watch::channel(AuthState::Loading);
        let subscription = hub.subscribe();
        let task = tokio::spawn(run(
            provider.clone(),
            hub.clone(),
            subscription,
            tx,
            stored_session,
        ));

        Self {
            provider,
            hub: hub.clone(),
            state: rx,
            task,
        }
    }

    /// Current `{user, session, loading}` view.
    pub fn snapshot(&self) -> AuthSnapshot {
        AuthSnapshot::from(&*self.state.borrow())
    }

    /// Watch handle for consumers that need change notifications.
    ///
    /// Once the context is dropped, `changed()` on the handle errors
    /// instead of yielding stale state.
    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.clone()
    }

    /// Revoke the current session at the provider.
    ///
    /// The transition to `Unauthenticated` arrives via the subsequent
    /// `SignedOut` event, not this call's return. Failures are reported
    /// to the caller for a transient notification and leave the
    /// mirrored state untouched.
    pub async fn sign_out(&self) -> Result<(), AppError> {
        let access_token = match &*self.state.borrow() {
            AuthState::Authenticated { session, .. } => Some(session.access_token.clone()),
            _ => None,
        };

        if let Some(token) = access_token {
            if let Err(error) = self.provider.sign_out(&token).await {
                warn!(%error, "Sign out failed");
                return Err(error);
            }
        }

        crate::metrics::SIGN_OUTS_TOTAL.inc();
        self.hub.emit(AuthEvent::SignedOut);
        Ok(())
    }
}

impl Drop for AuthContext {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    provider: Arc<dyn Provider>,
    hub: EventHub,
    mut subscription: EventSubscription,
    tx: watch::Sender<AuthState>,
    stored_session: Option<Session>,
) {
    // Resolve the initial session through the provider, then announce
    // it as an event so every context observes the same stream.
    let initial = match stored_session {
        Some(session) => match provider.get_user(&session.access_token).await {
            Ok(Some(user)) => Some(Session { user, ..session }),
            Ok(None) => None,
            Err(error) => {
                warn!(%error, "Failed to resolve initial session");
                None
            }
        },
        None => None,
    };
    hub.emit(AuthEvent::InitialSession(initial));

    while let Some(event) = subscription.next().await {
        tx.send_modify(|state| apply(state, event));
    }
}

/// The whole state machine: last event wins.
fn apply(state: &mut AuthState, event: AuthEvent) {
    match event {
        AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => {
            *state = AuthState::Authenticated {
                user: session.user.clone(),
                session,
            };
        }
        AuthEvent::InitialSession(Some(session)) => {
            *state = AuthState::Authenticated {
                user: session.user.clone(),
                session,
            };
        }
        AuthEvent::InitialSession(None) | AuthEvent::SignedOut => {
            *state = AuthState::Unauthenticated;
        }
        AuthEvent::UserUpdated(user) => {
            // Payload-only update; an unauthenticated context has no
            // payload to update.
            if let AuthState::Authenticated { user: current, .. } = state {
                *current = user;
            }
        }
    }
}
