// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicI32, AtomicU32, Ordering},
        Arc,
    },
};

use chrono::Utc;

use crate::sync::*;
use crate::types::{DateTimeUtc, NodeId, StatusCode};

use super::{
    address_space::AddressSpace,
    constants,
    continuation_point::BrowseContinuationPoint,
    diagnostics::ServerDiagnostics,
    state::ServerState,
    subscriptions::publish_engine::PublishEngine,
};

lazy_static! {
    static ref NEXT_SESSION_ID: AtomicI32 = AtomicI32::new(1);
    static ref NEXT_AUTH_TOKEN: AtomicU32 = AtomicU32::new(1);
}

fn next_session_id() -> NodeId {
    // Session id will be a string identifier
    let session_id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
    NodeId::new(1, format!("Session-{}", session_id))
}

fn next_authentication_token() -> NodeId {
    // The authentication token is opaque to the client; a numeric in a private namespace
    let token = NEXT_AUTH_TOKEN.fetch_add(1, Ordering::Relaxed);
    NodeId::new(99, format!("AuthToken-{}", token))
}

/// The Session is any state maintained between the client and server
pub struct Session {
    /// The session identifier
    session_id: NodeId,
    /// Authentication token for the session, rotated on creation
    authentication_token: NodeId,
    /// Session name (supplied by client)
    session_name: String,
    /// Revised session timeout in ms
    session_timeout: f64,
    /// Indicates if the session has received an ActivateSession
    activated: bool,
    /// The id of the configured user the session activated as
    user_token_id: Option<String>,
    /// Flag indicating the session is terminated
    terminated: bool,
    /// Time that the session was terminated
    terminated_at: DateTimeUtc,
    /// The time the session was created, oldest-first eviction of unactivated sessions
    created_at: DateTimeUtc,
    /// Timestamp of the last service call made under this session
    last_service_request_timestamp: DateTimeUtc,
    /// Maximum number of continuation points
    max_browse_continuation_points: usize,
    /// Browse continuation points (oldest to newest)
    browse_continuation_points: VecDeque<BrowseContinuationPoint>,
    /// Ids for continuation points issued by this session
    continuation_point_ids: AtomicU32,
    /// Subscriptions / publish pairing for the session
    publish_engine: PublishEngine,
}

impl Session {
    pub fn new(server_state: &ServerState, session_name: String, session_timeout: f64) -> Session {
        let now = Utc::now();
        Session {
            session_id: next_session_id(),
            authentication_token: next_authentication_token(),
            session_name,
            session_timeout,
            activated: false,
            user_token_id: None,
            terminated: false,
            terminated_at: now,
            created_at: now,
            last_service_request_timestamp: now,
            max_browse_continuation_points: constants::MAX_BROWSE_CONTINUATION_POINTS,
            browse_continuation_points: VecDeque::with_capacity(
                constants::MAX_BROWSE_CONTINUATION_POINTS,
            ),
            continuation_point_ids: AtomicU32::new(1),
            publish_engine: PublishEngine::new(
                server_state.max_pending_publish_requests,
                constants::PUBLISH_REQUEST_TIMEOUT,
                server_state.diagnostics.clone(),
            ),
        }
    }

    pub fn session_id(&self) -> &NodeId {
        &self.session_id
    }

    pub fn authentication_token(&self) -> &NodeId {
        &self.authentication_token
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn session_timeout(&self) -> f64 {
        self.session_timeout
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    pub fn set_activated(&mut self, activated: bool) {
        self.activated = activated;
    }

    pub fn set_user_token_id(&mut self, user_token_id: Option<String>) {
        self.user_token_id = user_token_id;
    }

    pub fn user_token_id(&self) -> Option<&String> {
        self.user_token_id.as_ref()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn terminated_at(&self) -> DateTimeUtc {
        self.terminated_at
    }

    pub fn created_at(&self) -> DateTimeUtc {
        self.created_at
    }

    /// Terminates the session, tearing down its subscriptions and their monitored items.
    pub fn set_terminated(&mut self, status: StatusCode) {
        if self.terminated {
            return;
        }
        info!("Session {} is being terminated", self.session_id);
        self.terminated = true;
        self.terminated_at = Utc::now();
        self.activated = false;
        self.publish_engine.terminate_all(status);
    }

    pub fn last_service_request_timestamp(&self) -> DateTimeUtc {
        self.last_service_request_timestamp
    }

    pub fn set_last_service_request_timestamp(&mut self, timestamp: DateTimeUtc) {
        self.last_service_request_timestamp = timestamp;
    }

    /// Tests whether the session has gone without a service call for longer than its timeout.
    pub fn is_expired(&self, now: &DateTimeUtc) -> bool {
        let elapsed = now.signed_duration_since(self.last_service_request_timestamp);
        elapsed.num_milliseconds() as f64 > self.session_timeout
    }

    pub fn publish_engine(&self) -> &PublishEngine {
        &self.publish_engine
    }

    pub fn publish_engine_mut(&mut self) -> &mut PublishEngine {
        &mut self.publish_engine
    }

    /// Reset the lifetime counter on a subscription, e.g. because a service call referenced
    /// the subscription.
    pub(crate) fn reset_subscription_lifetime_counter(&mut self, subscription_id: u32) {
        if let Some(subscription) = self.publish_engine.get_mut(subscription_id) {
            subscription.reset_lifetime_counter();
        }
    }

    pub(crate) fn next_continuation_point_id(&self) -> Vec<u8> {
        let id = self.continuation_point_ids.fetch_add(1, Ordering::Relaxed);
        format!("cp-{}-{}", self.session_id, id).into_bytes()
    }

    pub(crate) fn add_browse_continuation_point(
        &mut self,
        continuation_point: BrowseContinuationPoint,
    ) -> Result<(), StatusCode> {
        if self.browse_continuation_points.len() >= self.max_browse_continuation_points {
            // The session has no room for further continuation points
            Err(StatusCode::BadNoContinuationPoints)
        } else {
            self.browse_continuation_points.push_back(continuation_point);
            Ok(())
        }
    }

    /// Finds and REMOVES a continuation point by id.
    pub(crate) fn find_browse_continuation_point(
        &mut self,
        id: &[u8],
    ) -> Option<BrowseContinuationPoint> {
        self.browse_continuation_points
            .iter()
            .position(|cp| cp.id == id)
            .and_then(|idx| self.browse_continuation_points.remove(idx))
    }

    pub(crate) fn remove_expired_browse_continuation_points(
        &mut self,
        address_space: &AddressSpace,
    ) {
        self.browse_continuation_points.retain(|continuation_point| {
            let valid = continuation_point.is_valid_browse_continuation_point(address_space);
            if !valid {
                debug!(
                    "Continuation point {:?} is no longer valid and will be removed",
                    continuation_point.id
                );
            }
            valid
        });
    }

    /// Remove all the specified continuation points by id
    pub(crate) fn remove_browse_continuation_points(&mut self, continuation_points: &[Vec<u8>]) {
        self.browse_continuation_points
            .retain(|cp| !continuation_points.iter().any(|id| *id == cp.id));
    }
}

/// The outcome of asking the session manager to admit another session.
pub(crate) enum SessionAdmission {
    /// There is room
    Admit,
    /// There was no room, but an unactivated session was evicted to make some
    AdmitAfterEviction,
    /// The server is full of activated sessions
    Reject,
}

/// Owns the sessions of the server: admission against the session limit (evicting unactivated
/// sessions first), lookup by id or authentication token, and the expiry sweep.
pub struct SessionManager {
    pub sessions: HashMap<NodeId, Arc<RwLock<Session>>>,
    diagnostics: Arc<RwLock<ServerDiagnostics>>,
    max_sessions: usize,
}

impl SessionManager {
    pub fn new(server_state: &ServerState) -> SessionManager {
        SessionManager {
            sessions: HashMap::new(),
            diagnostics: server_state.diagnostics.clone(),
            max_sessions: server_state.max_sessions,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Find a session by its session id and return it.
    pub fn find_session_by_id(&self, session_id: &NodeId) -> Option<Arc<RwLock<Session>>> {
        self.sessions.get(session_id).cloned()
    }

    /// Finds the session by its authentication token and returns it. The authentication token
    /// can be renewed so it is not used as the key.
    pub fn find_session_by_token(
        &self,
        authentication_token: &NodeId,
    ) -> Option<Arc<RwLock<Session>>> {
        self.sessions
            .values()
            .find(|s| {
                let session = trace_read_lock!(s);
                session.authentication_token() == authentication_token
            })
            .cloned()
    }

    /// Decides whether another session may be created. At the limit, the oldest session that
    /// never activated is evicted to make room; a server full of activated sessions rejects.
    /// The count and the eviction happen under the manager's lock so concurrent creates
    /// cannot overshoot the limit.
    pub(crate) fn admit_session(&mut self) -> SessionAdmission {
        if self.max_sessions == 0 || self.sessions.len() < self.max_sessions {
            return SessionAdmission::Admit;
        }
        // Look for the oldest unactivated session
        let evictable = self
            .sessions
            .values()
            .filter(|s| !trace_read_lock!(s).is_activated())
            .min_by_key(|s| trace_read_lock!(s).created_at())
            .cloned();
        match evictable {
            Some(session) => {
                {
                    let mut session = trace_write_lock!(session);
                    warn!(
                        "Evicting unactivated session {} to make room for a new session",
                        session.session_id()
                    );
                    session.set_terminated(StatusCode::BadSessionClosed);
                }
                self.deregister_session(&session);
                SessionAdmission::AdmitAfterEviction
            }
            None => SessionAdmission::Reject,
        }
    }

    /// Registers the session in the map, counting it in the diagnostics.
    pub fn register_session(&mut self, session: Arc<RwLock<Session>>) {
        let session_id = {
            let session = trace_read_lock!(session);
            session.session_id().clone()
        };
        self.sessions.insert(session_id, session);
        trace_write_lock!(self.diagnostics).on_create_session();
    }

    /// Deregisters a session from the map, counting it out of the diagnostics.
    pub fn deregister_session(
        &mut self,
        session: &Arc<RwLock<Session>>,
    ) -> Option<Arc<RwLock<Session>>> {
        let session_id = {
            let session = trace_read_lock!(session);
            session.session_id().clone()
        };
        let result = self.sessions.remove(&session_id);
        if result.is_some() {
            trace_write_lock!(self.diagnostics).on_destroy_session();
            debug!(
                "deregister_session {}, new session count = {}",
                session_id,
                self.sessions.len()
            );
        }
        result
    }

    /// Closes sessions that have gone without a service call for longer than their timeout,
    /// tearing down everything they own. Returns the ids of the sessions that were closed.
    pub fn expire_sessions(&mut self, now: &DateTimeUtc) -> Vec<NodeId> {
        let expired: Vec<Arc<RwLock<Session>>> = self
            .sessions
            .values()
            .filter(|s| trace_read_lock!(s).is_expired(now))
            .cloned()
            .collect();
        let mut expired_ids = Vec::with_capacity(expired.len());
        for session in expired {
            let session_id = {
                let mut session = trace_write_lock!(session);
                warn!("Session {} has timed out and will be closed", session.session_id());
                session.set_terminated(StatusCode::BadTimeout);
                session.session_id().clone()
            };
            self.deregister_session(&session);
            trace_write_lock!(self.diagnostics).on_session_timeout();
            expired_ids.push(session_id);
        }
        expired_ids
    }

    /// Puts all sessions into a terminated state and clears the map.
    pub fn clear(&mut self) {
        let mut diagnostics = trace_write_lock!(self.diagnostics);
        for (_, session) in self.sessions.drain() {
            let mut session = trace_write_lock!(session);
            session.set_terminated(StatusCode::BadSessionClosed);
            diagnostics.on_destroy_session();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::server::config::ServerConfig;

    use super::*;

    fn test_state(max_sessions: usize) -> ServerState {
        let mut config = ServerConfig::default();
        config.limits.max_sessions = max_sessions;
        ServerState::new(config)
    }

    fn new_session(state: &ServerState) -> Arc<RwLock<Session>> {
        Arc::new(RwLock::new(Session::new(
            state,
            "test".to_string(),
            10_000.0,
        )))
    }

    #[test]
    fn session_ids_and_tokens_are_unique() {
        let state = test_state(10);
        let s1 = Session::new(&state, "a".to_string(), 1000.0);
        let s2 = Session::new(&state, "b".to_string(), 1000.0);
        assert_ne!(s1.session_id(), s2.session_id());
        assert_ne!(s1.authentication_token(), s2.authentication_token());
    }

    #[test]
    fn admission_evicts_oldest_unactivated() {
        let state = test_state(1);
        let mut manager = SessionManager::new(&state);
        assert!(matches!(manager.admit_session(), SessionAdmission::Admit));
        let s1 = new_session(&state);
        manager.register_session(s1.clone());

        // s1 is unactivated so the second session evicts it
        assert!(matches!(
            manager.admit_session(),
            SessionAdmission::AdmitAfterEviction
        ));
        assert!(trace_read_lock!(s1).is_terminated());
        assert_eq!(manager.len(), 0);

        // An activated session is not evictable
        let s2 = new_session(&state);
        trace_write_lock!(s2).set_activated(true);
        manager.register_session(s2);
        assert!(matches!(manager.admit_session(), SessionAdmission::Reject));
    }

    #[test]
    fn expiry_closes_idle_sessions() {
        let state = test_state(10);
        let mut manager = SessionManager::new(&state);
        let session = new_session(&state);
        manager.register_session(session.clone());

        let now = Utc::now();
        assert!(manager.expire_sessions(&now).is_empty());
        // A service call keeps it alive past the timeout horizon
        trace_write_lock!(session).set_last_service_request_timestamp(now);
        let later = now + chrono::Duration::milliseconds(9_000);
        assert!(manager.expire_sessions(&later).is_empty());
        // Silence beyond the timeout closes it
        let later = now + chrono::Duration::milliseconds(11_000);
        let expired = manager.expire_sessions(&later);
        assert_eq!(expired.len(), 1);
        assert!(trace_read_lock!(session).is_terminated());
        assert_eq!(manager.len(), 0);
        let diagnostics = state.diagnostics.clone();
        assert_eq!(
            trace_read_lock!(diagnostics)
                .server_diagnostics_summary()
                .session_timeout_count,
            1
        );
    }

    #[test]
    fn find_by_token() {
        let state = test_state(10);
        let mut manager = SessionManager::new(&state);
        let session = new_session(&state);
        let token = trace_read_lock!(session).authentication_token().clone();
        manager.register_session(session);
        assert!(manager.find_session_by_token(&token).is_some());
        assert!(manager
            .find_session_by_token(&NodeId::new(99, "AuthToken-Bogus"))
            .is_none());
    }
}
