// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::sync::Arc;

use crate::sync::*;
use crate::types::{
    ActivateSessionRequest, ActivateSessionResponse, CloseSessionRequest, CloseSessionResponse,
    CreateSessionRequest, CreateSessionResponse, ResponseHeader, ServiceResult, StatusCode,
};

use crate::server::{
    identity,
    services::Service,
    session::{Session, SessionAdmission, SessionManager},
    state::ServerState,
};

/// The session service. Allows the client to create, activate and close an authenticated
/// session with the server.
pub(crate) struct SessionService;

impl Service for SessionService {
    fn name(&self) -> String {
        String::from("SessionService")
    }
}

impl SessionService {
    pub fn new() -> SessionService {
        SessionService {}
    }

    /// Creates a session. At the session limit the oldest unactivated session is evicted
    /// first; a server full of activated sessions rejects with `BadTooManySessions` and
    /// counts the rejection.
    pub fn create_session(
        &self,
        server_state: Arc<RwLock<ServerState>>,
        session_manager: Arc<RwLock<SessionManager>>,
        request: &CreateSessionRequest,
    ) -> ServiceResult<CreateSessionResponse> {
        debug!("Create session request {:?}", request);
        let server_state = trace_read_lock!(server_state);
        let mut session_manager = trace_write_lock!(session_manager);

        match session_manager.admit_session() {
            SessionAdmission::Admit | SessionAdmission::AdmitAfterEviction => {}
            SessionAdmission::Reject => {
                let mut diagnostics = trace_write_lock!(server_state.diagnostics);
                diagnostics.on_rejected_session();
                return Err(
                    self.service_fault(&request.request_header, StatusCode::BadTooManySessions)
                );
            }
        }

        let session_timeout = server_state.revise_session_timeout(request.requested_session_timeout);
        let session = Session::new(
            &server_state,
            request.session_name.clone(),
            session_timeout,
        );
        let session_id = session.session_id().clone();
        let authentication_token = session.authentication_token().clone();
        session_manager.register_session(Arc::new(RwLock::new(session)));

        Ok(CreateSessionResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            session_id,
            authentication_token,
            revised_session_timeout: session_timeout,
        })
    }

    /// Activates a session by binding an identity to it. Bad credentials are a security
    /// rejection and counted as such, unlike unknown-token failures.
    pub fn activate_session(
        &self,
        server_state: Arc<RwLock<ServerState>>,
        session: Arc<RwLock<Session>>,
        request: &ActivateSessionRequest,
    ) -> ServiceResult<ActivateSessionResponse> {
        let server_state = trace_read_lock!(server_state);
        let mut session = trace_write_lock!(session);

        let authenticated = {
            let config = trace_read_lock!(server_state.config);
            identity::authenticate_identity_token(&config, &request.user_identity_token)
        };
        match authenticated {
            Ok(user_token_id) => {
                session.set_activated(true);
                session.set_user_token_id(Some(user_token_id));
                Ok(ActivateSessionResponse {
                    response_header: ResponseHeader::new_good(&request.request_header),
                })
            }
            Err(status) => {
                session.set_activated(false);
                let mut diagnostics = trace_write_lock!(server_state.diagnostics);
                diagnostics.on_rejected_security_session();
                diagnostics.on_rejected_session();
                Err(self.service_fault(&request.request_header, status))
            }
        }
    }

    /// Closes the session the request's authentication token resolves to. Closing a session
    /// that never activated still closes it, but surfaces `BadSessionNotActivated` rather
    /// than succeeding silently; an unknown token is `BadSessionIdInvalid`.
    pub fn close_session(
        &self,
        session_manager: Arc<RwLock<SessionManager>>,
        request: &CloseSessionRequest,
    ) -> ServiceResult<CloseSessionResponse> {
        let session = {
            let session_manager = trace_read_lock!(session_manager);
            session_manager.find_session_by_token(&request.request_header.authentication_token)
        };
        let Some(session) = session else {
            return Err(
                self.service_fault(&request.request_header, StatusCode::BadSessionIdInvalid)
            );
        };
        let was_activated = {
            let session = trace_read_lock!(session);
            session.is_activated()
        };
        {
            let mut session = trace_write_lock!(session);
            session.set_terminated(StatusCode::BadSessionClosed);
        }
        {
            let mut session_manager = trace_write_lock!(session_manager);
            session_manager.deregister_session(&session);
        }
        if was_activated {
            Ok(CloseSessionResponse {
                response_header: ResponseHeader::new_good(&request.request_header),
            })
        } else {
            Err(self.service_fault(&request.request_header, StatusCode::BadSessionNotActivated))
        }
    }
}
