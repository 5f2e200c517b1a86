// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The server facade. Owns the state, the address space and the session manager, validates
//! the session every request executes under, and dispatches to the service implementations.
//! The transport above hands typed requests in and takes typed responses (or faults) out.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;

use crate::sync::*;
use crate::types::*;

use super::{
    address_space::AddressSpace,
    config::ServerConfig,
    constants,
    services::{
        attribute::AttributeService, method::MethodService, monitored_item::MonitoredItemService,
        session::SessionService, subscription::SubscriptionService, view::ViewService,
    },
    session::{Session, SessionManager},
    state::ServerState,
    subscriptions::{subscription::TickReason, PublishResponseEntry},
    util::ScheduledTask,
};

pub struct Server {
    server_state: Arc<RwLock<ServerState>>,
    address_space: Arc<RwLock<AddressSpace>>,
    session_manager: Arc<RwLock<SessionManager>>,
    session_service: SessionService,
    subscription_service: SubscriptionService,
    monitored_item_service: MonitoredItemService,
    attribute_service: AttributeService,
    view_service: ViewService,
    method_service: MethodService,
}

impl Server {
    pub fn new(config: ServerConfig) -> Server {
        let server_state = ServerState::new(config);
        let session_manager = SessionManager::new(&server_state);
        let server = Server {
            server_state: Arc::new(RwLock::new(server_state)),
            address_space: Arc::new(RwLock::new(AddressSpace::new())),
            session_manager: Arc::new(RwLock::new(session_manager)),
            session_service: SessionService::new(),
            subscription_service: SubscriptionService::new(),
            monitored_item_service: MonitoredItemService::new(),
            attribute_service: AttributeService::new(),
            view_service: ViewService::new(),
            method_service: MethodService::new(),
        };
        server.sync_diagnostics();
        server
    }

    pub fn server_state(&self) -> Arc<RwLock<ServerState>> {
        self.server_state.clone()
    }

    pub fn address_space(&self) -> Arc<RwLock<AddressSpace>> {
        self.address_space.clone()
    }

    pub fn session_manager(&self) -> Arc<RwLock<SessionManager>> {
        self.session_manager.clone()
    }

    pub fn abort(&self) {
        trace_write_lock!(self.server_state).abort();
    }

    /// Resolves the session a request header refers to, refreshing its service-call clock. An
    /// unknown authentication token counts as a plain rejection (not a security rejection)
    /// and fails with `BadSessionIdInvalid`; an unactivated session fails activated-only
    /// services with `BadSessionNotActivated`.
    fn resolve_session(
        &self,
        request_header: &RequestHeader,
        require_activated: bool,
    ) -> Result<Arc<RwLock<Session>>, ServiceFault> {
        let session = {
            let session_manager = trace_read_lock!(self.session_manager);
            session_manager.find_session_by_token(&request_header.authentication_token)
        };
        let Some(session) = session else {
            warn!(
                "Request quotes an unknown authentication token {}",
                request_header.authentication_token
            );
            {
                let server_state = trace_read_lock!(self.server_state);
                trace_write_lock!(server_state.diagnostics).on_rejected_session();
            }
            self.sync_diagnostics();
            return Err(ServiceFault::new(request_header, StatusCode::BadSessionIdInvalid));
        };
        {
            let mut session = trace_write_lock!(session);
            if require_activated && !session.is_activated() {
                return Err(ServiceFault::new(
                    request_header,
                    StatusCode::BadSessionNotActivated,
                ));
            }
            session.set_last_service_request_timestamp(Utc::now());
        }
        Ok(session)
    }

    /// Copies the diagnostics counters into their address space variables so they are
    /// observable through the ordinary read / subscribe path. The counters are snapshotted
    /// first so the diagnostics and address space locks are never held together.
    fn sync_diagnostics(&self) {
        let snapshot = {
            let server_state = trace_read_lock!(self.server_state);
            let diagnostics = trace_read_lock!(server_state.diagnostics);
            diagnostics.clone()
        };
        let mut address_space = trace_write_lock!(self.address_space);
        snapshot.export(&mut address_space);
    }

    // --- Session services

    pub fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> ServiceResult<CreateSessionResponse> {
        let result = self.session_service.create_session(
            self.server_state.clone(),
            self.session_manager.clone(),
            request,
        );
        self.sync_diagnostics();
        result
    }

    pub fn activate_session(
        &self,
        request: &ActivateSessionRequest,
    ) -> ServiceResult<ActivateSessionResponse> {
        let session = self.resolve_session(&request.request_header, false)?;
        let result =
            self.session_service
                .activate_session(self.server_state.clone(), session, request);
        self.sync_diagnostics();
        result
    }

    pub fn close_session(&self, request: &CloseSessionRequest) -> ServiceResult<CloseSessionResponse> {
        let result = self
            .session_service
            .close_session(self.session_manager.clone(), request);
        self.sync_diagnostics();
        result
    }

    // --- Subscription services

    pub fn create_subscription(
        &self,
        request: &CreateSubscriptionRequest,
    ) -> ServiceResult<CreateSubscriptionResponse> {
        let session = self.resolve_session(&request.request_header, true)?;
        let result = self.subscription_service.create_subscription(
            self.server_state.clone(),
            session,
            request,
        );
        self.sync_diagnostics();
        result
    }

    pub fn modify_subscription(
        &self,
        request: &ModifySubscriptionRequest,
    ) -> ServiceResult<ModifySubscriptionResponse> {
        let session = self.resolve_session(&request.request_header, true)?;
        self.subscription_service
            .modify_subscription(self.server_state.clone(), session, request)
    }

    pub fn set_publishing_mode(
        &self,
        request: &SetPublishingModeRequest,
    ) -> ServiceResult<SetPublishingModeResponse> {
        let session = self.resolve_session(&request.request_header, true)?;
        self.subscription_service.set_publishing_mode(session, request)
    }

    pub fn transfer_subscriptions(
        &self,
        request: &TransferSubscriptionsRequest,
    ) -> ServiceResult<TransferSubscriptionsResponse> {
        let session = self.resolve_session(&request.request_header, true)?;
        self.subscription_service
            .transfer_subscriptions(self.session_manager.clone(), session, request)
    }

    pub fn delete_subscriptions(
        &self,
        request: &DeleteSubscriptionsRequest,
    ) -> ServiceResult<DeleteSubscriptionsResponse> {
        let session = self.resolve_session(&request.request_header, true)?;
        let result = self.subscription_service.delete_subscriptions(session, request);
        self.sync_diagnostics();
        result
    }

    /// Queues a publish request. The response is produced asynchronously and fetched with
    /// [`Server::take_publish_responses`]. `request_id` correlates the two.
    pub fn publish(&self, request_id: u32, request: &PublishRequest) -> Result<(), ServiceFault> {
        let session = self.resolve_session(&request.request_header, true)?;
        let now = Utc::now();
        self.subscription_service.async_publish(
            &now,
            session,
            self.address_space.clone(),
            request_id,
            request,
        )
    }

    /// Takes whatever publish responses the session identified by the authentication token
    /// has ready.
    pub fn take_publish_responses(
        &self,
        authentication_token: &NodeId,
    ) -> VecDeque<PublishResponseEntry> {
        let session = {
            let session_manager = trace_read_lock!(self.session_manager);
            session_manager.find_session_by_token(authentication_token)
        };
        match session {
            Some(session) => {
                let mut session = trace_write_lock!(session);
                session
                    .publish_engine_mut()
                    .take_publish_responses()
                    .unwrap_or_default()
            }
            None => VecDeque::new(),
        }
    }

    pub fn republish(&self, request: &RepublishRequest) -> ServiceResult<RepublishResponse> {
        let session = self.resolve_session(&request.request_header, true)?;
        self.subscription_service.republish(session, request)
    }

    // --- Monitored item services

    pub fn create_monitored_items(
        &self,
        request: &CreateMonitoredItemsRequest,
    ) -> ServiceResult<CreateMonitoredItemsResponse> {
        let session = self.resolve_session(&request.request_header, true)?;
        self.monitored_item_service.create_monitored_items(
            self.server_state.clone(),
            session,
            self.address_space.clone(),
            request,
        )
    }

    pub fn modify_monitored_items(
        &self,
        request: &ModifyMonitoredItemsRequest,
    ) -> ServiceResult<ModifyMonitoredItemsResponse> {
        let session = self.resolve_session(&request.request_header, true)?;
        self.monitored_item_service.modify_monitored_items(
            self.server_state.clone(),
            session,
            self.address_space.clone(),
            request,
        )
    }

    pub fn set_monitoring_mode(
        &self,
        request: &SetMonitoringModeRequest,
    ) -> ServiceResult<SetMonitoringModeResponse> {
        let session = self.resolve_session(&request.request_header, true)?;
        self.monitored_item_service.set_monitoring_mode(session, request)
    }

    pub fn set_triggering(&self, request: &SetTriggeringRequest) -> ServiceResult<SetTriggeringResponse> {
        let session = self.resolve_session(&request.request_header, true)?;
        self.monitored_item_service.set_triggering(session, request)
    }

    pub fn delete_monitored_items(
        &self,
        request: &DeleteMonitoredItemsRequest,
    ) -> ServiceResult<DeleteMonitoredItemsResponse> {
        let session = self.resolve_session(&request.request_header, true)?;
        self.monitored_item_service.delete_monitored_items(session, request)
    }

    // --- Attribute services

    pub fn read(&self, request: &ReadRequest) -> ServiceResult<ReadResponse> {
        let _session = self.resolve_session(&request.request_header, true)?;
        self.attribute_service
            .read(self.server_state.clone(), self.address_space.clone(), request)
    }

    pub fn write(&self, request: &WriteRequest) -> ServiceResult<WriteResponse> {
        let _session = self.resolve_session(&request.request_header, true)?;
        self.attribute_service
            .write(self.server_state.clone(), self.address_space.clone(), request)
    }

    // --- View services

    pub fn browse(&self, request: &BrowseRequest) -> ServiceResult<BrowseResponse> {
        let session = self.resolve_session(&request.request_header, true)?;
        self.view_service.browse(
            self.server_state.clone(),
            session,
            self.address_space.clone(),
            request,
        )
    }

    pub fn browse_next(&self, request: &BrowseNextRequest) -> ServiceResult<BrowseNextResponse> {
        let session = self.resolve_session(&request.request_header, true)?;
        self.view_service
            .browse_next(session, self.address_space.clone(), request)
    }

    pub fn translate_browse_paths_to_node_ids(
        &self,
        request: &TranslateBrowsePathsToNodeIdsRequest,
    ) -> ServiceResult<TranslateBrowsePathsToNodeIdsResponse> {
        let _session = self.resolve_session(&request.request_header, true)?;
        self.view_service.translate_browse_paths_to_node_ids(
            self.server_state.clone(),
            self.address_space.clone(),
            request,
        )
    }

    pub fn register_nodes(&self, request: &RegisterNodesRequest) -> ServiceResult<RegisterNodesResponse> {
        let _session = self.resolve_session(&request.request_header, true)?;
        self.view_service.register_nodes(self.server_state.clone(), request)
    }

    pub fn unregister_nodes(
        &self,
        request: &UnregisterNodesRequest,
    ) -> ServiceResult<UnregisterNodesResponse> {
        let _session = self.resolve_session(&request.request_header, true)?;
        self.view_service.unregister_nodes(self.server_state.clone(), request)
    }

    // --- Method services

    pub fn call(&self, request: &CallRequest) -> ServiceResult<CallResponse> {
        let session = self.resolve_session(&request.request_header, true)?;
        self.method_service.call(
            self.server_state.clone(),
            session,
            self.address_space.clone(),
            request,
        )
    }

    // --- Timers

    /// Ticks every session's subscriptions and expires stale publish requests. Driven by a
    /// scheduled task, and callable directly with an explicit time for deterministic tests.
    pub fn tick_subscriptions(&self, now: &DateTimeUtc) {
        let sessions: Vec<Arc<RwLock<Session>>> = {
            let session_manager = trace_read_lock!(self.session_manager);
            session_manager.sessions.values().cloned().collect()
        };
        for session in sessions {
            // Session before address space, the same order the service calls use
            let mut session = trace_write_lock!(session);
            let address_space = trace_read_lock!(self.address_space);
            let engine = session.publish_engine_mut();
            engine.tick(now, &address_space, TickReason::TickTimerFired);
            engine.expire_stale_publish_requests(now);
        }
        self.sync_diagnostics();
    }

    /// Closes sessions that have gone silent past their timeout.
    pub fn check_session_expiry(&self, now: &DateTimeUtc) {
        let expired = {
            let mut session_manager = trace_write_lock!(self.session_manager);
            session_manager.expire_sessions(now)
        };
        if !expired.is_empty() {
            self.sync_diagnostics();
        }
    }

    /// Spawns the periodic drivers - the subscription tick timer and the session expiry
    /// sweep. Dropping the returned tasks (or aborting the server) stops them.
    pub fn spawn_timers(server: &Arc<Server>) -> Vec<ScheduledTask> {
        let tick_server = server.clone();
        let subscription_timer =
            ScheduledTask::spawn(constants::SUBSCRIPTION_TIMER_RATE_MS, move || {
                if trace_read_lock!(tick_server.server_state).is_abort() {
                    debug!("Subscription timer is stopping due to server abort");
                    return false;
                }
                tick_server.tick_subscriptions(&Utc::now());
                true
            });
        let expiry_server = server.clone();
        let expiry_interval =
            ((constants::MIN_SESSION_TIMEOUT / 2.0) as u64).min(constants::SESSION_EXPIRY_CHECK_CAP);
        let expiry_timer = ScheduledTask::spawn(expiry_interval, move || {
            if trace_read_lock!(expiry_server.server_state).is_abort() {
                debug!("Session expiry timer is stopping due to server abort");
                return false;
            }
            expiry_server.check_session_expiry(&Utc::now());
            true
        });
        vec![subscription_timer, expiry_timer]
    }
}
