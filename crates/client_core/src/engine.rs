//! One server's protocol engine.
//!
//! Everything here runs synchronously inside a single unit of work: the
//! runtime calls [`ServerEngine::on_tick`], [`ServerEngine::on_readable`] and
//! [`ServerEngine::on_connect_result`] as their triggers fire, and each call
//! finishes before the next one starts.

use std::{fmt, io, sync::Arc, time::Instant};

use chrono::Utc;
use serde::de::DeserializeOwned;
use shared::{
    domain::{EventId, RoomId, UserId},
    error::ApiError,
    protocol::{LoginResponse, MessageBody, MessagesResponse, SendResponse, SyncResponse},
};
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use crate::{
    api::ClientApi,
    apply::{self, ApplyContext, BacklogOutcome},
    config::{EngineOptions, ServerConfig},
    connection::{ConnectPlan, Connection, ConnectionState},
    error::{ConnectError, EngineError},
    http::{DecodeOutcome, HttpResponse, ResponseDecoder},
    model::{Room, RoomStore},
    pipeline::Pipeline,
    request::{LocalEcho, OutgoingRequest, RequestKind},
    retry::ReconnectPolicy,
    surface::{LineKind, LineOrigin, LineTags, RenderedLine, Surfaces},
    sync::{SyncEngine, SyncOutcome},
    transport::{Connector, ReadOutcome, TlsConnector, Transport},
};

const READ_CHUNK: usize = 4096;
const TOPIC_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S";

/// Credentials-derived state handed out by a successful login.
pub struct Session {
    access_token: String,
    user_id: UserId,
}

impl Session {
    pub fn new(access_token: impl Into<String>, user_id: UserId) -> Self {
        Self {
            access_token: access_token.into(),
            user_id,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.access_token.zeroize();
    }
}

pub struct ServerEngine {
    config: ServerConfig,
    options: Arc<EngineOptions>,
    connection: Connection,
    pipeline: Pipeline,
    decoder: ResponseDecoder,
    sync: SyncEngine,
    rooms: RoomStore,
    session: Option<Session>,
    /// Set by `connect`, cleared by an explicit disconnect or a denied login.
    /// The tick only reconnects while this is set.
    active: bool,
    resync_pending: bool,
}

impl ServerEngine {
    pub fn new(
        config: ServerConfig,
        options: Arc<EngineOptions>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let policy = ReconnectPolicy::new(options.reconnect_unit());
        let connection = Connection::new(config.endpoint(), connector, policy);
        let pipeline = Pipeline::new(options.pipeline_depth);
        Self {
            config,
            options,
            connection,
            pipeline,
            decoder: ResponseDecoder::new(),
            sync: SyncEngine::new(),
            rooms: RoomStore::new(),
            session: None,
            active: false,
            resync_pending: false,
        }
    }

    /// Engine talking TLS to the configured endpoint.
    pub fn with_tls(config: ServerConfig, options: Arc<EngineOptions>) -> Result<Self, ConnectError> {
        let connector = TlsConnector::new(config.verify_tls, options.connect_timeout())?;
        Ok(Self::new(config, options, Arc::new(connector)))
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn rooms(&self) -> &RoomStore {
        &self.rooms
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn sync_state(&self) -> &SyncEngine {
        &self.sync
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.connection.attempts()
    }

    /// Replaces the credentials, e.g. after the server denied a login.
    pub fn set_credentials(&mut self, user: impl Into<String>, password: impl Into<String>) {
        self.config.clear_password();
        self.config.user = user.into();
        self.config.password = password.into();
    }

    /// Continues the sync loop from a cursor kept by an earlier session.
    pub fn resume_from(&mut self, cursor: impl Into<String>) {
        self.sync = SyncEngine::resume_from(cursor);
    }

    /// Waits until the socket has something for [`Self::on_readable`].
    pub async fn readable(&self) -> io::Result<()> {
        self.connection.ready().await
    }

    /// Validates the configuration and schedules the first connect attempt.
    /// Returns `None` when a connection exists or is already being made.
    pub fn connect(&mut self) -> Result<Option<ConnectPlan>, EngineError> {
        self.config.validate()?;
        self.config.base_url()?;
        self.active = true;

        if self.connection.state() != ConnectionState::Disconnected {
            return Ok(None);
        }
        self.connection.set_endpoint(self.config.endpoint());
        info!(
            target: "chat::network",
            "network: connecting server={} endpoint={}",
            self.config.name,
            self.connection.endpoint()
        );
        Ok(Some(self.connection.begin_connect()))
    }

    /// Maintenance tick: reconnect when down, drain the queue when up.
    pub fn on_tick(&mut self, surfaces: &mut dyn Surfaces) -> Option<ConnectPlan> {
        if !self.active {
            return None;
        }
        match self.connection.state() {
            ConnectionState::Disconnected => {
                debug!(target: "chat::network", "network: tick found socket down server={}", self.config.name);
                Some(self.connection.begin_connect())
            }
            ConnectionState::Connecting => None,
            ConnectionState::Connected => {
                if self.resync_pending {
                    self.resync_pending = false;
                    self.issue_sync(surfaces);
                }
                self.flush_queue(surfaces);
                None
            }
        }
    }

    /// Consumes the outcome of a scheduled connect attempt. On failure the
    /// next attempt is returned, already carrying its backoff delay.
    pub fn on_connect_result(
        &mut self,
        surfaces: &mut dyn Surfaces,
        result: Result<Box<dyn Transport>, ConnectError>,
    ) -> Option<ConnectPlan> {
        if !self.active {
            self.connection.abandon_connect();
            return None;
        }

        match result {
            Ok(transport) => {
                self.decoder.clear();
                self.connection.establish(transport);
                self.report(surfaces, "Connected");
                if self.session.is_none() {
                    self.login(surfaces);
                } else {
                    self.flush_queue(surfaces);
                }
                None
            }
            Err(err) => {
                warn!(
                    target: "chat::network",
                    "network: connect failed server={} error={err}",
                    self.config.name
                );
                surfaces.server_message(&self.config.name, &err.to_string());
                let plan = self.connection.on_connect_failed();
                if !plan.delay.is_zero() {
                    surfaces.server_message(
                        &self.config.name,
                        &format!("Reconnecting in {} seconds.", plan.delay.as_secs()),
                    );
                }
                Some(plan)
            }
        }
    }

    /// Reads everything the socket has, dispatching each complete response.
    pub fn on_readable(&mut self, surfaces: &mut dyn Surfaces) {
        let mut buf = [0u8; READ_CHUNK];
        while self.connection.is_connected() {
            let read = match self.connection.receive(&mut buf) {
                Ok(ReadOutcome::Data(0)) | Ok(ReadOutcome::Closed) => {
                    self.fail_connection(surfaces, "No data while reading");
                    return;
                }
                Ok(ReadOutcome::Data(read)) => read,
                Ok(ReadOutcome::WouldBlock) => {
                    // Readiness also fires for buffered TLS output.
                    if let Err(err) = self.connection.flush() {
                        self.fail_connection(surfaces, &format!("Error while writing to socket: {err}"));
                    }
                    return;
                }
                Err(err) => {
                    self.fail_connection(surfaces, &format!("Error while reading from socket: {err}"));
                    return;
                }
            };
            assert!(
                read <= buf.len(),
                "transport reported {read} bytes for a {} byte buffer",
                buf.len()
            );
            self.consume(surfaces, &buf[..read]);
        }
    }

    /// Explicit disconnect: drops the session and the sync loop and stops
    /// reconnecting. Queued requests other than sync and login survive for the
    /// next `connect`.
    pub fn disconnect(&mut self, surfaces: &mut dyn Surfaces) {
        let was = self.connection.state();
        let discarded = self.pipeline.discard_in_flight();
        self.pipeline
            .retain_queued(|request| !matches!(request.kind, RequestKind::Sync | RequestKind::Login));
        self.decoder.clear();
        self.sync.stop();
        self.session = None;
        self.active = false;
        self.resync_pending = false;
        self.connection.teardown();
        info!(
            target: "chat::network",
            "network: disconnected server={} discarded={discarded} queued={}",
            self.config.name,
            self.pipeline.queued_len()
        );
        if was != ConnectionState::Disconnected {
            self.report(surfaces, "Disconnected");
        }
    }

    /// Queues a request and transmits right away when the socket is up.
    pub fn submit(&mut self, surfaces: &mut dyn Surfaces, request: OutgoingRequest) -> u64 {
        let kind = request.kind;
        let seq = self.pipeline.enqueue(request);
        debug!(
            target: "chat::messaging",
            "pipeline: queued kind={kind} seq={seq} queued={}",
            self.pipeline.queued_len()
        );
        if self.connection.is_connected() {
            self.flush_queue(surfaces);
        }
        seq
    }

    pub fn send_message(
        &mut self,
        surfaces: &mut dyn Surfaces,
        room_id: &RoomId,
        text: &str,
    ) -> Result<u64, EngineError> {
        if !self.connection.is_connected() {
            return Err(EngineError::NotConnected);
        }
        if self.room(room_id)?.encrypted {
            return Err(EngineError::RoomEncrypted(room_id.clone()));
        }
        let echo = LocalEcho {
            author: self.config.user.clone(),
            text: text.to_string(),
        };
        let request = self
            .api()?
            .send_message(room_id, &MessageBody::text(text), echo)?;
        Ok(self.submit(surfaces, request))
    }

    pub fn set_topic(
        &mut self,
        surfaces: &mut dyn Surfaces,
        room_id: &RoomId,
        topic: &str,
    ) -> Result<u64, EngineError> {
        self.room(room_id)?;
        let request = self.api()?.set_topic(room_id, topic)?;
        Ok(self.submit(surfaces, request))
    }

    /// Prints the room's current topic on its surface. Returns false when the
    /// room has no topic yet.
    pub fn show_topic(
        &self,
        surfaces: &mut dyn Surfaces,
        room_id: &RoomId,
    ) -> Result<bool, EngineError> {
        let room = self.room(room_id)?;
        let Some(topic) = &room.topic else {
            return Ok(false);
        };
        let now = Utc::now();
        let lines = [
            format!("Topic for {} is \"{}\"", room.alias, topic.text),
            format!(
                "Topic set by {} on {}",
                topic.author,
                topic.date.format(TOPIC_DATE_FORMAT)
            ),
        ];
        for message in lines {
            surfaces.print_line(
                room_id,
                RenderedLine {
                    date: now,
                    prefix: "--".to_string(),
                    message,
                    tags: LineTags::new(LineKind::Topic, LineOrigin::Live),
                },
            );
        }
        Ok(true)
    }

    pub fn redact(
        &mut self,
        surfaces: &mut dyn Surfaces,
        room_id: &RoomId,
        event_id: &EventId,
        reason: Option<&str>,
    ) -> Result<u64, EngineError> {
        self.room(room_id)?;
        let request = self.api()?.redact(room_id, event_id, reason)?;
        Ok(self.submit(surfaces, request))
    }

    /// Requests the page of history before the room's pagination cursor.
    pub fn fetch_backlog(
        &mut self,
        surfaces: &mut dyn Surfaces,
        room_id: &RoomId,
    ) -> Result<u64, EngineError> {
        let from = self
            .room(room_id)?
            .prev_batch
            .clone()
            .ok_or_else(|| EngineError::NoBacklog(room_id.clone()))?;
        let request =
            self.api()?
                .room_messages(room_id, &from, self.options.max_backlog_sync_events)?;
        Ok(self.submit(surfaces, request))
    }

    pub fn join(&mut self, surfaces: &mut dyn Surfaces, room: &str) -> Result<u64, EngineError> {
        let request = self.api()?.join(room)?;
        Ok(self.submit(surfaces, request))
    }

    pub fn part(&mut self, surfaces: &mut dyn Surfaces, room_id: &RoomId) -> Result<u64, EngineError> {
        self.room(room_id)?;
        let request = self.api()?.part(room_id)?;
        Ok(self.submit(surfaces, request))
    }

    pub fn invite(
        &mut self,
        surfaces: &mut dyn Surfaces,
        room_id: &RoomId,
        user: &UserId,
    ) -> Result<u64, EngineError> {
        self.room(room_id)?;
        let request = self.api()?.invite(room_id, user)?;
        Ok(self.submit(surfaces, request))
    }

    /// Forgets a room locally; the engine never does this on its own.
    pub fn close_room(
        &mut self,
        surfaces: &mut dyn Surfaces,
        room_id: &RoomId,
    ) -> Result<(), EngineError> {
        self.rooms
            .remove(room_id)
            .ok_or_else(|| EngineError::UnknownRoom(room_id.clone()))?;
        surfaces.destroy_room(room_id);
        debug!(target: "chat::messaging", "rooms: closed room={room_id} server={}", self.config.name);
        Ok(())
    }

    fn room(&self, room_id: &RoomId) -> Result<&Room, EngineError> {
        self.rooms
            .get(room_id)
            .ok_or_else(|| EngineError::UnknownRoom(room_id.clone()))
    }

    fn api(&self) -> Result<ClientApi, EngineError> {
        Ok(ClientApi::new(self.config.base_url()?))
    }

    fn report(&self, surfaces: &mut dyn Surfaces, text: &str) {
        info!(target: "chat::messaging", "server: {text} server={}", self.config.name);
        surfaces.server_message(&self.config.name, text);
    }

    fn login(&mut self, surfaces: &mut dyn Surfaces) {
        let pending = self
            .pipeline
            .queued()
            .chain(self.pipeline.in_flight())
            .any(|request| request.kind == RequestKind::Login);
        if pending {
            debug!(target: "chat::messaging", "pipeline: login already queued server={}", self.config.name);
            self.flush_queue(surfaces);
            return;
        }
        let request = self.api().and_then(|api| {
            api.login(
                &self.config.user,
                &self.config.password,
                &self.config.device_name,
            )
        });
        match request {
            Ok(request) => {
                let seq = self.pipeline.enqueue_front(request);
                debug!(target: "chat::messaging", "pipeline: queued kind=login seq={seq}");
                self.flush_queue(surfaces);
            }
            Err(err) => self.report(surfaces, &err.to_string()),
        }
    }

    /// Queues the next long-poll unless the loop is stopped or a sync is
    /// already waiting.
    fn issue_sync(&mut self, surfaces: &mut dyn Surfaces) {
        if !self.sync.is_running() {
            return;
        }
        let pending = self
            .pipeline
            .queued()
            .chain(self.pipeline.in_flight())
            .any(|request| request.kind == RequestKind::Sync);
        if pending {
            return;
        }
        match self
            .api()
            .and_then(|api| api.sync(self.sync.cursor(), &self.options))
        {
            Ok(request) => {
                self.submit(surfaces, request);
            }
            Err(err) => self.report(surfaces, &err.to_string()),
        }
    }

    /// Transmits queued requests until the pipeline is full, stopping at the
    /// first failed write.
    fn flush_queue(&mut self, surfaces: &mut dyn Surfaces) {
        while let Some(request) = self.pipeline.next_ready() {
            let token = self.session.as_ref().map(Session::access_token);
            let bytes = request.http.encode(self.config.address.trim(), token);
            match self.connection.send(&bytes) {
                Ok(()) => {
                    debug!(
                        target: "chat::network",
                        "network: sent kind={} seq={} bytes={}",
                        request.kind,
                        request.seq,
                        bytes.len()
                    );
                    self.pipeline.mark_sent(request);
                }
                Err(err) => {
                    self.pipeline.push_front(request);
                    self.fail_connection(surfaces, &format!("Error while writing to socket: {err}"));
                    return;
                }
            }
        }
        if let Err(err) = self.connection.flush() {
            self.fail_connection(surfaces, &format!("Error while writing to socket: {err}"));
        }
    }

    fn consume(&mut self, surfaces: &mut dyn Surfaces, mut input: &[u8]) {
        loop {
            match self.decoder.feed(input) {
                Ok(DecodeOutcome::Complete(response)) => {
                    let request = self.pipeline.on_response();
                    self.dispatch(surfaces, request, response);
                    if self.connection.is_connected() {
                        self.flush_queue(surfaces);
                    }
                    if !self.connection.is_connected() || !self.decoder.has_buffered_input() {
                        return;
                    }
                    input = &[];
                }
                Ok(DecodeOutcome::BodyChunk(chunk)) => {
                    debug!(target: "chat::network", "network: partial body bytes={}", chunk.len());
                    return;
                }
                Ok(DecodeOutcome::NeedMoreData) => return,
                Err(err) => {
                    self.fail_connection(surfaces, &format!("Malformed response from server: {err}"));
                    return;
                }
            }
        }
    }

    /// Drops the socket after an I/O failure and puts unanswered requests
    /// back at the head of the queue for the next connection.
    fn fail_connection(&mut self, surfaces: &mut dyn Surfaces, reason: &str) {
        let requeued = self.pipeline.requeue_in_flight();
        self.decoder.clear();
        self.connection.teardown();
        warn!(
            target: "chat::network",
            "network: connection lost server={} reason={reason} requeued={requeued}",
            self.config.name
        );
        surfaces.server_message(&self.config.name, reason);
    }

    fn dispatch(
        &mut self,
        surfaces: &mut dyn Surfaces,
        request: OutgoingRequest,
        response: HttpResponse,
    ) {
        debug!(
            target: "chat::messaging",
            "pipeline: received kind={} seq={} status={}",
            request.kind,
            request.seq,
            response.status
        );

        match response.status {
            200..=299 => self.handle_success(surfaces, &request, &response),
            504 if request.kind == RequestKind::Sync => self.issue_sync(surfaces),
            403 => self.handle_denied(surfaces, &request, &response),
            401 if request.kind != RequestKind::Login => self.handle_token_rejected(surfaces, &response),
            status => {
                let payload = match request.kind {
                    RequestKind::Login => String::new(),
                    _ => request.http.body_text(),
                };
                let text = format!(
                    "Unhandled {status} error, please inform the developers about this. kind={} target={} request={} response={}",
                    request.kind,
                    request.http.target,
                    one_line(&payload),
                    one_line(&response.body_text())
                );
                self.report(surfaces, &text);
                if request.kind == RequestKind::Sync {
                    self.resync_pending = true;
                }
            }
        }

        let (send, receive, handling, total) = request.marks.report(Instant::now());
        debug!(
            target: "chat::timing",
            "timing: kind={} seq={} send_delay_ms={send:.3} receive_delay_ms={receive:.3} handling_ms={handling:.3} total_ms={total:.3}",
            request.kind,
            request.seq
        );
    }

    fn handle_success(
        &mut self,
        surfaces: &mut dyn Surfaces,
        request: &OutgoingRequest,
        response: &HttpResponse,
    ) {
        match request.kind {
            RequestKind::Login => {
                let Some(login) = self.decode_body::<LoginResponse>(surfaces, response) else {
                    return;
                };
                info!(
                    target: "chat::messaging",
                    "session: logged in server={} user={}",
                    self.config.name,
                    login.user_id
                );
                self.session = Some(Session::new(login.access_token, login.user_id));
                self.sync.start();
                self.issue_sync(surfaces);
            }
            RequestKind::Sync => {
                let Some(batch) = self.decode_body::<SyncResponse>(surfaces, response) else {
                    self.resync_pending = true;
                    return;
                };
                let own_user = self.session.as_ref().map(|s| s.user_id.clone());
                let ctx = ApplyContext {
                    server: &self.config.name,
                    own_user: own_user.as_ref(),
                    redactions: self.options.redactions,
                    now: Utc::now(),
                };
                let rooms = &mut self.rooms;
                let outcome = self.sync.process(&batch, |joined| {
                    apply::apply_sync_rooms(rooms, surfaces, &ctx, joined)
                });
                if outcome == SyncOutcome::Unchanged {
                    debug!(target: "chat::messaging", "sync: nothing new server={}", self.config.name);
                }
                self.issue_sync(surfaces);
            }
            RequestKind::SendMessage => {
                let Some(sent) = self.decode_body::<SendResponse>(surfaces, response) else {
                    return;
                };
                let shown = request
                    .room_id
                    .as_ref()
                    .is_some_and(|room_id| surfaces.find_line_by_id(room_id, &sent.event_id).is_some());
                if shown {
                    debug!(target: "chat::messaging", "send: sync delivered event first event={}", sent.event_id);
                    return;
                }
                self.rooms.ignore_event(sent.event_id.clone());
                if let (Some(room_id), Some(echo)) = (&request.room_id, &request.echo) {
                    apply::print_local_echo(surfaces, Utc::now(), room_id, echo, sent.event_id);
                }
            }
            RequestKind::BacklogFetch => {
                let Some(page) = self.decode_body::<MessagesResponse>(surfaces, response) else {
                    return;
                };
                let Some(room_id) = &request.room_id else {
                    return;
                };
                let own_user = self.session.as_ref().map(|s| s.user_id.clone());
                let ctx = ApplyContext {
                    server: &self.config.name,
                    own_user: own_user.as_ref(),
                    redactions: self.options.redactions,
                    now: Utc::now(),
                };
                match apply::apply_backlog(&mut self.rooms, surfaces, &ctx, room_id, &page) {
                    BacklogOutcome::Exhausted => {
                        debug!(target: "chat::messaging", "backlog: no older events room={room_id}");
                    }
                    BacklogOutcome::Applied { lines } => {
                        debug!(target: "chat::messaging", "backlog: applied room={room_id} lines={lines}");
                    }
                }
            }
            // Their effects arrive through the next sync.
            RequestKind::StateChange
            | RequestKind::Redact
            | RequestKind::Join
            | RequestKind::Part
            | RequestKind::Invite => {
                debug!(
                    target: "chat::messaging",
                    "pipeline: acknowledged kind={} room={:?}",
                    request.kind,
                    request.room_id
                );
            }
        }
    }

    fn handle_denied(
        &mut self,
        surfaces: &mut dyn Surfaces,
        request: &OutgoingRequest,
        response: &HttpResponse,
    ) {
        let reason = ApiError::from_body(&response.body).map(|err| err.error);
        let suffix = ApiError::reason_suffix(reason.as_deref());
        match request.kind {
            RequestKind::Login => {
                self.report(surfaces, &format!("Login error{suffix}"));
                self.config.clear_password();
                self.session = None;
                self.sync.stop();
                self.active = false;
                self.decoder.clear();
                self.connection.teardown();
            }
            RequestKind::StateChange => {
                self.report(surfaces, &format!("Can't set state{suffix}"));
            }
            _ => {
                let text = format!(
                    "Unhandled 403 error, please inform the developers about this: {}",
                    one_line(&response.body_text())
                );
                self.report(surfaces, &text);
            }
        }
    }

    /// The server no longer accepts the access token: drop the session and
    /// its sync loop, then log in again if the password is still known.
    fn handle_token_rejected(&mut self, surfaces: &mut dyn Surfaces, response: &HttpResponse) {
        let reason = ApiError::from_body(&response.body).map(|err| err.error);
        self.report(
            surfaces,
            &format!("Access token rejected{}", ApiError::reason_suffix(reason.as_deref())),
        );
        self.session = None;
        self.sync.stop();
        self.resync_pending = false;
        self.pipeline
            .retain_queued(|request| request.kind != RequestKind::Sync);
        if self.config.has_credentials() {
            self.login(surfaces);
        } else {
            self.active = false;
            self.decoder.clear();
            self.connection.teardown();
        }
    }

    fn decode_body<T: DeserializeOwned>(
        &self,
        surfaces: &mut dyn Surfaces,
        response: &HttpResponse,
    ) -> Option<T> {
        match serde_json::from_slice(&response.body) {
            Ok(body) => Some(body),
            Err(err) => {
                self.report(
                    surfaces,
                    &format!("Error decoding json response from server: {err}"),
                );
                None
            }
        }
    }
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
