//! The Bayeux connection.
//!
//! A [`BayeuxConnection`] is a cheap, cloneable handle. The state machine
//! itself runs in a single actor task that exclusively owns the client id,
//! the subscription set, the in-flight request and the long-polling loop.
//! Handles enqueue commands and receive answers on oneshot channels, and
//! transport completions come back to the actor as messages, so no state is
//! ever touched from two places at once.
//!
//! ```text
//!  handle ──Command──▶ ┌────────────────┐ ──send──▶ HttpTransport
//!                      │ ConnectionActor│
//!  events ◀─broadcast─ └────────────────┘ ◀─Internal── spawned request tasks
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bayeux_protocol::{
    BayeuxResponse, Channel, DisconnectResponse, HandshakeParams, HandshakeResponse,
    LONG_POLLING, META_PREFIX, MessageWriter, ProtocolError, Request, decode_messages,
};
use bayeux_transport::{HttpTransport, TransportRequest, TransportResponse, TransportResult};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::error::{ClientError, ClientResult, ProtocolViolation, ViolationKind};
use crate::events::{BayeuxEvent, Notification};
use crate::hooks::{DefaultHooks, ResponseHooks};
use crate::state::{ConnectionState, ConnectionStatus, status_channel};

/// Status reported with a disconnect the server did not acknowledge.
const DISCONNECT_FAILED_STATUS: u16 = 400;

/// Connection behavior.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Handshake parameters.
    pub handshake: HandshakeParams,
    /// Connection type named in connect requests.
    pub connection_type: String,
    /// Consecutive long-poll failures before polling gives up.
    pub long_polling_connect_retries: u32,
    /// Delay before retrying a failed long poll.
    pub long_polling_retry_delay: Duration,
    /// Capacity of the event channel. Slow receivers lag past this.
    pub event_capacity: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            handshake: HandshakeParams::default(),
            connection_type: LONG_POLLING.to_string(),
            long_polling_connect_retries: 3,
            long_polling_retry_delay: Duration::from_secs(1),
            event_capacity: 256,
        }
    }
}

impl ConnectionOptions {
    /// Builder: set handshake parameters.
    pub fn with_handshake(mut self, handshake: HandshakeParams) -> Self {
        self.handshake = handshake;
        self
    }

    /// Builder: set the connection type.
    pub fn with_connection_type(mut self, connection_type: impl Into<String>) -> Self {
        self.connection_type = connection_type.into();
        self
    }

    /// Builder: set long-polling retry limit and delay.
    pub fn with_long_polling_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.long_polling_connect_retries = retries;
        self.long_polling_retry_delay = delay;
        self
    }

    /// Builder: set the event channel capacity.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Handshake,
    Connect,
    Disconnect,
    Subscribe,
    Unsubscribe,
    Publish,
    Send,
}

impl Operation {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Handshake => "handshake",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::Publish => "publish",
            Self::Send => "send",
        }
    }
}

type Reply<T> = oneshot::Sender<ClientResult<T>>;

enum Command {
    Stage {
        operation: Operation,
        request: Request,
        reply: Reply<PendingResponse>,
    },
    Cancel {
        reply: Reply<()>,
    },
    StartLongPolling {
        reply: Reply<()>,
    },
    StopLongPolling {
        reply: Reply<()>,
    },
    Shutdown,
}

enum Internal {
    Completed {
        token: u64,
        result: TransportResult<TransportResponse>,
    },
    PollCompleted {
        generation: u64,
        result: TransportResult<TransportResponse>,
    },
    PollRetry {
        generation: u64,
    },
}

/// The reply to a staged request.
///
/// Awaiting it waits for the server's answer. Dropping it leaves the request
/// running, with the outcome reported only through events.
#[derive(Debug)]
pub struct PendingResponse {
    id: String,
    rx: oneshot::Receiver<ClientResult<BayeuxResponse>>,
}

impl PendingResponse {
    /// Returns the correlation id of the request.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Future for PendingResponse {
    type Output = ClientResult<BayeuxResponse>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or_else(|_| Err(ClientError::ConnectionClosed)))
    }
}

/// Builds and spawns a [`BayeuxConnection`].
pub struct ConnectionBuilder {
    transport: Arc<dyn HttpTransport>,
    long_polling_transport: Option<Arc<dyn HttpTransport>>,
    options: ConnectionOptions,
    hooks: Arc<dyn ResponseHooks>,
}

impl ConnectionBuilder {
    /// Sets the secondary transport used for long polling.
    pub fn long_polling_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.long_polling_transport = Some(transport);
        self
    }

    /// Sets connection options.
    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets response hooks.
    pub fn hooks(mut self, hooks: Arc<dyn ResponseHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Spawns the connection actor on the current tokio runtime.
    pub fn spawn(self) -> BayeuxConnection {
        let (command_tx, commands) = mpsc::channel(32);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(self.options.event_capacity.max(1));
        let (status_tx, status) = status_channel();
        let options = Arc::new(self.options);

        let actor = ConnectionActor {
            transport: self.transport,
            long_polling_transport: self.long_polling_transport,
            options: Arc::clone(&options),
            hooks: self.hooks,
            commands,
            internal_tx,
            internal_rx,
            events: events.clone(),
            status: status_tx,
            state: ConnectionState::Disconnected,
            client_id: None,
            subscriptions: Vec::new(),
            in_flight: None,
            long_polling: None,
            next_id: 1,
            next_token: 1,
            generation: 0,
            writer: MessageWriter::new(),
        };
        tokio::spawn(actor.run());

        BayeuxConnection {
            command_tx,
            events,
            status,
            options,
        }
    }
}

/// Handle to a Bayeux connection.
///
/// Staging operations (`handshake`, `subscribe`, ...) fail immediately with
/// a state or format error, or return a [`PendingResponse`] once the request
/// is on its way:
///
/// ```ignore
/// let connection = BayeuxConnection::new(Arc::new(transport));
/// let reply = connection.handshake().await?.await?;
/// assert!(reply.is_successful());
/// connection.subscribe("/chat/room1").await?.await?;
/// ```
#[derive(Clone, Debug)]
pub struct BayeuxConnection {
    command_tx: mpsc::Sender<Command>,
    events: broadcast::Sender<BayeuxEvent>,
    status: watch::Receiver<ConnectionStatus>,
    options: Arc<ConnectionOptions>,
}

impl BayeuxConnection {
    /// Starts building a connection over `transport`.
    pub fn builder(transport: Arc<dyn HttpTransport>) -> ConnectionBuilder {
        ConnectionBuilder {
            transport,
            long_polling_transport: None,
            options: ConnectionOptions::default(),
            hooks: Arc::new(DefaultHooks),
        }
    }

    /// Spawns a connection with default options and no long polling.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self::builder(transport).spawn()
    }

    /// Subscribes to connection notifications.
    ///
    /// Only events produced after this call are received.
    pub fn events(&self) -> broadcast::Receiver<BayeuxEvent> {
        self.events.subscribe()
    }

    /// Returns the current status.
    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Returns the current state.
    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    /// Returns the client id, if connected.
    pub fn client_id(&self) -> Option<String> {
        self.status.borrow().client_id.clone()
    }

    /// Returns true if `channel` is subscribed.
    pub fn subscribed(&self, channel: &str) -> bool {
        self.status.borrow().is_subscribed(channel)
    }

    /// Returns a receiver that observes every status change.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Starts a handshake with the configured parameters.
    ///
    /// Legal while disconnected. While connecting, the previous handshake is
    /// cancelled first.
    pub async fn handshake(&self) -> ClientResult<PendingResponse> {
        self.handshake_with(&self.options.handshake).await
    }

    /// Starts a handshake with explicit parameters.
    pub async fn handshake_with(&self, params: &HandshakeParams) -> ClientResult<PendingResponse> {
        self.stage(Operation::Handshake, Request::handshake(params))
            .await
    }

    /// Sends a connect request on the primary transport.
    pub async fn connect(&self) -> ClientResult<PendingResponse> {
        let request = Request::connect(&self.options.connection_type);
        self.stage(Operation::Connect, request).await
    }

    /// Sends a disconnect request.
    pub async fn disconnect(&self) -> ClientResult<PendingResponse> {
        self.stage(Operation::Disconnect, Request::disconnect())
            .await
    }

    /// Subscribes to a channel.
    pub async fn subscribe(&self, channel: &str) -> ClientResult<PendingResponse> {
        let channel = Channel::new(channel)?;
        self.stage(Operation::Subscribe, Request::subscribe(&channel))
            .await
    }

    /// Unsubscribes from a channel.
    pub async fn unsubscribe(&self, channel: &str) -> ClientResult<PendingResponse> {
        let channel = Channel::new(channel)?;
        self.stage(Operation::Unsubscribe, Request::unsubscribe(&channel))
            .await
    }

    /// Publishes `data` on an application channel.
    pub async fn publish(&self, channel: &str, data: Value) -> ClientResult<PendingResponse> {
        let channel = Channel::new(channel)?;
        if channel.is_meta() {
            return Err(ProtocolError::InvalidChannel(channel.into()).into());
        }
        self.stage(Operation::Publish, Request::publish(channel, data))
            .await
    }

    /// Sends a caller-built request.
    pub async fn send(&self, request: Request) -> ClientResult<PendingResponse> {
        self.stage(Operation::Send, request).await
    }

    /// Parses a raw JSON message and sends it.
    pub async fn send_raw(&self, json: &str) -> ClientResult<PendingResponse> {
        let request = Request::from_json(json)?;
        self.send(request).await
    }

    /// Aborts the in-flight request. A pending handshake is abandoned and
    /// the connection returns to disconnected.
    pub async fn cancel(&self) -> ClientResult<()> {
        self.request(|reply| Command::Cancel { reply }).await
    }

    /// Starts the long-polling loop on the secondary transport.
    pub async fn start_long_polling(&self) -> ClientResult<()> {
        self.request(|reply| Command::StartLongPolling { reply })
            .await
    }

    /// Stops the long-polling loop. Does nothing if it is not running.
    pub async fn stop_long_polling(&self) -> ClientResult<()> {
        self.request(|reply| Command::StopLongPolling { reply })
            .await
    }

    /// Stops the actor. In-flight requests resolve with
    /// [`ClientError::ConnectionClosed`].
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(Command::Shutdown).await;
    }

    async fn stage(
        &self,
        operation: Operation,
        request: Request,
    ) -> ClientResult<PendingResponse> {
        self.request(|reply| Command::Stage {
            operation,
            request,
            reply,
        })
        .await
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> ClientResult<T> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(command(reply))
            .await
            .map_err(|_| ClientError::ConnectionClosed)?;
        rx.await.map_err(|_| ClientError::ConnectionClosed)?
    }
}

struct InFlight {
    token: u64,
    operation: Operation,
    request: Request,
    reply: oneshot::Sender<ClientResult<BayeuxResponse>>,
    task: JoinHandle<()>,
}

struct LongPoll {
    generation: u64,
    failures: u32,
    request: Option<Request>,
    task: Option<JoinHandle<()>>,
}

/// How a received message relates to the request it arrived with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Correlation {
    /// Same channel and same id.
    Exact,
    /// Same channel, no id.
    Loose,
    Unrelated,
}

/// What came back from one HTTP exchange.
struct Received {
    status: u16,
    description: String,
    raw: Arc<str>,
}

impl Received {
    fn notification(&self, message: Value) -> Notification {
        Notification::new(
            self.status,
            self.description.clone(),
            Arc::clone(&self.raw),
            message,
        )
    }
}

struct ConnectionActor {
    transport: Arc<dyn HttpTransport>,
    long_polling_transport: Option<Arc<dyn HttpTransport>>,
    options: Arc<ConnectionOptions>,
    hooks: Arc<dyn ResponseHooks>,
    commands: mpsc::Receiver<Command>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    events: broadcast::Sender<BayeuxEvent>,
    status: watch::Sender<ConnectionStatus>,
    state: ConnectionState,
    client_id: Option<String>,
    subscriptions: Vec<String>,
    in_flight: Option<InFlight>,
    long_polling: Option<LongPoll>,
    next_id: u64,
    next_token: u64,
    generation: u64,
    writer: MessageWriter,
}

impl ConnectionActor {
    async fn run(mut self) {
        debug!("Connection actor started");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(internal) = self.internal_rx.recv() => self.handle_internal(internal),
            }
        }

        self.abort_in_flight(ClientError::ConnectionClosed);
        self.stop_long_polling();
        self.sync_status();
        debug!("Connection actor stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Stage {
                operation,
                request,
                reply,
            } => {
                let result = self.stage(operation, request);
                self.sync_status();
                let _ = reply.send(result);
            }
            Command::Cancel { reply } => {
                self.cancel();
                self.sync_status();
                let _ = reply.send(Ok(()));
            }
            Command::StartLongPolling { reply } => {
                let result = self.start_long_polling();
                self.sync_status();
                let _ = reply.send(result);
            }
            Command::StopLongPolling { reply } => {
                self.stop_long_polling();
                self.sync_status();
                let _ = reply.send(Ok(()));
            }
            Command::Shutdown => {}
        }
    }

    fn handle_internal(&mut self, internal: Internal) {
        match internal {
            Internal::Completed { token, result } => self.complete(token, result),
            Internal::PollCompleted { generation, result } => {
                self.poll_completed(generation, result)
            }
            Internal::PollRetry { generation } => self.poll_retry(generation),
        }
        self.sync_status();
    }

    fn sync_status(&self) {
        self.status.send_replace(ConnectionStatus {
            state: self.state,
            client_id: self.client_id.clone(),
            subscriptions: self.subscriptions.clone(),
            long_polling: self.long_polling.is_some(),
        });
    }

    fn emit(&self, event: BayeuxEvent) {
        trace!(event = event.name(), "Emitting event");
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn next_id(&mut self) -> String {
        let id = self.next_id;
        self.next_id += 1;
        id.to_string()
    }

    fn is_subscribed(&self, channel: &str) -> bool {
        self.subscriptions.iter().any(|c| c == channel)
    }

    fn check_operation(&self, operation: Operation, request: &Request) -> ClientResult<()> {
        let legal = match operation {
            Operation::Handshake => self.state != ConnectionState::Connected,
            _ => self.state == ConnectionState::Connected,
        };
        if !legal {
            return Err(ClientError::invalid_state(operation.as_str(), self.state));
        }

        match (operation, request.subscription()) {
            (Operation::Subscribe, Some(channel)) if self.is_subscribed(channel) => {
                Err(ClientError::AlreadySubscribed(channel.to_string()))
            }
            (Operation::Unsubscribe, Some(channel)) if !self.is_subscribed(channel) => {
                Err(ClientError::NotSubscribed(channel.to_string()))
            }
            _ => Ok(()),
        }
    }

    fn stage(
        &mut self,
        operation: Operation,
        mut request: Request,
    ) -> ClientResult<PendingResponse> {
        self.check_operation(operation, &request)?;

        if operation == Operation::Handshake && self.state == ConnectionState::Connecting {
            debug!("Handshake already in progress, restarting it");
            self.cancel();
        }
        self.abort_in_flight(ClientError::Cancelled);

        if request.client_id.is_none() {
            request.client_id = self.client_id.clone();
        }
        let id = match &request.id {
            Some(id) => id.clone(),
            None => {
                let id = self.next_id();
                request.id = Some(id.clone());
                id
            }
        };

        let body = self.writer.write(&request)?.to_vec();
        let transport_request = TransportRequest::new(body)
            .with_method(request.method)
            .with_timeout(self.transport.timeout());

        if operation == Operation::Handshake {
            self.state = ConnectionState::Connecting;
            info!("Handshaking");
        }

        let token = self.next_token;
        self.next_token += 1;
        let transport = Arc::clone(&self.transport);
        let tx = self.internal_tx.clone();
        let task = tokio::spawn(async move {
            let result = transport.send(transport_request).await;
            let _ = tx.send(Internal::Completed { token, result });
        });

        debug!(
            operation = operation.as_str(),
            channel = %request.channel,
            id = %id,
            "Request sent"
        );

        let (reply, rx) = oneshot::channel();
        self.in_flight = Some(InFlight {
            token,
            operation,
            request,
            reply,
            task,
        });

        Ok(PendingResponse { id, rx })
    }

    fn abort_in_flight(&mut self, error: ClientError) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
            debug!(
                id = in_flight.request.id.as_deref().unwrap_or_default(),
                "Aborted in-flight request"
            );
            let _ = in_flight.reply.send(Err(error));
        }
    }

    fn cancel(&mut self) {
        self.abort_in_flight(ClientError::Cancelled);
        if self.state == ConnectionState::Connecting {
            info!("Handshake cancelled");
            self.state = ConnectionState::Disconnected;
            self.client_id = None;
        }
    }

    fn complete(&mut self, token: u64, result: TransportResult<TransportResponse>) {
        let Some(in_flight) = self.in_flight.take_if(|f| f.token == token) else {
            trace!(token, "Ignoring stale completion");
            return;
        };

        let outcome = match self.receive(result) {
            Ok(received) => self.dispatch(Some(&in_flight.request), &received),
            Err(err) => {
                if in_flight.operation == Operation::Handshake
                    && self.state == ConnectionState::Connecting
                {
                    let notification = Notification::new(
                        status_of(&err),
                        err.to_string(),
                        Arc::from(""),
                        Value::Null,
                    );
                    self.fail_handshake(notification);
                }
                Err(err)
            }
        };

        self.sync_status();
        let _ = in_flight.reply.send(outcome);
    }

    /// Turns a transport result into payload text, reporting it either way.
    fn receive(&mut self, result: TransportResult<TransportResponse>) -> ClientResult<Received> {
        let text = result.and_then(|response| {
            let status = response.status;
            let description = response.description;
            response
                .payload
                .into_text()
                .map(|text| (status, description, text))
        });

        match text {
            Ok((status, description, text)) => {
                let received = Received {
                    status,
                    description,
                    raw: Arc::from(text),
                };
                let message = serde_json::from_str(&received.raw).unwrap_or(Value::Null);
                trace!(status, bytes = received.raw.len(), "Payload received");
                self.emit(BayeuxEvent::DataReceived(received.notification(message)));
                Ok(received)
            }
            Err(err) => {
                warn!(error = %err, "Request failed");
                self.emit(BayeuxEvent::DataFailed(Notification::new(
                    err.http_status().unwrap_or(0),
                    err.to_string(),
                    Arc::from(""),
                    Value::Null,
                )));
                Err(err.into())
            }
        }
    }

    /// Processes every message in a payload and returns the one that
    /// answers `request`.
    fn dispatch(
        &mut self,
        request: Option<&Request>,
        received: &Received,
    ) -> ClientResult<BayeuxResponse> {
        let messages = match decode_messages(&received.raw) {
            Ok(messages) => messages,
            Err(err) => {
                warn!(error = %err, "Failed to decode payload");
                self.emit(BayeuxEvent::DataFailed(
                    received
                        .notification(Value::Null)
                        .with_description(err.to_string()),
                ));
                return Err(err.into());
            }
        };

        let mut exact = None;
        let mut loose = None;
        let mut first_error = None;

        for message in messages {
            match self.process_message(request, &message, received) {
                Ok((response, Correlation::Exact)) => {
                    exact.get_or_insert(response);
                }
                Ok((response, Correlation::Loose)) => {
                    loose.get_or_insert(response);
                }
                Ok((_, Correlation::Unrelated)) => {}
                Err(err) => {
                    warn!(error = %err, message = %message, "Failed to process message");
                    self.emit(BayeuxEvent::DataFailed(
                        received
                            .notification(message)
                            .with_description(err.to_string()),
                    ));
                    first_error.get_or_insert(err);
                }
            }
        }

        match (exact.or(loose), first_error) {
            (Some(response), _) => Ok(response),
            (None, Some(err)) => Err(err),
            (None, None) => Err(ClientError::NoResponse(
                request.and_then(|r| r.id.clone()).unwrap_or_default(),
            )),
        }
    }

    /// Handles one message. Returns its response and how it relates to
    /// `request`.
    fn process_message(
        &mut self,
        request: Option<&Request>,
        message: &Value,
        received: &Received,
    ) -> ClientResult<(BayeuxResponse, Correlation)> {
        let Some(object) = message.as_object() else {
            return Err(ProtocolError::NotAnObject.into());
        };

        let channel = match object.get("channel").and_then(Value::as_str) {
            Some(channel) if !channel.is_empty() => channel,
            _ => {
                return Err(violation(ViolationKind::MissingChannel, request, message).into());
            }
        };
        let is_meta = channel.starts_with(META_PREFIX);
        let id = object.get("id").and_then(id_string);

        if let Some(request) = request
            && is_meta
        {
            if channel != request.channel.name() {
                let err = violation(ViolationKind::ChannelMismatch, Some(request), message);
                return Err(err.into());
            }
            if let (Some(id), Some(expected)) = (&id, &request.id)
                && id != expected
            {
                let err = violation(ViolationKind::IdMismatch, Some(request), message);
                return Err(err.into());
            }
        }

        let mut correlation = match request {
            Some(request) if channel == request.channel.name() => match &id {
                Some(_) if id == request.id => Correlation::Exact,
                Some(_) => Correlation::Unrelated,
                None => Correlation::Loose,
            },
            _ => Correlation::Unrelated,
        };

        let response = self.hooks.provide_response(object.clone())?;
        trace!(channel = %response.channel(), "Dispatching message");
        let notification = received
            .notification(message.clone())
            .with_response(Arc::new(response.clone()));

        let mut is_event = false;
        match &response {
            BayeuxResponse::Handshake(handshake) => {
                self.on_handshake(handshake, request, message, notification.clone())?;
            }
            BayeuxResponse::Disconnect(disconnect) => {
                self.on_disconnect(disconnect, notification.clone());
            }
            BayeuxResponse::Subscribe(subscribe) if subscribe.response.is_successful() => {
                let channel = subscribe
                    .subscription()
                    .or_else(|| request.and_then(Request::subscription));
                if let Some(channel) = channel
                    && !self.is_subscribed(channel)
                {
                    info!(channel = %channel, "Subscribed");
                    self.subscriptions.push(channel.to_string());
                }
            }
            BayeuxResponse::Unsubscribe(unsubscribe) if unsubscribe.response.is_successful() => {
                let channel = unsubscribe
                    .subscription()
                    .or_else(|| request.and_then(Request::subscription));
                if let Some(channel) = channel {
                    info!(channel = %channel, "Unsubscribed");
                    self.subscriptions.retain(|c| c != channel);
                }
            }
            BayeuxResponse::Connect(connect) => {
                if let Some(advice) = &connect.response.advice {
                    debug!(
                        reconnect = advice.reconnect.as_str(),
                        interval = ?advice.interval,
                        "Connect advice"
                    );
                }
            }
            // An exact reply to a publish is an acknowledgement, even on a
            // subscribed channel.
            BayeuxResponse::Message(response) if correlation != Correlation::Exact => {
                if !response.is_meta() && self.is_subscribed(&response.channel) {
                    is_event = true;
                    correlation = Correlation::Unrelated;
                    self.emit(BayeuxEvent::EventReceived(notification.clone()));
                }
            }
            _ => {}
        }

        if self.hooks.process_response(request, &response) && !is_event {
            self.emit(BayeuxEvent::ResponseReceived(notification));
        }

        Ok((response, correlation))
    }

    fn on_handshake(
        &mut self,
        handshake: &HandshakeResponse,
        request: Option<&Request>,
        message: &Value,
        notification: Notification,
    ) -> ClientResult<()> {
        if !handshake.response.is_successful() {
            self.fail_handshake(notification);
            return Ok(());
        }

        match handshake.response.client_id.as_deref() {
            Some(client_id) if !client_id.is_empty() => {
                info!(client_id = %client_id, "Handshake succeeded");
                self.state = ConnectionState::Connected;
                self.client_id = Some(client_id.to_string());
                self.emit(BayeuxEvent::Connected(notification));
                Ok(())
            }
            _ => {
                self.fail_handshake(notification);
                Err(violation(ViolationKind::EmptyClientId, request, message)
                    .with_response(handshake.response.clone())
                    .into())
            }
        }
    }

    fn fail_handshake(&mut self, notification: Notification) {
        warn!(
            status = notification.status,
            description = %notification.description,
            "Handshake failed"
        );
        self.state = ConnectionState::Disconnected;
        self.client_id = None;
        self.emit(BayeuxEvent::ConnectionFailed(notification));
    }

    fn on_disconnect(&mut self, disconnect: &DisconnectResponse, mut notification: Notification) {
        if !disconnect.response.is_successful() {
            notification.status = DISCONNECT_FAILED_STATUS;
        }
        info!(
            successful = disconnect.response.is_successful(),
            "Disconnected"
        );

        self.state = ConnectionState::Disconnected;
        self.client_id = None;
        self.subscriptions.clear();
        self.stop_long_polling();
        self.emit(BayeuxEvent::Disconnected(notification));
    }

    fn start_long_polling(&mut self) -> ClientResult<()> {
        if self.state != ConnectionState::Connected {
            return Err(ClientError::invalid_state(
                "start long polling",
                self.state,
            ));
        }
        if self.long_polling_transport.is_none() {
            return Err(ClientError::LongPollingUnavailable);
        }
        if self.long_polling.is_some() {
            return Err(ClientError::LongPollingActive);
        }

        self.generation += 1;
        self.long_polling = Some(LongPoll {
            generation: self.generation,
            failures: 0,
            request: None,
            task: None,
        });
        info!("Long polling started");

        if let Err(err) = self.issue_poll() {
            self.stop_long_polling();
            return Err(err);
        }
        Ok(())
    }

    fn stop_long_polling(&mut self) {
        if let Some(poll) = self.long_polling.take() {
            if let Some(task) = poll.task {
                task.abort();
            }
            info!("Long polling stopped");
        }
    }

    fn polling(&self, generation: u64) -> bool {
        self.long_polling
            .as_ref()
            .is_some_and(|poll| poll.generation == generation)
    }

    fn issue_poll(&mut self) -> ClientResult<()> {
        let Some(transport) = self.long_polling_transport.clone() else {
            return Err(ClientError::LongPollingUnavailable);
        };

        let mut request = Request::connect(&self.options.connection_type).with_id(self.next_id());
        request.client_id = self.client_id.clone();
        let body = self.writer.write(&request)?.to_vec();
        let transport_request =
            TransportRequest::new(body).with_timeout(transport.long_polling_timeout());

        let Some(poll) = self.long_polling.as_mut() else {
            return Ok(());
        };
        let generation = poll.generation;
        let tx = self.internal_tx.clone();
        poll.task = Some(tokio::spawn(async move {
            let result = transport.send(transport_request).await;
            let _ = tx.send(Internal::PollCompleted { generation, result });
        }));
        trace!(id = request.id.as_deref().unwrap_or_default(), "Long poll issued");
        poll.request = Some(request);
        Ok(())
    }

    fn poll_completed(&mut self, generation: u64, result: TransportResult<TransportResponse>) {
        let Some(poll) = self
            .long_polling
            .as_mut()
            .filter(|poll| poll.generation == generation)
        else {
            trace!(generation, "Ignoring stale long poll");
            return;
        };
        poll.task = None;
        let request = poll.request.take();

        match self.receive(result) {
            Ok(received) => {
                if let Some(poll) = self.long_polling.as_mut() {
                    poll.failures = 0;
                }
                // Failures are already reported as events; nobody awaits a poll.
                let _ = self.dispatch(request.as_ref(), &received);
                self.continue_polling(generation);
            }
            Err(err) => self.poll_failed(generation, err),
        }
    }

    fn poll_failed(&mut self, generation: u64, err: ClientError) {
        let retries = self.options.long_polling_connect_retries;
        let delay = self.options.long_polling_retry_delay;
        let Some(poll) = self
            .long_polling
            .as_mut()
            .filter(|poll| poll.generation == generation)
        else {
            return;
        };

        poll.failures += 1;
        let failures = poll.failures;
        if failures >= retries {
            error!(failures, error = %err, "Long polling failed, giving up");
            self.stop_long_polling();
            self.emit(BayeuxEvent::LongPollingFailed(Notification::new(
                status_of(&err),
                err.to_string(),
                Arc::from(""),
                Value::Null,
            )));
            return;
        }

        warn!(failures, retries, error = %err, "Long poll failed, retrying");
        let tx = self.internal_tx.clone();
        poll.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Internal::PollRetry { generation });
        }));
    }

    fn poll_retry(&mut self, generation: u64) {
        if let Some(poll) = self
            .long_polling
            .as_mut()
            .filter(|poll| poll.generation == generation)
        {
            poll.task = None;
            self.continue_polling(generation);
        }
    }

    fn continue_polling(&mut self, generation: u64) {
        if !self.polling(generation) {
            return;
        }
        if self.state != ConnectionState::Connected {
            debug!(state = %self.state, "No longer connected");
            self.stop_long_polling();
            return;
        }
        if let Err(err) = self.issue_poll() {
            warn!(error = %err, "Failed to issue long poll");
            self.stop_long_polling();
        }
    }
}

fn violation(kind: ViolationKind, request: Option<&Request>, message: &Value) -> ProtocolViolation {
    ProtocolViolation::new(kind, request, message.to_string())
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn status_of(err: &ClientError) -> u16 {
    match err {
        ClientError::Transport(err) => err.http_status().unwrap_or(0),
        _ => 0,
    }
}
