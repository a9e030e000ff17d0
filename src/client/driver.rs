//! The task owning the transport
//!
//! One driver runs per client. It waits on caller commands, transport reads,
//! the pending connect attempt and the reconnect/staleness/idle timers,
//! feeds what happened to the [`Lifecycle`], and carries out the actions it
//! answers with. Each step completes, including the routing of every message
//! framed from a read, before the next one is awaited.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};

use super::lifecycle::{Action, ConnectionState, Lifecycle, Notification};
use super::transport::Connector;
use crate::{
    Result,
    config::{ClientConfig, ReconnectPolicy},
    error::GpsdError,
    event::{Dispatcher, Event},
    protocol::{GpsdJsonRequest, v3::RequestMessage},
};

const READ_CHUNK: usize = 4096;

/// Requests from client handles
#[derive(Debug)]
pub(crate) enum Command {
    Connect(oneshot::Sender<Result<()>>),
    Disconnect(oneshot::Sender<()>),
    Send(RequestMessage),
}

enum Step<S> {
    Command(Command),
    Shutdown,
    Read(io::Result<usize>),
    Connected(io::Result<S>),
    ReconnectTick,
    StalenessTick,
    Idle,
}

pub(crate) struct Driver<C: Connector> {
    connector: C,
    config: ClientConfig,
    lifecycle: Lifecycle,
    dispatcher: Arc<Dispatcher>,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<ConnectionState>,
    stream: Option<C::Stream>,
    connecting: Option<BoxFuture<'static, io::Result<C::Stream>>>,
    reconnect_timer: Option<Interval>,
    staleness_timer: Option<Interval>,
    idle_deadline: Option<Pin<Box<Sleep>>>,
    read_buf: Vec<u8>,
    connect_waiters: Vec<oneshot::Sender<Result<()>>>,
    close_waiters: Vec<oneshot::Sender<()>>,
}

impl<C: Connector> Driver<C> {
    pub(crate) fn new(
        connector: C,
        config: ClientConfig,
        dispatcher: Arc<Dispatcher>,
        commands: mpsc::UnboundedReceiver<Command>,
        state: watch::Sender<ConnectionState>,
    ) -> Self {
        let lifecycle = Lifecycle::new(&config, dispatcher.clone(), Instant::now().into_std());
        Driver {
            connector,
            config,
            lifecycle,
            dispatcher,
            commands,
            state,
            stream: None,
            connecting: None,
            reconnect_timer: None,
            staleness_timer: None,
            idle_deadline: None,
            read_buf: vec![0; READ_CHUNK],
            connect_waiters: Vec::new(),
            close_waiters: Vec::new(),
        }
    }

    /// Runs until every client handle is dropped
    pub(crate) async fn run(mut self) {
        if let ReconnectPolicy::StalenessThreshold { interval, .. } = self.config.reconnect {
            self.staleness_timer = Some(periodic(interval));
        }

        tracing::debug!(host = %self.config.host, port = self.config.port, "gpsd driver started");
        loop {
            let step = self.next_step().await;
            if matches!(step, Step::Shutdown) {
                break;
            }
            self.handle(step).await;
            self.state.send_replace(self.lifecycle.state());
        }
        tracing::debug!("gpsd driver stopped");
    }

    async fn next_step(&mut self) -> Step<C::Stream> {
        tokio::select! {
            cmd = self.commands.recv() => match cmd {
                Some(cmd) => Step::Command(cmd),
                None => Step::Shutdown,
            },
            res = read_chunk(&mut self.stream, &mut self.read_buf) => Step::Read(res),
            res = finish_connect(&mut self.connecting) => Step::Connected(res),
            _ = tick(&mut self.reconnect_timer) => Step::ReconnectTick,
            _ = tick(&mut self.staleness_timer) => Step::StalenessTick,
            _ = expire(&mut self.idle_deadline) => Step::Idle,
        }
    }

    async fn handle(&mut self, step: Step<C::Stream>) {
        let now = Instant::now().into_std();
        let actions = match step {
            Step::Shutdown => Vec::new(),
            Step::Command(Command::Connect(waiter)) => {
                let actions = self.lifecycle.connect(now);
                if self.lifecycle.is_connected() {
                    let _ = waiter.send(Ok(()));
                } else {
                    self.connect_waiters.push(waiter);
                }
                actions
            }
            Step::Command(Command::Disconnect(waiter)) => {
                self.close_waiters.push(waiter);
                self.lifecycle.disconnect()
            }
            Step::Command(Command::Send(request)) => {
                if self.lifecycle.is_connected() {
                    vec![Action::Send(request)]
                } else {
                    tracing::warn!(?request, "request dropped, not connected");
                    self.dispatcher.dispatch(Event::Socket(
                        io::Error::new(io::ErrorKind::NotConnected, "not connected to gpsd").into(),
                    ));
                    Vec::new()
                }
            }
            Step::Read(Ok(0)) => self.closed(),
            Step::Read(Ok(n)) => {
                self.touch();
                self.lifecycle
                    .notify(Notification::Data(self.read_buf[..n].to_vec()), now)
            }
            Step::Read(Err(err)) => {
                self.lifecycle.notify(Notification::Error(err), now);
                self.closed()
            }
            Step::Connected(Ok(stream)) => {
                self.connecting = None;
                self.stream = Some(stream);
                self.touch();
                let actions = self.lifecycle.notify(Notification::Connect, now);
                for waiter in self.connect_waiters.drain(..) {
                    let _ = waiter.send(Ok(()));
                }
                actions
            }
            Step::Connected(Err(err)) => {
                self.connecting = None;
                tracing::debug!(host = %self.config.host, port = self.config.port, error = %err, "connect failed");
                self.fail_connect_waiters(&err);
                self.lifecycle.notify(Notification::Error(err), now);
                self.lifecycle.notify(Notification::Close, now)
            }
            Step::ReconnectTick => self.lifecycle.on_reconnect_tick(),
            Step::StalenessTick => self.lifecycle.on_staleness_tick(now),
            Step::Idle => {
                self.idle_deadline = None;
                self.lifecycle.notify(Notification::Timeout, now)
            }
        };

        self.perform(actions).await;

        if self.stream.is_none() && self.connecting.is_none() {
            self.resolve_close_waiters();
        }
    }

    async fn perform(&mut self, actions: Vec<Action>) {
        let mut queue = VecDeque::from(actions);
        while let Some(action) = queue.pop_front() {
            match action {
                Action::Connect => {
                    tracing::debug!(host = %self.config.host, port = self.config.port, "connecting");
                    self.connecting = Some(self.connector.connect(
                        self.config.host.clone(),
                        self.config.port,
                        self.config.keep_alive,
                    ));
                }
                Action::Send(request) => {
                    if let Err(err) = self.write(&request).await {
                        queue.extend(self.broken(err));
                    }
                }
                Action::End => {
                    if let Some(stream) = self.stream.as_mut() {
                        if let Err(err) = stream.close().await {
                            queue.extend(self.broken(err));
                        }
                    }
                }
                Action::Destroy => {
                    self.stream = None;
                    self.idle_deadline = None;
                    if self.connecting.take().is_some() {
                        let aborted =
                            io::Error::new(io::ErrorKind::ConnectionAborted, "connect attempt aborted");
                        self.fail_connect_waiters(&aborted);
                    }
                    self.resolve_close_waiters();
                }
                Action::ArmReconnect(interval) => {
                    self.reconnect_timer = Some(periodic(interval));
                }
                Action::DisarmReconnect => {
                    self.reconnect_timer = None;
                }
            }
        }
    }

    async fn write(&mut self, request: &RequestMessage) -> io::Result<()> {
        let line = match request.to_line() {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode request");
                return Ok(());
            }
        };

        let Some(stream) = self.stream.as_mut() else {
            return Ok(());
        };
        tracing::trace!(command = line.trim_end(), "sending request");
        stream.write_all(line.as_bytes()).await?;
        stream.flush().await
    }

    /// The transport closed
    fn closed(&mut self) -> Vec<Action> {
        self.stream = None;
        self.idle_deadline = None;
        let actions = self.lifecycle.on_close();
        self.resolve_close_waiters();
        actions
    }

    /// A write failed; the transport is unusable
    fn broken(&mut self, err: io::Error) -> Vec<Action> {
        self.lifecycle.on_error(err);
        self.closed()
    }

    /// Restarts the idle timeout after activity
    fn touch(&mut self) {
        self.idle_deadline = self
            .config
            .idle_timeout
            .map(|timeout| Box::pin(tokio::time::sleep(timeout)));
    }

    fn fail_connect_waiters(&mut self, err: &io::Error) {
        for waiter in self.connect_waiters.drain(..) {
            let copy = io::Error::new(err.kind(), err.to_string());
            let _ = waiter.send(Err(GpsdError::Io(copy)));
        }
    }

    fn resolve_close_waiters(&mut self) {
        for waiter in self.close_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }
}

/// Interval whose first tick is one period away
fn periodic(period: std::time::Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn read_chunk<S>(stream: &mut Option<S>, buf: &mut [u8]) -> io::Result<usize>
where
    S: futures_io::AsyncRead + Unpin,
{
    match stream {
        Some(stream) => stream.read(buf).await,
        None => std::future::pending().await,
    }
}

async fn finish_connect<S>(attempt: &mut Option<BoxFuture<'static, io::Result<S>>>) -> io::Result<S> {
    match attempt {
        Some(attempt) => attempt.await,
        None => std::future::pending().await,
    }
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn expire(deadline: &mut Option<Pin<Box<Sleep>>>) {
    match deadline {
        Some(deadline) => deadline.as_mut().await,
        None => std::future::pending().await,
    }
}
