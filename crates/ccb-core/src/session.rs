//! Chart session
//!
//! One task per chart container. It owns the sandbox host, bridge, render
//! scheduler and query orchestrator, and is the only writer of their state.
//! The loop waits on:
//! - commands from the [`SessionHandle`]
//! - inbound window messages
//! - slot store changes (query-relevant and full snapshot)
//! - debounce, timeout and throttle deadlines
//! - the in-flight data fetch
//!
//! Query-relevant slot changes re-run the query pipeline after
//! `query_debounce`; any snapshot change re-renders the current data after
//! `render_debounce`. Data arriving from a fetch is rendered with the slot
//! snapshot captured when its query was issued.

use crate::api::DatasetApi;
use crate::auth::AuthProvider;
use crate::config::{BuilderConfig, QueryStrategy};
use crate::error::BuilderError;
use crate::fetch::{fetch_data, FetchOutcome, QueryResultInfo};
use crate::orchestrator::{BuildDecision, OrchestratorConfig, QueryOrchestrator};
use crate::theme::{AppearanceMode, ThemeCatalog};
use ccb_bridge::{
    BridgeMessage, BundleSource, FrameClock, InboundEvent, IntervalFrameClock, MessageBridge,
    RenderMessage, RenderOptions, RenderScheduler, SandboxContainer, SandboxEvent, SandboxHost,
    SendOutcome, WindowId,
};
use ccb_query::{is_ready, LocalQueryBuilder, Query, QueryPrepError};
use ccb_slots::{ManifestLoad, SlotSnapshot, SlotStore};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

const COMMAND_BUFFER: usize = 32;
const INBOUND_BUFFER: usize = 64;

/// Observable state of a chart session
#[derive(Debug, Clone, PartialEq)]
pub struct ChartStatus {
    /// The live sandbox reported `moduleLoaded`
    pub module_loaded: bool,
    /// A query build or data fetch is outstanding
    pub querying: bool,
    /// User-facing error of the last pipeline run or bundle load
    pub error: Option<String>,
    /// Size and timing of the last successful query
    pub result_info: Option<QueryResultInfo>,
    /// Latest data handed to the chart
    pub data: Value,
    /// Formatted manifest validation error
    pub manifest_error: Option<String>,
    /// Selected theme name
    pub theme: String,
}

impl Default for ChartStatus {
    fn default() -> Self {
        Self {
            module_loaded: false,
            querying: false,
            error: None,
            result_info: None,
            data: Value::Array(Vec::new()),
            manifest_error: None,
            theme: String::new(),
        }
    }
}

#[derive(Debug)]
enum Command {
    Reload(oneshot::Sender<Result<WindowId, BuilderError>>),
    Resize,
    SelectTheme(String),
    SetAppearance { mode: AppearanceMode, prefers_dark: bool },
    Shutdown,
}

/// Handle to a running chart session
#[derive(Debug)]
pub struct SessionHandle {
    store: SlotStore,
    commands: mpsc::Sender<Command>,
    inbound: mpsc::Sender<InboundEvent>,
    status: watch::Receiver<ChartStatus>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Slot store driving this session
    #[must_use]
    pub fn store(&self) -> &SlotStore {
        &self.store
    }

    /// Sink for messages posted to the host window
    #[must_use]
    pub fn inbound(&self) -> mpsc::Sender<InboundEvent> {
        self.inbound.clone()
    }

    /// Status updates
    #[must_use]
    pub fn status(&self) -> watch::Receiver<ChartStatus> {
        self.status.clone()
    }

    /// Current status
    #[must_use]
    pub fn current_status(&self) -> ChartStatus {
        self.status.borrow().clone()
    }

    /// Reload the chart bundle into a fresh sandbox (hot reload)
    ///
    /// # Errors
    /// - [`BuilderError::Unauthenticated`] without credentials
    /// - [`BuilderError::Host`] if the bundle cannot be loaded
    /// - [`BuilderError::SessionClosed`] if the session has stopped
    pub async fn reload(&self) -> Result<WindowId, BuilderError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Reload(reply)).await?;
        response.await.map_err(|_| BuilderError::SessionClosed)?
    }

    /// Notify that the container was resized
    ///
    /// # Errors
    /// [`BuilderError::SessionClosed`] if the session has stopped.
    pub async fn resize(&self) -> Result<(), BuilderError> {
        self.send(Command::Resize).await
    }

    /// Select a theme by name; unknown names render with the first theme
    ///
    /// # Errors
    /// [`BuilderError::SessionClosed`] if the session has stopped.
    pub async fn select_theme(&self, name: impl Into<String>) -> Result<(), BuilderError> {
        self.send(Command::SelectTheme(name.into())).await
    }

    /// Switch the appearance mode
    ///
    /// # Errors
    /// [`BuilderError::SessionClosed`] if the session has stopped.
    pub async fn set_appearance(&self, mode: AppearanceMode, prefers_dark: bool) -> Result<(), BuilderError> {
        self.send(Command::SetAppearance { mode, prefers_dark }).await
    }

    /// Stop the session, tearing down the sandbox and pending frames
    ///
    /// # Errors
    /// [`BuilderError::SessionClosed`] if the session task panicked.
    pub async fn shutdown(self) -> Result<(), BuilderError> {
        if self.commands.send(Command::Shutdown).await.is_err() {
            tracing::debug!("session already stopped");
        }
        self.task.await.map_err(|_| BuilderError::SessionClosed)
    }

    async fn send(&self, command: Command) -> Result<(), BuilderError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| BuilderError::SessionClosed)
    }
}

/// Chart session builder
pub struct ChartSession {
    config: BuilderConfig,
    container: Arc<dyn SandboxContainer>,
    bundle: Arc<dyn BundleSource>,
    api: Arc<dyn DatasetApi>,
    auth: Arc<dyn AuthProvider>,
    manifest: ManifestLoad,
    clock: Option<Arc<dyn FrameClock>>,
    themes: ThemeCatalog,
}

impl ChartSession {
    /// Session over a container, bundle source, backend and auth provider
    #[must_use]
    pub fn new(
        config: BuilderConfig,
        container: Arc<dyn SandboxContainer>,
        bundle: Arc<dyn BundleSource>,
        api: Arc<dyn DatasetApi>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            config,
            container,
            bundle,
            api,
            auth,
            manifest: ManifestLoad::default(),
            clock: None,
            themes: ThemeCatalog::builtin(),
        }
    }

    /// With the chart's slot manifest
    #[must_use]
    pub fn with_manifest(mut self, manifest: ManifestLoad) -> Self {
        self.manifest = manifest;
        self
    }

    /// With a custom frame clock
    #[must_use]
    pub fn with_frame_clock(mut self, clock: Arc<dyn FrameClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// With a custom theme catalog
    #[must_use]
    pub fn with_themes(mut self, themes: ThemeCatalog) -> Self {
        self.themes = themes;
        self
    }

    /// Start the session task
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(self) -> SessionHandle {
        let Self {
            config,
            container,
            bundle,
            api,
            auth,
            manifest,
            clock,
            themes,
        } = self;

        let store = SlotStore::new(manifest.configs);
        let bridge = Arc::new(MessageBridge::with_target_origin(&config.bundle.target_origin));
        let clock = clock.unwrap_or_else(|| Arc::new(IntervalFrameClock::new(config.timing.frame_interval())));
        let scheduler = RenderScheduler::new(Arc::clone(&bridge), clock);
        let host = SandboxHost::new(container, bundle, bridge);

        let theme = config.display.initial_theme();
        let (status, status_rx) = watch::channel(ChartStatus {
            manifest_error: manifest.error,
            theme: theme.clone(),
            ..ChartStatus::default()
        });
        let (commands, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (inbound, inbound_rx) = mpsc::channel(INBOUND_BUFFER);

        let actor = SessionActor {
            orchestrator: QueryOrchestrator::new(OrchestratorConfig::from_timing(
                &config.timing,
                config.query.stale_policy,
            )),
            local: config.query.local_builder(),
            store: store.clone(),
            host,
            scheduler,
            api,
            auth,
            themes,
            theme,
            status,
            query_due: None,
            render_due: None,
            awaiting: None,
            build_wanted: false,
            fetch: None,
            shown: Shown {
                data: Value::Array(Vec::new()),
                snapshot: store.snapshot(),
            },
            config,
        };
        let task = tokio::spawn(actor.run(commands_rx, inbound_rx));

        SessionHandle {
            store,
            commands,
            inbound,
            status: status_rx,
            task,
        }
    }
}

#[derive(Debug)]
struct AwaitedBuild {
    request_id: u64,
    snapshot: SlotSnapshot,
}

#[derive(Debug)]
struct InFlightFetch {
    handle: JoinHandle<FetchOutcome>,
    snapshot: SlotSnapshot,
}

#[derive(Debug)]
struct Shown {
    data: Value,
    snapshot: SlotSnapshot,
}

struct SessionActor {
    config: BuilderConfig,
    store: SlotStore,
    host: SandboxHost,
    scheduler: RenderScheduler,
    api: Arc<dyn DatasetApi>,
    auth: Arc<dyn AuthProvider>,
    themes: ThemeCatalog,
    theme: String,
    local: LocalQueryBuilder,
    orchestrator: QueryOrchestrator,
    status: watch::Sender<ChartStatus>,
    query_due: Option<Instant>,
    render_due: Option<Instant>,
    awaiting: Option<AwaitedBuild>,
    build_wanted: bool,
    fetch: Option<InFlightFetch>,
    shown: Shown,
}

impl SessionActor {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>, mut inbound: mpsc::Receiver<InboundEvent>) {
        let mut snapshots = self.store.subscribe();
        let mut signatures = self.store.subscribe_query();
        self.start().await;

        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                Some(event) = inbound.recv() => self.handle_inbound(&event),
                Ok(()) = signatures.changed() => {
                    self.query_due = Some(Instant::now() + self.config.timing.query_debounce());
                }
                Ok(()) = snapshots.changed() => {
                    self.render_due = Some(Instant::now() + self.config.timing.render_debounce());
                }
                () = sleep_until(deadline) => self.on_deadline(Instant::now()),
                (outcome, snapshot) = join_fetch(&mut self.fetch) => {
                    let outcome = outcome.unwrap_or_else(|| FetchOutcome::failed("Chart data request was interrupted."));
                    self.apply_outcome(outcome, snapshot);
                }
            }
        }

        self.stop().await;
    }

    async fn start(&mut self) {
        if self.auth.is_authenticated() {
            if let Err(e) = self.load_bundle().await {
                tracing::error!(error = %e, "initial chart load failed");
            }
        } else {
            tracing::info!("not authenticated, chart bundle not loaded");
        }
        self.query_due = Some(Instant::now());
    }

    async fn stop(&mut self) {
        self.abort_fetch();
        self.scheduler.cancel_all();
        self.host.teardown().await;
        self.publish(|s| {
            s.module_loaded = false;
            s.querying = false;
        });
        tracing::info!("chart session stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Reload(reply) => {
                let result = if self.auth.is_authenticated() {
                    self.load_bundle().await
                } else {
                    Err(BuilderError::Unauthenticated)
                };
                if reply.send(result).is_err() {
                    tracing::debug!("reload caller went away");
                }
            }
            Command::Resize => {
                let message = self.render_message(Value::Null, &self.shown.snapshot);
                self.scheduler.schedule_resize(message.to_resize());
            }
            Command::SelectTheme(name) => {
                if !self.themes.contains(&name) {
                    tracing::warn!(theme = %name, "unknown theme, using default");
                }
                self.set_theme(name);
            }
            Command::SetAppearance { mode, prefers_dark } => {
                self.set_theme(mode.effective_theme(prefers_dark).to_string());
            }
            Command::Shutdown => {}
        }
    }

    async fn load_bundle(&mut self) -> Result<WindowId, BuilderError> {
        match self.host.load_bundle().await {
            Ok(window) => {
                self.scheduler.cancel_all();
                self.orchestrator.reset();
                self.awaiting = None;
                self.build_wanted = self.config.query.strategy == QueryStrategy::Sandbox;
                self.publish(|s| {
                    s.module_loaded = false;
                    if s.error.as_deref().is_some_and(|e| e.starts_with(BUNDLE_ERROR_PREFIX)) {
                        s.error = None;
                    }
                });
                Ok(window)
            }
            Err(e) => {
                self.publish(|s| s.error = Some(format!("{BUNDLE_ERROR_PREFIX}: {e}")));
                Err(e.into())
            }
        }
    }

    fn handle_inbound(&mut self, event: &InboundEvent) {
        let Some(event) = self.host.bridge().accept(event) else {
            return;
        };
        match event {
            SandboxEvent::ModuleLoaded => {
                self.publish(|s| s.module_loaded = true);
                if std::mem::take(&mut self.build_wanted) {
                    self.run_query(Instant::now());
                } else {
                    self.render_shown();
                }
            }
            SandboxEvent::QueryLoaded { query, request_id } => self.on_query_loaded(query, request_id),
            // logged by the bridge
            SandboxEvent::ModuleError { .. } => {}
        }
    }

    fn on_deadline(&mut self, now: Instant) {
        if self.render_due.is_some_and(|due| due <= now) {
            self.render_due = None;
            self.shown.snapshot = self.store.snapshot();
            self.render_shown();
        }
        if self.query_due.is_some_and(|due| due <= now) {
            self.query_due = None;
            self.run_query(now);
        }
        if let Some(request_id) = self.orchestrator.poll_timeout(now) {
            self.on_build_timeout(request_id);
        }
        if self.orchestrator.take_retrigger(now) {
            tracing::debug!("re-issuing dropped build request");
            self.run_query(now);
        }
        self.refresh_querying();
    }

    fn next_deadline(&self) -> Option<Instant> {
        [self.query_due, self.render_due, self.orchestrator.next_deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    /// Derive a query from the current slots and start fetching its data
    fn run_query(&mut self, now: Instant) {
        self.abort_fetch();
        let snapshot = self.store.snapshot();

        if !snapshot.has_any_content() || !is_ready(snapshot.slots(), self.store.configs()) {
            tracing::debug!(revision = snapshot.revision(), "slots not ready, emitting empty result");
            self.awaiting = None;
            self.apply_outcome(FetchOutcome::empty(), snapshot);
            return;
        }

        match self.config.query.strategy {
            QueryStrategy::Local => {
                let query = self.local.build(snapshot.slots(), self.store.configs());
                self.start_fetch(query, snapshot);
            }
            QueryStrategy::Sandbox => self.request_build(snapshot, now),
        }
    }

    fn request_build(&mut self, snapshot: SlotSnapshot, now: Instant) {
        if !self.host.bridge().is_ready() {
            tracing::debug!("sandbox not ready, build deferred until moduleLoaded");
            self.build_wanted = true;
            return;
        }

        let BuildDecision::Issue { request_id } = self.orchestrator.try_begin_build(now) else {
            return;
        };
        let message = BridgeMessage::BuildQuery {
            slots: snapshot.slots().to_vec(),
            slot_configurations: self.store.configs().to_vec(),
            request_id,
        };
        match self.host.bridge().send(&message) {
            SendOutcome::Sent => tracing::debug!(request_id, "buildQuery sent"),
            SendOutcome::Dropped => tracing::debug!(request_id, "buildQuery dropped"),
            SendOutcome::Failed(e) => tracing::error!(request_id, error = %e, "buildQuery post failed"),
        }
        self.awaiting = Some(AwaitedBuild { request_id, snapshot });
        self.refresh_querying();
    }

    fn on_query_loaded(&mut self, query: Option<Query>, request_id: Option<u64>) {
        if !self.orchestrator.accept_response(request_id) {
            return;
        }
        let Some(awaited) = self.awaiting.take() else {
            tracing::debug!(?request_id, "queryLoaded with no build awaited");
            self.refresh_querying();
            return;
        };

        let query = match query {
            Some(query) => Ok(query),
            None => {
                tracing::debug!(request_id = awaited.request_id, "chart deferred query to host");
                self.local.build(awaited.snapshot.slots(), self.store.configs())
            }
        };
        self.start_fetch(query, awaited.snapshot);
    }

    fn on_build_timeout(&mut self, request_id: u64) {
        if !self.config.query.fallback_on_timeout {
            return;
        }
        let Some(awaited) = self.awaiting.as_ref().filter(|a| a.request_id == request_id) else {
            return;
        };
        tracing::warn!(request_id, "no queryLoaded in time, using local query");
        let snapshot = awaited.snapshot.clone();
        let query = self.local.build(snapshot.slots(), self.store.configs());
        self.start_fetch(query, snapshot);
    }

    fn start_fetch(&mut self, query: Result<Query, QueryPrepError>, snapshot: SlotSnapshot) {
        self.abort_fetch();
        let query = match query {
            Ok(query) => query,
            Err(e) => {
                tracing::warn!(error = %e, "query preparation failed");
                self.apply_outcome(FetchOutcome::prepare_failed(), snapshot);
                return;
            }
        };

        let api = Arc::clone(&self.api);
        let timeout = Duration::from_millis(self.config.api.timeout_ms);
        let handle = tokio::spawn(async move { fetch_data(api.as_ref(), &query, timeout).await });
        self.fetch = Some(InFlightFetch { handle, snapshot });
        self.publish(|s| {
            s.querying = true;
            s.error = None;
            s.result_info = None;
        });
    }

    fn abort_fetch(&mut self) {
        if let Some(fetch) = self.fetch.take() {
            tracing::debug!("superseded data fetch aborted");
            fetch.handle.abort();
        }
    }

    fn apply_outcome(&mut self, outcome: FetchOutcome, snapshot: SlotSnapshot) {
        let FetchOutcome {
            data,
            result_info,
            error,
        } = outcome;
        self.shown = Shown {
            data: data.clone(),
            snapshot,
        };
        self.publish(|s| {
            s.data = data;
            s.result_info = result_info;
            s.error = error;
        });
        self.refresh_querying();
        self.render_shown();
    }

    fn set_theme(&mut self, name: String) {
        self.publish(|s| s.theme.clone_from(&name));
        self.theme = name;
        self.render_shown();
    }

    fn render_shown(&self) {
        let message = self.render_message(self.shown.data.clone(), &self.shown.snapshot);
        self.scheduler.schedule_render(message);
    }

    fn render_message(&self, data: Value, snapshot: &SlotSnapshot) -> RenderMessage {
        RenderMessage {
            data,
            slots: snapshot.slots().to_vec(),
            slot_configurations: self.store.configs().to_vec(),
            options: RenderOptions {
                theme: self.themes.resolve(&self.theme).theme.clone(),
            },
            language: self.config.display.language.clone(),
            dimensions: self.host.container().dimensions(),
        }
    }

    /// Busy while a fetch runs or an awaited build is still within its timeout
    fn refresh_querying(&self) {
        let building = self.awaiting.is_some() && self.orchestrator.query_in_progress();
        let querying = building || self.fetch.is_some();
        self.status.send_if_modified(|s| {
            let changed = s.querying != querying;
            s.querying = querying;
            changed
        });
    }

    fn publish(&self, update: impl FnOnce(&mut ChartStatus)) {
        self.status.send_modify(update);
    }
}

const BUNDLE_ERROR_PREFIX: &str = "Failed to load chart bundle";

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn join_fetch(fetch: &mut Option<InFlightFetch>) -> (Option<FetchOutcome>, SlotSnapshot) {
    let Some(in_flight) = fetch.as_mut() else {
        return std::future::pending().await;
    };
    let result = (&mut in_flight.handle).await;
    let snapshot = in_flight.snapshot.clone();
    *fetch = None;
    if let Err(e) = &result {
        tracing::error!(error = %e, "data fetch task failed");
    }
    (result.ok(), snapshot)
}
