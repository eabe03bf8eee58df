//! The session: one connected head unit, owned by the UI thread.
//!
//! A [`Session`] owns every piece of bridge state (navigation stack, registry,
//! connection state, event sink, refresh debouncer, in-flight image loads)
//! together with the host surface and the UI message loop. Nothing is global:
//! two sessions in one process are fully independent.
//!
//! On the UI thread, call [`Session::dispatch`] and the `on_*` methods
//! directly. From any other thread, go through a [`SessionHandle`], which posts
//! onto the loop; [`Session::pump_at`] or [`Session::run`] then handles the
//! posted work in arrival order.
//!
//! # Example
//!
//! ```
//! use dashstack::prelude::*;
//! use serde_json::json;
//!
//! let mut session = Session::new(BridgeConfig::default(), MemoryHost::new()).unwrap();
//! let result = session.dispatch(Command::new(
//!     "set-root-template",
//!     json!({"runtimeType": "ListTemplate", "template": {"elementId": "home"}}),
//! ));
//! assert!(result.is_ok());
//!
//! let native = session.host().top_native().unwrap();
//! assert!(native.as_list().unwrap().is_loading());
//! ```

use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use dashstack_core::{
    LoopError, LoopEvent, LoopProxy, MessageLoop, ReplySender, ThreadAffinity, reply_pair,
};
use serde_json::{Value, json};

use crate::config::BridgeConfig;
use crate::element::ElementId;
use crate::error::{BridgeError, Result};
use crate::host::HostSurface;
use crate::image::{ImageCompletion, ImageRequest, ImageResolver, PendingImages};
use crate::lifecycle::{ConnectionMonitor, ConnectionState, HostLifecycle};
use crate::model::Template;
use crate::payload::decode_template;
use crate::protocol::{
    Args, ChannelSink, Command, CommandResult, EventChannel, EventSink, Method, OutboundEvent,
};
use crate::refresh::RefreshDebouncer;
use crate::registry::EntryKey;
use crate::stack::{NavigationStack, StackChange};

/// Longest the blocking loop sleeps between checks.
const IDLE_WAIT: Duration = Duration::from_millis(500);

/// A user interaction reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostInteraction {
    ItemSelected(ElementId),
    /// Bar, grid, map or action button.
    ButtonPressed(ElementId),
    SearchTextChanged { element_id: ElementId, text: String },
    /// The host dismissed the presented template itself.
    PresentationDismissed,
}

/// Work posted onto the session's loop.
#[derive(Debug)]
pub enum SessionMessage {
    Command {
        command: Command,
        reply: Option<ReplySender<CommandResult>>,
    },
    Lifecycle(HostLifecycle),
    Interaction(HostInteraction),
    HostPopped,
    ImageResolved(ImageCompletion),
}

/// Cross-thread handle to a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    proxy: LoopProxy<SessionMessage>,
    owner: ThreadAffinity,
}

impl SessionHandle {
    /// Queue a command whose result nobody waits for.
    pub fn post_command(&self, command: Command) -> std::result::Result<(), LoopError> {
        self.proxy.post(SessionMessage::Command {
            command,
            reply: None,
        })
    }

    /// Queue a command and block until the UI thread has handled it.
    ///
    /// Fails with [`LoopError::WouldBlockOwner`] on the UI thread itself,
    /// which would be waiting on its own queue.
    pub fn dispatch_blocking(
        &self,
        command: Command,
        timeout: Option<Duration>,
    ) -> std::result::Result<CommandResult, LoopError> {
        if self.owner.is_same_thread() {
            return Err(LoopError::WouldBlockOwner);
        }
        let (reply, receiver) = reply_pair();
        self.proxy.post(SessionMessage::Command {
            command,
            reply: Some(reply),
        })?;
        match timeout {
            Some(timeout) => receiver.wait_timeout(timeout),
            None => receiver.wait(),
        }
    }

    pub fn lifecycle(&self, callback: HostLifecycle) -> std::result::Result<(), LoopError> {
        self.proxy.post(SessionMessage::Lifecycle(callback))
    }

    pub fn interaction(&self, interaction: HostInteraction) -> std::result::Result<(), LoopError> {
        self.proxy.post(SessionMessage::Interaction(interaction))
    }

    pub fn host_popped(&self) -> std::result::Result<(), LoopError> {
        self.proxy.post(SessionMessage::HostPopped)
    }

    /// Stop [`Session::run`] once everything queued before this is handled.
    pub fn quit(&self) -> std::result::Result<(), LoopError> {
        self.proxy.quit()
    }
}

pub struct Session<H: HostSurface> {
    config: BridgeConfig,
    host: H,
    stack: NavigationStack,
    connection: ConnectionMonitor,
    events: EventChannel,
    refresh: RefreshDebouncer,
    ui_loop: MessageLoop<SessionMessage>,
    images: Option<Box<dyn ImageResolver>>,
    pending_images: PendingImages,
    faulted: Option<String>,
    quit_requested: bool,
}

impl<H: HostSurface + std::fmt::Debug> std::fmt::Debug for Session<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host)
            .field("stack", &self.stack.state())
            .field("connection", &self.connection.state())
            .field("events", &self.events)
            .field("pending_images", &self.pending_images.len())
            .field("faulted", &self.faulted)
            .finish_non_exhaustive()
    }
}

impl<H: HostSurface> Session<H> {
    /// Create a session bound to the current thread.
    pub fn new(config: BridgeConfig, host: H) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            target: "dashstack::session",
            max_stack_depth = config.max_stack_depth,
            refresh_debounce_ms = config.refresh_debounce_ms,
            "session created"
        );
        Ok(Self {
            stack: NavigationStack::new(config.max_stack_depth),
            config,
            host,
            connection: ConnectionMonitor::new(),
            events: EventChannel::new(),
            refresh: RefreshDebouncer::new(),
            ui_loop: MessageLoop::new(),
            images: None,
            pending_images: PendingImages::new(),
            faulted: None,
            quit_requested: false,
        })
    }

    pub fn with_image_resolver<R: ImageResolver + 'static>(mut self, resolver: R) -> Self {
        self.images = Some(Box::new(resolver));
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn stack(&self) -> &NavigationStack {
        &self.stack
    }

    /// The template currently on top of the navigation stack.
    pub fn current_template(&self) -> Option<&Template> {
        self.stack.top()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Whether a fatal host failure has stopped the session.
    pub fn is_faulted(&self) -> bool {
        self.faulted.is_some()
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn pending_image_loads(&self) -> usize {
        self.pending_images.len()
    }

    pub fn refresh(&self) -> &RefreshDebouncer {
        &self.refresh
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            proxy: self.ui_loop.proxy(),
            owner: self.ui_loop.affinity(),
        }
    }

    /// Register the outbound event sink, replacing any previous one.
    pub fn register_sink<S: EventSink + 'static>(&mut self, sink: S) {
        self.events.register(Box::new(sink));
    }

    /// Register a bounded [`ChannelSink`] sized by the configured outbound
    /// queue capacity and return its receiving end.
    pub fn open_event_channel(&mut self) -> Receiver<OutboundEvent> {
        let (sink, receiver) = ChannelSink::bounded(self.config.outbound_queue_capacity);
        self.register_sink(sink);
        receiver
    }

    pub fn clear_sink(&mut self) {
        self.events.clear();
    }

    /// Handle one command. Always produces exactly one result.
    pub fn dispatch(&mut self, command: Command) -> CommandResult {
        self.dispatch_at(command, Instant::now())
    }

    /// [`dispatch`](Self::dispatch) with an explicit clock for timers the
    /// command starts.
    pub fn dispatch_at(&mut self, command: Command, now: Instant) -> CommandResult {
        self.ui_loop.affinity().debug_assert_same_thread();

        let Some(method) = Method::parse(&command.method) else {
            tracing::warn!(target: "dashstack::session", method = %command.method, "unknown method");
            return CommandResult::unknown_method(&command.method);
        };
        if let Some(reason) = &self.faulted {
            return CommandResult::failure(&BridgeError::HostUnavailable(reason.clone()));
        }

        match self.execute(method, &command.args, now) {
            Ok(value) => {
                tracing::trace!(target: "dashstack::session", %method, "command ok");
                CommandResult::success(value)
            }
            Err(err) => {
                self.note_failure(method.name(), &err);
                CommandResult::failure(&err)
            }
        }
    }

    fn note_failure(&mut self, context: &str, err: &BridgeError) {
        if let BridgeError::HostUnavailable(reason) = err {
            tracing::error!(target: "dashstack::session", context, %err, "host unavailable; session stopped");
            self.faulted = Some(reason.clone());
        } else {
            tracing::warn!(target: "dashstack::session", context, code = err.code(), %err, "command failed");
        }
    }

    fn decode(&self, args: &Args<'_>) -> Result<Template> {
        let runtime_type = args.str("runtimeType")?;
        let payload = args.value("template")?.clone();
        decode_template(runtime_type, payload, &self.config.limits)
    }

    fn execute(&mut self, method: Method, args: &Value, now: Instant) -> Result<Value> {
        let args = Args::new(args)?;
        match method {
            Method::SetRootTemplate => {
                let template = self.decode(&args)?;
                let change = self.stack.set_root(template, &mut self.host, &mut self.events)?;
                self.after_change(&change);
                Ok(Value::Bool(true))
            }
            Method::PushTemplate => {
                let template = self.decode(&args)?;
                let change = self.stack.push(template, &mut self.host, &mut self.events)?;
                self.after_change(&change);
                Ok(Value::Bool(true))
            }
            Method::PopTemplate => {
                let count = args.optional_u64("count")?.unwrap_or(1);
                let count = usize::try_from(count)
                    .map_err(|_| BridgeError::bad_arguments("pop count out of range"))?;
                let change = self.stack.pop(count, &mut self.host, &mut self.events)?;
                self.after_change(&change);
                Ok(Value::Bool(true))
            }
            Method::PopToRoot => {
                let change = self.stack.pop_to_root(&mut self.host, &mut self.events)?;
                self.after_change(&change);
                Ok(Value::Bool(true))
            }
            Method::PresentModal => {
                let template = self.decode(&args)?;
                let change = self.stack.present(template, &mut self.host, &mut self.events)?;
                self.after_change(&change);
                Ok(Value::Bool(true))
            }
            Method::ClosePresented => {
                let change = self.stack.close_present(&mut self.host, &mut self.events)?;
                self.after_change(&change);
                Ok(Value::Bool(true))
            }
            Method::UpdateTemplate => {
                let id = args.element_id("elementId")?;
                let delta = args.value("delta")?.clone();
                let (key, changed) =
                    self.stack
                        .update_template(&id, delta, &self.config.limits, &mut self.host)?;
                if changed {
                    self.request_images(key);
                }
                Ok(Value::Bool(changed))
            }
            Method::UpdateItem => {
                let id = args.element_id("elementId")?;
                let delta = args.value("delta")?.clone();
                let (key, changed) = self.stack.update_item(&id, delta, &mut self.host)?;
                if changed {
                    self.request_images(key);
                }
                Ok(Value::Bool(changed))
            }
            Method::AcknowledgeSelection => {
                let id = args.element_id("elementId")?;
                let released = self.stack.acknowledge_selection(&id, &mut self.host)?;
                Ok(Value::Bool(released))
            }
            Method::GetConfig => {
                let limits = &self.config.limits;
                Ok(json!({
                    "maxStackDepth": self.config.max_stack_depth,
                    "maxListItems": limits.max_list_items,
                    "maxSections": limits.max_sections,
                    "maxGridButtons": limits.max_grid_buttons,
                    "maxMapButtons": limits.max_map_buttons,
                    "maxBarButtons": limits.max_bar_buttons,
                }))
            }
            Method::ForceRefresh => {
                let interval = args
                    .optional_u64("intervalMs")?
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| self.config.refresh_debounce());
                self.request_refresh_at(now, interval);
                Ok(Value::Bool(true))
            }
            Method::GetStack => Ok(json!({
                "stack": self.stack.stack_ids(),
                "presented": self.stack.presented().map(|t| t.element_id().clone()),
                "depth": self.stack.depth(),
                "maxDepth": self.stack.max_depth(),
            })),
        }
    }

    fn after_change(&mut self, change: &StackChange) {
        for &key in &change.removed {
            self.pending_images.cancel_entry(key);
        }
        if let Some(key) = change.refreshed {
            self.pending_images.cancel_entry(key);
            self.request_images(key);
        }
        if let Some(key) = change.added {
            self.request_images(key);
        }
    }

    fn request_images(&mut self, key: EntryKey) {
        let Some(resolver) = &self.images else {
            return;
        };
        let Some(template) = self.stack.template(key) else {
            return;
        };

        for (element, reference) in template.unresolved_images() {
            if self.pending_images.is_pending(key, &element, &reference) {
                continue;
            }
            let request = ImageRequest {
                entry: key,
                element,
                reference,
            };
            let token = resolver.resolve(request.clone(), &self.ui_loop.proxy());
            self.pending_images.insert(&request, token);
        }
    }

    fn on_image_resolved(&mut self, done: ImageCompletion) {
        let ImageCompletion { request, result } = done;
        if !self.pending_images.complete(&request) {
            tracing::trace!(
                target: "dashstack::image",
                element_id = %request.element,
                "discarding completion for cancelled load"
            );
            return;
        }
        if self.faulted.is_some() {
            return;
        }

        match result {
            Ok(image) => {
                let applied = self.stack.apply_image(
                    request.entry,
                    &request.element,
                    &request.reference,
                    image,
                    &mut self.host,
                );
                match applied {
                    Ok(true) => {}
                    Ok(false) => tracing::debug!(
                        target: "dashstack::image",
                        element_id = %request.element,
                        "discarding image for element that is gone or changed"
                    ),
                    Err(err) => self.note_failure("image", &err),
                }
            }
            Err(reason) => tracing::warn!(
                target: "dashstack::image",
                element_id = %request.element,
                reference = %request.reference,
                %reason,
                "image load failed"
            ),
        }
    }

    /// Host lifecycle callback. Always emits `connection-changed`.
    pub fn on_lifecycle(&mut self, callback: HostLifecycle) {
        let event = self.connection.on_callback(callback);
        self.events.emit(event);
    }

    /// A user interaction on the host.
    pub fn on_interaction(&mut self, interaction: HostInteraction) {
        if self.faulted.is_some() {
            return;
        }
        match interaction {
            HostInteraction::ItemSelected(id) => {
                if let Err(err) = self.stack.on_item_selected(&id, &mut self.host, &mut self.events) {
                    self.note_failure("item-selected", &err);
                }
            }
            HostInteraction::ButtonPressed(id) => {
                self.stack.on_button_pressed(&id, &mut self.events);
            }
            HostInteraction::SearchTextChanged { element_id, text } => {
                self.stack.on_search_text(&element_id, text, &mut self.events);
            }
            HostInteraction::PresentationDismissed => {
                if let Some(change) = self.stack.on_host_dismissed(&mut self.host, &mut self.events) {
                    self.after_change(&change);
                }
            }
        }
    }

    /// The host popped its top screen (back button).
    pub fn on_host_popped(&mut self) {
        if self.faulted.is_some() {
            return;
        }
        if let Some(change) = self.stack.on_host_popped(&mut self.host, &mut self.events) {
            self.after_change(&change);
        }
    }

    /// Schedule a debounced full refresh.
    pub fn request_refresh_at(&mut self, now: Instant, interval: Duration) {
        self.refresh.request_at(&mut self.ui_loop, now, interval);
    }

    fn run_refresh(&mut self) {
        if self.faulted.is_some() {
            return;
        }
        if let Err(err) = self.stack.refresh_all(&mut self.host) {
            self.note_failure("refresh", &err);
        }
    }

    fn handle_message(&mut self, message: SessionMessage, now: Instant) {
        match message {
            SessionMessage::Command { command, reply } => {
                let result = self.dispatch_at(command, now);
                if let Some(reply) = reply {
                    reply.send(result);
                }
            }
            SessionMessage::Lifecycle(callback) => self.on_lifecycle(callback),
            SessionMessage::Interaction(interaction) => self.on_interaction(interaction),
            SessionMessage::HostPopped => self.on_host_popped(),
            SessionMessage::ImageResolved(done) => self.on_image_resolved(done),
        }
    }

    fn handle_event(&mut self, event: LoopEvent<SessionMessage>, now: Instant) -> ControlFlow<()> {
        match event {
            LoopEvent::Timer { id } => {
                if self.refresh.on_timer(id) {
                    self.run_refresh();
                }
            }
            LoopEvent::Message(message) => self.handle_message(message, now),
            LoopEvent::Quit => {
                self.quit_requested = true;
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Handle everything that is ready at `now` without blocking. Returns the
    /// number of loop events handled.
    pub fn pump_at(&mut self, now: Instant) -> usize {
        let events = self.ui_loop.pump_at(now);
        let count = events.len();
        for event in events {
            if self.handle_event(event, now).is_break() {
                break;
            }
        }
        count
    }

    /// Run on the current thread until [`SessionHandle::quit`].
    pub fn run(&mut self) {
        tracing::debug!(target: "dashstack::session", "session loop started");
        'outer: loop {
            for event in self.ui_loop.wait_events(IDLE_WAIT) {
                if self.handle_event(event, Instant::now()).is_break() {
                    break 'outer;
                }
            }
        }
        tracing::debug!(target: "dashstack::session", "session loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn session() -> (Session<MemoryHost>, Arc<Mutex<Vec<OutboundEvent>>>) {
        let mut session = Session::new(BridgeConfig::default(), MemoryHost::new()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        session.register_sink(move |event: OutboundEvent| sink.lock().push(event));
        (session, seen)
    }

    fn set_root(id: &str) -> Command {
        Command::new(
            "set-root-template",
            json!({"runtimeType": "GridTemplate", "template": {"elementId": id}}),
        )
    }

    #[test]
    fn test_unknown_method_still_answers() {
        let (mut session, _) = session();
        let result = session.dispatch(Command::new("teleport", Value::Null));
        assert!(!result.is_ok());
        assert_eq!(result.code(), Some("unknown_method"));
    }

    #[test]
    fn test_missing_arguments_fail_the_command() {
        let (mut session, _) = session();
        let result = session.dispatch(Command::new(
            "set-root-template",
            json!({"runtimeType": "ListTemplate"}),
        ));
        assert_eq!(result.code(), Some("bad_arguments"));
        assert_eq!(session.stack().depth(), 0);
    }

    #[test]
    fn test_unsupported_type_is_reported() {
        let (mut session, _) = session();
        let result = session.dispatch(Command::new(
            "set-root-template",
            json!({"runtimeType": "NowPlayingTemplate", "template": {"elementId": "np"}}),
        ));
        assert_eq!(result.code(), Some("unsupported_template_type"));
    }

    #[test]
    fn test_get_config_reports_limits() {
        let (mut session, _) = session();
        let result = session.dispatch(Command::bare(Method::GetConfig));
        let value = result.value.unwrap();
        assert_eq!(value["maxListItems"], json!(12));
        assert_eq!(value["maxSections"], json!(6));
        assert_eq!(value["maxStackDepth"], json!(5));
    }

    #[test]
    fn test_get_stack_lists_ids() {
        let (mut session, _) = session();
        session.dispatch(set_root("root"));
        session.dispatch(Command::new(
            "push-template",
            json!({"runtimeType": "ListTemplate", "template": {"elementId": "next"}}),
        ));
        session.dispatch(Command::new(
            "present-modal",
            json!({"runtimeType": "AlertTemplate", "template": {"elementId": "alert", "titleVariants": ["Hi"]}}),
        ));

        let value = session.dispatch(Command::bare(Method::GetStack)).value.unwrap();
        assert_eq!(value["stack"], json!(["root", "next"]));
        assert_eq!(value["presented"], json!("alert"));
        assert_eq!(value["depth"], json!(2));
    }

    #[test]
    fn test_update_of_gone_target_is_reported() {
        let (mut session, _) = session();
        session.dispatch(set_root("root"));
        let result = session.dispatch(Command::new(
            "update-template",
            json!({"elementId": "popped-long-ago", "delta": {"title": "x"}}),
        ));
        assert_eq!(result.code(), Some("target_not_found"));
    }

    #[test]
    fn test_host_failure_faults_session() {
        let (mut session, _) = session();
        session.dispatch(set_root("root"));
        session.host_mut().set_unavailable(true);

        let result = session.dispatch(Command::new(
            "push-template",
            json!({"runtimeType": "GridTemplate", "template": {"elementId": "next"}}),
        ));
        assert_eq!(result.code(), Some("host_unavailable"));
        assert!(session.is_faulted());

        session.host_mut().set_unavailable(false);
        let result = session.dispatch(Command::bare(Method::GetStack));
        assert_eq!(result.code(), Some("host_unavailable"));
    }

    #[test]
    fn test_host_back_after_fault_is_ignored() {
        let (mut session, seen) = session();
        session.dispatch(set_root("root"));
        session.dispatch(Command::new(
            "push-template",
            json!({"runtimeType": "GridTemplate", "template": {"elementId": "next"}}),
        ));
        session.host_mut().set_unavailable(true);
        session.dispatch(Command::bare(Method::PopToRoot));
        assert!(session.is_faulted());
        seen.lock().clear();

        session.host_mut().set_unavailable(false);
        session.on_host_popped();

        assert_eq!(session.stack().depth(), 2);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_lifecycle_emits_connection_changed() {
        let (mut session, seen) = session();
        session.on_lifecycle(HostLifecycle::Resume);
        assert_eq!(session.connection_state(), ConnectionState::Foreground);
        assert_eq!(
            *seen.lock(),
            vec![OutboundEvent::ConnectionChanged {
                status: ConnectionState::Foreground
            }]
        );
    }

    #[test]
    fn test_event_channel_uses_configured_capacity() {
        let config = BridgeConfig {
            outbound_queue_capacity: 1,
            ..BridgeConfig::default()
        };
        let mut session = Session::new(config, MemoryHost::new()).unwrap();
        let events = session.open_event_channel();
        session.on_lifecycle(HostLifecycle::Start);
        session.on_lifecycle(HostLifecycle::Resume);
        assert_eq!(events.try_iter().count(), 1);
    }

    #[test]
    fn test_blocking_dispatch_on_ui_thread_is_refused() {
        let (session, _) = session();
        let err = session
            .handle()
            .dispatch_blocking(Command::bare(Method::GetStack), None)
            .unwrap_err();
        assert_eq!(err, LoopError::WouldBlockOwner);
    }

    #[test]
    fn test_posted_work_runs_in_order_on_pump() {
        let (mut session, seen) = session();
        let handle = session.handle();
        handle.post_command(set_root("root")).unwrap();
        handle.lifecycle(HostLifecycle::Start).unwrap();

        assert_eq!(session.pump_at(Instant::now()), 2);
        assert_eq!(session.stack().depth(), 1);
        let types: Vec<_> = seen.lock().iter().map(OutboundEvent::type_name).collect();
        assert_eq!(types, vec!["active-template-changed", "connection-changed"]);
    }
}
