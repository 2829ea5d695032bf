pub mod variables;

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use ratatui::layout::Size;

use crate::error::TuiError;
use crate::key::Key;
use crate::surface::Surface;

pub use variables::{Value, ValueKind, VarError, VarType, Variables};

/// Emitted once per poll cycle in which input was read.
pub const KEY_EVENT: &str = "key";
/// Emitted by a screen to signal it is done.
pub const OK_EVENT: &str = "ok";
/// Emitted when the surface reports a size change.
pub const RESIZE_EVENT: &str = "resize";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Whether older handlers on the same event still run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Propagation {
    Continue,
    Stop,
}

type HandlerFn = dyn FnMut(&mut Context, Option<&Key>) -> Propagation;

/// Event callback with pointer identity.
///
/// Clones share identity, so the clone kept by a screen removes the one it
/// registered.
#[derive(Clone)]
pub struct Handler(Rc<RefCell<HandlerFn>>);

impl Handler {
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut(&mut Context, Option<&Key>) -> Propagation + 'static,
    {
        Handler(Rc::new(RefCell::new(f)))
    }

    fn call(&self, ctx: &mut Context, key: Option<&Key>) -> Propagation {
        let mut f = self.0.borrow_mut();
        (&mut *f)(ctx, key)
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Handler {}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", Rc::as_ptr(&self.0).cast::<()>())
    }
}

/// A draw call kept in the context's draw list.
pub trait Drawable {
    fn draw(&mut self, surface: &mut dyn Surface);
}

impl<F: FnMut(&mut dyn Surface)> Drawable for F {
    fn draw(&mut self, surface: &mut dyn Surface) {
        self(surface)
    }
}

/// Owner of the surface, the draw list, the variable store and the event
/// dispatch tables.
///
/// Everything runs on one thread. Handlers may emit events while an event is
/// being dispatched; those are queued behind every event already pending.
pub struct Context {
    surface: Box<dyn Surface>,
    running: bool,
    quit_requested: bool,
    fault: Option<TuiError>,
    draw_stack: Vec<Box<dyn Drawable>>,
    variables: Variables,
    callbacks: HashMap<String, Vec<Handler>>,
    event_queue: VecDeque<String>,
    poll_interval: Duration,
}

impl Context {
    pub fn new(surface: Box<dyn Surface>) -> Self {
        Self {
            surface,
            running: false,
            quit_requested: false,
            fault: None,
            draw_stack: Vec::new(),
            variables: Variables::default(),
            callbacks: HashMap::new(),
            event_queue: VecDeque::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn screen_size(&mut self) -> Size {
        self.surface.size()
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut self.variables
    }

    // --- callbacks ---

    /// Register `handler` on top of the stack for `event`.
    ///
    /// Returns false if this handler is already registered for `event`.
    pub fn add_callback(&mut self, event: &str, handler: &Handler) -> bool {
        let stack = self.callbacks.entry(event.to_string()).or_default();
        if stack.contains(handler) {
            tracing::debug!(event, "callback already registered");
            return false;
        }
        stack.insert(0, handler.clone());
        true
    }

    pub fn remove_callback(&mut self, event: &str, handler: &Handler) {
        if let Some(stack) = self.callbacks.get_mut(event) {
            stack.retain(|h| h != handler);
        }
    }

    /// Handlers registered for `event`, newest first.
    pub fn callbacks(&self, event: &str) -> &[Handler] {
        self.callbacks.get(event).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_registered(&self, event: &str, handler: &Handler) -> bool {
        self.callbacks(event).contains(handler)
    }

    pub fn emit(&mut self, event: &str) {
        self.event_queue.push_back(event.to_string());
    }

    pub fn pending_events(&self) -> usize {
        self.event_queue.len()
    }

    // --- drawing ---

    pub fn begin_draw(&mut self) {
        self.draw_stack.clear();
    }

    pub fn push_draw(&mut self, drawable: impl Drawable + 'static) {
        self.draw_stack.push(Box::new(drawable));
    }

    pub fn end_draw(&mut self) {
        let surface = self.surface.as_mut();
        for drawable in self.draw_stack.iter_mut() {
            drawable.draw(surface);
        }
    }

    /// Re-run the current draw list without rebuilding it.
    pub fn redraw(&mut self) {
        self.end_draw();
    }

    pub fn clear_screen(&mut self) {
        let result = self.surface.clear();
        self.record_io(result);
    }

    pub fn refresh_screen(&mut self) {
        let result = self.surface.refresh();
        self.record_io(result);
    }

    pub fn draw_text(&mut self, text: &str, x: u16, y: u16) {
        self.surface.draw_text(text, x, y);
    }

    /// Move the cursor; positions past the surface edge are ignored.
    pub fn move_cursor(&mut self, x: u16, y: u16) {
        let size = self.surface.size();
        if x > size.width || y > size.height {
            return;
        }
        let result = self.surface.move_cursor(x, y);
        self.record_io(result);
    }

    // --- loop control ---

    /// Stop the loop once the current dispatch cycle finishes.
    pub fn pause(&mut self) {
        self.running = false;
    }

    /// Stop the loop immediately on behalf of the user.
    pub fn quit(&mut self) {
        tracing::info!("quit requested");
        self.quit_requested = true;
        self.running = false;
    }

    /// Record a fatal error raised inside a handler and stop the loop.
    ///
    /// Only the first error is kept; `run` returns it.
    pub fn fail(&mut self, err: TuiError) {
        tracing::error!(error = %err, "fatal error during dispatch");
        if self.fault.is_none() {
            self.fault = Some(err);
        }
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    /// Forget a quit left over from an earlier run.
    pub fn clear_quit(&mut self) {
        self.quit_requested = false;
    }

    /// Whether a fatal error is waiting to be returned from `run`.
    pub fn has_fault(&self) -> bool {
        self.fault.is_some()
    }

    fn record_io(&mut self, result: io::Result<()>) {
        if let Err(err) = result {
            self.fail(TuiError::Io(err));
        }
    }

    fn aborted(&self) -> bool {
        self.quit_requested || self.fault.is_some()
    }

    /// Collect every code of the pending keypress into one key.
    fn read_key(&mut self) -> io::Result<Option<Key>> {
        let mut codes = Vec::new();
        while let Some(code) = self.surface.next_key_code()? {
            codes.push(code);
        }
        Ok((!codes.is_empty()).then(|| Key::from_codes(codes)))
    }

    /// Dispatch queued events in FIFO order until the queue is empty.
    ///
    /// Each event walks a snapshot of its stack; handlers removed earlier in
    /// the same walk are skipped.
    pub fn drain_events(&mut self, key: Option<&Key>) {
        while let Some(event) = self.event_queue.pop_front() {
            if self.aborted() {
                self.event_queue.clear();
                break;
            }
            let stack = self.callbacks(&event).to_vec();
            tracing::trace!(event = %event, handlers = stack.len(), "dispatch");
            for handler in &stack {
                if !self.is_registered(&event, handler) {
                    continue;
                }
                if handler.call(self, key) == Propagation::Stop {
                    break;
                }
            }
        }
    }

    /// One loop iteration: read input, queue the key/resize events, drain.
    ///
    /// Returns whether a key was read.
    pub fn poll_once(&mut self) -> Result<bool, TuiError> {
        let key = self.read_key()?;
        if let Some(key) = &key {
            tracing::trace!(key = %key, "key input");
            self.emit(KEY_EVENT);
        }
        if self.surface.take_resized() {
            self.emit(RESIZE_EVENT);
        }
        self.drain_events(key.as_ref());
        Ok(key.is_some())
    }

    /// Run the input loop until `pause`, `quit` or `fail`.
    ///
    /// A fault recorded before the loop starts is returned without reading
    /// input. A quit from an earlier run does not carry over.
    pub fn run(&mut self) -> Result<(), TuiError> {
        if let Some(err) = self.fault.take() {
            self.running = false;
            return Err(err);
        }
        self.quit_requested = false;
        self.running = true;
        while self.running && !self.aborted() {
            let read = self.poll_once()?;
            if !self.running {
                break;
            }
            if !read && self.event_queue.is_empty() {
                self.surface
                    .wait_for_input(self.poll_interval)
                    .map_err(|err| match err.kind() {
                        io::ErrorKind::UnexpectedEof => TuiError::InputClosed,
                        _ => TuiError::Io(err),
                    })?;
            }
        }
        match self.fault.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::as_key;
    use crate::surface::MemorySurface;
    use proptest::prelude::*;

    fn context() -> Context {
        Context::new(Box::new(MemorySurface::new(40, 10)))
    }

    fn recorder(log: &Rc<RefCell<Vec<String>>>, name: &str, result: Propagation) -> Handler {
        let log = Rc::clone(log);
        let name = name.to_string();
        Handler::new(move |_, _| {
            log.borrow_mut().push(name.clone());
            result
        })
    }

    #[test]
    fn newest_handler_runs_first_and_can_stop() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut ctx = context();
        let h1 = recorder(&log, "h1", Propagation::Continue);
        let h2 = recorder(&log, "h2", Propagation::Stop);
        assert!(ctx.add_callback("x", &h1));
        assert!(ctx.add_callback("x", &h2));

        ctx.emit("x");
        ctx.drain_events(None);
        assert_eq!(*log.borrow(), vec!["h2"]);
    }

    #[test]
    fn continue_falls_through_to_older_handlers() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut ctx = context();
        ctx.add_callback("x", &recorder(&log, "h1", Propagation::Continue));
        ctx.add_callback("x", &recorder(&log, "h2", Propagation::Continue));

        ctx.emit("x");
        ctx.drain_events(None);
        assert_eq!(*log.borrow(), vec!["h2", "h1"]);
    }

    #[test]
    fn duplicate_registration_is_rejected_per_event() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut ctx = context();
        let h = recorder(&log, "h", Propagation::Continue);
        assert!(ctx.add_callback("x", &h));
        assert!(!ctx.add_callback("x", &h.clone()));
        assert!(ctx.add_callback("y", &h));
        assert_eq!(ctx.callbacks("x").len(), 1);
        assert_eq!(ctx.callbacks("y").len(), 1);
    }

    #[test]
    fn removing_unknown_handler_is_a_no_op() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut ctx = context();
        let h = recorder(&log, "h", Propagation::Continue);
        ctx.remove_callback("x", &h);
        ctx.add_callback("x", &h);
        ctx.remove_callback("y", &h);
        assert!(ctx.is_registered("x", &h));
    }

    #[test]
    fn emitted_events_are_processed_fifo_across_reentry() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut ctx = context();
        let a_log = Rc::clone(&log);
        ctx.add_callback(
            "a",
            &Handler::new(move |ctx, _| {
                a_log.borrow_mut().push("a".to_string());
                ctx.emit("c");
                Propagation::Continue
            }),
        );
        ctx.add_callback("b", &recorder(&log, "b", Propagation::Continue));
        ctx.add_callback("c", &recorder(&log, "c", Propagation::Continue));

        ctx.emit("a");
        ctx.emit("b");
        ctx.drain_events(None);
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
        assert_eq!(ctx.pending_events(), 0);
    }

    #[test]
    fn handler_removed_mid_dispatch_does_not_run() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut ctx = context();
        let older = recorder(&log, "older", Propagation::Continue);
        let target = older.clone();
        ctx.add_callback("x", &older);
        ctx.add_callback(
            "x",
            &Handler::new(move |ctx, _| {
                ctx.remove_callback("x", &target);
                Propagation::Continue
            }),
        );

        ctx.emit("x");
        ctx.drain_events(None);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn events_without_handlers_are_dropped() {
        let mut ctx = context();
        ctx.emit("nobody");
        ctx.drain_events(None);
        assert_eq!(ctx.pending_events(), 0);
    }

    #[test]
    fn key_event_carries_the_read_key() {
        let surface = MemorySurface::new(40, 10);
        let handle = surface.handle();
        let mut ctx = Context::new(Box::new(surface));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        ctx.add_callback(
            KEY_EVENT,
            &Handler::new(move |_, key| {
                sink.borrow_mut().push(key.cloned());
                Propagation::Continue
            }),
        );

        handle.push_key(Key::UP);
        handle.push_key(as_key("a").unwrap());
        assert!(ctx.poll_once().unwrap());
        assert!(ctx.poll_once().unwrap());
        assert!(!ctx.poll_once().unwrap());
        assert_eq!(
            *seen.borrow(),
            vec![Some(Key::UP), Some(as_key("a").unwrap())]
        );
    }

    #[test]
    fn pause_finishes_the_cycle_then_stops() {
        let surface = MemorySurface::new(40, 10);
        let handle = surface.handle();
        let mut ctx = Context::new(Box::new(surface));
        let log = Rc::new(RefCell::new(Vec::new()));
        ctx.add_callback(
            KEY_EVENT,
            &Handler::new(|ctx, _| {
                ctx.pause();
                ctx.emit("after");
                Propagation::Continue
            }),
        );
        ctx.add_callback("after", &recorder(&log, "after", Propagation::Continue));

        handle.type_text("ab");
        ctx.run().unwrap();
        assert_eq!(*log.borrow(), vec!["after"]);
        assert_eq!(handle.pending_keys(), 1);
    }

    #[test]
    fn quit_abandons_remaining_events() {
        let surface = MemorySurface::new(40, 10);
        let handle = surface.handle();
        let mut ctx = Context::new(Box::new(surface));
        let log = Rc::new(RefCell::new(Vec::new()));
        ctx.add_callback(
            KEY_EVENT,
            &Handler::new(|ctx, _| {
                ctx.emit("after");
                ctx.quit();
                Propagation::Continue
            }),
        );
        ctx.add_callback("after", &recorder(&log, "after", Propagation::Continue));

        handle.type_text("a");
        ctx.run().unwrap();
        assert!(ctx.quit_requested());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn exhausted_input_is_reported() {
        let mut ctx = context();
        assert!(matches!(ctx.run(), Err(TuiError::InputClosed)));
    }

    #[test]
    fn fault_is_returned_from_run() {
        let surface = MemorySurface::new(40, 10);
        let handle = surface.handle();
        let mut ctx = Context::new(Box::new(surface));
        ctx.add_callback(
            KEY_EVENT,
            &Handler::new(|ctx, _| {
                ctx.fail(TuiError::MissingBegin);
                ctx.fail(TuiError::InputClosed);
                Propagation::Continue
            }),
        );
        handle.type_text("a");
        assert!(matches!(ctx.run(), Err(TuiError::MissingBegin)));
    }

    #[test]
    fn fault_before_run_is_returned_without_reading_input() {
        let surface = MemorySurface::new(40, 10);
        let handle = surface.handle();
        let mut ctx = Context::new(Box::new(surface));
        let log = Rc::new(RefCell::new(Vec::new()));
        ctx.add_callback(KEY_EVENT, &recorder(&log, "key", Propagation::Continue));

        ctx.fail(TuiError::MissingBegin);
        handle.type_text("ab");
        assert!(matches!(ctx.run(), Err(TuiError::MissingBegin)));
        assert!(!ctx.has_fault());
        assert!(log.borrow().is_empty());
        assert_eq!(handle.pending_keys(), 2);
    }

    #[test]
    fn loop_runs_again_after_a_quit() {
        let surface = MemorySurface::new(40, 10);
        let handle = surface.handle();
        let mut ctx = Context::new(Box::new(surface));
        let log = Rc::new(RefCell::new(Vec::new()));
        ctx.add_callback(KEY_EVENT, &recorder(&log, "key", Propagation::Continue));
        let q = as_key("q").unwrap();
        ctx.add_callback(
            KEY_EVENT,
            &Handler::new(move |ctx, key| {
                if key == Some(&q) {
                    ctx.quit();
                }
                Propagation::Continue
            }),
        );

        handle.type_text("q");
        ctx.run().unwrap();
        assert!(ctx.quit_requested());

        handle.type_text("xq");
        ctx.run().unwrap();
        assert_eq!(*log.borrow(), vec!["key", "key", "key"]);
        assert_eq!(handle.pending_keys(), 0);
    }

    #[test]
    fn redraw_reuses_draw_list() {
        let surface = MemorySurface::new(40, 10);
        let handle = surface.handle();
        let mut ctx = Context::new(Box::new(surface));
        let count = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&count);

        ctx.begin_draw();
        ctx.push_draw(move |surface: &mut dyn Surface| {
            *counter.borrow_mut() += 1;
            surface.draw_text("hi", 0, 0);
        });
        ctx.end_draw();
        ctx.redraw();
        assert_eq!(*count.borrow(), 2);
        assert_eq!(handle.line(0), "hi");

        ctx.begin_draw();
        ctx.end_draw();
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn move_cursor_outside_surface_is_ignored() {
        let surface = MemorySurface::new(40, 10);
        let handle = surface.handle();
        let mut ctx = Context::new(Box::new(surface));
        ctx.move_cursor(3, 4);
        ctx.move_cursor(41, 4);
        assert_eq!(handle.cursor(), Some(ratatui::layout::Position::new(3, 4)));
    }

    proptest! {
        #[test]
        fn stack_matches_surviving_handlers_newest_first(
            ops in proptest::collection::vec((any::<bool>(), 0usize..5), 0..40)
        ) {
            let log = Rc::new(RefCell::new(Vec::new()));
            let handlers: Vec<Handler> = (0..5)
                .map(|i| recorder(&log, &i.to_string(), Propagation::Continue))
                .collect();
            let mut ctx = context();
            let mut model: Vec<usize> = Vec::new();

            for (add, index) in ops {
                if add {
                    let added = ctx.add_callback("e", &handlers[index]);
                    prop_assert_eq!(added, !model.contains(&index));
                    if added {
                        model.insert(0, index);
                    }
                } else {
                    ctx.remove_callback("e", &handlers[index]);
                    model.retain(|i| *i != index);
                }
            }

            let expected: Vec<Handler> = model.iter().map(|i| handlers[*i].clone()).collect();
            prop_assert_eq!(ctx.callbacks("e"), expected.as_slice());
        }
    }
}
