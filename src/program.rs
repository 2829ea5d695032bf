use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use crate::context::{Context, Handler, OK_EVENT, Propagation, RESIZE_EVENT};
use crate::error::TuiError;

/// Node in the screen transition graph.
pub trait ProgramState: Copy + Eq + Hash + fmt::Debug + 'static {
    const BEGIN: Self;
    /// Terminal state; it never has a screen.
    const END: Self;
}

impl ProgramState for i32 {
    const BEGIN: Self = 0;
    const END: Self = -1;
}

/// Data shared by the screens of a program.
///
/// Screens read what earlier screens wrote and write what later screens read.
/// The override slot, when set, replaces the next default transition once.
pub trait ProgramData: 'static {
    type State: ProgramState;

    fn next_state_override(&mut self) -> &mut Option<Self::State>;
}

/// One view of the program.
///
/// `bind` registers every callback the screen needs and `destroy` must remove
/// all of them again before writing its results into `data`. `draw` may run
/// any number of times.
pub trait Screen<D: ProgramData> {
    fn draw(&mut self, ctx: &mut Context);

    fn bind(&mut self, ctx: &mut Context, data: &mut D);

    fn destroy(&mut self, ctx: &mut Context, data: &mut D);
}

/// Builds the screen for a state from the current program data.
pub type ScreenCtor<D> = Box<dyn Fn(&D) -> anyhow::Result<Box<dyn Screen<D>>>>;

struct ScreenDef<D: ProgramData> {
    ctor: ScreenCtor<D>,
    next_state: D::State,
}

/// How a program run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The end state was reached.
    Finished,
    /// The user asked to quit.
    Quit,
}

struct Machine<D: ProgramData> {
    data: D,
    state: D::State,
    screen: Option<Box<dyn Screen<D>>>,
    screens: HashMap<D::State, ScreenDef<D>>,
}

impl<D: ProgramData> Machine<D> {
    fn enter(&mut self, ctx: &mut Context, state: D::State) -> Result<(), TuiError> {
        let def = self.screens.get(&state).ok_or_else(|| TuiError::UnknownState {
            from: format!("{:?}", self.state),
            to: format!("{state:?}"),
        })?;
        let mut screen = (def.ctor)(&self.data).map_err(|source| TuiError::ScreenInit {
            state: format!("{state:?}"),
            source,
        })?;
        tracing::info!(from = ?self.state, to = ?state, "entering state");
        self.state = state;
        screen.bind(ctx, &mut self.data);
        screen.draw(ctx);
        self.screen = Some(screen);
        Ok(())
    }

    fn on_ok(&mut self, ctx: &mut Context) -> Result<(), TuiError> {
        let Some(mut screen) = self.screen.take() else {
            tracing::warn!(state = ?self.state, "ok event without an active screen");
            return Ok(());
        };
        screen.destroy(ctx, &mut self.data);

        let next = match self.data.next_state_override().take() {
            Some(state) => {
                tracing::debug!(state = ?state, "next state overridden");
                state
            }
            None => match self.screens.get(&self.state) {
                Some(def) => def.next_state,
                None => D::State::END,
            },
        };

        if next == D::State::END {
            tracing::info!(from = ?self.state, "reached end state");
            self.state = next;
            ctx.pause();
            return Ok(());
        }
        self.enter(ctx, next)
    }

    fn on_resize(&mut self, ctx: &mut Context) {
        if let Some(screen) = self.screen.as_mut() {
            ctx.clear_screen();
            screen.draw(ctx);
        }
    }
}

/// Screen state machine driven by the context's OK event.
pub struct Program<D: ProgramData> {
    machine: Rc<RefCell<Machine<D>>>,
    handlers: Vec<(&'static str, Handler)>,
}

impl<D: ProgramData> Program<D> {
    pub fn new(data: D) -> Self {
        let machine = Machine {
            data,
            state: D::State::BEGIN,
            screen: None,
            screens: HashMap::new(),
        };
        Self {
            machine: Rc::new(RefCell::new(machine)),
            handlers: Vec::new(),
        }
    }

    /// Register the screen shown in `state` and the state that follows it.
    pub fn define_screen<F>(
        &mut self,
        state: D::State,
        ctor: F,
        next_state: D::State,
    ) -> Result<(), TuiError>
    where
        F: Fn(&D) -> anyhow::Result<Box<dyn Screen<D>>> + 'static,
    {
        if state == D::State::END {
            return Err(TuiError::EndStateScreen);
        }
        let mut machine = self.machine.borrow_mut();
        match machine.screens.entry(state) {
            Entry::Occupied(_) => Err(TuiError::StateRedefined(format!("{state:?}"))),
            Entry::Vacant(slot) => {
                slot.insert(ScreenDef {
                    ctor: Box::new(ctor),
                    next_state,
                });
                Ok(())
            }
        }
    }

    pub fn state(&self) -> D::State {
        self.machine.borrow().state
    }

    pub fn data(&self) -> Ref<'_, D> {
        Ref::map(self.machine.borrow(), |m| &m.data)
    }

    pub fn has_screen(&self) -> bool {
        self.machine.borrow().screen.is_some()
    }

    /// Install the program's handlers and show the begin screen.
    pub fn start(&mut self, ctx: &mut Context) -> Result<(), TuiError> {
        if !self.machine.borrow().screens.contains_key(&D::State::BEGIN) {
            return Err(TuiError::MissingBegin);
        }

        let machine = Rc::clone(&self.machine);
        let on_ok = Handler::new(move |ctx, _| {
            if let Err(err) = machine.borrow_mut().on_ok(ctx) {
                ctx.fail(err);
            }
            Propagation::Continue
        });
        let machine = Rc::clone(&self.machine);
        let on_resize = Handler::new(move |ctx, _| {
            machine.borrow_mut().on_resize(ctx);
            Propagation::Continue
        });
        ctx.add_callback(OK_EVENT, &on_ok);
        ctx.add_callback(RESIZE_EVENT, &on_resize);
        self.handlers = vec![(OK_EVENT, on_ok), (RESIZE_EVENT, on_resize)];

        let mut machine = self.machine.borrow_mut();
        machine.state = D::State::BEGIN;
        machine.enter(ctx, D::State::BEGIN)
    }

    /// Remove the program's handlers, destroying a screen that is still active.
    pub fn finish(&mut self, ctx: &mut Context) {
        for (event, handler) in self.handlers.drain(..) {
            ctx.remove_callback(event, &handler);
        }
        let mut machine = self.machine.borrow_mut();
        let machine = &mut *machine;
        if let Some(mut screen) = machine.screen.take() {
            tracing::debug!(state = ?machine.state, "tearing down active screen");
            screen.destroy(ctx, &mut machine.data);
        }
    }

    /// Show screens until the end state is reached or the user quits.
    pub fn run(&mut self, ctx: &mut Context) -> Result<Outcome, TuiError> {
        ctx.clear_quit();
        if let Err(err) = self.start(ctx) {
            self.finish(ctx);
            return Err(err);
        }
        if ctx.quit_requested() && !ctx.has_fault() {
            self.finish(ctx);
            return Ok(Outcome::Quit);
        }
        let result = ctx.run();
        self.finish(ctx);
        result?;
        if ctx.quit_requested() {
            Ok(Outcome::Quit)
        } else {
            Ok(Outcome::Finished)
        }
    }

    /// Consume the program and return its data.
    pub fn into_data(self) -> Option<D> {
        drop(self.handlers);
        Rc::try_unwrap(self.machine)
            .ok()
            .map(|machine| machine.into_inner().data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accel::{AcceleratorMap, action};
    use crate::key::{Key, as_key};
    use crate::surface::{MemoryHandle, MemorySurface, Surface};

    const A: i32 = 1;

    #[derive(Default)]
    struct Data {
        log: Vec<String>,
        next_state_override: Option<i32>,
        override_on_destroy: Option<i32>,
    }

    impl ProgramData for Data {
        type State = i32;

        fn next_state_override(&mut self) -> &mut Option<i32> {
            &mut self.next_state_override
        }
    }

    /// Enter emits OK; its destroy logs and applies a queued override.
    struct Step {
        name: &'static str,
        accel: AcceleratorMap,
    }

    impl Step {
        fn boxed(name: &'static str) -> anyhow::Result<Box<dyn Screen<Data>>> {
            Ok(Box::new(Step {
                name,
                accel: AcceleratorMap::new(),
            }))
        }
    }

    impl Screen<Data> for Step {
        fn draw(&mut self, ctx: &mut Context) {
            ctx.clear_screen();
            ctx.draw_text(self.name, 0, 0);
        }

        fn bind(&mut self, ctx: &mut Context, data: &mut Data) {
            data.log.push(format!("bind {}", self.name));
            self.accel.add_to(ctx);
            self.accel
                .map_keys(&Key::ENTER_KEYS, action(|ctx| ctx.emit(OK_EVENT)));
            self.accel
                .map_key(as_key("q").unwrap(), action(|ctx| ctx.quit()));
        }

        fn destroy(&mut self, ctx: &mut Context, data: &mut Data) {
            self.accel.remove_from(ctx);
            data.log.push(format!("destroy {}", self.name));
            if let Some(state) = data.override_on_destroy.take() {
                data.next_state_override = Some(state);
            }
        }
    }

    fn setup() -> (Context, MemoryHandle, Program<Data>) {
        let surface = MemorySurface::new(20, 5);
        let handle = surface.handle();
        let ctx = Context::new(Box::new(surface));
        let mut program = Program::new(Data::default());
        program
            .define_screen(i32::BEGIN, |_| Step::boxed("begin"), A)
            .unwrap();
        program.define_screen(A, |_| Step::boxed("a"), A).unwrap();
        (ctx, handle, program)
    }

    #[test]
    fn ok_advances_along_default_edges_and_self_loops() {
        let (mut ctx, handle, mut program) = setup();
        program.start(&mut ctx).unwrap();
        assert_eq!(program.state(), i32::BEGIN);
        assert!(handle.contains("begin"));

        handle.push_key(Key::ENTER);
        ctx.poll_once().unwrap();
        assert_eq!(program.state(), A);
        assert!(handle.contains("a"));

        handle.push_key(Key::NEWLINE);
        ctx.poll_once().unwrap();
        assert_eq!(program.state(), A);
        assert_eq!(
            program.data().log,
            vec!["bind begin", "destroy begin", "bind a", "destroy a", "bind a"]
        );
        // Only the active screen's accelerator is installed.
        assert_eq!(ctx.callbacks(crate::context::KEY_EVENT).len(), 1);
    }

    #[test]
    fn override_to_end_finishes_the_run() {
        let (mut ctx, handle, mut program) = setup();
        handle.push_keys([Key::ENTER, Key::ENTER]);
        program.start(&mut ctx).unwrap();
        ctx.poll_once().unwrap();
        assert_eq!(program.state(), A);

        program.machine.borrow_mut().data.override_on_destroy = Some(i32::END);
        let outcome = program.run_loop_for_test(&mut ctx);
        assert_eq!(outcome.unwrap(), Outcome::Finished);
        assert_eq!(program.state(), i32::END);
        assert!(!program.has_screen());
        assert!(program.data().next_state_override.is_none());
        assert!(ctx.callbacks(OK_EVENT).is_empty());
        assert!(ctx.callbacks(crate::context::KEY_EVENT).is_empty());
    }

    #[test]
    fn override_is_consumed_once() {
        let (mut ctx, handle, mut program) = setup();
        program.define_screen(2, |_| Step::boxed("two"), A).unwrap();
        program.machine.borrow_mut().data.override_on_destroy = Some(2);
        program.start(&mut ctx).unwrap();

        handle.push_key(Key::ENTER);
        ctx.poll_once().unwrap();
        assert_eq!(program.state(), 2);

        handle.push_key(Key::ENTER);
        ctx.poll_once().unwrap();
        assert_eq!(program.state(), A);
    }

    #[test]
    fn run_without_begin_is_fatal() {
        let mut ctx = Context::new(Box::new(MemorySurface::new(10, 2)));
        let mut program: Program<Data> = Program::new(Data::default());
        program.define_screen(A, |_| Step::boxed("a"), A).unwrap();
        assert!(matches!(program.run(&mut ctx), Err(TuiError::MissingBegin)));
    }

    #[test]
    fn transition_to_unregistered_state_is_fatal() {
        let (mut ctx, handle, mut program) = setup();
        program.machine.borrow_mut().data.override_on_destroy = Some(42);
        handle.push_key(Key::ENTER);
        let err = program.run(&mut ctx).unwrap_err();
        assert!(matches!(err, TuiError::UnknownState { .. }));
    }

    #[test]
    fn redefining_a_state_is_rejected() {
        let (_, _, mut program) = setup();
        assert!(matches!(
            program.define_screen(A, |_| Step::boxed("again"), A),
            Err(TuiError::StateRedefined(_))
        ));
        assert!(matches!(
            program.define_screen(i32::END, |_| Step::boxed("end"), A),
            Err(TuiError::EndStateScreen)
        ));
    }

    #[test]
    fn failing_constructor_is_reported() {
        let mut ctx = Context::new(Box::new(MemorySurface::new(10, 2)));
        let mut program: Program<Data> = Program::new(Data::default());
        program
            .define_screen(i32::BEGIN, |_| Err(anyhow::anyhow!("no data")), A)
            .unwrap();
        assert!(matches!(
            program.run(&mut ctx),
            Err(TuiError::ScreenInit { .. })
        ));
    }

    #[test]
    fn quit_tears_down_the_active_screen() {
        let (mut ctx, handle, mut program) = setup();
        handle.push_keys([Key::ENTER, as_key("q").unwrap()]);
        assert_eq!(program.run(&mut ctx).unwrap(), Outcome::Quit);
        assert_eq!(program.data().log.last().unwrap(), "destroy a");
        assert!(ctx.callbacks(crate::context::KEY_EVENT).is_empty());
        let data = program.into_data().unwrap();
        assert_eq!(data.log.len(), 4);
    }

    #[test]
    fn resize_redraws_the_active_screen() {
        let (mut ctx, handle, mut program) = setup();
        program.start(&mut ctx).unwrap();
        let clears = handle.clears();
        handle.resize(30, 6);
        ctx.poll_once().unwrap();
        assert_eq!(handle.clears(), clears + 1);
        assert!(handle.contains("begin"));
    }

    /// Headless surface whose first clear fails.
    struct FailingClear {
        inner: MemorySurface,
        failed: bool,
    }

    impl Surface for FailingClear {
        fn clear(&mut self) -> std::io::Result<()> {
            if !self.failed {
                self.failed = true;
                return Err(std::io::Error::other("terminal gone"));
            }
            self.inner.clear()
        }

        fn refresh(&mut self) -> std::io::Result<()> {
            self.inner.refresh()
        }

        fn draw_text(&mut self, text: &str, x: u16, y: u16) {
            self.inner.draw_text(text, x, y);
        }

        fn move_cursor(&mut self, x: u16, y: u16) -> std::io::Result<()> {
            self.inner.move_cursor(x, y)
        }

        fn size(&mut self) -> ratatui::layout::Size {
            self.inner.size()
        }

        fn next_key_code(&mut self) -> std::io::Result<Option<u32>> {
            self.inner.next_key_code()
        }

        fn wait_for_input(&mut self, timeout: std::time::Duration) -> std::io::Result<bool> {
            self.inner.wait_for_input(timeout)
        }
    }

    #[test]
    fn draw_error_while_starting_is_returned() {
        let inner = MemorySurface::new(20, 5);
        let handle = inner.handle();
        let surface = FailingClear { inner, failed: false };
        let mut ctx = Context::new(Box::new(surface));
        let (_, _, mut program) = setup();
        handle.push_keys([Key::ENTER, Key::ENTER]);

        assert!(matches!(program.run(&mut ctx), Err(TuiError::Io(_))));
        assert_eq!(handle.pending_keys(), 2);
        assert!(!program.has_screen());
        assert!(ctx.callbacks(OK_EVENT).is_empty());
    }

    #[test]
    fn context_runs_again_after_a_quit() {
        let (mut ctx, handle, mut program) = setup();
        handle.push_key(as_key("q").unwrap());
        assert_eq!(program.run(&mut ctx).unwrap(), Outcome::Quit);

        let mut second: Program<Data> = Program::new(Data::default());
        second
            .define_screen(i32::BEGIN, |_| Step::boxed("again"), i32::END)
            .unwrap();
        handle.push_key(Key::ENTER);
        assert_eq!(second.run(&mut ctx).unwrap(), Outcome::Finished);
        assert_eq!(second.data().log, vec!["bind again", "destroy again"]);
    }

    #[test]
    fn quit_before_run_does_not_stick() {
        let (mut ctx, handle, mut program) = setup();
        program.define_screen(2, |_| Step::boxed("two"), i32::END).unwrap();
        program.machine.borrow_mut().data.override_on_destroy = Some(2);
        ctx.quit();
        handle.push_keys([Key::ENTER, Key::ENTER]);
        assert_eq!(program.run(&mut ctx).unwrap(), Outcome::Finished);
        assert_eq!(handle.pending_keys(), 0);
    }

    impl Program<Data> {
        /// Continue an already started program until it stops.
        fn run_loop_for_test(&mut self, ctx: &mut Context) -> Result<Outcome, TuiError> {
            let result = ctx.run();
            self.finish(ctx);
            result.map(|_| Outcome::Finished)
        }
    }
}
