use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Stdout};
use std::rc::Rc;
use std::time::Duration;

use crossterm::event::{self, Event};
use ratatui::Terminal;
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::buffer::Buffer;
use ratatui::layout::{Position, Rect, Size};
use ratatui::style::Style;

use crate::key::Key;

/// Minimal character-grid contract the runtime draws to and reads keys from.
pub trait Surface {
    fn clear(&mut self) -> io::Result<()>;

    fn refresh(&mut self) -> io::Result<()>;

    /// Draw `text` starting at column `x`, row `y`. Text outside the grid is
    /// dropped.
    fn draw_text(&mut self, text: &str, x: u16, y: u16);

    fn move_cursor(&mut self, x: u16, y: u16) -> io::Result<()>;

    fn size(&mut self) -> Size;

    /// Next buffered input code, or `None` once the current keypress has been
    /// fully delivered. Never blocks.
    fn next_key_code(&mut self) -> io::Result<Option<u32>>;

    /// Block until input is available or `timeout` elapses.
    fn wait_for_input(&mut self, timeout: Duration) -> io::Result<bool>;

    /// Whether the grid was resized since the last call.
    fn take_resized(&mut self) -> bool {
        false
    }
}

/// Splits a stream of keypresses into code bursts separated by one `None`.
#[derive(Debug, Default)]
struct CodeBurst {
    pending: VecDeque<u32>,
    delivering: bool,
}

impl CodeBurst {
    /// Returns `Some(code)` while a burst is in flight, `None` at its end.
    /// `refill` is consulted only when no burst is in flight.
    fn next(&mut self, refill: impl FnOnce() -> io::Result<Option<Key>>) -> io::Result<Option<u32>> {
        if let Some(code) = self.pending.pop_front() {
            self.delivering = true;
            return Ok(Some(code));
        }
        if self.delivering {
            self.delivering = false;
            return Ok(None);
        }
        match refill()? {
            Some(key) => {
                self.pending.extend(key.codes().iter().copied());
                self.delivering = true;
                Ok(self.pending.pop_front())
            }
            None => Ok(None),
        }
    }
}

/// Full-screen terminal surface backed by a ratatui buffer.
///
/// Draw calls write into the back buffer; `refresh` flushes the diff.
pub struct TerminalSurface {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    burst: CodeBurst,
    resized: bool,
}

impl TerminalSurface {
    pub fn new(mut terminal: Terminal<CrosstermBackend<Stdout>>) -> io::Result<Self> {
        terminal.show_cursor()?;
        Ok(Self {
            terminal,
            burst: CodeBurst::default(),
            resized: false,
        })
    }

    pub fn terminal_mut(&mut self) -> &mut Terminal<CrosstermBackend<Stdout>> {
        &mut self.terminal
    }

    fn read_event(resized: &mut bool) -> io::Result<Option<Key>> {
        while event::poll(Duration::ZERO)? {
            match event::read()? {
                Event::Key(key_event) => {
                    if let Some(key) = Key::from_event(&key_event) {
                        return Ok(Some(key));
                    }
                }
                Event::Resize(_, _) => *resized = true,
                _ => {}
            }
        }
        Ok(None)
    }
}

impl Surface for TerminalSurface {
    fn clear(&mut self) -> io::Result<()> {
        self.terminal.autoresize()?;
        self.terminal.clear()?;
        self.terminal.current_buffer_mut().reset();
        Ok(())
    }

    fn refresh(&mut self) -> io::Result<()> {
        self.terminal.flush()?;
        self.terminal.swap_buffers();
        self.terminal.backend_mut().flush()
    }

    fn draw_text(&mut self, text: &str, x: u16, y: u16) {
        draw_into(self.terminal.current_buffer_mut(), text, x, y);
    }

    fn move_cursor(&mut self, x: u16, y: u16) -> io::Result<()> {
        self.terminal.set_cursor_position(Position::new(x, y))?;
        self.terminal.backend_mut().flush()
    }

    fn size(&mut self) -> Size {
        if let Err(err) = self.terminal.autoresize() {
            tracing::warn!(error = %err, "failed to resize terminal buffer");
        }
        self.terminal.current_buffer_mut().area.as_size()
    }

    fn next_key_code(&mut self) -> io::Result<Option<u32>> {
        let resized = &mut self.resized;
        self.burst.next(|| Self::read_event(resized))
    }

    fn wait_for_input(&mut self, timeout: Duration) -> io::Result<bool> {
        event::poll(timeout)
    }

    fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }
}

fn draw_into(buffer: &mut Buffer, text: &str, x: u16, y: u16) {
    let area = buffer.area;
    if x >= area.right() || y >= area.bottom() || x < area.x || y < area.y {
        return;
    }
    let max_width = (area.right() - x) as usize;
    buffer.set_stringn(x, y, text, max_width, Style::default());
}

#[derive(Debug)]
struct MemoryState {
    buffer: Buffer,
    input: VecDeque<Key>,
    burst: CodeBurst,
    cursor: Option<Position>,
    clears: usize,
    refreshes: usize,
    resized: bool,
}

/// Headless surface with scripted input, used by tests and benchmarks.
///
/// Once the scripted input is exhausted, `wait_for_input` fails with
/// `UnexpectedEof` so a running loop terminates.
pub struct MemorySurface {
    state: Rc<RefCell<MemoryState>>,
}

/// Shared view into a [`MemorySurface`] that outlives moving the surface into
/// a context.
#[derive(Clone)]
pub struct MemoryHandle {
    state: Rc<RefCell<MemoryState>>,
}

impl MemorySurface {
    pub fn new(width: u16, height: u16) -> Self {
        let state = MemoryState {
            buffer: Buffer::empty(Rect::new(0, 0, width, height)),
            input: VecDeque::new(),
            burst: CodeBurst::default(),
            cursor: None,
            clears: 0,
            refreshes: 0,
            resized: false,
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn handle(&self) -> MemoryHandle {
        MemoryHandle {
            state: Rc::clone(&self.state),
        }
    }
}

impl MemoryHandle {
    pub fn push_key(&self, key: Key) {
        self.state.borrow_mut().input.push_back(key);
    }

    pub fn push_keys(&self, keys: impl IntoIterator<Item = Key>) {
        self.state.borrow_mut().input.extend(keys);
    }

    pub fn type_text(&self, text: &str) {
        self.push_keys(text.chars().map(|ch| Key::from_codes(vec![ch as u32])));
    }

    pub fn pending_keys(&self) -> usize {
        self.state.borrow().input.len()
    }

    pub fn resize(&self, width: u16, height: u16) {
        let mut state = self.state.borrow_mut();
        state.buffer.resize(Rect::new(0, 0, width, height));
        state.resized = true;
    }

    pub fn cursor(&self) -> Option<Position> {
        self.state.borrow().cursor
    }

    pub fn clears(&self) -> usize {
        self.state.borrow().clears
    }

    pub fn refreshes(&self) -> usize {
        self.state.borrow().refreshes
    }

    /// Row `y` with trailing blanks trimmed.
    pub fn line(&self, y: u16) -> String {
        let state = self.state.borrow();
        let area = state.buffer.area;
        if y >= area.bottom() {
            return String::new();
        }
        let row: String = (area.x..area.right())
            .filter_map(|x| state.buffer.cell(Position::new(x, y)))
            .map(|cell| cell.symbol())
            .collect();
        row.trim_end().to_string()
    }

    pub fn lines(&self) -> Vec<String> {
        let height = self.state.borrow().buffer.area.height;
        (0..height).map(|y| self.line(y)).collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

impl Surface for MemorySurface {
    fn clear(&mut self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.buffer.reset();
        state.clears += 1;
        Ok(())
    }

    fn refresh(&mut self) -> io::Result<()> {
        self.state.borrow_mut().refreshes += 1;
        Ok(())
    }

    fn draw_text(&mut self, text: &str, x: u16, y: u16) {
        draw_into(&mut self.state.borrow_mut().buffer, text, x, y);
    }

    fn move_cursor(&mut self, x: u16, y: u16) -> io::Result<()> {
        self.state.borrow_mut().cursor = Some(Position::new(x, y));
        Ok(())
    }

    fn size(&mut self) -> Size {
        self.state.borrow().buffer.area.as_size()
    }

    fn next_key_code(&mut self) -> io::Result<Option<u32>> {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let input = &mut state.input;
        state.burst.next(|| Ok(input.pop_front()))
    }

    fn wait_for_input(&mut self, _timeout: Duration) -> io::Result<bool> {
        if self.state.borrow().input.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "scripted input exhausted",
            ));
        }
        Ok(true)
    }

    fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.state.borrow_mut().resized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_text_clips_to_grid() {
        let mut surface = MemorySurface::new(5, 2);
        let handle = surface.handle();
        surface.draw_text("hello world", 2, 0);
        surface.draw_text("below", 0, 5);
        assert_eq!(handle.line(0), "  hel");
        assert_eq!(handle.line(1), "");
    }

    #[test]
    fn keypresses_arrive_as_separate_bursts() {
        let mut surface = MemorySurface::new(10, 2);
        let handle = surface.handle();
        handle.push_key(Key::UP);
        handle.push_key(Key::from_codes(vec!['a' as u32]));

        let mut first = Vec::new();
        while let Some(code) = surface.next_key_code().unwrap() {
            first.push(code);
        }
        assert_eq!(first, Key::UP.codes());

        let mut second = Vec::new();
        while let Some(code) = surface.next_key_code().unwrap() {
            second.push(code);
        }
        assert_eq!(second, vec!['a' as u32]);
        assert_eq!(surface.next_key_code().unwrap(), None);
    }

    #[test]
    fn exhausted_input_ends_waiting() {
        let mut surface = MemorySurface::new(10, 2);
        let err = surface.wait_for_input(Duration::ZERO).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn resize_is_reported_once() {
        let mut surface = MemorySurface::new(10, 2);
        let handle = surface.handle();
        handle.resize(20, 4);
        assert_eq!(surface.size(), Size::new(20, 4));
        assert!(surface.take_resized());
        assert!(!surface.take_resized());
    }

    #[test]
    fn code_burst_splits_keys() {
        let mut burst = CodeBurst::default();
        let mut source = vec![Key::DOWN];
        let mut codes = Vec::new();
        while let Some(code) = burst.next(|| Ok(source.pop())).unwrap() {
            codes.push(code);
        }
        assert_eq!(codes, Key::DOWN.codes());
        assert_eq!(burst.next(|| Ok(None)).unwrap(), None);
    }
}
