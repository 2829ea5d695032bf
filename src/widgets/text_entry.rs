use std::cell::RefCell;
use std::rc::Rc;

use ratatui::layout::Position;
use unicode_width::UnicodeWidthStr;

use crate::context::{Context, Handler, KEY_EVENT, Propagation};
use crate::key::Key;
use crate::layout::{Anchor, Layout, RenderItem};

pub const TEXT_CHANGED_EVENT: &str = "text_changed";

struct EntryState {
    text: String,
    enabled: bool,
    change_event: String,
}

/// Single-line free-text input fed from key events.
///
/// Printable keys are appended and backspace deletes the last character;
/// each edit emits the change event. The handler never consumes a key, so
/// accelerators registered before it still fire. Clones share the buffer.
#[derive(Clone)]
pub struct TextEntry {
    state: Rc<RefCell<EntryState>>,
    anchor: Anchor,
    handler: Handler,
}

impl Default for TextEntry {
    fn default() -> Self {
        Self::new()
    }
}

impl TextEntry {
    pub fn new() -> Self {
        Self::with_change_event(TEXT_CHANGED_EVENT)
    }

    pub fn with_change_event(event: &str) -> Self {
        let state = Rc::new(RefCell::new(EntryState {
            text: String::new(),
            enabled: true,
            change_event: event.to_string(),
        }));
        let target = Rc::clone(&state);
        let handler = Handler::new(move |ctx, key| {
            if let Some(key) = key {
                let changed = target.borrow_mut().apply(key);
                if let Some(event) = changed {
                    ctx.emit(&event);
                }
            }
            Propagation::Continue
        });
        Self {
            state,
            anchor: Anchor::new(),
            handler,
        }
    }

    pub fn add_to(&self, ctx: &mut Context) -> bool {
        ctx.add_callback(KEY_EVENT, &self.handler)
    }

    pub fn remove_from(&self, ctx: &mut Context) {
        ctx.remove_callback(KEY_EVENT, &self.handler);
    }

    pub fn add_to_layout(&self, layout: &mut Layout) {
        let state = Rc::clone(&self.state);
        let anchor = self.anchor.clone();
        layout.add_item(
            RenderItem::new(move || vec![state.borrow().text.clone()])
                .on_render(move |origin| anchor.set(origin)),
        );
    }

    pub fn text(&self) -> String {
        self.state.borrow().text.clone()
    }

    pub fn set_text(&self, text: impl Into<String>) {
        self.state.borrow_mut().text = text.into();
    }

    pub fn clear(&self) {
        self.state.borrow_mut().text.clear();
    }

    pub fn is_enabled(&self) -> bool {
        self.state.borrow().enabled
    }

    /// A disabled entry ignores every key.
    pub fn set_enabled(&self, enabled: bool) {
        self.state.borrow_mut().enabled = enabled;
    }

    /// Column just past the text, on the row the entry was drawn on.
    pub fn cursor(&self) -> Option<Position> {
        let origin = self.anchor.get()?;
        let width = u16::try_from(self.state.borrow().text.width()).unwrap_or(u16::MAX);
        Some(Position::new(origin.x.saturating_add(width), origin.y))
    }
}

impl EntryState {
    fn apply(&mut self, key: &Key) -> Option<String> {
        if !self.enabled {
            return None;
        }
        if *key == Key::BACKSPACE {
            self.text.pop()?;
        } else {
            self.text.push(key.as_char()?);
        }
        Some(self.change_event.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::as_key;
    use crate::surface::MemorySurface;

    fn setup() -> (Context, crate::surface::MemoryHandle, TextEntry, Rc<RefCell<u32>>) {
        let surface = MemorySurface::new(20, 4);
        let handle = surface.handle();
        let mut ctx = Context::new(Box::new(surface));
        let entry = TextEntry::new();
        entry.add_to(&mut ctx);
        let changes = Rc::new(RefCell::new(0));
        let count = Rc::clone(&changes);
        ctx.add_callback(
            TEXT_CHANGED_EVENT,
            &Handler::new(move |_, _| {
                *count.borrow_mut() += 1;
                Propagation::Continue
            }),
        );
        (ctx, handle, entry, changes)
    }

    #[test]
    fn printable_keys_append_and_emit() {
        let (mut ctx, handle, entry, changes) = setup();
        handle.type_text("hola");
        for _ in 0..4 {
            ctx.poll_once().unwrap();
        }
        assert_eq!(entry.text(), "hola");
        assert_eq!(*changes.borrow(), 4);
    }

    #[test]
    fn special_keys_are_ignored() {
        let (mut ctx, handle, entry, changes) = setup();
        handle.push_keys([Key::UP, Key::ENTER, as_key("a").unwrap()]);
        for _ in 0..3 {
            ctx.poll_once().unwrap();
        }
        assert_eq!(entry.text(), "a");
        assert_eq!(*changes.borrow(), 1);
    }

    #[test]
    fn backspace_on_empty_buffer_is_silent() {
        let (mut ctx, handle, entry, changes) = setup();
        handle.push_keys([Key::BACKSPACE, as_key("x").unwrap(), Key::BACKSPACE]);
        for _ in 0..3 {
            ctx.poll_once().unwrap();
        }
        assert_eq!(entry.text(), "");
        assert_eq!(*changes.borrow(), 2);
    }

    #[test]
    fn disabled_entry_ignores_input() {
        let (mut ctx, handle, entry, changes) = setup();
        entry.set_enabled(false);
        handle.type_text("z");
        ctx.poll_once().unwrap();
        assert_eq!(entry.text(), "");
        assert_eq!(*changes.borrow(), 0);
    }

    #[test]
    fn cursor_follows_the_text() {
        let mut surface = MemorySurface::new(20, 4);
        let entry = TextEntry::new();
        let mut layout = Layout::new();
        layout.add_text("prompt");
        entry.add_to_layout(&mut layout);
        assert_eq!(entry.cursor(), None);

        entry.set_text("año");
        layout.render(&mut surface);
        assert_eq!(entry.cursor(), Some(Position::new(3, 1)));
    }
}
