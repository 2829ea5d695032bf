use std::cell::RefCell;
use std::rc::Rc;

use ratatui::layout::Position;

use crate::layout::{Layout, RenderItem};

struct MenuState {
    title: Option<String>,
    entries: Vec<String>,
    cursors: Vec<Option<Position>>,
    selected: usize,
}

/// Titled list of entries; remembers where each entry was drawn.
///
/// Cloning yields another handle to the same menu.
#[derive(Clone)]
pub struct Menu {
    state: Rc<RefCell<MenuState>>,
}

impl Menu {
    pub fn new(title: Option<&str>) -> Self {
        Self {
            state: Rc::new(RefCell::new(MenuState {
                title: title.map(str::to_string),
                entries: Vec::new(),
                cursors: Vec::new(),
                selected: 0,
            })),
        }
    }

    pub fn add_entry(&self, text: impl Into<String>) -> usize {
        let mut state = self.state.borrow_mut();
        state.entries.push(text.into());
        state.cursors.push(None);
        state.entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.state.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().entries.is_empty()
    }

    pub fn selected(&self) -> usize {
        self.state.borrow().selected
    }

    /// Select `index`, clamped to the entry range.
    pub fn select(&self, index: usize) -> usize {
        let mut state = self.state.borrow_mut();
        let last = state.entries.len().saturating_sub(1);
        state.selected = index.min(last);
        state.selected
    }

    pub fn select_next(&self) -> usize {
        let next = self.selected().saturating_add(1);
        self.select(next)
    }

    pub fn select_prev(&self) -> usize {
        let prev = self.selected().saturating_sub(1);
        self.select(prev)
    }

    /// Where the entry at `index` was drawn in the last layout pass.
    pub fn cursor(&self, index: usize) -> Option<Position> {
        self.state.borrow().cursors.get(index).copied().flatten()
    }

    pub fn selected_cursor(&self) -> Option<Position> {
        self.cursor(self.selected())
    }

    pub fn add_to_layout(&self, layout: &mut Layout) {
        let render = Rc::clone(&self.state);
        let report = Rc::clone(&self.state);
        layout.add_item(
            RenderItem::new(move || {
                let state = render.borrow();
                let mut lines = Vec::with_capacity(state.entries.len() + 1);
                if let Some(title) = &state.title {
                    lines.push(title.clone());
                }
                lines.extend(state.entries.iter().map(|entry| format!("  {entry}")));
                lines
            })
            .on_render(move |origin| {
                let mut state = report.borrow_mut();
                let skip = u16::from(state.title.is_some());
                for (index, cursor) in state.cursors.iter_mut().enumerate() {
                    let row = skip.saturating_add(index as u16);
                    *cursor = Some(Position::new(origin.x, origin.y.saturating_add(row)));
                }
            }),
        );
    }
}
