use std::cell::RefCell;
use std::rc::Rc;

use ratatui::layout::Position;

use crate::layout::{Layout, RenderItem};

struct CheckboxEntry {
    text: String,
    enabled: bool,
    cursor: Option<Position>,
}

struct CheckboxState {
    title: Option<String>,
    entries: Vec<CheckboxEntry>,
}

/// Titled list of `[X]`/`[ ]` entries.
///
/// Entry cursors point inside the brackets. Cloning yields another handle to
/// the same menu.
#[derive(Clone)]
pub struct CheckboxMenu {
    state: Rc<RefCell<CheckboxState>>,
}

impl CheckboxMenu {
    pub fn new(title: Option<&str>) -> Self {
        Self {
            state: Rc::new(RefCell::new(CheckboxState {
                title: title.map(str::to_string),
                entries: Vec::new(),
            })),
        }
    }

    pub fn add_entry(&self, text: impl Into<String>, enabled: bool) -> usize {
        let mut state = self.state.borrow_mut();
        state.entries.push(CheckboxEntry {
            text: text.into(),
            enabled,
            cursor: None,
        });
        state.entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.state.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().entries.is_empty()
    }

    pub fn is_enabled(&self, index: usize) -> bool {
        self.state
            .borrow()
            .entries
            .get(index)
            .is_some_and(|entry| entry.enabled)
    }

    /// Flip an entry; returns its new state.
    pub fn toggle(&self, index: usize) -> bool {
        let mut state = self.state.borrow_mut();
        match state.entries.get_mut(index) {
            Some(entry) => {
                entry.enabled = !entry.enabled;
                entry.enabled
            }
            None => false,
        }
    }

    pub fn enabled_indices(&self) -> Vec<usize> {
        self.state
            .borrow()
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.enabled)
            .map(|(index, _)| index)
            .collect()
    }

    pub fn cursor(&self, index: usize) -> Option<Position> {
        self.state
            .borrow()
            .entries
            .get(index)
            .and_then(|entry| entry.cursor)
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
                for entry in &state.entries {
                    let mark = if entry.enabled { "[X]" } else { "[ ]" };
                    lines.push(format!("{mark} {}", entry.text));
                }
                lines
            })
            .on_render(move |origin| {
                let mut state = report.borrow_mut();
                let skip = u16::from(state.title.is_some());
                for (index, entry) in state.entries.iter_mut().enumerate() {
                    let row = skip.saturating_add(index as u16);
                    entry.cursor = Some(Position::new(
                        origin.x.saturating_add(1),
                        origin.y.saturating_add(row),
                    ));
                }
            }),
        );
    }
}
