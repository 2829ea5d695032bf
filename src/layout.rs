use std::cell::Cell;
use std::iter;
use std::rc::Rc;

use ratatui::layout::{Position, Rect};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::context::Drawable;
use crate::surface::Surface;

type TextFn = Box<dyn FnMut() -> Vec<String>>;
type PostRenderFn = Box<dyn FnMut(Position)>;

/// A lazily evaluated block of text plus a callback told where it landed.
pub struct RenderItem {
    text: TextFn,
    post_render: PostRenderFn,
}

impl RenderItem {
    /// `text` must produce at least one line; an empty result is drawn as one
    /// blank line.
    pub fn new(text: impl FnMut() -> Vec<String> + 'static) -> Self {
        Self {
            text: Box::new(text),
            post_render: Box::new(|_| {}),
        }
    }

    pub fn on_render(mut self, post_render: impl FnMut(Position) + 'static) -> Self {
        self.post_render = Box::new(post_render);
        self
    }
}

/// Last reported top-left position of a render item.
#[derive(Clone, Debug, Default)]
pub struct Anchor(Rc<Cell<Option<Position>>>);

impl Anchor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Position> {
        self.0.get()
    }

    pub fn set(&self, position: Position) {
        self.0.set(Some(position));
    }
}

/// Vertical stack of render items, optionally centered, fitted to the surface.
#[derive(Default)]
pub struct Layout {
    centered_x: bool,
    centered_y: bool,
    padding: u16,
    min_width: Option<u16>,
    min_height: Option<u16>,
    items: Vec<RenderItem>,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn centered(mut self, x: bool, y: bool) -> Self {
        self.centered_x = x;
        self.centered_y = y;
        self
    }

    /// Blank lines inserted between consecutive items.
    pub fn padding(mut self, padding: u16) -> Self {
        self.padding = padding;
        self
    }

    pub fn min_width(mut self, width: u16) -> Self {
        self.min_width = Some(width);
        self
    }

    pub fn min_height(mut self, height: u16) -> Self {
        self.min_height = Some(height);
        self
    }

    pub fn add_item(&mut self, item: RenderItem) {
        self.items.push(item);
    }

    pub fn add_text(&mut self, text: impl Into<String>) -> Anchor {
        let text = text.into();
        self.add_lines(move || vec![text.clone()])
    }

    /// Add a single line evaluated at every draw.
    pub fn add_evaluated_text(&mut self, mut text: impl FnMut() -> String + 'static) -> Anchor {
        self.add_lines(move || vec![text()])
    }

    fn add_lines(&mut self, text: impl FnMut() -> Vec<String> + 'static) -> Anchor {
        let anchor = Anchor::new();
        let target = anchor.clone();
        self.add_item(RenderItem::new(text).on_render(move |pos| target.set(pos)));
        anchor
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Lay out and draw every item, then report each item's position.
    ///
    /// Returns the area the content occupies after clamping and centering.
    pub fn render(&mut self, surface: &mut dyn Surface) -> Rect {
        let mut lines: Vec<String> = Vec::new();
        let mut offsets: Vec<usize> = Vec::with_capacity(self.items.len());
        let mut max_width = 0usize;

        for (index, item) in self.items.iter_mut().enumerate() {
            if index != 0 {
                lines.extend(iter::repeat_n(String::new(), self.padding as usize));
            }
            offsets.push(lines.len());

            let mut text = (item.text)();
            if text.is_empty() {
                tracing::warn!(item = index, "render item produced no lines");
                text.push(String::new());
            }
            let width = text.iter().map(|line| line.width()).max().unwrap_or(0);
            max_width = max_width.max(width);
            lines.extend(text);
        }

        let screen = surface.size();
        let width = max_width
            .max(self.min_width.map_or(0, usize::from))
            .min(screen.width as usize) as u16;
        let height = lines
            .len()
            .max(self.min_height.map_or(0, usize::from))
            .min(screen.height as usize) as u16;

        let start_x = if self.centered_x {
            (screen.width - width) / 2
        } else {
            0
        };
        let start_y = if self.centered_y {
            (screen.height - height) / 2
        } else {
            0
        };

        for (row, line) in lines.iter().take(height as usize).enumerate() {
            surface.draw_text(truncate(line, width as usize), start_x, start_y + row as u16);
        }

        for (item, offset) in self.items.iter_mut().zip(offsets) {
            let y = u16::try_from(offset)
                .map_or(u16::MAX, |offset| start_y.saturating_add(offset));
            (item.post_render)(Position::new(start_x, y));
        }

        Rect::new(start_x, start_y, width, height)
    }
}

impl Drawable for Layout {
    fn draw(&mut self, surface: &mut dyn Surface) {
        self.render(surface);
    }
}

/// Longest prefix of `line` whose display width fits in `width` columns.
fn truncate(line: &str, width: usize) -> &str {
    let mut used = 0;
    for (index, ch) in line.char_indices() {
        used += ch.width().unwrap_or(0);
        if used > width {
            return &line[..index];
        }
    }
    line
}
