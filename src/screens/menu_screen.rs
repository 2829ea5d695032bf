use crate::accel::{AcceleratorMap, action};
use crate::context::{Context, OK_EVENT};
use crate::error::TuiError;
use crate::key::{Key, as_key};
use crate::widgets::Menu;

use super::{quit_action, screen_layout};

/// Vertical pick-one menu over `items`.
///
/// Up/down move the selection without wrapping, Enter emits the OK event and
/// `q` quits. `destroy` hands back the selected item.
pub struct MenuScreen<T> {
    items: Vec<T>,
    menu: Menu,
    accel: AcceleratorMap,
}

impl<T: Clone> MenuScreen<T> {
    pub fn new(
        items: Vec<T>,
        title: &str,
        display: impl Fn(&T) -> String,
        start_index: usize,
    ) -> Result<Self, TuiError> {
        if start_index >= items.len() {
            return Err(TuiError::InvalidStartIndex {
                index: start_index,
                len: items.len(),
            });
        }

        let menu = Menu::new(Some(title));
        for item in &items {
            menu.add_entry(display(item));
        }
        menu.select(start_index);

        let accel = AcceleratorMap::new();
        let down = menu.clone();
        accel.map_key(
            Key::DOWN,
            action(move |ctx| {
                down.select_next();
                move_to_selection(ctx, &down);
            }),
        );
        let up = menu.clone();
        accel.map_key(
            Key::UP,
            action(move |ctx| {
                up.select_prev();
                move_to_selection(ctx, &up);
            }),
        );
        accel.map_keys(&Key::ENTER_KEYS, action(|ctx| ctx.emit(OK_EVENT)));
        if let Ok(q) = as_key("q") {
            accel.map_key(q, quit_action());
        }

        Ok(Self { items, menu, accel })
    }

    pub fn draw(&mut self, ctx: &mut Context) {
        ctx.clear_screen();
        ctx.begin_draw();
        let mut layout = screen_layout(ctx);
        self.menu.add_to_layout(&mut layout);
        ctx.push_draw(layout);
        ctx.end_draw();
        ctx.refresh_screen();
        move_to_selection(ctx, &self.menu);
    }

    pub fn bind(&mut self, ctx: &mut Context) {
        self.accel.add_to(ctx);
    }

    pub fn destroy(&mut self, ctx: &mut Context) -> T {
        self.accel.remove_from(ctx);
        self.selection().clone()
    }

    pub fn selected_index(&self) -> usize {
        self.menu.selected()
    }

    pub fn selection(&self) -> &T {
        // The constructor guarantees at least one item and a valid selection.
        &self.items[self.menu.selected()]
    }
}

fn move_to_selection(ctx: &mut Context, menu: &Menu) {
    if let Some(cursor) = menu.selected_cursor() {
        ctx.move_cursor(cursor.x, cursor.y);
    }
}
