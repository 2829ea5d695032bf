//! Reusable screens and the layout conventions they share.

mod menu_screen;

pub use menu_screen::MenuScreen;

use crate::accel::{Action, action};
use crate::context::Context;
use crate::layout::Layout;

/// Context variable holding the minimum content width of a screen.
pub const MIN_WIDTH_VAR: &str = "ui.min_width";
/// Context variable holding the blank lines between layout items.
pub const PADDING_VAR: &str = "ui.padding";

pub const DEFAULT_MIN_WIDTH: u16 = 50;
pub const DEFAULT_PADDING: u16 = 1;

/// Action that ends the program on behalf of the user.
pub fn quit_action() -> Action {
    action(Context::quit)
}

pub fn min_width(ctx: &Context) -> u16 {
    read_u16(ctx, MIN_WIDTH_VAR, DEFAULT_MIN_WIDTH)
}

pub fn padding(ctx: &Context) -> u16 {
    read_u16(ctx, PADDING_VAR, DEFAULT_PADDING)
}

/// Centered layout using the configured minimum width and padding.
pub fn screen_layout(ctx: &Context) -> Layout {
    Layout::new()
        .centered(true, true)
        .padding(padding(ctx))
        .min_width(min_width(ctx))
}

fn read_u16(ctx: &Context, name: &str, default: u16) -> u16 {
    ctx.variables()
        .get::<i64>(name)
        .ok()
        .and_then(|value| u16::try_from(value).ok())
        .unwrap_or(default)
}
