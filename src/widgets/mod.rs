mod checkbox_menu;
mod menu;
mod text_entry;

pub use checkbox_menu::CheckboxMenu;
pub use menu::Menu;
pub use text_entry::{TEXT_CHANGED_EVENT, TextEntry};
