//! Text-mode screen framework.
//!
//! A [`Context`] owns the terminal surface and dispatches named events to
//! stacks of handlers. [`Layout`] stacks lines of text and reports where each
//! block landed, [`AcceleratorMap`] binds keys to actions, and [`Program`]
//! walks a graph of screens driven by the OK event.

pub mod accel;
pub mod config;
pub mod context;
pub mod error;
pub mod key;
pub mod layout;
pub mod logging;
pub mod program;
pub mod screens;
pub mod surface;
pub mod widgets;

pub use accel::AcceleratorMap;
pub use context::{Context, Handler, KEY_EVENT, OK_EVENT, Propagation, RESIZE_EVENT};
pub use error::{KeyError, TuiError};
pub use key::{Key, as_ctrl_key, as_key};
pub use layout::{Anchor, Layout, RenderItem};
pub use program::{Outcome, Program, ProgramData, ProgramState, Screen};
pub use surface::{MemorySurface, Surface, TerminalSurface};
