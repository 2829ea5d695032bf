use std::borrow::Cow;
use std::fmt;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::error::KeyError;

const ESC: u32 = 0x1b;

/// Canonical identity of one physical keypress or escape sequence.
///
/// Equality and hashing are structural over the code sequence, so a key
/// decoded from the terminal matches a `const` key built from the same codes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Key(Cow<'static, [u32]>);

impl Key {
    pub const UP: Key = Key::from_static(&[ESC, b'[' as u32, b'A' as u32]);
    pub const DOWN: Key = Key::from_static(&[ESC, b'[' as u32, b'B' as u32]);
    pub const RIGHT: Key = Key::from_static(&[ESC, b'[' as u32, b'C' as u32]);
    pub const LEFT: Key = Key::from_static(&[ESC, b'[' as u32, b'D' as u32]);
    pub const HOME: Key = Key::from_static(&[ESC, b'[' as u32, b'H' as u32]);
    pub const END: Key = Key::from_static(&[ESC, b'[' as u32, b'F' as u32]);
    pub const BACK_TAB: Key = Key::from_static(&[ESC, b'[' as u32, b'Z' as u32]);
    pub const INSERT: Key = Key::from_static(&[ESC, b'[' as u32, b'2' as u32, b'~' as u32]);
    pub const DELETE: Key = Key::from_static(&[ESC, b'[' as u32, b'3' as u32, b'~' as u32]);
    pub const PAGE_UP: Key = Key::from_static(&[ESC, b'[' as u32, b'5' as u32, b'~' as u32]);
    pub const PAGE_DOWN: Key = Key::from_static(&[ESC, b'[' as u32, b'6' as u32, b'~' as u32]);
    pub const ESCAPE: Key = Key::from_static(&[ESC]);
    pub const TAB: Key = Key::from_static(&[0x09]);
    pub const BACKSPACE: Key = Key::from_static(&[0x7f]);
    /// Carriage return; what most terminals send for Enter.
    pub const ENTER: Key = Key::from_static(&[0x0d]);
    pub const NEWLINE: Key = Key::from_static(&[0x0a]);

    /// Every code sequence a terminal may send for the Enter key.
    pub const ENTER_KEYS: [Key; 2] = [Key::ENTER, Key::NEWLINE];

    pub const fn from_static(codes: &'static [u32]) -> Self {
        Key(Cow::Borrowed(codes))
    }

    pub fn from_codes(codes: Vec<u32>) -> Self {
        Key(Cow::Owned(codes))
    }

    pub fn codes(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The printable character this key types, if it is a single printable code.
    pub fn as_char(&self) -> Option<char> {
        match self.codes() {
            [code] => char::from_u32(*code).filter(|ch| is_printable(*ch)),
            _ => None,
        }
    }

    /// Encode a terminal key event into its code sequence.
    ///
    /// Only press and repeat events produce a key. Control characters map to
    /// their C0 code, Alt-modified characters to an escape prefix, and
    /// navigation/function keys to their VT escape sequences.
    pub fn from_event(event: &KeyEvent) -> Option<Key> {
        if event.kind == KeyEventKind::Release {
            return None;
        }
        let key = match event.code {
            KeyCode::Char(ch) if event.modifiers.contains(KeyModifiers::CONTROL) => {
                Key::from_codes(vec![ctrl_code(ch)?])
            }
            KeyCode::Char(ch) if event.modifiers.contains(KeyModifiers::ALT) => {
                Key::from_codes(vec![ESC, ch as u32])
            }
            KeyCode::Char(ch) => Key::from_codes(vec![ch as u32]),
            KeyCode::Enter => Key::ENTER,
            KeyCode::Backspace => Key::BACKSPACE,
            KeyCode::Tab => Key::TAB,
            KeyCode::BackTab => Key::BACK_TAB,
            KeyCode::Esc => Key::ESCAPE,
            KeyCode::Up => Key::UP,
            KeyCode::Down => Key::DOWN,
            KeyCode::Right => Key::RIGHT,
            KeyCode::Left => Key::LEFT,
            KeyCode::Home => Key::HOME,
            KeyCode::End => Key::END,
            KeyCode::Insert => Key::INSERT,
            KeyCode::Delete => Key::DELETE,
            KeyCode::PageUp => Key::PAGE_UP,
            KeyCode::PageDown => Key::PAGE_DOWN,
            KeyCode::F(n) => function_key(n)?,
            _ => return None,
        };
        Some(key)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({self} {:?})", self.codes())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            k if *k == Key::UP => "KEY_UP",
            k if *k == Key::DOWN => "KEY_DOWN",
            k if *k == Key::RIGHT => "KEY_RIGHT",
            k if *k == Key::LEFT => "KEY_LEFT",
            k if *k == Key::HOME => "KEY_HOME",
            k if *k == Key::END => "KEY_END",
            k if *k == Key::BACK_TAB => "KEY_BTAB",
            k if *k == Key::INSERT => "KEY_IC",
            k if *k == Key::DELETE => "KEY_DC",
            k if *k == Key::PAGE_UP => "KEY_PPAGE",
            k if *k == Key::PAGE_DOWN => "KEY_NPAGE",
            k if *k == Key::BACKSPACE => "^?",
            _ => "",
        };
        if !name.is_empty() {
            return f.write_str(name);
        }
        match self.codes() {
            [code] if *code < 0x20 => {
                write!(f, "^{}", char::from_u32(code + 0x40).unwrap_or('?'))
            }
            codes => {
                let text: String = codes
                    .iter()
                    .map(|c| char::from_u32(*c).unwrap_or(char::REPLACEMENT_CHARACTER))
                    .collect();
                f.write_str(&text)
            }
        }
    }
}

/// Python-like printability: no control characters and no whitespace other
/// than the plain space.
fn is_printable(ch: char) -> bool {
    !ch.is_control() && (ch == ' ' || !ch.is_whitespace())
}

fn validate_key_str(key_str: &str) -> Result<char, KeyError> {
    let lowered = key_str.to_lowercase();
    let mut chars = lowered.chars();
    let first = chars.next().ok_or(KeyError::Empty)?;
    if !lowered.chars().all(is_printable) {
        return Err(KeyError::NotPrintable(key_str.to_string()));
    }
    Ok(first)
}

/// C0 code for Ctrl plus `ch`. Only ASCII characters have one.
fn ctrl_code(ch: char) -> Option<u32> {
    ch.is_ascii().then_some(ch as u32 & 0x1f)
}

fn function_key(n: u8) -> Option<Key> {
    let seq: &'static [u32] = match n {
        1 => &[ESC, b'O' as u32, b'P' as u32],
        2 => &[ESC, b'O' as u32, b'Q' as u32],
        3 => &[ESC, b'O' as u32, b'R' as u32],
        4 => &[ESC, b'O' as u32, b'S' as u32],
        5 => &[ESC, b'[' as u32, b'1' as u32, b'5' as u32, b'~' as u32],
        6 => &[ESC, b'[' as u32, b'1' as u32, b'7' as u32, b'~' as u32],
        7 => &[ESC, b'[' as u32, b'1' as u32, b'8' as u32, b'~' as u32],
        8 => &[ESC, b'[' as u32, b'1' as u32, b'9' as u32, b'~' as u32],
        9 => &[ESC, b'[' as u32, b'2' as u32, b'0' as u32, b'~' as u32],
        10 => &[ESC, b'[' as u32, b'2' as u32, b'1' as u32, b'~' as u32],
        11 => &[ESC, b'[' as u32, b'2' as u32, b'3' as u32, b'~' as u32],
        12 => &[ESC, b'[' as u32, b'2' as u32, b'4' as u32, b'~' as u32],
        _ => return None,
    };
    Some(Key::from_static(seq))
}

/// Key identity for a single printable character, case-insensitively.
///
/// Only the first character of `key_str` is used.
pub fn as_key(key_str: &str) -> Result<Key, KeyError> {
    let ch = validate_key_str(key_str)?;
    Ok(Key::from_codes(vec![ch as u32]))
}

/// Key identity for Ctrl plus a character, e.g. `as_ctrl_key("c")` for Ctrl-C.
pub fn as_ctrl_key(key_str: &str) -> Result<Key, KeyError> {
    let ch = validate_key_str(key_str)?;
    let code = ctrl_code(ch).ok_or_else(|| KeyError::NoControlCode(key_str.to_string()))?;
    Ok(Key::from_codes(vec![code]))
}
