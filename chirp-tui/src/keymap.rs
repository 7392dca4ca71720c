use std::{cmp, collections::BTreeMap, str::FromStr};

use crossterm::event::KeyModifiers;
use tokio::{sync::mpsc, time::Duration};

use crate::Error;

// resolving a key event needs the keys that have been pressed already, to handle multi-key
// sequences.
//
// sequences also time out. the compose box is always focused, so any buffered inputs need to be
// passed thru when the timeout expires, which means we can't just check the deadline when
// processing a new input

pub fn parse_key_sequence(input: &str) -> Result<Vec<KeyEvent>, nom::error::Error<&str>> {
    use nom::Finish;
    nom::combinator::all_consuming(nom::multi::many1(parse_key))(input)
        .finish()
        .map(|(_, k)| k)
}

fn parse_key(input: &str) -> nom::IResult<&str, KeyEvent> {
    use nom::{
        branch::alt,
        bytes::complete::tag,
        character::complete::one_of,
        combinator::map,
        sequence::{delimited, separated_pair},
    };

    let key = alt((KeyCode::parse_char, KeyCode::parse_special));
    let modifiers = nom::multi::fold_many1(
        map(one_of("ACMS"), |c| match c {
            'A' => KeyModifiers::ALT,
            'C' => KeyModifiers::CONTROL,
            'M' => KeyModifiers::META,
            'S' => KeyModifiers::SHIFT,
            _ => unreachable!(),
        }),
        KeyModifiers::empty,
        KeyModifiers::union,
    );

    let bracketed = alt((
        map(
            separated_pair(modifiers, tag("-"), key),
            |(modifiers, code)| KeyEvent { modifiers, code },
        ),
        map(KeyCode::parse_special, KeyEvent::from),
    ));
    alt((
        delimited(tag("<"), bracketed, tag(">")),
        map(KeyCode::parse_char, KeyEvent::from),
    ))(input)
}

#[derive(Clone, Copy, Debug, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyEvent {
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }
}

impl From<KeyCode> for KeyEvent {
    fn from(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::empty(),
        }
    }
}

impl From<crossterm::event::KeyEvent> for KeyEvent {
    fn from(event: crossterm::event::KeyEvent) -> Self {
        let code = KeyCode::from(event.code);
        // the shift is already part of an upper-case character
        let modifiers = match code {
            KeyCode::Char(_) => event.modifiers.difference(KeyModifiers::SHIFT),
            _ => event.modifiers,
        };
        Self { code, modifiers }
    }
}

// manually impl `Ord` since `KeyModifiers` isn't `Ord`
// https://github.com/crossterm-rs/crossterm/pull/951
impl Ord for KeyEvent {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        self.code
            .cmp(&other.code)
            .then(self.modifiers.bits().cmp(&other.modifiers.bits()))
    }
}

impl PartialOrd for KeyEvent {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for KeyEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == cmp::Ordering::Equal
    }
}

// Our own version of `crossterm::event::KeyCode`
// https://github.com/crossterm-rs/crossterm/pull/951
#[allow(unused)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum KeyCode {
    Char(char),
    Backspace,
    Delete,
    Enter,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
    Tab,
    Insert,
    Escape,
    F(u8),
    Unknown,
}

impl KeyCode {
    fn parse_char(input: &str) -> nom::IResult<&str, Self> {
        nom::combinator::map(
            nom::character::complete::satisfy(nom_unicode::is_alphanumeric),
            Self::Char,
        )(input)
    }

    fn parse_special(input: &str) -> nom::IResult<&str, Self> {
        use nom::{
            bytes::complete::tag,
            combinator::{map, value},
            sequence::preceded,
        };
        nom::branch::alt((
            value(Self::Backspace, tag("BS")),
            value(Self::Delete, tag("Del")),
            value(Self::Enter, tag("CR")),
            value(Self::Left, tag("Left")),
            value(Self::Right, tag("Right")),
            value(Self::Up, tag("Up")),
            value(Self::Down, tag("Down")),
            value(Self::Home, tag("Home")),
            value(Self::End, tag("End")),
            value(Self::PageUp, tag("PageUp")),
            value(Self::PageDown, tag("PageDown")),
            value(Self::Tab, tag("Tab")),
            value(Self::Insert, tag("Ins")),
            value(Self::Escape, tag("Esc")),
            value(Self::Char(' '), tag("Space")),
            map(preceded(tag("F"), nom::character::complete::u8), Self::F),
        ))(input)
    }
}

impl From<crossterm::event::KeyCode> for KeyCode {
    fn from(code: crossterm::event::KeyCode) -> Self {
        use crossterm::event::KeyCode as Kc;
        match code {
            Kc::Char(c) => Self::Char(c),
            Kc::Backspace => Self::Backspace,
            Kc::Delete => Self::Delete,
            Kc::Enter => Self::Enter,
            Kc::Left => Self::Left,
            Kc::Right => Self::Right,
            Kc::Up => Self::Up,
            Kc::Down => Self::Down,
            Kc::Home => Self::Home,
            Kc::End => Self::End,
            Kc::PageUp => Self::PageUp,
            Kc::PageDown => Self::PageDown,
            Kc::Tab => Self::Tab,
            Kc::Insert => Self::Insert,
            Kc::Esc => Self::Escape,
            Kc::F(n) => Self::F(n),
            _ => Self::Unknown,
        }
    }
}

/// What a bound key sequence does.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    Login,
    Logout,
    /// Login or logout, whichever the session button currently offers.
    ToggleSession,
    Submit,
    Quit,
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(Self::Login),
            "logout" => Ok(Self::Logout),
            "toggle-session" => Ok(Self::ToggleSession),
            "submit" => Ok(Self::Submit),
            "quit" => Ok(Self::Quit),
            _ => Err(Error::KeyBinding(format!("unknown action `{s}`"))),
        }
    }
}

/// Output of the keymap: either a bound action, or keys that should be typed into the compose
/// box.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Input {
    Action(Action),
    Passthru(Vec<KeyEvent>),
}

#[derive(Clone, Debug)]
pub struct Keymap<A> {
    pub keys: BTreeMap<Vec<KeyEvent>, A>,
    pub timeout: Duration,
}

impl Default for Keymap<Action> {
    fn default() -> Self {
        let mut keymap = Self {
            keys: BTreeMap::new(),
            timeout: Duration::from_millis(500),
        };
        for (keys, action) in [
            ("<C-l>", Action::ToggleSession),
            ("<CR>", Action::Submit),
            ("<Esc>", Action::Quit),
            ("<C-c>", Action::Quit),
        ] {
            keymap
                .bind(keys, action)
                .unwrap_or_else(|err| unreachable!("default binding {keys}: {err}"));
        }
        keymap
    }
}

impl Keymap<Action> {
    /// Parses a `KEYS=ACTION` binding, eg `<C-s>=submit`.
    pub fn bind_str(&mut self, binding: &str) -> Result<(), Error> {
        let (keys, action) = binding
            .rsplit_once('=')
            .ok_or_else(|| Error::KeyBinding(format!("expected KEYS=ACTION, got `{binding}`")))?;
        self.bind(keys, action.trim().parse()?)
    }
}

impl<A: Clone> Keymap<A> {
    pub fn bind(&mut self, keys: &str, action: A) -> Result<(), Error> {
        let keys = parse_key_sequence(keys.trim())
            .map_err(|err| Error::KeyBinding(format!("invalid key sequence `{keys}`: {err}")))?;
        self.keys.insert(keys, action);
        Ok(())
    }

    pub async fn run(
        &mut self,
        keys_rx: &mut mpsc::UnboundedReceiver<KeyEvent>,
        mut passthru_callback: impl FnMut(&[KeyEvent]),
        mut action_callback: impl FnMut(A),
    ) {
        let mut buffer = Vec::<KeyEvent>::new();
        loop {
            let event = if buffer.is_empty() {
                Ok(keys_rx.recv().await)
            } else {
                tokio::time::timeout(self.timeout, keys_rx.recv()).await
            };
            match event {
                Ok(Some(event)) => {
                    buffer.push(event);
                    let (skipped, action) = (0..buffer.len())
                        .find_map(|i| self.get(&buffer[i..]).map(|action| (i, action)))
                        .unwrap_or((buffer.len(), None));
                    if skipped > 0 {
                        passthru_callback(&buffer[..skipped]);
                    }
                    buffer.drain(..skipped).for_each(drop);
                    if let Some(action) = action {
                        buffer.clear();
                        action_callback(action);
                    }
                }
                Ok(None) => {
                    tracing::info!("key events stream stopped, shutting down");
                    break;
                }
                Err(_) => {
                    passthru_callback(&buffer);
                    buffer.clear();
                }
            }
        }
    }

    fn entries_with_prefix<'s, 'p>(
        &'s self,
        prefix: &'p [KeyEvent],
    ) -> impl Iterator<Item = (&'s Vec<KeyEvent>, &'s A)> + use<'s, 'p, A> {
        use std::ops::Bound;

        self.keys
            .range::<[_], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(k, _)| k.starts_with(prefix))
    }

    /// Finds the action corresponding to the provided key sequence.
    ///
    /// ## Return values
    /// - `Some(Some(action))`: the key sequence is mapped to the action
    /// - `Some(None)`: the key sequence is a prefix to at least one action
    /// - `None`: the key sequence is not a prefix to any action
    fn get(&self, keys: &[KeyEvent]) -> Option<Option<A>> {
        self.entries_with_prefix(keys)
            .next()
            .map(|(k, v)| (k == keys).then_some(v.clone()))
    }
}
