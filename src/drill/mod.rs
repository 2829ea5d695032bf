//! Vocabulary drill built on the screen framework.

pub mod deck;
mod screens;
pub mod session;

use memotui::error::TuiError;
use memotui::program::{ProgramData, ProgramState, Screen};

pub use screens::ROUND_CHOICES;

use deck::Deck;
use screens::{CategoryScreen, DeckScreen, MoreRoundsScreen, PlayScreen, RoundsScreen, SummaryScreen};
use session::Session;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Step {
    Decks,
    Categories,
    Rounds,
    Play,
    MoreRounds,
    Summary,
    Done,
}

impl ProgramState for Step {
    const BEGIN: Self = Step::Decks;
    const END: Self = Step::Done;
}

/// Everything the drill screens hand to one another.
pub struct DrillData {
    pub decks: Vec<Deck>,
    pub deck: usize,
    pub session: Option<Session>,
    pub rounds_left: u32,
    pub default_rounds: u32,
    pub seed: Option<u64>,
    /// Shown once by the next screen that supports it.
    pub notice: Option<String>,
    next_state_override: Option<Step>,
}

impl DrillData {
    pub fn new(decks: Vec<Deck>, default_rounds: u32) -> Self {
        Self {
            decks,
            deck: 0,
            session: None,
            rounds_left: 0,
            default_rounds,
            seed: None,
            notice: None,
            next_state_override: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl ProgramData for DrillData {
    type State = Step;

    fn next_state_override(&mut self) -> &mut Option<Step> {
        &mut self.next_state_override
    }
}

type Ctor = fn(&DrillData) -> anyhow::Result<Box<dyn Screen<DrillData>>>;

/// Define every drill screen and its default successor.
pub fn build_program(data: DrillData) -> Result<memotui::Program<DrillData>, TuiError> {
    let graph: [(Step, Ctor, Step); 6] = [
        (Step::Decks, DeckScreen::create, Step::Categories),
        (Step::Categories, CategoryScreen::create, Step::Rounds),
        (Step::Rounds, RoundsScreen::create, Step::Play),
        (Step::Play, PlayScreen::create, Step::Play),
        (Step::MoreRounds, MoreRoundsScreen::create, Step::Play),
        (Step::Summary, SummaryScreen::create, Step::Done),
    ];
    let mut program = memotui::Program::new(data);
    for (state, ctor, next) in graph {
        program.define_screen(state, ctor, next)?;
    }
    Ok(program)
}
