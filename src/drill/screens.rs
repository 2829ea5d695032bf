use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::{Result, bail};
use memotui::accel::{AcceleratorMap, action};
use memotui::context::{Context, Handler, KEY_EVENT, OK_EVENT, Propagation};
use memotui::key::{Key, as_key};
use memotui::layout::Layout;
use memotui::program::{ProgramData, Screen};
use memotui::screens::{self, MenuScreen, quit_action, screen_layout};
use memotui::widgets::{CheckboxMenu, TEXT_CHANGED_EVENT, TextEntry};

use super::deck::Entry;
use super::session::{MIN_STREAK_DISPLAY, Session, is_correct, normalize_answer};
use super::{DrillData, Step};

pub const ROUND_CHOICES: [u32; 4] = [5, 10, 20, 50];
pub const MORE_ROUND_CHOICES: [u32; 5] = [0, 5, 10, 20, 50];

const SUBMIT_EVENT: &str = "submit";
const RETRY_EVENT: &str = "retry";
const FINISH_EVENT: &str = "finish";

const GUESSES: u32 = 3;

type BoxedScreen = Box<dyn Screen<DrillData>>;

fn place_cursor(ctx: &mut Context, cursor: Option<ratatui::layout::Position>) {
    if let Some(cursor) = cursor {
        ctx.move_cursor(cursor.x, cursor.y);
    }
}

/// Repaint the current draw list from scratch.
fn repaint(ctx: &mut Context) {
    ctx.clear_screen();
    ctx.redraw();
    ctx.refresh_screen();
}

/// Deck picker; skipped when there is only one deck.
pub struct DeckScreen {
    menu: Option<MenuScreen<usize>>,
}

impl DeckScreen {
    pub fn create(data: &DrillData) -> Result<BoxedScreen> {
        let menu = match data.decks.len() {
            0 => bail!("no decks to practice"),
            1 => None,
            _ => {
                let decks = data.decks.clone();
                Some(MenuScreen::new(
                    (0..decks.len()).collect(),
                    "Select a deck:",
                    move |&index| format!("{} ({})", decks[index].name, decks[index].languages()),
                    data.deck.min(data.decks.len() - 1),
                )?)
            }
        };
        Ok(Box::new(Self { menu }))
    }
}

impl Screen<DrillData> for DeckScreen {
    fn draw(&mut self, ctx: &mut Context) {
        if let Some(menu) = self.menu.as_mut() {
            menu.draw(ctx);
        }
    }

    fn bind(&mut self, ctx: &mut Context, _data: &mut DrillData) {
        match self.menu.as_mut() {
            Some(menu) => menu.bind(ctx),
            None => ctx.emit(OK_EVENT),
        }
    }

    fn destroy(&mut self, ctx: &mut Context, data: &mut DrillData) {
        data.deck = match self.menu.as_mut() {
            Some(menu) => menu.destroy(ctx),
            None => 0,
        };
    }
}

/// Checkbox form for choosing which categories of the deck to practice.
pub struct CategoryScreen {
    title: String,
    menu: CheckboxMenu,
    selected: Rc<Cell<usize>>,
    notice: Option<String>,
    accel: AcceleratorMap,
}

impl CategoryScreen {
    pub fn create(data: &DrillData) -> Result<BoxedScreen> {
        let Some(deck) = data.decks.get(data.deck) else {
            bail!("deck {} does not exist", data.deck);
        };
        let heading = format!("{} ({})", deck.name, deck.languages());
        let menu = CheckboxMenu::new(Some(heading.as_str()));
        for (index, category) in deck.categories.iter().enumerate() {
            menu.add_entry(
                format!("{}. {} ({} words)", index + 1, category.name, category.entries.len()),
                true,
            );
        }
        let selected = Rc::new(Cell::new(0));

        let accel = AcceleratorMap::new();
        let (down_menu, down_sel) = (menu.clone(), Rc::clone(&selected));
        accel.map_key(
            Key::DOWN,
            action(move |ctx| {
                let last = down_menu.len().saturating_sub(1);
                down_sel.set((down_sel.get() + 1).min(last));
                place_cursor(ctx, down_menu.cursor(down_sel.get()));
            }),
        );
        let (up_menu, up_sel) = (menu.clone(), Rc::clone(&selected));
        accel.map_key(
            Key::UP,
            action(move |ctx| {
                up_sel.set(up_sel.get().saturating_sub(1));
                place_cursor(ctx, up_menu.cursor(up_sel.get()));
            }),
        );
        let (space_menu, space_sel) = (menu.clone(), Rc::clone(&selected));
        if let Ok(space) = as_key(" ") {
            accel.map_key(
                space,
                action(move |ctx| {
                    space_menu.toggle(space_sel.get());
                    repaint(ctx);
                    place_cursor(ctx, space_menu.cursor(space_sel.get()));
                }),
            );
        }
        accel.map_keys(&Key::ENTER_KEYS, action(|ctx| ctx.emit(OK_EVENT)));
        if let Ok(q) = as_key("q") {
            accel.map_key(q, quit_action());
        }

        Ok(Box::new(Self {
            title: "The following categories are available:".to_string(),
            menu,
            selected,
            notice: None,
            accel,
        }))
    }
}

impl Screen<DrillData> for CategoryScreen {
    fn draw(&mut self, ctx: &mut Context) {
        ctx.clear_screen();
        ctx.begin_draw();
        let mut layout = screen_layout(ctx);
        layout.add_text(self.title.clone());
        self.menu.add_to_layout(&mut layout);
        if let Some(notice) = &self.notice {
            layout.add_text(notice.clone());
        }
        ctx.push_draw(layout);
        ctx.end_draw();
        ctx.refresh_screen();
        place_cursor(ctx, self.menu.cursor(self.selected.get()));
    }

    fn bind(&mut self, ctx: &mut Context, data: &mut DrillData) {
        self.notice = data.notice.take();
        self.accel.add_to(ctx);
    }

    fn destroy(&mut self, ctx: &mut Context, data: &mut DrillData) {
        self.accel.remove_from(ctx);
        let words = data
            .decks
            .get(data.deck)
            .map(|deck| deck.words(&self.menu.enabled_indices()))
            .unwrap_or_default();
        if words.is_empty() {
            tracing::info!("no words selected, asking again");
            data.notice = Some("Select at least one category with words.".to_string());
            data.session = None;
            *data.next_state_override() = Some(Step::Categories);
            return;
        }
        tracing::info!(words = words.len(), "practice session created");
        data.session = Some(Session::new(words, data.seed));
    }
}

/// How many rounds to play, preselecting the configured default.
pub struct RoundsScreen {
    menu: MenuScreen<u32>,
}

impl RoundsScreen {
    pub fn create(data: &DrillData) -> Result<BoxedScreen> {
        let start = ROUND_CHOICES
            .iter()
            .position(|&n| n == data.default_rounds)
            .unwrap_or(1);
        let menu = MenuScreen::new(
            ROUND_CHOICES.to_vec(),
            "How many rounds?",
            |n| format!("{n} rounds"),
            start,
        )?;
        Ok(Box::new(Self { menu }))
    }
}

impl Screen<DrillData> for RoundsScreen {
    fn draw(&mut self, ctx: &mut Context) {
        self.menu.draw(ctx);
    }

    fn bind(&mut self, ctx: &mut Context, _data: &mut DrillData) {
        self.menu.bind(ctx);
    }

    fn destroy(&mut self, ctx: &mut Context, data: &mut DrillData) {
        data.rounds_left = self.menu.destroy(ctx);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Guessing,
    WaitingToRetry,
    Guessed,
    Missed,
}

/// Title shown for the whole round; only a lost streak changes it.
fn opening_title(total_tests: u32, streak: u32) -> String {
    if streak < MIN_STREAK_DISPLAY {
        format!("Test #{total_tests}")
    } else {
        format!("Test #{total_tests} | Streak: {streak}")
    }
}

/// One word being guessed.
struct Round {
    word: Entry,
    phase: Phase,
    guesses_left: u32,
    total_tests: u32,
    title: String,
    streak: u32,
    congratulation: &'static str,
    commiseration: &'static str,
    feedback: [String; 2],
    needs_practice: bool,
}

impl Round {
    fn new(word: Entry, session: &mut Session) -> Self {
        Self {
            word,
            phase: Phase::Guessing,
            guesses_left: GUESSES,
            total_tests: session.total_tests,
            title: opening_title(session.total_tests, session.streak),
            streak: session.streak,
            congratulation: session.congratulation(),
            commiseration: session.commiseration(),
            feedback: [String::new(), String::new()],
            needs_practice: false,
        }
    }

    fn answer_prompt(&self) -> String {
        let guesses = match self.guesses_left {
            0 => "no guesses".to_string(),
            1 => "1 guess".to_string(),
            n => format!("{n} guesses"),
        };
        format!("Answer ({guesses} left):")
    }

    fn submit(&mut self, answer: &str) {
        if is_correct(answer, &self.word) {
            self.streak += 1;
            self.feedback[0] = self.congratulation.to_string();
            let answer = normalize_answer(answer);
            let others: Vec<&str> = self
                .word
                .answers
                .iter()
                .filter(|accepted| normalize_answer(accepted) != answer)
                .map(String::as_str)
                .collect();
            if !others.is_empty() {
                self.feedback[1] = format!("Other answers could have been {}", others.join(" or "));
            }
            self.phase = Phase::Guessed;
            return;
        }

        if self.streak >= MIN_STREAK_DISPLAY {
            self.title = format!("Test #{} | Streak of {} lost...", self.total_tests, self.streak);
        }
        self.streak = 0;
        self.guesses_left = self.guesses_left.saturating_sub(1);
        if self.guesses_left == 0 {
            self.feedback[0] = self.commiseration.to_string();
            self.feedback[1] = match self.word.answers.as_slice() {
                [only] => format!("The correct answer was {only}"),
                answers => format!("The correct answers were {}", answers.join(" or ")),
            };
            self.phase = Phase::Missed;
        } else {
            self.feedback[0] = "Incorrect".to_string();
            self.feedback[1] = "Press Enter to retry...".to_string();
            self.needs_practice = true;
            self.phase = Phase::WaitingToRetry;
        }
    }

    fn retry(&mut self) {
        self.feedback = [String::new(), String::new()];
        self.phase = Phase::Guessing;
    }
}

/// The quiz itself. Each round is a fresh screen on the same state.
pub struct PlayScreen {
    round: Option<Rc<RefCell<Round>>>,
    entry: TextEntry,
    accel: AcceleratorMap,
    handlers: Vec<(&'static str, Handler)>,
}

impl PlayScreen {
    pub fn create(data: &DrillData) -> Result<BoxedScreen> {
        if data.session.is_none() {
            bail!("no practice session");
        }
        Ok(Box::new(Self {
            round: None,
            entry: TextEntry::new(),
            accel: AcceleratorMap::new(),
            handlers: Vec::new(),
        }))
    }

    fn skip_to(ctx: &mut Context, data: &mut DrillData, step: Step) {
        *data.next_state_override() = Some(step);
        ctx.emit(OK_EVENT);
    }

    fn install(&mut self, ctx: &mut Context, round: &Rc<RefCell<Round>>) {
        let entry = self.entry.clone();
        let on_changed = Handler::new(move |ctx, _| {
            repaint(ctx);
            place_cursor(ctx, entry.cursor());
            Propagation::Continue
        });

        let (entry, target) = (self.entry.clone(), Rc::clone(round));
        let on_submit = Handler::new(move |ctx, _| {
            target.borrow_mut().submit(&entry.text());
            entry.set_enabled(false);
            repaint(ctx);
            place_cursor(ctx, entry.cursor());
            Propagation::Continue
        });

        let (entry, target) = (self.entry.clone(), Rc::clone(round));
        let on_retry = Handler::new(move |ctx, _| {
            target.borrow_mut().retry();
            entry.clear();
            entry.set_enabled(true);
            repaint(ctx);
            place_cursor(ctx, entry.cursor());
            Propagation::Continue
        });

        let on_finish = Handler::new(|ctx, _| {
            ctx.emit(OK_EVENT);
            Propagation::Continue
        });

        self.handlers = vec![
            (TEXT_CHANGED_EVENT, on_changed),
            (SUBMIT_EVENT, on_submit),
            (RETRY_EVENT, on_retry),
            (FINISH_EVENT, on_finish),
        ];
        for (event, handler) in &self.handlers {
            ctx.add_callback(event, handler);
        }
        self.entry.add_to(ctx);

        let (entry, target) = (self.entry.clone(), Rc::clone(round));
        self.accel.map_keys(
            &Key::ENTER_KEYS,
            action(move |ctx| {
                if entry.text().is_empty() {
                    return;
                }
                let event = match target.borrow().phase {
                    Phase::Guessing => SUBMIT_EVENT,
                    Phase::WaitingToRetry => RETRY_EVENT,
                    Phase::Guessed | Phase::Missed => FINISH_EVENT,
                };
                ctx.emit(event);
            }),
        );
        self.accel.add_to(ctx);
    }
}

impl Screen<DrillData> for PlayScreen {
    fn draw(&mut self, ctx: &mut Context) {
        let Some(round) = &self.round else {
            return;
        };
        ctx.clear_screen();
        ctx.begin_draw();
        let mut layout = Layout::new()
            .centered(true, true)
            .min_width(screens::min_width(ctx));

        let word = round.borrow().word.prompt.clone();
        let source = Rc::clone(round);
        layout.add_evaluated_text(move || source.borrow().title.clone());
        layout.add_text("");
        layout.add_text("Your word is:");
        layout.add_text(word);
        layout.add_text("");
        let source = Rc::clone(round);
        layout.add_evaluated_text(move || source.borrow().answer_prompt());
        self.entry.add_to_layout(&mut layout);
        layout.add_text("");
        for line in 0..2 {
            let source = Rc::clone(round);
            layout.add_evaluated_text(move || source.borrow().feedback[line].clone());
        }

        ctx.push_draw(layout);
        ctx.end_draw();
        ctx.refresh_screen();
        place_cursor(ctx, self.entry.cursor());
    }

    fn bind(&mut self, ctx: &mut Context, data: &mut DrillData) {
        if data.rounds_left == 0 {
            Self::skip_to(ctx, data, Step::MoreRounds);
            return;
        }
        let Some(session) = data.session.as_mut() else {
            Self::skip_to(ctx, data, Step::Summary);
            return;
        };
        let Some(word) = session.next_word() else {
            Self::skip_to(ctx, data, Step::Summary);
            return;
        };
        tracing::debug!(word = %word.prompt, "new round");
        let round = Rc::new(RefCell::new(Round::new(word, session)));
        self.install(ctx, &round);
        self.round = Some(round);
    }

    fn destroy(&mut self, ctx: &mut Context, data: &mut DrillData) {
        let Some(round) = self.round.take() else {
            return;
        };
        for (event, handler) in self.handlers.drain(..) {
            ctx.remove_callback(event, &handler);
        }
        self.entry.remove_from(ctx);
        self.accel.remove_from(ctx);

        let round = round.borrow();
        if let Some(session) = data.session.as_mut() {
            session.streak = round.streak;
            if round.needs_practice {
                session.note_practice(&round.word.prompt);
            }
            if round.phase == Phase::Missed {
                session.note_missed(&round.word.prompt);
            }
        }
        data.rounds_left = data.rounds_left.saturating_sub(1);
    }
}

/// Offered after the last round: play more or finish.
pub struct MoreRoundsScreen {
    menu: MenuScreen<u32>,
}

impl MoreRoundsScreen {
    pub fn create(_data: &DrillData) -> Result<BoxedScreen> {
        let menu = MenuScreen::new(
            MORE_ROUND_CHOICES.to_vec(),
            "How many rounds?",
            |&n| match n {
                0 => "Finish".to_string(),
                n => format!("{n} rounds"),
            },
            0,
        )?;
        Ok(Box::new(Self { menu }))
    }
}

impl Screen<DrillData> for MoreRoundsScreen {
    fn draw(&mut self, ctx: &mut Context) {
        self.menu.draw(ctx);
    }

    fn bind(&mut self, ctx: &mut Context, _data: &mut DrillData) {
        self.menu.bind(ctx);
    }

    fn destroy(&mut self, ctx: &mut Context, data: &mut DrillData) {
        let rounds = self.menu.destroy(ctx);
        data.rounds_left = rounds;
        if rounds == 0 {
            *data.next_state_override() = Some(Step::Summary);
        }
    }
}

/// Session results; any key ends the program.
pub struct SummaryScreen {
    total_tests: u32,
    missed_words: Vec<String>,
    practice_words: Vec<String>,
    handler: Handler,
}

impl SummaryScreen {
    pub fn create(data: &DrillData) -> Result<BoxedScreen> {
        let Some(session) = data.session.as_ref() else {
            bail!("no practice session");
        };
        Ok(Box::new(Self {
            total_tests: session.total_tests,
            missed_words: session.missed_words.clone(),
            practice_words: session.practice_words.clone(),
            handler: Handler::new(|ctx, _| {
                ctx.emit(OK_EVENT);
                Propagation::Continue
            }),
        }))
    }

    fn word_list(layout: &mut Layout, heading: &str, empty: &str, words: &[String]) {
        if words.is_empty() {
            layout.add_text(empty);
            return;
        }
        layout.add_text(heading);
        for word in words {
            layout.add_text(format!("    {word}"));
        }
    }
}

impl Screen<DrillData> for SummaryScreen {
    fn draw(&mut self, ctx: &mut Context) {
        ctx.clear_screen();
        ctx.begin_draw();
        let mut layout = Layout::new()
            .centered(true, true)
            .min_width(screens::min_width(ctx));
        layout.add_text(format!("Total tests: {}", self.total_tests));
        layout.add_text("");
        Self::word_list(
            &mut layout,
            "Missed words:",
            "There were no missed words",
            &self.missed_words,
        );
        layout.add_text("");
        Self::word_list(
            &mut layout,
            "Words to practice:",
            "There are no words to practice",
            &self.practice_words,
        );
        layout.add_text("");
        layout.add_text("Press any key to quit...");
        ctx.push_draw(layout);
        ctx.end_draw();
        ctx.refresh_screen();
    }

    fn bind(&mut self, ctx: &mut Context, _data: &mut DrillData) {
        ctx.add_callback(KEY_EVENT, &self.handler);
    }

    fn destroy(&mut self, ctx: &mut Context, _data: &mut DrillData) {
        ctx.remove_callback(KEY_EVENT, &self.handler);
    }
}
