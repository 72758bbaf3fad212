//! Interactive question-and-answer loop.

use crate::{
    ansi::{ARROW, CROSS, CYAN, GRAY, NORMAL, RED, YELLOW},
    codec::{un_json, Fields},
    events::{Delegates, StageRecorder},
    pipeline::Pipeline,
    stage::{review, simplify},
    types::{Context, HistoryEntry},
};
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

const PROMPT: &str = ">> ";

/// Commands that print the last turn's stages instead of asking.
const REVIEW_COMMANDS: [&str; 2] = ["!review", "/review"];

/// Reads inquiries line by line and prints streamed answers.
pub struct Repl<'p, W: Write + Send> {
    pipeline: &'p Pipeline,
    console: Console<W>,
    history: Vec<HistoryEntry>,
}

impl<'p, W: Write + Send> Repl<'p, W> {
    pub fn new(pipeline: &'p Pipeline, out: W) -> Self {
        let config = pipeline.config();
        Self {
            pipeline,
            console: Console::new(out, config.json_schema && !config.zero_shot),
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn into_inner(self) -> W {
        self.console.into_inner()
    }

    /// Loop until `input` is exhausted.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, input: R) -> io::Result<()> {
        let mut lines = input.lines();
        loop {
            self.console.write(|out| {
                write!(out, "{}{}{}", YELLOW, PROMPT, CYAN)?;
                out.flush()
            })?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            self.console.write(|out| write!(out, "{}", NORMAL))?;

            let inquiry = line.trim();
            if inquiry.is_empty() {
                continue;
            }
            if REVIEW_COMMANDS.contains(&inquiry) {
                self.review()?;
                continue;
            }
            self.ask(inquiry).await?;
        }
        self.console.write(|out| writeln!(out, "{}", NORMAL))
    }

    async fn ask(&mut self, inquiry: &str) -> io::Result<()> {
        let ctx = Context::new(inquiry).with_history(self.history.clone());
        let start = Instant::now();
        let result = self.pipeline.run(ctx, &self.console).await;
        let stages = self.console.recorder.take();

        match result {
            Ok(result) => {
                let duration = start.elapsed().as_millis() as u64;
                self.console.write(|out| writeln!(out))?;
                self.history
                    .push(HistoryEntry::from_turn(&result, duration, stages));
            }
            Err(e) => {
                tracing::error!(inquiry, error = %e, "pipeline failed");
                self.console
                    .write(|out| writeln!(out, "{}{} {}{}", RED, CROSS, e, NORMAL))?;
            }
        }
        Ok(())
    }

    fn review(&self) -> io::Result<()> {
        match self.history.last() {
            Some(last) => {
                let stages = simplify(&last.stages);
                self.console.write(|out| review(&stages, out))
            }
            None => self.console.write(|out| {
                writeln!(out, "Nothing to review yet!")?;
                writeln!(out)
            }),
        }
    }
}

/// Terminal side of a run: records stages and echoes answer increments.
struct Console<W> {
    screen: Mutex<Screen<W>>,
    recorder: StageRecorder,
    json: bool,
}

struct Screen<W> {
    out: W,
    /// Raw increments of the current answer (JSON mode).
    buffer: String,
    /// Bytes of the decoded answer already printed (JSON mode).
    shown: usize,
}

impl<W: Write + Send> Console<W> {
    fn new(out: W, json: bool) -> Self {
        Self {
            screen: Mutex::new(Screen {
                out,
                buffer: String::new(),
                shown: 0,
            }),
            recorder: StageRecorder::new(),
            json,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Screen<W>> {
        self.screen.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, f: impl FnOnce(&mut W) -> io::Result<()>) -> io::Result<()> {
        f(&mut self.lock().out)
    }

    /// Write from a hook, where errors cannot propagate.
    fn echo(&self, f: impl FnOnce(&mut Screen<W>) -> io::Result<()>) {
        if let Err(e) = f(&mut self.lock()) {
            tracing::warn!(error = %e, "cannot write to terminal");
        }
    }

    fn into_inner(self) -> W {
        self.screen
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .out
    }
}

impl<W: Write + Send> Delegates for Console<W> {
    fn enter(&self, stage: &str) {
        self.recorder.enter(stage);
        let mut screen = self.lock();
        screen.buffer.clear();
        screen.shown = 0;
    }

    fn leave(&self, stage: &str, fields: &Fields) {
        self.recorder.leave(stage, fields);
        if stage != "Reason" {
            return;
        }
        if let Some(keyphrases) = fields.get("keyphrases").filter(|k| !k.is_empty()) {
            self.echo(|screen| {
                writeln!(
                    screen.out,
                    "{}{} Searching for {}...{}",
                    GRAY, ARROW, keyphrases, NORMAL
                )
            });
        }
    }

    fn stream(&self, text: &str) {
        let json = self.json;
        self.echo(|screen| {
            if !json {
                write!(screen.out, "{}", text)?;
                return screen.out.flush();
            }

            screen.buffer.push_str(text);
            let answer = un_json(&screen.buffer)
                .and_then(|mut fields| fields.remove("answer"))
                .unwrap_or_default();
            if answer.len() > screen.shown && answer.is_char_boundary(screen.shown) {
                write!(screen.out, "{}", &answer[screen.shown..])?;
                screen.shown = answer.len();
            }
            screen.out.flush()
        });
    }

    fn streams(&self) -> bool {
        true
    }
}
