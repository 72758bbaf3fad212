//! Replays scripted conversations and checks the pipeline's answers.
//!
//! A transcript is a list of `Role: content` lines:
//!
//! ```text
//! Story: Pitch Lake                  # resets the history
//! User: What is Pitch Lake in Trinidad famous for?
//! Pipeline.Reason.Keyphrases: /pitch lake/
//! Pipeline.Reason.Topic: /geography/
//! Assistant: /asphalt/
//! ```
//!
//! `User` runs the pipeline and records the turn; `Assistant` and
//! `Pipeline.Reason.*` check the last recorded turn against a pattern (see
//! [`matcher`](crate::matcher)). Mismatches are counted and reported; only
//! the conditions in [`EvalError`] stop the run.

use crate::{
    ansi::{ARROW, BOLD, CHECK, CROSS, CYAN, GRAY, GREEN, MAGENTA, NORMAL, RED, YELLOW},
    config::EvalOptions,
    error::EvalError,
    events::StageRecorder,
    matcher::{highlight, Check},
    pipeline::Pipeline,
    stage::{review, simplify},
    types::{Context, HistoryEntry},
};
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};

type EvalResult<T> = std::result::Result<T, EvalError>;

/// Which recorded value a check looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Answer,
    Keyphrases,
    Topic,
}

/// One meaningful transcript line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive<'a> {
    Story(&'a str),
    User(&'a str),
    Expect {
        role: &'a str,
        target: Target,
        expected: &'a str,
    },
    Unknown(&'a str),
}

impl<'a> Directive<'a> {
    /// Parse one line. Blank lines, comment-only lines, and lines without a
    /// `:` yield `None`.
    pub fn parse(line: &'a str) -> Option<Self> {
        let line = line.trim();
        let line = match line.find('#') {
            Some(marker) => line[..marker].trim(),
            None => line,
        };

        let (role, content) = line.split_once(':')?;
        let role = role.trim();
        let content = content.trim();

        let directive = match role {
            "Story" => Directive::Story(content),
            "User" => Directive::User(content),
            "Assistant" => Directive::Expect {
                role,
                target: Target::Answer,
                expected: content,
            },
            "Pipeline.Reason.Keyphrases" => Directive::Expect {
                role,
                target: Target::Keyphrases,
                expected: content,
            },
            "Pipeline.Reason.Topic" => Directive::Expect {
                role,
                target: Target::Topic,
                expected: content,
            },
            other => Directive::Unknown(other),
        };
        Some(directive)
    }
}

/// Totals of one transcript.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Recorded `User` turns.
    pub total: usize,
    /// Failed checks.
    pub failures: usize,
}

impl Summary {
    pub fn passed(&self) -> bool {
        self.failures == 0
    }
}

/// Drives a [`Pipeline`] through transcripts, reporting to `out`.
pub struct ScenarioEvaluator<'p, W: Write> {
    pipeline: &'p Pipeline,
    options: EvalOptions,
    out: W,
    history: Vec<HistoryEntry>,
    summary: Summary,
}

impl<'p, W: Write> ScenarioEvaluator<'p, W> {
    pub fn new(pipeline: &'p Pipeline, options: EvalOptions, out: W) -> Self {
        Self {
            pipeline,
            options,
            out,
            history: Vec::new(),
            summary: Summary::default(),
        }
    }

    /// Evaluate a transcript file from a fresh state.
    pub async fn evaluate_file(&mut self, path: &Path) -> EvalResult<Summary> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| EvalError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        self.reset();
        let mut lines = BufReader::new(file).lines();
        while let Some(line) = lines.next_line().await? {
            self.handle_line(&line).await?;
        }
        self.finish()
    }

    /// Evaluate transcript text from a fresh state.
    pub async fn evaluate_str(&mut self, transcript: &str) -> EvalResult<Summary> {
        self.reset();
        for line in transcript.lines() {
            self.handle_line(line).await?;
        }
        self.finish()
    }

    /// Turns recorded in the current story.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    fn reset(&mut self) {
        self.history.clear();
        self.summary = Summary::default();
    }

    fn zero_shot(&self) -> bool {
        self.pipeline.config().zero_shot
    }

    async fn handle_line(&mut self, line: &str) -> EvalResult<()> {
        let Some(directive) = Directive::parse(line) else {
            return Ok(());
        };

        match directive {
            Directive::Story(title) => self.story(title),
            Directive::User(inquiry) => self.user(inquiry).await,
            Directive::Expect {
                target: Target::Keyphrases | Target::Topic,
                ..
            } if self.zero_shot() => Ok(()),
            Directive::Expect {
                role,
                target,
                expected,
            } => self.expect(role, target, expected),
            Directive::Unknown(_) if self.zero_shot() => Ok(()),
            Directive::Unknown(role) => Err(EvalError::UnknownRole(role.to_string())),
        }
    }

    fn story(&mut self, title: &str) -> EvalResult<()> {
        let rule = "-----------------------------------";
        writeln!(self.out)?;
        writeln!(self.out, "{}", rule)?;
        writeln!(self.out, "Story: {}{}{}{}", MAGENTA, BOLD, title, NORMAL)?;
        writeln!(self.out, "{}", rule)?;
        self.history.clear();
        Ok(())
    }

    async fn user(&mut self, inquiry: &str) -> EvalResult<()> {
        write!(self.out, "  {}\r", inquiry)?;
        self.out.flush()?;

        let recorder = StageRecorder::new();
        let ctx = Context::new(inquiry).with_history(self.history.clone());
        let start = Instant::now();

        match self.pipeline.run(ctx, &recorder).await {
            Ok(result) => {
                let duration = start.elapsed().as_millis() as u64;
                self.history
                    .push(HistoryEntry::from_turn(&result, duration, recorder.take()));
                self.summary.total += 1;
            }
            Err(e) => {
                tracing::error!(inquiry, error = %e, "pipeline failed, no answer recorded");
                writeln!(self.out, "{}{} {}{}: {}{}", RED, CROSS, YELLOW, inquiry, e, NORMAL)?;
            }
        }
        Ok(())
    }

    fn expect(&mut self, role: &str, target: Target, expected: &str) -> EvalResult<()> {
        let last = self.history.last().ok_or(EvalError::NoPriorTurn)?;
        let actual = match target {
            Target::Answer => &last.answer,
            Target::Keyphrases => &last.keyphrases,
            Target::Topic => &last.topic,
        };
        let check = Check::run(actual, expected);
        let stages = simplify(&last.stages);
        let out = &mut self.out;

        if check.passed() {
            match target {
                Target::Answer => {
                    writeln!(
                        out,
                        "{}{} {}{} {}[{} ms]{}",
                        GREEN, CHECK, CYAN, last.inquiry, GRAY, last.duration, NORMAL
                    )?;
                    let color = format!("{}{}", BOLD, GREEN);
                    writeln!(out, "  {}", highlight(actual, &check.spans, &color))?;
                    if self.options.debug_pipeline {
                        review(&stages, out)?;
                    }
                }
                _ => {
                    writeln!(
                        out,
                        "{}    {} {}: {}",
                        GRAY,
                        ARROW,
                        role,
                        highlight(actual, &check.spans, GREEN)
                    )?;
                }
            }
            return Ok(());
        }

        self.summary.failures += 1;
        let lead = match target {
            Target::Answer => {
                writeln!(
                    out,
                    "{}{} {}{} {}[{} ms]{}",
                    RED, CROSS, YELLOW, last.inquiry, GRAY, last.duration, NORMAL
                )?;
                ""
            }
            _ => RED,
        };
        writeln!(
            out,
            "{}Expected {} to contain: {}{}{}",
            lead,
            role,
            CYAN,
            check.expected(),
            NORMAL
        )?;
        writeln!(out, "{}Actual {}: {}{}{}", lead, role, MAGENTA, actual, NORMAL)?;
        review(&stages, out)?;

        if self.options.fail_fast {
            return Err(EvalError::FailFast {
                role: role.to_string(),
            });
        }
        Ok(())
    }

    fn finish(&mut self) -> EvalResult<Summary> {
        let Summary { total, failures } = self.summary;
        if failures == 0 {
            writeln!(
                self.out,
                "{}{}{} SUCCESS: {}{} test(s){}.",
                GREEN, CHECK, NORMAL, GREEN, total, NORMAL
            )?;
        } else {
            writeln!(
                self.out,
                "{}{}{} FAIL: {}{} test(s), {}{} failure(s){}.",
                RED, CROSS, NORMAL, GRAY, total, RED, failures, NORMAL
            )?;
        }
        self.out.flush()?;
        Ok(self.summary)
    }
}
