//! The reason/respond pipeline and its zero-shot alternative.
//!
//! ```text
//!            ┌────────┐   thought, keyphrases,   ┌─────────┐
//! inquiry ──►│ Reason │── observation, topic ───►│ Respond │──► answer
//!            └────────┘                          └─────────┘
//!
//! inquiry ──► Reply ──► answer                      (zero-shot)
//! ```
//!
//! Each stage builds its messages from fixed prompt text, a trailing window
//! of the history, and the current inquiry, then calls the backend once
//! (Reason may call it a second time when no keyphrases came back).

use crate::{
    backend::{self, Backend, BackoffConfig, ChatMessage, ChatRequest},
    chain::{BoxFut, Chain, Step},
    codec::{self, fields},
    config::PipelineConfig,
    error::Result,
    events::Delegates,
    prompt,
    types::{Context, HistoryEntry},
};
use std::sync::Arc;

/// Prior turns replayed by each stage.
const REASON_WINDOW: usize = 3;
const RESPOND_WINDOW: usize = 2;
const REPLY_WINDOW: usize = 5;

/// Partial completion that steers the model into the line format.
pub const REASON_HINT: &str = "tool: Google\nthought: ";

/// Partial completion for the respond stage in line mode.
pub const RESPOND_HINT: &str = "Answer: ";

/// Runs one turn through the configured stages.
///
/// # Example
///
/// ```no_run
/// use llm_regress::backend::HttpBackend;
/// use llm_regress::config::{ChatConfig, PipelineConfig};
/// use llm_regress::events::NoDelegates;
/// use llm_regress::pipeline::Pipeline;
/// use llm_regress::types::Context;
/// use std::sync::Arc;
///
/// # async fn example() -> llm_regress::Result<()> {
/// let backend = Arc::new(HttpBackend::new(ChatConfig::default())?);
/// let pipeline = Pipeline::new(backend, PipelineConfig::default());
/// let result = pipeline
///     .run(Context::new("What is Pitch Lake in Trinidad famous for?"), &NoDelegates)
///     .await?;
/// println!("{}", result.answer);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    backend: Arc<dyn Backend>,
    config: PipelineConfig,
    backoff: BackoffConfig,
    chain: Chain,
}

impl Pipeline {
    /// `reason` then `respond`, or `reply` alone in zero-shot mode.
    pub fn new(backend: Arc<dyn Backend>, config: PipelineConfig) -> Self {
        let chain = if config.zero_shot {
            Chain::new("zero-shot").push(Box::new(Reply))
        } else {
            Chain::new("reason-respond")
                .push(Box::new(Reason))
                .push(Box::new(Respond))
        };
        Self {
            backend,
            config,
            backoff: BackoffConfig::default(),
            chain,
        }
    }

    /// Retry policy for transient transport failures.
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Names of the stages in execution order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.chain.step_names()
    }

    /// Run every stage against `ctx`, stopping at the first error.
    pub async fn run(&self, ctx: Context, delegates: &dyn Delegates) -> Result<Context> {
        self.chain.run(self, ctx, delegates).await
    }

    async fn chat(&self, request: &ChatRequest, delegates: Option<&dyn Delegates>) -> Result<String> {
        match delegates.filter(|d| d.streams()) {
            Some(d) => {
                let mut sink = |text: &str| d.stream(text);
                backend::with_backoff(&self.backend, request, &self.backoff, Some(&mut sink)).await
            }
            None => backend::with_backoff(&self.backend, request, &self.backoff, None).await,
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .field("backoff", &self.backoff)
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Chain-of-thought step: decides what to search for and what was found.
pub struct Reason;

/// Answers the inquiry from the reasoning stage's observation.
pub struct Respond;

/// Zero-shot answer straight from the inquiry and recent turns.
pub struct Reply;

impl Step for Reason {
    fn name(&self) -> &str {
        "Reason"
    }

    fn invoke<'a>(
        &'a self,
        pipeline: &'a Pipeline,
        ctx: Context,
        delegates: &'a dyn Delegates,
    ) -> BoxFut<'a, Result<Context>> {
        Box::pin(reason(pipeline, ctx, delegates))
    }
}

impl Step for Respond {
    fn name(&self) -> &str {
        "Respond"
    }

    fn invoke<'a>(
        &'a self,
        pipeline: &'a Pipeline,
        ctx: Context,
        delegates: &'a dyn Delegates,
    ) -> BoxFut<'a, Result<Context>> {
        Box::pin(respond(pipeline, ctx, delegates))
    }
}

impl Step for Reply {
    fn name(&self) -> &str {
        "Reply"
    }

    fn invoke<'a>(
        &'a self,
        pipeline: &'a Pipeline,
        ctx: Context,
        delegates: &'a dyn Delegates,
    ) -> BoxFut<'a, Result<Context>> {
        Box::pin(reply(pipeline, ctx, delegates))
    }
}

async fn reason(pipeline: &Pipeline, mut ctx: Context, delegates: &dyn Delegates) -> Result<Context> {
    delegates.enter("Reason");

    let json = pipeline.config.json_schema;
    let recent = ctx.recent(REASON_WINDOW);

    let mut messages = vec![ChatMessage::system(prompt::reason_system(
        recent.is_empty(),
        json,
    ))];
    for entry in recent {
        messages.push(ChatMessage::user(entry.inquiry.as_str()));
        let past = fields([
            ("tool", "Google"),
            ("thought", entry.thought.as_str()),
            ("keyphrases", entry.keyphrases.as_str()),
            ("observation", entry.answer.as_str()),
            ("topic", entry.topic.as_str()),
        ]);
        messages.push(ChatMessage::assistant(codec::construct(&past, json)));
    }
    messages.push(ChatMessage::user(ctx.inquiry.as_str()));

    let hint = if json { "" } else { REASON_HINT };
    if !json {
        messages.push(ChatMessage::assistant(hint));
    }

    let mut request =
        ChatRequest::new(messages).with_schema(json.then(prompt::reason_schema));
    let completion = pipeline.chat(&request, None).await?;
    let mut result = codec::breakdown(hint, &completion);

    if !json && result.get("keyphrases").map_or(true, |k| k.is_empty()) {
        tracing::warn!(inquiry = %ctx.inquiry, "no keyphrases in reasoning, trying again");
        let thought = result.get("thought").map(String::as_str).unwrap_or_default();
        let hint = format!("{}{}\nkeyphrases: ", REASON_HINT, thought);
        request.messages.pop();
        request.messages.push(ChatMessage::assistant(hint.as_str()));
        let completion = pipeline.chat(&request, None).await?;
        result = codec::breakdown(&hint, &completion);
    }

    let mut take = |name: &str| result.remove(name).unwrap_or_default();
    ctx.topic = take("topic");
    ctx.thought = take("thought");
    ctx.keyphrases = take("keyphrases");
    ctx.observation = take("observation");

    delegates.leave(
        "Reason",
        &fields([
            ("topic", ctx.topic.as_str()),
            ("thought", ctx.thought.as_str()),
            ("keyphrases", ctx.keyphrases.as_str()),
            ("observation", ctx.observation.as_str()),
        ]),
    );

    ctx.history.push(HistoryEntry {
        inquiry: ctx.inquiry.clone(),
        thought: ctx.thought.clone(),
        keyphrases: ctx.keyphrases.clone(),
        topic: ctx.topic.clone(),
        observation: ctx.observation.clone(),
        ..Default::default()
    });

    Ok(ctx)
}

async fn respond(pipeline: &Pipeline, mut ctx: Context, delegates: &dyn Delegates) -> Result<Context> {
    delegates.enter("Respond");

    let json = pipeline.config.json_schema;
    let question = fields([
        ("inquiry", ctx.inquiry.as_str()),
        ("observation", ctx.observation.as_str()),
    ]);

    let mut messages = vec![
        ChatMessage::system(prompt::respond_system(ctx.recent(RESPOND_WINDOW), json)),
        ChatMessage::user(codec::construct(&question, json)),
    ];
    if !json {
        messages.push(ChatMessage::assistant(RESPOND_HINT));
    }

    let request = ChatRequest::new(messages).with_schema(json.then(prompt::respond_schema));
    let completion = pipeline.chat(&request, Some(delegates)).await?;

    ctx.answer = if json {
        codec::breakdown("", &completion)
            .remove("answer")
            .unwrap_or_default()
    } else {
        completion
    };

    delegates.leave(
        "Respond",
        &fields([
            ("inquiry", ctx.inquiry.as_str()),
            ("observation", ctx.observation.as_str()),
            ("answer", ctx.answer.as_str()),
        ]),
    );

    ctx.history.push(HistoryEntry {
        inquiry: ctx.inquiry.clone(),
        observation: ctx.observation.clone(),
        answer: ctx.answer.clone(),
        ..Default::default()
    });

    Ok(ctx)
}

async fn reply(pipeline: &Pipeline, mut ctx: Context, delegates: &dyn Delegates) -> Result<Context> {
    delegates.enter("Reply");

    let mut messages = vec![ChatMessage::system(prompt::REPLY_PROMPT)];
    for entry in ctx.recent(REPLY_WINDOW) {
        messages.push(ChatMessage::user(entry.inquiry.as_str()));
        messages.push(ChatMessage::assistant(entry.answer.as_str()));
    }
    messages.push(ChatMessage::user(ctx.inquiry.as_str()));

    let request = ChatRequest::new(messages);
    ctx.answer = pipeline.chat(&request, Some(delegates)).await?;

    delegates.leave(
        "Reply",
        &fields([
            ("inquiry", ctx.inquiry.as_str()),
            ("answer", ctx.answer.as_str()),
        ]),
    );

    Ok(ctx)
}
