//! Sequential composition of stages.
//!
//! [`Chain`] runs [`Step`]s left to right, handing each the context the
//! previous one returned. The first error stops the chain and is returned
//! as-is; later steps never run.

use crate::{
    error::Result, events::Delegates, pipeline::Pipeline, types::Context, PipelineError,
};
use std::future::Future;
use std::pin::Pin;

/// A boxed, pinned, Send future -- the return type of [`Step::invoke`].
pub type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe stage handler.
///
/// A step takes ownership of the context, calls the backend through
/// `pipeline`, and returns the updated context.
pub trait Step: Send + Sync {
    /// Stage name, as reported to [`Delegates`].
    fn name(&self) -> &str;

    fn invoke<'a>(
        &'a self,
        pipeline: &'a Pipeline,
        ctx: Context,
        delegates: &'a dyn Delegates,
    ) -> BoxFut<'a, Result<Context>>;
}

/// An ordered list of steps sharing one context.
///
/// `Chain` itself implements [`Step`], so chains can be nested.
pub struct Chain {
    name: String,
    steps: Vec<Box<dyn Step>>,
}

impl Chain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Add a step to the end of the chain (builder style).
    pub fn push(mut self, step: Box<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Names of the steps, in order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step in order.
    pub async fn run(
        &self,
        pipeline: &Pipeline,
        ctx: Context,
        delegates: &dyn Delegates,
    ) -> Result<Context> {
        if self.steps.is_empty() {
            return Err(PipelineError::InvalidConfig(format!(
                "chain '{}' has no steps",
                self.name
            )));
        }

        let mut current = ctx;
        for step in &self.steps {
            tracing::info!(chain = %self.name, stage = step.name(), "running stage");
            current = step.invoke(pipeline, current, delegates).await?;
        }
        Ok(current)
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("name", &self.name)
            .field("steps", &self.step_names())
            .finish()
    }
}

impl Step for Chain {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(
        &'a self,
        pipeline: &'a Pipeline,
        ctx: Context,
        delegates: &'a dyn Delegates,
    ) -> BoxFut<'a, Result<Context>> {
        Box::pin(self.run(pipeline, ctx, delegates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::config::PipelineConfig;
    use crate::events::NoDelegates;
    use std::sync::Arc;

    /// Appends its tag to the answer.
    struct Tag(&'static str);

    impl Step for Tag {
        fn name(&self) -> &str {
            self.0
        }

        fn invoke<'a>(
            &'a self,
            _pipeline: &'a Pipeline,
            mut ctx: Context,
            _delegates: &'a dyn Delegates,
        ) -> BoxFut<'a, Result<Context>> {
            Box::pin(async move {
                ctx.answer.push_str(self.0);
                Ok(ctx)
            })
        }
    }

    /// Always fails.
    struct Broken;

    impl Step for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn invoke<'a>(
            &'a self,
            _pipeline: &'a Pipeline,
            _ctx: Context,
            _delegates: &'a dyn Delegates,
        ) -> BoxFut<'a, Result<Context>> {
            Box::pin(async {
                Err(PipelineError::Other("boom".into()))
            })
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(Arc::new(MockBackend::fixed("unused")), PipelineConfig::default())
    }

    #[tokio::test]
    async fn test_chain_runs_in_order() {
        let chain = Chain::new("test").push(Box::new(Tag("a"))).push(Box::new(Tag("b")));
        let out = chain
            .run(&pipeline(), Context::new("q"), &NoDelegates)
            .await
            .unwrap();
        assert_eq!(out.answer, "ab");
        assert_eq!(out.inquiry, "q");
    }

    #[tokio::test]
    async fn test_chain_short_circuits() {
        let chain = Chain::new("test")
            .push(Box::new(Tag("a")))
            .push(Box::new(Broken))
            .push(Box::new(Tag("never")));
        let result = chain.run(&pipeline(), Context::new("q"), &NoDelegates).await;
        assert!(matches!(result, Err(PipelineError::Other(ref m)) if m == "boom"));
    }

    #[tokio::test]
    async fn test_chain_empty_fails() {
        let chain = Chain::new("empty");
        let result = chain.run(&pipeline(), Context::new("q"), &NoDelegates).await;
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_chain_nests() {
        let inner = Chain::new("inner").push(Box::new(Tag("x")));
        let outer = Chain::new("outer").push(Box::new(inner)).push(Box::new(Tag("y")));
        assert_eq!(outer.step_names(), vec!["inner", "y"]);
        let out = outer
            .run(&pipeline(), Context::new("q"), &NoDelegates)
            .await
            .unwrap();
        assert_eq!(out.answer, "xy");
    }
}
