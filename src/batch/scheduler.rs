use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use anyhow::Context as _;
use rayon::prelude::*;

use crate::batch::item::{ItemReport, SharedAssets, render_item_with};
use crate::batch::layout::{InputLayout, discover_pending};
use crate::config::RenderConfig;
use crate::foundation::error::ReelResult;
use crate::render::pipeline::build_thread_pool;
use crate::text::sprite::TextRenderer;

/// Default polling interval for [`BatchScheduler::watch`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Result of one item.
#[derive(Clone, Debug, PartialEq)]
pub enum ItemOutcome {
    /// The output was written.
    Succeeded(ItemReport),
    /// The item failed; no output was written.
    Failed {
        /// Item number.
        item: u64,
        /// Error or panic message.
        error: String,
    },
}

impl ItemOutcome {
    /// Item number.
    pub fn item(&self) -> u64 {
        match self {
            Self::Succeeded(r) => r.item,
            Self::Failed { item, .. } => *item,
        }
    }

    /// Whether the item succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

/// Outcomes of a batch run in item order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchReport {
    /// One entry per attempted item.
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    /// Reports of items that succeeded.
    pub fn succeeded(&self) -> impl Iterator<Item = &ItemReport> {
        self.outcomes.iter().filter_map(|o| match o {
            ItemOutcome::Succeeded(r) => Some(r),
            ItemOutcome::Failed { .. } => None,
        })
    }

    /// `(item, error)` pairs of items that failed.
    pub fn failed(&self) -> impl Iterator<Item = (u64, &str)> {
        self.outcomes.iter().filter_map(|o| match o {
            ItemOutcome::Failed { item, error } => Some((*item, error.as_str())),
            ItemOutcome::Succeeded(_) => None,
        })
    }

    /// `true` when no item failed.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(ItemOutcome::is_success)
    }

    fn extend(&mut self, other: BatchReport) {
        self.outcomes.extend(other.outcomes);
    }
}

/// Renders pending items concurrently, isolating failures per item.
pub struct BatchScheduler {
    layout: InputLayout,
    cfg: Arc<RenderConfig>,
    assets: SharedAssets,
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for BatchScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchScheduler")
            .field("layout", &self.layout)
            .field("workers", &self.pool.current_num_threads())
            .field("font", &self.assets.font_path)
            .finish_non_exhaustive()
    }
}

impl BatchScheduler {
    /// Validate `cfg`, load the font once, create the output directory and start the worker pool.
    pub fn new(layout: InputLayout, cfg: RenderConfig) -> ReelResult<Self> {
        cfg.validate()?;
        let assets = SharedAssets::from_config(&cfg)?;
        // Fail fast on an unusable font instead of once per item.
        assets.text_renderer(&cfg)?;

        std::fs::create_dir_all(&layout.output_dir).with_context(|| {
            format!(
                "failed to create output directory '{}'",
                layout.output_dir.display()
            )
        })?;
        let pool = build_thread_pool(Some(cfg.resolved_workers()))?;
        tracing::debug!(
            workers = pool.current_num_threads(),
            input = %layout.input_dir.display(),
            output = %layout.output_dir.display(),
            "batch scheduler ready"
        );

        Ok(Self {
            layout,
            cfg: Arc::new(cfg),
            assets,
            pool,
        })
    }

    /// Directory layout.
    pub fn layout(&self) -> &InputLayout {
        &self.layout
    }

    /// Effective configuration.
    pub fn config(&self) -> &RenderConfig {
        &self.cfg
    }

    /// Items that would be rendered by [`Self::run_once`].
    pub fn pending(&self) -> ReelResult<Vec<u64>> {
        discover_pending(&self.layout)
    }

    /// Render every pending item once.
    pub fn run_once(&self) -> ReelResult<BatchReport> {
        let pending = self.pending()?;
        if pending.is_empty() {
            tracing::info!("no pending items");
            return Ok(BatchReport::default());
        }
        Ok(self.run_items(&pending))
    }

    /// Render `items` on the worker pool. Each worker owns one [`TextRenderer`].
    pub fn run_items(&self, items: &[u64]) -> BatchReport {
        self.run_items_with(items, render_item_with)
    }

    fn run_items_with<F>(&self, items: &[u64], render: F) -> BatchReport
    where
        F: Fn(&InputLayout, u64, &mut TextRenderer, &RenderConfig) -> ReelResult<ItemReport> + Sync,
    {
        tracing::info!(count = items.len(), ?items, "rendering batch");
        let cfg = &*self.cfg;
        let outcomes = self.pool.install(|| {
            items
                .par_iter()
                .map_init(
                    || self.assets.text_renderer(cfg),
                    |renderer, &item| {
                        run_isolated(&self.layout, item, renderer, &self.assets, cfg, &render)
                    },
                )
                .collect::<Vec<_>>()
        });

        let report = BatchReport { outcomes };
        let failed = report.failed().count();
        tracing::info!(
            succeeded = report.outcomes.len() - failed,
            failed,
            "batch finished"
        );
        report
    }

    /// Poll for pending items until `should_stop` returns `true`.
    ///
    /// Sleeps `poll_interval` whenever nothing is pending. An item that failed is not retried
    /// until one of its input files changes. Returns the outcomes of every round.
    pub fn watch(
        &self,
        poll_interval: Duration,
        mut should_stop: impl FnMut() -> bool,
    ) -> ReelResult<BatchReport> {
        let mut all = BatchReport::default();
        let mut failed_at: HashMap<u64, Option<SystemTime>> = HashMap::new();

        while !should_stop() {
            let pending = self
                .pending()?
                .into_iter()
                .filter(|item| match failed_at.get(item) {
                    Some(seen) => self.layout.inputs_modified(*item) > *seen,
                    None => true,
                })
                .collect::<Vec<_>>();

            if pending.is_empty() {
                tracing::debug!(
                    poll_secs = poll_interval.as_secs_f64(),
                    "no pending items, waiting for new files"
                );
                sleep_unless_stopped(poll_interval, &mut should_stop);
                continue;
            }

            let round = self.run_items(&pending);
            for outcome in &round.outcomes {
                match outcome {
                    ItemOutcome::Failed { item, .. } => {
                        failed_at.insert(*item, self.layout.inputs_modified(*item));
                    }
                    ItemOutcome::Succeeded(r) => {
                        failed_at.remove(&r.item);
                    }
                }
            }
            all.extend(round);
        }
        Ok(all)
    }
}

fn run_isolated<F>(
    layout: &InputLayout,
    item: u64,
    renderer: &mut ReelResult<TextRenderer>,
    assets: &SharedAssets,
    cfg: &RenderConfig,
    render: &F,
) -> ItemOutcome
where
    F: Fn(&InputLayout, u64, &mut TextRenderer, &RenderConfig) -> ReelResult<ItemReport>,
{
    let span = tracing::info_span!("item", item);
    let _enter = span.enter();

    let r = match renderer {
        Ok(r) => r,
        Err(e) => {
            let error = format!("caption renderer unavailable: {e}");
            tracing::error!(%error, "item failed");
            return ItemOutcome::Failed { item, error };
        }
    };

    let result = catch_unwind(AssertUnwindSafe(|| render(layout, item, r, cfg)));
    match result {
        Ok(Ok(report)) => ItemOutcome::Succeeded(report),
        Ok(Err(e)) => {
            let error = e.to_string();
            tracing::error!(%error, "item failed");
            ItemOutcome::Failed { item, error }
        }
        Err(payload) => {
            let error = format!("panicked: {}", panic_message(payload.as_ref()));
            tracing::error!(%error, "item failed");
            // The renderer may be mid-update; start the next item with a fresh one.
            *renderer = assets.text_renderer(cfg);
            if let Err(e) = std::fs::remove_file(layout.partial_path(item))
                && e.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!(error = %e, "failed to remove partial output");
            }
            ItemOutcome::Failed { item, error }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn sleep_unless_stopped(total: Duration, should_stop: &mut impl FnMut() -> bool) {
    const STEP: Duration = Duration::from_millis(200);
    let deadline = Instant::now() + total;
    loop {
        let now = Instant::now();
        if now >= deadline || should_stop() {
            return;
        }
        std::thread::sleep(STEP.min(deadline - now));
    }
}

#[cfg(test)]
#[path = "../../tests/unit/batch/scheduler.rs"]
mod tests;
