use crate::runner_options::RunnerOptions;
use armada_cache::BuildCache;
use armada_console::{Console, OutputCollator};
use armada_vcs::ChangeAnalyzer;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The capability bundle handed to every task execution: the collator
/// for output, and the optional analyzer and cache that drive skip and
/// restore decisions. Assembled once by the pipeline builder and shared
/// read-only across workers.
pub struct RunContext {
    pub workspace_root: PathBuf,

    pub console: Arc<Console>,

    pub collator: Arc<OutputCollator>,

    /// Absent or unavailable analyzer means every task always runs
    /// fully and is not cacheable.
    pub analyzer: Option<Arc<dyn ChangeAnalyzer>>,

    /// Absent cache disables restore/store entirely.
    pub cache: Option<Arc<dyn BuildCache>>,

    pub options: Arc<RunnerOptions>,

    /// Cancelled by the caller (or ctrl-c) to drain the run: no new
    /// launches, in-flight children are signaled.
    pub cancel_token: CancellationToken,
}

impl RunContext {
    pub fn new(workspace_root: PathBuf, options: RunnerOptions) -> RunContext {
        let console = Console::new(options.quiet);

        RunContext {
            workspace_root,
            collator: OutputCollator::new(Arc::clone(&console)),
            console,
            analyzer: None,
            cache: None,
            options: Arc::new(options),
            cancel_token: CancellationToken::new(),
        }
    }

    /// A context that captures console output in memory.
    pub fn new_testing(workspace_root: PathBuf, options: RunnerOptions) -> RunContext {
        let console = Console::new_testing(options.quiet);

        RunContext {
            workspace_root,
            collator: OutputCollator::new(Arc::clone(&console)),
            console,
            analyzer: None,
            cache: None,
            options: Arc::new(options),
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn ChangeAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn BuildCache>) -> Self {
        self.cache = Some(cache);
        self
    }
}
