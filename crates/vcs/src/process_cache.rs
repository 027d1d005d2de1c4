use armada_process::{output_to_string, Command};
use scc::hash_cache::Entry;
use scc::HashCache;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Memoizes VCS command output for the duration of one build invocation,
/// so that many tasks probing the same repository state do not spawn the
/// same process repeatedly.
#[derive(Debug)]
pub struct ProcessCache {
    /// Output cache of executed commands, keyed by their command line.
    cache: HashCache<String, Arc<String>>,

    /// Binary to run.
    pub bin: String,

    /// Directory to run commands from.
    pub root: PathBuf,
}

impl ProcessCache {
    pub fn new(bin: &str, root: &Path) -> Self {
        Self {
            cache: HashCache::new(),
            bin: bin.to_string(),
            root: root.to_path_buf(),
        }
    }

    pub fn create_command<I, A>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.bin);
        command.args(args);
        command.cwd(&self.root);
        // The VCS binary is expected on PATH, skip the shell overhead
        command.without_shell();
        command
    }

    pub async fn run<I, A>(&self, args: I, trim: bool) -> miette::Result<Arc<String>>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        self.run_command(self.create_command(args), trim).await
    }

    pub async fn run_command(&self, command: Command, trim: bool) -> miette::Result<Arc<String>> {
        let cache_key = command.get_cache_key();

        if let Some(cache) = self.cache.read_async(&cache_key, |_, v| v.clone()).await {
            return Ok(cache);
        }

        // Acquire an entry to lock the row while executing
        let cache = match self.cache.entry_async(cache_key).await {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let mut command = command;
                let output = command.exec_capture_output().await?;
                let value = output_to_string(&output.stdout);
                let cache = Arc::new(if trim { value.trim().to_owned() } else { value });

                entry.put_entry(Arc::clone(&cache));

                cache
            }
        };

        Ok(cache)
    }

    pub async fn run_command_without_cache(
        &self,
        mut command: Command,
        trim: bool,
    ) -> miette::Result<Arc<String>> {
        let output = command.exec_capture_output().await?;
        let value = output_to_string(&output.stdout);

        Ok(Arc::new(if trim { value.trim().to_owned() } else { value }))
    }
}
