use crate::shell::Shell;
use rustc_hash::{FxHashMap, FxHasher};
use std::env;
use std::ffi::{OsStr, OsString};
use std::hash::Hasher;
use std::path::PathBuf;

pub struct Command {
    pub args: Vec<OsString>,

    pub bin: OsString,

    pub cwd: Option<PathBuf>,

    pub env: FxHashMap<OsString, Option<OsString>>,

    /// Convert non-zero exits to errors.
    pub error_on_nonzero: bool,

    /// Values to pass to stdin.
    pub input: Vec<OsString>,

    /// Shell to wrap the executed command in. `None` executes the
    /// binary directly.
    pub shell: Option<Shell>,
}

impl Command {
    pub fn new<S: AsRef<OsStr>>(bin: S) -> Self {
        Command {
            bin: bin.as_ref().to_os_string(),
            args: vec![],
            cwd: None,
            env: FxHashMap::default(),
            error_on_nonzero: true,
            input: vec![],
            shell: None,
        }
    }

    /// A command that runs the provided script string through the
    /// system default shell.
    pub fn script<S: AsRef<OsStr>>(script: S) -> Self {
        let mut command = Command::new(script);
        command.shell = Some(Shell::system_default());
        command
    }

    pub fn arg<A: AsRef<OsStr>>(&mut self, arg: A) -> &mut Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg);
        }

        self
    }

    pub fn cwd<P: Into<PathBuf>>(&mut self, dir: P) -> &mut Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.env.insert(
            key.as_ref().to_os_string(),
            Some(value.as_ref().to_os_string()),
        );
        self
    }

    pub fn env_remove<K: AsRef<OsStr>>(&mut self, key: K) -> &mut Self {
        self.env.insert(key.as_ref().to_os_string(), None);
        self
    }

    pub fn input<I, V>(&mut self, input: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: AsRef<OsStr>,
    {
        for value in input {
            self.input.push(value.as_ref().to_os_string());
        }

        self
    }

    /// Prepend the provided directories to `PATH`, keeping the rest of
    /// the inherited search path intact.
    pub fn prepend_paths<I, P>(&mut self, dirs: I) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut paths = dirs.into_iter().map(Into::into).collect::<Vec<_>>();

        if paths.is_empty() {
            return self;
        }

        if let Some(current) = env::var_os("PATH") {
            paths.extend(env::split_paths(&current));
        }

        if let Ok(joined) = env::join_paths(paths) {
            self.env("PATH", joined);
        }

        self
    }

    pub fn set_error_on_nonzero(&mut self, state: bool) -> &mut Self {
        self.error_on_nonzero = state;
        self
    }

    pub fn with_shell(&mut self, shell: Shell) -> &mut Self {
        self.shell = Some(shell);
        self
    }

    pub fn without_shell(&mut self) -> &mut Self {
        self.shell = None;
        self
    }

    pub fn get_bin_name(&self) -> String {
        self.bin.to_string_lossy().to_string()
    }

    pub fn get_cache_key(&self) -> String {
        let mut hasher = FxHasher::default();

        let mut write = |value: &OsString| {
            hasher.write(value.as_os_str().as_encoded_bytes());
        };

        for (key, value) in &self.env {
            if let Some(value) = value {
                write(key);
                write(value);
            }
        }

        write(&self.bin);

        for arg in &self.args {
            write(arg);
        }

        if let Some(cwd) = &self.cwd {
            write(&cwd.as_os_str().to_os_string());
        }

        for arg in &self.input {
            write(arg);
        }

        format!("{}", hasher.finish())
    }

    pub fn should_error_nonzero(&self) -> bool {
        self.error_on_nonzero
    }

    pub fn should_pass_stdin(&self) -> bool {
        !self.input.is_empty()
    }
}
