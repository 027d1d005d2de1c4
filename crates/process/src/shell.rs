use std::ffi::OsString;

/// The shell a command script is wrapped in. Scripts always run through
/// the operating system's default shell, matching what a developer would
/// get typing the command in their terminal.
#[derive(Clone, Debug)]
pub struct Shell {
    pub bin: OsString,
    pub args: Vec<OsString>,
}

impl Shell {
    /// The platform default: `cmd.exe /d /s /c` on Windows, `sh -c`
    /// everywhere else.
    pub fn system_default() -> Shell {
        if cfg!(windows) {
            Shell {
                bin: "cmd.exe".into(),
                args: vec!["/d".into(), "/s".into(), "/c".into()],
            }
        } else {
            Shell {
                bin: "sh".into(),
                args: vec!["-c".into()],
            }
        }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::system_default()
    }
}
