use std::str::FromStr;

/// How many project commands may run concurrently.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Parallelism {
    /// One worker per hardware thread. Also what the literal `max`
    /// resolves to.
    #[default]
    Auto,

    /// An explicit worker count; `1` forces serial execution.
    Fixed(usize),
}

impl Parallelism {
    pub fn resolve(&self) -> usize {
        match self {
            Parallelism::Auto => num_cpus::get(),
            Parallelism::Fixed(count) => (*count).max(1),
        }
    }
}

impl FromStr for Parallelism {
    type Err = miette::Report;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value == "max" {
            return Ok(Parallelism::Auto);
        }

        match value.parse::<usize>() {
            Ok(count) if count > 0 => Ok(Parallelism::Fixed(count)),
            _ => Err(miette::miette!(
                "Parallelism must be a positive integer or the literal \"max\", received \"{value}\"."
            )),
        }
    }
}

/// Immutable configuration for one build invocation, assembled by the
/// caller and passed into the pipeline at construction. Nothing in the
/// scheduler reads process-wide globals.
#[derive(Clone, Debug)]
pub struct RunnerOptions {
    /// The script name to execute in every selected project.
    pub command: String,

    pub parallelism: Parallelism,

    /// Suppress task stdout on the human-facing stream.
    pub quiet: bool,

    /// Restrict rebuilds to projects with local changes: a task whose
    /// own hashes match prior state skips even when something upstream
    /// of it rebuilt.
    pub changed_projects_only: bool,

    /// Count `SuccessWithWarning` as overall success.
    pub allow_warnings: bool,

    /// When false, every task executes; the state-file comparison is
    /// never consulted.
    pub incremental: bool,

    /// Drop dependency edges at task registration, letting all selected
    /// projects run in parallel irrespective of the graph.
    pub ignore_dependency_order: bool,

    /// Stop launching new tasks after the first failure; in-flight
    /// tasks still run to completion.
    pub fail_fast: bool,

    /// Optional project-configuration tag mixed into fingerprints.
    pub config_tag: Option<String>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        RunnerOptions {
            command: "build".into(),
            parallelism: Parallelism::Auto,
            quiet: false,
            changed_projects_only: false,
            allow_warnings: false,
            incremental: true,
            ignore_dependency_order: false,
            fail_fast: false,
            config_tag: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_max_as_auto() {
        assert_eq!("max".parse::<Parallelism>().unwrap(), Parallelism::Auto);
    }

    #[test]
    fn parses_positive_integers() {
        assert_eq!(
            "4".parse::<Parallelism>().unwrap(),
            Parallelism::Fixed(4)
        );
    }

    #[test]
    fn rejects_zero_and_garbage() {
        assert!("0".parse::<Parallelism>().is_err());
        assert!("lots".parse::<Parallelism>().is_err());
    }

    #[test]
    fn clamps_resolved_parallelism_to_at_least_one() {
        assert_eq!(Parallelism::Fixed(1).resolve(), 1);
        assert!(Parallelism::Auto.resolve() >= 1);
    }
}
