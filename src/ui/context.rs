//! Detection of interactive terminals

use std::io::IsTerminal;

const CI_VARS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "BUILDKITE",
    "JENKINS_URL",
    "TF_BUILD",
];

/// Decides between styled and plain output
#[derive(Debug, Clone, Copy)]
pub struct UiContext {
    fancy: bool,
}

impl UiContext {
    /// Styled output only on a terminal outside CI
    pub fn detect() -> Self {
        let on_terminal = std::io::stdout().is_terminal();
        let in_ci = CI_VARS.iter().any(|var| std::env::var_os(var).is_some());
        Self {
            fancy: on_terminal && !in_ci,
        }
    }

    pub fn plain() -> Self {
        Self { fancy: false }
    }

    pub fn use_fancy_output(&self) -> bool {
        self.fancy
    }
}
