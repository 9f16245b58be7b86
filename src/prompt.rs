//! User interaction during a run
//!
//! The orchestrator never reads stdin directly; every question goes through a
//! [`Prompt`], so runs can be driven by a terminal, by `--auto-install`, or by
//! a script in tests.

use crate::logging::log_action;

pub trait Prompt {
    /// Yes/no question
    fn ask(&mut self, question: &str) -> bool;

    /// Pick one of `options`, or `None` to skip.
    ///
    /// With `allow_skip` unset, `None` means the user cancelled.
    fn choose(&mut self, question: &str, options: &[String], allow_skip: bool) -> Option<usize>;

    /// Non-interactive prompts let the caller pick candidates on its own
    fn is_interactive(&self) -> bool {
        true
    }
}

// ============================================================================
// Auto Prompt
// ============================================================================

/// Answers every question the same way without asking anyone
#[derive(Debug, Clone, Copy)]
pub struct AutoPrompt {
    continue_on_failure: bool,
}

impl AutoPrompt {
    pub fn new(continue_on_failure: bool) -> Self {
        Self { continue_on_failure }
    }
}

impl Prompt for AutoPrompt {
    fn ask(&mut self, question: &str) -> bool {
        log_action(&format!("{} -> {} (auto)", question, yes_no(self.continue_on_failure)));
        self.continue_on_failure
    }

    fn choose(&mut self, question: &str, options: &[String], _allow_skip: bool) -> Option<usize> {
        // Listings are shown newest first
        let first = options.first();
        log_action(&format!("{} -> {:?} (auto)", question, first));
        first.map(|_| 0)
    }

    fn is_interactive(&self) -> bool {
        false
    }
}

fn yes_no(answer: bool) -> &'static str {
    if answer {
        "yes"
    } else {
        "no"
    }
}

// ============================================================================
// Terminal Prompt
// ============================================================================

#[cfg(feature = "cli")]
pub use terminal::TerminalPrompt;

#[cfg(feature = "cli")]
mod terminal {
    use inquire::{Confirm, Select};

    use super::{yes_no, Prompt};
    use crate::logging::{log_action, log_warning};

    const SKIP_OPTION: &str = "Skip this package (careful: other packages may depend on it)";

    /// Interactive prompts on the controlling terminal
    #[derive(Debug, Default, Clone, Copy)]
    pub struct TerminalPrompt;

    impl TerminalPrompt {
        pub fn new() -> Self {
            Self
        }
    }

    impl Prompt for TerminalPrompt {
        fn ask(&mut self, question: &str) -> bool {
            let answer = match Confirm::new(question).with_default(false).prompt() {
                Ok(answer) => answer,
                Err(e) => {
                    log_warning(&format!("Prompt failed ({}), answering no", e));
                    false
                }
            };
            log_action(&format!("{} -> {}", question, yes_no(answer)));
            answer
        }

        fn choose(&mut self, question: &str, options: &[String], allow_skip: bool) -> Option<usize> {
            let mut items: Vec<String> = options.to_vec();
            if allow_skip {
                items.push(SKIP_OPTION.to_string());
            }

            let picked = match Select::new(question, items).with_page_size(15).raw_prompt() {
                Ok(choice) => choice.index,
                Err(e) => {
                    log_warning(&format!("Selection cancelled: {}", e));
                    return None;
                }
            };

            if picked >= options.len() {
                log_action(&format!("{} -> skip", question));
                return None;
            }
            log_action(&format!("{} -> {}", question, options[picked]));
            Some(picked)
        }
    }
}

// ============================================================================
// Scripted Prompt
// ============================================================================

/// Replays fixed answers; panics when it runs out so tests notice unexpected questions
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: std::collections::VecDeque<bool>,
    choices: std::collections::VecDeque<Option<usize>>,
    pub questions: Vec<String>,
}

#[cfg(test)]
impl ScriptedPrompt {
    pub fn new(answers: &[bool], choices: &[Option<usize>]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            choices: choices.iter().copied().collect(),
            questions: Vec::new(),
        }
    }
}

#[cfg(test)]
impl Prompt for ScriptedPrompt {
    fn ask(&mut self, question: &str) -> bool {
        self.questions.push(question.to_string());
        self.answers
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected question: {}", question))
    }

    fn choose(&mut self, question: &str, _options: &[String], _allow_skip: bool) -> Option<usize> {
        self.questions.push(question.to_string());
        self.choices
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected choice: {}", question))
    }
}
