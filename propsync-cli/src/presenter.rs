//! Decisions asked on the terminal.
//!
//! Prompts go to stderr and answers come from stdin. An empty answer, an
//! unknown answer or end of input counts as dismissing the prompt, which the
//! engine treats as the safe choice.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use colored::Colorize;

use propsync_sync::{
    AlignDecision, AutoPolicy, ChangeDecision, ChangeRequest, Confirmation, CreateDecision,
    Presenter, ProgressSink, RetypeDecision, RetypeRequest, SchemaNotice,
};

pub struct TerminalPresenter {
    /// Answer every prompt this way instead of reading stdin.
    policy: Option<AutoPolicy>,
    progress: TerminalProgress,
}

impl TerminalPresenter {
    pub fn interactive() -> Self {
        Self {
            policy: None,
            progress: TerminalProgress::default(),
        }
    }

    pub fn with_policy(policy: AutoPolicy) -> Self {
        Self {
            policy: Some(policy),
            progress: TerminalProgress::default(),
        }
    }

    /// Stop bulk runs between documents once `flag` is set.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.progress.cancel = flag;
        self
    }

    fn choose<T: Copy>(&mut self, question: &str, choices: &[(&str, T)], auto: Auto<T>) -> T {
        eprintln!("{}", question.bold());
        if let Some(policy) = self.policy {
            let answer = match policy {
                AutoPolicy::Accept => auto.accept,
                AutoPolicy::Decline => auto.decline,
            };
            eprintln!("  {} {:?}", "auto:".bright_black(), policy);
            return answer;
        }

        let labels: Vec<String> = choices
            .iter()
            .map(|(label, _)| format!("[{}]{}", &label[..1], &label[1..]))
            .collect();
        eprint!("  {}: ", labels.join(" / "));
        let _ = io::stderr().flush();

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => return auto.dismissed,
            Ok(_) => {}
        }
        let input = line.trim().to_ascii_lowercase();
        if input.is_empty() {
            return auto.dismissed;
        }
        choices
            .iter()
            .find(|(label, _)| label.starts_with(input.as_str()))
            .map(|(_, value)| *value)
            .unwrap_or(auto.dismissed)
    }
}

struct Auto<T> {
    accept: T,
    decline: T,
    dismissed: T,
}

fn describe_retype(request: &RetypeRequest<'_>) -> String {
    format!(
        "{}: category changed from {} to '{}'",
        request.path.display(),
        request
            .from
            .map_or_else(|| "(none)".to_string(), |from| format!("'{from}'")),
        request.to
    )
}

impl Presenter for TerminalPresenter {
    fn decide_change(&mut self, request: &ChangeRequest<'_>) -> ChangeDecision {
        let mut question = format!(
            "{}: properties of '{}' changed",
            request.path.display(),
            request.category
        );
        for key in request.added {
            question.push_str(&format!("\n  {} {key}", "+".green()));
        }
        for key in request.removed {
            question.push_str(&format!("\n  {} {key}", "-".red()));
        }
        question.push_str("\nApply to every document of this category?");
        self.choose(
            &question,
            &[("apply", ChangeDecision::Apply), ("undo", ChangeDecision::Revert)],
            Auto {
                accept: ChangeDecision::Apply,
                decline: ChangeDecision::Revert,
                dismissed: ChangeDecision::Dismissed,
            },
        )
    }

    fn decide_align(&mut self, request: &RetypeRequest<'_>) -> AlignDecision {
        let question = format!(
            "{}\nAlign it with the '{}' schema?",
            describe_retype(request),
            request.to
        );
        self.choose(
            &question,
            &[("align", AlignDecision::Align), ("undo", AlignDecision::Cancel)],
            Auto {
                accept: AlignDecision::Align,
                decline: AlignDecision::Cancel,
                dismissed: AlignDecision::Dismissed,
            },
        )
    }

    fn decide_create(&mut self, request: &RetypeRequest<'_>) -> CreateDecision {
        let question = format!(
            "{}\nCreate a schema for '{}' from this document?",
            describe_retype(request),
            request.to
        );
        self.choose(
            &question,
            &[("create", CreateDecision::Create), ("undo", CreateDecision::Cancel)],
            Auto {
                accept: CreateDecision::Create,
                decline: CreateDecision::Cancel,
                dismissed: CreateDecision::Dismissed,
            },
        )
    }

    fn decide_retype(&mut self, request: &RetypeRequest<'_>) -> RetypeDecision {
        let mut choices = vec![("create", RetypeDecision::CreateNew)];
        let mut question = format!(
            "{}\nCreate a new schema for '{}'",
            describe_retype(request),
            request.to
        );
        if request.can_rename {
            choices.push(("rename", RetypeDecision::RenameExisting));
            question.push_str(&format!(
                " or rename '{}' everywhere",
                request.from.unwrap_or_default()
            ));
        }
        question.push('?');
        choices.push(("undo", RetypeDecision::Cancel));
        self.choose(
            &question,
            &choices,
            Auto {
                accept: RetypeDecision::CreateNew,
                decline: RetypeDecision::Cancel,
                dismissed: RetypeDecision::Dismissed,
            },
        )
    }

    fn confirm(&mut self, question: &str) -> Confirmation {
        self.choose(
            question,
            &[("yes", Confirmation::Yes), ("no", Confirmation::No)],
            Auto {
                accept: Confirmation::Yes,
                decline: Confirmation::No,
                dismissed: Confirmation::Dismissed,
            },
        )
    }

    fn show_notices(&mut self, notices: &[SchemaNotice]) {
        for notice in notices {
            eprintln!("{} {notice}", "schema:".cyan().bold());
        }
    }

    fn progress(&mut self) -> &mut dyn ProgressSink {
        &mut self.progress
    }
}

/// Prints the label of a bulk run and a one-line summary when it finishes.
#[derive(Debug, Default)]
struct TerminalProgress {
    total: usize,
    completed: usize,
    failures: usize,
    cancel: Arc<AtomicBool>,
}

impl TerminalProgress {
    fn finish_if_done(&self) {
        if self.completed + self.failures < self.total {
            return;
        }
        let failures = if self.failures > 0 {
            format!(", {} failed", self.failures).red().to_string()
        } else {
            String::new()
        };
        eprintln!("  {}/{} updated{failures}", self.completed, self.total);
    }
}

impl ProgressSink for TerminalProgress {
    fn set_total(&mut self, total: usize) {
        self.total = total;
        self.completed = 0;
        self.failures = 0;
    }

    fn set_status(&mut self, status: &str) {
        eprintln!("{status}…");
    }

    fn increment_completed(&mut self) {
        self.completed += 1;
        self.finish_if_done();
    }

    fn increment_failures(&mut self) {
        self.failures += 1;
        self.finish_if_done();
    }

    fn cancellation_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}
