use log::{debug, warn};
use rand::Rng;
use snafu::Snafu;
use std::ops::RangeInclusive;
use std::time::Duration;

use crate::vocabulary::{normalize, Label, NormalizationMode, LABELS};

/// Failures of the remote classifier. They are never returned by the client:
/// the client retries them and ultimately turns them into `Error` labels.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CollaboratorError {
    #[snafu(display("Transport failure: {message}"))]
    Transport { message: String },
    #[snafu(display("The classifier rejected the request with status {status}"))]
    Rejected { status: u16 },
    #[snafu(display("The classifier returned an empty reply"))]
    EmptyReply,
}

/// The external text classifier: takes an instruction, returns free text.
pub trait Collaborator {
    fn generate(&self, prompt: &str) -> Result<String, CollaboratorError>;
}

/// How the client waits. Tests substitute a recording implementation.
pub trait Pause {
    fn pause(&self, delay: Duration);
}

/// Blocks the current thread.
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Added to the delay for every failed attempt.
    pub delay_step: Duration,
    /// A delay drawn uniformly from this range follows every successful call.
    pub pacing: RangeInclusive<Duration>,
}

impl RetryPolicy {
    pub fn default_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(3),
            delay_step: Duration::from_secs(2),
            pacing: Duration::from_millis(1500)..=Duration::from_millis(2500),
        }
    }

    /// Delay after the failed attempt `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay + self.delay_step * attempt
    }

    fn pacing_delay(&self) -> Duration {
        let (lo, hi) = (*self.pacing.start(), *self.pacing.end());
        if hi <= lo {
            lo
        } else {
            rand::thread_rng().gen_range(lo..=hi)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::default_policy()
    }
}

fn vocabulary_list() -> String {
    LABELS
        .iter()
        .map(|l| l.as_str())
        .collect::<Vec<&str>>()
        .join(", ")
}

/// The instruction for a batch of answers, each tagged with its 1-based position.
pub fn build_batch_prompt(items: &[String]) -> String {
    let mut prompt = format!(
        "Eres una persona de RRHH. Para cada frase, responde con UNA palabra exacta entre: {}.\n\n",
        vocabulary_list()
    );
    for (idx, item) in items.iter().enumerate() {
        prompt.push_str(&format!("{}. \"{}\"\n", idx + 1, item));
    }
    prompt.push_str("\nResponde así:\n1. emoción\n2. emoción...");
    prompt
}

pub fn build_item_prompt(item: &str) -> String {
    format!(
        "Eres una persona de recursos humanos de una consultoría tecnológica. \
         Frase: \"{}\". Responde SOLO con una palabra exacta de la lista: {}.",
        item,
        vocabulary_list()
    )
}

fn clean_label(raw: &str) -> &str {
    raw.trim()
        .trim_matches(|c: char| c == '"' || c == '*' || c == '\'')
        .trim_end_matches('.')
        .trim()
}

/// The label of one classifier answer. Only a blank source cell is `NoResponse`,
/// so that answer from the classifier is unusable.
fn reply_label(text: &str, mode: NormalizationMode) -> Label {
    match normalize(text, mode) {
        Label::NoResponse => Label::Error,
        l => l,
    }
}

/// Parses one `<index>. <label>` line. Returns the 0-based position and the label text.
fn parse_line(line: &str) -> Option<(usize, &str)> {
    let line = line.trim().trim_start_matches('*');
    let split = line.find(|c: char| c == '.' || c == ')')?;
    let idx: usize = line[..split].trim().parse().ok()?;
    if idx == 0 {
        return None;
    }
    Some((idx - 1, clean_label(&line[split + 1..])))
}

/// Maps a reply to exactly `expected` labels.
///
/// Every line that declares a position within the batch fills that position.
/// Positions without a usable line stay `Error`.
pub fn parse_batch_reply(reply: &str, expected: usize, mode: NormalizationMode) -> Vec<Label> {
    let mut res = vec![Label::Error; expected];
    let mut filled = vec![false; expected];
    for line in reply.lines().filter(|l| !l.trim().is_empty()) {
        match parse_line(line) {
            Some((pos, text)) if pos < expected && !filled[pos] => {
                res[pos] = reply_label(text, mode);
                filled[pos] = true;
            }
            Some((pos, _)) if pos < expected => {
                debug!("parse_batch_reply: duplicate position {}: {:?}", pos + 1, line);
            }
            _ => {
                debug!("parse_batch_reply: could not use line {:?}", line);
            }
        }
    }
    res
}

/// Classifies answers through a collaborator, absorbing all its failures.
pub struct ClassifierClient<C: Collaborator, P: Pause = ThreadPause> {
    collaborator: C,
    policy: RetryPolicy,
    pause: P,
    mode: NormalizationMode,
}

impl<C: Collaborator> ClassifierClient<C, ThreadPause> {
    pub fn new(collaborator: C, policy: RetryPolicy, mode: NormalizationMode) -> Self {
        ClassifierClient::with_pause(collaborator, policy, mode, ThreadPause)
    }
}

impl<C: Collaborator, P: Pause> ClassifierClient<C, P> {
    pub fn with_pause(collaborator: C, policy: RetryPolicy, mode: NormalizationMode, pause: P) -> Self {
        ClassifierClient {
            collaborator,
            policy,
            pause,
            mode,
        }
    }

    pub fn collaborator(&self) -> &C {
        &self.collaborator
    }

    pub fn pause_handle(&self) -> &P {
        &self.pause
    }

    /// Calls the collaborator with retries. `None` once every attempt failed.
    fn call(&self, prompt: &str) -> Option<String> {
        for attempt in 0..self.policy.max_attempts {
            match self.collaborator.generate(prompt) {
                Ok(reply) if !reply.trim().is_empty() => {
                    self.pause.pause(self.policy.pacing_delay());
                    return Some(reply);
                }
                Ok(_) => {
                    warn!("call: attempt {}: {}", attempt + 1, CollaboratorError::EmptyReply);
                }
                Err(e) => {
                    warn!("call: attempt {}: {}", attempt + 1, e);
                }
            }
            if attempt + 1 < self.policy.max_attempts {
                self.pause.pause(self.policy.backoff(attempt));
            }
        }
        None
    }

    /// Classifies a batch of answers. The output always has one label per input.
    pub fn classify_batch(&self, items: &[String]) -> Vec<Label> {
        if items.is_empty() {
            return Vec::new();
        }
        debug!("classify_batch: {} items", items.len());
        match self.call(&build_batch_prompt(items)) {
            Some(reply) => {
                debug!("classify_batch: reply {:?}", reply);
                parse_batch_reply(&reply, items.len(), self.mode)
            }
            None => {
                warn!(
                    "classify_batch: giving up after {} attempts, {} items marked as {}",
                    self.policy.max_attempts,
                    items.len(),
                    Label::Error
                );
                vec![Label::Error; items.len()]
            }
        }
    }

    /// Classifies a single answer, expecting a bare label as reply.
    pub fn classify_item(&self, item: &str) -> Label {
        match self.call(&build_item_prompt(item)) {
            Some(reply) => reply_label(clean_label(&reply), self.mode),
            None => Label::Error,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// Records the delays instead of sleeping.
    #[derive(Default)]
    pub struct RecordingPause {
        pub delays: RefCell<Vec<Duration>>,
    }

    impl Pause for RecordingPause {
        fn pause(&self, delay: Duration) {
            self.delays.borrow_mut().push(delay);
        }
    }

    /// Answers every numbered item of a prompt with a label picked by `pick`.
    pub struct ScriptedCollaborator<F: Fn(&str) -> Label> {
        pub pick: F,
        pub calls: Cell<usize>,
    }

    impl<F: Fn(&str) -> Label> ScriptedCollaborator<F> {
        pub fn new(pick: F) -> Self {
            ScriptedCollaborator {
                pick,
                calls: Cell::new(0),
            }
        }
    }

    impl<F: Fn(&str) -> Label> Collaborator for ScriptedCollaborator<F> {
        fn generate(&self, prompt: &str) -> Result<String, CollaboratorError> {
            self.calls.set(self.calls.get() + 1);
            let mut reply = String::new();
            for line in prompt.lines().filter(|l| l.contains('"')) {
                if let Some((pos, text)) = parse_line(line) {
                    reply.push_str(&format!("{}. {}\n", pos + 1, (self.pick)(text)));
                }
            }
            if reply.is_empty() {
                // Single answer prompt.
                if let Some(rest) = prompt.split("Frase: \"").nth(1) {
                    let text = rest.split('"').next().unwrap_or_default();
                    reply = (self.pick)(text).to_string();
                }
            }
            Ok(reply)
        }
    }

    /// Fails every call.
    pub struct BrokenCollaborator {
        pub calls: Cell<usize>,
    }

    impl Collaborator for BrokenCollaborator {
        fn generate(&self, _prompt: &str) -> Result<String, CollaboratorError> {
            self.calls.set(self.calls.get() + 1);
            Err(CollaboratorError::Transport {
                message: "connection reset".to_string(),
            })
        }
    }

    pub fn quiet_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(30),
            delay_step: Duration::from_millis(20),
            pacing: Duration::ZERO..=Duration::ZERO,
        }
    }
}
