//! "Paste all": turn a list of items into paste steps and drive them through a target.

use crate::capture::CaptureGate;
use crate::joiner::{join, JoinMode};
use crate::{Item, ItemId, ItemKind, ParseError, Payload, Store};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Extra time the capture gate stays shut beyond the paste interval.
const SUPPRESS_MARGIN: Duration = Duration::from_millis(50);

/// Upper bound on extra attempts per step, whatever the caller asks for.
pub const MAX_RETRIES_LIMIT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasteAllMode {
    /// Join every text item into one paste, then paste the rest one by one.
    #[default]
    Merge,
    /// Paste every item on its own.
    Step,
}

impl PasteAllMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PasteAllMode::Merge => "merge",
            PasteAllMode::Step => "step",
        }
    }
}

impl fmt::Display for PasteAllMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PasteAllMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "merge" => Ok(PasteAllMode::Merge),
            "step" => Ok(PasteAllMode::Step),
            _ => Err(ParseError::PasteAllMode(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PasteStep {
    Text { sources: Vec<ItemId>, text: String },
    Image { item: ItemId, path: String },
    Files { item: ItemId, paths: Vec<String> },
}

impl PasteStep {
    fn from_item(item: &Item) -> Self {
        match &item.payload {
            Payload::Text { text } => PasteStep::Text {
                sources: vec![item.id],
                text: text.clone(),
            },
            Payload::Image { path } => PasteStep::Image {
                item: item.id,
                path: path.clone(),
            },
            Payload::Files { paths } => PasteStep::Files {
                item: item.id,
                paths: paths.clone(),
            },
        }
    }

    /// Items consumed by this step.
    pub fn sources(&self) -> &[ItemId] {
        match self {
            PasteStep::Text { sources, .. } => sources,
            PasteStep::Image { item, .. } | PasteStep::Files { item, .. } => {
                std::slice::from_ref(item)
            }
        }
    }
}

pub fn plan_paste_all(
    items: &[Item],
    mode: PasteAllMode,
    join_mode: JoinMode,
    custom_sep: &str,
) -> Vec<PasteStep> {
    match mode {
        PasteAllMode::Step => items.iter().map(PasteStep::from_item).collect(),
        PasteAllMode::Merge => {
            let mut steps = Vec::new();
            let texts: Vec<&Item> = items.iter().filter(|i| i.kind() == ItemKind::Text).collect();
            let joined = join(texts.iter().map(|i| i.text()), join_mode, custom_sep);
            if !joined.is_empty() {
                steps.push(PasteStep::Text {
                    sources: texts.iter().map(|i| i.id).collect(),
                    text: joined,
                });
            }
            steps.extend(
                items
                    .iter()
                    .filter(|i| i.kind() != ItemKind::Text)
                    .map(PasteStep::from_item),
            );
            steps
        }
    }
}

/// Puts a step's content on the clipboard and triggers the paste keystroke.
pub trait PasteTarget {
    fn paste(&mut self, step: &PasteStep) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct PasteOptions {
    /// Pause between consecutive steps.
    pub interval: Duration,
    /// Extra attempts after a failed paste, capped at [`MAX_RETRIES_LIMIT`].
    pub max_retries: u32,
    /// Flag consumed items as used after a successful paste.
    pub mark_used: bool,
}

impl Default for PasteOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(120),
            max_retries: 1,
            mark_used: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasteFailure {
    pub sources: Vec<ItemId>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PasteReport {
    pub pasted: usize,
    pub marked_used: Vec<ItemId>,
    pub failures: Vec<PasteFailure>,
}

/// Run `steps` in order. A step that keeps failing is recorded in the report and
/// the run moves on; store errors abort the run.
pub fn execute_plan<S, T>(
    store: &S,
    target: &mut T,
    gate: Option<&CaptureGate>,
    steps: &[PasteStep],
    opts: &PasteOptions,
) -> anyhow::Result<PasteReport>
where
    S: Store + ?Sized,
    T: PasteTarget + ?Sized,
{
    let mut report = PasteReport::default();
    for (i, step) in steps.iter().enumerate() {
        if i > 0 && !opts.interval.is_zero() {
            std::thread::sleep(opts.interval);
        }
        if let Some(gate) = gate {
            gate.suppress_for(opts.interval + SUPPRESS_MARGIN);
        }
        match attempt(target, step, opts.max_retries) {
            Ok(()) => {
                report.pasted += 1;
                if opts.mark_used {
                    for &id in step.sources() {
                        store.mark_used(id)?;
                        report.marked_used.push(id);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(sources = ?step.sources(), error = %e, "paste failed");
                report.failures.push(PasteFailure {
                    sources: step.sources().to_vec(),
                    message: format!("{:#}", e),
                });
            }
        }
    }
    Ok(report)
}

fn attempt<T: PasteTarget + ?Sized>(
    target: &mut T,
    step: &PasteStep,
    max_retries: u32,
) -> anyhow::Result<()> {
    let mut last_err = None;
    for n in 0..=max_retries.min(MAX_RETRIES_LIMIT) {
        match target.paste(step) {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::debug!(attempt = n.saturating_add(1), error = %e, "paste attempt failed");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("paste was never attempted")))
}
