//! Mapping source files to their output paths.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConversionError;
use crate::types::{ConversionOutcome, ConversionTask};

/// Suffix appended to the stem of thumbnail files.
pub const THUMB_SUFFIX: &str = "_thumb";

/// Output roots for a batch.
#[derive(Debug, Clone, Copy)]
pub struct PlanRoots<'a> {
    pub input: &'a Path,
    pub webp: &'a Path,
    pub thumbs: &'a Path,
}

/// Tasks ready for the staleness check, plus sources rejected up front.
#[derive(Debug, Default)]
pub struct TaskPlan {
    pub tasks: Vec<ConversionTask>,
    /// `Failed` outcomes for sources whose outputs clash with an earlier one
    pub collisions: Vec<ConversionOutcome>,
}

impl TaskPlan {
    /// Number of sources considered, collisions included.
    pub fn len(&self) -> usize {
        self.tasks.len() + self.collisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build one task per source.
///
/// Sources are sorted first. When two sources would write the same output
/// (`photo.jpg` and `photo.png`), the first keeps it and the other is
/// turned into a failed outcome, so no two workers ever share a path.
pub fn plan_tasks(sources: impl IntoIterator<Item = PathBuf>, roots: PlanRoots<'_>) -> TaskPlan {
    let mut sources: Vec<PathBuf> = sources.into_iter().collect();
    sources.sort();

    let mut owners: HashMap<PathBuf, PathBuf> = HashMap::new();
    let mut plan = TaskPlan::default();

    for source in sources {
        let task = targets_for(&source, roots);

        let clash = [&task.target_webp_path, &task.target_thumb_path]
            .into_iter()
            .find_map(|target| owners.get(target).map(|owner| (target.clone(), owner.clone())));
        if let Some((target, other)) = clash {
            tracing::warn!(
                "{} maps to {} which {} already writes",
                source.display(),
                target.display(),
                other.display()
            );
            let size = std::fs::metadata(&source).map(|m| m.len()).unwrap_or(0);
            let error = ConversionError::TargetCollision {
                path: source.clone(),
                target,
                other,
            };
            plan.collisions
                .push(ConversionOutcome::failed(source, size, error, Duration::ZERO));
            continue;
        }

        owners.insert(task.target_webp_path.clone(), source.clone());
        owners.insert(task.target_thumb_path.clone(), source);
        plan.tasks.push(task);
    }

    plan
}

/// Output paths for a single source, mirroring its sub-folder.
pub fn targets_for(source: &Path, roots: PlanRoots<'_>) -> ConversionTask {
    let rel_dir = source
        .parent()
        .and_then(|parent| parent.strip_prefix(roots.input).ok())
        .unwrap_or_else(|| Path::new(""));
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    ConversionTask {
        source_path: source.to_path_buf(),
        target_webp_path: roots.webp.join(rel_dir).join(format!("{stem}.webp")),
        target_thumb_path: roots
            .thumbs
            .join(rel_dir)
            .join(format!("{stem}{THUMB_SUFFIX}.webp")),
    }
}
