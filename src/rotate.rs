use std::fs;
use std::path::PathBuf;
use std::thread;

use anyhow::{bail, Result};

use crate::frames::{FrameStore, Layer};

const RENAME_WORKERS: usize = 4;

/// How many leading frames a loop offset percentage moves to the tail.
pub fn offset_frame_count(loop_offset_percent: f64, total_frames: u32) -> u32 {
    if total_frames == 0 {
        return 0;
    }
    let offset = (loop_offset_percent / 100.0 * f64::from(total_frames)).ceil() as u32;
    offset % total_frames
}

/// Rotates the frame sequence so the rendered video loops seamlessly:
/// every index in `[starting_frame, offset]` has both layer files renamed
/// to `index + total_frames`, which appends the prefix to the tail.
///
/// Returns the starting frame for rendering. A zero offset leaves the
/// sequence and the starting frame untouched. The rotation is two-phase:
/// the whole range is checked on disk before anything moves, and the
/// commit collects every failure instead of stopping at the first. There
/// is no rollback and no inverse operation.
pub fn apply_loop_offset(
    store: &FrameStore,
    starting_frame: u32,
    total_frames: u32,
    loop_offset_percent: f64,
) -> Result<u32> {
    let offset = offset_frame_count(loop_offset_percent, total_frames);
    if offset == 0 {
        return Ok(starting_frame);
    }

    // Stage: the full rename plan must be present on disk before any file
    // moves, so a truncated sequence aborts with the sequence intact.
    let mut plan: Vec<(PathBuf, PathBuf)> = Vec::new();
    let mut missing: Vec<PathBuf> = Vec::new();
    for index in starting_frame..=offset {
        for layer in Layer::ALL {
            let from = store.frame_path(layer, index);
            if from.is_file() {
                plan.push((from, store.frame_path(layer, index + total_frames)));
            } else {
                missing.push(from);
            }
        }
    }
    if !missing.is_empty() {
        bail!(
            "loop offset staging found {} missing frame file(s): {}",
            missing.len(),
            join_paths(&missing)
        );
    }

    // Commit: bounded fan-out over the plan, collecting every failure.
    let chunk = ((plan.len() + RENAME_WORKERS - 1) / RENAME_WORKERS).max(1);
    let failures: Vec<String> = thread::scope(|scope| {
        let workers: Vec<_> = plan
            .chunks(chunk)
            .map(|jobs| {
                scope.spawn(move || {
                    jobs.iter()
                        .filter_map(|(from, to)| {
                            fs::rename(from, to)
                                .map_err(|err| {
                                    format!("{} -> {}: {err}", from.display(), to.display())
                                })
                                .err()
                        })
                        .collect::<Vec<String>>()
                })
            })
            .collect();
        workers
            .into_iter()
            .flat_map(|worker| match worker.join() {
                Ok(errors) => errors,
                Err(_) => vec!["rename worker panicked".to_owned()],
            })
            .collect()
    });
    if !failures.is_empty() {
        bail!(
            "loop offset failed to move {} frame file(s): {}",
            failures.len(),
            failures.join("; ")
        );
    }

    Ok(offset + 1)
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
