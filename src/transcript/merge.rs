//! Merge planning: turning an alignment into an ordered edit plan.
//!
//! The planner walks the gap between consecutive alignment anchors and
//! resolves what the update means for every entry in between: segments are
//! fused or scheduled for removal, disagreeing words become probabilistic
//! conflicts, fresh words are inserted, and words missing from the update
//! lose an occurrence. The resulting plan is applied in one batch against
//! the transcript snapshot it was built from.

use crate::error::{Result, ScrivenerError};
use crate::transcript::lcs::{Alignment, lcs_indices};
use crate::transcript::store::{EditOp, Transcript};
use crate::transcript::word::Word;

/// Tuning knobs for the merge engine.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeConfig {
    /// Mismatch budget along any single alignment path.
    pub allowed_gaps: usize,
    /// Entries at or below this occurrence count are pruned after a merge.
    pub prune_threshold: i32,
    /// Decrement the transcript side of a gap-interior conflict.
    ///
    /// Off by default: homophones oscillate between spellings on every
    /// update, and decrementing each time starves correct words.
    pub decrement_on_conflict: bool,
    /// Run the merge rules over the region before the first anchor.
    ///
    /// Off by default: the leading region is left untouched.
    pub revise_leading_gap: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            allowed_gaps: 4,
            prune_threshold: -1,
            decrement_on_conflict: false,
            revise_leading_gap: false,
        }
    }
}

/// Projects words onto their comparable forms for alignment.
///
/// Punctuation and segments have empty comparable forms and are skipped;
/// `skips[k]` records how many entries were skipped before comparable
/// position `k`, so `k + skips[k]` recovers the absolute index.
pub fn comparable_projection(words: &[Word]) -> (Vec<String>, Vec<usize>) {
    let mut comparable = Vec::new();
    let mut skips = Vec::new();
    let mut skipped_so_far = 0;

    for word in words {
        let form = word.comparable();
        if form.is_empty() {
            skipped_so_far += 1;
        } else {
            comparable.push(form);
            skips.push(skipped_so_far);
        }
    }

    (comparable, skips)
}

/// Builds the ordered edit plan for one update.
///
/// `alignment` indexes the comparable projections of `old` and `new`;
/// `skip_old` / `skip_new` are the matching skip-prefix vectors. Operation
/// indices in the returned plan are absolute positions in `old` (for the
/// transcript tail) and `new`.
pub fn plan_merge(
    old: &[Word],
    new: &[Word],
    alignment: &Alignment,
    skip_old: &[usize],
    skip_new: &[usize],
    config: &MergeConfig,
) -> Result<Vec<EditOp>> {
    let mut ops = Vec::new();
    if alignment.is_empty() {
        return Ok(ops);
    }

    if config.revise_leading_gap {
        let first_a = alignment.a[0] + skip_old[alignment.a[0]];
        let first_b = alignment.b[0] + skip_new[alignment.b[0]];
        walk_gap(&mut ops, old, new, 0, 0, first_a, first_b, config);
    }

    let mut prev_a = alignment.a[0];
    let mut prev_b = alignment.b[0];
    for i in 1..=alignment.len() {
        let prev_a_abs = prev_a + skip_old[prev_a];
        let prev_b_abs = prev_b + skip_new[prev_b];
        check_anchor(&old[prev_a_abs], &new[prev_b_abs], prev_a_abs)?;
        ops.push(EditOp::MatchedWord {
            a: prev_a_abs,
            b: prev_b_abs,
        });

        // Past the final anchor the walk runs out to both sequence ends;
        // this is where fresh tail words enter the transcript.
        let (next_a_abs, next_b_abs) = if i == alignment.len() {
            (old.len(), new.len())
        } else {
            (
                alignment.a[i] + skip_old[alignment.a[i]],
                alignment.b[i] + skip_new[alignment.b[i]],
            )
        };

        walk_gap(
            &mut ops,
            old,
            new,
            prev_a_abs + 1,
            prev_b_abs + 1,
            next_a_abs,
            next_b_abs,
            config,
        );

        if i < alignment.len() {
            prev_a = alignment.a[i];
            prev_b = alignment.b[i];
        }
    }

    Ok(ops)
}

/// Resolves one non-matching region between anchors.
///
/// Rule priority per step: segment coincidence, dropped segment, new
/// segment, punctuation upgraded to a word, word-vs-word conflict,
/// insertion, deletion.
#[allow(clippy::too_many_arguments)]
fn walk_gap(
    ops: &mut Vec<EditOp>,
    old: &[Word],
    new: &[Word],
    mut cur_a: usize,
    mut cur_b: usize,
    next_a: usize,
    next_b: usize,
    config: &MergeConfig,
) {
    while cur_a != next_a || cur_b != next_b {
        let a_open = cur_a != next_a;
        let b_open = cur_b != next_b;

        if a_open && b_open && old[cur_a].is_segment() && new[cur_b].is_segment() {
            // 0.1 Both sides carry a segment: fuse the timing metadata.
            ops.push(EditOp::MergeSegments { a: cur_a, b: cur_b });
            cur_a += 1;
            cur_b += 1;
        } else if a_open && old[cur_a].is_segment() {
            // 0.2 The update dropped this segment. Two decrements, so a
            // stale segment disappears faster than a stale word.
            ops.push(EditOp::Decrement { a: cur_a });
            ops.push(EditOp::Decrement { a: cur_a });
            cur_a += 1;
        } else if b_open && new[cur_b].is_segment() {
            // 0.3 The update introduced a segment; it may get pruned later.
            ops.push(EditOp::Insert { a: cur_a, b: cur_b });
            cur_b += 1;
        } else if a_open && b_open && old[cur_a].is_punct() && !new[cur_b].is_punct() {
            // 1 Encourage overwriting punctuation with a real word.
            ops.push(EditOp::Decrement { a: cur_a });
            ops.push(EditOp::Conflict { a: cur_a, b: cur_b });
            cur_a += 1;
            cur_b += 1;
        } else if a_open && b_open {
            // 1.2 Mismatched words inside the gap.
            if config.decrement_on_conflict {
                ops.push(EditOp::Decrement { a: cur_a });
            }
            ops.push(EditOp::Conflict { a: cur_a, b: cur_b });
            cur_a += 1;
            cur_b += 1;
        } else if b_open {
            // 1.3 The update has words the transcript lacks.
            ops.push(EditOp::Insert { a: cur_a, b: cur_b });
            cur_b += 1;
        } else {
            // 1.4 The transcript has words missing from the update.
            ops.push(EditOp::Decrement { a: cur_a });
            cur_a += 1;
        }
    }
}

fn check_anchor(old: &Word, new: &Word, position: usize) -> Result<()> {
    if old.comparable().is_empty() || new.comparable().is_empty() {
        return Err(ScrivenerError::PlannerInvariant {
            message: format!("alignment anchor at {} is not a comparable word", position),
        });
    }
    Ok(())
}

/// Merges one deserialized update into the transcript.
///
/// Empty transcript or empty alignment append the update verbatim.
/// Otherwise the update is aligned against the active tail, the edit plan
/// is applied, low-occurrence entries are pruned, and the stale boundary
/// advances when the first anchor sits deeper in the transcript than in
/// the update.
pub fn merge_update(
    transcript: &mut Transcript,
    new_words: Vec<Word>,
    config: &MergeConfig,
) -> Result<()> {
    if transcript.is_empty() {
        transcript.push_back(new_words);
        return Ok(());
    }

    let old_words = transcript.get_words_splice();
    let (comp_old, skip_old) = comparable_projection(&old_words);
    let (comp_new, skip_new) = comparable_projection(&new_words);

    let alignment = lcs_indices(&comp_old, &comp_new, config.allowed_gaps);
    if alignment.is_empty() {
        transcript.push_back(new_words);
        return Ok(());
    }

    let ops = plan_merge(
        &old_words,
        &new_words,
        &alignment,
        &skip_old,
        &skip_new,
        config,
    )?;
    transcript.run(&ops, &new_words)?;
    transcript.clear_mistakes(config.prune_threshold);

    // Entries in front of the first anchor will never be re-visited by
    // later updates once the windows have moved past them.
    let stale = transcript.stale_word_id();
    let shifted = stale as i64 + alignment.a[0] as i64 - alignment.b[0] as i64;
    transcript.set_stale_word_id(shifted.max(stale as i64) as usize);

    Ok(())
}
