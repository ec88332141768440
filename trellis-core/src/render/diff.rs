//! Tree Differ
//!
//! Keyed children reconciliation, built to touch the realized tree as little
//! as possible.
//!
//! # How It Works
//!
//! 1. Patch the common prefix and suffix: unchanged leading and trailing
//!    runs cost no structural work.
//!
//! 2. If one side is exhausted, the remainder is a pure mount (new nodes
//!    left over) or a pure removal (old nodes left over).
//!
//! 3. Otherwise, index the remaining new window by key, walk the old window
//!    patching matches and unmounting the rest, and record for each new slot
//!    which old position filled it (`-1` marks slots with no old match). A
//!    match landing before the previous one means at least one node moved.
//!
//! 4. When something moved, compute the longest increasing subsequence of
//!    the recorded positions; nodes on it are already in relative order and
//!    stay put. A back-to-front walk mounts the unmatched slots and
//!    repositions everything else before the node after it. When nothing
//!    moved, the back walk only mounts unmatched slots.
//!
//! Keys must be unique within a children list; the differ does not detect
//! duplicates.

use std::collections::HashMap;

use tracing::trace;

use super::platform::Platform;
use super::renderer::Renderer;
use super::vnode::VNode;

impl<P: Platform> Renderer<P> {
    pub(crate) fn patch_keyed_children(
        &self,
        old: &[VNode<P::Node>],
        new: &[VNode<P::Node>],
        container: &P::Node,
    ) {
        let mut start = 0usize;
        let mut old_end = old.len() as isize - 1;
        let mut new_end = new.len() as isize - 1;

        // Common prefix.
        while (start as isize) <= old_end
            && (start as isize) <= new_end
            && old[start].key == new[start].key
        {
            self.patch(Some(&old[start]), &new[start], container, None);
            start += 1;
        }

        // Common suffix.
        while old_end >= start as isize
            && new_end >= start as isize
            && old[old_end as usize].key == new[new_end as usize].key
        {
            self.patch(
                Some(&old[old_end as usize]),
                &new[new_end as usize],
                container,
                None,
            );
            old_end -= 1;
            new_end -= 1;
        }

        if (start as isize) > old_end {
            // Old side exhausted: everything left in the new window mounts
            // before the node that follows the window.
            if (start as isize) <= new_end {
                let anchor = new.get(new_end as usize + 1).and_then(|n| n.el());
                for node in &new[start..=new_end as usize] {
                    self.patch(None, node, container, anchor.as_ref());
                }
            }
            return;
        }
        if (start as isize) > new_end {
            // New side exhausted: the rest of the old window goes away.
            for node in &old[start..=old_end as usize] {
                self.unmount(node);
            }
            return;
        }

        // General case.
        let count = (new_end - start as isize + 1) as usize;
        let mut source = vec![-1isize; count];

        let key_to_new_index: HashMap<_, _> = new[start..=new_end as usize]
            .iter()
            .enumerate()
            .filter_map(|(offset, node)| node.key.as_ref().map(|k| (k, start + offset)))
            .collect();

        let mut moved = false;
        let mut last_new_index = 0usize;
        let mut patched = 0usize;
        for (i, old_node) in old.iter().enumerate().take(old_end as usize + 1).skip(start) {
            if patched >= count {
                // Every new slot already has a node; the rest of the old
                // window is surplus.
                self.unmount(old_node);
                continue;
            }
            let matched = old_node
                .key
                .as_ref()
                .and_then(|k| key_to_new_index.get(k).copied());
            match matched {
                Some(new_index) => {
                    self.patch(Some(old_node), &new[new_index], container, None);
                    patched += 1;
                    source[new_index - start] = i as isize;
                    if new_index < last_new_index {
                        moved = true;
                    } else {
                        last_new_index = new_index;
                    }
                }
                None => self.unmount(old_node),
            }
        }

        let stable = if moved {
            longest_increasing_subsequence(&source)
        } else {
            Vec::new()
        };
        trace!(count, moved, stable = stable.len(), "keyed diff window");

        let mut s = stable.len() as isize - 1;
        for i in (0..count).rev() {
            let new_index = start + i;
            let anchor = new.get(new_index + 1).and_then(|n| n.el());
            if source[i] == -1 {
                // No old node filled this slot: mount fresh.
                self.patch(None, &new[new_index], container, anchor.as_ref());
            } else if moved {
                if s < 0 || stable[s as usize] != i {
                    self.move_node(&new[new_index], container, anchor.as_ref());
                } else {
                    s -= 1;
                }
            }
        }
    }
}

/// Indices (into `source`) of one longest strictly increasing subsequence.
/// Negative entries are unmatched-slot sentinels and never participate.
pub(crate) fn longest_increasing_subsequence(source: &[isize]) -> Vec<usize> {
    let mut tails: Vec<usize> = Vec::new();
    let mut predecessor: Vec<Option<usize>> = vec![None; source.len()];

    for (i, &value) in source.iter().enumerate() {
        if value < 0 {
            continue;
        }
        let pos = tails.partition_point(|&tail| source[tail] < value);
        if pos > 0 {
            predecessor[i] = Some(tails[pos - 1]);
        }
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }

    let mut result = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        result.push(i);
        cursor = predecessor[i];
    }
    result.reverse();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lis_of_empty_is_empty() {
        assert!(longest_increasing_subsequence(&[]).is_empty());
    }

    #[test]
    fn lis_finds_longest_run() {
        // Values 2,3,4 at indices 1,2,4 form the longest run.
        let source = [9, 2, 3, 1, 4];
        assert_eq!(longest_increasing_subsequence(&source), vec![1, 2, 4]);
    }

    #[test]
    fn lis_skips_sentinels() {
        // Several maximal answers exist ([1, 3] and [1, 5]); assert the
        // defining properties rather than one of them.
        let source = [-1isize, 0, -1, 2, -1, 1];
        let seq = longest_increasing_subsequence(&source);

        assert_eq!(seq.len(), 2);
        assert!(seq.windows(2).all(|w| source[w[0]] < source[w[1]]));
        assert!(seq.iter().all(|&i| source[i] >= 0));
    }

    #[test]
    fn lis_of_sorted_input_is_everything() {
        let source = [0, 1, 2, 3];
        assert_eq!(longest_increasing_subsequence(&source), vec![0, 1, 2, 3]);
    }

    #[test]
    fn lis_is_strictly_increasing_positions() {
        // The demonstration window from a [1,2,3,4,6,5] -> [1,3,4,2,7,5]
        // reconciliation: slots for keys 3,4,2,7 map to old rows 2,3,1,-1.
        let source = [2, 3, 1, -1];
        assert_eq!(longest_increasing_subsequence(&source), vec![0, 1]);
    }
}
