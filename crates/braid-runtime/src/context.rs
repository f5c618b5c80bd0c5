use std::collections::HashMap;

use braid_core::{IdentityId, Message, Role};
use braid_memory::MemoryItem;

/// Trim a conversation to at most `max_messages`, block-wise.
///
/// The leading run of system messages always survives, and so does the final
/// block (the latest human message and everything after it), even when that
/// alone exceeds the budget. Earlier blocks are dropped oldest-first and never
/// split, so the reasoning layer never sees an answer without its question.
pub fn trim_context(messages: &[Message], max_messages: usize) -> Vec<Message> {
    if messages.len() <= max_messages {
        return messages.to_vec();
    }

    let prefix_len = messages
        .iter()
        .take_while(|m| m.role == Role::System)
        .count();
    let rest = &messages[prefix_len..];
    if rest.is_empty() {
        return messages.to_vec();
    }

    // A block starts at each human message; anything before the first human
    // message forms its own block.
    let mut starts: Vec<usize> = vec![];
    for (i, m) in rest.iter().enumerate() {
        if m.role == Role::Human {
            starts.push(i);
        }
    }
    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }

    let blocks: Vec<&[Message]> = starts
        .iter()
        .enumerate()
        .map(|(bi, &start)| {
            let end = starts.get(bi + 1).copied().unwrap_or(rest.len());
            &rest[start..end]
        })
        .collect();

    let budget = max_messages.saturating_sub(prefix_len);
    let last = blocks.len() - 1;
    let mut first_kept = last;
    let mut used = blocks[last].len();
    // Walk backward, keeping whole blocks while they fit. Stop at the first
    // block that doesn't so the kept window is contiguous.
    for bi in (0..last).rev() {
        if used + blocks[bi].len() > budget {
            break;
        }
        used += blocks[bi].len();
        first_kept = bi;
    }

    let mut out: Vec<Message> = messages[..prefix_len].to_vec();
    for block in &blocks[first_kept..] {
        out.extend_from_slice(block);
    }
    out
}

/// Render retrieval hits as one system-message body.
///
/// Items owned by someone other than the requester are labeled with the
/// owner's name, so the assistant can attribute shared memory correctly.
pub fn format_memory_snippet(
    hits: &[(MemoryItem, f32)],
    requester: IdentityId,
    names: &HashMap<IdentityId, String>,
) -> String {
    let mut out = String::from("Relevant prior context:");
    for (item, _score) in hits {
        out.push_str("\n- ");
        if item.owner_id != requester {
            if let Some(name) = names.get(&item.owner_id) {
                out.push_str(&format!("[{}] ", name));
            }
        }
        out.push_str(&item.text);
    }
    out
}
