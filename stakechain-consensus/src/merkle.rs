//! Merkle commitment over transaction content hashes
//!
//! Leaves are the transaction hashes in block order. Each level pairs adjacent
//! hashes `(0,1), (2,3), ...` and replaces every pair with `H(left || right)`.
//! A level of odd length duplicates its last hash first.
//!
//! Known weakness: duplicating the last hash means `[a, b, c]` and
//! `[a, b, c, c]` commit to the same root. Kept for compatibility with
//! existing chains; callers that care must reject duplicate transactions.

use crate::{Hash256, Transaction};

/// Root over a list of leaf hashes. `Hash256::ZERO` when empty.
pub fn merkle_root_of(leaves: &[Hash256]) -> Hash256 {
    if leaves.is_empty() {
        return Hash256::ZERO;
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        if level.len() % 2 != 0 {
            if let Some(last) = level.last().copied() {
                level.push(last);
            }
        }
        level = level
            .chunks(2)
            .map(|pair| Hash256::combine(&pair[0], &pair[1]))
            .collect();
    }
    level[0]
}

/// Root over the content hashes of `transactions`
pub fn merkle_root(transactions: &[Transaction]) -> Hash256 {
    let leaves: Vec<Hash256> = transactions.iter().map(Transaction::hash).collect();
    merkle_root_of(&leaves)
}
