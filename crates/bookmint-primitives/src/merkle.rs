//! Whitelist membership proofs
//!
//! # Convention
//!
//! Both the tree builder ([`MembershipTree`]) and the verifier ([`verify`])
//! use the same rules, and any external tool producing roots must too:
//!
//! - leaf: `SHA256(identity)` over the 20 raw identity bytes
//! - node: `SHA256(min(a, b) || max(a, b))`, children ordered bytewise
//! - a node without a sibling is promoted to the next level unchanged and
//!   contributes nothing to the proof
//!
//! Sorting each pair makes proofs position-free: a proof is just the sibling
//! hashes from leaf to root.

use crate::hash::Hash32;
use crate::identity::Identity;
use rs_merkle::{Hasher, MerkleTree};
use std::collections::HashSet;

/// Leaf hash bound to an identity
#[inline]
#[must_use]
pub fn leaf_hash(identity: &Identity) -> Hash32 {
    Hash32::sha256(identity.as_bytes())
}

/// Combine two nodes in sorted order
#[inline]
#[must_use]
pub fn hash_pair(a: &Hash32, b: &Hash32) -> Hash32 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    Hash32::sha256_parts(&[lo.as_bytes(), hi.as_bytes()])
}

/// Recompute the root from `leaf` and its siblings and compare with `root`.
#[must_use]
pub fn verify(proof: &[Hash32], root: Hash32, leaf: Hash32) -> bool {
    proof.iter().fold(leaf, |node, sibling| hash_pair(&node, sibling)) == root
}

/// Like [`verify`] for untrusted raw siblings; any sibling that is not
/// exactly 32 bytes makes the proof invalid.
#[must_use]
pub fn verify_slices<S: AsRef<[u8]>>(proof: &[S], root: Hash32, leaf: Hash32) -> bool {
    let parsed: Result<Vec<Hash32>, _> = proof
        .iter()
        .map(|sibling| Hash32::from_slice(sibling.as_ref()))
        .collect();
    match parsed {
        Ok(siblings) => verify(&siblings, root, leaf),
        Err(_) => false,
    }
}

/// Check that `identity` belongs to the set committed by `root`.
#[inline]
#[must_use]
pub fn verify_member(proof: &[Hash32], root: Hash32, identity: &Identity) -> bool {
    verify(proof, root, leaf_hash(identity))
}

/// `rs_merkle` hasher implementing the sorted-pair SHA-256 rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortedPairSha256;

impl Hasher for SortedPairSha256 {
    type Hash = [u8; 32];

    fn hash(data: &[u8]) -> Self::Hash {
        Hash32::sha256(data).into_bytes()
    }

    fn concat_and_hash(left: &Self::Hash, right: Option<&Self::Hash>) -> Self::Hash {
        match right {
            Some(right) => hash_pair(&Hash32::new(*left), &Hash32::new(*right)).into_bytes(),
            None => *left,
        }
    }
}

/// Builder side of the whitelist: commits a member set to a root and hands
/// out proofs.
pub struct MembershipTree {
    members: Vec<Identity>,
    inner: MerkleTree<SortedPairSha256>,
}

impl std::fmt::Debug for MembershipTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipTree")
            .field("members", &self.members.len())
            .field("root", &self.root())
            .finish()
    }
}

impl MembershipTree {
    /// Build from members; duplicates after the first occurrence are ignored.
    #[must_use]
    pub fn from_members<I>(members: I) -> Self
    where
        I: IntoIterator<Item = Identity>,
    {
        let mut seen = HashSet::new();
        let members: Vec<Identity> = members.into_iter().filter(|m| seen.insert(*m)).collect();
        let leaves: Vec<[u8; 32]> = members.iter().map(|m| leaf_hash(m).into_bytes()).collect();
        Self {
            members,
            inner: MerkleTree::from_leaves(&leaves),
        }
    }

    /// Committed root; zero for an empty set
    #[must_use]
    pub fn root(&self) -> Hash32 {
        self.inner.root().map(Hash32::new).unwrap_or_default()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn members(&self) -> &[Identity] {
        &self.members
    }

    #[must_use]
    pub fn contains(&self, identity: &Identity) -> bool {
        self.position(identity).is_some()
    }

    fn position(&self, identity: &Identity) -> Option<usize> {
        self.members.iter().position(|m| m == identity)
    }

    /// Sibling path for a member, leaf to root; `None` for non-members
    #[must_use]
    pub fn proof_for(&self, identity: &Identity) -> Option<Vec<Hash32>> {
        let index = self.position(identity)?;
        let proof = self.inner.proof(&[index]);
        Some(proof.proof_hashes().iter().copied().map(Hash32::new).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn members(n: usize) -> Vec<Identity> {
        (0..n)
            .map(|i| Identity::derive(format!("member-{i}").as_bytes()))
            .collect()
    }

    #[test]
    fn pair_hash_is_order_independent() {
        let a = Hash32::sha256(b"a");
        let b = Hash32::sha256(b"b");
        assert_eq!(hash_pair(&a, &b), hash_pair(&b, &a));
    }

    #[test]
    fn two_member_root_matches_manual_computation() {
        let set = members(2);
        let tree = MembershipTree::from_members(set.clone());
        let expected = hash_pair(&leaf_hash(&set[0]), &leaf_hash(&set[1]));
        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn single_member_root_is_leaf() {
        let set = members(1);
        let tree = MembershipTree::from_members(set.clone());
        assert_eq!(tree.root(), leaf_hash(&set[0]));
        let proof = tree.proof_for(&set[0]).unwrap();
        assert!(proof.is_empty());
        assert!(verify_member(&proof, tree.root(), &set[0]));
    }

    #[test]
    fn empty_tree_has_zero_root() {
        let tree = MembershipTree::from_members(Vec::new());
        assert!(tree.is_empty());
        assert!(tree.root().is_zero());
    }

    #[test]
    fn every_member_of_odd_tree_verifies() {
        let set = members(7);
        let tree = MembershipTree::from_members(set.clone());
        for member in &set {
            let proof = tree.proof_for(member).unwrap();
            assert!(verify_member(&proof, tree.root(), member), "{member}");
        }
    }

    #[test]
    fn outsider_does_not_verify_with_member_proof() {
        let set = members(4);
        let tree = MembershipTree::from_members(set.clone());
        let proof = tree.proof_for(&set[1]).unwrap();
        let outsider = Identity::derive(b"outsider");
        assert!(tree.proof_for(&outsider).is_none());
        assert!(!verify_member(&proof, tree.root(), &outsider));
    }

    #[test]
    fn proof_fails_against_other_root() {
        let set = members(4);
        let tree = MembershipTree::from_members(set.clone());
        let proof = tree.proof_for(&set[0]).unwrap();
        assert!(!verify_member(&proof, Hash32::sha256(b"other"), &set[0]));
    }

    #[test]
    fn truncated_or_extended_proof_fails() {
        let set = members(8);
        let tree = MembershipTree::from_members(set.clone());
        let proof = tree.proof_for(&set[5]).unwrap();
        assert_eq!(proof.len(), 3);
        assert!(!verify_member(&proof[..2], tree.root(), &set[5]));
        let mut longer = proof.clone();
        longer.push(Hash32::sha256(b"extra"));
        assert!(!verify_member(&longer, tree.root(), &set[5]));
    }

    #[test]
    fn malformed_raw_sibling_fails() {
        let set = members(2);
        let tree = MembershipTree::from_members(set.clone());
        let proof = tree.proof_for(&set[0]).unwrap();
        let good: Vec<Vec<u8>> = proof.iter().map(|h| h.as_bytes().to_vec()).collect();
        assert!(verify_slices(&good, tree.root(), leaf_hash(&set[0])));
        let bad = vec![vec![0u8; 31]];
        assert!(!verify_slices(&bad, tree.root(), leaf_hash(&set[0])));
    }

    #[test]
    fn duplicates_are_collapsed() {
        let set = members(3);
        let mut doubled = set.clone();
        doubled.extend(set.iter().copied());
        let tree = MembershipTree::from_members(doubled);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.root(), MembershipTree::from_members(set).root());
    }

    proptest! {
        #[test]
        fn prop_members_verify_and_outsiders_do_not(n in 1usize..40, pick in 0usize..40) {
            let set = members(n);
            let tree = MembershipTree::from_members(set.clone());
            let member = set[pick % n];
            let proof = tree.proof_for(&member).unwrap();
            prop_assert!(verify_member(&proof, tree.root(), &member));
            let outsider = Identity::derive(format!("outsider-{pick}").as_bytes());
            prop_assert!(!verify_member(&proof, tree.root(), &outsider));
        }
    }
}
