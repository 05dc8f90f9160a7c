//! Trial ordering and per-trial presentation randomization
//!
//! Two kinds of randomness shape what a participant sees:
//! - the trial order, one permutation of the catalog per participant
//! - per-position presentation flags: which anchor comes first, and which
//!   sample comes first under each anchor
//!
//! Both are fixed once chosen. A participant resumed without a stored order
//! gets the order re-derived from a seed computed from their ID, so repeated
//! resumes always reproduce the same sequence.

use crate::identity::ParticipantId;
use crate::ratings::{Anchor, Sample};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Fresh random permutation of `[0, len)`
pub fn shuffled_order(len: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    order.shuffle(&mut rand::thread_rng());
    order
}

/// Shuffle seed for a participant, first 8 bytes of SHA-256 of the ID
pub fn participant_seed(participant_id: &ParticipantId) -> u64 {
    let digest = Sha256::digest(participant_id.as_str().as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Permutation of `[0, len)` reproducible from the participant ID
///
/// The generator must stay ChaCha8: row-store resumes re-derive the order
/// from it.
pub fn seeded_order(participant_id: &ParticipantId, len: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(participant_seed(participant_id));
    order.shuffle(&mut rng);
    order
}

/// True when `order` contains every index in `[0, len)` exactly once
pub fn is_permutation(order: &[usize], len: usize) -> bool {
    if order.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    for &idx in order {
        match seen.get_mut(idx) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}

/// Display order for one trial position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    /// Show the Indian anchor before the native one
    pub anchors_swapped: bool,
    /// Show Sample B before Sample A under the native anchor
    pub native_samples_swapped: bool,
    /// Show Sample B before Sample A under the Indian anchor
    pub indian_samples_swapped: bool,
}

impl Presentation {
    /// Canonical order (native first, A before B)
    pub const CANONICAL: Presentation = Presentation {
        anchors_swapped: false,
        native_samples_swapped: false,
        indian_samples_swapped: false,
    };

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            anchors_swapped: rng.gen(),
            native_samples_swapped: rng.gen(),
            indian_samples_swapped: rng.gen(),
        }
    }

    /// Anchors in display order
    pub fn anchors(&self) -> [Anchor; 2] {
        if self.anchors_swapped {
            [Anchor::Indian, Anchor::Native]
        } else {
            [Anchor::Native, Anchor::Indian]
        }
    }

    /// Samples in display order under the given anchor
    pub fn samples(&self, anchor: Anchor) -> [Sample; 2] {
        let swapped = match anchor {
            Anchor::Native => self.native_samples_swapped,
            Anchor::Indian => self.indian_samples_swapped,
        };
        if swapped {
            [Sample::B, Sample::A]
        } else {
            [Sample::A, Sample::B]
        }
    }
}

/// Presentation flags for every trial position, drawn once
pub fn draw_presentations(count: usize) -> Vec<Presentation> {
    let mut rng = rand::thread_rng();
    (0..count).map(|_| Presentation::random(&mut rng)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::resolve_identity;

    #[test]
    fn test_shuffled_order_is_permutation() {
        for len in [0, 1, 2, 50] {
            let order = shuffled_order(len);
            assert_eq!(order.len(), len);
            assert!(is_permutation(&order, len));
        }
    }

    #[test]
    fn test_seeded_order_reproducible() {
        let pid = resolve_identity("Jane Doe").unwrap();
        let first = seeded_order(&pid, 50);
        let second = seeded_order(&pid, 50);
        assert_eq!(first, second);
        assert!(is_permutation(&first, 50));
    }

    #[test]
    fn test_seeded_order_is_pinned() {
        let pid = resolve_identity("Jane Doe").unwrap();
        assert_eq!(pid.as_str(), "JANE_DOE_df74ec");
        assert_eq!(seeded_order(&pid, 10), vec![6, 5, 7, 1, 0, 4, 2, 8, 9, 3]);
    }

    #[test]
    fn test_seeded_order_differs_between_participants() {
        let jane = resolve_identity("Jane Doe").unwrap();
        let john = resolve_identity("John Doe").unwrap();
        assert_ne!(seeded_order(&jane, 50), seeded_order(&john, 50));
    }

    #[test]
    fn test_is_permutation_rejects_bad_orders() {
        assert!(!is_permutation(&[0, 1, 1], 3));
        assert!(!is_permutation(&[0, 1], 3));
        assert!(!is_permutation(&[0, 1, 3], 3));
        assert!(is_permutation(&[2, 0, 1], 3));
    }

    #[test]
    fn test_presentation_orders() {
        let p = Presentation {
            anchors_swapped: true,
            native_samples_swapped: false,
            indian_samples_swapped: true,
        };
        assert_eq!(p.anchors(), [Anchor::Indian, Anchor::Native]);
        assert_eq!(p.samples(Anchor::Native), [Sample::A, Sample::B]);
        assert_eq!(p.samples(Anchor::Indian), [Sample::B, Sample::A]);

        let c = Presentation::CANONICAL;
        assert_eq!(c.anchors(), [Anchor::Native, Anchor::Indian]);
    }

    #[test]
    fn test_seeded_presentation_deterministic() {
        let mut rng1 = ChaCha8Rng::seed_from_u64(7);
        let mut rng2 = ChaCha8Rng::seed_from_u64(7);
        assert_eq!(
            Presentation::random(&mut rng1),
            Presentation::random(&mut rng2)
        );
    }

    #[test]
    fn test_draw_presentations_count() {
        assert_eq!(draw_presentations(50).len(), 50);
    }
}
