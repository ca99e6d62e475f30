//! # Dispute Resolution
//!
//! Either party can move an active container into `disputed`. While it sits
//! there both parties may anchor evidence, and the protocol operator
//! eventually adjudicates with a percentage split.
//!
//! ## Evidence Model
//!
//! Evidence is stored as a BLAKE3 content hash plus a short description.
//! The payload itself lives elsewhere; the hash is the tamper-evident
//! anchor. Submissions are capped per dispute.
//!
//! ## Adjudication
//!
//! `originator_allocation` is a whole percentage in `0..=100`. The
//! originator receives `floor(quantity * p / 100)` and the beneficiary the
//! remainder, so the two payouts always sum to the container's quantity.
//! Both payouts go to the ledger as one batch: either both land or the
//! container stays `disputed` with nothing moved.

use holdfast_protocol::config::{MAX_DISPUTE_TEXT_BYTES, MAX_EVIDENCE_PER_DISPUTE};
use holdfast_protocol::crypto::hash::is_digest_hex;
use holdfast_protocol::{HeightOracle, Identity, ValueLedger};
use tracing::info;

use crate::container::{Container, ContainerRef, ContainerStatus, DisputeCase, Evidence};
use crate::error::{EscrowError, EscrowResult};
use crate::lifecycle::{require_status, EscrowEngine};
use crate::operation::{OperationKind, Role};
use crate::store::ContainerStore;
use crate::window;

/// Split `quantity` by a whole-percentage allocation to the originator.
///
/// Returns `(originator_share, beneficiary_share)`. The originator's share
/// is floored; the beneficiary takes whatever is left.
pub fn split_allocation(quantity: u64, originator_allocation: u8) -> EscrowResult<(u64, u64)> {
    if originator_allocation > 100 {
        return Err(EscrowError::InvalidQuantity(format!(
            "allocation must be a percentage in 0..=100, got {originator_allocation}"
        )));
    }
    // u128 keeps quantity * 100 from overflowing; the quotient fits in u64
    // because it never exceeds quantity.
    let originator = (u128::from(quantity) * u128::from(originator_allocation) / 100) as u64;
    Ok((originator, quantity - originator))
}

fn check_text(what: &str, text: &str) -> EscrowResult<()> {
    if text.len() > MAX_DISPUTE_TEXT_BYTES {
        return Err(EscrowError::InvalidQuantity(format!(
            "{what} exceeds {MAX_DISPUTE_TEXT_BYTES} bytes"
        )));
    }
    Ok(())
}

impl<S, L, H> EscrowEngine<S, L, H>
where
    S: ContainerStore,
    L: ValueLedger,
    H: HeightOracle,
{
    /// Open a dispute. Only the two parties may do this.
    pub fn initiate_dispute(
        &self,
        caller: &Identity,
        reference: ContainerRef,
        reason: &str,
    ) -> EscrowResult<Container> {
        let op = OperationKind::InitiateDispute;
        self.transition(caller, reference, op, |c, height| {
            self.authorize(caller, c, &[Role::Originator, Role::Beneficiary], op)?;
            require_status(c, &[ContainerStatus::Pending, ContainerStatus::Accepted], op)?;
            window::ensure_within(c, height)?;
            check_text("dispute reason", reason)?;

            c.status = ContainerStatus::Disputed;
            c.dispute = Some(DisputeCase {
                initiated_by: caller.clone(),
                reason: reason.to_string(),
                opened_at_height: height,
                evidence: Vec::new(),
            });
            Ok(Vec::new())
        })
    }

    /// Anchor a piece of evidence on an open dispute.
    pub fn submit_evidence(
        &self,
        caller: &Identity,
        reference: ContainerRef,
        description: &str,
        data_hash: &str,
    ) -> EscrowResult<Container> {
        let op = OperationKind::SubmitEvidence;
        self.transition(caller, reference, op, |c, height| {
            self.authorize(caller, c, &[Role::Originator, Role::Beneficiary], op)?;
            require_status(c, &[ContainerStatus::Disputed], op)?;
            window::ensure_within(c, height)?;
            check_text("evidence description", description)?;
            if !is_digest_hex(data_hash) {
                return Err(EscrowError::InvalidQuantity(
                    "evidence hash must be a 64-character hex BLAKE3 digest".into(),
                ));
            }

            let case = c
                .dispute
                .get_or_insert_with(|| DisputeCase {
                    initiated_by: caller.clone(),
                    reason: String::new(),
                    opened_at_height: height,
                    evidence: Vec::new(),
                });
            if case.evidence.len() >= MAX_EVIDENCE_PER_DISPUTE {
                return Err(EscrowError::InvalidQuantity(format!(
                    "dispute already holds {MAX_EVIDENCE_PER_DISPUTE} evidence entries"
                )));
            }
            case.evidence.push(Evidence {
                submitted_by: caller.clone(),
                description: description.to_string(),
                data_hash: data_hash.to_ascii_lowercase(),
                height,
            });
            Ok(Vec::new())
        })
    }

    /// Operator resolves a dispute, paying `originator_allocation` percent
    /// to the originator and the rest to the beneficiary.
    pub fn adjudicate(
        &self,
        caller: &Identity,
        reference: ContainerRef,
        originator_allocation: u8,
    ) -> EscrowResult<Container> {
        let op = OperationKind::Adjudicate;
        let resolved = self.transition(caller, reference, op, |c, height| {
            self.authorize(caller, c, &[Role::Operator], op)?;
            require_status(c, &[ContainerStatus::Disputed], op)?;
            window::ensure_within(c, height)?;
            let (to_originator, to_beneficiary) = split_allocation(c.quantity, originator_allocation)?;

            let legs = vec![
                self.payout(to_originator, &c.originator),
                self.payout(to_beneficiary, &c.beneficiary),
            ];
            c.quantity = 0;
            c.status = ContainerStatus::Resolved;
            Ok(legs)
        })?;

        info!(%reference, originator_allocation, "dispute adjudicated");
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_three_percent_of_one_thousand() {
        assert_eq!(split_allocation(1_000, 33).unwrap(), (330, 670));
    }

    #[test]
    fn split_floors_originator_share() {
        assert_eq!(split_allocation(7, 50).unwrap(), (3, 4));
        assert_eq!(split_allocation(1, 99).unwrap(), (0, 1));
    }

    #[test]
    fn split_conserves_quantity() {
        for quantity in [0, 1, 7, 999, 1_000, u64::MAX] {
            for p in 0..=100u8 {
                let (o, b) = split_allocation(quantity, p).unwrap();
                assert_eq!(o.checked_add(b), Some(quantity), "q={quantity} p={p}");
            }
        }
    }

    #[test]
    fn split_extremes() {
        assert_eq!(split_allocation(500, 0).unwrap(), (0, 500));
        assert_eq!(split_allocation(500, 100).unwrap(), (500, 0));
        assert!(matches!(split_allocation(500, 101), Err(EscrowError::InvalidQuantity(_))));
    }
}
