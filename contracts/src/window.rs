//! # Time-Window Policy
//!
//! Shared height predicates for the lifecycle engine.
//!
//! - Forward progress (distribute, reverse, dispute, adjudicate) requires
//!   `height <= termination_height`. The boundary height itself is inside.
//! - Expired retrieval requires the exact complement,
//!   `height > termination_height`.
//! - Extensions only ever add, each capped individually and cumulatively.

use holdfast_protocol::EngineConfig;

use crate::container::Container;
use crate::error::{EscrowError, EscrowResult};

/// `true` while forward-progress operations are permitted.
pub fn within_window(container: &Container, height: u64) -> bool {
    height <= container.termination_height
}

/// Fail with [`EscrowError::TimeframeExceeded`] once the window has closed.
pub fn ensure_within(container: &Container, height: u64) -> EscrowResult<()> {
    if within_window(container, height) {
        Ok(())
    } else {
        Err(EscrowError::TimeframeExceeded {
            height,
            boundary: container.termination_height,
        })
    }
}

/// Fail with [`EscrowError::TimeframeExceeded`] while the window is still open.
pub fn ensure_expired(container: &Container, height: u64) -> EscrowResult<()> {
    if within_window(container, height) {
        Err(EscrowError::TimeframeExceeded {
            height,
            boundary: container.termination_height,
        })
    } else {
        Ok(())
    }
}

/// Fail unless at least `blocks` have elapsed since `since`.
pub fn ensure_elapsed(since: u64, blocks: u64, height: u64) -> EscrowResult<()> {
    let boundary = since.saturating_add(blocks);
    if height >= boundary {
        Ok(())
    } else {
        Err(EscrowError::TimeframeExceeded { height, boundary })
    }
}

/// Termination height for a container created at `height`.
pub fn initial_termination(config: &EngineConfig, height: u64, min_span: u64) -> EscrowResult<u64> {
    let span = config.standard_duration_blocks.max(min_span);
    height
        .checked_add(span)
        .ok_or_else(|| EscrowError::InvalidQuantity("termination height overflows".into()))
}

/// Push the termination height out by `additional` blocks.
///
/// Rejects zero, anything above `max_extension_blocks`, and anything that
/// would take the cumulative extension past `max_total_extension_blocks`.
pub fn extend(container: &mut Container, additional: u64, config: &EngineConfig) -> EscrowResult<()> {
    if additional == 0 || additional > config.max_extension_blocks {
        return Err(EscrowError::InvalidQuantity(format!(
            "extension must be in 1..={} blocks, got {additional}",
            config.max_extension_blocks
        )));
    }

    let total = container
        .extended_by
        .checked_add(additional)
        .filter(|t| *t <= config.max_total_extension_blocks)
        .ok_or_else(|| {
            EscrowError::InvalidQuantity(format!(
                "cumulative extension would exceed {} blocks",
                config.max_total_extension_blocks
            ))
        })?;

    let termination = container
        .termination_height
        .checked_add(additional)
        .ok_or_else(|| EscrowError::InvalidQuantity("termination height overflows".into()))?;

    container.termination_height = termination;
    container.extended_by = total;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::record;

    #[test]
    fn boundary_height_is_inside_window() {
        let c = record(1); // termination 110
        assert!(ensure_within(&c, 110).is_ok());
        assert_eq!(
            ensure_within(&c, 111).unwrap_err(),
            EscrowError::TimeframeExceeded {
                height: 111,
                boundary: 110
            }
        );
    }

    #[test]
    fn expired_is_exact_complement() {
        let c = record(1);
        for h in [0, 109, 110, 111, 500] {
            assert_ne!(ensure_within(&c, h).is_ok(), ensure_expired(&c, h).is_ok());
        }
    }

    #[test]
    fn elapsed_check() {
        assert!(ensure_elapsed(100, 10, 110).is_ok());
        assert!(ensure_elapsed(100, 10, 109).is_err());
        assert!(ensure_elapsed(u64::MAX, 10, u64::MAX).is_ok());
    }

    #[test]
    fn extension_caps() {
        let config = EngineConfig {
            max_extension_blocks: 50,
            max_total_extension_blocks: 80,
            ..EngineConfig::default()
        };
        let mut c = record(1);

        assert!(matches!(extend(&mut c, 0, &config), Err(EscrowError::InvalidQuantity(_))));
        assert!(matches!(extend(&mut c, 51, &config), Err(EscrowError::InvalidQuantity(_))));

        extend(&mut c, 50, &config).unwrap();
        assert_eq!(c.termination_height, 160);
        assert_eq!(c.extended_by, 50);

        assert!(matches!(extend(&mut c, 31, &config), Err(EscrowError::InvalidQuantity(_))));
        assert_eq!(c.termination_height, 160);

        extend(&mut c, 30, &config).unwrap();
        assert_eq!(c.termination_height, 190);
    }

    #[test]
    fn initial_termination_honours_minimum_span() {
        let config = EngineConfig {
            standard_duration_blocks: 100,
            ..EngineConfig::default()
        };
        assert_eq!(initial_termination(&config, 5, 0).unwrap(), 105);
        assert_eq!(initial_termination(&config, 5, 300).unwrap(), 305);
        assert!(initial_termination(&config, u64::MAX, 0).is_err());
    }
}
