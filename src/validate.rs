//! Validation of user-supplied command parameters.
//!
//! Every failure is a `ZigmaError::InvalidInput` carrying the message shown
//! to the user.

use crate::types::{ZigmaError, ZigmaResult};

const POLYMARKET_HOST: &str = "polymarket.com";
const POLYMARKET_EVENT_PATH: &str = "polymarket.com/event/";

/// Accept `0x` followed by exactly 40 hex digits (either case).
pub fn validate_wallet_address(address: &str) -> ZigmaResult<()> {
    let valid = address
        .strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()));

    if valid {
        Ok(())
    } else {
        Err(ZigmaError::invalid(
            "Invalid wallet address. Please provide a valid Ethereum address (0x...)",
        ))
    }
}

/// Extract the event slug from a Polymarket URL; anything that is not a
/// Polymarket URL is returned unchanged (trimmed).
pub fn extract_market_id(input: &str) -> ZigmaResult<String> {
    let input = input.trim();
    if !input.contains(POLYMARKET_HOST) {
        return Ok(input.to_string());
    }

    input
        .find(POLYMARKET_EVENT_PATH)
        .map(|start| &input[start + POLYMARKET_EVENT_PATH.len()..])
        .map(|rest| rest.split(['/', '?', '#']).next().unwrap_or_default())
        .filter(|slug| !slug.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ZigmaError::invalid("Could not extract market ID from URL"))
}

pub fn validate_market_id(market_id: &str) -> ZigmaResult<()> {
    if market_id.trim().is_empty() {
        return Err(ZigmaError::invalid("Invalid market ID"));
    }
    Ok(())
}

/// Extract then validate in one step.
pub fn parse_market_id(input: &str) -> ZigmaResult<String> {
    let id = extract_market_id(input)?;
    validate_market_id(&id)?;
    Ok(id)
}

pub fn validate_threshold(threshold: f64) -> ZigmaResult<()> {
    if !(0.0..=100.0).contains(&threshold) {
        return Err(ZigmaError::invalid(
            "Threshold must be a number between 0 and 100",
        ));
    }
    Ok(())
}

pub fn validate_limit(limit: u32) -> ZigmaResult<()> {
    if !(1..=50).contains(&limit) {
        return Err(ZigmaError::invalid("Limit must be a number between 1 and 50"));
    }
    Ok(())
}

pub fn validate_min_edge(min_edge: f64) -> ZigmaResult<()> {
    if !(0.0..=100.0).contains(&min_edge) {
        return Err(ZigmaError::invalid(
            "Min edge must be a number between 0 and 100",
        ));
    }
    Ok(())
}
