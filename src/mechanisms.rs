//! Mechanism names and the included-mechanism filter

use fe2o3_amqp_types::primitives::Symbol;

/// SASL ANONYMOUS mechanism name
pub const ANONYMOUS: &str = "ANONYMOUS";

/// SASL PLAIN mechanism name
pub const PLAIN: &str = "PLAIN";

/// SASL EXTERNAL mechanism name
pub const EXTERNAL: &str = "EXTERNAL";

/// Upper bound on the number of mechanisms advertised in a single frame
pub(crate) const MAX_MECHS: usize = 16;

/// The surviving mechanism list does not fit in a single frame
#[derive(Debug, thiserror::Error)]
#[error("mechanism list exceeds {MAX_MECHS} entries")]
pub(crate) struct MechListOverflow;

/// Looks for a mechanism in the included-mechanism list.
///
/// Matching is case insensitive on whole words; word boundaries are a space
/// or the end of the list. An absent list includes every mechanism. A name
/// with an embedded space can never match a word and is never included.
pub fn included_mech(included: Option<&str>, name: &str) -> bool {
    let list = match included {
        Some(list) => list,
        None => return true,
    };
    if name.is_empty() {
        return false;
    }
    list.split(' ').any(|word| word.eq_ignore_ascii_case(name))
}

/// Splits a space separated mechanism list, keeping the entries that survive
/// the included-mechanism filter.
pub(crate) fn split_mechs(
    mechlist: &str,
    included: Option<&str>,
) -> Result<Vec<Symbol>, MechListOverflow> {
    let mut mechs = Vec::new();
    for word in mechlist.split(' ').filter(|word| !word.is_empty()) {
        if !included_mech(included, word) {
            continue;
        }
        if mechs.len() == MAX_MECHS {
            return Err(MechListOverflow);
        }
        mechs.push(Symbol::from(word));
    }
    Ok(mechs)
}
