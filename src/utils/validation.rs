//! Naming rules for accounts, contracts and tokens.

/// Name reported for addresses without a registered name.
pub const ANONYMOUS_NAME: &str = "anonymous";
pub const GENESIS_NAME: &str = "genesis";
pub const NULL_NAME: &str = "null";
/// Name of the root context of a transaction script.
pub const ENTRY_CONTEXT_NAME: &str = "entry";

const MIN_NAME_LEN: usize = 3;
const MAX_NAME_LEN: usize = 15;

/// Names no account may take, in addition to native contract names.
const RESERVED_NAMES: &[&str] = &[
    "admin", "root", "system", "validator", "oracle", "bridge", "treasury", "burn", "mint",
];

/// Prefixes reserved for platforms and well-known brands.
const RESERVED_PREFIXES: &[&str] = &["nexus", "bitcoin", "ethereum", "neo", "binance", "official"];

/// Lowercase ASCII letters, digits and underscores, starting with a letter,
/// between 3 and 15 characters, and not one of the sentinel names.
pub fn is_valid_identifier(name: &str) -> bool {
    if name.len() < MIN_NAME_LEN || name.len() > MAX_NAME_LEN {
        return false;
    }
    if matches!(name, ANONYMOUS_NAME | GENESIS_NAME | NULL_NAME | ENTRY_CONTEXT_NAME) {
        return false;
    }
    name.bytes().enumerate().all(|(i, b)| match b {
        b'a'..=b'z' | b'_' => true,
        b'0'..=b'9' => i > 0,
        _ => false,
    })
}

/// True for names held back by the system. `native_names` lists the
/// registered native contract names, which are always reserved.
pub fn is_reserved_identifier(name: &str, native_names: &[&str]) -> bool {
    native_names.contains(&name)
        || RESERVED_NAMES.contains(&name)
        || RESERVED_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Token symbols are 1 to 10 uppercase ASCII letters.
pub fn is_valid_ticker(symbol: &str) -> bool {
    (1..=10).contains(&symbol.len()) && symbol.bytes().all(|b| b.is_ascii_uppercase())
}
