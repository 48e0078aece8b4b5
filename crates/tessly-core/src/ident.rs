// ── Identifier hashing ──
//
// Maps arbitrary signal paths to short, stable, host-safe identifiers:
// a readable base from the sanitized path plus a hash suffix of the
// unmodified input, so distinct paths never collide after sanitizing.

/// Upper bound on every identifier the engine emits, prefixes included.
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Reserved prefix for engine-owned categories.
pub const CATEGORY_PREFIX: &str = "CAT_";
/// Reserved prefix for engine-owned links.
pub const LINK_PREFIX: &str = "LNK_";
/// Bookkeeping point remembering where the link tree was last placed.
pub const LINK_TREE_MARKER: &str = "META_link_tree_parent";

const HASH_LEN: usize = 10;
const CATEGORY_HASH_LEN: usize = 8;
const PLACEHOLDER: &str = "x";

/// Identifier for the point that stores `path`.
///
/// `make_identifier("charge_state.battery_level")` yields
/// `charge_state_battery_level_<10 hex>`.
pub fn make_identifier(path: &str) -> String {
    bounded("", path, path, HASH_LEN)
}

/// Identifier for an engine-owned category named `name` under a parent
/// whose identifier is `parent_identifier` (empty for the instance root).
pub fn category_identifier(parent_identifier: &str, name: &str) -> String {
    let scope = format!("{parent_identifier}/{name}");
    bounded(CATEGORY_PREFIX, name, &scope, CATEGORY_HASH_LEN)
}

/// Identifier for an engine-owned link keyed by `key`.
pub fn link_identifier(key: &str) -> String {
    bounded(LINK_PREFIX, key, key, HASH_LEN)
}

fn bounded(prefix: &str, readable: &str, hash_input: &str, hash_len: usize) -> String {
    let digest = format!("{:x}", md5::compute(hash_input.as_bytes()));
    let hash = digest.get(..hash_len).unwrap_or(&digest);

    let budget = MAX_IDENTIFIER_LEN.saturating_sub(prefix.len() + 1 + hash.len());
    let clean = sanitize(readable);
    // sanitize() only emits ASCII, so byte slicing is char-safe
    let base = clean
        .get(..budget.min(clean.len()))
        .unwrap_or_default()
        .trim_end_matches('_');
    let base = if base.is_empty() { PLACEHOLDER } else { base };

    format!("{prefix}{base}_{hash}")
}

/// Replace every char outside `[A-Za-z0-9_]` with `_`, collapse runs of
/// `_`, trim leading and trailing `_`.
fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '_' {
            c
        } else {
            '_'
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('_').to_owned()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn hash_of(input: &str, len: usize) -> String {
        format!("{:x}", md5::compute(input.as_bytes()))[..len].to_owned()
    }

    #[test]
    fn readable_base_plus_hash() {
        let ident = make_identifier("charge_state.battery_level");
        assert_eq!(
            ident,
            format!("charge_state_battery_level_{}", hash_of("charge_state.battery_level", 10))
        );
    }

    #[test]
    fn distinct_paths_that_sanitize_alike_differ() {
        let a = make_identifier("a.b");
        let b = make_identifier("a_b");
        assert!(a.starts_with("a_b_"));
        assert!(b.starts_with("a_b_"));
        assert_ne!(a, b);
    }

    #[test]
    fn deterministic() {
        assert_eq!(make_identifier("rest.vin"), make_identifier("rest.vin"));
    }

    #[test]
    fn long_paths_are_bounded() {
        let long = "segment.".repeat(40);
        for ident in [
            make_identifier(&long),
            link_identifier(&long),
            category_identifier("CAT_parent_12345678", &long),
        ] {
            assert!(ident.len() <= MAX_IDENTIFIER_LEN, "{ident} too long");
            assert!(!ident.contains("__"), "{ident} has a double underscore");
        }
    }

    #[test]
    fn unusable_input_gets_placeholder() {
        let ident = make_identifier("...");
        assert_eq!(ident, format!("x_{}", hash_of("...", 10)));
        assert!(make_identifier("").starts_with("x_"));
        assert!(make_identifier("ü").starts_with("x_"));
    }

    #[test]
    fn runs_collapse_and_edges_trim() {
        let ident = make_identifier("__a--b..c__");
        assert!(ident.starts_with("a_b_c_"), "{ident}");
    }

    #[test]
    fn prefixed_identifiers() {
        let cat = category_identifier("", "Charging");
        assert_eq!(cat, format!("CAT_Charging_{}", hash_of("/Charging", 8)));

        let link = link_identifier("rest.charge_state.battery_level");
        assert!(link.starts_with("LNK_rest_charge_state_battery_level_"));
        assert!(cat.starts_with(CATEGORY_PREFIX));
    }

    #[test]
    fn category_identifier_depends_on_parent() {
        assert_ne!(
            category_identifier("", "Overview"),
            category_identifier("CAT_Other_00000000", "Overview")
        );
    }
}
