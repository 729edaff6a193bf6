//! Shared petroleum-engineering vocabulary.
//!
//! One curated table feeds both query enhancement (synonym expansion) and
//! quota classification (is this query domain-related?). Keeping a single
//! table guarantees the two agree on what counts as a petroleum query.

/// Domain terms keyed by lowercase term, each with its expansion set.
///
/// A query matches an entry when the entry's key occurs in the lowercased
/// query text: multi-word keys as phrases, single-word keys only on word
/// boundaries. Expansions are appended to the query by the enhancer; keys
/// and expansions together define the domain vocabulary used for quota
/// classification.
const DOMAIN_TERMS: &[(&str, &[&str])] = &[
    (
        "fracking",
        &["hydraulic fracturing", "well stimulation", "proppant injection", "reservoir permeability"],
    ),
    (
        "hydraulic fracturing",
        &["fracking", "frac fluid", "proppant", "fracture gradient"],
    ),
    ("drilling", &["wellbore", "drill bit", "drilling mud", "rate of penetration"]),
    ("reservoir", &["porosity", "permeability", "formation pressure", "hydrocarbon saturation"]),
    ("wellbore", &["casing", "annulus", "borehole stability"]),
    ("completion", &["perforation", "packer", "production tubing", "well completion"]),
    ("casing", &["cementing", "casing string", "wellhead"]),
    ("cementing", &["cement slurry", "zonal isolation"]),
    ("production", &["artificial lift", "flow rate", "decline curve"]),
    ("proppant", &["sand control", "fracture conductivity"]),
    ("shale", &["unconventional reservoir", "shale gas", "horizontal drilling"]),
    ("natural gas", &["gas production", "gas reservoir", "methane"]),
    ("crude oil", &["petroleum", "oil recovery", "api gravity"]),
    ("petroleum", &["oil and gas", "upstream", "hydrocarbon"]),
    ("permeability", &["darcy flow", "formation damage"]),
    ("porosity", &["pore volume", "reservoir quality"]),
    ("formation", &["formation evaluation", "well logging"]),
    ("enhanced oil recovery", &["eor", "waterflooding", "gas injection"]),
    ("workover", &["well intervention", "recompletion"]),
];

/// A few standalone keywords that mark a query as domain-related without
/// carrying their own expansion set.
const DOMAIN_KEYWORDS: &[&str] = &[
    "oil", "gas", "well", "rig", "frac", "downhole", "offshore", "pipeline", "refinery",
    "hydrocarbon", "borehole", "mud", "tubing", "perforation", "annulus", "eor",
];

/// Expansions contributed by every table entry whose key appears in `query`.
///
/// Expansions already present in the query (case-insensitively) are skipped,
/// as are duplicates across entries. Order follows the table.
pub fn expansions_for(query: &str) -> Vec<&'static str> {
    let lower = query.to_lowercase();
    let mut out: Vec<&'static str> = Vec::new();
    for (key, expansions) in DOMAIN_TERMS {
        if !key_matches(&lower, key) {
            continue;
        }
        for expansion in *expansions {
            if lower.contains(&expansion.to_lowercase()) {
                continue;
            }
            if !out.contains(expansion) {
                out.push(expansion);
            }
        }
    }
    out
}

/// Coarse keyword-membership check for domain relevance.
///
/// Used by the usage tracker: only domain-related queries consume quota.
pub fn is_domain_related(text: &str) -> bool {
    let lower = text.to_lowercase();
    if DOMAIN_TERMS.iter().any(|(key, _)| key_matches(&lower, key)) {
        return true;
    }
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| DOMAIN_KEYWORDS.contains(&word))
}

/// Whether `key` occurs in the lowercased `text`. Multi-word keys match as
/// phrases; single-word keys only on word boundaries, so "formation" does
/// not fire inside "information" or "casing" inside "showcasing".
fn key_matches(text: &str, key: &str) -> bool {
    if key.contains(' ') {
        text.contains(key)
    } else {
        text.split(|c: char| !c.is_alphanumeric()).any(|word| word == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fracking_expands_to_hydraulic_fracturing() {
        let expansions = expansions_for("fracking");
        assert!(expansions.contains(&"hydraulic fracturing"));
        assert!(expansions.contains(&"proppant injection"));
    }

    #[test]
    fn expansions_skip_terms_already_present() {
        let expansions = expansions_for("fracking and hydraulic fracturing");
        assert!(!expansions.contains(&"hydraulic fracturing"));
        // The reverse entry still contributes its other synonyms.
        assert!(expansions.contains(&"proppant"));
    }

    #[test]
    fn unrelated_query_has_no_expansions() {
        assert!(expansions_for("best pasta recipe").is_empty());
    }

    #[test]
    fn classification_matches_table_keys() {
        assert!(is_domain_related("What is hydraulic fracturing?"));
        assert!(is_domain_related("explain DRILLING fluids"));
    }

    #[test]
    fn classification_matches_standalone_keywords_as_words() {
        assert!(is_domain_related("how deep is an offshore well"));
        // "boiler" contains "oil" as a substring but is not an oil query.
        assert!(!is_domain_related("fix my boiler"));
    }

    #[test]
    fn chit_chat_is_not_domain_related() {
        assert!(!is_domain_related("hello, how are you today?"));
    }

    #[test]
    fn table_keys_embedded_in_larger_words_do_not_classify() {
        assert!(!is_domain_related("where can I find information about roman history"));
        assert!(!is_domain_related("a documentary about reproduction in mammals"));
        assert!(!is_domain_related("showcasing the new museum wing"));
        // The keys themselves still match as standalone words.
        assert!(is_domain_related("what pressure does the formation hold?"));
    }

    #[test]
    fn embedded_keys_do_not_expand() {
        assert!(expansions_for("information about roman history").is_empty());
    }
}
