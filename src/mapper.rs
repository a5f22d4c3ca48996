use crate::schema::{CanonicalField, ColumnMapping};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Confidence attached to a header matching one of a field's anchored,
/// exact-phrase patterns.
pub const EXACT_MATCH_CONFIDENCE: f64 = 0.95;
/// Confidence attached to an unanchored, partial pattern match.
pub const PARTIAL_MATCH_CONFIDENCE: f64 = 0.75;
/// Candidates below this confidence are never assigned; the field stays
/// unmapped and the caller is expected to confirm or override.
pub const MIN_ASSIGNMENT_CONFIDENCE: f64 = 0.70;

/// Best canonical-field candidate for one header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSuggestion {
    pub header: String,
    pub header_index: usize,
    pub field: CanonicalField,
    pub confidence: f64,
}

/// Result of resolving all header suggestions into an injective mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingResolution {
    pub mapping: ColumnMapping,
    pub suggestions: Vec<ColumnSuggestion>,
    /// Headers that matched no rule or lost every conflict; diagnostics only.
    pub unmapped_columns: Vec<String>,
}

struct FieldRules {
    field: CanonicalField,
    exact: Vec<Regex>,
    partial: Vec<Regex>,
}

// Pattern order within a field matters only for readability; every exact
// pattern carries the same confidence, as does every partial one.
const RULE_TABLE: &[(CanonicalField, &[&str], &[&str])] = &[
    (
        CanonicalField::InvoiceId,
        &[
            r"^invoice\s*(id|number|no\.?|num|#)$",
            r"^inv\.?\s*(no\.?|num|#)$",
            r"^invoice$",
            r"^reference(\s*(no\.?|number))?$",
            r"^document\s*(no\.?|number)$",
        ],
        &[r"invoice\s*(id|number|no)", r"\binv\b"],
    ),
    (
        CanonicalField::CustomerId,
        &[
            r"^customer\s*(id|number|no\.?|code)$",
            r"^client\s*(id|number|code)$",
            r"^account\s*(id|number|no\.?)$",
            r"^cust\.?\s*(id|no\.?)$",
        ],
        &[r"customer\s*(id|code)", r"account\s*(id|number)"],
    ),
    (
        CanonicalField::CustomerName,
        &[
            r"^customer(\s*name)?$",
            r"^client(\s*name)?$",
            r"^company(\s*name)?$",
            r"^account(\s*name)?$",
            r"^(billed|bill)\s*to$",
            r"^name$",
        ],
        &[r"customer", r"client", r"company"],
    ),
    (
        CanonicalField::Amount,
        &[
            r"^amount$",
            r"^total$",
            r"^invoice\s*(amount|total|value)$",
            r"^amount\s*due$",
            r"^total\s*(amount|due)$",
            r"^gross(\s*amount)?$",
            r"^value$",
        ],
        &[r"amount", r"total"],
    ),
    (
        CanonicalField::AmountPaid,
        &[
            r"^(amount\s*)?paid(\s*amount)?$",
            r"^payment(\s*amount)?$",
            r"^paid\s*to\s*date$",
            r"^(amount\s*)?received$",
        ],
        &[r"paid", r"payment", r"received"],
    ),
    (
        CanonicalField::InvoiceDate,
        &[
            r"^invoice\s*date$",
            r"^date$",
            r"^issued?(\s*date)?$",
            r"^billing\s*date$",
            r"^created(\s*(date|at))?$",
        ],
        &[r"invoice\s*date", r"issue", r"billing"],
    ),
    (
        CanonicalField::DueDate,
        &[
            r"^due\s*date$",
            r"^due$",
            r"^payment\s*due(\s*date)?$",
            r"^date\s*due$",
        ],
        &[r"due"],
    ),
    (
        CanonicalField::PaidDate,
        &[
            r"^paid\s*date$",
            r"^payment\s*date$",
            r"^date\s*paid$",
            r"^settled(\s*date)?$",
            r"^receipt\s*date$",
            r"^paid\s*on$",
        ],
        &[r"paid\s*(on|date)", r"payment\s*date", r"settle"],
    ),
    (
        CanonicalField::Status,
        &[
            r"^status$",
            r"^invoice\s*status$",
            r"^payment\s*status$",
            r"^state$",
        ],
        &[r"status", r"\bstate\b"],
    ),
    (
        CanonicalField::Currency,
        &[r"^currency(\s*code)?$", r"^ccy$", r"^cur\.?$"],
        &[r"currency"],
    ),
    (
        CanonicalField::Description,
        &[
            r"^description$",
            r"^memo$",
            r"^notes?$",
            r"^details?$",
            r"^line\s*item$",
            r"^item$",
        ],
        &[r"desc", r"memo", r"\bnote"],
    ),
];

fn compiled_rules() -> &'static Vec<FieldRules> {
    static RULES: OnceLock<Vec<FieldRules>> = OnceLock::new();
    RULES.get_or_init(|| {
        RULE_TABLE
            .iter()
            .map(|(field, exact, partial)| FieldRules {
                field: *field,
                exact: exact
                    .iter()
                    .map(|p| Regex::new(&format!("(?i){p}")).unwrap())
                    .collect(),
                partial: partial
                    .iter()
                    .map(|p| Regex::new(&format!("(?i){p}")).unwrap())
                    .collect(),
            })
            .collect()
    })
}

/// Best candidate field for a single header, if any rule matches.
fn best_candidate(header: &str) -> Option<(CanonicalField, f64)> {
    let trimmed = header.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut best: Option<(CanonicalField, f64)> = None;
    for rules in compiled_rules() {
        let confidence = if rules.exact.iter().any(|r| r.is_match(trimmed)) {
            Some(EXACT_MATCH_CONFIDENCE)
        } else if rules.partial.iter().any(|r| r.is_match(trimmed)) {
            Some(PARTIAL_MATCH_CONFIDENCE)
        } else {
            None
        };

        if let Some(c) = confidence {
            // Strictly-greater keeps the first field on exact ties.
            if best.map_or(true, |(_, b)| c > b) {
                best = Some((rules.field, c));
            }
        }
    }
    best
}

/// One suggestion per header that matched any rule, in header order.
pub fn suggest_column_mappings(headers: &[String]) -> Vec<ColumnSuggestion> {
    headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| {
            best_candidate(h).map(|(field, confidence)| ColumnSuggestion {
                header: h.clone(),
                header_index: i,
                field,
                confidence,
            })
        })
        .collect()
}

/// Resolve header suggestions into an injective `ColumnMapping`.
///
/// Suggestions are taken in confidence-descending order (stable, so equal
/// confidences keep input order); each field is assigned to the first
/// unclaimed header at or above `MIN_ASSIGNMENT_CONFIDENCE`.
pub fn resolve_column_mapping(headers: &[String]) -> MappingResolution {
    let suggestions = suggest_column_mappings(headers);

    let mut ordered: Vec<&ColumnSuggestion> = suggestions.iter().collect();
    ordered.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut mapping = ColumnMapping::default();
    let mut claimed = vec![false; headers.len()];
    for suggestion in ordered {
        if suggestion.confidence < MIN_ASSIGNMENT_CONFIDENCE {
            continue;
        }
        if claimed[suggestion.header_index] || mapping.get(suggestion.field).is_some() {
            continue;
        }
        mapping.set(suggestion.field, suggestion.header.clone());
        claimed[suggestion.header_index] = true;
    }

    let unmapped_columns = headers
        .iter()
        .enumerate()
        .filter(|(i, h)| !claimed[*i] && !h.trim().is_empty())
        .map(|(_, h)| h.clone())
        .collect();

    MappingResolution {
        mapping,
        suggestions,
        unmapped_columns,
    }
}
