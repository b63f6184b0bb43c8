// Structural validation of a table, before anything is looked up or written.

use std::collections::HashMap;

use log::debug;

use crate::config::*;
use crate::table::{parse_float, parse_int, Field, Row, Table};

/// A check on the cells of one row.
#[derive(PartialEq, Debug, Clone, Copy)]
enum Rule {
    /// An integer column, checked when the cell is filled.
    Int {
        column: &'static str,
        label: &'static str,
        min: i64,
        max: Option<i64>,
    },
    /// A decimal column, checked when the cell is filled.
    Decimal {
        column: &'static str,
        label: &'static str,
        min: f64,
        max: f64,
    },
    /// valid_votes + rejected_votes == total_votes
    VoteSum,
    /// The value must not appear twice in the file.
    UniqueInFile {
        column: &'static str,
        what: &'static str,
    },
}

/// The shape expected for the table of one entity kind.
#[derive(PartialEq, Debug)]
pub struct Schema {
    pub kind: EntityKind,
    pub required: &'static [&'static str],
    rules: &'static [Rule],
}

const ELECTION_YEAR: Rule = Rule::Int {
    column: "election_year",
    label: "Election year",
    min: 1970,
    max: Some(2100),
};

const fn count(column: &'static str, label: &'static str) -> Rule {
    Rule::Int {
        column,
        label,
        min: 0,
        max: None,
    }
}

static DIVISION: Schema = Schema {
    kind: EntityKind::Division,
    required: &["name", "code"],
    rules: &[Rule::UniqueInFile {
        column: "code",
        what: "division code",
    }],
};

static DISTRICT: Schema = Schema {
    kind: EntityKind::District,
    required: &["name", "code", "division_name"],
    rules: &[],
};

static CONSTITUENCY: Schema = Schema {
    kind: EntityKind::Constituency,
    required: &["name", "number", "district_name", "division_name"],
    rules: &[],
};

static PARTY: Schema = Schema {
    kind: EntityKind::Party,
    required: &["name"],
    rules: &[],
};

static CANDIDATE: Schema = Schema {
    kind: EntityKind::Candidate,
    required: &[
        "full_name",
        "party_name",
        "constituency_number",
        "election_year",
        "election_type",
    ],
    rules: &[
        ELECTION_YEAR,
        Rule::Int {
            column: "age",
            label: "Age",
            min: 21,
            max: Some(150),
        },
    ],
};

static POLLING_CENTER: Schema = Schema {
    kind: EntityKind::PollingCenter,
    required: &["code", "name", "constituency_number"],
    rules: &[
        Rule::Decimal {
            column: "latitude",
            label: "Latitude",
            min: -90.0,
            max: 90.0,
        },
        Rule::Decimal {
            column: "longitude",
            label: "Longitude",
            min: -180.0,
            max: 180.0,
        },
    ],
};

static POLLING_RESULT: Schema = Schema {
    kind: EntityKind::PollingResult,
    required: &[
        "polling_center_code",
        "candidate_name",
        "constituency_number",
        "election_year",
        "votes_received",
    ],
    rules: &[ELECTION_YEAR, count("votes_received", "Votes")],
};

static VOTER_DEMOGRAPHICS: Schema = Schema {
    kind: EntityKind::VoterDemographics,
    required: &["constituency_number", "election_year", "total_voters"],
    rules: &[
        ELECTION_YEAR,
        count("total_voters", "Total voters"),
        count("male_voters", "Male voters"),
        count("female_voters", "Female voters"),
        count("other_voters", "Other voters"),
        count("age_18_25", "Voters aged 18-25"),
        count("age_26_35", "Voters aged 26-35"),
        count("age_36_45", "Voters aged 36-45"),
        count("age_46_55", "Voters aged 46-55"),
        count("age_56_65", "Voters aged 56-65"),
        count("age_66_plus", "Voters aged 66 and over"),
    ],
};

static CONSTITUENCY_RESULT: Schema = Schema {
    kind: EntityKind::ConstituencyResult,
    required: &[
        "constituency_number",
        "election_year",
        "total_votes",
        "valid_votes",
        "rejected_votes",
        "turnout_percentage",
    ],
    rules: &[
        ELECTION_YEAR,
        Rule::VoteSum,
        Rule::Decimal {
            column: "turnout_percentage",
            label: "Turnout percentage",
            min: 0.0,
            max: 100.0,
        },
    ],
};

pub fn schema(kind: EntityKind) -> &'static Schema {
    match kind {
        EntityKind::Division => &DIVISION,
        EntityKind::District => &DISTRICT,
        EntityKind::Constituency => &CONSTITUENCY,
        EntityKind::Party => &PARTY,
        EntityKind::Candidate => &CANDIDATE,
        EntityKind::PollingCenter => &POLLING_CENTER,
        EntityKind::PollingResult => &POLLING_RESULT,
        EntityKind::VoterDemographics => &VOTER_DEMOGRAPHICS,
        EntityKind::ConstituencyResult => &CONSTITUENCY_RESULT,
    }
}

/// "total_voters" -> "Total voters"
pub(crate) fn column_label(column: &str) -> String {
    // age_18_25, age_66_plus
    if let Some(range) = column.strip_prefix("age_") {
        return match range.strip_suffix("_plus") {
            Some(low) => format!("Voters aged {} and over", low),
            None => format!("Voters aged {}", range.replace('_', "-")),
        };
    }
    let spaced = column.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => spaced,
    }
}

// The identifying columns of a kind read better with the kind in front:
// "Division code is required" rather than "Code is required".
fn required_label(kind: EntityKind, column: &str) -> String {
    match column {
        "name" | "code" | "number" => format!("{} {}", kind.label(), column),
        "division_name" => "Division name".to_string(),
        "district_name" => "District name".to_string(),
        _ => column_label(column),
    }
}

const VOTE_COLUMNS: [&str; 3] = ["total_votes", "valid_votes", "rejected_votes"];

/// Checks a table before import.
///
/// Returns all the problems found. If required columns are missing, a single
/// error for row 0 is returned and the rows are not inspected. Otherwise every
/// row is checked and one error is reported per violated rule. An empty result
/// means the table can be handed to the importer.
pub fn validate(table: &Table, kind: EntityKind) -> Vec<RowError> {
    let schema = schema(kind);
    let missing: Vec<&str> = schema
        .required
        .iter()
        .copied()
        .filter(|c| !table.has_column(c))
        .collect();
    if !missing.is_empty() {
        debug!("validate: {}: missing columns {:?}", kind, missing);
        return vec![RowError::new(
            0,
            Some(missing.join(",").as_str()),
            format!("Missing required columns: {}", missing.join(", ")),
        )];
    }

    let duplicates = duplicate_values(table, schema);

    let mut errors: Vec<RowError> = Vec::new();
    for row in table.rows() {
        for column in schema.required {
            if row.field(column).present().is_none() {
                errors.push(RowError::new(
                    row.number(),
                    Some(*column),
                    format!("{} is required", required_label(kind, column)),
                ));
            }
        }
        for rule in schema.rules {
            if let Some(e) = check_rule(rule, &row, &duplicates) {
                errors.push(e);
            }
        }
    }
    debug!("validate: {}: {} error(s)", kind, errors.len());
    errors
}

// For each column that must be unique, the number of occurrences of every value.
fn duplicate_values(table: &Table, schema: &Schema) -> HashMap<&'static str, HashMap<String, usize>> {
    let mut res: HashMap<&'static str, HashMap<String, usize>> = HashMap::new();
    for rule in schema.rules {
        if let Rule::UniqueInFile { column, .. } = rule {
            let counts = res.entry(*column).or_default();
            for row in table.rows() {
                if let Field::Present(v) = row.field(column) {
                    *counts.entry(v.to_string()).or_insert(0) += 1;
                }
            }
        }
    }
    res
}

fn check_rule(
    rule: &Rule,
    row: &Row,
    duplicates: &HashMap<&'static str, HashMap<String, usize>>,
) -> Option<RowError> {
    let fail = |column: &str, msg: String| Some(RowError::new(row.number(), Some(column), msg));
    match *rule {
        Rule::Int {
            column,
            label,
            min,
            max,
        } => {
            let s = row.field(column).present()?;
            match parse_int(s) {
                None => fail(column, format!("{} must be a valid integer", label)),
                Some(v) => match max {
                    Some(max) if v < min || v > max => {
                        fail(column, format!("{} must be between {} and {}", label, min, max))
                    }
                    None if v < min && min == 0 => {
                        fail(column, format!("{} must be non-negative", label))
                    }
                    None if v < min => fail(column, format!("{} must be at least {}", label, min)),
                    _ => None,
                },
            }
        }
        Rule::Decimal {
            column,
            label,
            min,
            max,
        } => {
            let s = row.field(column).present()?;
            match parse_float(s) {
                None => fail(column, format!("{} must be a valid number", label)),
                Some(v) if v < min || v > max => {
                    fail(column, format!("{} must be between {} and {}", label, min, max))
                }
                Some(_) => None,
            }
        }
        Rule::VoteSum => {
            let joint = VOTE_COLUMNS.join(",");
            let cells: Vec<&str> = VOTE_COLUMNS
                .iter()
                .filter_map(|c| row.field(c).present())
                .collect();
            // Blank counts are already reported as missing.
            if cells.len() < VOTE_COLUMNS.len() {
                return None;
            }
            let parsed: Option<Vec<i64>> = cells.iter().map(|s| parse_int(s)).collect();
            match parsed.as_deref() {
                Some([total, valid, rejected]) => {
                    if valid.checked_add(*rejected) != Some(*total) {
                        fail(joint.as_str(), vote_sum_message(*total, *valid, *rejected))
                    } else {
                        None
                    }
                }
                _ => fail(joint.as_str(), "Vote counts must be valid integers".to_string()),
            }
        }
        Rule::UniqueInFile { column, what } => {
            let v = row.field(column).present()?;
            let n = duplicates
                .get(column)
                .and_then(|counts| counts.get(v))
                .copied()
                .unwrap_or(0);
            if n > 1 {
                fail(column, format!("Duplicate {}: {}", what, v))
            } else {
                None
            }
        }
    }
}

pub(crate) fn vote_sum_message(total: i64, valid: i64, rejected: i64) -> String {
    format!(
        "Valid votes ({}) + Rejected votes ({}) must equal Total votes ({})",
        valid, rejected, total
    )
}
