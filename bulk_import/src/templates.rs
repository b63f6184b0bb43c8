// Downloadable starting points for each kind of import file.

use serde::Serialize;

use crate::builder::Builder;
use crate::config::EntityKind;
use crate::table::Table;

/// The columns accepted for a kind of import, with a couple of sample rows.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct Template {
    pub columns: &'static [&'static str],
    pub sample: &'static [&'static [&'static str]],
    pub description: &'static str,
}

impl Template {
    /// The template as a table: the columns as header and the samples as rows.
    pub fn to_table(&self) -> Table {
        let mut builder = Builder::new(self.columns);
        for row in self.sample {
            builder = builder.row(row);
        }
        builder.build()
    }
}

static DIVISION: Template = Template {
    columns: &["name", "code", "bengali_name", "total_population", "total_voters"],
    sample: &[
        &["Dhaka", "DHK", "ঢাকা", "44215000", "32000000"],
        &["Chattogram", "CTG", "চট্টগ্রাম", "33202000", "23000000"],
    ],
    description: "Import divisions, identified by their code",
};

static DISTRICT: Template = Template {
    columns: &[
        "division_name",
        "name",
        "code",
        "bengali_name",
        "area_sq_km",
        "total_voters",
    ],
    sample: &[
        &["Dhaka", "Dhaka", "DHA", "ঢাকা", "1464", "9500000"],
        &["Dhaka", "Gazipur", "GAZ", "গাজীপুর", "1806", "3200000"],
    ],
    description: "Import districts with the name of their division",
};

static CONSTITUENCY: Template = Template {
    columns: &[
        "division_name",
        "district_name",
        "number",
        "name",
        "area_description",
        "total_voters",
        "is_active",
    ],
    sample: &[
        &["Dhaka", "Dhaka", "1", "Dhaka-1", "Area description here", "350000", "true"],
        &["Dhaka", "Dhaka", "2", "Dhaka-2", "Area description here", "320000", "true"],
    ],
    description: "Import constituencies with division and district names",
};

static PARTY: Template = Template {
    columns: &["name", "acronym", "symbol_name", "color_code", "is_registered"],
    sample: &[
        &["Awami League", "AL", "Boat", "#006A4E", "true"],
        &[
            "Bangladesh Nationalist Party",
            "BNP",
            "Sheaf of Paddy",
            "#3C8D2F",
            "true",
        ],
    ],
    description: "Import political parties",
};

static CANDIDATE: Template = Template {
    columns: &[
        "full_name",
        "bengali_name",
        "party_name",
        "constituency_number",
        "election_year",
        "election_type",
        "age",
        "education",
        "profession",
        "candidate_number",
    ],
    sample: &[
        &[
            "John Doe",
            "জন ডো",
            "Awami League",
            "1",
            "2024",
            "National",
            "45",
            "MA, University of Dhaka",
            "Businessman",
            "1",
        ],
        &[
            "Jane Smith",
            "জেন স্মিথ",
            "Bangladesh Nationalist Party",
            "1",
            "2024",
            "National",
            "52",
            "MSc, BUET",
            "Engineer",
            "2",
        ],
    ],
    description: "Import candidates with party and constituency details",
};

static POLLING_CENTER: Template = Template {
    columns: &[
        "code",
        "name",
        "constituency_number",
        "location",
        "latitude",
        "longitude",
        "total_voters",
    ],
    sample: &[
        &[
            "PC-001",
            "Dhaka College Center",
            "1",
            "Dhaka College, Dhaka",
            "23.7272",
            "90.3944",
            "3000",
        ],
        &[
            "PC-002",
            "Bangla Academy Center",
            "1",
            "Bangla Academy, Dhaka",
            "23.7333",
            "90.3944",
            "2500",
        ],
    ],
    description: "Import polling centers with constituency numbers",
};

static POLLING_RESULT: Template = Template {
    columns: &[
        "polling_center_code",
        "candidate_name",
        "constituency_number",
        "election_year",
        "votes_received",
    ],
    sample: &[
        &["PC-001", "John Doe", "1", "2024", "1500"],
        &["PC-001", "Jane Smith", "1", "2024", "1200"],
    ],
    description: "Import polling center results",
};

static VOTER_DEMOGRAPHICS: Template = Template {
    columns: &[
        "constituency_number",
        "election_year",
        "total_voters",
        "male_voters",
        "female_voters",
        "other_voters",
        "age_18_25",
        "age_26_35",
        "age_36_45",
        "age_46_55",
        "age_56_65",
        "age_66_plus",
    ],
    sample: &[&[
        "1", "2024", "350000", "180000", "170000", "0", "50000", "80000", "70000", "60000",
        "50000", "40000",
    ]],
    description: "Import voter demographics",
};

static CONSTITUENCY_RESULT: Template = Template {
    columns: &[
        "constituency_number",
        "election_year",
        "election_type",
        "total_votes",
        "valid_votes",
        "rejected_votes",
        "turnout_percentage",
        "winning_candidate_name",
        "winning_party_name",
        "margin_votes",
        "margin_percentage",
        "is_official",
    ],
    sample: &[&[
        "1",
        "2024",
        "National",
        "250000",
        "246000",
        "4000",
        "71.4",
        "John Doe",
        "Awami League",
        "12000",
        "4.9",
        "true",
    ]],
    description: "Import constituency results; valid and rejected votes must add up to the total",
};

pub fn template(kind: EntityKind) -> &'static Template {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RowError;
    use crate::schema::{schema, validate};

    #[test]
    fn samples_are_valid() {
        for kind in EntityKind::ALL {
            let t = template(kind);
            for col in schema(kind).required {
                assert!(t.columns.contains(col), "{}: missing {}", kind, col);
            }
            assert_eq!(validate(&t.to_table(), kind), Vec::<RowError>::new(), "{}", kind);
        }
    }

    #[test]
    fn sample_rows_match_columns() {
        for kind in EntityKind::ALL {
            let t = template(kind);
            assert!(t.sample.iter().all(|r| r.len() == t.columns.len()), "{}", kind);
        }
    }
}
