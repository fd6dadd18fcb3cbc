//! Property extraction: the single translation point from Notion property
//! payloads to plain scalars

use crate::record::{FormulaValue, PropertyValue, Record, RollupValue, Scalar};
use crate::ContributionEntry;

/// Extract a normalized scalar from a record's named property
pub fn extract(record: &Record, property_name: &str) -> Option<Scalar> {
    let property = record.properties.get(property_name)?;

    match property {
        PropertyValue::Title { title: runs } | PropertyValue::RichText { rich_text: runs } => {
            Some(Scalar::String(
                runs.first()
                    .map(|run| run.plain_text.clone())
                    .unwrap_or_default(),
            ))
        }
        PropertyValue::Number { number } => number.map(Scalar::Number),
        PropertyValue::Select { select: option } | PropertyValue::Status { status: option } => {
            option.as_ref().map(|o| Scalar::String(o.name.clone()))
        }
        PropertyValue::MultiSelect { multi_select } => Some(Scalar::String(
            multi_select
                .iter()
                .map(|o| o.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        )),
        PropertyValue::Date { date } => date.as_ref().map(|d| Scalar::String(d.start.clone())),
        PropertyValue::Checkbox { checkbox } => Some(Scalar::Bool(*checkbox)),
        PropertyValue::Formula { formula } => match formula {
            FormulaValue::Number { number } => number.map(Scalar::Number),
            FormulaValue::String { string } => string.clone().map(Scalar::String),
            FormulaValue::Boolean { boolean } => boolean.map(Scalar::Bool),
            FormulaValue::Other => None,
        },
        PropertyValue::Rollup { rollup } => match rollup {
            RollupValue::Number { number } => number.map(Scalar::Number),
            RollupValue::Other => None,
        },
        PropertyValue::Unsupported => None,
    }
}

/// Pull contribution entries out of records.
///
/// Records without a non-empty string date are skipped. Timestamps are cut
/// down to their `YYYY-MM-DD` part.
pub fn extract_contributions(
    records: &[Record],
    date_property: &str,
    subject_property: &str,
    description_property: &str,
) -> Vec<ContributionEntry> {
    records
        .iter()
        .filter_map(|record| {
            let date = match extract(record, date_property)? {
                Scalar::String(s) if !s.is_empty() => s,
                _ => return None,
            };
            let date = date.split('T').next().unwrap_or_default().to_string();

            Some(ContributionEntry {
                date,
                subject: extract(record, subject_property)
                    .map(|s| s.to_key())
                    .unwrap_or_default(),
                description: extract(record, description_property)
                    .map(|s| s.to_key())
                    .unwrap_or_default(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DateValue, RichText};

    fn record() -> Record {
        Record::new("r1")
            .with_property("Name", PropertyValue::title("Write docs"))
            .with_property("Notes", PropertyValue::RichText { rich_text: vec![] })
            .with_property("Points", PropertyValue::number(3.0))
            .with_property("Empty", PropertyValue::Number { number: None })
            .with_property("Stage", PropertyValue::status("Done"))
            .with_property("Priority", PropertyValue::Select { select: None })
            .with_property("Tags", PropertyValue::multi_select(&["rust", "docs"]))
            .with_property("Due", PropertyValue::date("2024-07-04T09:30:00.000Z"))
            .with_property("Done", PropertyValue::checkbox(true))
    }

    #[test]
    fn test_text_properties() {
        let r = record();
        assert_eq!(extract(&r, "Name"), Some(Scalar::String("Write docs".into())));
        assert_eq!(extract(&r, "Notes"), Some(Scalar::String(String::new())));
    }

    #[test]
    fn test_title_uses_first_run_only() {
        let r = Record::new("r").with_property(
            "Name",
            PropertyValue::Title {
                title: vec![
                    RichText { plain_text: "first".into() },
                    RichText { plain_text: "second".into() },
                ],
            },
        );
        assert_eq!(extract(&r, "Name"), Some(Scalar::String("first".into())));
    }

    #[test]
    fn test_scalar_properties() {
        let r = record();
        assert_eq!(extract(&r, "Points"), Some(Scalar::Number(3.0)));
        assert_eq!(extract(&r, "Empty"), None);
        assert_eq!(extract(&r, "Stage"), Some(Scalar::String("Done".into())));
        assert_eq!(extract(&r, "Priority"), None);
        assert_eq!(extract(&r, "Tags"), Some(Scalar::String("rust, docs".into())));
        assert_eq!(extract(&r, "Done"), Some(Scalar::Bool(true)));
        assert_eq!(
            extract(&r, "Due"),
            Some(Scalar::String("2024-07-04T09:30:00.000Z".into()))
        );
    }

    #[test]
    fn test_missing_and_unsupported() {
        let r = record().with_property("People", PropertyValue::Unsupported);
        assert_eq!(extract(&r, "Nope"), None);
        assert_eq!(extract(&r, "People"), None);
    }

    #[test]
    fn test_formula_and_rollup() {
        let r = Record::new("r")
            .with_property(
                "Score",
                PropertyValue::Formula {
                    formula: FormulaValue::Number { number: Some(7.5) },
                },
            )
            .with_property(
                "Label",
                PropertyValue::Formula {
                    formula: FormulaValue::String {
                        string: Some("hi".into()),
                    },
                },
            )
            .with_property(
                "When",
                PropertyValue::Formula {
                    formula: FormulaValue::Other,
                },
            )
            .with_property(
                "Total",
                PropertyValue::Rollup {
                    rollup: RollupValue::Number { number: Some(42.0) },
                },
            )
            .with_property(
                "Items",
                PropertyValue::Rollup {
                    rollup: RollupValue::Other,
                },
            );

        assert_eq!(extract(&r, "Score"), Some(Scalar::Number(7.5)));
        assert_eq!(extract(&r, "Label"), Some(Scalar::String("hi".into())));
        assert_eq!(extract(&r, "When"), None);
        assert_eq!(extract(&r, "Total"), Some(Scalar::Number(42.0)));
        assert_eq!(extract(&r, "Items"), None);
    }

    #[test]
    fn test_extract_contributions() {
        let records = vec![
            record(),
            Record::new("no-date").with_property("Name", PropertyValue::title("skip me")),
            Record::new("null-date")
                .with_property("Due", PropertyValue::Date { date: None }),
            Record::new("bare")
                .with_property(
                    "Due",
                    PropertyValue::Date {
                        date: Some(DateValue {
                            start: "2024-07-05".into(),
                            end: None,
                        }),
                    },
                )
                .with_property("Points", PropertyValue::number(2.0)),
        ];

        let entries = extract_contributions(&records, "Due", "Name", "Points");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].date, "2024-07-04");
        assert_eq!(entries[0].subject, "Write docs");
        assert_eq!(entries[0].description, "3");
        assert_eq!(entries[1].date, "2024-07-05");
        assert_eq!(entries[1].subject, "");
        assert_eq!(entries[1].description, "2");
    }
}
