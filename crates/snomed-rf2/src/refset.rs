//! RF2 Reference Set parser implementations.
//!
//! This module provides parsers for simple, language, and association reference sets,
//! plus a schema-agnostic fallback for refsets none of those match.

use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use snomed_types::{
    Rf2AssociationRefsetMember, Rf2GenericRefsetItem, Rf2LanguageRefsetMember,
    Rf2SimpleRefsetMember,
};

use crate::parser::{parse, Rf2Record};
use crate::types::{Rf2Config, Rf2Error, Rf2Result};

/// Expected columns for simple reference set files.
const SIMPLE_REFSET_COLUMNS: &[&str] = &[
    "id",
    "effectiveTime",
    "active",
    "moduleId",
    "refsetId",
    "referencedComponentId",
];

/// Expected columns for language reference set files.
const LANGUAGE_REFSET_COLUMNS: &[&str] = &[
    "id",
    "effectiveTime",
    "active",
    "moduleId",
    "refsetId",
    "referencedComponentId",
    "acceptabilityId",
];

/// Expected columns for association reference set files.
const ASSOCIATION_REFSET_COLUMNS: &[&str] = &[
    "id",
    "effectiveTime",
    "active",
    "moduleId",
    "refsetId",
    "referencedComponentId",
    "targetComponentId",
];

impl Rf2Record for Rf2SimpleRefsetMember {
    const EXPECTED_COLUMNS: &'static [&'static str] = SIMPLE_REFSET_COLUMNS;

    fn from_record(record: &StringRecord) -> Rf2Result<Self> {
        Ok(Self {
            id: parse::sctid(record.get(0).unwrap_or(""))?,
            effective_time: parse::effective_time(record.get(1).unwrap_or(""))?,
            active: parse::boolean(record.get(2).unwrap_or(""))?,
            module_id: parse::sctid(record.get(3).unwrap_or(""))?,
            refset_id: parse::sctid(record.get(4).unwrap_or(""))?,
            referenced_component_id: parse::sctid(record.get(5).unwrap_or(""))?,
        })
    }

    fn passes_filter(&self, config: &Rf2Config) -> bool {
        if config.active_only && !self.active {
            return false;
        }
        true
    }
}

impl Rf2Record for Rf2LanguageRefsetMember {
    const EXPECTED_COLUMNS: &'static [&'static str] = LANGUAGE_REFSET_COLUMNS;

    fn from_record(record: &StringRecord) -> Rf2Result<Self> {
        Ok(Self {
            id: parse::sctid(record.get(0).unwrap_or(""))?,
            effective_time: parse::effective_time(record.get(1).unwrap_or(""))?,
            active: parse::boolean(record.get(2).unwrap_or(""))?,
            module_id: parse::sctid(record.get(3).unwrap_or(""))?,
            refset_id: parse::sctid(record.get(4).unwrap_or(""))?,
            referenced_component_id: parse::sctid(record.get(5).unwrap_or(""))?,
            acceptability_id: parse::sctid(record.get(6).unwrap_or(""))?,
        })
    }

    fn passes_filter(&self, config: &Rf2Config) -> bool {
        if config.active_only && !self.active {
            return false;
        }
        true
    }
}

impl Rf2Record for Rf2AssociationRefsetMember {
    const EXPECTED_COLUMNS: &'static [&'static str] = ASSOCIATION_REFSET_COLUMNS;

    fn from_record(record: &StringRecord) -> Rf2Result<Self> {
        Ok(Self {
            id: parse::sctid(record.get(0).unwrap_or(""))?,
            effective_time: parse::effective_time(record.get(1).unwrap_or(""))?,
            active: parse::boolean(record.get(2).unwrap_or(""))?,
            module_id: parse::sctid(record.get(3).unwrap_or(""))?,
            refset_id: parse::sctid(record.get(4).unwrap_or(""))?,
            referenced_component_id: parse::sctid(record.get(5).unwrap_or(""))?,
            target_component_id: parse::sctid(record.get(6).unwrap_or(""))?,
        })
    }

    fn passes_filter(&self, config: &Rf2Config) -> bool {
        if config.active_only && !self.active {
            return false;
        }
        true
    }
}

/// Parses a refset file whose schema matched none of the named variants.
///
/// Unlike [`Rf2Record`] impls, the column set here isn't known ahead of
/// time, so this reads the header itself rather than validating against a
/// fixed `EXPECTED_COLUMNS`. Returns the header's extension column names
/// (everything past the base six) alongside the parsed items, so a caller
/// can record the true schema rather than the positional placeholder the
/// index builder falls back to when it only has the persisted rows to go
/// on.
pub fn parse_generic_refset_file<P: AsRef<Path>>(
    path: P,
    config: &Rf2Config,
) -> Rf2Result<(Vec<String>, Vec<Rf2GenericRefsetItem>)> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|_| Rf2Error::FileNotFound {
        path: path.display().to_string(),
    })?;

    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::None)
        .from_reader(file);

    let header = reader.headers()?.clone();
    if header.len() < 6 {
        return Err(Rf2Error::InvalidHeader {
            expected: 6,
            found: header.len(),
        });
    }
    let extension_names: Vec<String> = header.iter().skip(6).map(str::to_string).collect();

    let mut items = Vec::new();
    for (row_index, record) in reader.records().enumerate() {
        let record = record?;
        if record.is_empty() || record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let row_error = |source: Rf2Error| Rf2Error::MalformedRow {
            file: path.display().to_string(),
            line: row_index + 2, // +1 for the header, +1 for 1-indexing
            source: Box::new(source),
        };
        let item = Rf2GenericRefsetItem {
            id: parse::sctid(record.get(0).unwrap_or("")).map_err(row_error)?,
            effective_time: parse::effective_time(record.get(1).unwrap_or("")).map_err(row_error)?,
            active: parse::boolean(record.get(2).unwrap_or("")).map_err(row_error)?,
            module_id: parse::sctid(record.get(3).unwrap_or("")).map_err(row_error)?,
            refset_id: parse::sctid(record.get(4).unwrap_or("")).map_err(row_error)?,
            referenced_component_id: parse::sctid(record.get(5).unwrap_or("")).map_err(row_error)?,
            fields: record.iter().skip(6).map(str::to_string).collect(),
        };
        if !config.active_only || item.active {
            items.push(item);
        }
    }

    Ok((extension_names, items))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_refset_member() {
        let record = StringRecord::from(vec![
            "12345678901",           // id
            "20200101",              // effectiveTime
            "1",                     // active
            "900000000000207008",    // moduleId
            "723264001",             // refsetId
            "12345678",              // referencedComponentId
        ]);

        let member = Rf2SimpleRefsetMember::from_record(&record).unwrap();
        assert_eq!(member.id, 12345678901);
        assert!(member.active);
        assert_eq!(member.refset_id, 723264001);
        assert_eq!(member.referenced_component_id, 12345678);
    }

    #[test]
    fn test_parse_language_refset_member() {
        let record = StringRecord::from(vec![
            "12345678901",           // id
            "20200101",              // effectiveTime
            "1",                     // active
            "900000000000207008",    // moduleId
            "900000000000509007",    // refsetId (US English)
            "12345678",              // referencedComponentId
            "900000000000548007",    // acceptabilityId (Preferred)
        ]);

        let member = Rf2LanguageRefsetMember::from_record(&record).unwrap();
        assert_eq!(member.id, 12345678901);
        assert!(member.active);
        assert!(member.is_preferred());
        assert!(!member.is_acceptable());
    }

    #[test]
    fn test_simple_refset_filter_active_only() {
        let active_member = Rf2SimpleRefsetMember {
            id: 1,
            effective_time: 20200101,
            active: true,
            module_id: 900000000000207008,
            refset_id: 723264001,
            referenced_component_id: 12345,
        };

        let inactive_member = Rf2SimpleRefsetMember {
            id: 2,
            effective_time: 20200101,
            active: false,
            module_id: 900000000000207008,
            refset_id: 723264001,
            referenced_component_id: 12346,
        };

        let active_config = Rf2Config {
            active_only: true,
            batch_size: 1000,
        };

        let all_config = Rf2Config {
            active_only: false,
            batch_size: 1000,
        };

        assert!(active_member.passes_filter(&active_config));
        assert!(!inactive_member.passes_filter(&active_config));
        assert!(active_member.passes_filter(&all_config));
        assert!(inactive_member.passes_filter(&all_config));
    }

    #[test]
    fn test_parse_association_refset_member() {
        let record = StringRecord::from(vec![
            "12345678901",           // id
            "20200101",              // effectiveTime
            "1",                     // active
            "900000000000207008",    // moduleId
            "900000000000527005",    // refsetId (SAME AS)
            "12345678",              // referencedComponentId
            "87654321",              // targetComponentId
        ]);

        let member = Rf2AssociationRefsetMember::from_record(&record).unwrap();
        assert_eq!(member.id, 12345678901);
        assert!(member.active);
        assert_eq!(member.refset_id, Rf2AssociationRefsetMember::SAME_AS_REFSET);
        assert_eq!(member.referenced_component_id, 12345678);
        assert_eq!(member.target_component_id, 87654321);
        assert!(member.is_same_as_association());
        assert!(member.is_historical_association());
    }

    #[test]
    fn test_parse_replaced_by_association() {
        let record = StringRecord::from(vec![
            "12345678901",
            "20200101",
            "1",
            "900000000000207008",
            "900000000000526001",    // REPLACED BY
            "12345678",
            "87654321",
        ]);

        let member = Rf2AssociationRefsetMember::from_record(&record).unwrap();
        assert!(member.is_replaced_by_association());
        assert!(member.is_historical_association());
        assert!(!member.is_same_as_association());
    }

    #[test]
    fn test_parse_generic_refset_file_captures_header_and_trailing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("der2_iisssccRefset_ExtendedMapSnapshot_INT_20251201.txt");
        std::fs::write(
            &path,
            "id\teffectiveTime\tactive\tmoduleId\trefsetId\treferencedComponentId\tmapGroup\tmapPriority\tmapRule\tmapAdvice\tmapTarget\tcorrelationId\tmapCategoryId\n\
             1\t20200101\t1\t900000000000207008\t447562003\t404684003\t1\t1\t\t\tR51\t447561009\t447637006\n",
        )
        .unwrap();

        let (names, items) =
            parse_generic_refset_file(&path, &Rf2Config::default()).unwrap();

        assert_eq!(
            names,
            vec![
                "mapGroup", "mapPriority", "mapRule", "mapAdvice", "mapTarget", "correlationId",
                "mapCategoryId",
            ]
        );
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].refset_id, 447562003);
        assert_eq!(items[0].fields[4], "R51");
    }

    #[test]
    fn test_parse_generic_refset_file_filters_inactive_when_active_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.txt");
        std::fs::write(
            &path,
            "id\teffectiveTime\tactive\tmoduleId\trefsetId\treferencedComponentId\tmapTarget\n\
             1\t20200101\t0\t900000000000207008\t447562003\t404684003\tR51\n",
        )
        .unwrap();

        let config = Rf2Config {
            active_only: true,
            ..Default::default()
        };
        let (_, items) = parse_generic_refset_file(&path, &config).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_parse_generic_refset_file_reports_malformed_row_location() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.txt");
        std::fs::write(
            &path,
            "id\teffectiveTime\tactive\tmoduleId\trefsetId\treferencedComponentId\tmapTarget\n\
             1\t20200101\t1\t900000000000207008\t447562003\t404684003\tR51\n\
             not_an_id\t20200101\t1\t900000000000207008\t447562003\t404684003\tR52\n",
        )
        .unwrap();

        let err = parse_generic_refset_file(&path, &Rf2Config::default()).unwrap_err();
        match err {
            Rf2Error::MalformedRow { file, line, .. } => {
                assert!(file.ends_with("map.txt"));
                assert_eq!(line, 3);
            }
            other => panic!("expected MalformedRow, got {other:?}"),
        }
    }
}
