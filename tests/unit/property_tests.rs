//! Property tests over the extractor, classifiers and assembler

use proptest::prelude::*;

use sql_index_advisor::analysis::{classify, MaintenanceAction};
use sql_index_advisor::assemble::assemble;
use sql_index_advisor::parser::extract_tables;
use sql_index_advisor::Thresholds;

use crate::common::physical;

fn identifier() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_]{0,10}"
}

fn rank(action: Option<MaintenanceAction>) -> u8 {
    match action {
        None => 0,
        Some(MaintenanceAction::Reorganize) => 1,
        Some(MaintenanceAction::Rebuild) => 2,
    }
}

proptest! {
    #[test]
    fn prop_comments_never_add_tables(table in identifier(), hidden in identifier(), comment in "[a-z ]{0,20}") {
        let plain = format!("SELECT * FROM dbo.{}", table);
        let commented = format!(
            "/* {} FROM dbo.{} */ SELECT * -- JOIN dbo.{}\nFROM dbo.{} -- {}",
            comment, hidden, hidden, table, comment
        );
        prop_assert_eq!(extract_tables(&plain, Some("Db")), extract_tables(&commented, Some("Db")));
    }

    #[test]
    fn prop_extraction_is_deterministic(tables in prop::collection::vec(identifier(), 1..6)) {
        let sql = tables
            .iter()
            .map(|t| format!("SELECT * FROM [dbo].[{}];", t))
            .collect::<Vec<_>>()
            .join("\n");
        let first = extract_tables(&sql, Some("Db"));
        prop_assert_eq!(&first, &extract_tables(&sql, Some("Db")));
        prop_assert!(first.len() <= tables.len());
    }

    #[test]
    fn prop_temp_tables_never_returned(name in identifier(), global in any::<bool>()) {
        let prefix = if global { "##" } else { "#" };
        let sql = format!("SELECT * INTO {p}{n} FROM {p}{n} JOIN {p}{n} x ON 1 = 1", p = prefix, n = name);
        prop_assert!(extract_tables(&sql, Some("Db")).is_empty());
    }

    #[test]
    fn prop_more_fragmentation_never_less_maintenance(a in 0.0f64..100.0, b in 0.0f64..100.0) {
        let t = Thresholds::default();
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let low_action = classify(&physical("Db", "T", "IX", low, 500), &t).map(|r| r.action);
        let high_action = classify(&physical("Db", "T", "IX", high, 500), &t).map(|r| r.action);
        prop_assert!(rank(low_action) <= rank(high_action));
    }

    #[test]
    fn prop_assembly_is_deterministic(index in identifier(), table in identifier()) {
        let maintenance = format!("ALTER INDEX [{}] ON [Db].[dbo].[{}] REBUILD;", index, table);
        prop_assert_eq!(
            assemble(&maintenance, "", "", None),
            assemble(&maintenance, "", "", None)
        );
    }
}
