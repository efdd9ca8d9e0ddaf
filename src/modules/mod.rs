// iocsweep - modules/mod.rs
//
// Built-in extraction modules.
// Dependencies: core, platform, util.

pub mod file_listing;
pub mod shutdown_log;

pub use file_listing::FileListing;
pub use shutdown_log::ShutdownLog;

use crate::core::indicators::IndicatorMatch;
use crate::core::model::{to_record, Record};

/// Copy of `record` annotated with the indicator that matched it.
///
/// Non-object records are wrapped as `{"record": ..., "matched_indicator": ...}`.
pub(crate) fn flag_record(record: &Record, hit: &IndicatorMatch) -> Record {
    let mut flagged = match record {
        Record::Object(map) => map.clone(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("record".to_string(), other.clone());
            map
        }
    };
    flagged.insert("matched_indicator".to_string(), to_record(hit));
    Record::Object(flagged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::indicators::IndicatorKind;
    use serde_json::json;

    fn hit() -> IndicatorMatch {
        IndicatorMatch {
            kind: IndicatorKind::Process,
            indicator: "bh".to_string(),
            collection: "campaign".to_string(),
        }
    }

    #[test]
    fn test_flag_object_record() {
        let flagged = flag_record(&json!({"client": "/bin/bh"}), &hit());
        assert_eq!(flagged["client"], "/bin/bh");
        assert_eq!(flagged["matched_indicator"]["kind"], "process");
        assert_eq!(flagged["matched_indicator"]["collection"], "campaign");
    }

    #[test]
    fn test_flag_scalar_record_is_wrapped() {
        let flagged = flag_record(&json!("bh"), &hit());
        assert_eq!(flagged["record"], "bh");
        assert_eq!(flagged["matched_indicator"]["indicator"], "bh");
    }
}
