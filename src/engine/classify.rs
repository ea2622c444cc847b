//! Outcome Classifier.
//!
//! Rows are partitioned by `(fixture, calendar day)`. Inside a partition every
//! serial number is reduced to three facts: did it pass at least once, did it
//! fail at least once, did it carry unknown flags. A failure is a *false defect*
//! when the same serial also passed inside the partition, otherwise a *true
//! defect*. Passing on another day or fixture never suppresses a defect here.
//!
//! Counting rules per `CountUnit`:
//!
//! | field          | `Serial`                         | `Attempt`                          |
//! | -------------- | -------------------------------- | ---------------------------------- |
//! | `pass`         | serials with an `O`              | `O` rows                           |
//! | `false_defect` | serials with `X` and an `O`      | `X` rows of serials with an `O`    |
//! | `true_defect`  | serials with `X` and no `O`      | `X` rows of serials without an `O` |
//! | `fail`         | `false_defect + true_defect`     | `false_defect + true_defect`       |
//! | `total_test`   | serials with an `O`/`X` row      | `O`/`X` rows                       |
//!
//! `include_unknown_in_total` additionally folds unknown-only serials (or
//! unknown rows) into `total_test`.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{ClassificationResult, ClassifyPolicy, CountUnit, OutcomeSets, PassFlag};
use crate::engine::normalize::TestRecord;

/// `(fixture, calendar day)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionKey {
    pub fixture: String,
    pub date: NaiveDate,
}

/// Counts plus serial membership for one partition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PartitionOutcome {
    pub counts: ClassificationResult,
    pub members: OutcomeSets,
}

#[derive(Debug, Default, Clone, Copy)]
struct SerialTally {
    passes: usize,
    fails: usize,
    unknowns: usize,
}

/// Bucket records by `(fixture, date)`.
///
/// Records without a valid timestamp, a fixture value or a serial number are
/// left out of every partition.
pub fn partition_records(records: &[TestRecord]) -> BTreeMap<PartitionKey, Vec<&TestRecord>> {
    let mut out: BTreeMap<PartitionKey, Vec<&TestRecord>> = BTreeMap::new();
    for r in records {
        let Some(date) = r.timestamp.date() else {
            continue;
        };
        if r.fixture.is_empty() || r.serial.is_empty() {
            continue;
        }
        out.entry(PartitionKey {
            fixture: r.fixture.clone(),
            date,
        })
        .or_default()
        .push(r);
    }
    out
}

/// Classify one group of records (normally a single partition).
pub fn classify_partition(records: &[&TestRecord], policy: &ClassifyPolicy) -> PartitionOutcome {
    let mut tallies: BTreeMap<&str, SerialTally> = BTreeMap::new();
    for r in records {
        if r.serial.is_empty() {
            continue;
        }
        let t = tallies.entry(r.serial.as_str()).or_default();
        match r.flag {
            PassFlag::Pass => t.passes += 1,
            PassFlag::Fail => t.fails += 1,
            PassFlag::Unknown => t.unknowns += 1,
        }
    }

    let mut counts = ClassificationResult::default();
    let mut members = OutcomeSets::default();

    for (serial, t) in tallies {
        let passed = t.passes > 0;
        let known = t.passes + t.fails;

        if passed {
            members.pass.insert(serial.to_string());
        } else {
            members.never_passed.insert(serial.to_string());
        }
        if t.fails > 0 {
            if passed {
                members.false_defect.insert(serial.to_string());
            } else {
                members.true_defect.insert(serial.to_string());
            }
        }

        match policy.count_unit {
            CountUnit::Serial => {
                if passed {
                    counts.pass += 1;
                }
                if t.fails > 0 {
                    if passed {
                        counts.false_defect += 1;
                    } else {
                        counts.true_defect += 1;
                    }
                }
                if known > 0 || policy.include_unknown_in_total {
                    counts.total_test += 1;
                }
            }
            CountUnit::Attempt => {
                counts.pass += t.passes;
                if passed {
                    counts.false_defect += t.fails;
                } else {
                    counts.true_defect += t.fails;
                }
                counts.total_test += known;
                if policy.include_unknown_in_total {
                    counts.total_test += t.unknowns;
                }
            }
        }
    }

    counts.fail = counts.false_defect + counts.true_defect;

    PartitionOutcome { counts, members }
}

/// Partition and classify every record.
///
/// Only partitions holding at least one record appear in the output.
pub fn classify_records(records: &[TestRecord], policy: &ClassifyPolicy) -> BTreeMap<PartitionKey, PartitionOutcome> {
    partition_records(records)
        .into_iter()
        .map(|(key, group)| {
            let outcome = classify_partition(&group, policy);
            tracing::debug!(
                fixture = %key.fixture,
                date = %key.date,
                total = outcome.counts.total_test,
                pass = outcome.counts.pass,
                false_defect = outcome.counts.false_defect,
                true_defect = outcome.counts.true_defect,
                "classified partition"
            );
            (key, outcome)
        })
        .collect()
}
