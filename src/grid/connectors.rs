use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};

use crate::model::pill::{Connector, ConnectorAlert, ConnectorId, Pill, PillId};
use crate::model::record::RecordId;
use crate::model::row::RowId;

/// Classify a master → slave edge. A slave starting before its master
/// finishes is a violation: `Error` when it even starts before the master
/// does, `Warning` otherwise. Flagged, never corrected.
pub fn classify_alert(
    master_start: NaiveDateTime,
    master_stop: NaiveDateTime,
    slave_start: NaiveDateTime,
) -> ConnectorAlert {
    if slave_start < master_stop {
        if slave_start < master_start {
            ConnectorAlert::Error
        } else {
            ConnectorAlert::Warning
        }
    } else {
        ConnectorAlert::None
    }
}

/// Derive the dependency edges between pills.
///
/// A record may surface as a pill in several rows. Same-row edges are always
/// drawn; a cross-row edge is drawn only when neither record is visible in
/// the counterpart's row, where the closer same-row edge would already
/// convey the dependency.
pub fn build_connectors(
    pills: &[Pill],
    dependencies: &HashMap<RecordId, Vec<RecordId>>,
    times: &dyn Fn(RecordId) -> Option<(NaiveDateTime, NaiveDateTime)>,
) -> Vec<Connector> {
    let mut by_record: HashMap<RecordId, Vec<&Pill>> = HashMap::new();
    let mut rows_of: HashMap<RecordId, HashSet<&RowId>> = HashMap::new();
    for pill in pills {
        if let Some(record_id) = pill.record_id {
            by_record.entry(record_id).or_default().push(pill);
            rows_of.entry(record_id).or_default().insert(&pill.row_id);
        }
    }

    let mut seen: HashSet<(PillId, PillId)> = HashSet::new();
    let mut connectors = Vec::new();
    let mut next_id = 0u32;
    for slave_pill in pills {
        let Some(slave_id) = slave_pill.record_id else {
            continue;
        };
        let Some(masters) = dependencies.get(&slave_id) else {
            continue;
        };
        for &master_id in masters {
            let Some(master_pills) = by_record.get(&master_id) else {
                continue;
            };
            for master_pill in master_pills {
                let same_row = master_pill.row_id == slave_pill.row_id;
                if !same_row {
                    let master_in_slave_row = rows_of
                        .get(&master_id)
                        .is_some_and(|rows| rows.contains(&slave_pill.row_id));
                    let slave_in_master_row = rows_of
                        .get(&slave_id)
                        .is_some_and(|rows| rows.contains(&master_pill.row_id));
                    if master_in_slave_row || slave_in_master_row {
                        continue;
                    }
                }
                if !seen.insert((master_pill.id, slave_pill.id)) {
                    continue;
                }
                let alert = match (times(master_id), times(slave_id)) {
                    (Some((m_start, m_stop)), Some((s_start, _))) => {
                        classify_alert(m_start, m_stop, s_start)
                    }
                    _ => ConnectorAlert::None,
                };
                connectors.push(Connector {
                    id: ConnectorId(next_id),
                    source: master_pill.id,
                    target: slave_pill.id,
                    alert,
                });
                next_id += 1;
            }
        }
    }
    connectors
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use uuid::Uuid;

    fn dt(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn row(name: &str) -> RowId {
        RowId::from_path(&[("team".to_string(), json!(name))])
    }

    fn pill(id: u32, record: RecordId, row_id: &RowId) -> Pill {
        Pill {
            id: PillId(id),
            record_id: Some(record),
            row_id: row_id.clone(),
            row_index: 0,
            first_col: 1,
            last_col: 2,
            level: 0,
            start: dt(1),
            stop: dt(2),
            disable_start_resize: false,
            disable_stop_resize: false,
            aggregate: None,
        }
    }

    #[test]
    fn test_alert_classification() {
        // Master runs Day1 → Day3.
        assert_eq!(classify_alert(dt(1), dt(3), dt(2)), ConnectorAlert::Warning);
        assert_eq!(
            classify_alert(dt(2), dt(3), dt(1)),
            ConnectorAlert::Error
        );
        assert_eq!(classify_alert(dt(1), dt(3), dt(3)), ConnectorAlert::None);
        assert_eq!(classify_alert(dt(1), dt(3), dt(4)), ConnectorAlert::None);
    }

    #[test]
    fn test_same_row_edge_always_drawn() {
        let (master, slave) = (Uuid::new_v4(), Uuid::new_v4());
        let r = row("Alpha");
        let pills = vec![pill(0, master, &r), pill(1, slave, &r)];
        let deps: HashMap<RecordId, Vec<RecordId>> =
            [(slave, vec![master])].into_iter().collect();
        let connectors = build_connectors(&pills, &deps, &|_| Some((dt(1), dt(2))));
        assert_eq!(connectors.len(), 1);
        assert_eq!(connectors[0].source, PillId(0));
        assert_eq!(connectors[0].target, PillId(1));
    }

    #[test]
    fn test_cross_row_edge_suppressed_when_inferable() {
        // Both records appear in both rows: only the two same-row edges
        // survive, the cross edges are redundant.
        let (master, slave) = (Uuid::new_v4(), Uuid::new_v4());
        let (ra, rb) = (row("Alpha"), row("Beta"));
        let pills = vec![
            pill(0, master, &ra),
            pill(1, slave, &ra),
            pill(2, master, &rb),
            pill(3, slave, &rb),
        ];
        let deps: HashMap<RecordId, Vec<RecordId>> =
            [(slave, vec![master])].into_iter().collect();
        let connectors = build_connectors(&pills, &deps, &|_| Some((dt(1), dt(2))));
        let edges: Vec<(PillId, PillId)> =
            connectors.iter().map(|c| (c.source, c.target)).collect();
        assert_eq!(edges, vec![(PillId(0), PillId(1)), (PillId(2), PillId(3))]);
    }

    #[test]
    fn test_cross_row_edge_drawn_when_rows_disjoint() {
        let (master, slave) = (Uuid::new_v4(), Uuid::new_v4());
        let (ra, rb) = (row("Alpha"), row("Beta"));
        let pills = vec![pill(0, master, &ra), pill(1, slave, &rb)];
        let deps: HashMap<RecordId, Vec<RecordId>> =
            [(slave, vec![master])].into_iter().collect();
        let connectors = build_connectors(&pills, &deps, &|_| Some((dt(1), dt(2))));
        assert_eq!(connectors.len(), 1);
        assert_eq!(connectors[0].source, PillId(0));
        assert_eq!(connectors[0].target, PillId(1));
    }

    #[test]
    fn test_missing_master_pill_emits_nothing() {
        let (master, slave) = (Uuid::new_v4(), Uuid::new_v4());
        let pills = vec![pill(0, slave, &row("Alpha"))];
        let deps: HashMap<RecordId, Vec<RecordId>> =
            [(slave, vec![master])].into_iter().collect();
        assert!(build_connectors(&pills, &deps, &|_| Some((dt(1), dt(2)))).is_empty());
    }
}
