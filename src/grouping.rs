use std::collections::HashMap;

use crate::models::{DestinationGroup, MajorFilter, StudentRecord};

/// Groups decided records by exact destination string, largest group first.
///
/// Records outside `filter`, or whose destination is empty or undecided, are
/// left out. Members keep their input order and equal-sized groups keep the
/// order their destination was first seen.
pub fn derive_groups(records: &[StudentRecord], filter: &MajorFilter) -> Vec<DestinationGroup> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<DestinationGroup> = Vec::new();

    for record in records
        .iter()
        .filter(|record| filter.matches(record) && record.has_decided_destination())
    {
        let slot = *index.entry(record.destination.as_str()).or_insert_with(|| {
            groups.push(DestinationGroup {
                destination: record.destination.clone(),
                count: 0,
                students: Vec::new(),
            });
            groups.len() - 1
        });

        let group = &mut groups[slot];
        group.students.push(record.clone());
        group.count += 1;
    }

    // sort_by is stable, so ties stay in first-seen order.
    groups.sort_by(|a, b| b.count.cmp(&a.count));
    groups
}

/// The `All` sentinel followed by each distinct major in first-seen order.
pub fn available_majors(records: &[StudentRecord]) -> Vec<MajorFilter> {
    let mut majors = vec![MajorFilter::All];
    for record in records {
        if !majors
            .iter()
            .any(|seen| matches!(seen, MajorFilter::Major(major) if *major == record.major))
        {
            majors.push(MajorFilter::Major(record.major.clone()));
        }
    }
    majors
}

/// Records in `filter` that were left out of every group as undecided.
pub fn excluded_count(records: &[StudentRecord], filter: &MajorFilter) -> usize {
    records
        .iter()
        .filter(|record| filter.matches(record) && !record.has_decided_destination())
        .count()
}

/// Admin lookup over name, destination and major. An empty term keeps all.
pub fn search_records<'a>(records: &'a [StudentRecord], term: &str) -> Vec<&'a StudentRecord> {
    records
        .iter()
        .filter(|record| {
            record.name.contains(term)
                || record.destination.contains(term)
                || record.major.contains(term)
        })
        .collect()
}

pub fn find_group<'a>(
    groups: &'a [DestinationGroup],
    destination: &str,
) -> Option<&'a DestinationGroup> {
    groups.iter().find(|group| group.destination == destination)
}
