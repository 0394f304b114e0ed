// file: src/parser/grouper.rs
// description: groups parsed files by process and picks the principal document

use crate::models::{FileDescriptor, ProcessGroup};
use std::collections::HashMap;

/// Keyword classes tried in priority order when picking the principal
/// document of a partition. The order is load-bearing: once a petition is
/// protocoled the choice is irreversible.
const PRINCIPAL_KEYWORDS: [&str; 3] = ["pet", "req", "memo"];

/// Groups valid descriptors by canonical CNJ and, inside each process, by
/// the embedded `(principal_code, petition_code)` pair. Every coded
/// partition elects one principal; the remaining files of the partition
/// and all files without a full code pair become attachments. A process
/// with no coded partition at all is emitted with no principal.
///
/// Invalid descriptors never reach a group. Iteration order is first-seen,
/// so the result is deterministic for a given input sequence.
pub fn group(descriptors: &[FileDescriptor]) -> Vec<ProcessGroup> {
    let mut bucket_order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, Vec<&FileDescriptor>> = HashMap::new();

    for descriptor in descriptors {
        if !descriptor.is_valid || descriptor.cnj.is_empty() {
            continue;
        }
        let bucket = buckets.entry(descriptor.cnj.clone()).or_insert_with(|| {
            bucket_order.push(descriptor.cnj.clone());
            Vec::new()
        });
        bucket.push(descriptor);
    }

    let mut groups = Vec::new();

    for cnj in bucket_order {
        let files = &buckets[&cnj];
        let court_code = files[0].court_code.clone().unwrap_or_default();

        let mut partition_order: Vec<(u32, u32)> = Vec::new();
        let mut partitions: HashMap<(u32, u32), Vec<&FileDescriptor>> = HashMap::new();
        let mut no_pattern: Vec<&FileDescriptor> = Vec::new();

        for file in files {
            match (file.principal_code, file.petition_code) {
                (Some(principal), Some(petition)) => {
                    let key = (principal, petition);
                    let partition = partitions.entry(key).or_insert_with(|| {
                        partition_order.push(key);
                        Vec::new()
                    });
                    partition.push(file);
                }
                _ => no_pattern.push(file),
            }
        }

        for key in &partition_order {
            let partition = &partitions[key];
            let principal_index =
                select_principal_index(partition).expect("coded partition is never empty");

            let mut attachments: Vec<FileDescriptor> = partition
                .iter()
                .enumerate()
                .filter(|(index, _)| *index != principal_index)
                .map(|(_, file)| (*file).clone())
                .collect();
            attachments.extend(no_pattern.iter().map(|file| (*file).clone()));

            groups.push(ProcessGroup {
                cnj: cnj.clone(),
                court_code: court_code.clone(),
                principal: Some(partition[principal_index].clone()),
                attachments,
                principal_code: Some(key.0),
                petition_code: Some(key.1),
            });
        }

        if partition_order.is_empty() && !no_pattern.is_empty() {
            groups.push(ProcessGroup {
                cnj: cnj.clone(),
                court_code,
                principal: None,
                attachments: no_pattern.iter().map(|file| (*file).clone()).collect(),
                principal_code: None,
                petition_code: None,
            });
        }
    }

    groups
}

/// Picks the principal document of a partition: a lone file wins outright;
/// otherwise the keyword classes are tried in priority order and the
/// shortest original name within the first matching class is taken (ties
/// resolved by first occurrence); with no keyword match anywhere the
/// overall shortest name wins.
pub fn select_principal<'a>(files: &[&'a FileDescriptor]) -> Option<&'a FileDescriptor> {
    select_principal_index(files).map(|index| files[index])
}

fn select_principal_index(files: &[&FileDescriptor]) -> Option<usize> {
    if files.is_empty() {
        return None;
    }
    if files.len() == 1 {
        return Some(0);
    }

    for keyword in PRINCIPAL_KEYWORDS {
        let matches: Vec<usize> = files
            .iter()
            .enumerate()
            .filter(|(_, file)| file.original_name.to_lowercase().contains(keyword))
            .map(|(index, _)| index)
            .collect();

        if !matches.is_empty() {
            return matches
                .into_iter()
                .min_by_key(|index| files[*index].original_name.len());
        }
    }

    (0..files.len()).min_by_key(|index| files[*index].original_name.len())
}
