#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use strtyper::locus::{Locus, ReadObservation, Strand, UnitClass};

fn snapshot_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("snapshots")
}

pub fn assert_snapshot(name: &str, actual: &str) {
    let path = snapshot_root().join(name);
    if std::env::var("STRTYPER_UPDATE_SNAPSHOTS").is_ok() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create snapshot directory");
        }
        fs::write(&path, actual).expect("write snapshot");
        return;
    }

    let expected =
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("snapshot {:?} not found", path));
    if normalize(&expected) != normalize(actual) {
        panic!(
            "Snapshot mismatch for {:?}. Set STRTYPER_UPDATE_SNAPSHOTS=1 to regenerate.\nExpected:\n{}\nActual:\n{}",
            path,
            expected,
            actual
        );
    }
}

fn normalize(input: &str) -> String {
    input.replace("\r\n", "\n")
}

/// Reads given as `(length_delta, forward, mapq, copies)`.
pub fn reads(groups: &[(i32, bool, u8, usize)]) -> Vec<ReadObservation> {
    groups.iter()
        .flat_map(|&(delta, forward, mapq, copies)| {
            let strand = if forward { Strand::Forward } else { Strand::Reverse };
            std::iter::repeat(ReadObservation::new(delta, strand, mapq)).take(copies)
        })
        .collect()
}

pub fn locus(chrom: &str, start: u32, end: u32, unit: UnitClass, reads: Vec<ReadObservation>) -> Locus {
    Locus::new(Arc::<str>::from(chrom), start, end, unit, "intergenic", reads)
}
