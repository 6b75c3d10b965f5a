//! Ranking properties over generated report tables.

use prism_epoch::{Direction, RankedSet, ReportRow, TableSource, TopNMerger};

/// Small deterministic generator so failures reproduce.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

fn tables(seed: u64, n_tables: usize, rows: usize) -> Vec<TableSource> {
    let mut rng = Lcg(seed);
    (0..n_tables)
        .map(|t| {
            let mut text = String::from("Step    numberOfAcceptedPeleSteps    Binding Energy\n");
            for step in 0..rows {
                // Coarse values force plenty of exact ties.
                let value = (rng.next() % 40) as f64 * 0.25 - 5.0;
                text.push_str(&format!("{step}    {step}    {value}\n"));
            }
            TableSource::from_text(format!("{}/report_{}", t % 3, t), text)
        })
        .collect()
}

fn merger(n: usize, direction: Direction) -> TopNMerger {
    TopNMerger::new(n, "Binding Energy", "numberOfAcceptedPeleSteps", direction).unwrap()
}

fn all_rows(sources: &[TableSource]) -> Vec<ReportRow> {
    sources
        .iter()
        .flat_map(|s| {
            s.rows("Binding Energy", "numberOfAcceptedPeleSteps")
                .unwrap()
                .map(Result::unwrap)
                .collect::<Vec<_>>()
        })
        .collect()
}

#[test]
fn test_size_bound_and_order() {
    for direction in [Direction::Min, Direction::Max] {
        for n in [1, 5, 37, 500] {
            let sources = tables(7, 6, 50);
            let ranked = merger(n, direction).rank(&sources).unwrap();
            assert_eq!(ranked.len(), n.min(300));
            assert!(ranked.is_ordered());
        }
    }
}

#[test]
fn test_no_omitted_row_beats_a_kept_row() {
    let sources = tables(11, 5, 40);
    let ranked = merger(10, Direction::Min).rank(&sources).unwrap();
    let worst = ranked.worst().unwrap().value;

    let better_than_worst = all_rows(&sources).iter().filter(|r| r.value < worst).count();
    assert!(better_than_worst < 10);
    for row in ranked.rows() {
        assert!(row.value <= worst);
    }
}

#[test]
fn test_independent_of_source_order() {
    let sources = tables(3, 8, 30);
    let forward = merger(12, Direction::Max).rank(&sources).unwrap().into_rows();

    let mut reversed = tables(3, 8, 30);
    reversed.reverse();
    let backward = merger(12, Direction::Max).rank(&reversed).unwrap().into_rows();
    assert_eq!(forward, backward);
}

#[test]
fn test_independent_of_partition() {
    let sources = tables(5, 9, 25);
    let m = merger(15, Direction::Min);
    let whole = m.rank(&sources).unwrap();

    let mut merged = RankedSet::new(15, Direction::Min);
    for chunk in sources.chunks(4) {
        merged.merge(m.rank(chunk).unwrap());
    }
    assert_eq!(whole.into_rows(), merged.into_rows());
}

#[test]
fn test_parallel_reduction_matches() {
    let sources = tables(13, 16, 60);
    let m = merger(25, Direction::Max);
    assert_eq!(
        m.rank(&sources).unwrap().into_rows(),
        m.rank_parallel(&sources).unwrap().into_rows()
    );
}

#[test]
fn test_malformed_rows_are_skipped() {
    let text = "Step    numberOfAcceptedPeleSteps    Binding Energy\n\
                0    0    -1.5\n\
                1    1    abc\n\
                2    2    nan\n\
                3    3    -9.0\n";
    let sources = vec![TableSource::from_text("0/report_1", text)];
    let ranked = merger(5, Direction::Min).rank(&sources).unwrap();
    let steps: Vec<u64> = ranked.rows().iter().map(|r| r.step).collect();
    assert_eq!(steps, vec![3, 0]);
}
