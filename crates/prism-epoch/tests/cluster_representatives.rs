//! Nearest-centroid representatives over on-disk snapshot files.

use std::fs;
use std::path::Path;

use approx::assert_relative_eq;
use prism_epoch::representatives::summary_file_name;
use prism_epoch::trajectory::start_marker;
use prism_epoch::{
    assign, run_cluster_representatives, ClusterConfig, EpochError, RepresentativeWriter,
    SnapshotSource,
};
use tempfile::TempDir;

fn init_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}

/// Coordinate file plus the matching multi-model structure file.
fn write_origin(dir: &Path, origin: &str, snapshots: &[[f64; 3]]) {
    let mut coords = String::from("# index x y z\n");
    let mut pdb = String::new();
    for (i, xyz) in snapshots.iter().enumerate() {
        coords.push_str(&format!("{}    {}    {}    {}\n", i, xyz[0], xyz[1], xyz[2]));
        pdb.push_str(&start_marker(i + 1));
        pdb.push('\n');
        pdb.push_str(&format!(
            "HETATM    1  C1  LIG L 900    {:>8.3}{:>8.3}{:>8.3}  1.00  0.00           C\n",
            xyz[0], xyz[1], xyz[2]
        ));
        pdb.push_str("ENDMDL\n");
    }
    fs::write(dir.join(format!("traj_{origin}.dat")), coords).unwrap();
    fs::write(dir.join(format!("{origin}.pdb")), pdb).unwrap();
}

fn two_origin_run(tmp: &TempDir) -> SnapshotSource {
    let snaps = tmp.path().join("allTrajs");
    fs::create_dir_all(&snaps).unwrap();
    write_origin(&snaps, "A", &[[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]]);
    write_origin(&snaps, "B", &[[9.0, 9.0, 9.0]]);
    SnapshotSource::new(snaps, "traj_*")
}

#[test]
fn test_two_centroid_scenario() {
    init_logging();
    let tmp = TempDir::new().unwrap();
    let source = two_origin_run(&tmp);

    let centroids = vec![vec![0.0, 0.0, 0.0], vec![10.0, 10.0, 10.0]];
    let set = assign(centroids, source.stream().unwrap()).unwrap();

    let c0 = set.get(0).unwrap();
    let w0 = c0.winner.as_ref().unwrap();
    assert_eq!((w0.origin.as_str(), w0.index), ("A", 0));
    assert_eq!(c0.min_distance, 0.0);

    let c1 = set.get(1).unwrap();
    let w1 = c1.winner.as_ref().unwrap();
    assert_eq!((w1.origin.as_str(), w1.index), ("B", 0));
    assert_relative_eq!(c1.min_distance, 3f64.sqrt(), epsilon = 1e-12);
}

#[test]
fn test_writer_copies_and_summarises() {
    let tmp = TempDir::new().unwrap();
    let source = two_origin_run(&tmp);
    let set = assign(
        vec![vec![0.0, 0.0, 0.0], vec![10.0, 10.0, 10.0], vec![500.0, 0.0, 0.0]],
        source.stream().unwrap(),
    )
    .unwrap();
    // the far centre still receives its nearest snapshot
    assert!(set.empty_clusters().is_empty());

    let out = tmp.path().join("clusters");
    let output = RepresentativeWriter::new(&source.dir, &out)
        .with_frames(true)
        .write(&set)
        .unwrap();

    assert_eq!(output.structures.len(), 3);
    assert!(out.join("cluster_0_A.pdb").is_file());
    assert!(out.join("cluster_1_B.pdb").is_file());
    assert_eq!(
        fs::read(out.join("cluster_1_B.pdb")).unwrap(),
        fs::read(source.dir.join("B.pdb")).unwrap()
    );

    // winning frame of cluster 0 is snapshot A/0, i.e. MODEL 1
    let frame = fs::read_to_string(out.join("cluster_0.pdb")).unwrap();
    assert!(frame.starts_with("MODEL        1\n"));
    assert!(frame.contains("   0.000   0.000   0.000"));

    let summary = fs::read_to_string(out.join(summary_file_name(3))).unwrap();
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[1],
        "HETATM    1  H1  CLT L 502       9.000   9.000   9.000  0.750           H"
    );
}

#[test]
fn test_empty_cluster_is_reported_not_dropped() {
    let tmp = TempDir::new().unwrap();
    let snaps = tmp.path().join("allTrajs");
    fs::create_dir_all(&snaps).unwrap();
    write_origin(&snaps, "A", &[[0.0, 0.0, 0.0]]);
    let source = SnapshotSource::new(&snaps, "traj_*");

    // No snapshot is ever strictly closer than +inf to this centre.
    let set = assign(vec![vec![0.0, 0.0, 0.0], vec![f64::MAX, 0.0, 0.0]], source.stream().unwrap())
        .unwrap();
    assert_eq!(set.empty_clusters(), vec![1]);

    let out = tmp.path().join("out");
    let output = RepresentativeWriter::new(&snaps, &out).write(&set).unwrap();
    assert_eq!(output.empty_clusters, vec![1]);
    assert_eq!(output.structures.len(), 1);
    let summary = fs::read_to_string(&output.summary).unwrap();
    assert_eq!(summary.lines().count(), 2);
}

#[test]
fn test_rerun_is_byte_identical() {
    let tmp = TempDir::new().unwrap();
    let source = two_origin_run(&tmp);
    let centres_file = tmp.path().join("centres.txt");
    fs::write(&centres_file, "0 0 0\n10 10 10\n").unwrap();

    let config = ClusterConfig {
        snapshot_dir: source.dir.clone(),
        snapshot_pattern: "traj_*".into(),
        structure_dir: source.dir.clone(),
        output_dir: tmp.path().join("out"),
        centroids_file: Some(centres_file),
        ..Default::default()
    };
    let first = run_cluster_representatives(&config).unwrap();
    let summary_before = fs::read(&first.output.summary).unwrap();
    let second = run_cluster_representatives(&config).unwrap();

    assert_eq!(first.output.structures, second.output.structures);
    assert_eq!(fs::read(&second.output.summary).unwrap(), summary_before);
    assert_eq!(second.snapshots_scanned, 3);
}

#[test]
fn test_kmeans_run_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let source = two_origin_run(&tmp);

    let config = ClusterConfig {
        n_clusters: 2,
        snapshot_dir: source.dir.clone(),
        snapshot_pattern: "traj_*".into(),
        structure_dir: source.dir.clone(),
        output_dir: tmp.path().join("km"),
        ..Default::default()
    };
    let run = run_cluster_representatives(&config).unwrap();
    assert_eq!(run.n_clusters, 2);
    assert!(run.output.empty_clusters.is_empty());
    assert!(tmp.path().join("km/representatives.json").is_file());
    assert!(tmp.path().join("km").join(summary_file_name(2)).is_file());
}

#[test]
fn test_missing_snapshots_and_centres() {
    let tmp = TempDir::new().unwrap();
    let source = SnapshotSource::new(tmp.path(), "traj_*");
    assert!(matches!(source.stream(), Err(EpochError::NoInput { .. })));

    let source = two_origin_run(&tmp);
    assert!(matches!(
        assign(Vec::new(), source.stream().unwrap()),
        Err(EpochError::EmptyCentroidSet)
    ));
}

#[test]
fn test_ragged_snapshot_line_is_skipped() {
    let tmp = TempDir::new().unwrap();
    let snaps = tmp.path().join("allTrajs");
    fs::create_dir_all(&snaps).unwrap();
    fs::write(snaps.join("traj_A.dat"), "0 0 0 0\n1 1 1\n2 5 5 5\n").unwrap();
    let source = SnapshotSource::new(&snaps, "traj_*");

    let set = assign(vec![vec![0.0, 0.0, 0.0], vec![5.0, 5.0, 5.0]], source.stream().unwrap()).unwrap();
    assert_eq!(set.scanned(), 2);
    assert_eq!(set.rejected(), 1);
    assert_eq!(set.get(0).unwrap().winner.as_ref().unwrap().index, 0);
    assert_eq!(set.get(1).unwrap().winner.as_ref().unwrap().index, 2);

    fs::write(snaps.join("A.pdb"), "MODEL        1\nENDMDL\n").unwrap();
    let centres = tmp.path().join("centres.txt");
    fs::write(&centres, "0 0 0\n5 5 5\n").unwrap();
    let run = run_cluster_representatives(&ClusterConfig {
        snapshot_dir: snaps.clone(),
        snapshot_pattern: "traj_*".into(),
        structure_dir: snaps,
        output_dir: tmp.path().join("out"),
        centroids_file: Some(centres),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(run.snapshots_scanned, 2);
    assert_eq!(run.snapshots_skipped, 1);
}
