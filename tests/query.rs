//! End-to-end tests of candidate generation and verification.

use std::collections::BTreeSet;
use std::fs;
use std::io::Cursor;

use grapes_dd::error::Error;
use grapes_dd::graph::{GffReader, Graph, GraphsDb};
use grapes_dd::index::{DecisionDiagramIndex, IndexConfig};
use grapes_dd::matching::QueryMatcher;
use grapes_dd::verify::{count_embeddings, verify_matches};

const DB: &str = "\
#square
4
A
B
C
A
4
0 1
1 2
2 3
3 0
#chain
3
A
B
C
2
0 1
1 2
#fork
5
C
A
B
B
A
5
0 1
1 2
1 3
4 2
2 0
#pair
2
A
A
1
0 1
";

const QUERIES: &[&str] = &[
    "#a\n1\nA\n0\n",
    "#ab\n2\nA\nB\n1\n0 1\n",
    "#abc\n3\nA\nB\nC\n2\n0 1\n1 2\n",
    "#aa\n2\nA\nA\n1\n0 1\n",
    "#bb\n2\nB\nB\n0\n",
    "#cycle\n3\nC\nA\nB\n3\n0 1\n1 2\n2 0\n",
    "#star\n3\nA\nB\nB\n2\n0 1\n0 2\n",
];

fn setup(directed: bool, max_depth: usize) -> (GraphsDb, DecisionDiagramIndex) {
    let db = GraphsDb::from_reader(Cursor::new(DB), directed, Default::default()).unwrap();
    let config = IndexConfig {
        max_depth,
        directed,
        buffer_size: 16,
        storage_bits: 16,
    };
    let index = DecisionDiagramIndex::build(&db, &config).unwrap();
    (db, index)
}

fn read_query(index: &DecisionDiagramIndex, text: &str) -> Graph {
    let mut labels = index.labels().clone();
    GffReader::new(Cursor::new(text), &mut labels, index.directed())
        .next_graph()
        .unwrap()
        .unwrap()
}

fn everything(query: &Graph, target: &Graph) -> Vec<BTreeSet<u32>> {
    vec![(0..target.num_vertices() as u32).collect(); query.num_vertices()]
}

/// No embedding is lost by candidate generation.
fn assert_sound(db: &GraphsDb, index: &DecisionDiagramIndex) {
    let matcher = QueryMatcher::new(index);
    for text in QUERIES {
        let query = read_query(index, text);
        let matches = matcher.match_graph(&query).unwrap();

        let ids: Vec<u32> = matches.iter().map(|m| m.graph_id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(ids, sorted, "{}: matches not sorted by graph", query.name);

        for target in &db.graphs {
            let expected = count_embeddings(&query, target, &everything(&query, target), None);
            let found = match matches.iter().find(|m| m.graph_id == target.id) {
                Some(m) => {
                    assert!(m.is_complete());
                    let candidates: Vec<_> = (0..query.num_vertices() as u32).map(|q| m.candidates(q).clone()).collect();
                    count_embeddings(&query, target, &candidates, None)
                }
                None => 0,
            };
            assert_eq!(found, expected, "{} in {}", query.name, target.name);
        }
    }
}

// ─── Candidate Tests ───────────────────────────────────────────────────────────

#[test]
fn single_label_query() {
    let (_, index) = setup(true, 2);
    let query = read_query(&index, QUERIES[0]);
    let matches = QueryMatcher::new(&index).match_graph(&query).unwrap();

    let ids: Vec<u32> = matches.iter().map(|m| m.graph_id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);
    assert_eq!(matches[0].candidates(0), &BTreeSet::from([0, 3]));
    assert_eq!(matches[1].candidates(0), &BTreeSet::from([0]));
    assert_eq!(matches[2].candidates(0), &BTreeSet::from([1, 4]));
    assert_eq!(matches[3].candidates(0), &BTreeSet::from([0, 1]));
}

#[test]
fn label_counts_prune_graphs() {
    let (_, index) = setup(true, 2);
    // Two B vertices exist in `fork` only.
    let query = read_query(&index, "#bb\n2\nB\nB\n0\n");
    let matches = QueryMatcher::new(&index).match_graph(&query).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].graph_id, 2);
    assert_eq!(matches[0].candidates(0), &BTreeSet::from([2, 3]));
}

#[test]
fn unknown_label_matches_nothing() {
    let (_, index) = setup(true, 2);
    let query = read_query(&index, "#az\n2\nA\nZ\n1\n0 1\n");
    assert!(QueryMatcher::new(&index).match_graph(&query).unwrap().is_empty());
}

#[test]
fn query_from_file() {
    let (_, index) = setup(true, 3);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("q.gff");
    fs::write(&path, QUERIES[2]).unwrap();

    let (query, matches) = QueryMatcher::new(&index).match_file(&path).unwrap();
    assert_eq!(query.name, "abc");
    // `pair` has no B.
    let ids: Vec<u32> = matches.iter().map(|m| m.graph_id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
}

#[test]
fn missing_query_is_an_error() {
    let (_, index) = setup(true, 2);
    let dir = tempfile::tempdir().unwrap();
    assert!(QueryMatcher::new(&index).match_file(dir.path().join("nope.gff")).is_err());

    let empty = dir.path().join("empty.gff");
    fs::write(&empty, "\n").unwrap();
    assert!(QueryMatcher::new(&index).match_file(&empty).is_err());
}

#[test]
fn data_dump_cannot_be_queried() {
    let (_, index) = setup(true, 2);
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("index.tsv");
    index.save_data(&data).unwrap();

    let config = IndexConfig {
        max_depth: 2,
        directed: true,
        buffer_size: 16,
        storage_bits: 16,
    };
    let loaded = DecisionDiagramIndex::load_data(&data, &config).unwrap();
    assert!(loaded.vertices().is_empty());
    assert_eq!(loaded.vertices().decode(1), None);

    let query = read_query(&loaded, "#a\n1\nA\n0\n");
    let res = QueryMatcher::new(&loaded).match_graph(&query);
    assert!(matches!(res, Err(Error::Configuration(_))));
}

// ─── Soundness Tests ───────────────────────────────────────────────────────────

#[test]
fn directed_candidates_are_sound() {
    for depth in 0..=3 {
        let (db, index) = setup(true, depth);
        assert_sound(&db, &index);
    }
}

#[test]
fn undirected_candidates_are_sound() {
    for depth in 1..=3 {
        let (db, index) = setup(false, depth);
        assert_sound(&db, &index);
    }
}

#[test]
fn sound_after_reorder() {
    let (db, mut index) = setup(true, 2);
    index.reorder(&[3, 1, 2, 0]).unwrap();
    assert_sound(&db, &index);
}

// ─── Verification Tests ────────────────────────────────────────────────────────

#[test]
fn verify_candidate_graphs() {
    let (db, index) = setup(true, 3);
    let query = read_query(&index, "#cycle\n3\nC\nA\nB\n3\n0 1\n1 2\n2 0\n");
    let matches = QueryMatcher::new(&index).match_graph(&query).unwrap();
    assert!(matches.iter().any(|m| m.graph_id == 2));

    let report = verify_matches(&query, &db, &matches, None);
    assert_eq!(report.matched, vec![2]);
    assert_eq!(report.total_embeddings(), 1);
}
