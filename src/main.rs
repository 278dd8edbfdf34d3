use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;

use grapes_dd::graph::GraphsDb;
use grapes_dd::heuristic::{evaluate_orderings, CorrelationHeuristic, EntropyHeuristic, Heuristic, OrderingCache};
use grapes_dd::index::{already_indexed, DecisionDiagramIndex, IndexConfig};
use grapes_dd::matching::QueryMatcher;
use grapes_dd::ordering::VariableOrdering;
use grapes_dd::verify::verify_matches;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Print debug output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct IndexArgs {
    /// Graph database in GFF format.
    #[arg(long, value_name = "FILE")]
    db: PathBuf,

    /// Maximum path length, in edges.
    #[arg(long, value_name = "INT", default_value = "4")]
    depth: usize,

    /// Treat edges as undirected.
    #[arg(long)]
    undirected: bool,

    /// Number of tuples merged into the index at once.
    #[arg(long, value_name = "INT", default_value = "10000")]
    buffer_size: usize,

    /// Node table size (in bits, so the actual size is `2^size` nodes).
    #[arg(long, value_name = "INT", default_value = "24")]
    storage_bits: usize,
}

impl IndexArgs {
    fn config(&self) -> IndexConfig {
        IndexConfig {
            max_depth: self.depth,
            directed: !self.undirected,
            buffer_size: self.buffer_size,
            storage_bits: self.storage_bits,
        }
    }

    /// Read the index file of the database, building it first if missing.
    fn load(&self) -> color_eyre::Result<DecisionDiagramIndex> {
        if already_indexed(&self.db, self.depth) {
            let mut index = DecisionDiagramIndex::read(&self.db, self.depth, self.storage_bits)?;
            index.set_directed(!self.undirected);
            Ok(index)
        } else {
            build(self)
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum HeuristicKind {
    Entropy,
    Correlation,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build the index of a graph database and write it next to the database.
    Index {
        #[command(flatten)]
        index: IndexArgs,

        /// Rebuild even if the index file exists.
        #[arg(long)]
        force: bool,
    },

    /// Search a variable ordering for the index.
    Order {
        #[command(flatten)]
        index: IndexArgs,

        #[arg(long, value_enum, default_value = "entropy")]
        heuristic: HeuristicKind,

        /// Reorder the index and rewrite its file.
        #[arg(long)]
        apply: bool,

        /// Report the index size under the found ordering and its reverse.
        #[arg(long)]
        compare: bool,
    },

    /// Generate candidates for a query graph.
    Query {
        #[command(flatten)]
        index: IndexArgs,

        /// Query graph in GFF format.
        #[arg(long, value_name = "FILE")]
        query: PathBuf,

        /// Check candidates with exact subgraph matching.
        #[arg(long)]
        verify: bool,

        /// Stop counting embeddings of a graph after this many.
        #[arg(long, value_name = "INT")]
        limit: Option<u64>,
    },

    /// Dump the index as tab-separated tuples or as a DOT graph.
    Export {
        #[command(flatten)]
        index: IndexArgs,

        #[arg(long, value_name = "FILE")]
        out: PathBuf,

        /// Write Graphviz DOT instead of tuples.
        #[arg(long)]
        dot: bool,
    },
}

fn build(args: &IndexArgs) -> color_eyre::Result<DecisionDiagramIndex> {
    let time = Instant::now();
    let db = GraphsDb::read(&args.db, !args.undirected)?;
    let index = DecisionDiagramIndex::build(&db, &args.config())?;
    info!("Built index in {:.3} s", time.elapsed().as_secs_f64());
    let path = index.write(&args.db)?;
    println!("Index written to {}", path.display());
    Ok(index)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Cli::parse();

    simplelog::TermLogger::init(
        if args.verbose {
            simplelog::LevelFilter::Debug
        } else {
            simplelog::LevelFilter::Info
        },
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = Instant::now();

    match args.command {
        Command::Index { index, force } => {
            let built = if force || !already_indexed(&index.db, index.depth) {
                build(&index)?
            } else {
                println!("Already indexed, use --force to rebuild");
                index.load()?
            };
            println!("{}", built.get_stats());
        }

        Command::Order {
            index: args,
            heuristic,
            apply,
            compare,
        } => {
            let mut index = args.load()?;
            let heuristic: Box<dyn Heuristic> = match heuristic {
                HeuristicKind::Entropy => Box::new(EntropyHeuristic),
                HeuristicKind::Correlation => Box::new(CorrelationHeuristic),
            };

            let time = Instant::now();
            let mut cache = OrderingCache::new();
            let sequence = heuristic.get(&index, &mut cache)?;
            let order = VariableOrdering::order_from_sequence(&sequence)?;
            println!("{}: sequence {:?}, order {:?}", heuristic.name(), sequence, order);
            info!(
                "Search took {:.3} s, {} trials, cache hits: {}",
                time.elapsed().as_secs_f64(),
                cache.len(),
                cache.hits()
            );

            if compare {
                for report in evaluate_orderings(&index, &[(heuristic.name().to_string(), sequence)])? {
                    println!(
                        "{:>16}: {} nodes, {} edges, order {:?}",
                        report.name, report.stats.num_unique_nodes, report.stats.num_edges, report.order
                    );
                }
            }

            if apply {
                let stats = index.reorder(&order)?;
                println!("Reordered: {} -> {} nodes, {} swaps", stats.initial_size, stats.final_size, stats.swaps);
                let path = index.write(&args.db)?;
                println!("Index written to {}", path.display());
            }
        }

        Command::Query {
            index: args,
            query,
            verify,
            limit,
        } => {
            let index = args.load()?;
            let matcher = QueryMatcher::new(&index);

            let time = Instant::now();
            let (query, matches) = matcher.match_file(&query)?;
            info!("Candidates generated in {:.3} s", time.elapsed().as_secs_f64());

            println!("{} candidate graphs", matches.len());
            for m in &matches {
                println!("{}", m);
            }

            if verify {
                let db = GraphsDb::read_with_labels(&args.db, !args.undirected, index.labels().clone())?;
                let report = verify_matches(&query, &db, &matches, limit);
                println!("{} matching graphs: {:?}", report.matched.len(), report.matched);
                println!("{} embeddings", report.total_embeddings());
            }
        }

        Command::Export { index: args, out, dot } => {
            let index = args.load()?;
            if dot {
                std::fs::write(&out, index.to_dot()?)?;
            } else {
                index.save_data(&out)?;
            }
            println!("Exported to {}", out.display());
        }
    }

    info!("All done in {:.3} s", time_total.elapsed().as_secs_f64());

    Ok(())
}
