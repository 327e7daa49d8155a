use clap::{Parser, Subcommand};
use packetfate::bdd::HeaderSpace;
use packetfate::error::ScenarioError;
use packetfate::graph::{ForwardingGraphGenerator, NamedStates};
use packetfate::scenario::{NetworkScenario, TransformationScenario};
use packetfate::{fuzz, logging, viz};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// packetfate: forwarding edges and NAT evaluation for network verification
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate transformation scenarios from a file or directory
    Eval {
        /// The scenario file, or a directory searched for *.json files
        path: PathBuf,

        /// Print only the first outcome
        #[arg(long)]
        first: bool,
    },

    /// Generate the forwarding edges of a network scenario
    Graph {
        /// The network scenario file
        path: PathBuf,

        /// Print a Graphviz digraph instead of an edge list
        #[arg(long)]
        dot: bool,

        /// Also render an SVG into this directory (needs Graphviz `dot`)
        #[arg(long)]
        svg: Option<PathBuf>,

        /// Only emit edges for this node
        #[arg(long)]
        node: Option<String>,
    },

    /// Check the forwarding edge invariants on random disposition maps
    Fuzz {
        #[arg(long, default_value = "0")]
        seed: u64,

        #[arg(long, default_value = "100")]
        iterations: u64,

        #[arg(long, default_value = "3")]
        nodes: usize,
    },
}

fn main() {
    logging::init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Eval { path, first } => {
            if !path.exists() {
                eprintln!("Error: Path \"{}\" does not exist.", path.display());
                std::process::exit(1);
            }
            let ok = if path.is_dir() {
                process_directory(path, *first)
            } else {
                process_file(path, *first)
            };
            if !ok {
                std::process::exit(1);
            }
        }
        Commands::Graph {
            path,
            dot,
            svg,
            node,
        } => {
            if let Err(e) = print_graph(path, *dot, svg.as_deref(), node.as_deref()) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Fuzz {
            seed,
            iterations,
            nodes,
        } => {
            let mut failures = 0;
            for i in 0..*iterations {
                let mut rng = StdRng::seed_from_u64(seed + i);
                let hs = HeaderSpace::new();
                let maps = fuzz::random_disposition_maps(&hs, &mut rng, *nodes);
                for violation in fuzz::check_no_route_partition(&maps) {
                    failures += 1;
                    eprintln!("seed {}: {}", seed + i, violation);
                }
            }
            if failures > 0 {
                eprintln!("{} violations", failures);
                std::process::exit(1);
            }
            println!("{} iterations ok", iterations);
        }
    }
}

fn process_directory(dir_path: &Path, first: bool) -> bool {
    tracing::info!(dir = %dir_path.display(), "processing directory");
    let mut found = false;
    let mut ok = true;
    for entry in WalkDir::new(dir_path).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            found = true;
            ok &= process_file(path, first);
        }
    }
    if !found {
        println!("No .json files found in directory.");
    }
    ok
}

fn process_file(file_path: &Path, first: bool) -> bool {
    println!("--- {} ---", file_path.display());
    match evaluate(file_path, first) {
        Ok(()) => true,
        Err(e) => {
            eprintln!("  Error: {}", e);
            false
        }
    }
}

fn evaluate(file_path: &Path, first: bool) -> Result<(), ScenarioError> {
    let scenario = TransformationScenario::load(file_path)?;
    println!("Input: {}", scenario.packet);
    let results = if first {
        vec![scenario.run_first()?]
    } else {
        scenario.run_all()?
    };
    for (i, result) in results.iter().enumerate() {
        println!("Outcome {}: {}", i + 1, result.packet);
        for step in &result.trace {
            println!("  {}", step);
        }
    }
    Ok(())
}

fn print_graph(path: &Path, dot: bool, svg: Option<&Path>, node: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let scenario = NetworkScenario::load(path)?;
    let hs = HeaderSpace::new();
    let maps = scenario.disposition_maps(&hs)?;
    let states = NamedStates;
    let generator = ForwardingGraphGenerator::new(&maps, &states);
    let include = |n: &str| node.is_none_or(|wanted| wanted == n);
    let edges: Vec<_> = generator.edges_for(&include).collect();
    tracing::info!(edges = edges.len(), bdd_nodes = hs.num_nodes(), "generated forwarding edges");

    if dot || svg.is_some() {
        let content = viz::edges_to_dot(&edges, viz::guard_label);
        if dot {
            print!("{}", content);
        }
        if let Some(dir) = svg {
            let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("graph");
            viz::render_svg(&content, dir, name)?;
        }
    } else {
        for edge in &edges {
            println!("{} -> {}  [{}]", edge.source, edge.target, viz::guard_label(&edge.guard));
        }
    }
    Ok(())
}
