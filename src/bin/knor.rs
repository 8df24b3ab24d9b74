//! k-means Binary
//!
//! Clusters a row-major little-endian `f64` matrix and prints the result as JSON.
//!
//! Usage: knor <DATA> <NROW> <NCOL> <K> [-t init] [-T threads] [-N nodes] [-i iters]
//!        [-l tolerance] [-d metric] [-C centers] [-m] [--steal] [--seed n] [--numa]
//!        [--normalize] [-o output]

use anyhow::Context;
use byteorder::LittleEndian;
use byteorder::ReadBytesExt;
use clap::Parser;
use knor::*;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about = "NUMA-aware parallel k-means", long_about = None)]
struct Args {
    /// Row-major little-endian f64 matrix
    data: PathBuf,
    nrow: usize,
    ncol: usize,
    k: usize,
    /// random, forgy, kmeanspp, or none (requires -C)
    #[arg(short = 't', long, default_value = "kmeanspp")]
    init: String,
    /// Worker threads (defaults to every CPU)
    #[arg(short = 'T', long)]
    threads: Option<usize>,
    /// Memory nodes to spread threads over (defaults to detected nodes)
    #[arg(short = 'N', long)]
    nodes: Option<usize>,
    /// Iteration budget
    #[arg(short = 'i', long)]
    iters: Option<usize>,
    /// Stop once the fraction of rows changing cluster is at most this
    #[arg(short = 'l', long, default_value_t = -1., allow_hyphen_values = true)]
    tolerance: f64,
    /// eucl, cos, or taxi
    #[arg(short = 'd', long, default_value = "eucl")]
    metric: String,
    /// Initial centers, k x ncol little-endian f64
    #[arg(short = 'C', long)]
    centers: Option<PathBuf>,
    /// Prune distance computations with the triangle inequality
    #[arg(short = 'm', long)]
    prune: bool,
    /// Let idle threads steal rows from busy ones
    #[arg(long)]
    steal: bool,
    #[arg(long)]
    seed: Option<u64>,
    /// Scale every column onto [0, 1] before seeding
    #[arg(long)]
    normalize: bool,
    /// Copy the matrix onto every memory node before clustering
    #[arg(long)]
    numa: bool,
    /// Write JSON here instead of stdout
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> anyhow::Result<Config> {
        let defaults = Config::default();
        Ok(Config {
            k: self.k,
            max_iters: self.iters.unwrap_or(defaults.max_iters),
            nnodes: self.nodes.unwrap_or(defaults.nnodes),
            nthreads: self.threads.unwrap_or(defaults.nthreads),
            init: Init::try_from(self.init.as_str())?,
            tolerance: self.tolerance,
            metric: Metric::try_from(self.metric.as_str())?,
            engine: if self.prune { Engine::Pruned } else { Engine::Lloyd },
            scheduling: if self.steal { Scheduling::Stealing } else { Scheduling::Static },
            seed: self.seed.unwrap_or(defaults.seed),
            normalize: self.normalize,
            centers: self
                .centers
                .as_deref()
                .map(|path| read(path, self.k * self.ncol))
                .transpose()?,
            ..defaults
        })
    }
}

fn read(path: &Path, len: usize) -> anyhow::Result<Vec<f64>> {
    let file = std::fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut values = vec![0.; len];
    std::io::BufReader::new(file)
        .read_f64_into::<LittleEndian>(&mut values)
        .with_context(|| format!("read {} values from {}", len, path.display()))?;
    Ok(values)
}

fn main() -> anyhow::Result<()> {
    log();
    let args = Args::parse();
    let config = args.config()?;
    let data: Arc<[f64]> = read(&args.data, args.nrow * args.ncol)?.into();
    let placement = match args.numa {
        true => Placement::Numa(MemoryDistributor::create(
            data.clone(),
            config.nnodes,
            args.nrow,
            args.ncol,
        )?),
        false => Placement::Local,
    };
    let started = std::time::Instant::now();
    let result = Coordinator::create(data, args.nrow, args.ncol, config)?.run(placement)?;
    log::info!("{:<32}{:<32}", "elapsed", format!("{:.3?}", started.elapsed()));
    let json = serde_json::to_string_pretty(&result)?;
    match args.output {
        Some(ref path) => std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?,
        None => println!("{}", json),
    }
    Ok(())
}
