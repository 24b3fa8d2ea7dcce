use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use parquet::arrow::ArrowWriter;

use cutflow::config::Config;

#[derive(Parser, Debug)]
#[command(about = "Write a synthetic chunk tree and a matching analysis.toml")]
struct Cli {
    /// Output directory
    #[arg(long, default_value = "sample_data")]
    output: PathBuf,

    /// Chunks per process
    #[arg(long, default_value_t = 3)]
    chunks: usize,

    /// Events per chunk
    #[arg(long, default_value_t = 2000)]
    events: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    /// Non-negative integer count drawn from a rounded Gaussian.
    fn count(&mut self, mean: f64, std_dev: f64, max: i64) -> i64 {
        (self.gauss(mean, std_dev).round() as i64).clamp(0, max)
    }
}

/// Per-process shape of the generated kinematics.
struct Shape {
    n_tau_3pi: f64,
    emin_e: f64,
    emax_e: f64,
    emin_eneutral: f64,
    emin_ndv: f64,
    emin_nneutral: f64,
}

const SIGNAL: Shape = Shape {
    n_tau_3pi: 2.2,
    emin_e: 31.0,
    emax_e: 44.0,
    emin_eneutral: 7.0,
    emin_ndv: 2.4,
    emin_nneutral: 9.0,
};

const BACKGROUND: Shape = Shape {
    n_tau_3pi: 0.6,
    emin_e: 40.0,
    emax_e: 47.5,
    emin_eneutral: 15.0,
    emin_ndv: 1.2,
    emin_nneutral: 14.0,
};

fn generate_chunk(shape: &Shape, events: usize, rng: &mut SimpleRng) -> Result<RecordBatch> {
    let mut ints: BTreeMap<&str, Vec<i64>> = BTreeMap::new();
    let mut floats: BTreeMap<&str, Vec<f64>> = BTreeMap::new();

    for _ in 0..events {
        ints.entry("EVT_NTau23Pi")
            .or_default()
            .push(rng.count(shape.n_tau_3pi, 1.0, 4));
        ints.entry("EVT_ThrustEmin_NDV")
            .or_default()
            .push(rng.count(shape.emin_ndv, 1.0, 4));
        ints.entry("EVT_ThrustEmin_Nneutral")
            .or_default()
            .push(rng.count(shape.emin_nneutral, 4.0, 25));
        floats
            .entry("EVT_ThrustEmin_E")
            .or_default()
            .push(rng.gauss(shape.emin_e, 7.0).max(0.0));
        floats
            .entry("EVT_ThrustEmax_E")
            .or_default()
            .push(rng.gauss(shape.emax_e, 3.5).max(0.0));
        floats
            .entry("EVT_ThrustEmin_Eneutral")
            .or_default()
            .push(rng.gauss(shape.emin_eneutral, 5.0).max(0.0));
    }

    let mut fields = Vec::new();
    let mut arrays: Vec<ArrayRef> = Vec::new();
    for (name, values) in ints {
        fields.push(Field::new(name, DataType::Int64, false));
        arrays.push(Arc::new(Int64Array::from(values)));
    }
    for (name, values) in floats {
        fields.push(Field::new(name, DataType::Float64, false));
        arrays.push(Arc::new(Float64Array::from(values)));
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).context("building record batch")
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let mut rng = SimpleRng::new(cli.seed);

    let mut config = Config::default();
    config.input.base_path = cli.output.join("stage1");
    config.input.chunks = Vec::new();
    config.input.chunk_count = Some(cli.chunks);
    config.input.chunk_extension = "parquet".to_string();
    config.output.filtered_dir = cli.output.join("filtered");
    config.output.report_dir = cli.output.join("reports");
    config.output.efficiency_dir = cli.output.join("efficiencies");
    // Only the branches generated below.
    config.branches.retain(|name, _| config.cuts.contains_key(name));

    let chunk_files = config.input.chunk_files();
    for folder in config.processes.keys() {
        let shape = if folder.contains("Bs2TauTau") {
            &SIGNAL
        } else {
            &BACKGROUND
        };
        let dir = config.input.base_path.join(folder);
        std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

        for chunk in &chunk_files {
            let batch = generate_chunk(shape, cli.events, &mut rng)?;
            let path = dir.join(chunk);
            let file = std::fs::File::create(&path)
                .with_context(|| format!("creating {}", path.display()))?;
            let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
            writer.write(&batch)?;
            writer.close()?;
        }
        log::info!("{folder}: wrote {} chunk(s)", chunk_files.len());
    }

    let config_path = cli.output.join("analysis.toml");
    config.save(&config_path)?;

    println!(
        "Wrote {} process folder(s) x {} chunk(s) x {} events under {}; config at {}",
        config.processes.len(),
        cli.chunks,
        cli.events,
        config.input.base_path.display(),
        config_path.display()
    );
    Ok(())
}
