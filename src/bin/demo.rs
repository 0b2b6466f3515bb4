use anyhow::{Context, Result};
use clap::Parser;
use smartreads::data::DataGenerator;
use smartreads::{init_tracing, Config, RecommendationEngine};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate a library dataset and print sample recommendations")]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long)]
    seed: Option<u64>,

    /// Recommendations per student.
    #[arg(short = 'n', long, default_value_t = 5)]
    count: usize,

    /// Student to recommend for; defaults to the first three students.
    #[arg(long)]
    student: Option<String>,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = Config::from_file(&args.config)?;
    let seed = args.seed.or(config.data.seed);
    let dataset = DataGenerator::new(seed).generate(&config.data);

    let engine = RecommendationEngine::new(config.recommendation.clone());
    let version = engine.load(dataset)?;
    info!("Engine loaded at snapshot v{}", version);

    let snapshot = engine.ready()?;
    let targets: Vec<String> = match args.student {
        Some(id) => vec![id],
        None => snapshot.students().take(3).map(|s| s.student_id.clone()).collect(),
    };

    for student_id in &targets {
        match snapshot.student(student_id) {
            Some(student) => println!(
                "\n=== {} (grade {}, level {}, {} books read) ===",
                student.student_id,
                student.grade_level,
                student.reading_level,
                student.reading_history.len()
            ),
            None => println!("\n=== {} (unknown student) ===", student_id),
        }

        for (rank, recommendation) in snapshot.recommend(student_id, args.count).iter().enumerate() {
            println!(
                "\n#{} score {:.3}\n{}",
                rank + 1,
                recommendation.score,
                engine.explain(recommendation)
            );
        }
    }

    let analytics = engine.analytics()?;
    let report = serde_json::to_string_pretty(&analytics).context("failed to render analytics")?;
    println!("\n=== Analytics ===\n{}", report);

    Ok(())
}
