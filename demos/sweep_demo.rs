//! Sweep demo: two synthetic thermal frames through the standard noise suite
//! and the recommended denoisers, persisted to a scratch directory.
//!
//! Run with: cargo run --example sweep_demo

use denoise_lab::image::{BitDepth, Image};
use denoise_lab::ledger::{EventFilter, EventPayload, EventType, Ledger};
use denoise_lab::metrics::SubjectPair;
use denoise_lab::noise::standard_suite;
use denoise_lab::pipeline::{DenoisePlan, Orchestrator, SweepSpec};
use denoise_lab::rng::Seed;

fn main() -> anyhow::Result<()> {
    println!("=== denoise-lab sweep demo ===\n");

    let root = std::env::temp_dir().join("denoise-lab-demo");
    let ledger = Ledger::open(root.join("ledger.jsonl"))?;
    let orchestrator = Orchestrator::new(ledger).with_storage_root(&root);

    let images = vec![
        Image::gradient(96, 96, BitDepth::U14)?,
        Image::hot_spots(96, 96, BitDepth::U14)?,
    ];
    let spec = SweepSpec::new(images, standard_suite(Seed::default()), DenoisePlan::Recommended);
    println!("Images: {}", spec.images().len());
    println!("Noise configs: {}", spec.noise().len());

    let summary = orchestrator.run_sweep(&spec)?;
    println!("Result: {summary}\n");

    // Best denoiser per noisy input, by PSNR against the clean frame
    let scored = orchestrator
        .ledger()
        .summarize(&EventFilter::new().event_type(EventType::MetricsComputed))?;
    let mut best: std::collections::BTreeMap<String, (String, f64)> = Default::default();
    for event in &scored {
        let EventPayload::Metrics { records } = event.payload() else {
            continue;
        };
        let Some(record) = records
            .iter()
            .find(|r| r.subject_pair == Some(SubjectPair::TruthVsDenoised))
        else {
            continue;
        };
        let mut parts = event.cell_id().rsplitn(2, '/');
        let (Some(denoiser), Some(input)) = (parts.next(), parts.next()) else {
            continue;
        };
        let entry = best
            .entry(input.to_string())
            .or_insert_with(|| (denoiser.to_string(), f64::NEG_INFINITY));
        if record.psnr > entry.1 {
            *entry = (denoiser.to_string(), record.psnr);
        }
    }
    for (input, (denoiser, psnr)) in &best {
        println!("{input:<40} {denoiser:<28} {psnr:>7.2} dB");
    }

    for failure in &summary.failed {
        println!("FAILED {} at {}: {}", failure.cell_id, failure.stage, failure.message);
    }
    println!("\nOutputs under {}", root.display());
    Ok(())
}
