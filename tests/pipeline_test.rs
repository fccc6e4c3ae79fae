//! End-to-end pipeline tests

use std::io;
use std::sync::{Arc, Mutex};

use denoise_lab::denoise::{default_config, AlgorithmId, DenoiseConfig};
use denoise_lab::error::ErrorKind;
use denoise_lab::image::{BitDepth, Image};
use denoise_lab::ledger::{EventFilter, EventPayload, EventType, ExperimentEvent, Ledger};
use denoise_lab::metrics::SubjectPair;
use denoise_lab::noise::NoiseConfig;
use denoise_lab::params::{param_map, ParamValue};
use denoise_lab::pipeline::{Cell, CellState, DenoisePlan, Orchestrator, SweepSpec};
use denoise_lab::rng::Seed;
use denoise_lab::Error;

fn median(ksize: i64) -> DenoiseConfig {
    DenoiseConfig::new(AlgorithmId::Median, param_map([("ksize", ParamValue::Int(ksize))]))
}

#[test]
fn test_gaussian_median_scenario() {
    let truth = Image::gradient(64, 64, BitDepth::U8).unwrap();
    let noise = NoiseConfig::gaussian(10.0, Seed::new(42));
    let orchestrator = Orchestrator::new(Ledger::in_memory());

    let report = orchestrator
        .run_cell(&Cell::new(&truth, &noise, median(3)))
        .unwrap();
    assert_eq!(report.state, CellState::Done);
    assert_eq!(report.cell_id, "gradient_64x64_u8/gaussian_sigma10/median_k3");

    let noisy_vs_truth = &report.metrics[0];
    let denoised_vs_truth = &report.metrics[1];
    assert_eq!(noisy_vs_truth.subject_pair, Some(SubjectPair::TruthVsNoisy));
    assert_eq!(denoised_vs_truth.subject_pair, Some(SubjectPair::TruthVsDenoised));
    assert_eq!(report.metrics[2].subject_pair, Some(SubjectPair::NoisyVsDenoised));
    assert!(noisy_vs_truth.psnr < denoised_vs_truth.psnr);

    let events = orchestrator.ledger().events().unwrap();
    assert_eq!(events.len(), 3);
    let types: Vec<EventType> = events.iter().map(ExperimentEvent::event_type).collect();
    assert_eq!(
        types,
        [
            EventType::NoiseApplied,
            EventType::DenoiseApplied,
            EventType::MetricsComputed
        ]
    );

    let noisy_id = report.noisy_identity.as_deref().unwrap();
    let denoised_id = report.denoised_identity.as_deref().unwrap();
    assert_eq!(events[0].input_identities(), [truth.identity().to_string()]);
    assert_eq!(events[0].output_identity(), Some(noisy_id));
    assert_eq!(events[0].seed(), Some(Seed::new(42)));
    assert_eq!(events[1].input_identities(), [noisy_id.to_string()]);
    assert_eq!(events[1].output_identity(), Some(denoised_id));
    assert_eq!(
        events[2].input_identities(),
        [
            truth.identity().to_string(),
            noisy_id.to_string(),
            denoised_id.to_string()
        ]
    );
    assert!(events.iter().all(|e| e.cell_id() == report.cell_id));
}

#[test]
fn test_replay_is_bit_for_bit() {
    let truth = Image::hot_spots(32, 32, BitDepth::U14).unwrap();
    let noise = NoiseConfig::speckle(0.05, Seed::new(7));
    let run = || {
        Orchestrator::new(Ledger::in_memory())
            .run_cell(&Cell::new(&truth, &noise, default_config(AlgorithmId::Tv)))
            .unwrap()
    };
    let (a, b) = (run(), run());
    assert_eq!(a.noisy_identity, b.noisy_identity);
    assert_eq!(a.denoised_identity, b.denoised_identity);
    assert_eq!(a.metrics[1].psnr, b.metrics[1].psnr);
}

#[test]
fn test_partial_failure_isolated() {
    let spec = SweepSpec::new(
        vec![Image::gradient(32, 32, BitDepth::U8).unwrap()],
        vec![
            NoiseConfig::salt_pepper(0.05, Seed::new(42)),
            NoiseConfig::salt_pepper(1.5, Seed::new(42)),
            NoiseConfig::gaussian(5.0, Seed::new(42)),
        ],
        DenoisePlan::Explicit(vec![median(3)]),
    );
    let orchestrator = Orchestrator::new(Ledger::in_memory());
    let summary = orchestrator.run_sweep(&spec).unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed.len(), 1);
    let failed = &summary.failed[0];
    assert_eq!(failed.kind, ErrorKind::InvalidParameter);
    assert_eq!(failed.stage, CellState::Pending);
    assert!(failed.cell_id.contains("saltpepper_d150"));

    let failures = orchestrator
        .ledger()
        .summarize(&EventFilter::new().event_type(EventType::CellFailed))
        .unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(orchestrator.ledger().len().unwrap(), 3 + 1 + 3);
}

#[test]
fn test_results_independent_of_order() {
    let images = vec![
        Image::gradient(24, 24, BitDepth::U8).unwrap(),
        Image::hot_spots(24, 24, BitDepth::U8).unwrap(),
    ];
    let noise = vec![
        NoiseConfig::gaussian(12.0, Seed::new(42)),
        NoiseConfig::poisson(500.0, Seed::new(42)),
    ];
    let plan = DenoisePlan::Explicit(vec![median(3), default_config(AlgorithmId::Bilateral)]);

    let forward = Orchestrator::new(Ledger::in_memory());
    forward
        .run_sweep(&SweepSpec::new(images.clone(), noise.clone(), plan.clone()))
        .unwrap();
    let backward = Orchestrator::new(Ledger::in_memory());
    backward
        .run_sweep(&SweepSpec::new(
            images.into_iter().rev().collect(),
            noise.into_iter().rev().collect(),
            plan,
        ))
        .unwrap();

    let outputs = |o: &Orchestrator| {
        let mut out: Vec<(String, Option<String>)> = o
            .ledger()
            .events()
            .unwrap()
            .iter()
            .map(|e| (e.cell_id().to_string(), e.output_identity().map(str::to_string)))
            .collect();
        out.sort();
        out
    };
    assert_eq!(outputs(&forward), outputs(&backward));
}

#[cfg(feature = "parallel")]
#[test]
fn test_parallel_matches_sequential() {
    let spec = SweepSpec::new(
        vec![Image::hot_spots(24, 24, BitDepth::U12).unwrap()],
        vec![
            NoiseConfig::gaussian(80.0, Seed::new(3)),
            NoiseConfig::salt_pepper(0.1, Seed::new(3)),
        ],
        DenoisePlan::Recommended,
    );
    let sequential = Orchestrator::new(Ledger::in_memory());
    let a = sequential.run_sweep(&spec).unwrap();
    let parallel = Orchestrator::new(Ledger::in_memory());
    let b = parallel.run_sweep_parallel(&spec).unwrap();
    assert_eq!(a, b);

    let outputs = |o: &Orchestrator| {
        let mut out: Vec<String> = o
            .ledger()
            .events()
            .unwrap()
            .iter()
            .filter_map(|e| e.output_identity().map(str::to_string))
            .collect();
        out.sort();
        out
    };
    assert_eq!(outputs(&sequential), outputs(&parallel));
}

#[cfg(feature = "parallel")]
#[test]
fn test_parallel_cells_share_noisy_output() {
    use denoise_lab::image_io;
    use denoise_lab::noise::NoiseRegistry;

    let dir = tempfile::tempdir().unwrap();
    let truth = Image::hot_spots(32, 32, BitDepth::U8).unwrap();
    let noise = NoiseConfig::gaussian(15.0, Seed::new(9));
    let spec = SweepSpec::new(
        vec![truth.clone()],
        vec![noise.clone()],
        DenoisePlan::Explicit(vec![
            median(3),
            median(5),
            median(7),
            default_config(AlgorithmId::Bilateral),
            default_config(AlgorithmId::Wavelet),
            default_config(AlgorithmId::Tv),
        ]),
    );
    let orchestrator = Orchestrator::new(Ledger::in_memory()).with_storage_root(dir.path());
    let summary = orchestrator.run_sweep_parallel(&spec).unwrap();
    assert!(summary.all_succeeded(), "{summary}");

    // every cell rewrote the same noisy frame; the survivor is a whole file
    let noise_dir = dir.path().join(denoise_lab::ledger::canonical_name(&noise));
    let saved = image_io::load(noise_dir.join(format!("{}.png", truth.stem()))).unwrap();
    let (expected, _) = NoiseRegistry::with_defaults().apply_noise(&truth, &noise).unwrap();
    assert_eq!(saved.samples(), expected.samples());
    assert!(noise_dir
        .join(format!("{}.noise_metadata.json", truth.stem()))
        .is_file());

    let mut pending = vec![dir.path().to_path_buf()];
    while let Some(next) = pending.pop() {
        for entry in std::fs::read_dir(next).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let name = path.file_name().unwrap().to_string_lossy().into_owned();
                assert!(!name.starts_with(".tmp"), "leftover {}", path.display());
            }
        }
    }
}

/// Accepts `budget` writes, then fails.
struct FlakyWriter {
    budget: Arc<Mutex<usize>>,
}

impl io::Write for FlakyWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut budget = self.budget.lock().unwrap();
        if *budget == 0 {
            return Err(io::Error::other("disk full"));
        }
        *budget -= 1;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_ledger_failure_aborts_sweep() {
    let writer = FlakyWriter {
        budget: Arc::new(Mutex::new(4)),
    };
    let orchestrator = Orchestrator::new(Ledger::with_writer(Box::new(writer)));
    let spec = SweepSpec::new(
        vec![Image::gradient(16, 16, BitDepth::U8).unwrap()],
        vec![
            NoiseConfig::gaussian(5.0, Seed::new(1)),
            NoiseConfig::gaussian(10.0, Seed::new(1)),
        ],
        DenoisePlan::Explicit(vec![median(3)]),
    );
    let err = orchestrator.run_sweep(&spec).unwrap_err();
    assert!(matches!(err, Error::LedgerIo(_)));
    // first cell complete, second cell stopped after its noise event
    assert_eq!(orchestrator.ledger().len().unwrap(), 4);
}

#[test]
fn test_noise_suite_records_only_noise() {
    let orchestrator = Orchestrator::new(Ledger::in_memory());
    let summary = orchestrator
        .run_noise_suite(
            &[Image::gradient(16, 16, BitDepth::U8).unwrap()],
            &denoise_lab::noise::standard_suite(Seed::new(42)),
        )
        .unwrap();
    assert_eq!(summary.total, 11);
    assert!(summary.all_succeeded());
    let events = orchestrator.ledger().events().unwrap();
    assert!(events.iter().all(|e| e.event_type() == EventType::NoiseApplied));
    assert!(events
        .iter()
        .all(|e| matches!(e.payload(), EventPayload::Noise { .. })));
}
