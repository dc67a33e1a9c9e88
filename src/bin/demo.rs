//! demo - seeded synthetic match run through the rally pipeline
//!
//! Generates a scripted detector output (ball flight with dropouts, players,
//! shoe false positives, oversized blobs and one camera cut), feeds it through
//! a synthetic `stub://` video source, and prints the rallies found next to
//! the ones that were planned.

use anyhow::{anyhow, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;

use rally_splitter::detect::{Candidate, DetectionResult, StubBackend};
use rally_splitter::geometry::BoundingBox;
use rally_splitter::ingest::{FileConfig, FileSource, VideoDetectionSource};
use rally_splitter::pipeline::{run_pass, PassOptions};
use rally_splitter::report::{render_rallies, RallyReport, REPORT_FILE_NAME};

const COURT_WIDTH: f32 = 1920.0;
const BALL_SIZE: f32 = 14.0;
const PLAYER_WIDTH: f32 = 120.0;
const PLAYER_HEIGHT: f32 = 360.0;
const PLAYER_CENTER_Y: f32 = 700.0;
const CUT_JUMP: f32 = 800.0;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Length of the synthetic match in seconds.
    #[arg(long, default_value_t = 40)]
    seconds: u32,
    /// Frames per second of the synthetic source.
    #[arg(long, default_value_t = 30)]
    fps: u32,
    /// Seed for the scenario generator.
    #[arg(long, default_value_t = 7)]
    seed: u64,
    /// Write the rally report into this directory.
    #[arg(long)]
    out: Option<PathBuf>,
}

struct Scenario {
    script: Vec<DetectionResult>,
    planned: Vec<(usize, usize)>,
    cut_frame: Option<usize>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let total = frame_total(args.seconds, args.fps)?;

    let fps = f64::from(args.fps);
    let mut rng = StdRng::seed_from_u64(args.seed);
    let scenario = generate(&mut rng, total, fps);

    println!("planned rallies:");
    for (start, end) in &scenario.planned {
        println!(
            "  {:>8.2}s - {:>8.2}s",
            *start as f64 / fps,
            *end as f64 / fps
        );
    }
    if let Some(frame) = scenario.cut_frame {
        println!("camera cut at {:.2}s", frame as f64 / fps);
    }

    let file = FileSource::new(FileConfig {
        synthetic_fps: fps,
        synthetic_frames: total,
        synthetic_width: 64,
        synthetic_height: 36,
        ..FileConfig::new(format!("stub://demo-{}", args.seed))
    })?;
    let backend = StubBackend::with_script(scenario.script);
    let mut source = VideoDetectionSource::open(file, backend)?;

    let opts = PassOptions::default();
    let summary = run_pass(&mut source, &opts, &mut ())?;

    println!("detected rallies:");
    print!("{}", render_rallies(&summary.rallies));
    println!(
        "frames: {} valid, {} absent, {} cuts; rejected {} oversized, {} shoe-zone",
        summary.stats.valid,
        summary.stats.absent,
        summary.stats.teleports,
        summary.stats.rejected_oversized,
        summary.stats.rejected_shoe
    );

    if let Some(out) = &args.out {
        std::fs::create_dir_all(out)?;
        let path = out.join(REPORT_FILE_NAME);
        RallyReport::from_summary(&summary, &opts).write(&path)?;
        println!("report written to {}", path.display());
    }
    Ok(())
}

fn frame_total(seconds: u32, fps: u32) -> Result<usize> {
    if fps == 0 || seconds == 0 {
        return Err(anyhow!("fps and seconds must be >= 1"));
    }
    (seconds as usize)
        .checked_mul(fps as usize)
        .ok_or_else(|| anyhow!("{} seconds at {} fps is too many frames", seconds, fps))
}

fn generate(rng: &mut StdRng, total: usize, fps: f64) -> Scenario {
    let mut script = Vec::with_capacity(total);
    let mut planned = Vec::new();
    let mut cut_frame = None;
    let secs = |s: f64| (s * fps) as usize;

    while script.len() < total {
        let idle = secs(rng.gen_range(1.5..3.5));
        for _ in 0..idle {
            if script.len() >= total {
                break;
            }
            script.push(idle_frame(rng));
        }

        let start = script.len();
        let len = secs(rng.gen_range(3.0..7.0));
        if start + len >= total {
            break;
        }
        // The second rally gets a camera cut halfway through.
        let cut_at = (planned.len() == 1).then_some(start + len / 2);

        let mut ball: (f32, f32) = (rng.gen_range(400.0..1500.0), rng.gen_range(200.0..500.0));
        let mut velocity: (f32, f32) = (rng.gen_range(-12.0..12.0), rng.gen_range(-8.0..8.0));
        let mut dropout = 0u32;
        for frame in start..start + len {
            ball.0 += velocity.0;
            ball.1 += velocity.1;
            if !(100.0..COURT_WIDTH - 100.0).contains(&ball.0) {
                velocity.0 = -velocity.0;
            }
            if !(150.0..600.0).contains(&ball.1) {
                velocity.1 = -velocity.1;
            }
            if Some(frame) == cut_at {
                ball.0 += if ball.0 < COURT_WIDTH / 2.0 {
                    CUT_JUMP
                } else {
                    -CUT_JUMP
                };
                cut_frame = Some(frame);
            }

            if dropout == 0 && rng.gen_bool(0.03) {
                dropout = rng.gen_range(1..=3);
            }
            let mut candidates = players(rng);
            if dropout > 0 {
                dropout -= 1;
            } else {
                candidates.push(Candidate::object(
                    BoundingBox::from_center(ball.0, ball.1, BALL_SIZE, BALL_SIZE),
                    rng.gen_range(0.2..0.9),
                ));
            }
            script.push(DetectionResult::new(candidates));
        }
        planned.push((start, start + len));
    }

    Scenario {
        script,
        planned,
        cut_frame,
    }
}

/// Players standing around, with the occasional shoe or oversized blob
/// reported as a ball.
fn idle_frame(rng: &mut StdRng) -> DetectionResult {
    let mut candidates = players(rng);
    if rng.gen_bool(0.1) {
        let feet_x = candidates[0].center().x;
        let feet_y = candidates[0].bbox.y2 - 30.0;
        candidates.insert(
            0,
            Candidate::object(
                BoundingBox::from_center(feet_x, feet_y, BALL_SIZE, BALL_SIZE),
                0.3,
            ),
        );
    }
    if rng.gen_bool(0.02) {
        candidates.insert(
            0,
            Candidate::object(BoundingBox::from_center(960.0, 300.0, 90.0, 90.0), 0.2),
        );
    }
    DetectionResult::new(candidates)
}

fn players(rng: &mut StdRng) -> Vec<Candidate> {
    [480.0f32, 1440.0]
        .iter()
        .map(|x| {
            let cx = *x + rng.gen_range(-40.0f32..40.0);
            Candidate::agent(
                BoundingBox::from_center(cx, PLAYER_CENTER_Y, PLAYER_WIDTH, PLAYER_HEIGHT),
                0.8,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_total_multiplies_without_wrapping() {
        assert_eq!(frame_total(40, 30).unwrap(), 1200);
        assert!(frame_total(0, 30).is_err());
        assert!(frame_total(40, 0).is_err());

        // u32 * u32 always fits a 64-bit usize.
        if usize::BITS >= 64 {
            assert_eq!(
                frame_total(u32::MAX, 60).unwrap(),
                u32::MAX as usize * 60
            );
        } else {
            assert!(frame_total(u32::MAX, 60).is_err());
        }
    }

    #[test]
    fn planned_rallies_fit_inside_the_match() {
        let total = frame_total(20, 10).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let scenario = generate(&mut rng, total, 10.0);
        assert!(scenario.script.len() <= total);
        assert!(scenario.planned.iter().all(|(start, end)| start < end && *end <= total));
    }
}
