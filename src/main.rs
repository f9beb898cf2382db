//! milkdrop-eval — simulated frame loop demo.
//!
//! Compiles a small audio-reactive preset block and runs it for a few
//! seconds of simulated frames with a synthetic bass pulse, printing the
//! evolving animation state. No audio hardware or GPU involved; this is
//! the whole compile-once/execute-per-frame lifecycle the renderer drives.

use milkdrop_eval::{EvalContext, Evaluator, FrameContext};

const FPS: f64 = 60.0;
const FRAMES: u32 = 120;
const SEED: u64 = 42;

const FRAME_INIT_CODE: &str = "q1 = 0; q2 = 0";

const PER_FRAME_CODE: &str = "\
    q1 = q1*0.95 + bass*0.05\n\
    q2 = q2*0.9 + treb*0.1\n\
    zoom = 1.0 + q1*0.2 + 0.02*sin(time*0.8)\n\
    rot = rot + 0.002 + q2*0.01\n\
    warp = 1.0 + 0.5*bass_att\n\
    wave_r = 0.5 + 0.5*sin(time)\n\
    wave_g = 0.5 + 0.5*sin(time + 2.1)\n\
    wave_b = 0.5 + 0.5*sin(time + 4.2)";

/// Synthetic audio levels: a beat every half second plus a treble shimmer.
fn drive_audio(ctx: &mut FrameContext, time: f64) {
    let beat = (1.0 - (time * 2.0).fract()).powi(4);
    ctx.bass = beat;
    ctx.mid = 0.3 + 0.2 * (time * 3.0).sin().abs();
    ctx.treb = 0.2 + 0.2 * (time * 13.0).sin().abs();
    ctx.bass_att = 0.7 * ctx.bass_att + 0.3 * ctx.bass;
    ctx.mid_att = 0.7 * ctx.mid_att + 0.3 * ctx.mid;
    ctx.treb_att = 0.7 * ctx.treb_att + 0.3 * ctx.treb;
}

fn main() {
    println!(
        "milkdrop-eval v{} — simulated frame loop",
        env!("CARGO_PKG_VERSION")
    );

    // 1. Compile the preset's equation blocks
    let mut frame_init = Evaluator::new(SEED);
    if let Err(e) = frame_init.compile_block(FRAME_INIT_CODE) {
        eprintln!("frame-init compile failed: {e}");
        std::process::exit(1);
    }

    let mut per_frame = Evaluator::new(SEED);
    if let Err(e) = per_frame.compile_block(PER_FRAME_CODE) {
        eprintln!("per-frame compile failed: {e}");
        std::process::exit(1);
    }

    println!(
        "compiled per-frame block: {} instructions, {} variables",
        per_frame.program().instructions().len(),
        per_frame.program().variables().len()
    );

    // 2. Run frame-init once
    let mut ctx = FrameContext::new();
    ctx.fps = FPS;
    if let Err(e) = frame_init.execute(&mut ctx) {
        eprintln!("frame-init failed: {e}");
        std::process::exit(1);
    }

    // 3. Per-frame loop: audio in, equations, state out
    println!("running {FRAMES} frames at {FPS} fps\n");
    println!("frame    time    bass     q1     zoom      rot   wave_r");

    for frame in 0..FRAMES {
        let time = f64::from(frame) / FPS;
        ctx.time = time;
        ctx.frame = f64::from(frame);
        drive_audio(&mut ctx, time);

        if let Err(e) = per_frame.execute(&mut ctx) {
            eprintln!("frame {frame} failed: {e}");
            std::process::exit(1);
        }

        if frame % 10 == 0 {
            println!(
                "{frame:>5} {time:>7.3} {:>6.3} {:>6.3} {:>8.4} {:>8.4} {:>8.4}",
                ctx.bass,
                ctx.get("q1"),
                ctx.zoom,
                ctx.rot,
                ctx.wave_r
            );
        }
    }

    println!("\ndone — final zoom {:.4}, rot {:.4}", ctx.zoom, ctx.rot);
}
