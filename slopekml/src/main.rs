mod options;
mod progress;

use anyhow::Error as AnyError;
use clap::Parser;
use options::Cli;
use slope::{convert_with_progress, output_path, Resolver, StyledTrack};
use std::io::Write;

fn main() -> Result<(), AnyError> {
    let cli = Cli::parse();

    env_logger::init();

    let out = cli.out.clone().unwrap_or_else(|| output_path(&cli.input));
    let resolver = Resolver::new(cli.resolver_config())?;

    println!("[i] {}", cli.input.display());
    let pb = progress::bar("Loading elevations".to_string(), 0);
    let conversion = convert_with_progress(&cli.input, &out, &resolver, |done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    })?;
    pb.finish();

    println!("[i] {} points", conversion.points);
    print_histogram(&conversion.track)?;
    println!("[✓] Saved: {}", conversion.output.display());
    Ok(())
}

fn print_histogram(track: &StyledTrack) -> Result<(), AnyError> {
    let mut stdout = std::io::stdout().lock();
    for (bucket, count) in track.histogram() {
        writeln!(stdout, "{:>14}: {count}", bucket.name())?;
    }
    Ok(())
}
