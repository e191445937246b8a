use stereoslide::{ConvertConfig, RawScan, SlideConverter};
use std::error::Error;
use std::path::Path;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <scan.tif> <out.jpg> [config.json]", args[0]);
        std::process::exit(2);
    }

    let config = match args.get(3) {
        Some(path) => ConvertConfig::from_json_file(Path::new(path))?,
        None => ConvertConfig::default(),
    };
    let converter = SlideConverter::new(config)?;

    let img = image::open(&args[1])?;
    let conversion = converter.convert(&RawScan::from_dynamic(&img))?;
    let report = &conversion.report;
    println!(
        "Mount confidence {:.3}, skew {:.2}°, split {:?}.",
        report.mount.confidence, report.mount.skew_deg, report.frames.split
    );

    conversion.frame.image().save(&args[2])?;
    println!(
        "Wrote {} ({}x{})",
        args[2],
        conversion.frame.width(),
        conversion.frame.height()
    );
    Ok(())
}
