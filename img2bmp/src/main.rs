// THEORY:
// img2bmp converts any image the `image` crate can decode into the 1-bit BMP
// the e-paper panel reads, using the same pipeline as the server.
//
//   img2bmp photo.jpg photo.bmp --algorithm hybrid_8x8
//   img2bmp chart.png chart.bmp --direct

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use home_dashboard::core_modules::bitmap::BitmapHeader;
use home_dashboard::{Conversion, DitherAlgorithm, HybridBand, convert};

#[derive(Parser, Debug)]
#[command(name = "img2bmp", version, about = "Dither an image into a 1-bit BMP")]
struct Args {
    /// Source image (PNG, JPEG, ...)
    input: PathBuf,

    /// Destination .bmp
    output: PathBuf,

    /// ordered_8x8, ordered_4x4, hybrid_4x4, hybrid_8x8 or floyd_steinberg
    #[arg(long, default_value_t = DitherAlgorithm::default())]
    algorithm: DitherAlgorithm,

    /// Swap black and white after dithering
    #[arg(long)]
    invert: bool,

    /// Threshold at 50% luminance instead of dithering
    #[arg(long, conflicts_with_all = ["algorithm", "invert"])]
    direct: bool,

    /// Hybrid band: luminance below this is always black (0-65535)
    #[arg(long, default_value_t = HybridBand::DEFAULT.low)]
    low: u16,

    /// Hybrid band: luminance above this is always white (0-65535)
    #[arg(long, default_value_t = HybridBand::DEFAULT.high)]
    high: u16,
}

impl Args {
    fn conversion(&self) -> Conversion {
        if self.direct {
            Conversion::Direct
        } else {
            Conversion::Dither {
                algorithm: self.algorithm,
                invert: self.invert,
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let band = HybridBand {
        low: args.low,
        high: args.high,
    };
    if !band.is_valid() {
        bail!("--low ({}) must be below --high ({})", band.low, band.high);
    }

    let image = image::open(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    log::info!(
        "Loaded {} ({}x{})",
        args.input.display(),
        image.width(),
        image.height()
    );

    let conversion = args.conversion();
    let bytes = convert(&image, conversion, band).context("failed to encode bitmap")?;
    std::fs::write(&args.output, &bytes)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    let header = BitmapHeader::parse(&bytes)?;
    log::info!(
        "Wrote {} ({}x{}, {} bytes, {:?})",
        args.output.display(),
        header.width,
        header.height,
        header.file_size,
        conversion
    );
    Ok(())
}
