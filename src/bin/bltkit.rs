use std::path::PathBuf;

use anyhow::Context as _;
use bltkit::{
    BlendMode, BltDevice, BltParams, BufferDesc, DitherMode, Engine, EngineConfig, PixelBuffer,
    PixelFormat, Rect, ScaleMode, SurfaceGeometry,
};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "bltkit", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a packed mode word and print it as JSON.
    Decode(DecodeArgs),
    /// Run a source-over blit and write the destination as a PNG.
    Demo(DemoArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum WordKind {
    Blend,
    Scale,
    Dither,
}

#[derive(Parser, Debug)]
struct DecodeArgs {
    /// Which mode word to decode.
    #[arg(value_enum)]
    kind: WordKind,

    /// Word value, decimal or `0x`-prefixed hex.
    #[arg(value_parser = parse_word)]
    value: u32,
}

#[derive(Parser, Debug)]
struct DemoArgs {
    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Surface edge length in pixels.
    #[arg(long, default_value_t = 64)]
    size: u32,

    /// Engine configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Queue the blit and wait on its ticket.
    #[arg(long = "async", default_value_t = false)]
    run_async: bool,
}

fn parse_word(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid mode word '{s}': {e}"))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Decode(args) => cmd_decode(args),
        Command::Demo(args) => cmd_demo(args),
    }
}

fn cmd_decode(args: DecodeArgs) -> anyhow::Result<()> {
    let raw = format!("{:#010x}", args.value);
    let doc = match args.kind {
        WordKind::Blend => {
            let desc = BlendMode(args.value).decode()?;
            serde_json::json!({ "raw": raw, "blend": desc })
        }
        WordKind::Scale => {
            let desc = ScaleMode(args.value).decode()?;
            serde_json::json!({ "raw": raw, "scale": desc, "resolved": desc.resolve() })
        }
        WordKind::Dither => {
            let desc = DitherMode(args.value).decode()?;
            serde_json::json!({ "raw": raw, "dither": desc, "resolved": desc.resolve() })
        }
    };
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

fn cmd_demo(args: DemoArgs) -> anyhow::Result<()> {
    anyhow::ensure!(args.size >= 1, "--size must be >= 1");
    let config = match &args.config {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::default(),
    };
    let engine = Engine::new(config)?;

    let n = args.size;
    let geom = SurfaceGeometry::packed(PixelFormat::Rgba8888, n, n);
    let rect = Rect::new(0, 0, n, n);

    // Opaque blue-to-red ramp under a translucent green checkerboard.
    let mut backdrop = Vec::with_capacity((n * n * 4) as usize);
    let mut overlay = Vec::with_capacity((n * n * 4) as usize);
    for y in 0..n {
        for x in 0..n {
            let t = (x * 255 / n.max(2).saturating_sub(1)).min(255) as u8;
            backdrop.extend_from_slice(&[t, 0, 255 - t, 255]);
            let px: [u8; 4] = if ((x / 8) + (y / 8)) % 2 == 0 {
                [0, 255, 0, 128]
            } else {
                [0; 4]
            };
            overlay.extend_from_slice(&px);
        }
    }
    let dst_buf = PixelBuffer::from_vec(backdrop);
    let src_buf = PixelBuffer::from_vec(overlay);
    let dst = engine.map(&BufferDesc::new(&dst_buf))?;
    let src = engine.map(&BufferDesc::new(&src_buf))?;

    let mut params = BltParams::blend(BlendMode::SRC1OVER)
        .with_dst(dst, geom.clone(), rect)
        .with_src1(src, geom.clone(), rect)
        .with_src2(dst, geom, rect);
    if args.run_async {
        params = params.with_async(None, 1);
    }
    let outcome = engine.blt(params)?;
    if let Some(ticket) = outcome.into_ticket() {
        ticket.wait()?;
    }
    engine.unmap(src)?;
    engine.unmap(dst)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &dst_buf.to_vec()?,
        n,
        n,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}
