//! audiox CLI
//!
//! Thin front-end over the library: probe files, copy streams between
//! containers, extract raw packet payloads, and dump metadata.

use anyhow::Context;
use audiox::convert::{parse_time_spec, Conversion, ConversionOptions};
use audiox::format::{default_registry, detect_format, open_input, open_output};
use audiox::io::{Source, Target};
use audiox::{init, Config};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "audiox")]
#[command(about = "audiox - audio container toolkit", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show format, duration, and per-track summary for a file or URL
    Info {
        /// Input path or http(s) URL
        input: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Copy the audio stream of one container into another
    Convert {
        /// Input path or http(s) URL
        input: String,

        /// Output file path (format chosen by extension)
        output: PathBuf,

        /// Output codec override (e.g. pcm, mp3, aac, opus)
        #[arg(long)]
        codec: Option<String>,

        /// Output bitrate in kbps (e.g. 128 or 128k)
        #[arg(long)]
        bitrate: Option<String>,

        /// Output sample rate override
        #[arg(long)]
        sample_rate: Option<u32>,

        /// Output channel-count override
        #[arg(long)]
        channels: Option<u16>,

        /// Start time (HH:MM:SS or seconds)
        #[arg(long)]
        start: Option<String>,

        /// End time (HH:MM:SS or seconds)
        #[arg(long)]
        end: Option<String>,
    },

    /// Concatenate raw packet payloads to a file
    Extract {
        /// Input path or http(s) URL
        input: String,

        /// Output file path (defaults to <input>.raw)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write bare payload bytes without any container framing
        #[arg(long)]
        raw: bool,
    },

    /// List supported formats
    Formats,

    /// Dump file metadata
    Metadata {
        /// Input path or http(s) URL
        input: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the version
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init(&Config {
        verbose: cli.verbose,
        ..Default::default()
    })?;

    match cli.command {
        Commands::Info { input, json } => cmd_info(&input, json),
        Commands::Convert {
            input,
            output,
            codec,
            bitrate,
            sample_rate,
            channels,
            start,
            end,
        } => cmd_convert(
            &input,
            &output,
            codec,
            bitrate,
            sample_rate,
            channels,
            start,
            end,
            cli.verbose,
        ),
        Commands::Extract { input, output, raw } => cmd_extract(&input, output, raw),
        Commands::Formats => cmd_formats(),
        Commands::Metadata { input, json } => cmd_metadata(&input, json),
        Commands::Version => {
            println!("audiox {}", audiox::VERSION);
            Ok(())
        }
    }
}

fn cmd_info(input: &str, json: bool) -> anyhow::Result<()> {
    let format = detect_format(Source::from_address(input))?
        .with_context(|| format!("cannot detect the format of '{}'", input))?;
    let mut demuxer = open_input(Source::from_address(input))?;
    let duration = demuxer.duration();

    if json {
        let value = serde_json::json!({
            "input": input,
            "format": format,
            "duration": duration,
            "tracks": demuxer.tracks(),
            "metadata": demuxer.metadata(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("Input:    {}", input);
        println!("Format:   {}", format);
        match duration {
            Some(d) => println!("Duration: {:.3} s", d),
            None => println!("Duration: unknown"),
        }
        for track in demuxer.tracks() {
            print!(
                "Track {}: {}, {} Hz, {} ch",
                track.id, track.codec, track.sample_rate, track.channels
            );
            if let Some(bits) = track.bit_depth {
                print!(", {} bit", bits);
            }
            if let Some(bitrate) = track.bitrate {
                print!(", {} kb/s", bitrate / 1000);
            }
            println!();
        }
        if let Some(title) = &demuxer.metadata().title {
            println!("Title:    {}", title);
        }
        if let Some(artist) = &demuxer.metadata().artist {
            println!("Artist:   {}", artist);
        }
    }
    demuxer.close()?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_convert(
    input: &str,
    output: &PathBuf,
    codec: Option<String>,
    bitrate: Option<String>,
    sample_rate: Option<u32>,
    channels: Option<u16>,
    start: Option<String>,
    end: Option<String>,
    verbose: bool,
) -> anyhow::Result<()> {
    let extension = output
        .extension()
        .and_then(|e| e.to_str())
        .with_context(|| format!("output '{}' has no extension", output.display()))?;

    let start_time = match start {
        Some(s) => Some(parse_time_spec(&s).with_context(|| format!("bad --start '{}'", s))?),
        None => None,
    };
    let end_time = match end {
        Some(s) => Some(parse_time_spec(&s).with_context(|| format!("bad --end '{}'", s))?),
        None => None,
    };

    let options = ConversionOptions {
        start_time,
        end_time,
        codec,
        sample_rate,
        channels,
        bit_depth: None,
        bitrate: bitrate
            .map(|b| parse_bitrate(&b).with_context(|| format!("bad --bitrate '{}'", b)))
            .transpose()?,
    };

    let demuxer = open_input(Source::from_address(input))?;
    let muxer = open_output(extension, Target::file(output.clone()))?;

    let mut conversion = Conversion::new(demuxer, muxer, options);
    if verbose {
        conversion.on_progress(Box::new(|p| {
            eprint!(
                "\r{:5.1}%  {:8.2}s / {:.2}s  {} kB in",
                p.percentage,
                p.current_time,
                p.total_time,
                p.input_bytes / 1024
            );
            let _ = std::io::stderr().flush();
        }));
    }
    conversion.initialize()?;
    conversion.execute()?;
    conversion.close()?;
    if verbose {
        eprintln!();
    }
    info!("wrote {}", output.display());
    Ok(())
}

fn cmd_extract(input: &str, output: Option<PathBuf>, raw: bool) -> anyhow::Result<()> {
    let mut demuxer = open_input(Source::from_address(input))?;
    let track = demuxer
        .primary_track()
        .cloned()
        .context("input has no audio track")?;

    // Default name: --raw gets a .raw suffix, otherwise the codec name
    // (frame-stream codecs like mp3/aac stay directly playable).
    let output = output.unwrap_or_else(|| {
        let mut path = PathBuf::from(input);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "extracted".to_string());
        let extension = if raw { "raw" } else { track.codec.as_str() };
        path.set_file_name(format!("{}.{}", stem, extension));
        path
    });

    let mut file = std::fs::File::create(&output)
        .with_context(|| format!("cannot create '{}'", output.display()))?;
    let mut bytes = 0u64;
    while let Some(packet) = demuxer.read_packet(track.id)? {
        file.write_all(&packet.data)?;
        bytes += packet.data.len() as u64;
    }
    file.flush()?;
    demuxer.close()?;
    println!("{} bytes -> {}", bytes, output.display());
    Ok(())
}

fn cmd_formats() -> anyhow::Result<()> {
    let registry = default_registry();
    println!("Demuxers:");
    for format in registry.inputs() {
        println!(
            "  {:6} {:24} [{}]",
            format.name(),
            format.mime(),
            format.extensions().join(", ")
        );
    }
    println!("Muxers:");
    for format in registry.outputs() {
        println!(
            "  {:6} {:24} [{}]",
            format.name(),
            format.mime(),
            format.extensions().join(", ")
        );
    }
    Ok(())
}

fn cmd_metadata(input: &str, json: bool) -> anyhow::Result<()> {
    let mut demuxer = open_input(Source::from_address(input))?;
    let metadata = demuxer.metadata().clone();
    if json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
    } else if metadata.is_empty() {
        println!("(no metadata)");
    } else {
        let print_field = |name: &str, value: &Option<String>| {
            if let Some(v) = value {
                println!("{:13} {}", name, v);
            }
        };
        print_field("title:", &metadata.title);
        print_field("artist:", &metadata.artist);
        print_field("album:", &metadata.album);
        print_field("album_artist:", &metadata.album_artist);
        print_field("composer:", &metadata.composer);
        print_field("genre:", &metadata.genre);
        print_field("comment:", &metadata.comment);
        print_field("copyright:", &metadata.copyright);
        print_field("encoder:", &metadata.encoder);
        print_field("date:", &metadata.date);
        print_field("isrc:", &metadata.isrc);
        if let Some(year) = metadata.year {
            println!("{:13} {}", "year:", year);
        }
        if let Some(n) = metadata.track_number {
            match metadata.track_total {
                Some(total) => println!("{:13} {}/{}", "track:", n, total),
                None => println!("{:13} {}", "track:", n),
            }
        }
        for art in &metadata.cover_art {
            println!(
                "{:13} {} ({} bytes)",
                "cover_art:",
                art.mime_type,
                art.data.len()
            );
        }
        for (key, value) in &metadata.custom {
            println!("{:13} {}", format!("{}:", key.to_lowercase()), value);
        }
    }
    demuxer.close()?;
    Ok(())
}

/// Parse a bitrate spec in kbps: `128`, `128k`, or `0.5m`
fn parse_bitrate(spec: &str) -> Option<u64> {
    let spec = spec.trim().to_lowercase();
    if let Some(mega) = spec.strip_suffix('m') {
        return mega.parse::<f64>().ok().map(|v| (v * 1_000_000.0) as u64);
    }
    let kilo = spec.strip_suffix('k').unwrap_or(&spec);
    kilo.parse::<f64>().ok().map(|v| (v * 1000.0) as u64)
}
