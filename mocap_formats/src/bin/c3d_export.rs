use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mocap_formats::{C3dFile, C3dFrame, C3dHeader};

#[derive(Parser, Debug)]
#[command(about = "Dump a C3D motion-capture file as tab-separated text", version)]
struct Args {
    /// C3D file to export
    input: PathBuf,

    /// Destination text file (stdout when omitted)
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Skip the analog samples at the end of each row
    #[arg(long)]
    no_analog: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut c3d = C3dFile::open(&args.input)?;
    let header = *c3d.header();

    let mut writer: Box<dyn Write> = match args.output.as_ref() {
        Some(path) => Box::new(BufWriter::new(File::create(path).with_context(|| {
            format!("creating output file {}", path.display())
        })?)),
        None => Box::new(io::stdout().lock()),
    };

    write_header_row(&mut writer, &header, args.no_analog)?;

    let mut frame_index = header.first_frame as usize;
    while let Some(frame) = c3d.next_frame()? {
        write_frame_row(&mut writer, frame_index, &frame, args.no_analog)?;
        frame_index += 1;
    }
    writer.flush().context("flushing export output")?;

    eprintln!(
        "Exported {} frames ({} markers @ {} Hz) from {}",
        header.frame_count(),
        header.point_count,
        header.frame_rate,
        args.input.display()
    );
    Ok(())
}

fn write_header_row(writer: &mut dyn Write, header: &C3dHeader, no_analog: bool) -> Result<()> {
    write!(writer, "frame")?;
    for marker in 0..header.point_count {
        write!(writer, "\tm{marker}.x\tm{marker}.y\tm{marker}.z\tm{marker}.w")?;
    }
    if !no_analog {
        for channel in 0..header.analog_per_frame {
            write!(writer, "\ta{channel}")?;
        }
    }
    writeln!(writer)?;
    Ok(())
}

fn write_frame_row(
    writer: &mut dyn Write,
    frame_index: usize,
    frame: &C3dFrame,
    no_analog: bool,
) -> Result<()> {
    write!(writer, "{frame_index}")?;
    for point in &frame.points {
        write!(
            writer,
            "\t{:.4}\t{:.4}\t{:.4}\t{:.4}",
            point.x, point.y, point.z, point.residual
        )?;
    }
    if !no_analog {
        for sample in &frame.analog {
            write!(writer, "\t{sample:.4}")?;
        }
    }
    writeln!(writer)?;
    Ok(())
}
