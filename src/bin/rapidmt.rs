extern crate argparse;
extern crate env_logger;
extern crate log;
extern crate rand;
extern crate rayon;
extern crate rapidtape;

use argparse::{ArgumentParser, Store};
use std::{env, io};
use rapidtape::{tuning, units};

#[cfg(any(target_os = "linux", windows))]
use std::{fs, time};

#[cfg(any(target_os = "linux", windows))]
use std::io::{Read, Write};

#[cfg(any(target_os = "linux", windows))]
use log::info;

#[cfg(any(target_os = "linux", windows))]
use rand::{random, SeedableRng};

#[cfg(any(target_os = "linux", windows))]
use rand::rngs::StdRng;

#[cfg(any(target_os = "linux", windows))]
use rayon::prelude::*;

#[cfg(any(target_os = "linux", windows))]
use rapidtape::blocking::BlockingWriter;

#[cfg(any(target_os = "linux", windows))]
use rapidtape::drive::TapeDrive;

#[cfg(any(target_os = "linux", windows))]
use rapidtape::stream::{stream, DigestWriter, RandomReader};

#[cfg(any(target_os = "linux", windows))]
use rapidtape::tape::{open_tape, NativeTapeDevice, VARIABLE_BLOCK_SIZE};

#[derive(Copy, Clone, Debug)]
enum Control {
    Rewind,
    EndOfData,
    Filemarks(u32),
    SetBlockSize(u32),
    Status,
}

fn invalid_input<S: Into<String>>(message: S) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, message.into())
}

/// Interpret a control command and it's argument, if `command` is one.
fn parse_control(command: &str, argument: &str) -> io::Result<Option<Control>> {
    Ok(Some(match command {
        "rewind" => Control::Rewind,
        "eod" => Control::EndOfData,
        "weof" | "eof" => match argument {
            "" => Control::Filemarks(1),
            count => Control::Filemarks(count.parse().map_err(|_| invalid_input(format!("{} is not a filemark count", count)))?),
        },
        "setblk" => {
            let size : units::DataSize<u32> = argument.parse().map_err(|e| invalid_input(format!("setblk: {}", e)))?;

            Control::SetBlockSize(size.into_inner())
        },
        "status" => Control::Status,
        _ => return Ok(None),
    }))
}

/// Split a `-f` or `$TAPE` value into device names.
fn device_list(names: &str) -> Vec<String> {
    names.split(',').map(|name| name.trim()).filter(|name| !name.is_empty()).map(|name| name.to_string()).collect()
}

#[cfg(any(target_os = "linux", windows))]
fn open_drive(name: &str) -> io::Result<TapeDrive<NativeTapeDevice>> {
    Ok(TapeDrive::new(open_tape(name)?)?)
}

/// Run one control command against one drive.
///
/// Returns the text to report for the drive, if any.
#[cfg(any(target_os = "linux", windows))]
fn control(name: &str, operation: Control) -> io::Result<Option<String>> {
    let mut tape = open_drive(name)?;

    let report = match operation {
        Control::Rewind => { tape.rewind()?; None },
        Control::EndOfData => { tape.space_to_end_of_data()?; None },
        Control::Filemarks(count) => { tape.write_filemarks(count)?; None },
        Control::SetBlockSize(size) => { tape.set_block_size(size)?; None },
        Control::Status => Some(format!("{}:\n{}", name, tape.status()?)),
    };

    tape.close()?;

    Ok(report)
}

/// Record size to block tape writes with: the drive's own block size, or the
/// configured record size if the drive takes variable blocks.
#[cfg(any(target_os = "linux", windows))]
fn record_size_for(tape: &mut TapeDrive<NativeTapeDevice>, config: &tuning::Configuration) -> io::Result<usize> {
    Ok(match tape.block_size()? {
        VARIABLE_BLOCK_SIZE => config.record_size,
        block_size => block_size as usize,
    })
}

/// Read the tape into `sink` until end of data.
///
/// Every read is given the whole buffer, since a variable block longer than
/// the read is cut short by the drive.
#[cfg(any(target_os = "linux", windows))]
fn drain_tape<W: Write>(tape: &mut TapeDrive<NativeTapeDevice>, sink: &mut W, buffer_size: usize) -> io::Result<u64> {
    let mut buf = vec![0; buffer_size];
    let mut total = 0;

    loop {
        let count = tape.reader().read(&mut buf)?;
        if count == 0 {
            break;
        }

        sink.write_all(&buf[..count])?;
        total += count as u64;
    }

    Ok(total)
}

/// Copy `source` onto the tape in whole records and end it with a filemark.
#[cfg(any(target_os = "linux", windows))]
/// Write `source` to the tape as one file and return its length and SHA-1.
fn fill_tape<R: Read + Send>(tape: &mut TapeDrive<NativeTapeDevice>, source: &mut R, limit: Option<u64>, config: &tuning::Configuration) -> io::Result<(u64, String)> {
    let record_size = record_size_for(tape, config)?;
    let buffer_size = config.buffer_size_for(record_size);

    let (written, digest) = {
        let mut digest = DigestWriter::new(BlockingWriter::new(tape.writer(), record_size, buffer_size)?);
        info!("Writing {}-byte records", digest.get_ref().record_size());

        let written = stream(source, &mut digest, Some(config.copy_buffer), limit).complete()?;

        digest.flush()?;
        (written, digest.hex_digest())
    };

    tape.write_filemark()?;

    Ok((written, digest))
}

/// Compares everything written to it against a seeded random stream.
#[cfg(any(target_os = "linux", windows))]
struct Verifier {
    expected: RandomReader<StdRng>,
    remaining: u64,
    scratch: Vec<u8>,
    mismatch: Option<u64>,
    checked: u64,
}

#[cfg(any(target_os = "linux", windows))]
impl Write for Verifier {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        //Anything past the written volume is record padding.
        let compared = (buf.len() as u64).min(self.remaining) as usize;

        self.scratch.resize(compared, 0);
        self.expected.read_exact(&mut self.scratch)?;

        if self.mismatch.is_none() {
            if let Some(index) = self.scratch.iter().zip(buf.iter()).position(|(a, b)| a != b) {
                self.mismatch = Some(self.checked + index as u64);
            }
        }

        self.remaining -= compared as u64;
        self.checked += compared as u64;

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(any(target_os = "linux", windows))]
fn run(devices: &[String], command: &str, argument: &str, filename: &str, config: &tuning::Configuration) -> io::Result<()> {
    if let Some(operation) = parse_control(command, argument)? {
        let reports : Vec<io::Result<Option<String>>> = devices.par_iter().map(|name| control(name, operation)).collect();
        let mut last_error = None;

        for (name, report) in devices.iter().zip(reports.into_iter()) {
            match report {
                Ok(Some(text)) => println!("{}", text),
                Ok(None) => info!("{:?} done on {}", operation, name),
                Err(e) => {
                    eprintln!("{} failed on {}: {}", command, name, e);
                    last_error = Some(e);
                }
            }
        }

        return match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        };
    }

    if devices.len() > 1 {
        return Err(invalid_input(format!("Command {} takes exactly one device", command)));
    }

    let mut tape = open_drive(&devices[0])?;

    match command {
        "read" => {
            let buffer_size = config.buffer_size_for(record_size_for(&mut tape, config)?);
            let count = match filename {
                "-" => drain_tape(&mut tape, &mut io::stdout(), buffer_size)?,
                name => drain_tape(&mut tape, &mut fs::File::create(name)?, buffer_size)?,
            };

            eprintln!("Read {} from {}", units::DataSize::from(count), devices[0]);
        },
        "write" => {
            let (count, digest) = match filename {
                "-" => fill_tape(&mut tape, &mut io::stdin(), None, config)?,
                name => fill_tape(&mut tape, &mut fs::File::open(name)?, None, config)?,
            };

            eprintln!("Wrote {} to {}", units::DataSize::from(count), devices[0]);
            eprintln!("SHA-1: {}", digest);
        },
        "test" => {
            let seed = random::<u64>();

            tape.rewind()?;
            let (written, _) = fill_tape(&mut tape, &mut RandomReader::from_rng(StdRng::seed_from_u64(seed)), Some(config.test_size), config)?;
            eprintln!("Wrote {} of test data", units::DataSize::from(written));

            tape.rewind()?;
            let buffer_size = config.buffer_size_for(record_size_for(&mut tape, config)?);
            let mut verifier = Verifier {
                expected: RandomReader::from_rng(StdRng::seed_from_u64(seed)),
                remaining: written,
                scratch: Vec::new(),
                mismatch: None,
                checked: 0,
            };
            let read = drain_tape(&mut tape, &mut verifier, buffer_size)?;
            eprintln!("Read back {}", units::DataSize::from(read));

            if let Some(offset) = verifier.mismatch {
                return Err(io::Error::new(io::ErrorKind::InvalidData, format!("Test data differs at byte {}", offset)));
            }

            if verifier.checked < written {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, format!("Only {} of {} test bytes came back", verifier.checked, written)));
            }
        },
        "speed" => {
            let start_instant = time::Instant::now();
            let (written, digest) = match filename {
                "-" => fill_tape(&mut tape, &mut io::stdin(), None, config)?,
                name => fill_tape(&mut tape, &mut fs::File::open(name)?, None, config)?,
            };
            let write_time = start_instant.elapsed();

            let float_secs = write_time.as_secs() as f64 + write_time.subsec_nanos() as f64 / 1_000_000_000.0;
            let rate = units::DataSize::from(written as f64 / float_secs);
            let displayable_time = units::HRDuration::from(write_time);

            eprintln!("Wrote {} in {} ({}/s)", units::DataSize::from(written), displayable_time, rate);
            eprintln!("SHA-1: {}", digest);
        },
        _ => return Err(invalid_input(format!("Command {} not recognized", command))),
    }

    tape.close()?;

    Ok(())
}

#[cfg(not(any(target_os = "linux", windows)))]
fn run(_devices: &[String], command: &str, argument: &str, _filename: &str, _config: &tuning::Configuration) -> io::Result<()> {
    parse_control(command, argument)?;

    Err(io::Error::new(io::ErrorKind::Other, "No tape backend exists for this platform"))
}

fn main() -> io::Result<()> {
    env_logger::init();

    //Here's some configuration!
    let mut config = tuning::Configuration::default();
    let mut tapenames = env::var("TAPE").unwrap_or("".to_string());
    let mut command = "".to_string();
    let mut argument = "".to_string();
    let mut filename = "-".to_string();
    let mut buffer_size = units::DataSize::from(config.buffer_size);
    let mut record_size = units::DataSize::from(config.record_size);
    let mut test_size = units::DataSize::from(config.test_size);

    {
        let mut ap = ArgumentParser::new();

        ap.set_description("Maintenance utility for tape drives");

        ap.refer(&mut tapenames).add_option(&["-f"], Store, "The tape device(s) to control, separated by commas (otherwise reads $TAPE)");
        ap.refer(&mut filename).add_option(&["-o"], Store, "A file to transfer data to or from. (Use - or don't specify for stdio)");
        ap.refer(&mut buffer_size).add_option(&["--bs"], Store, "How much data to collect before each transfer to the tape.");
        ap.refer(&mut record_size).add_option(&["--record-size"], Store, "The record size to write in when the drive uses variable blocks.");
        ap.refer(&mut test_size).add_option(&["--test-size"], Store, "How much random data the test command writes.");
        ap.refer(&mut command).add_argument("operation", Store, "The command to issue to the tape drive (rewind, eod, weof, setblk, status, read, write, test, speed).");
        ap.refer(&mut argument).add_argument("argument", Store, "Filemark count for weof, block size for setblk.");

        ap.parse_args_or_exit();
    }

    config.buffer_size = buffer_size.into_inner();
    config.record_size = record_size.into_inner();
    config.test_size = test_size.into_inner();

    if config.buffer_size == 0 || config.record_size == 0 {
        return Err(invalid_input("Buffer and record sizes must be greater than zero"));
    }

    let devices = device_list(&tapenames);
    if devices.is_empty() {
        return Err(invalid_input("Please specify a device name, either with -f or TAPE environment variable"));
    }

    run(&devices, &command, &argument, &filename, &config)
}
