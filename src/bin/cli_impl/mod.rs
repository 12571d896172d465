use std::env;
use std::fs::File;
use std::io::{self, Read, Write};

use memmap2::{Mmap, MmapOptions};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sqlmend::{check_balance, repair_bytes, RepairOptions, WrapMode};

enum InputData {
    Owned(Vec<u8>),
    Mapped { _file: File, mmap: Mmap },
}

impl InputData {
    fn as_bytes(&self) -> &[u8] {
        match self {
            InputData::Owned(v) => v.as_slice(),
            InputData::Mapped { mmap, .. } => mmap.as_ref(),
        }
    }
}

fn read_input(input_path: Option<&str>, no_mmap: bool) -> io::Result<InputData> {
    match input_path {
        Some("-") | None => {
            let mut buf: Vec<u8> = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            Ok(InputData::Owned(buf))
        }
        Some(p) => {
            if no_mmap {
                return Ok(InputData::Owned(std::fs::read(p)?));
            }
            let file = File::open(p)?;
            let len = file.metadata()?.len();
            if len == 0 {
                return Ok(InputData::Owned(Vec::new()));
            }
            let mmap = unsafe { MmapOptions::new().map(&file)? };
            Ok(InputData::Mapped { _file: file, mmap })
        }
    }
}

fn parse_wrap(arg: &str) -> Option<WrapMode> {
    match arg {
        "auto" => Some(WrapMode::Auto),
        "never" => Some(WrapMode::Never),
        "always" => Some(WrapMode::Always),
        _ => None,
    }
}

fn parse_ids(arg: &str) -> Option<Vec<u64>> {
    arg.split(',')
        .map(|s| s.trim().parse::<u64>().ok())
        .collect()
}

fn write_output(path: Option<&str>, content: &str) -> io::Result<()> {
    match path {
        Some("-") | None => {
            io::stdout().write_all(content.as_bytes())?;
            Ok(())
        }
        Some(p) => std::fs::write(p, content),
    }
}

pub fn run() -> i32 {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let bin = env::args().next().unwrap_or_else(|| "sqlmend".to_string());

    let mut input_path: Option<String> = None;
    let mut output_path: Option<String> = None;
    let mut report_path: Option<String> = None;
    let mut wrap = WrapMode::Auto;
    let mut append_language = false;
    let mut ensure_language = false;
    let mut select_ids: Option<Vec<u64>> = None;
    let mut check = false;
    let mut no_mmap = false;

    let args = env::args().skip(1).collect::<Vec<_>>();
    let mut i = 0;
    while i < args.len() {
        let a = &args[i];
        match a.as_str() {
            "--input" | "-i" => {
                i += 1;
                input_path = Some(args.get(i).expect("missing --input value").to_string());
            }
            "--output" | "-o" => {
                i += 1;
                output_path = Some(args.get(i).expect("missing --output value").to_string());
            }
            "--report" => {
                i += 1;
                report_path = Some(args.get(i).expect("missing --report value").to_string());
            }
            "--wrap" => {
                i += 1;
                let v = args.get(i).expect("missing --wrap value");
                wrap = match parse_wrap(v) {
                    Some(w) => w,
                    None => {
                        eprintln!("invalid --wrap value: {v} (expected auto|never|always)");
                        return 2;
                    }
                };
            }
            "--append-language" => append_language = true,
            "--ensure-language" => ensure_language = true,
            "--ids" => {
                i += 1;
                let v = args.get(i).expect("missing --ids value");
                select_ids = match parse_ids(v) {
                    Some(ids) => Some(ids),
                    None => {
                        eprintln!("invalid --ids value: {v} (expected N[,N...])");
                        return 2;
                    }
                };
            }
            "--check" => check = true,
            "--no-mmap" => no_mmap = true,
            "--help" | "-h" => {
                eprintln!(
                    "Usage: {bin} [--input FILE|-] [--output FILE|-] [--report FILE]\n\
                     \x20               [--wrap auto|never|always] [--append-language]\n\
                     \x20               [--ensure-language] [--ids N[,N...]] [--check] [--no-mmap]\n\
                     Reads stdin if no --input; writes the repaired SQL to --output\n\
                     (stdout by default). --check audits balance without rewriting."
                );
                return 0;
            }
            _ => {
                eprintln!("Unknown arg: {a}");
                return 2;
            }
        }
        i += 1;
    }

    let input = match read_input(input_path.as_deref(), no_mmap) {
        Ok(v) => v,
        Err(e) => {
            let p = input_path.as_deref().unwrap_or("-");
            eprintln!("failed to read input ({p}): {e}");
            return 2;
        }
    };

    if check {
        let text = match std::str::from_utf8(input.as_bytes()) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("input is not valid UTF-8: {e}");
                return 2;
            }
        };
        let report = check_balance(text);
        println!(
            "{}",
            serde_json::to_string_pretty(&report).expect("balance report serializes")
        );
        return 0;
    }

    let opt = RepairOptions {
        wrap,
        append_language,
        ensure_language,
        select_ids,
    };
    let repaired = match repair_bytes(input.as_bytes(), &opt) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{e}");
            return e.exit_code();
        }
    };

    if let Err(e) = write_output(output_path.as_deref(), &repaired.output) {
        let p = output_path.as_deref().unwrap_or("-");
        eprintln!("failed to write output ({p}): {e}");
        return 2;
    }

    if let Some(p) = report_path.as_deref() {
        let json =
            serde_json::to_string_pretty(&repaired.report).expect("repair report serializes");
        if let Err(e) = std::fs::write(p, json) {
            eprintln!("failed to write report ({p}): {e}");
            return 2;
        }
    }

    info!(
        blocks = repaired.report.blocks_scanned,
        changed = repaired.report.blocks_changed,
        skipped = repaired.report.blocks_skipped,
        dropped = repaired.report.orphan_closers_dropped,
        synthesized = repaired.report.closers_synthesized,
        "repair finished"
    );
    0
}
