use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info};
use wasm_heap::{logging, HeapConfig, HostAllocator, LinearMemory, Strategy};

/// One replayed guest call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Alloc(u32),
    Free(u32),
}

impl Op {
    fn parse(arg: &str) -> Result<Self, String> {
        if let Some(ptr) = arg.strip_prefix("free:") {
            return ptr
                .parse()
                .map(Op::Free)
                .map_err(|e| format!("Invalid pointer `{}`: {}", ptr, e));
        }
        arg.parse()
            .map(Op::Alloc)
            .map_err(|e| format!("Invalid size `{}`: {}", arg, e))
    }
}

#[derive(Debug)]
struct Args {
    config: Option<PathBuf>,
    legacy: bool,
    ops: Vec<Op>,
}

impl Args {
    fn from_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();
        let prog = args.first().map(String::as_str).unwrap_or("heap-sim");

        let mut config = None;
        let mut legacy = false;
        let mut ops = Vec::new();

        let mut iter = args.iter().skip(1);
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--help" | "-h" => return Err(Self::usage(prog)),
                "--legacy" => legacy = true,
                "--config" => {
                    let path = iter.next().ok_or("--config requires a path")?;
                    config = Some(PathBuf::from(path));
                }
                opt if opt.starts_with("--") => {
                    return Err(format!("Unknown option: {}\n\n{}", opt, Self::usage(prog)))
                }
                op => ops.push(Op::parse(op)?),
            }
        }

        if ops.is_empty() {
            return Err(format!("No operations specified\n\n{}", Self::usage(prog)));
        }

        Ok(Self { config, legacy, ops })
    }

    fn usage(prog: &str) -> String {
        format!(
            "heap-sim - replay guest allocator calls against an in-process linear memory\n\n\
            USAGE:\n    {} [OPTIONS] <op>...\n\n\
            OPS:\n    \
            N               allocate N bytes\n    \
            free:P          free pointer P\n\n\
            OPTIONS:\n    \
            -h, --help      Print help information\n    \
            --config FILE   Load heap configuration from a TOML file\n    \
            --legacy        Use the legacy allocation strategy\n\n\
            EXAMPLES:\n    \
            {} 1 100 free:8 1\n    \
            {} --config heap.toml 4096 65536",
            prog, prog, prog
        )
    }
}

fn main() -> ExitCode {
    let args = match Args::from_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Replay `args.ops`. The logging guard is dropped on return, flushing
/// buffered events before `main` reports the outcome.
fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => HeapConfig::from_file(path)?,
        None => HeapConfig::default(),
    };
    if args.legacy {
        config.allocator.strategy = Strategy::Legacy;
    }

    // Without a config file, logging follows the WASM_HEAP_LOG_* environment.
    let _guard = match &args.config {
        Some(_) => logging::init_with_config(config.logging.to_log_config()),
        None => logging::init(),
    };
    info!(strategy = %config.allocator.strategy, heap_base = config.allocator.heap_base, "heap-sim starting");

    let mut host = HostAllocator::from_config(&config)?;

    for op in &args.ops {
        let result = match *op {
            Op::Alloc(size) => host.malloc(size).map(|ptr| println!("alloc {:>10} -> {:#010x}", size, ptr)),
            Op::Free(ptr) => host.free(ptr).map(|()| println!("free  {:#010x}", ptr)),
        };

        if let Err(trap) = result {
            error!(error = %trap, "guest call trapped");
            return Err(trap.into());
        }
    }

    let stats = host.stats();
    debug!(?stats, "final statistics");
    println!("strategy:           {}", host.strategy());
    println!("memory pages:       {}", host.memory().pages());
    println!("bytes allocated:    {}", stats.bytes_allocated);
    println!("peak allocated:     {}", stats.bytes_allocated_peak);
    println!("address space used: {}", stats.address_space_used);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ops() {
        assert_eq!(Op::parse("100"), Ok(Op::Alloc(100)));
        assert_eq!(Op::parse("free:24"), Ok(Op::Free(24)));
        assert!(Op::parse("free:x").is_err());
        assert!(Op::parse("-1").is_err());
    }

    #[test]
    fn trap_is_returned_not_exited() {
        let args = Args {
            config: None,
            legacy: false,
            ops: vec![Op::Alloc(16), Op::Alloc((1 << 25) + 1), Op::Alloc(16)],
        };
        let err = run(&args).unwrap_err();
        assert!(err.to_string().contains("ext_allocator_malloc_version_1"));
    }
}
