// Benchmark timer: runs each `run_*` script against fresh scratch data
// Usage: run_benchmarks [BENCHMARK_DIRS]...

use std::process::ExitCode;

fn main() -> ExitCode {
    golden_harness::cli::run_benchmarks()
}
