// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reference host for the RT-Micro-C VM: loads a compiled binary image,
//! runs it against the host-simulation `StdKernel`/`MockPeripherals`
//! backends, and reports status — a stand-in control shell, the way
//! `humility` stands in for a debug-probe-attached control shell in the
//! teacher's own tooling.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use rtmc_hal::MockPeripherals;
use rtmc_rtos::StdKernel;
use rtmc_vm::{Config, VmController};

/// Load and run an RT-Micro-C binary image.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a compiled `.rtmc` binary image.
    image: PathBuf,

    /// Path to a TOML config file (see [`rtmc_vm::Config`]). Defaults are
    /// used for any key the file omits or if no file is given.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable `[RTMC DEBUG]` diagnostics regardless of the config file.
    #[arg(long)]
    debug: bool,

    /// Enable per-instruction trace diagnostics regardless of the config
    /// file. Implies `--debug`.
    #[arg(long)]
    trace: bool,

    /// How long to let the program run before stopping the VM.
    #[arg(long, default_value = "1000")]
    run_ms: u64,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))?
        }
        None => Config::default(),
    };
    config.debug |= args.debug || args.trace;
    config.trace |= args.trace;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let image = std::fs::read(&args.image)
        .with_context(|| format!("reading image file {}", args.image.display()))?;

    let vm = VmController::create(config, StdKernel::new(), MockPeripherals::new());
    vm.load(&image).context("loading image")?;
    vm.run().context("starting VM")?;

    std::thread::sleep(Duration::from_millis(args.run_ms));

    let status = vm.status();
    log::info!(
        "vm stopped: state={:?} tasks={} semaphores={} queues={} free_table_bytes={}",
        status.state,
        status.task_count,
        status.semaphore_count,
        status.queue_count,
        status.free_table_bytes,
    );

    vm.stop().context("stopping VM")?;
    vm.destroy().context("destroying VM")?;
    Ok(())
}
