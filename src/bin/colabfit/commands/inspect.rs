use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use colabfit::AtomicConfiguration;

use crate::cli::InspectArgs;
use crate::display::{Context as DisplayContext, print_element_distribution, print_structure_info};
use crate::io::read_configurations;

pub fn run_inspect(args: InspectArgs, ctx: DisplayContext) -> Result<()> {
    let configurations = read_configurations(&args.file)?;
    if configurations.is_empty() {
        bail!("No structures found in {}", args.file.display());
    }

    if ctx.interactive {
        print_structure_info(&configurations);
        print_element_distribution(&configurations);
    }

    let mut stdout = io::stdout().lock();
    for (index, config) in configurations.iter().enumerate() {
        writeln!(stdout, "{}", frame_line(index, config))
            .context("Failed to write frame summary")?;
    }
    Ok(())
}

fn frame_line(index: usize, config: &AtomicConfiguration) -> String {
    let pbc: String = config
        .pbc()
        .iter()
        .map(|p| if *p { 'T' } else { 'F' })
        .collect();
    format!(
        "{index}\t{}\t{}\t{}\t{pbc}",
        config.id(),
        config.get_chemical_formula(),
        config.nsites()
    )
}
