//! Build script rendering the sample bot's man page from its CLI definition.

use std::{fs, path::PathBuf};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli.rs"]
mod cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=src/cli.rs");

    let man_dir = PathBuf::from("target/generated-man");
    fs::create_dir_all(&man_dir)?;

    let mut page = Vec::new();
    Man::new(cli::Cli::command()).render(&mut page)?;
    fs::write(man_dir.join("chatnet.1"), page)?;
    Ok(())
}
