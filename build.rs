//! Build script rendering the `linebridge(1)` manual page from the CLI
//! definition.
//!
//! The page lands in `$OUT_DIR/man` unless `LINEBRIDGE_MAN_DIR` names another
//! directory, which packaging scripts use to collect it.

use std::{env, fs, path::PathBuf};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli.rs"]
mod cli;

const MAN_DIR_VAR: &str = "LINEBRIDGE_MAN_DIR";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-env-changed={MAN_DIR_VAR}");

    let out_dir = match env::var_os(MAN_DIR_VAR) {
        Some(dir) => PathBuf::from(dir),
        None => PathBuf::from(env::var_os("OUT_DIR").ok_or("OUT_DIR not set")?).join("man"),
    };
    fs::create_dir_all(&out_dir)?;

    let cmd = cli::Cli::command();
    let name = cmd.get_name().to_owned();
    let mut page: Vec<u8> = Vec::new();
    Man::new(cmd).section("1").render(&mut page)?;
    fs::write(out_dir.join(format!("{name}.1")), page)?;

    Ok(())
}
