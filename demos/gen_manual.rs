use clap::CommandFactory;
use clap_complete::{generate_to, Shell};
use clap_mangen::Man;
use proxmox_cloud_rs::cli::Args;
use std::fs;

const BIN: &str = "proxmox-cloud-rs";

/// Writes the man page and shell completions under `assets/`.
fn main() -> std::io::Result<()> {
    let man_dir = "assets/man";
    let comp_dir = "assets/completions";
    fs::create_dir_all(man_dir)?;
    fs::create_dir_all(comp_dir)?;

    let mut cmd = Args::command().name(BIN);
    cmd.build();

    let mut page: Vec<u8> = Vec::new();
    Man::new(cmd.clone()).render(&mut page)?;
    let man_path = format!("{}/{}.1", man_dir, BIN);
    fs::write(&man_path, page)?;
    println!("Wrote {}", man_path);

    for shell in [Shell::Bash, Shell::Zsh, Shell::Fish, Shell::PowerShell] {
        let path = generate_to(shell, &mut cmd, BIN, comp_dir)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}
