//! `adw status [path]`.

use crate::state::StateStore;
use crate::ui;
use anyhow::{bail, Result};
use std::path::PathBuf;

pub fn run(worktree: PathBuf) -> Result<()> {
    let store = StateStore::new(&worktree);
    if !store.exists() {
        bail!("no pipeline state found at {}", worktree.display());
    }
    let state = store.load()?;
    let report = crate::report::build_report(&state);
    println!("{}", ui::render_report(&report));
    Ok(())
}
