//! Delete and move commands.

use std::path::Path;

use anyhow::{Context, Result};
use photo_critic::PhotoLibrary;

use super::{Options, open_store};

pub fn delete(dir: &Path, name: &str, options: &Options) -> Result<()> {
    let store = open_store(dir, options);
    let mut library = PhotoLibrary::open(&store)
        .with_context(|| format!("Failed to list photos in {}", dir.display()))?;

    library
        .delete_photo(&store, name)
        .with_context(|| format!("Failed to delete {name}"))?;
    println!("Deleted {name}");
    Ok(())
}

pub fn move_to(dir: &Path, name: &str, to: &Path, options: &Options) -> Result<()> {
    let store = open_store(dir, options);
    let destination = open_store(to, options);
    let mut library = PhotoLibrary::open(&store)
        .with_context(|| format!("Failed to list photos in {}", dir.display()))?;

    library
        .move_photo(&store, name, &destination)
        .with_context(|| format!("Failed to move {name} to {}", to.display()))?;
    println!("Moved {name} to {}", to.display());
    Ok(())
}
