// Prune - enforce the image-only class directory contract
//
// Scraped or half-downloaded trees can leave HTML pages, partial downloads
// and other junk next to the images. Consumers expect every file under
// <root>/<class>/ to be an image, so anything else is removed.

use std::fs;
use std::path::Path;

use crate::dataset::metadata::is_image;
use crate::error::PipelineError;

/// Remove non-image files from every class directory under `root`
///
/// Only the files directly inside `<root>/<class>/` are considered; files at
/// the root itself and deeper subdirectories are left alone.
///
/// # Returns
/// * `Ok(usize)` - Number of files removed
/// * `Err(FatalConfig)` - `root` is not a directory
/// * `Err(Io)` - A directory could not be listed or a file not removed
pub fn prune_non_images(root: &Path) -> Result<usize, PipelineError> {
    if !root.is_dir() {
        return Err(PipelineError::fatal(format!(
            "prune root {} is not a directory",
            root.display()
        )));
    }

    let mut removed = 0;
    for class_dir in read_dir_paths(root)? {
        if !class_dir.is_dir() {
            continue;
        }
        for file in read_dir_paths(&class_dir)? {
            if file.is_file() && !is_image(&file) {
                fs::remove_file(&file).map_err(|err| PipelineError::io(&file, err))?;
                log::info!("[Prune] Removed {:?}", file);
                removed += 1;
            }
        }
    }

    Ok(removed)
}

fn read_dir_paths(dir: &Path) -> Result<Vec<std::path::PathBuf>, PipelineError> {
    let mut paths = fs::read_dir(dir)
        .map_err(|err| PipelineError::io(dir, err))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| PipelineError::io(dir, err))?;
    paths.sort();
    Ok(paths)
}
