//! Filesystem scanning of the photo tree.
//!
//! The media root is expected to look like this:
//!
//! ```text
//! media/                           # Media root
//! ├── 2019/                        # Year folder
//! │   ├── 2019_07_14 Seaside/      # Event (album)
//! │   │   ├── IMG_0001.jpg
//! │   │   ├── IMG_0002.JPG
//! │   │   └── raw/                 # Nested folders are walked too
//! │   │       └── IMG_0002.png
//! │   └── @eaDir/                  # NAS housekeeping, skipped
//! ├── 2024/
//! │   └── 2024_05_22/
//! │       └── DSC01234.jpeg
//! └── #Recycle/                    # Skipped at the top level
//! ```
//!
//! Two scans are provided: a non-recursive child-directory listing (used
//! for the root and for year folders) and a recursive image walk bounded
//! by [`MAX_ALBUM_DEPTH`] (used for event folders). Neither fails: an
//! unreadable directory produces an empty listing and a warning.
//!
//! Album file lists are sorted lexicographically by full path, which gives
//! the stable "timeline" order the slideshow windows walk through.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Housekeeping folders created by NAS boxes and photo managers.
/// Compared case-insensitively.
const EXCLUDED_DIR_NAMES: &[&str] = &[".picasaoriginals", "@eadir", "#recycle"];

/// Top-level folders that are never treated as years.
pub const EXCLUDED_TOPLEVEL: &[&str] = &["#Recycle"];

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Recursion ceiling for album walks, relative to the event folder.
pub const MAX_ALBUM_DEPTH: usize = 10;

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn is_excluded_dir(name: &str) -> bool {
    let lower = name.to_lowercase();
    EXCLUDED_DIR_NAMES.contains(&lower.as_str())
}

pub fn is_image(path: &Path) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    IMAGE_EXTENSIONS.contains(&ext.as_str())
}

/// Names of the visible child directories of `dir`, sorted.
pub fn list_dirs(dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "listing directory failed");
            return Vec::new();
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| !is_hidden(name) && !is_excluded_dir(name))
        .collect();

    names.sort();
    names
}

/// Year folders at the media root.
pub fn list_years(root: &Path) -> Vec<String> {
    list_dirs(root)
        .into_iter()
        .filter(|name| !EXCLUDED_TOPLEVEL.contains(&name.as_str()))
        .collect()
}

/// Every image below `album_dir` (at most [`MAX_ALBUM_DEPTH`] levels deep),
/// as absolute paths in lexicographic order.
pub fn scan_album_files(album_dir: &Path) -> Vec<PathBuf> {
    let walker = WalkDir::new(album_dir)
        .max_depth(MAX_ALBUM_DEPTH + 1)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            if is_hidden(&name) {
                return false;
            }
            !(e.file_type().is_dir() && is_excluded_dir(&name))
        });

    let mut files: Vec<PathBuf> = walker
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                warn!(album = %album_dir.display(), error = %e, "album walk skipped an entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file() && is_image(e.path()))
        .map(|e| e.into_path())
        .collect();

    files.sort();
    files
}

/// Path relative to the media root with `/` separators, e.g.
/// `2024/2024_05_22/img.jpg`.
pub fn relative_to_root(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// One event folder as seen by `flashbacks check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumSurvey {
    pub name: String,
    pub photos: usize,
    pub excluded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearSurvey {
    pub name: String,
    pub albums: Vec<AlbumSurvey>,
}

/// Uncached walk of the whole tree. `is_excluded(year, event)` marks albums
/// the slideshow skips.
pub fn survey(root: &Path, is_excluded: impl Fn(&str, &str) -> bool) -> Vec<YearSurvey> {
    list_years(root)
        .into_iter()
        .map(|year| {
            let year_dir = root.join(&year);
            let albums = list_dirs(&year_dir)
                .into_iter()
                .map(|event| AlbumSurvey {
                    photos: scan_album_files(&year_dir.join(&event)).len(),
                    excluded: is_excluded(&year, &event),
                    name: event,
                })
                .collect();
            YearSurvey { name: year, albums }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{touch, write_tree};
    use tempfile::TempDir;

    #[test]
    fn list_dirs_skips_hidden_and_housekeeping() {
        let tmp = TempDir::new().unwrap();
        for dir in ["2019", "2020", ".thumbs", "@eaDir", ".picasaoriginals", "#recycle"] {
            fs::create_dir_all(tmp.path().join(dir)).unwrap();
        }
        touch(&tmp.path().join("notes.txt"));

        assert_eq!(list_dirs(tmp.path()), vec!["2019", "2020"]);
    }

    #[test]
    fn list_years_drops_recycle_bin() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("2021")).unwrap();
        fs::create_dir_all(tmp.path().join("#Recycle")).unwrap();

        assert_eq!(list_years(tmp.path()), vec!["2021"]);
    }

    #[test]
    fn list_dirs_missing_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(list_dirs(&tmp.path().join("nope")).is_empty());
    }

    #[test]
    fn album_scan_is_recursive_filtered_and_sorted() {
        let tmp = TempDir::new().unwrap();
        let album = tmp.path().join("event");
        write_tree(
            &album,
            &[
                "b.jpg",
                "a.JPEG",
                "c.png",
                "notes.txt",
                ".hidden.jpg",
                "raw/d.jpg",
                "@eaDir/thumb.jpg",
                ".cache/e.jpg",
            ],
        );

        let files = scan_album_files(&album);
        let rel: Vec<String> = files
            .iter()
            .map(|f| relative_to_root(&album, f))
            .collect();
        assert_eq!(rel, vec!["a.JPEG", "b.jpg", "c.png", "raw/d.jpg"]);
        assert!(files.iter().all(|f| f.is_absolute() || f.starts_with(&album)));
    }

    #[test]
    fn album_scan_respects_depth_ceiling() {
        let tmp = TempDir::new().unwrap();
        let album = tmp.path().join("event");
        let mut deep = String::new();
        for i in 0..MAX_ALBUM_DEPTH {
            deep.push_str(&format!("d{i}/"));
        }
        let ok = format!("{deep}ok.jpg");
        let too_deep = format!("{deep}d{}/x.jpg", MAX_ALBUM_DEPTH);
        write_tree(&album, &[ok.as_str(), too_deep.as_str()]);

        let files = scan_album_files(&album);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("ok.jpg"));
    }

    #[test]
    fn relative_paths_use_forward_slashes() {
        let root = Path::new("/media");
        let file = Path::new("/media/2024/2024_05_22/img.jpg");
        assert_eq!(relative_to_root(root, file), "2024/2024_05_22/img.jpg");
        assert_eq!(relative_to_root(root, root), "");
    }

    #[test]
    fn survey_counts_photos_and_marks_exclusions() {
        let tmp = TempDir::new().unwrap();
        write_tree(
            tmp.path(),
            &[
                "2019/summer/a.jpg",
                "2019/summer/b.jpg",
                "2019/winter/notes.txt",
                "2020/trip/c.png",
                "#Recycle/old/d.jpg",
            ],
        );

        let years = survey(tmp.path(), |y, e| y == "2020" && e == "trip");
        assert_eq!(
            years,
            vec![
                YearSurvey {
                    name: "2019".into(),
                    albums: vec![
                        AlbumSurvey { name: "summer".into(), photos: 2, excluded: false },
                        AlbumSurvey { name: "winter".into(), photos: 0, excluded: false },
                    ],
                },
                YearSurvey {
                    name: "2020".into(),
                    albums: vec![AlbumSurvey { name: "trip".into(), photos: 1, excluded: true }],
                },
            ]
        );
    }
}
