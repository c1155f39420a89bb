//! CLI output formatting for `flashbacks check`.
//!
//! # Output Format
//!
//! ```text
//! Years
//! 001 2019 (2 albums)
//!     001 summer (12 photos)
//!     002 winter (0 photos, empty)
//! 002 2020 (1 album)
//!     001 trip (5 photos, excluded)
//!
//! Features
//!     transit: Umėdžių st. (refresh every 24h)
//!     weather: 54.6872, 25.2797 (every 60 min, keep 72h)
//!
//! 2 years, 3 albums, 17 photos, 1 excluded, 1 empty
//! ```
//!
//! Each section has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::config::BackendConfig;
use crate::scan::{AlbumSurvey, YearSurvey};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// ```text
/// 001 summer (12 photos)
/// 002 trip (5 photos, excluded)
/// ```
fn album_line(index: usize, album: &AlbumSurvey) -> String {
    let mut detail = plural(album.photos, "photo", "photos");
    if album.photos == 0 {
        detail.push_str(", empty");
    }
    if album.excluded {
        detail.push_str(", excluded");
    }
    format!("{} {} ({})", format_index(index), album.name, detail)
}

/// Tree of years and albums followed by a totals line.
pub fn format_survey(years: &[YearSurvey]) -> Vec<String> {
    let mut lines = vec!["Years".to_string()];
    for (i, year) in years.iter().enumerate() {
        lines.push(format!(
            "{} {} ({})",
            format_index(i + 1),
            year.name,
            plural(year.albums.len(), "album", "albums")
        ));
        for (j, album) in year.albums.iter().enumerate() {
            lines.push(format!("    {}", album_line(j + 1, album)));
        }
    }

    let albums: Vec<&AlbumSurvey> = years.iter().flat_map(|y| &y.albums).collect();
    let photos: usize = albums.iter().map(|a| a.photos).sum();
    let excluded = albums.iter().filter(|a| a.excluded).count();
    let empty = albums.iter().filter(|a| a.photos == 0).count();

    lines.push(String::new());
    lines.push(format!(
        "{}, {}, {}, {excluded} excluded, {empty} empty",
        plural(years.len(), "year", "years"),
        plural(albums.len(), "album", "albums"),
        plural(photos, "photo", "photos"),
    ));
    lines
}

/// Which optional routes the server would mount.
pub fn format_features(config: &BackendConfig) -> Vec<String> {
    let mut lines = vec!["Features".to_string()];
    let transit = &config.transit;
    if transit.enabled {
        lines.push(format!(
            "    transit: {} (refresh every {}h)",
            transit.stop_name, transit.refresh_hours
        ));
    } else {
        lines.push("    transit: disabled".to_string());
    }
    let weather = &config.weather;
    if weather.enabled {
        lines.push(format!(
            "    weather: {}, {} (every {} min, keep {}h)",
            weather.latitude,
            weather.longitude,
            weather.poll_interval().as_secs() / 60,
            weather.history_hours
        ));
    } else {
        lines.push("    weather: disabled".to_string());
    }
    lines
}

pub fn print_check_output(years: &[YearSurvey], config: &BackendConfig) {
    let mut lines = format_survey(years);
    let totals = lines.pop();
    lines.push(String::new());
    lines.extend(format_features(config));
    lines.push(String::new());
    lines.extend(totals);
    for line in lines {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn album(name: &str, photos: usize, excluded: bool) -> AlbumSurvey {
        AlbumSurvey {
            name: name.to_string(),
            photos,
            excluded,
        }
    }

    fn sample() -> Vec<YearSurvey> {
        vec![
            YearSurvey {
                name: "2019".into(),
                albums: vec![album("summer", 12, false), album("winter", 0, false)],
            },
            YearSurvey {
                name: "2020".into(),
                albums: vec![album("trip", 5, true)],
            },
        ]
    }

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(100), "100");
    }

    #[test]
    fn album_line_marks_state() {
        assert_eq!(album_line(1, &album("summer", 12, false)), "001 summer (12 photos)");
        assert_eq!(album_line(2, &album("one", 1, false)), "002 one (1 photo)");
        assert_eq!(
            album_line(3, &album("gone", 0, true)),
            "003 gone (0 photos, empty, excluded)"
        );
    }

    #[test]
    fn survey_tree_and_totals() {
        let lines = format_survey(&sample());
        assert_eq!(
            lines,
            vec![
                "Years",
                "001 2019 (2 albums)",
                "    001 summer (12 photos)",
                "    002 winter (0 photos, empty)",
                "002 2020 (1 album)",
                "    001 trip (5 photos, excluded)",
                "",
                "2 years, 3 albums, 17 photos, 1 excluded, 1 empty",
            ]
        );
    }

    #[test]
    fn empty_tree_still_has_totals() {
        let lines = format_survey(&[]);
        assert_eq!(lines.first().map(String::as_str), Some("Years"));
        assert_eq!(
            lines.last().map(String::as_str),
            Some("0 years, 0 albums, 0 photos, 0 excluded, 0 empty")
        );
    }

    #[test]
    fn features_follow_config() {
        let mut config = BackendConfig::default();
        let lines = format_features(&config);
        assert_eq!(lines[1], "    transit: Umėdžių st. (refresh every 24h)");
        assert!(lines[2].starts_with("    weather: 54.6872, 25.2797 (every 60 min"));

        config.transit.enabled = false;
        config.weather.enabled = false;
        assert_eq!(
            format_features(&config),
            vec!["Features", "    transit: disabled", "    weather: disabled"]
        );
    }
}
