//! # Flashbacks
//!
//! The HTTP backend behind a smart-mirror "flashbacks" panel. It shows a
//! random album from a `<year>/<event>` photo tree, a few slides at a time,
//! together with a departure board for one transit stop and a rolling
//! temperature chart.
//!
//! # Architecture: One Active Set
//!
//! All photo routes read the same in-memory *active set*: one album, a
//! window of `stream_count` consecutive files from it, and an expiry. The
//! display client fetches `/image/0 .. /image/{n-1}` and the two collages,
//! then comes back when the refresh headers tell it to.
//!
//! ```text
//! media/  →  DirectoryCache / AlbumFileCache  →  SelectionEngine  →  ActiveSet
//!                (TTL'd JSON under cache_dir)      (skips excluded)    (memoized collages)
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `flashbacks.toml` loading, merging over stock defaults, validation |
//! | [`scan`] | Directory listings and recursive album walks of the photo tree |
//! | [`cache`] | Persisted listing caches with per-tier TTLs |
//! | [`exclusion`] | The permanently skipped `year/event` keys |
//! | [`select`] | Random album and window selection with bounded retries |
//! | [`active`] | The live set, its expiry, refresh jitter and memo cells |
//! | [`imaging`] | Pure-Rust decoding, orientation, resizing and JPEG encoding |
//! | [`collage`] | Overview/sequence tile sampling and slide rendering |
//! | [`gtfs`] | Static GTFS feed download, parsing and departure computation |
//! | [`weather`] | Background temperature sampler with persisted history |
//! | [`server`] | Axum router, handlers and the shared backend context |
//! | [`output`] | `flashbacks check` report formatting |
//!
//! # Design Decisions
//!
//! ## Listings Are Cached On Disk
//!
//! The photo tree usually sits on a NAS. Walking a year of events over SMB
//! takes seconds, so every listing is written as JSON mirroring the tree
//! under the cache dir and trusted until its TTL runs out. A corrupt or
//! unreadable cache file is just a miss.
//!
//! ## Races Are Tolerated
//!
//! Two requests that find no live set both pick one; two requests that find
//! an empty collage cell both build it. Either result is valid, and the
//! last write wins for the set while the first write wins for a memo cell.
//! No lock is held across an `.await`.
//!
//! ## Optional Feature Modules
//!
//! Transit and weather are switched on in config. A disabled module has no
//! routes at all and is left out of `/help`.

pub mod active;
pub mod cache;
pub mod collage;
pub mod config;
pub mod exclusion;
pub mod gtfs;
pub mod imaging;
pub mod output;
pub mod scan;
pub mod select;
pub mod server;
pub mod weather;

#[cfg(test)]
pub(crate) mod test_helpers;
