//! Storage layer: the leaderboard store and local result files.

pub mod csv;
pub mod jsonl;
pub mod local;
pub mod store;

pub use csv::{CSV_HEADERS, CsvExporter};
pub use jsonl::JsonlStore;
pub use local::{SavedResults, SavedRun, load_envelope, load_saved_runs, save_results};
pub use store::{
    BucketCount, LeaderboardQuery, LeaderboardStats, LeaderboardStore, MemoryStore, ProfileStats,
    SCORE_BUCKETS, rank,
};
