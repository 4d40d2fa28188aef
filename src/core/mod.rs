pub mod utils;
pub mod verdict;

pub use verdict::{Verdict, FALLBACK_VERDICT_NAME};
